use std::{fmt, io};

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum TopologyError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Version conflict: {0}")]
    Conflict(String),
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl TopologyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TopologyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TopologyError::Conflict(_) => StatusCode::CONFLICT,
            TopologyError::DuplicateId(_) => StatusCode::CONFLICT,
            TopologyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            TopologyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TopologyError::NotFound(_) => StatusCode::NOT_FOUND,
            TopologyError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<toml::de::Error> for TopologyError {
    fn from(src: toml::de::Error) -> TopologyError {
        TopologyError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for TopologyError {
    fn from(src: toml::ser::Error) -> TopologyError {
        TopologyError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for TopologyError {
    fn from(src: JsonError) -> TopologyError {
        TopologyError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for TopologyError {
    fn from(src: uuid::Error) -> TopologyError {
        TopologyError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for TopologyError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => TopologyError::NotFound(format!("{x}")),
            _ => TopologyError::Io(format!("IOError: {}: {x}", x.kind())),
        }
    }
}

impl From<fmt::Error> for TopologyError {
    fn from(x: fmt::Error) -> Self {
        TopologyError::Serialization(format!("{x}"))
    }
}
