use crate::{error::TopologyError, properties::DirectionConvention};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

fn default_inner_conduit_count() -> u16 {
    7
}

/// Settings for a [crate::topology::TopologyStore].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub direction: DirectionConvention,
    /// JSON-lines event log. When unset the store keeps its log in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
    /// Inner conduit count for multi-conduit commands that do not name one
    #[serde(default = "default_inner_conduit_count")]
    pub default_inner_conduit_count: u16,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        TopologyConfig {
            direction: DirectionConvention::default(),
            event_log: None,
            default_inner_conduit_count: default_inner_conduit_count(),
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<TopologyConfig, TopologyError>;
    fn set_config(&self, config: &TopologyConfig) -> Result<(), TopologyError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<TopologyConfig, TopologyError> {
        tracing::debug!("Attempting to read topology config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(TopologyConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let config: TopologyConfig = toml::from_str(&content)
            .map_err(|e| TopologyError::Config(format!("{:?}: {e}", &self.path)))?;
        if config.default_inner_conduit_count == 0 {
            return Err(TopologyError::Config(format!(
                "{:?}: default_inner_conduit_count must be at least 1",
                &self.path
            )));
        }
        Ok(config)
    }

    fn set_config(&self, config: &TopologyConfig) -> Result<(), TopologyError> {
        tracing::debug!("Attempting to write topology config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("ospnet.toml"));
        assert_eq!(provider.get_config().unwrap(), TopologyConfig::default());
    }

    #[test]
    fn test_round_trip_and_partial_files() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("ospnet.toml"));
        let config = TopologyConfig {
            direction: DirectionConvention::Reversed,
            event_log: Some(dir.path().join("lines.jsonl")),
            default_inner_conduit_count: 12,
        };
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);

        write(provider.path(), "direction = \"reversed\"\n").unwrap();
        let partial = provider.get_config().unwrap();
        assert_eq!(partial.direction, DirectionConvention::Reversed);
        assert_eq!(partial.default_inner_conduit_count, 7);
        assert!(partial.event_log.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("ospnet.toml"));
        write(provider.path(), "direction = \"sideways\"\n").unwrap();
        assert!(matches!(
            provider.get_config(),
            Err(TopologyError::Config(_))
        ));
        write(provider.path(), "default_inner_conduit_count = 0\n").unwrap();
        assert!(matches!(
            provider.get_config(),
            Err(TopologyError::Config(_))
        ));
    }
}
