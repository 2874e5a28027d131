//! Append-only per-line event streams.
//!
//! The event log is the sole source of truth for the topology; the in-memory projection is
//! disposable and rebuilt from [EventStore::records]. Every stream is versioned by its length and
//! appends name the version they expect, so two writers racing on the same line cannot both
//! succeed.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{error::TopologyError, event::LineEvent, properties::LineId};

/// One stored event with its global position and its version within the line's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub position: u64,
    pub line: LineId,
    /// Stream version after this event was applied (1 for the placement)
    pub version: u64,
    pub event: LineEvent,
}

/// Events for one stream, appended only if the stream is at `expected_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAppend {
    pub line: LineId,
    pub expected_version: u64,
    pub events: Vec<LineEvent>,
}

pub trait EventStore: Send {
    /// Append to several streams at once. Either every stream's expected version matches and all
    /// events are stored, or nothing is stored and [TopologyError::Conflict] is returned.
    fn append_batch(&mut self, batch: Vec<StreamAppend>) -> Result<Vec<LogRecord>, TopologyError>;

    /// Current version (event count) of a stream; 0 for unknown lines.
    fn stream_version(&self, line: &LineId) -> u64;

    /// Every record in global append order.
    fn records(&self) -> Result<Vec<LogRecord>, TopologyError>;

    fn append(
        &mut self,
        line: LineId,
        expected_version: u64,
        events: Vec<LineEvent>,
    ) -> Result<Vec<LogRecord>, TopologyError> {
        self.append_batch(vec![StreamAppend {
            line,
            expected_version,
            events,
        }])
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    records: Vec<LogRecord>,
    versions: BTreeMap<LineId, u64>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        MemoryEventStore::default()
    }

    /// Build the per-stream bookkeeping for a batch without committing it.
    fn stage(&self, batch: Vec<StreamAppend>) -> Result<Vec<LogRecord>, TopologyError> {
        let mut staged_versions: BTreeMap<LineId, u64> = BTreeMap::new();
        let mut position = self.records.len() as u64;
        let mut staged = Vec::new();
        for append in batch {
            let current = *staged_versions
                .get(&append.line)
                .unwrap_or(&self.stream_version(&append.line));
            if current != append.expected_version {
                return Err(TopologyError::Conflict(format!(
                    "stream {} is at version {current}, expected {}",
                    append.line, append.expected_version
                )));
            }
            let mut version = current;
            for event in append.events {
                if event.line() != append.line {
                    return Err(TopologyError::InvalidArgument(format!(
                        "event {event} does not belong to stream {}",
                        append.line
                    )));
                }
                version += 1;
                position += 1;
                staged.push(LogRecord {
                    position,
                    line: append.line,
                    version,
                    event,
                });
            }
            staged_versions.insert(append.line, version);
        }
        Ok(staged)
    }

    fn commit(&mut self, staged: &[LogRecord]) {
        for record in staged {
            self.versions.insert(record.line, record.version);
            self.records.push(record.clone());
        }
    }
}

impl EventStore for MemoryEventStore {
    fn append_batch(&mut self, batch: Vec<StreamAppend>) -> Result<Vec<LogRecord>, TopologyError> {
        let staged = self.stage(batch)?;
        self.commit(&staged);
        Ok(staged)
    }

    fn stream_version(&self, line: &LineId) -> u64 {
        self.versions.get(line).copied().unwrap_or(0)
    }

    fn records(&self) -> Result<Vec<LogRecord>, TopologyError> {
        Ok(self.records.clone())
    }
}

/// An event store persisted as JSON lines, one [LogRecord] per line.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    file: File,
    memory: MemoryEventStore,
}

impl FileEventStore {
    /// Open (or create) the log at `path`, loading any records already present.
    ///
    /// A final line without its newline is the remains of an interrupted append; it is cut off
    /// with a warning. A malformed line anywhere else is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        let path = path.as_ref().to_path_buf();
        let mut memory = MemoryEventStore::new();
        let mut torn_at = None;
        if path.exists() {
            let content = read(&path)?;
            let mut offset = 0usize;
            for (idx, line) in content.split_inclusive(|b| *b == b'\n').enumerate() {
                let start = offset;
                offset += line.len();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let record: LogRecord = match serde_json::from_slice(line) {
                    Ok(record) => record,
                    Err(e) if line.last() != Some(&b'\n') => {
                        tracing::warn!(
                            "{}:{}: dropping torn log record ({e})",
                            path.display(),
                            idx + 1
                        );
                        torn_at = Some(start as u64);
                        break;
                    }
                    Err(e) => {
                        return Err(TopologyError::Serialization(format!(
                            "{}:{}: malformed log record: {e}",
                            path.display(),
                            idx + 1
                        )));
                    }
                };
                let expected = memory.stream_version(&record.line) + 1;
                if record.version != expected {
                    return Err(TopologyError::Serialization(format!(
                        "{}:{}: stream {} jumps to version {} (expected {expected})",
                        path.display(),
                        idx + 1,
                        record.line,
                        record.version
                    )));
                }
                memory.commit(std::slice::from_ref(&record));
            }
            tracing::debug!(
                "Loaded {} log records from {:?}",
                memory.records.len(),
                &path
            );
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Some(len) = torn_at {
            file.set_len(len)?;
        }
        Ok(FileEventStore { path, file, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventStore for FileEventStore {
    fn append_batch(&mut self, batch: Vec<StreamAppend>) -> Result<Vec<LogRecord>, TopologyError> {
        let staged = self.memory.stage(batch)?;
        let mut buffer = String::new();
        for record in staged.iter() {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }
        let len = self.file.metadata()?.len();
        if let Err(e) = self
            .file
            .write_all(buffer.as_bytes())
            .and_then(|_| self.file.sync_data())
        {
            // Leave no partial record behind for the next open
            if let Err(truncate) = self.file.set_len(len) {
                tracing::warn!("Could not roll back {:?} to {len} bytes: {truncate}", &self.path);
            }
            return Err(e.into());
        }
        self.memory.commit(&staged);
        Ok(staged)
    }

    fn stream_version(&self, line: &LineId) -> u64 {
        self.memory.stream_version(line)
    }

    fn records(&self) -> Result<Vec<LogRecord>, TopologyError> {
        self.memory.records()
    }
}
