//! Logging and persistence collaborator interfaces.
//!
//! The core never talks to a storage backend directly: scans log through
//! `ScanLogger` and hand finished events to an `EventStore` for later
//! causal-graph reconstruction. The built-in implementations forward to
//! the `log` facade and append JSONL records.

use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{FerretError, FerretResult};
use crate::event::{Event, EventRecord};

/// Severity levels accepted by the log collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Fatal,
    Status,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Status => "STATUS",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only scan logging.
pub trait ScanLogger: Send + Sync {
    fn log(&self, scan_id: &str, level: LogLevel, message: &str, component: Option<&str>);
}

/// Default logger: forwards scan log entries to the `log` facade.
#[derive(Debug, Default)]
pub struct LogFacade;

impl ScanLogger for LogFacade {
    fn log(&self, scan_id: &str, level: LogLevel, message: &str, component: Option<&str>) {
        let component = component.unwrap_or("core");
        match level {
            LogLevel::Error | LogLevel::Fatal => {
                log::error!("[{}] {} {}: {}", scan_id, level, component, message)
            }
            LogLevel::Status | LogLevel::Info => {
                log::info!("[{}] {}: {}", scan_id, component, message)
            }
            LogLevel::Debug => log::debug!("[{}] {}: {}", scan_id, component, message),
        }
    }
}

/// Accepts full event records keyed by scan id.
pub trait EventStore: Send + Sync {
    fn store(&self, scan_id: &str, event: &Event) -> FerretResult<()>;
}

#[derive(Debug, Serialize)]
struct StoredEvent<'a> {
    scan_id: &'a str,
    #[serde(flatten)]
    record: EventRecord,
}

/// Append-only JSONL event store, one record per line.
pub struct JsonlStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlStore {
    pub fn open(path: &Path) -> FerretResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FerretError::io(e, Some(path.to_path_buf())))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventStore for JsonlStore {
    fn store(&self, scan_id: &str, event: &Event) -> FerretResult<()> {
        let line = serde_json::to_string(&StoredEvent {
            scan_id,
            record: event.to_record(),
        })?;
        let mut file = self.file.lock().expect("store lock poisoned");
        writeln!(file, "{}", line).map_err(|e| FerretError::io(e, Some(self.path.clone())))?;
        Ok(())
    }
}

/// In-memory store for tests and ad-hoc inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().expect("store lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryStore {
    fn store(&self, _scan_id: &str, event: &Event) -> FerretResult<()> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .push(event.to_record());
        Ok(())
    }
}

/// Collects scan log entries for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(String, String, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// (level, component, message) triples in arrival order.
    pub fn entries(&self) -> Vec<(String, String, String)> {
        self.entries.lock().expect("log lock poisoned").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(level, _, _)| level == "ERROR")
            .map(|(_, _, msg)| msg)
            .collect()
    }
}

impl ScanLogger for MemoryLogger {
    fn log(&self, _scan_id: &str, level: LogLevel, message: &str, component: Option<&str>) {
        self.entries.lock().expect("log lock poisoned").push((
            level.as_str().to_string(),
            component.unwrap_or("core").to_string(),
            message.to_string(),
        ));
    }
}
