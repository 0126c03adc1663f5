//! Cross-thread scan status registry for cooperative cancellation.
//!
//! The only state shared between concurrently running scans. Dispatch
//! consults it at every delivery checkpoint; a scan flagged as
//! ABORT-REQUESTED stops delivering events, but handlers already
//! executing are never forcibly interrupted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Run state of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Initializing,
    Running,
    AbortRequested,
    Aborted,
    Finished,
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Initializing => "INITIALIZING",
            ScanState::Running => "RUNNING",
            ScanState::AbortRequested => "ABORT-REQUESTED",
            ScanState::Aborted => "ABORTED",
            ScanState::Finished => "FINISHED",
            ScanState::Failed => "ERROR-FAILED",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concurrency-safe map from scan identifier to run state.
///
/// Shared via `Arc` through each scan's context rather than a process
/// global. Entries persist for the process lifetime; there is no
/// per-scan teardown.
#[derive(Debug, Default)]
pub struct ScanStatusRegistry {
    table: Mutex<HashMap<String, ScanState>>,
}

impl ScanStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, scan_id: &str, state: ScanState) {
        self.table
            .lock()
            .expect("status lock poisoned")
            .insert(scan_id.to_string(), state);
    }

    pub fn get_status(&self, scan_id: &str) -> Option<ScanState> {
        self.table
            .lock()
            .expect("status lock poisoned")
            .get(scan_id)
            .copied()
    }

    /// Snapshot of every known scan's state.
    pub fn all(&self) -> HashMap<String, ScanState> {
        self.table.lock().expect("status lock poisoned").clone()
    }

    /// True once an abort has been requested for `scan_id`.
    pub fn abort_requested(&self, scan_id: &str) -> bool {
        self.get_status(scan_id) == Some(ScanState::AbortRequested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_get_round_trip() {
        let registry = ScanStatusRegistry::new();
        assert_eq!(registry.get_status("scan-1"), None);
        registry.set_status("scan-1", ScanState::Running);
        assert_eq!(registry.get_status("scan-1"), Some(ScanState::Running));
        registry.set_status("scan-1", ScanState::AbortRequested);
        assert!(registry.abort_requested("scan-1"));
        assert!(!registry.abort_requested("scan-2"));
    }

    #[test]
    fn test_wire_strings() {
        assert_eq!(ScanState::AbortRequested.to_string(), "ABORT-REQUESTED");
        assert_eq!(ScanState::Failed.to_string(), "ERROR-FAILED");
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(ScanStatusRegistry::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let id = format!("scan-{}", i);
                for _ in 0..500 {
                    reg.set_status(&id, ScanState::Running);
                    assert!(matches!(
                        reg.get_status(&id),
                        Some(ScanState::Running) | Some(ScanState::Finished)
                    ));
                }
                reg.set_status(&id, ScanState::Finished);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.all();
        assert_eq!(snapshot.len(), 8);
        for i in 0..8 {
            assert_eq!(
                snapshot.get(&format!("scan-{}", i)),
                Some(&ScanState::Finished)
            );
        }
    }
}
