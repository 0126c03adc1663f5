//! Module contract and shared services.
//!
//! A module subscribes to event types, receives events one at a time from
//! the scan's dispatcher, and emits new events through the scan handle.
//! All outside-world access (HTTP, logging, persistence, dictionaries)
//! goes through `SharedServices` so modules stay testable with doubles.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::dict::Dictionary;
use crate::dispatch::ScanHandle;
use crate::errors::FerretResult;
use crate::event::Event;
use crate::fetch::UrlFetcher;
use crate::persist::{EventStore, ScanLogger};
use crate::suffix::PublicSuffixTrie;

/// What a module wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSet {
    /// Every event, including ROOT. Reserved for storage sinks and
    /// cross-cutting analyzers.
    Wildcard,
    Types(BTreeSet<String>),
}

impl WatchSet {
    /// Build a watch set from a list of event type names.
    pub fn of(types: &[&str]) -> Self {
        WatchSet::Types(types.iter().map(|t| t.to_string()).collect())
    }

    pub fn watches(&self, event_type: &str) -> bool {
        match self {
            WatchSet::Wildcard => true,
            WatchSet::Types(types) => types.contains(event_type),
        }
    }
}

/// Per-module configuration: a string-keyed map with typed getters.
/// Missing or unparsable values fall back to the caller's default.
#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    values: HashMap<String, String>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Collaborators handed to every module at setup.
pub struct SharedServices {
    pub fetcher: Arc<dyn UrlFetcher>,
    pub logger: Arc<dyn ScanLogger>,
    pub events: Arc<dyn EventStore>,
    pub dictionary: Arc<Dictionary>,
    pub suffixes: Arc<PublicSuffixTrie>,
    /// Scan-wide fetch defaults (timeout, user-agent pool); modules
    /// clone and specialize per request.
    pub default_fetch: crate::fetch::FetchOptions,
}

/// One reconnaissance module.
///
/// Handlers run synchronously on the scan thread, one event at a time,
/// and may emit any number of new events via the handle. Returning an
/// `Err` is logged and isolated; it never stops the scan or other
/// modules' deliveries.
pub trait Module: Send {
    fn name(&self) -> &'static str;

    fn watched_events(&self) -> WatchSet;

    /// Event types this module can emit, for registry queries and
    /// producer/consumer wiring.
    fn produced_events(&self) -> Vec<&'static str>;

    fn setup(&mut self, services: Arc<SharedServices>, options: &ModuleOptions) -> FerretResult<()> {
        let _ = (services, options);
        Ok(())
    }

    fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()>;

    /// Storage sinks still receive events flagged store-only by causal
    /// suppression; every other module does not.
    fn is_storage_sink(&self) -> bool {
        false
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_set() {
        let set = WatchSet::of(&["EMAILADDR", "HUMAN_NAME"]);
        assert!(set.watches("EMAILADDR"));
        assert!(!set.watches("IP_ADDRESS"));
        assert!(WatchSet::Wildcard.watches("ANYTHING"));
    }

    #[test]
    fn test_options_typed_getters() {
        let mut opts = ModuleOptions::new();
        opts.set("algolimit", "60");
        opts.set("emailtoname", "false");
        opts.set("junk", "not-a-number");
        assert_eq!(opts.get_i64("algolimit", 75), 60);
        assert_eq!(opts.get_i64("missing", 75), 75);
        assert_eq!(opts.get_i64("junk", 75), 75);
        assert!(!opts.get_bool("emailtoname", true));
        assert!(opts.get_bool("missing", true));
        assert_eq!(opts.get_str("algolimit"), Some("60"));
    }
}
