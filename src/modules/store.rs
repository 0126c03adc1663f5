//! Persistence sink.
//!
//! Watches everything, including ROOT and store-only events, and writes
//! each delivery through the scan's `EventStore`. The only built-in
//! module with `is_storage_sink() == true`.

use std::sync::Arc;

use crate::dispatch::ScanHandle;
use crate::errors::{FerretError, FerretResult};
use crate::event::Event;
use crate::module::{Module, ModuleOptions, SharedServices, WatchSet};

#[derive(Default)]
pub struct StoreModule {
    services: Option<Arc<SharedServices>>,
}

impl StoreModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for StoreModule {
    fn name(&self) -> &'static str {
        "recon_store"
    }

    fn watched_events(&self) -> WatchSet {
        WatchSet::Wildcard
    }

    fn produced_events(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn setup(&mut self, services: Arc<SharedServices>, _options: &ModuleOptions) -> FerretResult<()> {
        self.services = Some(services);
        Ok(())
    }

    fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()> {
        let services = self
            .services
            .as_ref()
            .ok_or_else(|| FerretError::module(self.name(), "setup was not run"))?;
        services.events.store(scan.scan_id(), event)
    }

    fn is_storage_sink(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::testing;
    use crate::persist::MemoryStore;
    use crate::target::{Target, TargetKind};

    #[test]
    fn test_stores_every_delivery() {
        let store = Arc::new(MemoryStore::new());
        let services =
            testing::services_with(store.clone(), Arc::new(crate::dict::Dictionary::empty()));
        let mut module = StoreModule::new();
        module.setup(services, &ModuleOptions::new()).unwrap();

        let mut scan = ScanHandle::new(
            "scan-t",
            Arc::new(Target::new("example.com", TargetKind::InternetName)),
        );
        let root = Arc::new(Event::root("example.com"));
        module.handle_event(&mut scan, &root).unwrap();
        let child = Arc::new(Event::new("EMAILADDR", "a@example.com", "m", &root));
        module.handle_event(&mut scan, &child).unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "ROOT");
        assert_eq!(records[1].data, "a@example.com");
    }

    #[test]
    fn test_without_setup_is_module_error() {
        let mut module = StoreModule::new();
        let mut scan = ScanHandle::new(
            "scan-t",
            Arc::new(Target::new("example.com", TargetKind::InternetName)),
        );
        let root = Arc::new(Event::root("example.com"));
        let result = module.handle_event(&mut scan, &root);
        assert!(matches!(result, Err(FerretError::Module { .. })));
    }
}
