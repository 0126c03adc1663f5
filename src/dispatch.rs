//! Per-scan event dispatch.
//!
//! Emitted events pass through ordered admission gates, then join a FIFO
//! queue drained by the scan thread. Each dequeued event is delivered to
//! subscribing modules in deterministic (name) order. Handler errors are
//! logged and isolated; cooperative cancellation is checked before every
//! dequeue and again before every handler invocation.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::event::Event;
use crate::module::Module;
use crate::persist::{LogLevel, ScanLogger};
use crate::status::ScanStatusRegistry;
use crate::target::Target;

/// Counters accumulated over one scan.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// Events offered to the gates, including ones later dropped.
    pub emitted: usize,
    /// Events that cleared the gates and entered the queue.
    pub queued: usize,
    /// Dropped by a producer's output filter.
    pub filtered: usize,
    /// Dropped for an empty payload.
    pub dropped_empty: usize,
    /// Flagged store-only by causal suppression.
    pub suppressed: usize,
    /// Handler invocations that returned an error.
    pub handler_errors: usize,
    /// Queued events by type.
    pub type_counts: BTreeMap<String, usize>,
}

/// Handle a module emits through while handling an event.
///
/// Emissions are buffered and pushed through the admission gates by the
/// dispatcher after the handler returns, keeping handlers re-entrant
/// without touching dispatcher state.
pub struct ScanHandle {
    scan_id: String,
    target: Arc<Target>,
    pending: Vec<Event>,
}

impl ScanHandle {
    pub(crate) fn new(scan_id: impl Into<String>, target: Arc<Target>) -> Self {
        Self {
            scan_id: scan_id.into(),
            target,
            pending: Vec::new(),
        }
    }

    pub(crate) fn drain_pending(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// The scan's target, for scope checks.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Emit a new event into the scan. Gate checks happen after the
    /// current handler returns.
    pub fn emit(&mut self, event: Event) {
        self.pending.push(event);
    }
}

struct QueuedEvent {
    event: Arc<Event>,
    store_only: bool,
}

/// The per-scan dispatcher: module table, output filters, FIFO queue.
pub struct EventDispatcher {
    scan_id: String,
    target: Arc<Target>,
    status: Arc<ScanStatusRegistry>,
    logger: Arc<dyn ScanLogger>,
    // BTreeMap gives the deterministic name-ordered delivery sweep.
    modules: BTreeMap<String, Box<dyn Module>>,
    output_filters: HashMap<String, BTreeSet<String>>,
    queue: VecDeque<QueuedEvent>,
    stats: DispatchStats,
}

impl EventDispatcher {
    pub fn new(
        scan_id: impl Into<String>,
        target: Arc<Target>,
        status: Arc<ScanStatusRegistry>,
        logger: Arc<dyn ScanLogger>,
    ) -> Self {
        Self {
            scan_id: scan_id.into(),
            target,
            status,
            logger,
            modules: BTreeMap::new(),
            output_filters: HashMap::new(),
            queue: VecDeque::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn register_module(&mut self, module: Box<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Restrict which event types the named producer may emit. ROOT and
    /// events of the target's own type are always exempt.
    pub fn set_output_filter(&mut self, producer: &str, types: &[&str]) {
        self.output_filters.insert(
            producer.to_string(),
            types.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Push one event through the admission gates, queueing it when it
    /// survives. Gate order matters and is fixed: output filter, empty
    /// payload, cancellation, causal suppression.
    pub fn emit(&mut self, event: Event) {
        self.stats.emitted += 1;

        if let Some(allowed) = self.output_filters.get(event.module()) {
            let exempt = event.is_root() || event.event_type() == self.target.kind().as_str();
            if !exempt && !allowed.contains(event.event_type()) {
                log::debug!(
                    "Module {} produced filtered event type {}, dropping",
                    event.module(),
                    event.event_type()
                );
                self.stats.filtered += 1;
                return;
            }
        }

        if event.data().trim().is_empty() {
            self.stats.dropped_empty += 1;
            return;
        }

        if self.status.abort_requested(&self.scan_id) {
            return;
        }

        // An identical (type, data) anywhere up the causal chain means
        // this branch is revisiting a known fact; keep it for storage
        // but stop it from driving further module work. Identical facts
        // on unrelated branches are unaffected.
        let data_lower = event.data().to_lowercase();
        let store_only = event.ancestors().any(|ancestor| {
            ancestor.event_type() == event.event_type()
                && ancestor.data().to_lowercase() == data_lower
        });
        if store_only {
            log::debug!(
                "Event {} ({}) already seen in its causal chain, storing only",
                event.event_type(),
                event.data()
            );
            self.stats.suppressed += 1;
        }

        self.stats.queued += 1;
        *self
            .stats
            .type_counts
            .entry(event.event_type().to_string())
            .or_insert(0) += 1;
        self.queue.push_back(QueuedEvent {
            event: Arc::new(event),
            store_only,
        });
    }

    /// Drain the queue to exhaustion or until cancellation is observed.
    pub fn run(&mut self) {
        while let Some(queued) = self.queue.pop_front() {
            if self.status.abort_requested(&self.scan_id) {
                log::info!("[{}] Abort requested, stopping dispatch", self.scan_id);
                self.queue.clear();
                return;
            }
            self.deliver(&queued);
        }
    }

    fn deliver(&mut self, queued: &QueuedEvent) {
        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in names {
            if self.status.abort_requested(&self.scan_id) {
                return;
            }

            let mut handle = ScanHandle::new(self.scan_id.clone(), Arc::clone(&self.target));

            let result = {
                let Some(module) = self.modules.get_mut(&name) else {
                    continue;
                };
                if !module.watched_events().watches(queued.event.event_type()) {
                    continue;
                }
                if queued.store_only && !module.is_storage_sink() {
                    continue;
                }
                module.handle_event(&mut handle, &queued.event)
            };

            if let Err(e) = result {
                self.stats.handler_errors += 1;
                self.logger.log(
                    &self.scan_id,
                    LogLevel::Error,
                    &format!(
                        "Handler failed on {} event: {}",
                        queued.event.event_type(),
                        e
                    ),
                    Some(&name),
                );
            }

            for event in handle.drain_pending() {
                self.emit(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FerretError, FerretResult};
    use crate::module::WatchSet;
    use crate::persist::MemoryLogger;
    use crate::status::ScanState;
    use crate::target::TargetKind;
    use std::sync::Mutex;

    // Records every delivery into a shared journal, optionally emitting
    // one follow-up event per trigger type.
    struct Probe {
        name: &'static str,
        watched: WatchSet,
        journal: Arc<Mutex<Vec<String>>>,
        emits: Option<(String, String, String)>, // on_type -> (type, data)
        sink: bool,
        fail: bool,
    }

    impl Probe {
        fn new(name: &'static str, watched: WatchSet, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                watched,
                journal: Arc::clone(journal),
                emits: None,
                sink: false,
                fail: false,
            }
        }
    }

    impl Module for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn watched_events(&self) -> WatchSet {
            self.watched.clone()
        }

        fn produced_events(&self) -> Vec<&'static str> {
            Vec::new()
        }

        fn handle_event(&mut self, scan: &mut ScanHandle, event: &Arc<Event>) -> FerretResult<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.event_type()));
            if self.fail {
                return Err(FerretError::module(self.name, "induced failure"));
            }
            if let Some((on_type, out_type, out_data)) = &self.emits {
                if event.event_type() == on_type {
                    scan.emit(Event::new(out_type.clone(), out_data.clone(), self.name, event));
                }
            }
            Ok(())
        }

        fn is_storage_sink(&self) -> bool {
            self.sink
        }
    }

    fn dispatcher(logger: Arc<dyn ScanLogger>) -> (EventDispatcher, Arc<ScanStatusRegistry>) {
        let status = Arc::new(ScanStatusRegistry::new());
        status.set_status("scan-t", ScanState::Running);
        let target = Arc::new(Target::new("example.com", TargetKind::InternetName));
        let d = EventDispatcher::new("scan-t", target, Arc::clone(&status), logger);
        (d, status)
    }

    #[test]
    fn test_delivery_in_module_name_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        // Registered out of order on purpose.
        d.register_module(Box::new(Probe::new("m_beta", WatchSet::Wildcard, &journal)));
        d.register_module(Box::new(Probe::new("m_alpha", WatchSet::Wildcard, &journal)));

        d.emit(Event::root("example.com"));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_alpha:ROOT", "m_beta:ROOT"]);
    }

    #[test]
    fn test_watched_set_respected() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        d.register_module(Box::new(Probe::new(
            "m_email",
            WatchSet::of(&["EMAILADDR"]),
            &journal,
        )));

        let root = Arc::new(Event::root("example.com"));
        d.emit(Event::root("example.com"));
        d.emit(Event::new("EMAILADDR", "a@example.com", "m_src", &root));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_email:EMAILADDR"]);
    }

    #[test]
    fn test_output_filter_blocks_unlisted_types() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        d.register_module(Box::new(Probe::new("m_any", WatchSet::Wildcard, &journal)));
        d.set_output_filter("m_pgp", &["EMAILADDR"]);

        let root = Arc::new(Event::root("example.com"));
        d.emit(Event::new("PGP_KEY", "-----BEGIN...", "m_pgp", &root));
        d.emit(Event::new("EMAILADDR", "a@example.com", "m_pgp", &root));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_any:EMAILADDR"]);
        assert_eq!(d.stats().filtered, 1);
    }

    #[test]
    fn test_output_filter_exempts_root_and_target_type() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        d.register_module(Box::new(Probe::new("m_any", WatchSet::Wildcard, &journal)));
        // Filter that would block everything the producer emits.
        d.set_output_filter("ROOT", &["NOTHING"]);
        d.set_output_filter("m_dns", &["NOTHING"]);

        let root = Arc::new(Event::root("example.com"));
        d.emit(Event::root("example.com"));
        // Target kind is INTERNET_NAME, so this passes despite the filter.
        d.emit(Event::new("INTERNET_NAME", "www.example.com", "m_dns", &root));
        d.emit(Event::new("IP_ADDRESS", "192.0.2.1", "m_dns", &root));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_any:ROOT", "m_any:INTERNET_NAME"]);
    }

    #[test]
    fn test_empty_payload_dropped_silently() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        d.register_module(Box::new(Probe::new("m_any", WatchSet::Wildcard, &journal)));

        let root = Arc::new(Event::root("example.com"));
        d.emit(Event::new("RAW_RIR_DATA", "   ", "m_src", &root));
        d.run();

        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(d.stats().dropped_empty, 1);
    }

    #[test]
    fn test_causal_chain_suppression_is_chain_local() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        let mut sink = Probe::new("z_store", WatchSet::Wildcard, &journal);
        sink.sink = true;
        d.register_module(Box::new(Probe::new("m_any", WatchSet::Wildcard, &journal)));
        d.register_module(Box::new(sink));

        let root = Arc::new(Event::root("example.com"));
        let first = Arc::new(Event::new("INTERNET_NAME", "www.example.com", "m_a", &root));
        let middle = Arc::new(Event::new("IP_ADDRESS", "192.0.2.1", "m_b", &first));

        // Same (type, data) as an ancestor: store-only.
        d.emit(Event::new("INTERNET_NAME", "WWW.Example.com", "m_c", &middle));
        // Same (type, data) on an unrelated branch: delivered normally.
        d.emit(Event::new("INTERNET_NAME", "www.example.com", "m_c", &root));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "z_store:INTERNET_NAME", // suppressed copy, sink only
                "m_any:INTERNET_NAME",   // unrelated branch, everyone
                "z_store:INTERNET_NAME",
            ]
        );
        assert_eq!(d.stats().suppressed, 1);
    }

    #[test]
    fn test_direct_parent_suppresses_too() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        let mut sink = Probe::new("z_store", WatchSet::Wildcard, &journal);
        sink.sink = true;
        d.register_module(Box::new(Probe::new("m_any", WatchSet::Wildcard, &journal)));
        d.register_module(Box::new(sink));

        let root = Arc::new(Event::root("example.com"));
        let parent = Arc::new(Event::new("EMAILADDR", "a@example.com", "m_a", &root));
        // Re-emission of the parent's own fact, one hop down.
        d.emit(Event::new("EMAILADDR", "a@example.com", "m_b", &parent));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["z_store:EMAILADDR"]);
        assert_eq!(d.stats().suppressed, 1);
    }

    #[test]
    fn test_failing_handler_logged_once_and_isolated() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(MemoryLogger::new());
        let (mut d, _) = dispatcher(logger.clone());
        let mut bad = Probe::new("m_bad", WatchSet::Wildcard, &journal);
        bad.fail = true;
        d.register_module(Box::new(bad));
        d.register_module(Box::new(Probe::new("m_good", WatchSet::Wildcard, &journal)));

        d.emit(Event::root("example.com"));
        d.run();

        // The failing handler ran, was logged exactly once, and did not
        // prevent the later module from receiving the event.
        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_bad:ROOT", "m_good:ROOT"]);
        assert_eq!(logger.errors().len(), 1);
        assert_eq!(d.stats().handler_errors, 1);
    }

    #[test]
    fn test_reentrant_emission_cascades() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let (mut d, _) = dispatcher(Arc::new(MemoryLogger::new()));
        let mut chained = Probe::new("m_chain", WatchSet::Wildcard, &journal);
        chained.emits = Some((
            "ROOT".to_string(),
            "TARGET_WEB_CONTENT".to_string(),
            "hello".to_string(),
        ));
        d.register_module(Box::new(chained));

        d.emit(Event::root("example.com"));
        d.run();

        let seen = journal.lock().unwrap().clone();
        assert_eq!(seen, vec!["m_chain:ROOT", "m_chain:TARGET_WEB_CONTENT"]);
    }

    #[test]
    fn test_cancellation_stops_dispatch() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let logger: Arc<dyn ScanLogger> = Arc::new(MemoryLogger::new());
        let status = Arc::new(ScanStatusRegistry::new());
        status.set_status("scan-t", ScanState::Running);
        let target = Arc::new(Target::new("example.com", TargetKind::InternetName));
        let mut d = EventDispatcher::new("scan-t", Arc::clone(&target), Arc::clone(&status), logger);

        struct Aborter {
            status: Arc<ScanStatusRegistry>,
        }
        impl Module for Aborter {
            fn name(&self) -> &'static str {
                "a_abort"
            }
            fn watched_events(&self) -> WatchSet {
                WatchSet::Wildcard
            }
            fn produced_events(&self) -> Vec<&'static str> {
                Vec::new()
            }
            fn handle_event(&mut self, _: &mut ScanHandle, _: &Arc<Event>) -> FerretResult<()> {
                self.status.set_status("scan-t", ScanState::AbortRequested);
                Ok(())
            }
        }

        d.register_module(Box::new(Aborter {
            status: Arc::clone(&status),
        }));
        d.register_module(Box::new(Probe::new("z_late", WatchSet::Wildcard, &journal)));

        let root = Arc::new(Event::root("example.com"));
        d.emit(Event::root("example.com"));
        d.emit(Event::new("EMAILADDR", "a@example.com", "m_x", &root));
        d.run();

        // The abort lands before z_late's ROOT delivery and before the
        // second queued event is dequeued.
        assert!(journal.lock().unwrap().is_empty());
    }
}
