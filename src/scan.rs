//! Scan driver: wires target, modules and services into a dispatcher
//! and drives one scan from ROOT seed to completion.

use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::EventDispatcher;
use crate::errors::FerretResult;
use crate::event::Event;
use crate::module::{ModuleOptions, SharedServices};
use crate::persist::{LogLevel, ScanLogger};
use crate::registry::ModuleRegistry;
use crate::status::{ScanState, ScanStatusRegistry};
use crate::target::{Target, TargetKind};

/// What to scan and with which modules.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub target_value: String,
    /// When `None` the kind is detected from the value.
    pub target_kind: Option<TargetKind>,
    /// Empty means every registered module.
    pub modules: Vec<String>,
    pub module_options: HashMap<String, ModuleOptions>,
}

impl ScanConfig {
    pub fn new(target_value: impl Into<String>) -> Self {
        Self {
            target_value: target_value.into(),
            target_kind: None,
            modules: Vec::new(),
            module_options: HashMap::new(),
        }
    }
}

/// Final accounting for one scan run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub target: String,
    pub state: String,
    pub events_emitted: usize,
    pub events_queued: usize,
    pub events_filtered: usize,
    pub events_dropped_empty: usize,
    pub events_suppressed: usize,
    pub handler_errors: usize,
    pub type_counts: BTreeMap<String, usize>,
    pub duration_seconds: f64,
}

/// One scan: its own id, target, module instances and event queue.
/// Nothing here is shared with other scans except the status registry.
pub struct Scan {
    id: String,
    target: Arc<Target>,
    status: Arc<ScanStatusRegistry>,
    logger: Arc<dyn ScanLogger>,
    dispatcher: EventDispatcher,
}

impl Scan {
    /// Validate the config, instantiate and set up the requested modules
    /// and register the scan as INITIALIZING. Any failure here flips the
    /// scan to ERROR-FAILED and aborts before dispatch starts.
    pub fn new(
        config: &ScanConfig,
        registry: &ModuleRegistry,
        services: Arc<SharedServices>,
        status: Arc<ScanStatusRegistry>,
    ) -> FerretResult<Self> {
        let id = generate_scan_id();
        status.set_status(&id, ScanState::Initializing);

        match Self::build(&id, config, registry, services, Arc::clone(&status)) {
            Ok(scan) => Ok(scan),
            Err(e) => {
                status.set_status(&id, ScanState::Failed);
                Err(e)
            }
        }
    }

    fn build(
        id: &str,
        config: &ScanConfig,
        registry: &ModuleRegistry,
        services: Arc<SharedServices>,
        status: Arc<ScanStatusRegistry>,
    ) -> FerretResult<Self> {
        let target = match config.target_kind {
            Some(kind) => Target::new(&config.target_value, kind),
            None => Target::from_value(&config.target_value)?,
        };
        let target = Arc::new(target);

        let mut dispatcher = EventDispatcher::new(
            id,
            Arc::clone(&target),
            Arc::clone(&status),
            Arc::clone(&services.logger),
        );

        let module_names: Vec<String> = if config.modules.is_empty() {
            registry.names().iter().map(|n| n.to_string()).collect()
        } else {
            config.modules.clone()
        };
        for name in &module_names {
            let mut module = registry.instantiate(name)?;
            let options = config
                .module_options
                .get(name)
                .cloned()
                .unwrap_or_default();
            module.setup(Arc::clone(&services), &options)?;
            dispatcher.register_module(module);
        }

        log::info!(
            "Scan {} initialized: target {} ({}), modules: {}",
            id,
            target.value(),
            target.kind(),
            module_names.join(", ")
        );

        Ok(Self {
            id: id.to_string(),
            target,
            status,
            logger: Arc::clone(&services.logger),
            dispatcher,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Seed the ROOT event and drain the queue to completion or abort.
    pub fn run(&mut self) -> ScanSummary {
        let started = Instant::now();
        // An abort can land between construction and run; it must never
        // be overwritten by the Running transition.
        if !self.status.abort_requested(&self.id) {
            self.status.set_status(&self.id, ScanState::Running);
        }
        self.logger.log(
            &self.id,
            LogLevel::Status,
            &format!("Scan started against {}", self.target.value()),
            None,
        );

        self.dispatcher.emit(Event::root(self.target.value()));
        self.dispatcher.run();

        let state = if self.status.abort_requested(&self.id) {
            ScanState::Aborted
        } else {
            ScanState::Finished
        };
        self.status.set_status(&self.id, state);
        self.logger.log(
            &self.id,
            LogLevel::Status,
            &format!("Scan ended: {}", state),
            None,
        );

        let stats = self.dispatcher.stats();
        ScanSummary {
            scan_id: self.id.clone(),
            target: self.target.value().to_string(),
            state: state.to_string(),
            events_emitted: stats.emitted,
            events_queued: stats.queued,
            events_filtered: stats.filtered,
            events_dropped_empty: stats.dropped_empty,
            events_suppressed: stats.suppressed,
            handler_errors: stats.handler_errors,
            type_counts: stats.type_counts.clone(),
            duration_seconds: started.elapsed().as_secs_f64(),
        }
    }
}

/// Random 8-hex-digit scan identifier.
fn generate_scan_id() -> String {
    format!("{:08X}", rand::thread_rng().gen::<u32>())
}
