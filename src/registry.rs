//! Typed module registry.
//!
//! Maps module names to metadata plus a constructor, so scan setup can
//! validate a requested module list and answer "who produces X" /
//! "who consumes X" questions without instantiating anything twice.

use std::collections::BTreeMap;

use crate::errors::{FerretError, FerretResult};
use crate::module::{Module, WatchSet};
use crate::modules;

type ModuleCtor = Box<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Static facts about a registered module.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub watched: WatchSet,
    pub produced: Vec<&'static str>,
    pub storage_sink: bool,
}

/// Name-ordered table of available modules.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<&'static str, (ModuleDescriptor, ModuleCtor)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module by its constructor. Metadata is captured from a
    /// probe instance.
    pub fn register<F>(&mut self, ctor: F)
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        let probe = ctor();
        let descriptor = ModuleDescriptor {
            name: probe.name(),
            watched: probe.watched_events(),
            produced: probe.produced_events(),
            storage_sink: probe.is_storage_sink(),
        };
        self.entries
            .insert(descriptor.name, (descriptor, Box::new(ctor)));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.entries.get(name).map(|(descriptor, _)| descriptor)
    }

    /// Construct a fresh instance of the named module.
    pub fn instantiate(&self, name: &str) -> FerretResult<Box<dyn Module>> {
        match self.entries.get(name) {
            Some((_, ctor)) => Ok(ctor()),
            None => Err(FerretError::UnknownModule(name.to_string())),
        }
    }

    /// Names of modules that can emit the given event type.
    pub fn modules_producing(&self, event_type: &str) -> Vec<&'static str> {
        self.entries
            .values()
            .filter(|(d, _)| d.produced.contains(&event_type))
            .map(|(d, _)| d.name)
            .collect()
    }

    /// Names of modules that want the given event type delivered.
    pub fn modules_consuming(&self, event_type: &str) -> Vec<&'static str> {
        self.entries
            .values()
            .filter(|(d, _)| d.watched.watches(event_type))
            .map(|(d, _)| d.name)
            .collect()
    }
}

/// Registry pre-loaded with the built-in modules.
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(|| Box::new(modules::email::EmailModule::new()));
    registry.register(|| Box::new(modules::names::NamesModule::new()));
    registry.register(|| Box::new(modules::pgp::PgpModule::new()));
    registry.register(|| Box::new(modules::store::StoreModule::new()));
    registry
}
