//! Ferret OSINT reconnaissance core
//!
//! A modular reconnaissance engine: modules subscribe to typed events,
//! every discovered fact is causally linked back to the scan seed, and
//! dispatch applies scope, dedup and cancellation policy centrally.

pub mod cli;
pub mod dict;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod fetch;
pub mod module;
pub mod modules;
pub mod persist;
pub mod registry;
pub mod scan;
pub mod status;
pub mod suffix;
pub mod target;
pub mod utils;

pub use errors::{FerretError, FerretResult};
pub use event::Event;
pub use scan::{Scan, ScanConfig, ScanSummary};
pub use status::{ScanState, ScanStatusRegistry};
pub use target::{Target, TargetKind};
