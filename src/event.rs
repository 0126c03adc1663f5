//! Event model for the reconnaissance causal graph.
//!
//! Every discovered fact is an `Event` carrying a single causal parent
//! pointer, forming a tree rooted at the ROOT seed event. Event identity
//! is derived from (type, timestamp, producer, nonce) rather than content,
//! so two independent discoveries of the same fact get distinct hashes.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Event type of the sentinel seed event.
pub const ROOT_TYPE: &str = "ROOT";

/// Fixed identity hash of the sentinel, independent of construction order.
pub const ROOT_HASH: &str = "ROOT";

/// One discovered fact with a causal link back to what produced it.
///
/// Children hold a reference to their parent; parents never reference
/// children. Events are immutable once constructed and safely shareable
/// across the module graph via `Arc`.
#[derive(Debug)]
pub struct Event {
    event_type: String,
    data: String,
    module: String,
    source: Option<Arc<Event>>,
    source_hash: String,
    generated: i64,
    confidence: u8,
    visibility: u8,
    risk: u8,
    hash: String,
}

impl Event {
    /// Create the sentinel ROOT event that seeds a scan's graph.
    pub fn root(data: impl Into<String>) -> Self {
        Self {
            event_type: ROOT_TYPE.to_string(),
            data: data.into(),
            module: ROOT_TYPE.to_string(),
            source: None,
            source_hash: ROOT_HASH.to_string(),
            generated: Utc::now().timestamp_millis(),
            confidence: 100,
            visibility: 100,
            risk: 0,
            hash: ROOT_HASH.to_string(),
        }
    }

    /// Create a new event causally linked to `source`.
    ///
    /// Default scores: confidence 100, visibility 100, risk 0.
    pub fn new(
        event_type: impl Into<String>,
        data: impl Into<String>,
        module: impl Into<String>,
        source: &Arc<Event>,
    ) -> Self {
        Self::with_scores(event_type, data, module, source, 100, 100, 0)
    }

    /// Create a new event with explicit confidence/visibility/risk scores
    /// (each clamped to 0-100).
    pub fn with_scores(
        event_type: impl Into<String>,
        data: impl Into<String>,
        module: impl Into<String>,
        source: &Arc<Event>,
        confidence: u8,
        visibility: u8,
        risk: u8,
    ) -> Self {
        let event_type = event_type.into();
        let module = module.into();
        let generated = Utc::now().timestamp_millis();

        // Identity hash, not a content hash: two independently discovered
        // events with identical (type, data) must still be distinct nodes.
        let nonce: u32 = rand::thread_rng().gen_range(0..100_000_000);
        let id = format!("{}{}{}{}", event_type, generated, module, nonce);
        let hash = hex::encode(Sha256::digest(id.as_bytes()));

        Self {
            event_type,
            data: data.into(),
            module,
            source: Some(Arc::clone(source)),
            source_hash: source.hash().to_string(),
            generated,
            confidence: confidence.min(100),
            visibility: visibility.min(100),
            risk: risk.min(100),
            hash,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Name of the module that produced this event.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Causal parent; `None` only for the ROOT sentinel.
    pub fn source(&self) -> Option<&Arc<Event>> {
        self.source.as_ref()
    }

    /// Hash of the causal parent (`"ROOT"` for the sentinel itself).
    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    /// Unix timestamp (milliseconds) of creation.
    pub fn generated(&self) -> i64 {
        self.generated
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn visibility(&self) -> u8 {
        self.visibility
    }

    pub fn risk(&self) -> u8 {
        self.risk
    }

    pub fn is_root(&self) -> bool {
        self.event_type == ROOT_TYPE
    }

    /// Identity hash of this event.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Content fingerprint over (type, lowercased data, parent hash).
    ///
    /// Exposed for external dedup layers only; the dispatcher's causal
    /// suppression walks the source chain and never consults this.
    pub fn content_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_type.as_bytes());
        hasher.update(self.data.to_lowercase().as_bytes());
        hasher.update(self.source_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Iterate over this event's ancestors, nearest first, ending at ROOT.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.source.as_ref(),
        }
    }

    /// Serializable record of this event for persistence.
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            generated: self.generated,
            event_type: self.event_type.clone(),
            data: self.data.clone(),
            module: self.module.clone(),
            source_data: self.source.as_ref().map(|s| s.data.clone()),
            source_hash: self.source_hash.clone(),
            hash: self.hash.clone(),
            confidence: self.confidence,
            visibility: self.visibility,
            risk: self.risk,
        }
    }
}

/// Iterator over an event's causal chain (excluding the event itself).
pub struct Ancestors<'a> {
    next: Option<&'a Arc<Event>>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Arc<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.source.as_ref();
        Some(current)
    }
}

/// Flat, serializable form of an event for logging and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub generated: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: String,
    pub module: String,
    pub source_data: Option<String>,
    pub source_hash: String,
    pub hash: String,
    pub confidence: u8,
    pub visibility: u8,
    pub risk: u8,
}
