//! Event envelopes
//!
//! Two wrappers exist:
//! - [`EventEnvelope`]: produced by the scenario engine. Immutable, versioned,
//!   carrying the seed and tick that generated it. Its id is derived from
//!   `(seed, tick, domain, type, sequence-within-tick)` so identical runs give
//!   byte-identical id sequences.
//! - [`AnalyticsEnvelope`]: the historical / live analytics stream format,
//!   used as scenario baseline input and emitted by the live driver.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::models::{make_event_id, EventEnvelope};
//! use serde_json::json;
//!
//! let envelope = EventEnvelope::new(7, 3, 0, "booking", "booking.created", json!({"success": true}));
//! assert_eq!(envelope.id, make_event_id(7, 3, "booking", "booking.created", 0));
//! assert_eq!(envelope.event.id, envelope.id);
//! ```

use crate::governance::hash::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version stamped on every engine envelope
pub const ENVELOPE_VERSION: u32 = 2;

/// Derive a deterministic event id
///
/// Same inputs → same id; the seed participates so any seed change moves
/// every id.
pub fn make_event_id(seed: u64, tick: u64, domain: &str, event_type: &str, sequence: u32) -> String {
    let digest = sha256_hex(format!("{}:{}:{}:{}:{}", seed, tick, domain, event_type, sequence).as_bytes());
    format!("evt_{}", &digest[..16])
}

/// One domain event inside an engine envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub id: String,
    pub tick: u64,
    pub domain: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

/// Immutable, versioned wrapper produced by the scenario engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: String,
    pub version: u32,
    pub seed: u64,
    pub generated_at_tick: u64,
    pub event: SimEvent,
}

impl EventEnvelope {
    /// Build an envelope, deriving its id from the generation coordinates
    pub fn new(
        seed: u64,
        tick: u64,
        sequence: u32,
        domain: &str,
        event_type: &str,
        payload: Value,
    ) -> Self {
        let id = make_event_id(seed, tick, domain, event_type, sequence);
        Self {
            id: id.clone(),
            version: ENVELOPE_VERSION,
            seed,
            generated_at_tick: tick,
            event: SimEvent {
                id,
                tick,
                domain: domain.to_string(),
                event_type: event_type.to_string(),
                payload,
            },
        }
    }

    pub fn domain(&self) -> &str {
        &self.event.domain
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    /// Numeric payload field, if present
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.event.payload.get(key).and_then(Value::as_f64)
    }

    /// Boolean payload flag (absent counts as false)
    pub fn payload_flag(&self, key: &str) -> bool {
        self.event
            .payload
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl From<&AnalyticsEnvelope> for EventEnvelope {
    /// Lift an analytics envelope into the engine format
    ///
    /// The analytics id is kept, the tick is the logical time and the seed is
    /// zero. A metadata latency hint is copied into the payload when the
    /// payload has none.
    fn from(envelope: &AnalyticsEnvelope) -> Self {
        let mut payload = envelope.event.payload.clone();
        if let (Some(latency), Value::Object(fields)) = (envelope.latency_hint(), &mut payload) {
            fields
                .entry("latencyMs")
                .or_insert_with(|| Value::from(latency));
        }
        let tick = envelope.timebase.logical;
        Self {
            id: envelope.id.clone(),
            version: envelope.version,
            seed: 0,
            generated_at_tick: tick,
            event: SimEvent {
                id: envelope.id.clone(),
                tick,
                domain: envelope.domain().to_string(),
                event_type: envelope.event.event_type.clone(),
                payload,
            },
        }
    }
}

/// Logical and simulated time stamped on analytics envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timebase {
    pub logical: u64,
    pub sim_time: u64,
}

/// Standardized analytics event body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Analytics stream envelope (historical baselines and live traffic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEnvelope {
    pub id: String,
    pub version: u32,
    /// RFC 3339 timestamp from the producer; never read by the engine
    #[serde(default)]
    pub timestamp: String,
    pub timebase: Timebase,
    pub source: String,
    /// Explicit business domain; defaults to the event type prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub event: StandardizedEvent,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnalyticsEnvelope {
    /// Business domain this envelope belongs to
    ///
    /// `booking.created` → `booking` unless `domain` is set explicitly.
    pub fn domain(&self) -> &str {
        match &self.domain {
            Some(domain) => domain,
            None => self
                .event
                .event_type
                .split('.')
                .next()
                .unwrap_or(self.event.event_type.as_str()),
        }
    }

    /// Latency hint carried in metadata, if any
    pub fn latency_hint(&self) -> Option<f64> {
        ["latencyP95Ms", "p95Latency", "latencyP95", "latencyMs"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_f64))
            .or_else(|| {
                self.metadata
                    .get("latency")
                    .and_then(|l| l.get("p95"))
                    .and_then(Value::as_f64)
            })
    }
}
