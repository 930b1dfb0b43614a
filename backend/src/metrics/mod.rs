//! Metric extraction
//!
//! Reduces a stream of engine envelopes into the closed set of health
//! metrics the dials score. Every function here is pure: same input →
//! same output, and every metric has a defined value for empty input.

pub mod dials;

use crate::models::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use dials::{eval_dials, DialConfig, DialStatus, Zone, DEFAULT_DIALS};

/// Which way a metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Closed enumeration of scored metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricId {
    #[serde(rename = "booking.success_rate")]
    BookingSuccessRate,
    #[serde(rename = "booking.drop_rate")]
    BookingDropRate,
    #[serde(rename = "capacity.utilization")]
    CapacityUtilization,
    #[serde(rename = "trust.violation_rate")]
    TrustViolationRate,
    #[serde(rename = "latency.p95")]
    LatencyP95,
    #[serde(rename = "error.rate")]
    ErrorRate,
}

impl MetricId {
    pub const ALL: [MetricId; 6] = [
        MetricId::BookingSuccessRate,
        MetricId::BookingDropRate,
        MetricId::CapacityUtilization,
        MetricId::TrustViolationRate,
        MetricId::LatencyP95,
        MetricId::ErrorRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricId::BookingSuccessRate => "booking.success_rate",
            MetricId::BookingDropRate => "booking.drop_rate",
            MetricId::CapacityUtilization => "capacity.utilization",
            MetricId::TrustViolationRate => "trust.violation_rate",
            MetricId::LatencyP95 => "latency.p95",
            MetricId::ErrorRate => "error.rate",
        }
    }

    /// Canonical direction of this metric
    pub const fn direction(&self) -> Direction {
        match self {
            MetricId::BookingSuccessRate => Direction::HigherIsBetter,
            _ => Direction::LowerIsBetter,
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric id → value, always populated for every [`MetricId`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSnapshot(BTreeMap<MetricId, f64>);

impl MetricSnapshot {
    /// Snapshot with every metric at the given value
    pub fn filled(value: f64) -> Self {
        Self(MetricId::ALL.iter().map(|id| (*id, value)).collect())
    }

    /// Value for `id` (0 if a caller-built snapshot omitted it)
    pub fn get(&self, id: MetricId) -> f64 {
        self.0.get(&id).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, id: MetricId, value: f64) {
        self.0.insert(id, value);
    }

    /// Builder form of [`MetricSnapshot::set`]
    pub fn with(mut self, id: MetricId, value: f64) -> Self {
        self.set(id, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricId, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for MetricSnapshot {
    fn default() -> Self {
        extract(&[])
    }
}

fn is_booking_attempt(envelope: &EventEnvelope) -> bool {
    envelope.domain() == "booking"
        && matches!(
            envelope.event_type(),
            "booking.created" | "booking.dropped" | "booking.failure"
        )
}

fn is_success(envelope: &EventEnvelope) -> bool {
    envelope.event_type() == "booking.created" || envelope.payload_flag("success")
}

fn is_drop(envelope: &EventEnvelope) -> bool {
    envelope.event_type().contains("drop") || envelope.payload_flag("dropped")
}

fn is_error(envelope: &EventEnvelope) -> bool {
    let t = envelope.event_type();
    t.contains("error")
        || t.contains("failure")
        || t.contains("fault")
        || envelope.payload_flag("error")
        || envelope.payload_flag("failed")
}

fn is_violation(envelope: &EventEnvelope) -> bool {
    envelope.event_type().contains("violation") || envelope.payload_flag("violation")
}

/// Nearest-rank p95 (0 for no samples)
fn p95(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (0.95 * values.len() as f64).ceil() as usize;
    values[rank.saturating_sub(1).min(values.len() - 1)]
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Reduce an envelope stream to a metric snapshot
///
/// # Example
///
/// ```rust
/// use sim_governance_core::metrics::{extract, MetricId};
///
/// let snapshot = extract(&[]);
/// assert_eq!(snapshot.get(MetricId::BookingSuccessRate), 1.0);
/// assert_eq!(snapshot.get(MetricId::ErrorRate), 0.0);
/// ```
pub fn extract(envelopes: &[EventEnvelope]) -> MetricSnapshot {
    let attempts: Vec<&EventEnvelope> = envelopes.iter().filter(|e| is_booking_attempt(e)).collect();
    let successes = attempts.iter().filter(|e| is_success(e)).count();
    let drops = attempts.iter().filter(|e| is_drop(e)).count();

    let (success_rate, drop_rate) = if attempts.is_empty() {
        (1.0, 0.0)
    } else {
        (ratio(successes, attempts.len()), ratio(drops, attempts.len()))
    };

    let utilization_signals: Vec<f64> = envelopes
        .iter()
        .filter_map(|e| e.payload_f64("utilization"))
        .map(|u| u.clamp(0.0, 1.0))
        .collect();
    let utilization = if utilization_signals.is_empty() {
        0.0
    } else {
        utilization_signals.iter().sum::<f64>() / utilization_signals.len() as f64
    };

    let violations = envelopes.iter().filter(|e| is_violation(e)).count();
    let violation_base = if attempts.is_empty() {
        envelopes.len()
    } else {
        attempts.len()
    };

    let mut latencies: Vec<f64> = envelopes
        .iter()
        .filter_map(|e| e.payload_f64("latencyMs").or_else(|| e.payload_f64("latency")))
        .collect();

    let errors = envelopes.iter().filter(|e| is_error(e)).count();

    MetricSnapshot::filled(0.0)
        .with(MetricId::BookingSuccessRate, success_rate)
        .with(MetricId::BookingDropRate, drop_rate)
        .with(MetricId::CapacityUtilization, utilization)
        .with(MetricId::TrustViolationRate, ratio(violations, violation_base))
        .with(MetricId::LatencyP95, p95(&mut latencies))
        .with(MetricId::ErrorRate, ratio(errors, envelopes.len()))
}
