//! Historical profile
//!
//! Per-bucket demand, cancellation and provider counts read from baseline
//! analytics envelopes. Buckets are keyed by `timebase.logical`; the engine
//! cycles through them by tick.

use crate::models::AnalyticsEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback latency when the baseline carries no latency hints
pub const DEFAULT_LATENCY_MS: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalProfile {
    pub demand_per_tick: Vec<u32>,
    pub cancellations_per_tick: Vec<u32>,
    pub providers_per_tick: Vec<u32>,
    pub avg_latency_ms: f64,
}

impl Default for HistoricalProfile {
    fn default() -> Self {
        Self {
            demand_per_tick: vec![1],
            cancellations_per_tick: vec![0],
            providers_per_tick: vec![1],
            avg_latency_ms: 0.0,
        }
    }
}

#[derive(Default)]
struct Bucket {
    bookings: u32,
    cancellations: u32,
    providers: u32,
}

fn cycle(values: &[u32], tick: u64) -> u32 {
    if values.is_empty() {
        return 0;
    }
    values[(tick % values.len() as u64) as usize]
}

impl HistoricalProfile {
    /// Derive a profile from baseline envelopes (empty input gives the default)
    pub fn derive(envelopes: &[AnalyticsEnvelope]) -> Self {
        if envelopes.is_empty() {
            return Self::default();
        }

        let mut buckets: BTreeMap<u64, Bucket> = BTreeMap::new();
        let mut latency_sum = 0.0;
        let mut latency_count = 0usize;

        for envelope in envelopes {
            let bucket = buckets.entry(envelope.timebase.logical).or_default();
            match envelope.event.event_type.as_str() {
                "booking.created" => bucket.bookings += 1,
                "booking.cancelled" => bucket.cancellations += 1,
                "provider.updated" => bucket.providers += 1,
                _ => {}
            }
            if let Some(latency) = envelope.latency_hint() {
                latency_sum += latency;
                latency_count += 1;
            }
        }

        Self {
            demand_per_tick: buckets.values().map(|b| b.bookings).collect(),
            cancellations_per_tick: buckets.values().map(|b| b.cancellations).collect(),
            providers_per_tick: buckets.values().map(|b| b.providers).collect(),
            avg_latency_ms: if latency_count == 0 {
                0.0
            } else {
                latency_sum / latency_count as f64
            },
        }
    }

    /// Baseline demand for `tick` (never below 1)
    pub fn demand_at(&self, tick: u64) -> f64 {
        f64::from(cycle(&self.demand_per_tick, tick).max(1))
    }

    pub fn cancellations_at(&self, tick: u64) -> f64 {
        f64::from(cycle(&self.cancellations_per_tick, tick))
    }

    /// Baseline providers for `tick`; falls back to the first bucket, then 1
    pub fn providers_at(&self, tick: u64) -> f64 {
        let value = match cycle(&self.providers_per_tick, tick) {
            0 => self.providers_per_tick.first().copied().unwrap_or(0),
            n => n,
        };
        f64::from(value.max(1))
    }

    /// Average latency, or [`DEFAULT_LATENCY_MS`] when none was observed
    pub fn latency_baseline(&self) -> f64 {
        if self.avg_latency_ms > 0.0 {
            self.avg_latency_ms
        } else {
            DEFAULT_LATENCY_MS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StandardizedEvent, Timebase};
    use serde_json::{json, Map};

    fn envelope(logical: u64, event_type: &str, latency: Option<f64>) -> AnalyticsEnvelope {
        let mut metadata = Map::new();
        if let Some(l) = latency {
            metadata.insert("latencyP95Ms".to_string(), json!(l));
        }
        AnalyticsEnvelope {
            id: format!("hist-{}-{}", logical, event_type),
            version: 1,
            timestamp: String::new(),
            timebase: Timebase {
                logical,
                sim_time: logical * 60_000,
            },
            source: "test".to_string(),
            domain: None,
            event: StandardizedEvent {
                event_type: event_type.to_string(),
                payload: json!({}),
            },
            metadata,
        }
    }

    #[test]
    fn test_empty_baseline_defaults() {
        let profile = HistoricalProfile::derive(&[]);
        assert_eq!(profile, HistoricalProfile::default());
        assert_eq!(profile.demand_at(5), 1.0);
        assert_eq!(profile.providers_at(5), 1.0);
    }

    #[test]
    fn test_buckets_by_logical_time() {
        let profile = HistoricalProfile::derive(&[
            envelope(0, "booking.created", Some(200.0)),
            envelope(0, "booking.created", None),
            envelope(1, "booking.cancelled", Some(400.0)),
            envelope(2, "provider.updated", None),
        ]);
        assert_eq!(profile.demand_per_tick, vec![2, 0, 0]);
        assert_eq!(profile.cancellations_per_tick, vec![0, 1, 0]);
        assert_eq!(profile.providers_per_tick, vec![0, 0, 1]);
        assert_eq!(profile.avg_latency_ms, 300.0);
        // Empty demand bucket still yields demand 1.
        assert_eq!(profile.demand_at(1), 1.0);
        assert_eq!(profile.demand_at(3), 2.0);
    }
}
