//! Market state
//!
//! Per-tick snapshot derived by the scenario engine. One [`MarketState`] is
//! recorded per simulated tick; the sequence is part of a run's identity
//! and must compare equal across replays with identical inputs.
//!
//! # Critical Invariants
//!
//! 1. `tick == logical_time` (the engine starts at tick 0)
//! 2. `providers_available >= 1`
//! 3. `stress_index` and `utilization` lie in [0, 1]
//! 4. `queue_depth >= 0`

use serde::{Deserialize, Serialize};

/// Aggregate market conditions at the end of one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub tick: u64,
    pub logical_time: u64,
    pub sim_time: u64,
    /// Requested bookings this tick (fractional: rounded to 0.1)
    pub demand_level: f64,
    pub providers_available: f64,
    /// Booking attempts that went through this tick
    pub bookings: u32,
    /// Booking attempts that were dropped this tick
    pub drops: u32,
    pub cancellations: u32,
    pub no_shows: u32,
    pub retries: u32,
    pub stress_index: f64,
    pub queue_depth: f64,
    pub utilization: f64,
}

impl MarketState {
    /// Opening state before the first tick, seeded from the profile's first bucket
    pub fn opening(demand_level: f64, providers_available: f64, cancellations: u32) -> Self {
        Self {
            tick: 0,
            logical_time: 0,
            sim_time: 0,
            demand_level,
            providers_available: providers_available.max(1.0),
            bookings: 0,
            drops: 0,
            cancellations,
            no_shows: 0,
            retries: 0,
            stress_index: 0.0,
            queue_depth: 0.0,
            utilization: 0.0,
        }
    }
}

/// Mean stress across a run's states (0 for an empty slice)
pub fn average_stress(states: &[MarketState]) -> f64 {
    if states.is_empty() {
        return 0.0;
    }
    states.iter().map(|s| s.stress_index).sum::<f64>() / states.len() as f64
}
