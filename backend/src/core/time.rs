//! Logical time for the simulation
//!
//! The simulation advances in discrete ticks. Each tick maps to a fixed
//! slice of simulated time, so replays never depend on the wall clock.

use serde::{Deserialize, Serialize};

/// Simulated milliseconds covered by one tick unless configured otherwise.
pub const DEFAULT_TICK_MS: u64 = 60_000;

/// Monotonic logical clock advancing by fixed deltas
///
/// # Example
/// ```
/// use sim_governance_core::LogicalClock;
///
/// let mut clock = LogicalClock::new(60_000);
/// assert_eq!(clock.current_tick(), 0);
/// assert_eq!(clock.sim_time_ms(), 0);
///
/// clock.advance_tick();
/// assert_eq!(clock.current_tick(), 1);
/// assert_eq!(clock.sim_time_ms(), 60_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalClock {
    /// Total ticks elapsed since the clock started
    current_tick: u64,
    /// Simulated milliseconds per tick
    tick_ms: u64,
}

impl LogicalClock {
    /// Create a new clock at tick 0
    ///
    /// # Arguments
    /// * `tick_ms` - Simulated milliseconds covered by one tick
    ///
    /// # Panics
    /// Panics if `tick_ms` is zero.
    pub fn new(tick_ms: u64) -> Self {
        assert!(tick_ms > 0, "tick_ms must be positive");
        Self {
            current_tick: 0,
            tick_ms,
        }
    }

    /// Create a clock positioned at an arbitrary tick (used by replays)
    pub fn starting_at(tick: u64, tick_ms: u64) -> Self {
        let mut clock = Self::new(tick_ms);
        clock.current_tick = tick;
        clock
    }

    /// Advance time by one tick and return the new tick
    pub fn advance_tick(&mut self) -> u64 {
        self.current_tick += 1;
        self.current_tick
    }

    /// Current tick (logical time)
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Simulated time in milliseconds since the clock origin
    pub fn sim_time_ms(&self) -> u64 {
        self.current_tick * self.tick_ms
    }

    /// Simulated time for an arbitrary tick on this clock's scale
    pub fn sim_time_at(&self, tick: u64) -> u64 {
        tick * self.tick_ms
    }

    /// Simulated milliseconds per tick
    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_MS)
    }
}
