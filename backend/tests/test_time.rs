//! Tests for LogicalClock

use sim_governance_core::core::time::DEFAULT_TICK_MS;
use sim_governance_core::LogicalClock;

#[test]
fn test_clock_new() {
    let clock = LogicalClock::new(DEFAULT_TICK_MS);
    assert_eq!(clock.current_tick(), 0);
    assert_eq!(clock.sim_time_ms(), 0);
    assert_eq!(clock.tick_ms(), 60_000);
}

#[test]
fn test_advance_tick_returns_new_tick() {
    let mut clock = LogicalClock::default();

    assert_eq!(clock.advance_tick(), 1);
    assert_eq!(clock.advance_tick(), 2);
    assert_eq!(clock.current_tick(), 2);
    assert_eq!(clock.sim_time_ms(), 120_000);
}

#[test]
fn test_sim_time_is_tick_times_delta() {
    let mut clock = LogicalClock::new(500);
    for _ in 0..7 {
        clock.advance_tick();
    }
    assert_eq!(clock.sim_time_ms(), 3_500);
    assert_eq!(clock.sim_time_at(10), 5_000);
}

#[test]
fn test_starting_at() {
    let clock = LogicalClock::starting_at(42, DEFAULT_TICK_MS);
    assert_eq!(clock.current_tick(), 42);
    assert_eq!(clock.sim_time_ms(), 42 * 60_000);
}

#[test]
#[should_panic(expected = "tick_ms must be positive")]
fn test_zero_tick_ms_panics() {
    LogicalClock::new(0);
}

#[test]
fn test_clock_serde() {
    let mut clock = LogicalClock::new(1_000);
    clock.advance_tick();
    let json = serde_json::to_string(&clock).unwrap();
    let back: LogicalClock = serde_json::from_str(&json).unwrap();
    assert_eq!(back, clock);
}
