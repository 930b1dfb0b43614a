//! Tests for the replay-variant evaluator

use serde_json::json;
use sim_governance_core::governance::replay::{
    compute_metric_deltas, evaluate_replay_variant, DeltaDirection, ReplayVariantInput,
};
use sim_governance_core::metrics::{MetricId, MetricSnapshot, DEFAULT_DIALS};
use sim_governance_core::EventEnvelope;

fn direction(base: &MetricSnapshot, variant: &MetricSnapshot, id: MetricId) -> DeltaDirection {
    compute_metric_deltas(base, variant)
        .into_iter()
        .find(|d| d.id == id)
        .unwrap()
        .direction
}

fn load(seq: u32, utilization: f64) -> EventEnvelope {
    EventEnvelope::new(1, 0, seq, "ops", "load.sampled", json!({"utilization": utilization, "latencyMs": 100.0}))
}

#[test]
fn test_lower_error_rate_is_improved() {
    let base = MetricSnapshot::default().with(MetricId::ErrorRate, 0.02);
    let better = MetricSnapshot::default().with(MetricId::ErrorRate, 0.01);
    let worse = MetricSnapshot::default().with(MetricId::ErrorRate, 0.03);
    assert_eq!(direction(&base, &better, MetricId::ErrorRate), DeltaDirection::Improved);
    assert_eq!(direction(&base, &worse, MetricId::ErrorRate), DeltaDirection::Degraded);
}

#[test]
fn test_higher_success_rate_is_improved() {
    let base = MetricSnapshot::default().with(MetricId::BookingSuccessRate, 0.9);
    let better = MetricSnapshot::default().with(MetricId::BookingSuccessRate, 0.95);
    assert_eq!(direction(&base, &better, MetricId::BookingSuccessRate), DeltaDirection::Improved);
    assert_eq!(direction(&better, &base, MetricId::BookingSuccessRate), DeltaDirection::Degraded);
}

#[test]
fn test_sub_epsilon_change_is_neutral() {
    let base = MetricSnapshot::default().with(MetricId::LatencyP95, 100.0);
    let variant = MetricSnapshot::default().with(MetricId::LatencyP95, 100.0 + 1e-10);
    assert_eq!(direction(&base, &variant, MetricId::LatencyP95), DeltaDirection::Neutral);
}

#[test]
fn test_red_variant_dial_disallows() {
    let base = vec![load(0, 0.5)];
    let variant = vec![load(0, 0.9)];
    let evaluation = evaluate_replay_variant(&ReplayVariantInput {
        report_hash: "abc123",
        base_events: &base,
        variant_events: &variant,
        dials: &DEFAULT_DIALS,
        variant_id: "v1",
    });
    assert!(!evaluation.allowed);
    assert_eq!(evaluation.violated, vec![MetricId::CapacityUtilization]);
    let utilization = evaluation
        .deltas
        .iter()
        .find(|d| d.id == MetricId::CapacityUtilization)
        .unwrap();
    assert_eq!(utilization.direction, DeltaDirection::Degraded);
}

#[test]
fn test_green_variant_allowed() {
    let base = vec![load(0, 0.6)];
    let variant = vec![load(0, 0.4)];
    let evaluation = evaluate_replay_variant(&ReplayVariantInput {
        report_hash: "abc123",
        base_events: &base,
        variant_events: &variant,
        dials: &DEFAULT_DIALS,
        variant_id: "v2",
    });
    assert!(evaluation.allowed);
    assert!(evaluation.violated.is_empty());
    assert!(evaluation.summary.contains("allowed"));
}

#[test]
fn test_summary_is_pure() {
    let base = vec![load(0, 0.5), load(1, 0.7)];
    let variant = vec![load(0, 0.85)];
    let input = ReplayVariantInput {
        report_hash: "deadbeef",
        base_events: &base,
        variant_events: &variant,
        dials: &DEFAULT_DIALS,
        variant_id: "v3",
    };
    let a = evaluate_replay_variant(&input);
    let b = evaluate_replay_variant(&input);
    assert_eq!(a.summary, b.summary);
    assert_eq!(a, b);
    assert!(a.summary.contains("deadbeef"));
    assert!(a.summary.contains("v3"));
}
