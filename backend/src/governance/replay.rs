//! Replay-variant evaluator
//!
//! Scores a variant replay against its baseline: per-metric deltas whose
//! direction follows each metric's sense of "better", a red-dominant
//! allow flag over the variant's dials, and a summary string that is a pure
//! function of the inputs.

use crate::metrics::dials::red_metrics;
use crate::metrics::{eval_dials, extract, DialConfig, DialStatus, Direction, MetricId, MetricSnapshot};
use crate::models::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Changes smaller than this are noise
pub const DELTA_EPSILON: f64 = 1e-9;

/// Sense of a metric change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaDirection {
    Improved,
    Degraded,
    Neutral,
}

/// Baseline → variant change of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub id: MetricId,
    pub base: f64,
    pub variant: f64,
    pub delta: f64,
    pub direction: DeltaDirection,
}

fn classify(id: MetricId, delta: f64) -> DeltaDirection {
    if delta.abs() < DELTA_EPSILON {
        return DeltaDirection::Neutral;
    }
    let increased = delta > 0.0;
    match (id.direction(), increased) {
        (Direction::HigherIsBetter, true) | (Direction::LowerIsBetter, false) => DeltaDirection::Improved,
        _ => DeltaDirection::Degraded,
    }
}

/// One delta per [`MetricId`], in enumeration order
///
/// # Example
///
/// ```rust
/// use sim_governance_core::governance::replay::{compute_metric_deltas, DeltaDirection};
/// use sim_governance_core::metrics::{MetricId, MetricSnapshot};
///
/// let base = MetricSnapshot::default().with(MetricId::ErrorRate, 0.02);
/// let variant = MetricSnapshot::default().with(MetricId::ErrorRate, 0.01);
/// let deltas = compute_metric_deltas(&base, &variant);
/// let error = deltas.iter().find(|d| d.id == MetricId::ErrorRate).unwrap();
/// assert_eq!(error.direction, DeltaDirection::Improved);
/// ```
pub fn compute_metric_deltas(base: &MetricSnapshot, variant: &MetricSnapshot) -> Vec<MetricDelta> {
    MetricId::ALL
        .iter()
        .map(|&id| {
            let (b, v) = (base.get(id), variant.get(id));
            let delta = v - b;
            MetricDelta {
                id,
                base: b,
                variant: v,
                delta,
                direction: classify(id, delta),
            }
        })
        .collect()
}

/// Inputs to [`evaluate_replay_variant`]
#[derive(Debug, Clone, Copy)]
pub struct ReplayVariantInput<'a> {
    /// Hash of the replay report this variant belongs to
    pub report_hash: &'a str,
    pub base_events: &'a [EventEnvelope],
    pub variant_events: &'a [EventEnvelope],
    pub dials: &'a [DialConfig],
    pub variant_id: &'a str,
}

/// Verdict on a replay variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayVariantEvaluation {
    pub variant_id: String,
    /// False iff any variant dial is red
    pub allowed: bool,
    pub violated: Vec<MetricId>,
    pub summary: String,
    pub deltas: Vec<MetricDelta>,
    pub dials: Vec<DialStatus>,
}

/// Replay deltas as consumed by the decision evaluator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayDeltas {
    pub deltas: Vec<MetricDelta>,
}

impl ReplayDeltas {
    pub fn find(&self, id: MetricId) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.id == id)
    }
}

impl From<&ReplayVariantEvaluation> for ReplayDeltas {
    fn from(evaluation: &ReplayVariantEvaluation) -> Self {
        Self {
            deltas: evaluation.deltas.clone(),
        }
    }
}

fn summarize(
    input: &ReplayVariantInput<'_>,
    allowed: bool,
    violated: &[MetricId],
    deltas: &[MetricDelta],
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "variant {} of report {}: {}",
        input.variant_id,
        input.report_hash,
        if allowed { "allowed" } else { "blocked" }
    );
    if !violated.is_empty() {
        let names: Vec<&str> = violated.iter().map(|m| m.as_str()).collect();
        let _ = write!(out, "; red: {}", names.join(", "));
    }
    let count = |direction: DeltaDirection| deltas.iter().filter(|d| d.direction == direction).count();
    let _ = write!(
        out,
        "; improved {}, degraded {}, neutral {}",
        count(DeltaDirection::Improved),
        count(DeltaDirection::Degraded),
        count(DeltaDirection::Neutral)
    );
    for delta in deltas.iter().filter(|d| d.direction != DeltaDirection::Neutral) {
        let _ = write!(
            out,
            "; {} {:.4} -> {:.4} ({:?})",
            delta.id, delta.base, delta.variant, delta.direction
        );
    }
    out
}

/// Evaluate a variant replay against its baseline
pub fn evaluate_replay_variant(input: &ReplayVariantInput<'_>) -> ReplayVariantEvaluation {
    let base = extract(input.base_events);
    let variant = extract(input.variant_events);

    let dials = eval_dials(&variant, input.dials);
    let violated = red_metrics(&dials);
    let allowed = violated.is_empty();
    let deltas = compute_metric_deltas(&base, &variant);
    let summary = summarize(input, allowed, &violated, &deltas);

    tracing::debug!(variant_id = input.variant_id, allowed, "replay variant evaluated");

    ReplayVariantEvaluation {
        variant_id: input.variant_id.to_string(),
        allowed,
        violated,
        summary,
        deltas,
        dials,
    }
}
