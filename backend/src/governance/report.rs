//! Replay diff report
//!
//! Compares a baseline envelope stream with one or more variants: event
//! counts per `(domain, type)`, metric snapshot deltas, a markdown summary
//! and a `report_hash` that ignores the run id so two reports over the same
//! streams hash identically.

use super::hash::{canonical_hash, HashError};
use crate::metrics::{extract, MetricId, MetricSnapshot};
use crate::models::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named envelope stream
#[derive(Debug, Clone, Copy)]
pub struct NamedRun<'a> {
    pub name: &'a str,
    pub events: &'a [EventEnvelope],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub name: String,
    pub total_events: usize,
    pub events_by_domain: BTreeMap<String, usize>,
    pub events_by_type: BTreeMap<String, usize>,
    pub metrics: MetricSnapshot,
}

impl RunSummary {
    fn of(run: &NamedRun<'_>) -> Self {
        let mut events_by_domain = BTreeMap::new();
        let mut events_by_type = BTreeMap::new();
        for envelope in run.events {
            *events_by_domain.entry(envelope.domain().to_string()).or_insert(0) += 1;
            *events_by_type.entry(envelope.event_type().to_string()).or_insert(0) += 1;
        }
        Self {
            name: run.name.to_string(),
            total_events: run.events.len(),
            events_by_domain,
            events_by_type,
            metrics: extract(run.events),
        }
    }
}

/// Count difference for one `(domain, type)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDiff {
    pub domain: String,
    pub event_type: String,
    pub baseline_count: usize,
    pub variant_count: usize,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetricDelta {
    pub metric: MetricId,
    pub baseline_value: f64,
    pub variant_value: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDiff {
    pub variant_name: String,
    pub event_diffs: Vec<EventDiff>,
    pub metric_deltas: Vec<ReportMetricDelta>,
}

fn pair_counts(events: &[EventEnvelope]) -> BTreeMap<(String, String), usize> {
    let mut counts = BTreeMap::new();
    for envelope in events {
        *counts
            .entry((envelope.domain().to_string(), envelope.event_type().to_string()))
            .or_insert(0) += 1;
    }
    counts
}

/// Differing `(domain, type)` counts, sorted by domain then type
fn event_diffs(baseline: &[EventEnvelope], variant: &[EventEnvelope]) -> Vec<EventDiff> {
    let base = pair_counts(baseline);
    let var = pair_counts(variant);
    let mut keys: Vec<&(String, String)> = base.keys().chain(var.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let baseline_count = base.get(key).copied().unwrap_or(0);
            let variant_count = var.get(key).copied().unwrap_or(0);
            (baseline_count != variant_count).then(|| EventDiff {
                domain: key.0.clone(),
                event_type: key.1.clone(),
                baseline_count,
                variant_count,
                delta: variant_count as i64 - baseline_count as i64,
            })
        })
        .collect()
}

fn metric_deltas(baseline: &MetricSnapshot, variant: &MetricSnapshot) -> Vec<ReportMetricDelta> {
    MetricId::ALL
        .iter()
        .filter_map(|&metric| {
            let (b, v) = (baseline.get(metric), variant.get(metric));
            (b != v).then_some(ReportMetricDelta {
                metric,
                baseline_value: b,
                variant_value: v,
                delta: v - b,
            })
        })
        .collect()
}

/// Hashed portion of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    pub seed: u64,
    pub from_tick: u64,
    pub to_tick: u64,
    pub baseline_summary: RunSummary,
    pub variant_summaries: Vec<RunSummary>,
    pub diffs: Vec<VariantDiff>,
}

/// Complete replay diff report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub run_id: String,
    #[serde(flatten)]
    pub body: ReportBody,
    pub markdown_summary: String,
    pub report_hash: String,
}

/// Rows shown per event-diff table
const MAX_EVENT_ROWS: usize = 10;

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{}", value)
    } else {
        value.to_string()
    }
}

fn markdown(run_id: &str, body: &ReportBody) -> String {
    let mut lines = vec![
        "# Replay Report".to_string(),
        String::new(),
        format!("- **Run ID**: {}", run_id),
        format!("- **Seed**: {}", body.seed),
        format!("- **Tick Range**: {} → {}", body.from_tick, body.to_tick),
        format!("- **Baseline Events**: {}", body.baseline_summary.total_events),
        String::new(),
    ];

    for summary in &body.variant_summaries {
        lines.push(format!("## Variant: {}", summary.name));
        lines.push(format!("- **Total Events**: {}", summary.total_events));
        lines.push(format!(
            "- **Delta**: {}",
            signed(summary.total_events as i64 - body.baseline_summary.total_events as i64)
        ));
        lines.push(String::new());
    }

    for diff in &body.diffs {
        if diff.event_diffs.is_empty() && diff.metric_deltas.is_empty() {
            continue;
        }
        lines.push(format!("### {} - Differences", diff.variant_name));
        lines.push(String::new());

        if !diff.event_diffs.is_empty() {
            lines.push("#### Event Diffs".to_string());
            lines.push(String::new());
            lines.push("| Domain | Type | Baseline | Variant | Delta |".to_string());
            lines.push("|--------|------|----------|---------|-------|".to_string());
            let mut top: Vec<&EventDiff> = diff.event_diffs.iter().collect();
            // Stable sort keeps domain/type order among equal magnitudes.
            top.sort_by_key(|d| std::cmp::Reverse(d.delta.unsigned_abs()));
            for event_diff in top.into_iter().take(MAX_EVENT_ROWS) {
                lines.push(format!(
                    "| {} | {} | {} | {} | {} |",
                    event_diff.domain,
                    event_diff.event_type,
                    event_diff.baseline_count,
                    event_diff.variant_count,
                    signed(event_diff.delta)
                ));
            }
            if diff.event_diffs.len() > MAX_EVENT_ROWS {
                lines.push(format!(
                    "\n_... and {} more event differences_",
                    diff.event_diffs.len() - MAX_EVENT_ROWS
                ));
            }
            lines.push(String::new());
        }

        if !diff.metric_deltas.is_empty() {
            lines.push("#### Metric Deltas".to_string());
            lines.push(String::new());
            lines.push("| Metric | Baseline | Variant | Delta |".to_string());
            lines.push("|--------|----------|---------|-------|".to_string());
            for delta in &diff.metric_deltas {
                let sign = if delta.delta > 0.0 { "+" } else { "" };
                lines.push(format!(
                    "| {} | {:.2} | {:.2} | {}{:.2} |",
                    delta.metric, delta.baseline_value, delta.variant_value, sign, delta.delta
                ));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

impl ReplayReport {
    /// Build the report for `baseline` against each of `variants`
    pub fn generate(
        run_id: &str,
        seed: u64,
        from_tick: u64,
        to_tick: u64,
        baseline: NamedRun<'_>,
        variants: &[NamedRun<'_>],
    ) -> Result<Self, HashError> {
        let baseline_summary = RunSummary::of(&baseline);
        let variant_summaries: Vec<RunSummary> = variants.iter().map(RunSummary::of).collect();
        let diffs = variants
            .iter()
            .zip(&variant_summaries)
            .map(|(variant, summary)| VariantDiff {
                variant_name: variant.name.to_string(),
                event_diffs: event_diffs(baseline.events, variant.events),
                metric_deltas: metric_deltas(&baseline_summary.metrics, &summary.metrics),
            })
            .collect();

        let body = ReportBody {
            seed,
            from_tick,
            to_tick,
            baseline_summary,
            variant_summaries,
            diffs,
        };
        let report_hash = canonical_hash(&body)?;
        let markdown_summary = markdown(run_id, &body);

        Ok(Self {
            run_id: run_id.to_string(),
            body,
            markdown_summary,
            report_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream(types: &[(&str, &str)]) -> Vec<EventEnvelope> {
        types
            .iter()
            .enumerate()
            .map(|(i, (domain, t))| EventEnvelope::new(1, 1, i as u32, domain, t, json!({})))
            .collect()
    }

    #[test]
    fn test_event_diffs_only_list_changes() {
        let base = stream(&[("booking", "booking.created"), ("ops", "load.sampled")]);
        let variant = stream(&[
            ("booking", "booking.created"),
            ("booking", "booking.created"),
            ("ops", "load.sampled"),
        ]);
        let diffs = event_diffs(&base, &variant);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].event_type, "booking.created");
        assert_eq!(diffs[0].delta, 1);
    }

    #[test]
    fn test_report_hash_ignores_run_id() {
        let base = stream(&[("booking", "booking.created")]);
        let variant = stream(&[("booking", "booking.dropped")]);
        let variants = [NamedRun {
            name: "drop",
            events: &variant,
        }];
        let baseline = NamedRun {
            name: "baseline",
            events: &base,
        };
        let a = ReplayReport::generate("run-a", 1, 1, 4, baseline, &variants).unwrap();
        let b = ReplayReport::generate("run-b", 1, 1, 4, baseline, &variants).unwrap();
        assert_eq!(a.report_hash, b.report_hash);
        assert_ne!(a.markdown_summary, b.markdown_summary);
        assert!(a.markdown_summary.contains("| booking | booking.dropped | 0 | 1 | +1 |"));
    }
}
