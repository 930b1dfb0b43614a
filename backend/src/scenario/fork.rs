//! Counterfactual forks
//!
//! Runs a scenario twice with the same seed: once as-is (baseline) and once
//! with a single generation parameter perturbed (variant). The perturbation
//! only ever reaches the variant.

use super::engine::{run_with, SimulationRun};
use super::{Scenario, ScenarioError, Shocks, SimulationConfig};
use crate::governance::hash::HashError;
use crate::governance::registry::DomainRegistry;
use crate::governance::replay::{evaluate_replay_variant, ReplayVariantEvaluation, ReplayVariantInput};
use crate::governance::report::{NamedRun, ReplayReport};
use crate::metrics::DialConfig;
use crate::models::average_stress;
use serde::{Deserialize, Serialize};

/// One perturbation of the variant's generation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CounterfactualChange {
    /// Demand shock of `magnitude`
    Demand { magnitude: f64 },
    /// Provider shock of `-|magnitude|`
    Provider { magnitude: f64 },
    /// Cancellation bias of `magnitude`
    Cancellation { magnitude: f64 },
}

impl CounterfactualChange {
    pub fn kind(&self) -> &'static str {
        match self {
            CounterfactualChange::Demand { .. } => "demand",
            CounterfactualChange::Provider { .. } => "provider",
            CounterfactualChange::Cancellation { .. } => "cancellation",
        }
    }

    pub fn magnitude(&self) -> f64 {
        match *self {
            CounterfactualChange::Demand { magnitude }
            | CounterfactualChange::Provider { magnitude }
            | CounterfactualChange::Cancellation { magnitude } => magnitude,
        }
    }

    /// Shocks with this change applied on top of `base`
    pub fn apply(&self, base: Shocks) -> Shocks {
        match *self {
            CounterfactualChange::Demand { magnitude } => Shocks {
                demand: magnitude,
                ..base
            },
            CounterfactualChange::Provider { magnitude } => Shocks {
                provider: -magnitude.abs(),
                ..base
            },
            CounterfactualChange::Cancellation { magnitude } => Shocks {
                cancellation_bias: magnitude,
                ..base
            },
        }
    }

    /// Run-id suffix identifying this change
    pub fn label(&self) -> String {
        format!("fork-{}-{}", self.kind(), self.magnitude())
    }
}

/// Variant minus baseline aggregates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForkDelta {
    /// Difference in summed demand
    pub bookings: f64,
    pub cancellations: i64,
    /// Difference in mean stress
    pub stress: f64,
    /// Difference in envelope count
    pub events: i64,
}

impl ForkDelta {
    fn between(baseline: &SimulationRun, variant: &SimulationRun) -> Self {
        Self {
            bookings: variant.total_demand() - baseline.total_demand(),
            cancellations: variant.total_cancellations() - baseline.total_cancellations(),
            stress: average_stress(&variant.states) - average_stress(&baseline.states),
            events: variant.envelopes.len() as i64 - baseline.envelopes.len() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkResult {
    pub change: CounterfactualChange,
    pub baseline: SimulationRun,
    pub variant: SimulationRun,
    pub delta: ForkDelta,
}

impl ForkResult {
    /// Diff report of the variant against the baseline
    pub fn report(&self) -> Result<ReplayReport, HashError> {
        let horizon = self.baseline.horizon;
        ReplayReport::generate(
            &self.baseline.run_id,
            self.baseline.seed,
            0,
            horizon.saturating_sub(1),
            NamedRun {
                name: "baseline",
                events: &self.baseline.envelopes,
            },
            &[NamedRun {
                name: &self.variant.run_id,
                events: &self.variant.envelopes,
            }],
        )
    }

    /// Score the variant's envelopes against `dials`
    pub fn evaluate(&self, report_hash: &str, dials: &[DialConfig]) -> ReplayVariantEvaluation {
        evaluate_replay_variant(&ReplayVariantInput {
            report_hash,
            base_events: &self.baseline.envelopes,
            variant_events: &self.variant.envelopes,
            dials,
            variant_id: &self.variant.run_id,
        })
    }
}

/// Run baseline and variant and compute their delta
///
/// # Example
///
/// ```rust
/// use sim_governance_core::governance::registry::DomainRegistry;
/// use sim_governance_core::scenario::{fork, CounterfactualChange, Scenario, ScenarioSpec};
///
/// let registry = DomainRegistry::default_simulation();
/// let scenario = Scenario::from_history(ScenarioSpec::new("demo", "Demo", 7), &registry).unwrap();
/// let result = fork(&scenario, &registry, 11, 6, CounterfactualChange::Demand { magnitude: 0.5 }).unwrap();
/// assert_ne!(result.baseline.run_id, result.variant.run_id);
/// assert!(result.variant.run_id.ends_with("-fork-demand-0.5"));
/// ```
pub fn fork(
    scenario: &Scenario,
    registry: &DomainRegistry,
    seed: u64,
    horizon: u64,
    change: CounterfactualChange,
) -> Result<ForkResult, ScenarioError> {
    if !change.magnitude().is_finite() {
        return Err(ScenarioError::Validation(format!(
            "{} change magnitude must be finite",
            change.kind()
        )));
    }

    let baseline = run_with(scenario, registry, &SimulationConfig::new(seed, horizon))?;
    let variant_config = SimulationConfig {
        seed,
        horizon,
        shocks: change.apply(Shocks::default()),
        fork_label: Some(change.label()),
    };
    let variant = run_with(scenario, registry, &variant_config)?;
    let delta = ForkDelta::between(&baseline, &variant);

    tracing::info!(
        baseline = %baseline.run_id,
        variant = %variant.run_id,
        bookings_delta = delta.bookings,
        stress_delta = delta.stress,
        "fork complete"
    );

    Ok(ForkResult {
        change,
        baseline,
        variant,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_shock_is_negative() {
        let shocks = CounterfactualChange::Provider { magnitude: 0.3 }.apply(Shocks::default());
        assert_eq!(shocks.provider, -0.3);
        let shocks = CounterfactualChange::Provider { magnitude: -0.3 }.apply(Shocks::default());
        assert_eq!(shocks.provider, -0.3);
    }

    #[test]
    fn test_change_serde_tag() {
        let change: CounterfactualChange =
            serde_json::from_str(r#"{"kind": "cancellation", "magnitude": 0.2}"#).unwrap();
        assert_eq!(change, CounterfactualChange::Cancellation { magnitude: 0.2 });
        assert_eq!(change.label(), "fork-cancellation-0.2");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let parsed: Result<CounterfactualChange, _> =
            serde_json::from_str(r#"{"kind": "weather", "magnitude": 1.0}"#);
        assert!(parsed.is_err());
    }
}
