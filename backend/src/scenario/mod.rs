//! Scenarios
//!
//! A [`Scenario`] is the frozen input of the deterministic engine: an id, a
//! seed, the historical analytics envelopes the run is calibrated on, and
//! the roster sizes and rate table the engine generates with. Scenarios are
//! only built through [`Scenario::from_history`], which consults the domain
//! registry gate first and never returns a partial scenario.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::governance::registry::DomainRegistry;
//! use sim_governance_core::scenario::{engine, Scenario, ScenarioSpec};
//!
//! let registry = DomainRegistry::default_simulation();
//! let scenario = Scenario::from_history(ScenarioSpec::new("demo", "Demo", 7), &registry).unwrap();
//! let run = engine::run(&scenario, &registry, 99, 4).unwrap();
//! assert_eq!(run.states.len(), 4);
//! ```

pub mod engine;
pub mod fork;
pub mod profile;

use crate::governance::registry::{check_registry, DeprecatedDomainError, DomainRegistry};
use crate::models::{AnalyticsEnvelope, PopulationConfig};
use crate::rates::{RateConfig, RateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::{run, run_with, SimulationRun, ENGINE_DOMAINS};
pub use fork::{fork, CounterfactualChange, ForkDelta, ForkResult};
pub use profile::HistoricalProfile;

/// Scenario construction and engine errors
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("Horizon must be positive")]
    InvalidHorizon,

    #[error(transparent)]
    DeprecatedDomain(#[from] DeprecatedDomainError),

    #[error("Invalid rates: {0}")]
    InvalidRates(#[from] RateError),

    #[error("Invalid scenario: {0}")]
    Validation(String),
}

/// Caller-supplied scenario description (deserialisable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub seed: u64,
    #[serde(default)]
    pub baseline_envelopes: Vec<AnalyticsEnvelope>,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub rates: RateConfig,
}

impl ScenarioSpec {
    /// Spec with no baseline and default roster and rates
    pub fn new(id: &str, label: &str, seed: u64) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            seed,
            baseline_envelopes: Vec::new(),
            population: PopulationConfig::default(),
            rates: RateConfig::default(),
        }
    }

    pub fn with_baseline(mut self, envelopes: Vec<AnalyticsEnvelope>) -> Self {
        self.baseline_envelopes = envelopes;
        self
    }
}

/// Immutable, gate-checked scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    id: String,
    label: String,
    seed: u64,
    baseline_envelopes: Vec<AnalyticsEnvelope>,
    population: PopulationConfig,
    rates: RateConfig,
}

/// Distinct domains of `envelopes`, in first-seen order
fn baseline_domains(envelopes: &[AnalyticsEnvelope]) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    for envelope in envelopes {
        let domain = envelope.domain();
        if !domains.iter().any(|d| d == domain) {
            domains.push(domain.to_string());
        }
    }
    domains
}

impl Scenario {
    /// Build a scenario from historical envelopes
    ///
    /// Fails before anything is built if the rates are invalid or any
    /// baseline domain is blocked by the registry.
    pub fn from_history(spec: ScenarioSpec, registry: &DomainRegistry) -> Result<Self, ScenarioError> {
        if spec.id.trim().is_empty() {
            return Err(ScenarioError::Validation("scenario id must not be empty".to_string()));
        }
        spec.rates.validate()?;
        check_registry(registry, baseline_domains(&spec.baseline_envelopes))?;

        tracing::info!(
            scenario_id = %spec.id,
            seed = spec.seed,
            baseline = spec.baseline_envelopes.len(),
            "scenario constructed"
        );

        Ok(Self {
            id: spec.id,
            label: spec.label,
            seed: spec.seed,
            baseline_envelopes: spec.baseline_envelopes,
            population: spec.population,
            rates: spec.rates,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn baseline_envelopes(&self) -> &[AnalyticsEnvelope] {
        &self.baseline_envelopes
    }

    pub fn population(&self) -> &PopulationConfig {
        &self.population
    }

    pub fn rates(&self) -> &RateConfig {
        &self.rates
    }

    /// Domains referenced by the baseline, in first-seen order
    pub fn domains_used(&self) -> Vec<String> {
        baseline_domains(&self.baseline_envelopes)
    }
}

/// Generation-parameter perturbations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Shocks {
    /// Added to the demand multiplier
    pub demand: f64,
    /// Added to the provider shift
    pub provider: f64,
    /// Added to the cancellation ratio
    pub cancellation_bias: f64,
}

/// Engine parameters for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub seed: u64,
    pub horizon: u64,
    pub shocks: Shocks,
    /// Suffix appended to the run id of a counterfactual variant
    pub fork_label: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            horizon: 24,
            shocks: Shocks::default(),
            fork_label: None,
        }
    }
}

impl SimulationConfig {
    pub fn new(seed: u64, horizon: u64) -> Self {
        Self {
            seed,
            horizon,
            ..Self::default()
        }
    }
}
