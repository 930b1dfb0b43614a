//! Simulation-Governance Core
//!
//! Deterministic scenario simulation with governance over the decisions it
//! informs.
//!
//! # Architecture
//!
//! - **core**: Logical clock
//! - **rng**: Deterministic random number generation
//! - **models**: Actors, envelopes, market state
//! - **rates**: Frozen and live rate tables
//! - **scenario**: Scenario construction, engine, counterfactual forks
//! - **metrics**: Metric extraction and dial zones
//! - **governance**: Proposals, decisions, replay evaluation, override ledger
//! - **control**: Transport-agnostic control plane
//! - **live**: Live traffic driver
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded RNG, no wall clock in runs)
//! 2. Decision and override hashes never include timestamps
//! 3. The registry gate runs before any generation

// Module declarations
pub mod control;
pub mod core;
pub mod governance;
pub mod live;
pub mod metrics;
pub mod models;
pub mod rates;
pub mod rng;
pub mod scenario;

// Re-exports for convenience
pub use control::{ControlError, ControlPlane, ControlPlaneConfig, ControlStatus, ErrorCode, OverrideSubmission};
pub use core::time::LogicalClock;
pub use governance::{
    evaluate_proposal, evaluate_replay_variant, Decision, DomainRegistry, OverrideLedger, Proposal,
    ReplayReport, Verdict,
};
pub use live::{LiveDriver, LiveDriverConfig, LiveError};
pub use metrics::{extract, DialConfig, MetricId, MetricSnapshot};
pub use models::{AnalyticsEnvelope, EventEnvelope};
pub use rates::{LiveRates, RateConfig};
pub use rng::RngManager;
pub use scenario::{fork, run, CounterfactualChange, Scenario, ScenarioError, ScenarioSpec, SimulationConfig, SimulationRun};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn sim_governance_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::control::PyControlPlane>()?;
    m.add_function(wrap_pyfunction!(ffi::control::run_scenario, m)?)?;
    Ok(())
}
