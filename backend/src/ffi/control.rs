//! PyO3 wrapper for the control plane
//!
//! # Example (from Python)
//!
//! ```python
//! from sim_governance_core import ControlPlane
//!
//! plane = ControlPlane()
//! plane.start()
//! plane.ingest(json.dumps(envelopes))
//! for proposal in json.loads(plane.proposals()):
//!     print(proposal["id"], proposal["action"])
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use super::types::{control_err, from_json, to_json};
use crate::control::{ControlPlane, ControlPlaneConfig, OverrideSubmission};
use crate::governance::registry::DomainRegistry;
use crate::metrics::DialConfig;
use crate::models::{AnalyticsEnvelope, EventEnvelope};
use crate::scenario::{self, Scenario, ScenarioSpec};

#[pyclass(name = "ControlPlane")]
pub struct PyControlPlane {
    inner: ControlPlane,
}

#[pymethods]
impl PyControlPlane {
    /// Create a control plane; `config_json` defaults every field it omits
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config: ControlPlaneConfig = match config_json {
            Some(json) => from_json(json, "control plane config")?,
            None => ControlPlaneConfig::default(),
        };
        Ok(Self {
            inner: ControlPlane::new(config),
        })
    }

    fn start(&self) {
        self.inner.start();
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn status(&self) -> PyResult<String> {
        to_json(&self.inner.status())
    }

    fn proposals(&self) -> PyResult<String> {
        to_json(&self.inner.proposals())
    }

    fn decision(&self, proposal_id: &str) -> PyResult<Option<String>> {
        self.inner
            .decision(proposal_id)
            .map(|d| to_json(&d))
            .transpose()
    }

    /// Ingest a JSON array of engine envelopes; returns the new decisions
    fn ingest(&self, envelopes_json: &str) -> PyResult<String> {
        let envelopes: Vec<EventEnvelope> = from_json(envelopes_json, "envelopes")?;
        let decisions = self.inner.ingest(envelopes).map_err(control_err)?;
        to_json(&decisions)
    }

    /// Ingest a JSON array of live analytics envelopes
    fn ingest_live(&self, envelopes_json: &str) -> PyResult<String> {
        let envelopes: Vec<AnalyticsEnvelope> = from_json(envelopes_json, "live envelopes")?;
        let decisions = self.inner.ingest_live(&envelopes).map_err(control_err)?;
        to_json(&decisions)
    }

    fn update_dials(&self, dials_json: &str) -> PyResult<String> {
        let dials: Vec<DialConfig> = from_json(dials_json, "dials")?;
        let snapshot = self.inner.update_dials(dials).map_err(control_err)?;
        to_json(&snapshot)
    }

    /// Submit an override; errors raise ValueError carrying `{code, message}`
    fn submit_override(&self, submission_json: &str) -> PyResult<String> {
        let submission: OverrideSubmission = from_json(submission_json, "override")?;
        let record = self.inner.submit_override(submission).map_err(control_err)?;
        to_json(&record)
    }

    fn overrides_for(&self, proposal_id: &str) -> PyResult<String> {
        to_json(&self.inner.overrides_for(proposal_id))
    }
}

/// Run a scenario end to end and return the run as JSON
///
/// Uses the default simulation registry unless `registry_json` is given.
#[pyfunction]
#[pyo3(signature = (spec_json, seed, horizon, registry_json=None))]
pub fn run_scenario(spec_json: &str, seed: u64, horizon: u64, registry_json: Option<&str>) -> PyResult<String> {
    let spec: ScenarioSpec = from_json(spec_json, "scenario")?;
    let registry: DomainRegistry = match registry_json {
        Some(json) => from_json(json, "registry")?,
        None => DomainRegistry::default_simulation(),
    };
    let run = Scenario::from_history(spec, &registry)
        .and_then(|s| scenario::run(&s, &registry, seed, horizon))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    to_json(&run)
}
