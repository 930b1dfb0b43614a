//! Control plane
//!
//! Transport-agnostic operations a service wrapper exposes: simulation
//! status, pending proposals, and override submission. Ingested envelopes
//! advance the control-plane tick, refresh the dial snapshot and feed the
//! proposal generator; each new proposal is evaluated immediately so a
//! decision (and its hash) exists before anyone can override it.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::control::{ControlPlane, ControlPlaneConfig, ErrorCode, OverrideSubmission};
//! use sim_governance_core::governance::decision::Verdict;
//!
//! let plane = ControlPlane::new(ControlPlaneConfig::default());
//! let submission = OverrideSubmission {
//!     proposal_id: "prop_x".to_string(),
//!     decision_hash: "abc".to_string(),
//!     verdict_after: Verdict::Allow,
//!     justification: "ok".to_string(),
//!     actor: None,
//! };
//! let err = plane.submit_override(submission).unwrap_err();
//! assert_eq!(err.code(), ErrorCode::SimulationNotRunning);
//! ```

use crate::governance::decision::{evaluate_proposal, Decision, GovernanceContext, Verdict};
use crate::governance::hash::HashError;
use crate::governance::ledger::{LedgerError, OverrideActor, OverrideDraft, OverrideLedger, OverrideRecord, OverrideStore};
use crate::governance::proposals::{generate_proposals, Proposal, ProposalConfig};
use crate::metrics::{eval_dials, extract, DialConfig, DialStatus, DEFAULT_DIALS};
use crate::models::{AnalyticsEnvelope, EventEnvelope};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Pending proposals older than this many ticks are dropped
pub const PROPOSAL_TTL_TICKS: u64 = 100;

/// Stable error codes surfaced to transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    DecisionHashMismatch,
    NotFound,
    SimulationNotRunning,
    DuplicateOverride,
    Internal,
}

/// Structured error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Simulation is not running")]
    NotRunning,

    #[error("Proposal not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ControlError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ControlError::NotRunning => ErrorCode::SimulationNotRunning,
            ControlError::NotFound(_) => ErrorCode::NotFound,
            ControlError::Validation(_) => ErrorCode::ValidationFailed,
            ControlError::Ledger(LedgerError::Validation(_)) => ErrorCode::ValidationFailed,
            ControlError::Ledger(LedgerError::DecisionHashMismatch { .. }) => ErrorCode::DecisionHashMismatch,
            ControlError::Ledger(LedgerError::DuplicateOverride { .. }) => ErrorCode::DuplicateOverride,
            ControlError::Ledger(_) | ControlError::Hash(_) => ErrorCode::Internal,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Control-plane settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    /// Seed folded into proposal ids
    pub seed: u64,
    /// Capacity of the live event buffer
    pub max_events: usize,
    pub recent_window_ticks: u64,
    pub max_proposals_per_tick: usize,
    pub min_confidence: f64,
    pub dials: Vec<DialConfig>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_events: 200,
            recent_window_ticks: 20,
            max_proposals_per_tick: 3,
            min_confidence: 0.5,
            dials: DEFAULT_DIALS.to_vec(),
        }
    }
}

impl ControlPlaneConfig {
    fn proposal_config(&self) -> ProposalConfig {
        ProposalConfig {
            recent_window_ticks: self.recent_window_ticks,
            max_per_tick: self.max_proposals_per_tick,
            min_confidence: self.min_confidence,
            ..ProposalConfig::default()
        }
    }
}

/// Snapshot returned by [`ControlPlane::status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStatus {
    pub running: bool,
    pub tick: u64,
    pub events: Vec<EventEnvelope>,
    pub dials: Vec<DialStatus>,
    pub pending_proposals: usize,
}

/// Override request as received from a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideSubmission {
    pub proposal_id: String,
    pub decision_hash: String,
    pub verdict_after: Verdict,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub actor: Option<OverrideActor>,
}

impl OverrideSubmission {
    fn into_draft(self) -> Result<OverrideDraft, ControlError> {
        let actor = self
            .actor
            .ok_or_else(|| ControlError::Validation("actor is required".to_string()))?;
        Ok(OverrideDraft {
            proposal_id: self.proposal_id,
            decision_hash: self.decision_hash,
            verdict_after: self.verdict_after,
            justification: self.justification,
            actor,
        })
    }
}

#[derive(Debug, Clone)]
struct Pending {
    proposal: Proposal,
    decision: Decision,
}

#[derive(Debug)]
struct State {
    running: bool,
    tick: u64,
    events: VecDeque<EventEnvelope>,
    dials: Vec<DialStatus>,
    proposals: BTreeMap<String, Pending>,
}

/// In-process control plane over an override ledger
#[derive(Debug)]
pub struct ControlPlane {
    config: RwLock<ControlPlaneConfig>,
    state: RwLock<State>,
    ledger: Arc<OverrideLedger>,
}

fn evaluate(proposal: &Proposal, tick: u64, dials: &[DialStatus]) -> Result<Decision, HashError> {
    evaluate_proposal(&GovernanceContext {
        tick,
        proposal: proposal.clone(),
        dials_snapshot: Some(dials.to_vec()),
        replay_evaluation: None,
    })
}

impl ControlPlane {
    pub fn new(config: ControlPlaneConfig) -> Self {
        Self::with_ledger(config, Arc::new(OverrideLedger::new()))
    }

    /// Share an existing ledger
    pub fn with_ledger(config: ControlPlaneConfig, ledger: Arc<OverrideLedger>) -> Self {
        let dials = eval_dials(&extract(&[]), &config.dials);
        Self {
            config: RwLock::new(config),
            state: RwLock::new(State {
                running: false,
                tick: 0,
                events: VecDeque::new(),
                dials,
                proposals: BTreeMap::new(),
            }),
            ledger,
        }
    }

    pub fn start(&self) {
        let mut state = self.state.write();
        state.running = true;
        tracing::info!(tick = state.tick, "control plane started");
    }

    pub fn stop(&self) {
        let mut state = self.state.write();
        state.running = false;
        tracing::info!(tick = state.tick, "control plane stopped");
    }

    pub fn status(&self) -> ControlStatus {
        let state = self.state.read();
        ControlStatus {
            running: state.running,
            tick: state.tick,
            events: state.events.iter().cloned().collect(),
            dials: state.dials.clone(),
            pending_proposals: self.pending(&state).len(),
        }
    }

    fn pending<'a>(&self, state: &'a State) -> Vec<&'a Pending> {
        state
            .proposals
            .values()
            .filter(|p| self.ledger.for_decision(&p.decision.decision_hash).is_none())
            .collect()
    }

    /// Pending proposals (no override yet), sorted by id
    pub fn proposals(&self) -> Vec<Proposal> {
        let state = self.state.read();
        self.pending(&state)
            .into_iter()
            .map(|p| p.proposal.clone())
            .collect()
    }

    /// Current decision for a proposal
    pub fn decision(&self, proposal_id: &str) -> Option<Decision> {
        self.state
            .read()
            .proposals
            .get(proposal_id)
            .map(|p| p.decision.clone())
    }

    /// Advance one tick with a batch of envelopes; returns the new decisions
    ///
    /// Nothing is committed unless every new proposal was evaluated.
    pub fn ingest(&self, envelopes: Vec<EventEnvelope>) -> Result<Vec<Decision>, ControlError> {
        let config = self.config.read().clone();
        let mut state = self.state.write();
        if !state.running {
            return Err(ControlError::NotRunning);
        }

        let tick = state.tick + 1;
        let mut events = state.events.clone();
        events.extend(envelopes);
        while events.len() > config.max_events {
            events.pop_front();
        }

        let buffered: Vec<EventEnvelope> = events.iter().cloned().collect();
        let dials = eval_dials(&extract(&buffered), &config.dials);

        let mut fresh = Vec::new();
        for proposal in generate_proposals(config.seed, tick, &buffered, &config.proposal_config()) {
            let live = state
                .proposals
                .get(&proposal.id)
                .is_some_and(|p| p.proposal.tick + PROPOSAL_TTL_TICKS >= tick);
            if live {
                continue;
            }
            let decision = evaluate(&proposal, tick, &dials)?;
            tracing::debug!(
                proposal_id = %proposal.id,
                verdict = decision.verdict.as_str(),
                "proposal evaluated"
            );
            fresh.push(Pending { proposal, decision });
        }

        state.tick = tick;
        state.events = events;
        state.dials = dials;
        state
            .proposals
            .retain(|_, p| p.proposal.tick + PROPOSAL_TTL_TICKS >= tick);
        let decisions = fresh.iter().map(|p| p.decision.clone()).collect();
        for pending in fresh {
            state.proposals.insert(pending.proposal.id.clone(), pending);
        }
        Ok(decisions)
    }

    /// [`ingest`](Self::ingest) for live-driver output
    ///
    /// Analytics envelopes are lifted into engine envelopes, keeping their
    /// ids, so live failures and latencies reach the dials and proposals.
    pub fn ingest_live(&self, envelopes: &[AnalyticsEnvelope]) -> Result<Vec<Decision>, ControlError> {
        self.ingest(envelopes.iter().map(EventEnvelope::from).collect())
    }

    /// Replace the dial table and re-evaluate every pending decision
    ///
    /// Decisions re-evaluated against different dials get new hashes, so
    /// overrides prepared against the old ones become stale. The table, the
    /// snapshot and the decisions are replaced together or not at all.
    pub fn update_dials(&self, dials: Vec<DialConfig>) -> Result<Vec<DialStatus>, ControlError> {
        if dials.is_empty() {
            return Err(ControlError::Validation("dial table must not be empty".to_string()));
        }
        let mut config = self.config.write();
        let mut state = self.state.write();
        let buffered: Vec<EventEnvelope> = state.events.iter().cloned().collect();
        let snapshot = eval_dials(&extract(&buffered), &dials);

        let tick = state.tick;
        let mut reevaluated = Vec::new();
        for (id, pending) in &state.proposals {
            if self.ledger.for_decision(&pending.decision.decision_hash).is_some() {
                continue;
            }
            reevaluated.push((id.clone(), evaluate(&pending.proposal, tick, &snapshot)?));
        }

        for (id, decision) in reevaluated {
            if let Some(pending) = state.proposals.get_mut(&id) {
                pending.decision = decision;
            }
        }
        state.dials = snapshot.clone();
        config.dials = dials;
        tracing::info!(dials = snapshot.len(), "dial table updated");
        Ok(snapshot)
    }

    /// Validate and record a human override
    pub fn submit_override(&self, submission: OverrideSubmission) -> Result<OverrideRecord, ControlError> {
        let state = self.state.read();
        if !state.running {
            return Err(ControlError::NotRunning);
        }
        let pending = state
            .proposals
            .get(&submission.proposal_id)
            .ok_or_else(|| ControlError::NotFound(submission.proposal_id.clone()))?;
        let draft = submission.into_draft()?;
        let record = self.ledger.submit(&pending.proposal, &pending.decision, draft)?;
        Ok(record)
    }

    pub fn overrides_for(&self, proposal_id: &str) -> Vec<OverrideRecord> {
        self.ledger.for_proposal(proposal_id)
    }

    pub fn ledger(&self) -> &OverrideLedger {
        &self.ledger
    }
}
