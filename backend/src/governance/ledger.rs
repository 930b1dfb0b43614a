//! Override ledger
//!
//! Append-only store of human overrides. Every record references the
//! decision it overrides by `decision_hash`; validation recomputes that hash
//! from the decision's own inputs so an override of a stale decision is
//! rejected. `override_hash` is always recomputed here from the record's
//! fields and never taken from the caller.
//!
//! # Integrity model
//!
//! Each record is sealed by its own content hash. Records are not chained to
//! each other; [`OverrideLedger::ledger_digest`] gives a single digest over
//! the ordered records for comparing two copies of a ledger.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::governance::decision::{evaluate_proposal, GovernanceContext, Verdict};
//! use sim_governance_core::governance::ledger::{OverrideActor, OverrideDraft, OverrideLedger, OverrideStore};
//! use sim_governance_core::governance::proposals::{Proposal, ProposalSource};
//!
//! let proposal = Proposal::new(1, 5, "booking", "throttle", "test", 0.8, vec![], ProposalSource::Manual);
//! let ctx = GovernanceContext { tick: 5, proposal: proposal.clone(), dials_snapshot: None, replay_evaluation: None };
//! let decision = evaluate_proposal(&ctx).unwrap();
//!
//! let ledger = OverrideLedger::new();
//! let draft = OverrideDraft {
//!     proposal_id: proposal.id.clone(),
//!     decision_hash: decision.decision_hash.clone(),
//!     verdict_after: Verdict::Allow,
//!     justification: "reviewed dials manually".to_string(),
//!     actor: OverrideActor { user_id: "u-1".to_string(), role: "admin".to_string() },
//! };
//! let record = ledger.submit(&proposal, &decision, draft).unwrap();
//! assert_eq!(record.verdict_before, Verdict::Block);
//! assert_eq!(ledger.list().len(), 1);
//! ```

use super::decision::{replayed_decision_hash, Decision, Verdict};
use super::hash::{canonical_hash, HashError};
use super::proposals::Proposal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Override validation failed: {0}")]
    Validation(String),

    #[error("Decision hash mismatch: expected {expected}, got {actual}")]
    DecisionHashMismatch { expected: String, actual: String },

    #[error("Decision {decision_hash} already has an override")]
    DuplicateOverride { decision_hash: String },

    #[error("Override {override_id} failed integrity check")]
    Integrity { override_id: String },

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Who is overriding
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideActor {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub role: String,
}

/// Caller-supplied override request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideDraft {
    pub proposal_id: String,
    pub decision_hash: String,
    pub verdict_after: Verdict,
    pub justification: String,
    pub actor: OverrideActor,
}

/// Stored override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub override_id: String,
    pub proposal_id: String,
    pub decision_hash: String,
    pub verdict_before: Verdict,
    pub verdict_after: Verdict,
    pub actor: OverrideActor,
    pub justification: String,
    pub timestamp: String,
    pub override_hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SealedFields<'a> {
    override_id: &'a str,
    proposal_id: &'a str,
    decision_hash: &'a str,
    verdict_before: Verdict,
    verdict_after: Verdict,
    actor: &'a OverrideActor,
    justification: &'a str,
    timestamp: &'a str,
}

impl OverrideRecord {
    /// Canonical hash over every field except `override_hash`
    pub fn compute_hash(&self) -> Result<String, HashError> {
        canonical_hash(&SealedFields {
            override_id: &self.override_id,
            proposal_id: &self.proposal_id,
            decision_hash: &self.decision_hash,
            verdict_before: self.verdict_before,
            verdict_after: self.verdict_after,
            actor: &self.actor,
            justification: &self.justification,
            timestamp: &self.timestamp,
        })
    }

    fn sealed(mut self) -> Result<Self, HashError> {
        self.override_hash = self.compute_hash()?;
        Ok(self)
    }
}

fn validate_fields(justification: &str, actor: &OverrideActor) -> Result<(), LedgerError> {
    if justification.trim().is_empty() {
        return Err(LedgerError::Validation("justification must not be empty".to_string()));
    }
    if actor.user_id.trim().is_empty() {
        return Err(LedgerError::Validation("actor.userId is required".to_string()));
    }
    if actor.role.trim().is_empty() {
        return Err(LedgerError::Validation("actor.role is required".to_string()));
    }
    Ok(())
}

/// Check an override request against the decision it targets
///
/// The decision's own hash is recomputed from its inputs first, so a
/// decision object that was edited after evaluation is rejected too.
pub fn validate_override(
    proposal: &Proposal,
    decision: &Decision,
    draft: &OverrideDraft,
) -> Result<(), LedgerError> {
    if draft.proposal_id != proposal.id || decision.proposal_id != proposal.id {
        return Err(LedgerError::Validation(format!(
            "proposal id mismatch: override targets {}, decision is for {}",
            draft.proposal_id, decision.proposal_id
        )));
    }

    let recomputed = replayed_decision_hash(
        proposal,
        decision.dials_snapshot.as_deref(),
        decision.tick,
        decision.replay_evaluation.as_ref(),
    )?;
    if recomputed != decision.decision_hash {
        return Err(LedgerError::DecisionHashMismatch {
            expected: recomputed,
            actual: decision.decision_hash.clone(),
        });
    }
    if draft.decision_hash != decision.decision_hash {
        return Err(LedgerError::DecisionHashMismatch {
            expected: decision.decision_hash.clone(),
            actual: draft.decision_hash.clone(),
        });
    }

    validate_fields(&draft.justification, &draft.actor)?;

    if draft.verdict_after == decision.verdict {
        return Err(LedgerError::Validation(format!(
            "override must change the verdict (already {})",
            decision.verdict.as_str()
        )));
    }
    Ok(())
}

/// Append-only override storage
///
/// Implementations must serialise appends so that two overrides of the same
/// decision cannot both be accepted.
pub trait OverrideStore: Send + Sync {
    /// Reseal and store a record; the stored copy is returned
    fn append_override(&self, record: OverrideRecord) -> Result<OverrideRecord, LedgerError>;

    /// All records in append order
    fn list(&self) -> Vec<OverrideRecord>;

    fn for_decision(&self, decision_hash: &str) -> Option<OverrideRecord>;

    fn for_proposal(&self, proposal_id: &str) -> Vec<OverrideRecord>;
}

/// In-memory [`OverrideStore`]
#[derive(Debug, Default)]
pub struct OverrideLedger {
    records: Mutex<Vec<OverrideRecord>>,
}

fn push_unique(records: &mut Vec<OverrideRecord>, record: OverrideRecord) -> Result<OverrideRecord, LedgerError> {
    if records.iter().any(|r| r.decision_hash == record.decision_hash) {
        tracing::warn!(decision_hash = %record.decision_hash, "duplicate override rejected");
        return Err(LedgerError::DuplicateOverride {
            decision_hash: record.decision_hash,
        });
    }
    let record = record.sealed()?;
    records.push(record.clone());
    tracing::info!(
        override_id = %record.override_id,
        proposal_id = %record.proposal_id,
        verdict_after = record.verdict_after.as_str(),
        "override appended"
    );
    Ok(record)
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously exported records without resealing them
    ///
    /// Use [`OverrideLedger::verify`] to audit the loaded records.
    pub fn from_records(records: Vec<OverrideRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Validate and append with a fresh id and the current UTC time
    pub fn submit(
        &self,
        proposal: &Proposal,
        decision: &Decision,
        draft: OverrideDraft,
    ) -> Result<OverrideRecord, LedgerError> {
        let override_id = format!("ovr_{}", Uuid::new_v4().simple());
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.submit_with(proposal, decision, draft, override_id, timestamp)
    }

    /// Validate and append with a caller-chosen id and timestamp
    ///
    /// Validation, the duplicate check and the push happen under one lock.
    pub fn submit_with(
        &self,
        proposal: &Proposal,
        decision: &Decision,
        draft: OverrideDraft,
        override_id: String,
        timestamp: String,
    ) -> Result<OverrideRecord, LedgerError> {
        let mut records = self.records.lock();
        if let Err(err) = validate_override(proposal, decision, &draft) {
            tracing::warn!(proposal_id = %draft.proposal_id, error = %err, "override rejected");
            return Err(err);
        }
        let record = OverrideRecord {
            override_id,
            proposal_id: draft.proposal_id,
            decision_hash: draft.decision_hash,
            verdict_before: decision.verdict,
            verdict_after: draft.verdict_after,
            actor: draft.actor,
            justification: draft.justification,
            timestamp,
            override_hash: String::new(),
        };
        push_unique(&mut records, record)
    }

    /// Recompute every record's hash
    pub fn verify(&self) -> Result<(), LedgerError> {
        for record in self.records.lock().iter() {
            if record.compute_hash()? != record.override_hash {
                return Err(LedgerError::Integrity {
                    override_id: record.override_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Digest over the ordered override hashes
    pub fn ledger_digest(&self) -> Result<String, HashError> {
        let hashes: Vec<String> = self
            .records
            .lock()
            .iter()
            .map(|r| r.override_hash.clone())
            .collect();
        canonical_hash(&hashes)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl OverrideStore for OverrideLedger {
    fn append_override(&self, record: OverrideRecord) -> Result<OverrideRecord, LedgerError> {
        validate_fields(&record.justification, &record.actor)?;
        if record.decision_hash.is_empty() || record.override_id.is_empty() {
            return Err(LedgerError::Validation(
                "override id and decision hash are required".to_string(),
            ));
        }
        let mut records = self.records.lock();
        push_unique(&mut records, record)
    }

    fn list(&self) -> Vec<OverrideRecord> {
        self.records.lock().clone()
    }

    fn for_decision(&self, decision_hash: &str) -> Option<OverrideRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.decision_hash == decision_hash)
            .cloned()
    }

    fn for_proposal(&self, proposal_id: &str) -> Vec<OverrideRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.proposal_id == proposal_id)
            .cloned()
            .collect()
    }
}
