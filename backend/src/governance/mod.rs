//! Governance
//!
//! Everything that turns simulated load into auditable decisions:
//! - [`hash`]: canonical JSON + SHA-256 content hashing
//! - [`registry`]: domain registry gate
//! - [`proposals`]: rule-based proposal generation
//! - [`decision`]: rule table and decision evaluator
//! - [`replay`]: replay-variant evaluator
//! - [`report`]: replay diff reports
//! - [`ledger`]: append-only override ledger

pub mod decision;
pub mod hash;
pub mod ledger;
pub mod proposals;
pub mod registry;
pub mod replay;
pub mod report;

pub use decision::{
    evaluate_all_proposals, evaluate_proposal, Decision, GovernanceContext, GovernanceReason,
    OverrideRequirement, Verdict, DEFAULT_RULES,
};
pub use hash::{canonical_hash, HashError};
pub use ledger::{
    validate_override, LedgerError, OverrideActor, OverrideDraft, OverrideLedger, OverrideRecord,
    OverrideStore,
};
pub use proposals::{generate_proposals, Proposal, ProposalConfig, ProposalSource};
pub use registry::{check_registry, DeprecatedDomainError, DomainRegistry, Stability};
pub use replay::{
    compute_metric_deltas, evaluate_replay_variant, DeltaDirection, MetricDelta, ReplayDeltas,
    ReplayVariantEvaluation, ReplayVariantInput,
};
pub use report::{NamedRun, ReplayReport};
