//! Decision evaluator
//!
//! Turns `(proposal, dial snapshot, tick)` plus optional replay deltas into a
//! verdict and a content-addressed decision hash. Rules are a data table
//! walked in order; a missing dial snapshot fails closed.
//!
//! # Hashes
//!
//! - `decision_hash` covers `(proposal, dials_snapshot, tick)`, plus the
//!   replay deltas when a replay was supplied. It is the anchor the override
//!   ledger recomputes to detect staleness, so it covers every input that can
//!   move the verdict.
//! - `inputs_hash` covers the same material with the replay slot always
//!   present (null when absent).
//!
//! Neither contains timestamps, so both are reproducible from their inputs.

use super::hash::{canonical_hash, HashError};
use super::proposals::Proposal;
use super::replay::{DeltaDirection, ReplayDeltas};
use crate::metrics::{dials::red_metrics, DialStatus, MetricId, Zone};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Trust violation rate increase that blocks
pub const TRUST_REGRESSION_THRESHOLD: f64 = 0.01;
/// Error rate increase that blocks
pub const ERROR_RATE_REGRESSION_THRESHOLD: f64 = 0.02;
/// Relative latency p95 increase that warns
pub const LATENCY_REGRESSION_THRESHOLD: f64 = 0.05;

/// Automated verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Warn,
    Block,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Warn => "warn",
            Verdict::Block => "block",
        }
    }
}

/// Severity of a single rule hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Block,
}

impl From<Severity> for Verdict {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warn => Verdict::Warn,
            Severity::Block => Verdict::Block,
        }
    }
}

/// Why a rule fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceReason {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub evidence: Value,
}

/// Human sign-off a decision demands before it may proceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequirement {
    pub reason: String,
    pub role_required: String,
    pub expires_after_ticks: u64,
}

/// Everything a decision is computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceContext {
    pub tick: u64,
    pub proposal: Proposal,
    #[serde(default)]
    pub dials_snapshot: Option<Vec<DialStatus>>,
    #[serde(default)]
    pub replay_evaluation: Option<ReplayDeltas>,
}

/// Output of one rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub reason: GovernanceReason,
    pub override_requirement: Option<OverrideRequirement>,
}

/// Entry in the rule table
#[derive(Clone, Copy)]
pub struct GovernanceRule {
    pub id: &'static str,
    pub description: &'static str,
    pub evaluate: fn(&GovernanceContext) -> Option<RuleHit>,
}

impl std::fmt::Debug for GovernanceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceRule").field("id", &self.id).finish()
    }
}

/// Rule table, evaluated in order
pub const DEFAULT_RULES: [GovernanceRule; 6] = [
    GovernanceRule {
        id: "block-on-red-dial",
        description: "Block if any dial status is red",
        evaluate: block_on_red_dial,
    },
    GovernanceRule {
        id: "block-on-trust-regression",
        description: "Block if trust violation rate regression exceeds threshold",
        evaluate: block_on_trust_regression,
    },
    GovernanceRule {
        id: "block-on-error-rate-regression",
        description: "Block if error rate regression exceeds threshold",
        evaluate: block_on_error_rate_regression,
    },
    GovernanceRule {
        id: "warn-on-yellow-dial",
        description: "Warn if any dial status is yellow",
        evaluate: warn_on_yellow_dial,
    },
    GovernanceRule {
        id: "warn-on-latency-regression",
        description: "Warn if latency p95 regression exceeds threshold",
        evaluate: warn_on_latency_regression,
    },
    GovernanceRule {
        id: "require-override-for-apply",
        description: "Require override for apply/promote/execute actions",
        evaluate: require_override_for_apply,
    },
];

fn hit(rule_id: &str, severity: Severity, message: String, evidence: Value) -> Option<RuleHit> {
    Some(RuleHit {
        reason: GovernanceReason {
            rule_id: rule_id.to_string(),
            severity,
            message,
            evidence,
        },
        override_requirement: None,
    })
}

fn dials_in_zone(ctx: &GovernanceContext, zone: Zone) -> Vec<&DialStatus> {
    ctx.dials_snapshot
        .iter()
        .flatten()
        .filter(|d| d.zone == zone)
        .collect()
}

fn zone_evidence(dials: &[&DialStatus]) -> Value {
    Value::Array(
        dials
            .iter()
            .map(|d| json!({"metric": d.metric, "value": d.value}))
            .collect(),
    )
}

fn block_on_red_dial(ctx: &GovernanceContext) -> Option<RuleHit> {
    let red = dials_in_zone(ctx, Zone::Red);
    if red.is_empty() {
        return None;
    }
    hit(
        "block-on-red-dial",
        Severity::Block,
        format!("{} dial(s) in red zone", red.len()),
        json!({"redDials": zone_evidence(&red)}),
    )
}

fn warn_on_yellow_dial(ctx: &GovernanceContext) -> Option<RuleHit> {
    let yellow = dials_in_zone(ctx, Zone::Yellow);
    if yellow.is_empty() {
        return None;
    }
    hit(
        "warn-on-yellow-dial",
        Severity::Warn,
        format!("{} dial(s) in yellow zone", yellow.len()),
        json!({"yellowDials": zone_evidence(&yellow)}),
    )
}

/// Degraded absolute regression of `metric` beyond `threshold`
fn absolute_regression(
    ctx: &GovernanceContext,
    metric: MetricId,
    threshold: f64,
    rule_id: &str,
    label: &str,
) -> Option<RuleHit> {
    let delta = ctx.replay_evaluation.as_ref()?.find(metric)?;
    if delta.direction != DeltaDirection::Degraded || delta.delta.abs() <= threshold {
        return None;
    }
    hit(
        rule_id,
        Severity::Block,
        format!("{} regression exceeds threshold (delta: {:.4})", label, delta.delta),
        json!({
            "base": delta.base,
            "variant": delta.variant,
            "delta": delta.delta,
            "threshold": threshold,
        }),
    )
}

fn block_on_trust_regression(ctx: &GovernanceContext) -> Option<RuleHit> {
    absolute_regression(
        ctx,
        MetricId::TrustViolationRate,
        TRUST_REGRESSION_THRESHOLD,
        "block-on-trust-regression",
        "Trust violation rate",
    )
}

fn block_on_error_rate_regression(ctx: &GovernanceContext) -> Option<RuleHit> {
    absolute_regression(
        ctx,
        MetricId::ErrorRate,
        ERROR_RATE_REGRESSION_THRESHOLD,
        "block-on-error-rate-regression",
        "Error rate",
    )
}

fn warn_on_latency_regression(ctx: &GovernanceContext) -> Option<RuleHit> {
    let delta = ctx.replay_evaluation.as_ref()?.find(MetricId::LatencyP95)?;
    if delta.direction != DeltaDirection::Degraded || delta.base == 0.0 {
        return None;
    }
    let relative = (delta.delta / delta.base).abs();
    if relative <= LATENCY_REGRESSION_THRESHOLD {
        return None;
    }
    hit(
        "warn-on-latency-regression",
        Severity::Warn,
        format!(
            "Latency p95 regression exceeds threshold ({:.1}% increase)",
            relative * 100.0
        ),
        json!({
            "base": delta.base,
            "variant": delta.variant,
            "delta": delta.delta,
            "percentIncrease": relative,
            "threshold": LATENCY_REGRESSION_THRESHOLD,
        }),
    )
}

fn require_override_for_apply(ctx: &GovernanceContext) -> Option<RuleHit> {
    let action = ctx.proposal.action.to_lowercase();
    if !["apply", "promote", "execute"].iter().any(|verb| action.contains(verb)) {
        return None;
    }
    let mut rule_hit = hit(
        "require-override-for-apply",
        Severity::Warn,
        "Action suggests apply/promote/execute; override required".to_string(),
        json!({"action": ctx.proposal.action}),
    )?;
    rule_hit.override_requirement = Some(OverrideRequirement {
        reason: "Action requires explicit approval for apply/promote/execute operations".to_string(),
        role_required: "admin".to_string(),
        expires_after_ticks: 100,
    });
    Some(rule_hit)
}

/// Automated verdict plus its integrity anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub decision_hash: String,
    pub inputs_hash: String,
    pub verdict: Verdict,
    pub violated: Vec<MetricId>,
    pub reasons: Vec<GovernanceReason>,
    pub required_overrides: Vec<OverrideRequirement>,
    pub tick: u64,
    pub proposal_id: String,
    pub dials_snapshot: Option<Vec<DialStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_evaluation: Option<ReplayDeltas>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecisionMaterial<'a> {
    proposal: &'a Proposal,
    dials_snapshot: Option<&'a [DialStatus]>,
    tick: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_deltas: Option<&'a ReplayDeltas>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputsMaterial<'a> {
    proposal: &'a Proposal,
    dials_snapshot: Option<&'a [DialStatus]>,
    tick: u64,
    replay_deltas: Option<&'a ReplayDeltas>,
}

/// Canonical hash of `(proposal, dials_snapshot, tick)`
pub fn decision_hash(
    proposal: &Proposal,
    dials_snapshot: Option<&[DialStatus]>,
    tick: u64,
) -> Result<String, HashError> {
    replayed_decision_hash(proposal, dials_snapshot, tick, None)
}

/// Decision hash that also covers replay deltas when present
///
/// With `replay_deltas == None` this equals [`decision_hash`].
pub fn replayed_decision_hash(
    proposal: &Proposal,
    dials_snapshot: Option<&[DialStatus]>,
    tick: u64,
    replay_deltas: Option<&ReplayDeltas>,
) -> Result<String, HashError> {
    canonical_hash(&DecisionMaterial {
        proposal,
        dials_snapshot,
        tick,
        replay_deltas,
    })
}

fn inputs_hash(ctx: &GovernanceContext) -> Result<String, HashError> {
    canonical_hash(&InputsMaterial {
        proposal: &ctx.proposal,
        dials_snapshot: ctx.dials_snapshot.as_deref(),
        tick: ctx.tick,
        replay_deltas: ctx.replay_evaluation.as_ref(),
    })
}

/// Evaluate one proposal against a rule table
pub fn evaluate_with_rules(ctx: &GovernanceContext, rules: &[GovernanceRule]) -> Result<Decision, HashError> {
    let mut reasons = Vec::new();
    let mut required_overrides = Vec::new();

    let dials_missing = ctx.dials_snapshot.as_ref().map_or(true, |d| d.is_empty());
    if dials_missing {
        reasons.push(GovernanceReason {
            rule_id: "missing-dials".to_string(),
            severity: Severity::Block,
            message: "Dial snapshot missing; failing closed".to_string(),
            evidence: Value::Null,
        });
    }

    for rule in rules {
        if let Some(rule_hit) = (rule.evaluate)(ctx) {
            tracing::debug!(rule = rule.id, proposal_id = %ctx.proposal.id, "governance rule fired");
            reasons.push(rule_hit.reason);
            required_overrides.extend(rule_hit.override_requirement);
        }
    }

    let verdict = reasons
        .iter()
        .map(|r| Verdict::from(r.severity))
        .max()
        .unwrap_or(Verdict::Allow);

    Ok(Decision {
        decision_hash: replayed_decision_hash(
            &ctx.proposal,
            ctx.dials_snapshot.as_deref(),
            ctx.tick,
            ctx.replay_evaluation.as_ref(),
        )?,
        inputs_hash: inputs_hash(ctx)?,
        verdict,
        violated: red_metrics(ctx.dials_snapshot.as_deref().unwrap_or(&[])),
        reasons,
        required_overrides,
        tick: ctx.tick,
        proposal_id: ctx.proposal.id.clone(),
        dials_snapshot: ctx.dials_snapshot.clone(),
        replay_evaluation: ctx.replay_evaluation.clone(),
    })
}

/// Evaluate one proposal against [`DEFAULT_RULES`]
///
/// # Example
///
/// ```rust
/// use sim_governance_core::governance::decision::{evaluate_proposal, GovernanceContext, Verdict};
/// use sim_governance_core::governance::proposals::{Proposal, ProposalSource};
///
/// let proposal = Proposal::new(1, 10, "booking", "throttle", "test", 0.8, vec![], ProposalSource::Manual);
/// let ctx = GovernanceContext { tick: 10, proposal, dials_snapshot: None, replay_evaluation: None };
/// let decision = evaluate_proposal(&ctx).unwrap();
/// assert_eq!(decision.verdict, Verdict::Block);
/// assert_eq!(decision.reasons[0].rule_id, "missing-dials");
/// ```
pub fn evaluate_proposal(ctx: &GovernanceContext) -> Result<Decision, HashError> {
    evaluate_with_rules(ctx, &DEFAULT_RULES)
}

/// Evaluate many proposals against one dial snapshot; sorted by proposal id
pub fn evaluate_all_proposals(
    tick: u64,
    proposals: &[Proposal],
    dials_snapshot: Option<&[DialStatus]>,
    replay_evaluation: Option<&ReplayDeltas>,
) -> Result<Vec<Decision>, HashError> {
    let mut decisions = proposals
        .iter()
        .map(|proposal| {
            evaluate_proposal(&GovernanceContext {
                tick,
                proposal: proposal.clone(),
                dials_snapshot: dials_snapshot.map(|d| d.to_vec()),
                replay_evaluation: replay_evaluation.cloned(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    decisions.sort_by(|a, b| a.proposal_id.cmp(&b.proposal_id));
    Ok(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::proposals::ProposalSource;

    fn proposal(action: &str) -> Proposal {
        Proposal::new(1, 10, "booking", action, "test", 0.8, vec![], ProposalSource::Manual)
    }

    #[test]
    fn test_rule_table_order() {
        let ids: Vec<_> = DEFAULT_RULES.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                "block-on-red-dial",
                "block-on-trust-regression",
                "block-on-error-rate-regression",
                "warn-on-yellow-dial",
                "warn-on-latency-regression",
                "require-override-for-apply",
            ]
        );
    }

    #[test]
    fn test_verdict_ordering() {
        assert!(Verdict::Block > Verdict::Warn);
        assert!(Verdict::Warn > Verdict::Allow);
    }

    #[test]
    fn test_empty_dials_fail_closed() {
        let ctx = GovernanceContext {
            tick: 1,
            proposal: proposal("throttle"),
            dials_snapshot: Some(vec![]),
            replay_evaluation: None,
        };
        let decision = evaluate_proposal(&ctx).unwrap();
        assert_eq!(decision.verdict, Verdict::Block);
    }

    #[test]
    fn test_decision_hash_covers_replay_deltas() {
        let base = GovernanceContext {
            tick: 1,
            proposal: proposal("throttle"),
            dials_snapshot: None,
            replay_evaluation: None,
        };
        let with_replay = GovernanceContext {
            replay_evaluation: Some(ReplayDeltas::default()),
            ..base.clone()
        };
        let a = evaluate_proposal(&base).unwrap();
        let b = evaluate_proposal(&with_replay).unwrap();
        assert_eq!(a.decision_hash, decision_hash(&base.proposal, None, 1).unwrap());
        assert_ne!(a.decision_hash, b.decision_hash);
        assert_ne!(a.inputs_hash, b.inputs_hash);
        assert_eq!(b.replay_evaluation, Some(ReplayDeltas::default()));
    }
}
