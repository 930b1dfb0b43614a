//! Tests for the decision evaluator

use sim_governance_core::governance::decision::{
    decision_hash, evaluate_all_proposals, evaluate_proposal, replayed_decision_hash, GovernanceContext, Severity,
    Verdict,
};
use sim_governance_core::governance::proposals::{Proposal, ProposalSource};
use sim_governance_core::governance::replay::{compute_metric_deltas, ReplayDeltas};
use sim_governance_core::metrics::{eval_dials, DialStatus, MetricId, MetricSnapshot, DEFAULT_DIALS};

fn proposal(action: &str) -> Proposal {
    Proposal::new(
        3,
        10,
        "booking",
        action,
        "test proposal",
        0.8,
        vec!["evt_b".to_string(), "evt_a".to_string()],
        ProposalSource::Rules,
    )
}

fn dials(snapshot: &MetricSnapshot) -> Vec<DialStatus> {
    eval_dials(snapshot, &DEFAULT_DIALS)
}

fn ctx(action: &str, snapshot: MetricSnapshot, replay: Option<ReplayDeltas>) -> GovernanceContext {
    GovernanceContext {
        tick: 10,
        proposal: proposal(action),
        dials_snapshot: Some(dials(&snapshot)),
        replay_evaluation: replay,
    }
}

fn rule_ids(ctx: &GovernanceContext) -> Vec<String> {
    evaluate_proposal(ctx)
        .unwrap()
        .reasons
        .into_iter()
        .map(|r| r.rule_id)
        .collect()
}

#[test]
fn test_all_green_allows() {
    let decision = evaluate_proposal(&ctx("throttle_booking_acceptance", MetricSnapshot::default(), None)).unwrap();
    assert_eq!(decision.verdict, Verdict::Allow);
    assert!(decision.reasons.is_empty());
    assert!(decision.violated.is_empty());
}

#[test]
fn test_missing_dials_fail_closed() {
    let mut context = ctx("throttle", MetricSnapshot::default(), None);
    context.dials_snapshot = None;
    let decision = evaluate_proposal(&context).unwrap();
    assert_eq!(decision.verdict, Verdict::Block);
    assert_eq!(decision.reasons[0].rule_id, "missing-dials");

    context.dials_snapshot = Some(vec![]);
    assert_eq!(evaluate_proposal(&context).unwrap().verdict, Verdict::Block);
}

#[test]
fn test_red_dial_blocks_and_lists_violation() {
    let snapshot = MetricSnapshot::default().with(MetricId::CapacityUtilization, 0.95);
    let decision = evaluate_proposal(&ctx("throttle", snapshot, None)).unwrap();
    assert_eq!(decision.verdict, Verdict::Block);
    assert_eq!(decision.violated, vec![MetricId::CapacityUtilization]);
    assert_eq!(decision.reasons[0].rule_id, "block-on-red-dial");
}

#[test]
fn test_yellow_dial_warns() {
    let snapshot = MetricSnapshot::default().with(MetricId::LatencyP95, 400.0);
    let decision = evaluate_proposal(&ctx("throttle", snapshot, None)).unwrap();
    assert_eq!(decision.verdict, Verdict::Warn);
    assert_eq!(decision.reasons[0].severity, Severity::Warn);
}

#[test]
fn test_block_dominates_warn() {
    let snapshot = MetricSnapshot::default()
        .with(MetricId::LatencyP95, 400.0)
        .with(MetricId::ErrorRate, 0.5);
    let context = ctx("apply_config", snapshot, None);
    assert_eq!(
        rule_ids(&context),
        vec!["block-on-red-dial", "warn-on-yellow-dial", "require-override-for-apply"]
    );
    assert_eq!(evaluate_proposal(&context).unwrap().verdict, Verdict::Block);
}

#[test]
fn test_apply_action_requires_admin_override() {
    let decision = evaluate_proposal(&ctx("promote_variant", MetricSnapshot::default(), None)).unwrap();
    assert_eq!(decision.verdict, Verdict::Warn);
    assert_eq!(decision.required_overrides.len(), 1);
    assert_eq!(decision.required_overrides[0].role_required, "admin");
    assert_eq!(decision.required_overrides[0].expires_after_ticks, 100);
}

#[test]
fn test_error_rate_regression_blocks() {
    let base = MetricSnapshot::default().with(MetricId::ErrorRate, 0.0);
    let variant = MetricSnapshot::default().with(MetricId::ErrorRate, 0.025);
    let replay = ReplayDeltas {
        deltas: compute_metric_deltas(&base, &variant),
    };
    let context = ctx("throttle", MetricSnapshot::default(), Some(replay));
    assert_eq!(rule_ids(&context), vec!["block-on-error-rate-regression"]);
}

#[test]
fn test_trust_regression_at_threshold_passes() {
    let base = MetricSnapshot::default();
    let variant = MetricSnapshot::default().with(MetricId::TrustViolationRate, 0.01);
    let replay = ReplayDeltas {
        deltas: compute_metric_deltas(&base, &variant),
    };
    let context = ctx("throttle", MetricSnapshot::default(), Some(replay));
    assert!(rule_ids(&context).is_empty());
}

#[test]
fn test_latency_regression_warns() {
    let base = MetricSnapshot::default().with(MetricId::LatencyP95, 200.0);
    let variant = MetricSnapshot::default().with(MetricId::LatencyP95, 220.0);
    let replay = ReplayDeltas {
        deltas: compute_metric_deltas(&base, &variant),
    };
    let context = ctx("throttle", MetricSnapshot::default(), Some(replay));
    assert_eq!(rule_ids(&context), vec!["warn-on-latency-regression"]);
}

#[test]
fn test_decision_hash_reproducible_and_sensitive() {
    let context = ctx("throttle", MetricSnapshot::default(), None);
    let a = evaluate_proposal(&context).unwrap();
    let b = evaluate_proposal(&context).unwrap();
    assert_eq!(a.decision_hash, b.decision_hash);
    assert_eq!(
        a.decision_hash,
        decision_hash(&context.proposal, context.dials_snapshot.as_deref(), 10).unwrap()
    );

    let mut later = context.clone();
    later.tick = 11;
    assert_ne!(evaluate_proposal(&later).unwrap().decision_hash, a.decision_hash);
}

#[test]
fn test_replay_deltas_move_decision_hash() {
    let plain = ctx("throttle", MetricSnapshot::default(), None);
    let mut regressed = plain.clone();
    regressed.replay_evaluation = Some(ReplayDeltas {
        deltas: compute_metric_deltas(
            &MetricSnapshot::default().with(MetricId::ErrorRate, 0.0),
            &MetricSnapshot::default().with(MetricId::ErrorRate, 0.05),
        ),
    });
    let a = evaluate_proposal(&plain).unwrap();
    let b = evaluate_proposal(&regressed).unwrap();
    assert_eq!(a.verdict, Verdict::Allow);
    assert_eq!(b.verdict, Verdict::Block);
    assert_ne!(a.decision_hash, b.decision_hash);
    assert_ne!(a.inputs_hash, b.inputs_hash);
    assert_eq!(
        b.decision_hash,
        replayed_decision_hash(
            &regressed.proposal,
            regressed.dials_snapshot.as_deref(),
            10,
            regressed.replay_evaluation.as_ref()
        )
        .unwrap()
    );
}

#[test]
fn test_evaluate_all_sorted_by_proposal_id() {
    let proposals = vec![proposal("zeta"), proposal("alpha"), proposal("mid")];
    let snapshot = dials(&MetricSnapshot::default());
    let decisions = evaluate_all_proposals(10, &proposals, Some(snapshot.as_slice()), None).unwrap();
    let ids: Vec<&str> = decisions.iter().map(|d| d.proposal_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(decisions.len(), 3);
}
