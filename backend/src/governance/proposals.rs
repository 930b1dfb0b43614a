//! Proposal generation
//!
//! Deterministic, rule-based proposals drawn from a recent window of engine
//! envelopes. Ids are content-hashed from the seed, tick and proposal body,
//! so the same event stream always produces the same proposals in the same
//! order.

use super::hash::sha256_hex;
use crate::models::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Where a proposal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    Rules,
    Manual,
}

/// Proposed operational change awaiting a governance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub tick: u64,
    pub domain: String,
    pub action: String,
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence_event_ids: Vec<String>,
    pub source: ProposalSource,
}

impl Proposal {
    /// Build a proposal with its content-derived id
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seed: u64,
        tick: u64,
        domain: &str,
        action: &str,
        description: &str,
        confidence: f64,
        mut evidence_event_ids: Vec<String>,
        source: ProposalSource,
    ) -> Self {
        evidence_event_ids.sort();
        let id = proposal_id(seed, tick, domain, action, confidence, &evidence_event_ids);
        Self {
            id,
            tick,
            domain: domain.to_string(),
            action: action.to_string(),
            description: description.to_string(),
            confidence,
            evidence_event_ids,
            source,
        }
    }
}

/// Content-hashed proposal id (no timestamps)
pub fn proposal_id(
    seed: u64,
    tick: u64,
    domain: &str,
    action: &str,
    confidence: f64,
    sorted_evidence: &[String],
) -> String {
    let material = format!(
        "{}:{}:{}:{}:{}:{}",
        seed,
        tick,
        domain,
        action,
        confidence,
        sorted_evidence.join(",")
    );
    format!("prop_{}", &sha256_hex(material.as_bytes())[..16])
}

/// Knobs for [`generate_proposals`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProposalConfig {
    /// Envelopes generated within this many ticks of `tick` are considered
    pub recent_window_ticks: u64,
    /// Only the most recent envelopes of the window are considered
    pub max_recent_events: usize,
    pub max_per_tick: usize,
    pub min_confidence: f64,
    /// Domains a proposal may target
    pub enabled_domains: Vec<String>,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            recent_window_ticks: 20,
            max_recent_events: 50,
            max_per_tick: 3,
            min_confidence: 0.5,
            enabled_domains: ["booking", "ops", "provider", "support", "trust_safety"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

struct Draft {
    domain: String,
    action: &'static str,
    description: String,
    confidence: f64,
    evidence: Vec<String>,
}

fn evidence(events: &[&EventEnvelope], limit: usize) -> Vec<String> {
    events.iter().take(limit).map(|e| e.id.clone()).collect()
}

fn of_type<'a>(recent: &[&'a EventEnvelope], domain: &str, event_type: &str) -> Vec<&'a EventEnvelope> {
    recent
        .iter()
        .copied()
        .filter(|e| e.domain() == domain && e.event_type() == event_type)
        .collect()
}

fn rule_drafts(recent: &[&EventEnvelope], enabled_domains: &[String]) -> Vec<Draft> {
    let mut drafts = Vec::new();

    let drops = of_type(recent, "booking", "booking.dropped");
    if drops.len() >= 2 {
        drafts.push(Draft {
            domain: "booking".to_string(),
            action: "throttle_booking_acceptance",
            description: "Repeated booking drops detected. Consider throttling booking acceptance rate."
                .to_string(),
            confidence: 0.75,
            evidence: evidence(&drops, 3),
        });
    }

    let slow: Vec<&EventEnvelope> = of_type(recent, "ops", "load.sampled")
        .into_iter()
        .filter(|e| e.payload_f64("latencyMs").is_some_and(|l| l > 300.0))
        .collect();
    if !slow.is_empty() {
        drafts.push(Draft {
            domain: "ops".to_string(),
            action: "pre_warm_capacity",
            description: "High latency samples detected. Consider pre-warming capacity.".to_string(),
            confidence: 0.7,
            evidence: evidence(&slow, 2),
        });
    }

    let failures = of_type(recent, "booking", "booking.failure");
    if !failures.is_empty() {
        drafts.push(Draft {
            domain: "booking".to_string(),
            action: "enable_contingency_path",
            description: "Booking failures detected. Consider enabling the contingency path.".to_string(),
            confidence: 0.8,
            evidence: evidence(&failures, 2),
        });
    }

    let mut by_domain: BTreeMap<&str, Vec<&EventEnvelope>> = BTreeMap::new();
    for &envelope in recent {
        by_domain.entry(envelope.domain()).or_default().push(envelope);
    }
    // At most one radius proposal per window: the first busy enabled domain.
    for domain in enabled_domains {
        let Some(events) = by_domain.get(domain.as_str()) else {
            continue;
        };
        if events.len() >= 5 {
            drafts.push(Draft {
                domain: domain.clone(),
                action: "increase_provider_radius",
                description: format!(
                    "High event rate in {}. Consider increasing provider radius to distribute load.",
                    domain
                ),
                confidence: 0.65,
                evidence: evidence(events, 5),
            });
            break;
        }
    }

    drafts
}

/// Generate proposals for `tick` from the engine envelopes seen so far
///
/// Deterministic: drafts are validated against the enabled domains and the
/// confidence floor, deduplicated by `(domain, action)` keeping the highest
/// confidence, sorted by domain then action, then capped.
pub fn generate_proposals(
    seed: u64,
    tick: u64,
    events: &[EventEnvelope],
    config: &ProposalConfig,
) -> Vec<Proposal> {
    let in_window: Vec<&EventEnvelope> = events
        .iter()
        .filter(|e| e.generated_at_tick.saturating_add(config.recent_window_ticks) > tick)
        .collect();
    let skip = in_window.len().saturating_sub(config.max_recent_events);
    let recent = &in_window[skip..];

    let mut best: HashMap<(String, &'static str), Proposal> = HashMap::new();
    for draft in rule_drafts(recent, &config.enabled_domains) {
        if !config.enabled_domains.contains(&draft.domain) {
            continue;
        }
        if draft.confidence < config.min_confidence {
            continue;
        }
        let proposal = Proposal::new(
            seed,
            tick,
            &draft.domain,
            draft.action,
            &draft.description,
            draft.confidence,
            draft.evidence,
            ProposalSource::Rules,
        );
        let key = (draft.domain, draft.action);
        match best.get(&key) {
            Some(existing) if existing.confidence >= proposal.confidence => {}
            _ => {
                best.insert(key, proposal);
            }
        }
    }

    let mut proposals: Vec<Proposal> = best.into_values().collect();
    proposals.sort_by(|a, b| {
        a.domain
            .cmp(&b.domain)
            .then_with(|| a.action.cmp(&b.action))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
    proposals.truncate(config.max_per_tick);

    tracing::debug!(tick, count = proposals.len(), "generated proposals");
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(tick: u64, seq: u32, domain: &str, event_type: &str) -> EventEnvelope {
        EventEnvelope::new(1, tick, seq, domain, event_type, json!({}))
    }

    #[test]
    fn test_repeated_drops_propose_throttle() {
        let events = vec![
            envelope(1, 0, "booking", "booking.dropped"),
            envelope(2, 0, "booking", "booking.dropped"),
        ];
        let proposals = generate_proposals(1, 2, &events, &ProposalConfig::default());
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].action, "throttle_booking_acceptance");
        assert_eq!(proposals[0].evidence_event_ids.len(), 2);
    }

    #[test]
    fn test_single_drop_proposes_nothing() {
        let events = vec![envelope(1, 0, "booking", "booking.dropped")];
        assert!(generate_proposals(1, 1, &events, &ProposalConfig::default()).is_empty());
    }

    #[test]
    fn test_min_confidence_filters() {
        let events = vec![envelope(1, 0, "booking", "booking.failure")];
        let config = ProposalConfig {
            min_confidence: 0.9,
            ..ProposalConfig::default()
        };
        assert!(generate_proposals(1, 1, &events, &config).is_empty());
    }

    #[test]
    fn test_ids_are_content_hashed() {
        let events = vec![envelope(1, 0, "booking", "booking.failure")];
        let a = generate_proposals(1, 1, &events, &ProposalConfig::default());
        let b = generate_proposals(1, 1, &events, &ProposalConfig::default());
        let c = generate_proposals(2, 1, &events, &ProposalConfig::default());
        assert_eq!(a, b);
        assert_ne!(a[0].id, c[0].id);
        assert!(a[0].id.starts_with("prop_"));
    }

    #[test]
    fn test_cap_and_order() {
        let mut events = Vec::new();
        for seq in 0..6 {
            events.push(envelope(3, seq, "booking", "booking.dropped"));
        }
        events.push(envelope(3, 6, "booking", "booking.failure"));
        let config = ProposalConfig {
            max_per_tick: 2,
            ..ProposalConfig::default()
        };
        let proposals = generate_proposals(1, 3, &events, &config);
        let actions: Vec<_> = proposals.iter().map(|p| p.action.as_str()).collect();
        assert_eq!(actions, vec!["enable_contingency_path", "increase_provider_radius"]);
    }
}
