//! Domain Registry Gate
//!
//! Governance metadata describing which business domains are stable,
//! evolving or deprecated. Scenario construction and every engine run
//! consult the gate before any generation work; a deprecated domain fails
//! the whole call, never a degraded subset.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::governance::registry::{check_registry, DomainRegistry, Stability};
//!
//! let registry = DomainRegistry::default()
//!     .with_domain("booking", Stability::Stable)
//!     .with_domain("legacy_payments", Stability::Deprecated);
//!
//! assert!(check_registry(&registry, ["booking"]).is_ok());
//! assert!(check_registry(&registry, ["booking", "legacy_payments"]).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a domain contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Experimental,
    Evolving,
    Deprecated,
}

/// Announced deprecation schedule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deprecation {
    pub will_deprecate: bool,
    /// Logical tick at which the domain sunsets; unscheduled if absent
    #[serde(default)]
    pub sunset_tick: Option<u64>,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Contract metadata for a single domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainContract {
    pub version: String,
    pub stability: Stability,
    #[serde(default)]
    pub allowed_mutations: Vec<String>,
    #[serde(default)]
    pub forbidden_mutations: Vec<String>,
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub domain: String,
    pub contract: DomainContract,
    #[serde(default)]
    pub deprecation: Option<Deprecation>,
}

/// How strictly the gate treats the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatePolicy {
    /// Logical tick the gate evaluates sunset windows against
    pub as_of_tick: u64,
    /// A scheduled sunset within this many ticks of `as_of_tick` blocks
    pub sunset_window_ticks: u64,
    /// Reject domains that have no registry entry
    pub require_registration: bool,
}

/// Governance registry supplied by the governance subsystem
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainRegistry {
    #[serde(default)]
    pub entries: Vec<DomainEntry>,
    #[serde(default)]
    pub policy: GatePolicy,
}

impl DomainRegistry {
    /// Builder helper: add a domain with version 1.0.0
    pub fn with_domain(mut self, domain: &str, stability: Stability) -> Self {
        self.entries.push(DomainEntry {
            domain: domain.to_string(),
            contract: DomainContract {
                version: "1.0.0".to_string(),
                stability,
                allowed_mutations: Vec::new(),
                forbidden_mutations: Vec::new(),
            },
            deprecation: None,
        });
        self
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn entry(&self, domain: &str) -> Option<&DomainEntry> {
        self.entries.iter().find(|e| e.domain == domain)
    }

    /// Registry used when none is configured: the domains the engine emits
    pub fn default_simulation() -> Self {
        DomainRegistry::default()
            .with_domain("booking", Stability::Stable)
            .with_domain("provider", Stability::Stable)
            .with_domain("ops", Stability::Stable)
            .with_domain("support", Stability::Stable)
            .with_domain("trust_safety", Stability::Experimental)
    }
}

/// Why a domain was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeprecationReason {
    Deprecated,
    SunsetWithinWindow,
    Unregistered,
}

/// Governance error: fatal to scenario construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Domain '{domain}' is blocked by the governance registry ({reason:?})")]
pub struct DeprecatedDomainError {
    pub domain: String,
    pub reason: DeprecationReason,
}

fn blocking_reason(registry: &DomainRegistry, domain: &str) -> Option<DeprecationReason> {
    let policy = registry.policy;
    let Some(entry) = registry.entry(domain) else {
        return policy
            .require_registration
            .then_some(DeprecationReason::Unregistered);
    };

    if entry.contract.stability == Stability::Deprecated {
        return Some(DeprecationReason::Deprecated);
    }

    match &entry.deprecation {
        Some(Deprecation {
            will_deprecate: true,
            sunset_tick: Some(sunset),
            ..
        }) if sunset.saturating_sub(policy.as_of_tick) <= policy.sunset_window_ticks => {
            Some(DeprecationReason::SunsetWithinWindow)
        }
        _ => None,
    }
}

/// Fail if any domain in `domains_used` is blocked
///
/// Domains are checked in the order given; the first blocked domain is
/// reported.
pub fn check_registry<I, S>(registry: &DomainRegistry, domains_used: I) -> Result<(), DeprecatedDomainError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for domain in domains_used {
        let domain = domain.as_ref();
        if let Some(reason) = blocking_reason(registry, domain) {
            tracing::warn!(domain, ?reason, "registry gate rejected domain");
            return Err(DeprecatedDomainError {
                domain: domain.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sunsetting(sunset_tick: u64) -> DomainRegistry {
        let mut registry = DomainRegistry::default().with_domain("provider", Stability::Evolving);
        registry.entries[0].deprecation = Some(Deprecation {
            will_deprecate: true,
            sunset_tick: Some(sunset_tick),
            replacement: Some("provider_v2".to_string()),
        });
        registry
    }

    #[test]
    fn test_unknown_domain_allowed_by_default() {
        assert!(check_registry(&DomainRegistry::default(), ["anything"]).is_ok());
    }

    #[test]
    fn test_unknown_domain_rejected_when_registration_required() {
        let registry = DomainRegistry::default().with_policy(GatePolicy {
            require_registration: true,
            ..GatePolicy::default()
        });
        let err = check_registry(&registry, ["anything"]).unwrap_err();
        assert_eq!(err.reason, DeprecationReason::Unregistered);
    }

    #[test]
    fn test_sunset_inside_window_blocks() {
        let registry = sunsetting(110).with_policy(GatePolicy {
            as_of_tick: 100,
            sunset_window_ticks: 20,
            require_registration: false,
        });
        let err = check_registry(&registry, ["provider"]).unwrap_err();
        assert_eq!(err.reason, DeprecationReason::SunsetWithinWindow);
    }

    #[test]
    fn test_sunset_outside_window_passes() {
        let registry = sunsetting(500).with_policy(GatePolicy {
            as_of_tick: 100,
            sunset_window_ticks: 20,
            require_registration: false,
        });
        assert!(check_registry(&registry, ["provider"]).is_ok());
    }

    #[test]
    fn test_registry_deserializes() {
        let raw = r#"{
            "entries": [
                {"domain": "booking", "contract": {"version": "1.0.0", "stability": "deprecated"}}
            ]
        }"#;
        let registry: DomainRegistry = serde_json::from_str(raw).unwrap();
        assert_eq!(registry.entries[0].contract.stability, Stability::Deprecated);
        assert!(check_registry(&registry, ["booking"]).is_err());
    }
}
