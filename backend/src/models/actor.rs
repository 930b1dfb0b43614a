//! Actor population
//!
//! A fixed roster of simulated actors. Two kinds exist: requesters (people
//! booking appointments) and providers (people offering them). Actors are
//! selected pseudo-randomly per tick through the deterministic RNG.
//!
//! # Example
//!
//! ```rust
//! use sim_governance_core::models::{ActorKind, Population, PopulationConfig};
//! use sim_governance_core::RngManager;
//!
//! let population = Population::new(&PopulationConfig { requesters: 4, providers: 2 });
//! let mut rng = RngManager::new(42);
//!
//! let requester = population.pick(ActorKind::Requester, &mut rng).unwrap();
//! assert!(requester.id.starts_with("requester-"));
//! ```

use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Kind of simulated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Requester,
    Provider,
}

impl ActorKind {
    /// Role string sent to collaborators in actor identity headers
    pub fn role(&self) -> &'static str {
        match self {
            ActorKind::Requester => "customer",
            ActorKind::Provider => "vendor",
        }
    }
}

/// A single member of the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
}

/// Roster sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub requesters: usize,
    pub providers: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            requesters: 8,
            providers: 5,
        }
    }
}

/// Fixed roster of actors
///
/// Order is stable: requesters first, then providers, each numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    requesters: Vec<Actor>,
    providers: Vec<Actor>,
}

impl Population {
    pub fn new(config: &PopulationConfig) -> Self {
        let build = |kind: ActorKind, count: usize, prefix: &str| {
            (1..=count)
                .map(|n| Actor {
                    id: format!("{}-{:03}", prefix, n),
                    kind,
                })
                .collect::<Vec<_>>()
        };

        Self {
            requesters: build(ActorKind::Requester, config.requesters, "requester"),
            providers: build(ActorKind::Provider, config.providers, "provider"),
        }
    }

    /// All actors of one kind
    pub fn of_kind(&self, kind: ActorKind) -> &[Actor] {
        match kind {
            ActorKind::Requester => &self.requesters,
            ActorKind::Provider => &self.providers,
        }
    }

    /// Pick one actor of `kind`, or `None` if the roster has none
    ///
    /// Does not consume a draw when the roster is empty.
    pub fn pick(&self, kind: ActorKind, rng: &mut RngManager) -> Option<&Actor> {
        let pool = self.of_kind(kind);
        if pool.is_empty() {
            return None;
        }
        Some(&pool[rng.index(pool.len())])
    }

    /// Pick up to `count` actors across both kinds, without repeats
    ///
    /// Selection is a partial Fisher-Yates shuffle over the full roster.
    pub fn sample(&self, count: usize, rng: &mut RngManager) -> Vec<Actor> {
        let mut all: Vec<&Actor> = self.requesters.iter().chain(self.providers.iter()).collect();
        let take = count.min(all.len());
        for i in 0..take {
            let j = i + rng.index(all.len() - i);
            all.swap(i, j);
        }
        all.into_iter().take(take).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.requesters.len() + self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_ids_are_stable() {
        let population = Population::new(&PopulationConfig {
            requesters: 2,
            providers: 1,
        });
        let ids: Vec<_> = population
            .of_kind(ActorKind::Requester)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["requester-001", "requester-002"]);
        assert_eq!(population.of_kind(ActorKind::Provider)[0].id, "provider-001");
    }

    #[test]
    fn test_pick_from_empty_kind() {
        let population = Population::new(&PopulationConfig {
            requesters: 3,
            providers: 0,
        });
        let mut rng = RngManager::new(1);
        let state = rng.get_state();
        assert!(population.pick(ActorKind::Provider, &mut rng).is_none());
        assert_eq!(rng.get_state(), state);
    }

    #[test]
    fn test_sample_has_no_repeats() {
        let population = Population::new(&PopulationConfig::default());
        let mut rng = RngManager::new(77);
        let picked = population.sample(6, &mut rng);
        assert_eq!(picked.len(), 6);
        let mut ids: Vec<_> = picked.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_sample_capped_by_roster() {
        let population = Population::new(&PopulationConfig {
            requesters: 1,
            providers: 1,
        });
        let mut rng = RngManager::new(3);
        assert_eq!(population.sample(10, &mut rng).len(), 2);
    }
}
