//! The authoritative set of live agents.

use crate::agent::{Agent, AgentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Live agents keyed by id.
///
/// Add and remove are idempotent. Iteration is by ascending id, but callers
/// should treat the order as unspecified.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PopulationRegistry {
    agents: BTreeMap<AgentId, Agent>,
}

impl PopulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. No-op (returns `false`) if the id is already live.
    pub fn add(&mut self, agent: Agent) -> bool {
        if self.agents.contains_key(&agent.id) {
            return false;
        }
        self.agents.insert(agent.id, agent);
        true
    }

    /// Unregister an agent. No-op (returns `None`) if it is not live.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Iterate every live agent
    pub fn all(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    #[inline]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl FromIterator<Agent> for PopulationRegistry {
    fn from_iter<I: IntoIterator<Item = Agent>>(iter: I) -> Self {
        let mut registry = Self::new();
        for agent in iter {
            registry.add(agent);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::test_agent;

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = PopulationRegistry::new();
        assert!(registry.add(test_agent(1)));

        let mut dup = test_agent(1);
        dup.energy = 99.0;
        assert!(!registry.add(dup));

        assert_eq!(registry.len(), 1);
        // first registration wins
        assert_ne!(registry.get(1).map(|a| a.energy), Some(99.0));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = PopulationRegistry::new();
        registry.add(test_agent(1));

        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.remove(42).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_all_yields_every_live_agent_once() {
        let registry: PopulationRegistry = (0..5).map(test_agent).collect();
        let mut ids: Vec<_> = registry.all().map(|a| a.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(registry.ids().count(), 5);
    }
}
