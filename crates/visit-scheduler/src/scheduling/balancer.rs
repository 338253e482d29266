use std::collections::BTreeMap;

use super::domain::AgentId;

/// Online greedy load balancer over a pool of agents.
///
/// Seeded with each agent's current same-day visit count, it hands every
/// incoming request (in the order received) to the agent with the lowest
/// running count, then bumps that count so later requests in the same batch
/// see the updated load. Ties break by ascending agent id, which keeps batch
/// assignment deterministic. This is a greedy balancer, not optimal
/// bin-packing.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    loads: BTreeMap<AgentId, u32>,
}

impl LoadBalancer {
    pub fn new(loads: BTreeMap<AgentId, u32>) -> Self {
        Self { loads }
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Assigns the next request and updates the running count. `None` only
    /// when the pool is empty.
    pub fn assign_next(&mut self) -> Option<AgentId> {
        let agent = self
            .loads
            .iter()
            .min_by_key(|&(_, load)| *load)
            .map(|(agent, _)| agent.clone())?;

        if let Some(load) = self.loads.get_mut(&agent) {
            *load += 1;
        }
        Some(agent)
    }
}
