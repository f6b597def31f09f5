//! Agents: an identity, a place, a stats tracker and a memory store.

use tracing::trace;

use crate::config::MemoryConfig;
use crate::influencer::Influencer;
use crate::memory::{AddReport, Memory, MemoryStore};
use crate::stat::{Objective, StatImpact};
use crate::tracker::StatsTracker;
use crate::types::{AgentId, Location, SimTime};

/// Outcome of [`Agent::try_add_influencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfluenceOutcome {
    /// Accepted; the memory store reported what it did with the record.
    Accepted(AddReport),
    /// Refused; the agent remembers this source and it is still cooling down.
    Rejected,
}

impl InfluenceOutcome {
    /// Whether the influencer was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// One simulated actor's state. Behaviors and the brain live beside it in
/// the world registry and reach it by [`AgentId`].
#[derive(Debug, Clone)]
pub struct Agent {
    /// Registry handle.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Current position, updated by the host's movement.
    pub location: Location,
    /// Stats, desired states and live influencers.
    pub stats: StatsTracker,
    /// Episodic memory.
    pub memory: MemoryStore,
}

impl Agent {
    /// Create an agent with no stats.
    #[must_use]
    pub fn new(id: AgentId, name: impl Into<String>, location: Location, memory: MemoryConfig, seed: u64) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            stats: StatsTracker::new(),
            memory: MemoryStore::new(memory, seed),
        }
    }

    /// Accept an influencer unless its source is remembered and not yet
    /// ready to return to. Accepted influencers are remembered.
    pub fn try_add_influencer(&mut self, influencer: Influencer, now: SimTime) -> InfluenceOutcome {
        if self.memory.remembers_unready(&influencer.source, &influencer.stat, now) {
            trace!(agent = %self.id, source = %influencer.source, stat = %influencer.stat, "influencer rejected by memory");
            return InfluenceOutcome::Rejected;
        }

        let memory = Memory::new(
            Some(influencer.source.clone()),
            self.location,
            influencer.stat.clone(),
            influencer.max_change,
            self.is_welcome(&influencer.stat, influencer.max_change),
            now,
            influencer.cooldown,
        );
        self.stats.try_add_influencer(influencer);
        InfluenceOutcome::Accepted(self.memory.add_memory(memory))
    }

    /// Whether a change of `change` on `stat` moves any desired state on it
    /// toward satisfaction. Stats nobody cares about count as welcome.
    #[must_use]
    pub fn is_welcome(&self, stat: &str, change: f32) -> bool {
        let objective = if change < 0.0 {
            Objective::LessThan
        } else {
            Objective::GreaterThan
        };
        let impact = StatImpact::new(stat, objective);
        let normalized = self.stats.normalized(stat).unwrap_or(0.0);
        let mut relevant = self.stats.desired_states().iter().filter(|d| d.stat == stat).peekable();
        if relevant.peek().is_none() {
            return true;
        }
        relevant.any(|d| impact.relieves(d, normalized))
    }
}
