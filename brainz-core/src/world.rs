//! The world registry. The explicit owner of every agent, brain,
//! interactable and gathering, passed by reference instead of living in
//! global singletons.
//!
//! Agents and brains sit in parallel arenas indexed by [`AgentId`], so one
//! agent's tick can borrow its own state mutably alongside the shared
//! interactable pool without aliasing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug_span, info, warn};

use crate::agent::Agent;
use crate::arbiter::{Brain, Decision};
use crate::behavior::{BehaviorCtx, BehaviorSpec, BehaviorState, Gatherings};
use crate::config::BrainzConfig;
use crate::error::{BrainzError, Result};
use crate::host::Host;
use crate::interactable::{InteractablePool, InteractableSpec};
use crate::metrics::{BrainzCounters, CounterSnapshot, Phase, TickProfiler, spans};
use crate::stat::{DesiredState, StatTemplate};
use crate::types::{AgentId, InteractableId, Location, SimTime, SourceId};

/// What an agent is made of: stats, wants, and the behaviors it may pick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentArchetype {
    /// Archetype name.
    pub name: String,
    /// Initial stats.
    #[serde(default)]
    pub stats: Vec<StatTemplate>,
    /// What the agent wants its stats to be.
    #[serde(default)]
    pub desired_states: Vec<DesiredState>,
    /// Behavior names to register.
    #[serde(default)]
    pub behaviors: Vec<String>,
    /// Behavior used when a winner cannot reserve its interactable.
    #[serde(default)]
    pub fallback: Option<String>,
}

/// Serializable view of one agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    /// Agent handle.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Simulation time of the snapshot.
    pub time: f64,
    /// Position.
    pub location: Location,
    /// Stats by name.
    pub stats: Vec<StatView>,
    /// Names of stats whose desired state is unmet.
    pub unsatisfied: Vec<String>,
    /// The running blocking behavior.
    pub active: Option<BehaviorView>,
    /// Running non-blocking behaviors.
    pub concurrent: Vec<BehaviorView>,
    /// Live influencers.
    pub influencers: usize,
    /// Short-term memory count.
    pub short_term_memories: usize,
    /// Long-term memory count.
    pub long_term_memories: usize,
}

/// One stat in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatView {
    /// Stat name.
    pub name: String,
    /// Raw value.
    pub value: f32,
    /// Normalized value.
    pub normalized: f32,
}

/// One behavior in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorView {
    /// Behavior name.
    pub name: String,
    /// Lifecycle state.
    pub state: BehaviorState,
    /// Target interactable, if any.
    pub target: Option<InteractableId>,
}

/// Explicit registry of agents, brains, interactables and gatherings.
pub struct World {
    config: BrainzConfig,
    agents: Vec<Agent>,
    brains: Vec<Brain>,
    interactables: InteractablePool,
    gatherings: Gatherings,
    counters: BrainzCounters,
    profiler: TickProfiler,
    seeds: StdRng,
    now: SimTime,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(config: BrainzConfig) -> Self {
        Self {
            seeds: StdRng::seed_from_u64(config.general.seed),
            profiler: TickProfiler::new(f64::from(config.performance.tick_budget_ms)),
            config,
            agents: Vec::new(),
            brains: Vec::new(),
            interactables: InteractablePool::new(),
            gatherings: Gatherings::new(),
            counters: BrainzCounters::new(),
            now: SimTime::ZERO,
        }
    }

    /// World configuration.
    #[must_use]
    pub fn config(&self) -> &BrainzConfig {
        &self.config
    }

    /// Time of the last tick.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Spawn an agent from an archetype.
    ///
    /// `behaviors` are the definitions to resolve the archetype's behavior
    /// names against. A behavior that is unknown or references a missing stat
    /// is logged and skipped; the agent is still created.
    ///
    /// # Errors
    /// Returns [`BrainzError::InvalidStatRange`] for a bad stat template.
    pub fn add_agent(
        &mut self,
        name: impl Into<String>,
        archetype: &AgentArchetype,
        behaviors: &[BehaviorSpec],
        location: Location,
    ) -> Result<AgentId> {
        let id = AgentId(
            u32::try_from(self.agents.len()).map_err(|_| BrainzError::Config("agent registry exhausted".into()))?,
        );
        let mut agent = Agent::new(id, name, location, self.config.memory.clone(), self.seeds.gen_range(0..u64::MAX));
        for template in &archetype.stats {
            agent.stats.add_stat(template)?;
        }
        for desired in &archetype.desired_states {
            agent.stats.add_desired_state(desired.clone());
        }

        let mut brain = Brain::new(self.config.arbiter.clone(), self.seeds.gen_range(0..u64::MAX));
        for behavior_name in &archetype.behaviors {
            let registered = behaviors
                .iter()
                .find(|b| &b.name == behavior_name)
                .ok_or_else(|| BrainzError::UnknownBehavior(behavior_name.clone()))
                .and_then(|spec| spec.validate(&agent.stats).map(|()| spec))
                .and_then(|spec| brain.register(spec.clone()));
            if let Err(e) = registered {
                warn!(agent = %id, behavior = %behavior_name, error = %e, "behavior disabled");
            }
        }
        if let Some(fallback) = &archetype.fallback {
            if let Err(e) = brain.set_fallback(fallback) {
                warn!(agent = %id, behavior = %fallback, error = %e, "fallback disabled");
            }
        }
        for behavior in brain.behaviors() {
            if let Some(next) = &behavior.spec().chain_next {
                if brain.behavior(next).is_none() {
                    warn!(agent = %id, behavior = behavior.name(), chain_next = %next, "chained behavior not registered");
                }
            }
        }

        info!(agent = %id, name = %agent.name, archetype = %archetype.name, behaviors = brain.behaviors().len(), "agent added");
        self.agents.push(agent);
        self.brains.push(brain);
        Ok(id)
    }

    /// Place an interactable.
    ///
    /// # Errors
    /// Propagates stat template validation.
    pub fn add_interactable(&mut self, spec: InteractableSpec, location: Location) -> Result<InteractableId> {
        self.interactables.spawn(spec, location)
    }

    /// Look up an agent.
    ///
    /// # Errors
    /// Returns [`BrainzError::AgentNotFound`].
    pub fn agent(&self, id: AgentId) -> Result<&Agent> {
        self.agents.get(id.index()).ok_or(BrainzError::AgentNotFound(id))
    }

    /// Look up an agent mutably.
    ///
    /// # Errors
    /// Returns [`BrainzError::AgentNotFound`].
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        self.agents.get_mut(id.index()).ok_or(BrainzError::AgentNotFound(id))
    }

    /// Look up an agent's brain.
    ///
    /// # Errors
    /// Returns [`BrainzError::AgentNotFound`].
    pub fn brain(&self, id: AgentId) -> Result<&Brain> {
        self.brains.get(id.index()).ok_or(BrainzError::AgentNotFound(id))
    }

    /// All agents.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The interactable pool.
    #[must_use]
    pub fn interactables(&self) -> &InteractablePool {
        &self.interactables
    }

    /// The interactable pool, mutably.
    pub fn interactables_mut(&mut self) -> &mut InteractablePool {
        &mut self.interactables
    }

    /// Open gatherings.
    #[must_use]
    pub fn gatherings(&self) -> &Gatherings {
        &self.gatherings
    }

    /// Event counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Per-phase tick timing history.
    #[must_use]
    pub fn profiler(&self) -> &TickProfiler {
        &self.profiler
    }

    /// Prioritize `behavior` for `agent`'s next arbitration.
    ///
    /// # Errors
    /// Returns [`BrainzError::AgentNotFound`] or [`BrainzError::UnknownBehavior`].
    pub fn prioritize(&mut self, agent: AgentId, behavior: &str) -> Result<()> {
        let now = self.now;
        self.brains
            .get_mut(agent.index())
            .ok_or(BrainzError::AgentNotFound(agent))?
            .prioritize(behavior, now)
    }

    /// Advance the world to `now`: interactable stats, then for each agent its
    /// stats, running behaviors, and (when due) arbitration.
    pub fn tick<H: Host>(&mut self, now: SimTime, host: &mut H) -> Vec<(AgentId, Decision)> {
        let _span = debug_span!(spans::WORLD_TICK, time = now.secs()).entered();
        let Self {
            config,
            agents,
            brains,
            interactables,
            gatherings,
            counters,
            profiler,
            now: clock,
            ..
        } = self;
        let mut recorder = profiler.begin_tick(agents.len());
        *clock = now;

        interactables.tick(now);

        let mut decisions = Vec::with_capacity(agents.len());
        for (agent, brain) in agents.iter_mut().zip(brains.iter_mut()) {
            if let Some(position) = host.position(agent.id) {
                agent.location = position;
            }
            recorder.time(Phase::Stats, || {
                let _stats = debug_span!(spans::STATS_TICK, agent = %agent.id).entered();
                let pool: &InteractablePool = &*interactables;
                agent.stats.tick_with_sources(now, |source| match source {
                    SourceId::Interactable(id) => pool.is_live(*id),
                    SourceId::Agent(_) | SourceId::Behavior(_) => true,
                });
            });

            let mut ctx = BehaviorCtx {
                now,
                agent,
                interactables: &mut *interactables,
                gatherings: &mut *gatherings,
                host: &mut *host,
                counters: &*counters,
                config: &*config,
            };
            recorder.time(Phase::Behaviors, || brain.update(&mut ctx));
            let decision = recorder.time(Phase::Arbitration, || brain.arbitrate(&mut ctx));
            if decision != Decision::Skipped {
                recorder.count_decision();
                decisions.push((ctx.agent.id, decision));
            }
        }
        profiler.finish(recorder);
        decisions
    }

    /// Serializable view of one agent.
    ///
    /// # Errors
    /// Returns [`BrainzError::AgentNotFound`].
    pub fn snapshot(&self, id: AgentId) -> Result<AgentSnapshot> {
        let agent = self.agent(id)?;
        let brain = self.brain(id)?;
        let view = |b: &crate::behavior::Behavior| BehaviorView {
            name: b.name().to_string(),
            state: b.state(),
            target: b.target(),
        };
        Ok(AgentSnapshot {
            id,
            name: agent.name.clone(),
            time: self.now.secs(),
            location: agent.location,
            stats: agent
                .stats
                .stats()
                .map(|s| StatView {
                    name: s.name().to_string(),
                    value: s.value(),
                    normalized: s.normalized(),
                })
                .collect(),
            unsatisfied: agent
                .stats
                .unsatisfied_desired_states()
                .into_iter()
                .map(|d| d.stat.clone())
                .collect(),
            active: brain.active().map(view),
            concurrent: brain.concurrent().map(view).collect(),
            influencers: agent.stats.influencers().len(),
            short_term_memories: agent.memory.short_term().len(),
            long_term_memories: agent.memory.long_term().len(),
        })
    }

    /// Snapshots of every agent.
    #[must_use]
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents
            .iter()
            .filter_map(|a| self.snapshot(a.id).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InstantHost;
    use crate::stat::Objective;

    fn archetype(behaviors: &[&str]) -> AgentArchetype {
        AgentArchetype {
            name: "villager".into(),
            stats: vec![StatTemplate::new("hunger", 0.0, 100.0, 50.0)],
            desired_states: vec![DesiredState::new("hunger", Objective::LessThan, 0.3)],
            behaviors: behaviors.iter().map(|s| (*s).to_string()).collect(),
            fallback: None,
        }
    }

    #[test]
    fn broken_behaviors_are_disabled_not_fatal() {
        let mut bad = BehaviorSpec::solitary("sing");
        bad.required_stats = vec![DesiredState::new("voice", Objective::GreaterThan, 0.2)];
        let good = BehaviorSpec::solitary("rest");

        let mut world = World::new(BrainzConfig::default());
        let id = world
            .add_agent("Ada", &archetype(&["sing", "rest", "ghost"]), &[bad, good], Location::default())
            .expect("agent created");
        let brain = world.brain(id).expect("exists");
        assert_eq!(brain.behaviors().len(), 1);
        assert!(brain.behavior("rest").is_some());
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let mut world = World::new(BrainzConfig::default());
        assert!(matches!(world.agent(AgentId(3)), Err(BrainzError::AgentNotFound(_))));
        assert!(matches!(world.prioritize(AgentId(3), "rest"), Err(BrainzError::AgentNotFound(_))));
    }

    #[test]
    fn tick_runs_agents_and_snapshots_serialize() {
        let mut world = World::new(BrainzConfig::default());
        let id = world
            .add_agent("Ada", &archetype(&["rest"]), &[BehaviorSpec::solitary("rest")], Location::default())
            .expect("agent created");
        let decisions = world.tick(SimTime::ZERO, &mut InstantHost);
        assert_eq!(decisions, vec![(id, Decision::Began("rest".into()))]);

        let snapshot = world.snapshot(id).expect("exists");
        assert_eq!(snapshot.unsatisfied, vec!["hunger".to_string()]);
        let json = serde_json::to_string(&snapshot).expect("serializable");
        assert!(json.contains("\"executing\""));
        assert_eq!(world.profiler().tick_count(), 1);
        let last = world.profiler().last().expect("tick recorded");
        assert_eq!(last.agents, 1);
        assert_eq!(last.decisions, 1);
    }
}
