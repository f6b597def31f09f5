//! Interactables: capacity-limited shared resources offering influence to
//! the agents that use them and to themselves.
//!
//! Reservations and active users are counted together against
//! `max_concurrent_users`; every mutation goes through a check-then-act method
//! on the interactable, so the invariant holds after each call.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{Agent, InfluenceOutcome};
use crate::error::{BrainzError, Result};
use crate::influencer::{Influencer, InfluencerTemplate};
use crate::stat::{StatImpact, StatTemplate};
use crate::tracker::StatsTracker;
use crate::types::{AgentId, InteractableId, Location, SimTime, SourceId};

/// Static description of an interactable kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractableSpec {
    /// Kind name, also the interaction name carried by granted influencers.
    pub name: String,
    /// Agents that may reserve or use it at once.
    #[serde(default = "default_capacity")]
    pub max_concurrent_users: usize,
    /// Seconds before the same agent may use it again.
    #[serde(default)]
    pub cooldown: f32,
    /// Influences granted to each user.
    #[serde(default)]
    pub character_influences: Vec<InfluencerTemplate>,
    /// Influences applied to the interactable's own stats per use.
    #[serde(default)]
    pub self_influences: Vec<InfluencerTemplate>,
    /// The interactable's own stats (stock, progress).
    #[serde(default)]
    pub stats: Vec<StatTemplate>,
    /// Destroyed after its first use ends.
    #[serde(default)]
    pub single_use: bool,
    /// Stat that measures construction progress, for building targets.
    #[serde(default)]
    pub progress_stat: Option<String>,
}

fn default_capacity() -> usize { 1 }

impl InteractableSpec {
    /// A single-user kind with no influences; fill in the rest by field.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_concurrent_users: default_capacity(),
            cooldown: 0.0,
            character_influences: Vec::new(),
            self_influences: Vec::new(),
            stats: Vec::new(),
            single_use: false,
            progress_stat: None,
        }
    }
}

/// Result of [`Interactable::start_interaction`].
#[derive(Debug, Clone, Default)]
pub struct InteractionStart {
    /// Influencers the user accepted.
    pub granted: usize,
    /// Influencers the user's memory refused.
    pub rejected: usize,
    /// Memory activity caused by the accepted influencers.
    pub merged: usize,
    /// Promotions triggered by the accepted influencers.
    pub promoted: usize,
    /// Evictions triggered by the accepted influencers.
    pub evicted: usize,
}

/// A placed, live interactable.
#[derive(Debug, Clone)]
pub struct Interactable {
    /// Registry handle.
    pub id: InteractableId,
    /// Where agents go to use it.
    pub location: Location,
    spec: InteractableSpec,
    reservations: BTreeSet<AgentId>,
    active_users: BTreeSet<AgentId>,
    last_use: BTreeMap<AgentId, SimTime>,
    stats: StatsTracker,
}

impl Interactable {
    /// Place an interactable.
    ///
    /// # Errors
    /// Returns [`BrainzError::InvalidStatRange`] for a bad stat template.
    pub fn new(id: InteractableId, spec: InteractableSpec, location: Location) -> Result<Self> {
        let stats = StatsTracker::from_templates(&spec.stats)?;
        Ok(Self {
            id,
            location,
            spec,
            reservations: BTreeSet::new(),
            active_users: BTreeSet::new(),
            last_use: BTreeMap::new(),
            stats,
        })
    }

    /// Kind name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Static description.
    #[must_use]
    pub fn spec(&self) -> &InteractableSpec {
        &self.spec
    }

    /// Own stats.
    #[must_use]
    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Reservations plus active users.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.reservations.len() + self.active_users.len()
    }

    /// Whether another agent could reserve it.
    #[must_use]
    pub fn has_space(&self) -> bool {
        self.occupancy() < self.spec.max_concurrent_users
    }

    /// Whether `agent` holds a reservation.
    #[must_use]
    pub fn is_reserved_by(&self, agent: AgentId) -> bool {
        self.reservations.contains(&agent)
    }

    /// Whether `agent` is using it.
    #[must_use]
    pub fn is_used_by(&self, agent: AgentId) -> bool {
        self.active_users.contains(&agent)
    }

    /// Reserve a slot. Succeeds iff there is space; an existing reservation
    /// by the same agent is kept and reported as success.
    pub fn reserve_for(&mut self, agent: AgentId) -> bool {
        if self.reservations.contains(&agent) || self.active_users.contains(&agent) {
            return true;
        }
        if !self.has_space() {
            return false;
        }
        self.reservations.insert(agent);
        true
    }

    /// Drop `agent`'s reservation if any.
    pub fn clear_reservation(&mut self, agent: AgentId) {
        self.reservations.remove(&agent);
    }

    /// `now < last_use[agent] + cooldown`.
    #[must_use]
    pub fn is_on_cooldown_for(&self, agent: AgentId, now: SimTime) -> bool {
        self.last_use
            .get(&agent)
            .is_some_and(|last| now < last.after(self.spec.cooldown))
    }

    /// Whether every draining template in `templates` fits in the current stock.
    #[must_use]
    pub fn has_required_resource_for(&self, templates: &[InfluencerTemplate]) -> bool {
        templates.iter().filter(|t| t.max_change < 0.0).all(|t| {
            let stock = self.stats.value(&t.stat).unwrap_or(0.0);
            t.max_change.abs() <= stock
        })
    }

    /// [`has_required_resource_for`](Self::has_required_resource_for) its own self-influences.
    #[must_use]
    pub fn has_required_resource(&self) -> bool {
        self.has_required_resource_for(&self.spec.self_influences)
    }

    /// Whether some character influence pushes each impact's stat the right way.
    #[must_use]
    pub fn satisfies(&self, impacts: &[StatImpact]) -> bool {
        impacts.iter().all(|impact| {
            self.spec
                .character_influences
                .iter()
                .any(|t| t.stat == impact.stat && impact.matches_change(t.max_change))
        })
    }

    /// Whether the configured progress stat is below complete.
    /// Interactables without a progress stat are never building targets.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.spec
            .progress_stat
            .as_deref()
            .and_then(|stat| self.stats.normalized(stat))
            .is_some_and(|progress| progress < 1.0)
    }

    /// Turn `agent`'s reservation into active use and grant influences.
    ///
    /// Character influences not marked on-completion are offered to the agent
    /// (ramped ones ride its tracker); self-influences land on own stats.
    ///
    /// # Errors
    /// Returns [`BrainzError::InteractableFull`] when the agent holds no
    /// reservation and no slot is free.
    pub fn start_interaction(&mut self, agent: &mut Agent, now: SimTime) -> Result<InteractionStart> {
        if !self.reservations.remove(&agent.id) && !self.active_users.contains(&agent.id) && !self.has_space() {
            return Err(BrainzError::InteractableFull {
                interactable: self.id,
                capacity: self.spec.max_concurrent_users,
            });
        }
        self.active_users.insert(agent.id);
        self.last_use.insert(agent.id, now);

        let mut start = InteractionStart::default();
        for template in self.spec.character_influences.iter().filter(|t| !t.on_completion) {
            let influencer = Influencer::from_template(template, &self.spec.name, SourceId::Interactable(self.id), now);
            match agent.try_add_influencer(influencer, now) {
                InfluenceOutcome::Accepted(report) => {
                    start.granted += 1;
                    start.merged += usize::from(report.merged);
                    start.promoted += report.promoted;
                    start.evicted += report.evicted_short + report.evicted_long;
                }
                InfluenceOutcome::Rejected => start.rejected += 1,
            }
        }
        self.apply_self_influences(agent.id, now);

        debug!(interactable = %self.id, agent = %agent.id, granted = start.granted, "interaction started");
        Ok(start)
    }

    /// Apply the self-influence templates to own stats on behalf of `agent`.
    pub fn apply_self_influences(&mut self, agent: AgentId, now: SimTime) {
        for template in &self.spec.self_influences {
            let influencer = Influencer::from_template(template, &self.spec.name, SourceId::Agent(agent), now);
            self.stats.try_add_influencer(influencer);
        }
        self.stats.tick(now);
    }

    /// End `agent`'s use, landing on-completion character influences directly.
    ///
    /// Returns `true` when the interactable is single-use and should now be
    /// destroyed.
    pub fn stop_interaction(&mut self, agent: &mut Agent) -> bool {
        if !self.active_users.remove(&agent.id) {
            return false;
        }
        for template in self.spec.character_influences.iter().filter(|t| t.on_completion) {
            agent.stats.apply_direct(&template.stat, template.max_change);
        }
        debug!(interactable = %self.id, agent = %agent.id, "interaction stopped");
        self.spec.single_use
    }

    /// Drop every trace of `agent` (reservation and active use).
    pub fn forget(&mut self, agent: AgentId) {
        self.reservations.remove(&agent);
        self.active_users.remove(&agent);
    }

    /// Advance own stats (regrowth, ramped self-influences).
    pub fn tick(&mut self, now: SimTime) {
        self.stats.tick(now);
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Finds interactables near a point.
pub trait SpatialQuery {
    /// Live interactables within `radius` of `location`.
    fn nearby(&self, location: Location, radius: f32) -> Vec<InteractableId>;
}

/// Arena of interactables addressed by [`InteractableId`]. Destroyed slots
/// stay empty so ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct InteractablePool {
    slots: Vec<Option<Interactable>>,
}

impl InteractablePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new interactable.
    ///
    /// # Errors
    /// Propagates stat template validation.
    pub fn spawn(&mut self, spec: InteractableSpec, location: Location) -> Result<InteractableId> {
        let id = InteractableId(u32::try_from(self.slots.len()).map_err(|_| BrainzError::Config("interactable pool exhausted".into()))?);
        let interactable = Interactable::new(id, spec, location)?;
        info!(interactable = %id, name = interactable.name(), "interactable placed");
        self.slots.push(Some(interactable));
        Ok(id)
    }

    /// Look up a live interactable.
    #[must_use]
    pub fn get(&self, id: InteractableId) -> Option<&Interactable> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Look up a live interactable mutably.
    pub fn get_mut(&mut self, id: InteractableId) -> Option<&mut Interactable> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Look up a live interactable mutably, or fail.
    ///
    /// # Errors
    /// Returns [`BrainzError::InteractableNotFound`].
    pub fn require_mut(&mut self, id: InteractableId) -> Result<&mut Interactable> {
        self.get_mut(id).ok_or(BrainzError::InteractableNotFound(id))
    }

    /// Whether `id` refers to a live interactable.
    #[must_use]
    pub fn is_live(&self, id: InteractableId) -> bool {
        self.get(id).is_some()
    }

    /// Remove an interactable. Returns it if it was live.
    pub fn destroy(&mut self, id: InteractableId) -> Option<Interactable> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            info!(interactable = %id, "interactable destroyed");
        }
        removed
    }

    /// Live interactables.
    pub fn iter(&self) -> impl Iterator<Item = &Interactable> {
        self.slots.iter().flatten()
    }

    /// Number of live interactables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no interactable is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tick every live interactable's stats.
    pub fn tick(&mut self, now: SimTime) {
        for interactable in self.slots.iter_mut().flatten() {
            interactable.tick(now);
        }
    }
}

impl SpatialQuery for InteractablePool {
    fn nearby(&self, location: Location, radius: f32) -> Vec<InteractableId> {
        self.iter()
            .filter(|i| i.location.within(&location, radius))
            .map(|i| i.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::stat::Objective;

    fn bench_spec(capacity: usize) -> InteractableSpec {
        InteractableSpec {
            max_concurrent_users: capacity,
            cooldown: 20.0,
            character_influences: vec![InfluencerTemplate::ramped("energy", 30.0, 10.0)],
            ..InteractableSpec::named("bench")
        }
    }

    fn agent(n: u32) -> Agent {
        Agent::new(AgentId(n), format!("a{n}"), Location::default(), MemoryConfig::default(), u64::from(n))
    }

    #[test]
    fn reservation_respects_capacity() {
        let mut bench = Interactable::new(InteractableId(0), bench_spec(2), Location::default()).expect("valid");
        assert!(bench.reserve_for(AgentId(1)));
        assert!(bench.reserve_for(AgentId(2)));
        assert!(!bench.reserve_for(AgentId(3)));
        bench.clear_reservation(AgentId(1));
        bench.clear_reservation(AgentId(1));
        assert!(bench.reserve_for(AgentId(3)));
        assert_eq!(bench.occupancy(), 2);
    }

    #[test]
    fn use_starts_cooldown() {
        let mut bench = Interactable::new(InteractableId(0), bench_spec(1), Location::default()).expect("valid");
        let mut user = agent(1);
        assert!(bench.reserve_for(user.id));
        let start = bench.start_interaction(&mut user, SimTime::from_secs(5.0)).expect("reserved");
        assert_eq!(start.granted, 1);
        assert!(bench.is_used_by(user.id));
        assert!(bench.is_on_cooldown_for(user.id, SimTime::from_secs(5.0)));
        assert!(!bench.is_on_cooldown_for(user.id, SimTime::from_secs(25.0)));
        assert!(!bench.is_on_cooldown_for(AgentId(9), SimTime::from_secs(5.0)));
    }

    #[test]
    fn unreserved_start_on_full_interactable_fails() {
        let mut bench = Interactable::new(InteractableId(0), bench_spec(1), Location::default()).expect("valid");
        assert!(bench.reserve_for(AgentId(1)));
        let err = bench.start_interaction(&mut agent(2), SimTime::ZERO).unwrap_err();
        assert!(matches!(err, BrainzError::InteractableFull { capacity: 1, .. }));
    }

    #[test]
    fn stock_gates_resource_check() {
        let mut spec = bench_spec(1);
        spec.name = "well".into();
        spec.stats = vec![StatTemplate::new("water", 0.0, 100.0, 10.0)];
        spec.self_influences = vec![InfluencerTemplate::instant("water", -25.0)];
        let well = Interactable::new(InteractableId(0), spec, Location::default()).expect("valid");
        assert!(!well.has_required_resource());
        assert!(well.has_required_resource_for(&[InfluencerTemplate::instant("water", -5.0)]));
    }

    #[test]
    fn satisfies_matches_direction() {
        let bench = Interactable::new(InteractableId(0), bench_spec(1), Location::default()).expect("valid");
        assert!(bench.satisfies(&[StatImpact::new("energy", Objective::GreaterThan)]));
        assert!(!bench.satisfies(&[StatImpact::new("energy", Objective::LessThan)]));
        assert!(!bench.satisfies(&[StatImpact::new("hunger", Objective::LessThan)]));
    }

    #[test]
    fn single_use_reports_destruction_and_pool_forgets() {
        let mut spec = bench_spec(1);
        spec.single_use = true;
        spec.character_influences.push(InfluencerTemplate::instant("joy", 5.0).on_completion());
        let mut pool = InteractablePool::new();
        let id = pool.spawn(spec, Location::new(3.0, 0.0, 0.0)).expect("spawn");
        let mut user = agent(1);

        let apple = pool.require_mut(id).expect("live");
        apple.start_interaction(&mut user, SimTime::ZERO).expect("space");
        assert!(apple.stop_interaction(&mut user));
        assert_eq!(user.stats.value("joy"), Some(5.0));

        assert!(pool.destroy(id).is_some());
        assert!(!pool.is_live(id));
        assert!(pool.nearby(Location::default(), 10.0).is_empty());
    }

    #[test]
    fn nearby_is_inclusive_radius() {
        let mut pool = InteractablePool::new();
        let near = pool.spawn(bench_spec(1), Location::new(5.0, 0.0, 0.0)).expect("spawn");
        pool.spawn(bench_spec(1), Location::new(5.1, 0.0, 0.0)).expect("spawn");
        assert_eq!(pool.nearby(Location::default(), 5.0), vec![near]);
    }

    #[test]
    fn building_target_needs_incomplete_progress() {
        let mut spec = bench_spec(2);
        spec.stats = vec![StatTemplate::new("progress", 0.0, 100.0, 0.0)];
        spec.progress_stat = Some("progress".into());
        spec.self_influences = vec![InfluencerTemplate::instant("progress", 100.0)];
        let mut hut = Interactable::new(InteractableId(0), spec, Location::default()).expect("valid");
        assert!(hut.is_incomplete());
        hut.apply_self_influences(AgentId(1), SimTime::ZERO);
        assert!(!hut.is_incomplete());
    }
}
