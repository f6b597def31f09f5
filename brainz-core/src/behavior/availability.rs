//! Availability and weight, the two questions arbitration asks a behavior.

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::agent::Agent;
use crate::interactable::{Interactable, SpatialQuery};
use crate::types::{InteractableId, Location, SourceId};

use super::{Behavior, BehaviorCtx, BehaviorKind};

/// Nearby interactables as of the last scan, refreshed only after the agent
/// has moved far enough.
#[derive(Debug, Clone, Default)]
pub struct NearbyCache {
    origin: Option<Location>,
    ids: Vec<InteractableId>,
}

impl NearbyCache {
    /// Interactables within `radius` of `location`, rescanning `pool` when the
    /// agent has moved more than `rescan_distance` since the last scan.
    pub fn refresh(
        &mut self,
        pool: &impl SpatialQuery,
        location: Location,
        radius: f32,
        rescan_distance: f32,
    ) -> &[InteractableId] {
        let stale = self
            .origin
            .is_none_or(|origin| !origin.within(&location, rescan_distance));
        if stale {
            self.ids = pool.nearby(location, radius);
            self.origin = Some(location);
        }
        &self.ids
    }

    /// Force a rescan on next use.
    pub fn invalidate(&mut self) {
        self.origin = None;
    }
}

impl Behavior {
    /// Whether the behavior could run now. Finds and stores the target
    /// interactable as a side effect.
    pub fn is_available(&mut self, ctx: &mut BehaviorCtx<'_>) -> bool {
        if !self.prioritized && !self.is_running() && self.spec.retry_frequency > 0.0 {
            if let Some(last) = self.last_started {
                if ctx.now < last.after(self.spec.retry_frequency) {
                    return false;
                }
            }
        }

        let stats = &ctx.agent.stats;
        let gates_hold = self
            .spec
            .required_stats
            .iter()
            .all(|gate| stats.stat(&gate.stat).is_some_and(|s| gate.is_satisfied(s)));
        if !gates_hold {
            return false;
        }

        if !self
            .spec
            .required_world_states
            .iter()
            .all(|state| ctx.host.is_world_state_valid(state))
        {
            return false;
        }

        if let BehaviorKind::ActorInteraction(handshake) = &self.kind {
            if !self.is_running() && handshake.min_group_size > 1 {
                let peers = ctx.sensed_agents(&handshake.capability, handshake.sensing_range);
                if peers.len() + 1 < handshake.min_group_size {
                    return false;
                }
            }
        }

        if !self.spec.requires_interactable() {
            return true;
        }
        if self.is_running() {
            return self.target.is_some_and(|t| ctx.interactables.is_live(t));
        }
        self.target = self.find_target(ctx);
        self.target.is_some()
    }

    /// Nearest valid interactable among nearby and remembered ones.
    fn find_target(&mut self, ctx: &BehaviorCtx<'_>) -> Option<InteractableId> {
        let agent = &*ctx.agent;
        let radius = self
            .spec
            .search_radius
            .unwrap_or(ctx.config.sensing.interactable_search_radius);
        let mut candidates = self
            .nearby
            .refresh(&*ctx.interactables, agent.location, radius, ctx.config.sensing.rescan_distance)
            .to_vec();
        for id in remembered_sources(agent, self, ctx) {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        candidates
            .into_iter()
            .filter_map(|id| ctx.interactables.get(id))
            .filter(|i| self.accepts(i, agent, ctx))
            .min_by_key(|i| OrderedFloat(i.location.distance_squared(&agent.location)))
            .map(|i| i.id)
    }

    fn accepts(&self, interactable: &Interactable, agent: &Agent, ctx: &BehaviorCtx<'_>) -> bool {
        let fits_kind = match self.kind {
            BehaviorKind::Building => interactable.is_incomplete(),
            _ => interactable.satisfies(&self.spec.desired_stat_impacts),
        };
        fits_kind
            && (interactable.has_space() || interactable.is_reserved_by(agent.id))
            && !interactable.is_on_cooldown_for(agent.id, ctx.now)
            && interactable.has_required_resource()
    }

    /// Utility weight: one plus the normalized distance of every unsatisfied
    /// desired state this behavior relieves, scaled by the noisy multiplier
    /// and boosted when prioritized.
    pub fn weight<R: Rng + ?Sized>(&self, agent: &Agent, prioritized_boost: f32, rng: &mut R) -> f32 {
        let stats = &agent.stats;
        let relief: f32 = stats
            .unsatisfied_desired_states()
            .into_iter()
            .filter_map(|desired| {
                let normalized = stats.normalized(&desired.stat)?;
                self.spec
                    .desired_stat_impacts
                    .iter()
                    .any(|impact| impact.relieves(desired, normalized))
                    .then(|| desired.distance(normalized))
            })
            .sum();

        let variation = self.spec.variation.abs();
        let noise = if variation > 0.0 {
            rng.gen_range(-variation..=variation)
        } else {
            0.0
        };
        let weight = (1.0 + relief) * (self.spec.multiplier + noise);
        if self.prioritized {
            weight * prioritized_boost
        } else {
            weight
        }
    }
}

/// Interactables the agent remembers as good for a stat this behavior aims at
/// and that are ready to return to.
fn remembered_sources(agent: &Agent, behavior: &Behavior, ctx: &BehaviorCtx<'_>) -> Vec<InteractableId> {
    let mut ids = Vec::new();
    for impact in &behavior.spec.desired_stat_impacts {
        for memory in agent.memory.recall_influencing_stat(&impact.stat) {
            if !memory.is_good || !memory.ready_to_return(ctx.now) {
                continue;
            }
            if let Some(SourceId::Interactable(id)) = memory.about {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorKindSpec, BehaviorSpec, Gatherings};
    use crate::config::{BrainzConfig, MemoryConfig};
    use crate::host::InstantHost;
    use crate::influencer::InfluencerTemplate;
    use crate::interactable::{InteractablePool, InteractableSpec};
    use crate::metrics::BrainzCounters;
    use crate::stat::{DesiredState, Objective, StatImpact, StatTemplate};
    use crate::types::{AgentId, SimTime};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn hungry_agent() -> Agent {
        let mut agent = Agent::new(AgentId(0), "Ona", Location::default(), MemoryConfig::default(), 1);
        agent
            .stats
            .add_stat(&StatTemplate::new("hunger", 0.0, 100.0, 80.0))
            .expect("valid");
        agent
            .stats
            .add_desired_state(DesiredState::new("hunger", Objective::LessThan, 0.3));
        agent
    }

    fn feed() -> Behavior {
        let mut spec = BehaviorSpec::with_kind("feed", BehaviorKindSpec::Interaction);
        spec.desired_stat_impacts = vec![StatImpact::new("hunger", Objective::LessThan)];
        Behavior::new(spec)
    }

    fn pantry(x: f32) -> (InteractableSpec, Location) {
        (
            InteractableSpec {
                character_influences: vec![InfluencerTemplate::ramped("hunger", -40.0, 10.0)],
                ..InteractableSpec::named("pantry")
            },
            Location::new(x, 0.0, 0.0),
        )
    }

    struct Fixture {
        agent: Agent,
        pool: InteractablePool,
        gatherings: Gatherings,
        host: InstantHost,
        counters: BrainzCounters,
        config: BrainzConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                agent: hungry_agent(),
                pool: InteractablePool::new(),
                gatherings: Gatherings::new(),
                host: InstantHost,
                counters: BrainzCounters::new(),
                config: BrainzConfig::default(),
            }
        }

        fn ctx(&mut self) -> BehaviorCtx<'_> {
            BehaviorCtx {
                now: SimTime::ZERO,
                agent: &mut self.agent,
                interactables: &mut self.pool,
                gatherings: &mut self.gatherings,
                host: &mut self.host,
                counters: &self.counters,
                config: &self.config,
            }
        }
    }

    #[test]
    fn picks_nearest_satisfying_interactable() {
        let mut fx = Fixture::new();
        let (spec, far) = pantry(8.0);
        fx.pool.spawn(spec, far).expect("spawn");
        let (spec, near) = pantry(3.0);
        let near_id = fx.pool.spawn(spec, near).expect("spawn");

        let mut feed = feed();
        assert!(feed.is_available(&mut fx.ctx()));
        assert_eq!(feed.target(), Some(near_id));
    }

    #[test]
    fn unavailable_without_interactable() {
        let mut fx = Fixture::new();
        let mut feed = feed();
        assert!(!feed.is_available(&mut fx.ctx()));
    }

    #[test]
    fn full_interactable_is_skipped() {
        let mut fx = Fixture::new();
        let (spec, at) = pantry(3.0);
        let id = fx.pool.spawn(spec, at).expect("spawn");
        assert!(fx.pool.require_mut(id).expect("live").reserve_for(AgentId(5)));
        let mut feed = feed();
        assert!(!feed.is_available(&mut fx.ctx()));
    }

    #[test]
    fn required_stat_gate_fails_closed() {
        let mut fx = Fixture::new();
        let mut spec = BehaviorSpec::solitary("nap");
        spec.required_stats = vec![DesiredState::new("energy", Objective::LessThan, 0.5)];
        let mut nap = Behavior::new(spec);
        assert!(!nap.is_available(&mut fx.ctx()), "missing stat blocks");
    }

    #[test]
    fn weight_adds_relief_distance() {
        let agent = hungry_agent();
        let feed = feed();
        let mut rng = StdRng::seed_from_u64(0);
        assert!((feed.weight(&agent, 10.0, &mut rng) - 1.5).abs() < 1e-5);

        let mut prioritized = feed.clone();
        prioritized.set_prioritized(true);
        assert!((prioritized.weight(&agent, 10.0, &mut rng) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn variation_stays_in_band() {
        let agent = hungry_agent();
        let mut spec = BehaviorSpec::solitary("wander");
        spec.variation = 0.25;
        let wander = Behavior::new(spec);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let w = wander.weight(&agent, 10.0, &mut rng);
            assert!((0.75..=1.25).contains(&w));
        }
    }

    #[test]
    fn cache_rescans_only_after_moving() {
        let mut pool = InteractablePool::new();
        let mut cache = NearbyCache::default();
        assert!(cache.refresh(&pool, Location::default(), 10.0, 2.0).is_empty());

        let (spec, at) = pantry(3.0);
        pool.spawn(spec, at).expect("spawn");
        assert!(cache.refresh(&pool, Location::new(1.0, 0.0, 0.0), 10.0, 2.0).is_empty());
        assert_eq!(cache.refresh(&pool, Location::new(2.5, 0.0, 0.0), 10.0, 2.0).len(), 1);
    }
}
