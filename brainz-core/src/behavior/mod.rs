//! Behaviors: selectable units of conduct.
//!
//! Every behavior shares one contract (availability, weight, start, update,
//! finish) carried by [`Behavior`]; what differs between kinds lives in the
//! closed [`BehaviorKind`] enum:
//!
//! | Kind               | Needs an interactable | Extra state            |
//! |--------------------|-----------------------|------------------------|
//! | `Solitary`         | no                    | none                   |
//! | `Interaction`      | yes (satisfying one)  | none                   |
//! | `ActorInteraction` | no                    | handshake / gathering  |
//! | `Building`         | yes (incomplete one)  | none                   |
//!
//! Runtime states: `Idle → (Approaching | Handshaking) → Executing →
//! Finishing → Idle`. Evaluation happens synchronously inside an arbitration
//! pass and is not a stored state.

pub mod availability;
pub mod gathering;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::{Agent, InfluenceOutcome};
use crate::config::BrainzConfig;
use crate::error::{BrainzError, Result};
use crate::host::Host;
use crate::influencer::{Influencer, InfluencerTemplate};
use crate::interactable::{InteractablePool, InteractionStart};
use crate::metrics::BrainzCounters;
use crate::stat::{DesiredState, StatImpact};
use crate::tracker::StatsTracker;
use crate::types::{AgentId, EntityRef, InteractableId, Location, SimTime, SourceId};

pub use availability::NearbyCache;
pub use gathering::{Gathering, GatheringId, Gatherings};

// ---------------------------------------------------------------------------
// Static description
// ---------------------------------------------------------------------------

/// Kind-specific parameters of a behavior definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorKindSpec {
    /// Done alone, anywhere.
    Solitary,
    /// Done at an interactable whose character influences satisfy the impacts.
    Interaction,
    /// Done together with sensed peers running the same behavior.
    ActorInteraction {
        /// Sensing capability tag peers must carry.
        #[serde(default = "default_capability")]
        capability: String,
        /// Members needed to commit.
        #[serde(default = "default_min_group")]
        min_group_size: usize,
        /// Members tolerated while committed.
        #[serde(default = "default_max_group")]
        max_group_size: usize,
        /// Seconds to wait for enough members.
        #[serde(default = "default_handshake_timeout")]
        handshake_timeout: f32,
        /// Sensing range for peers.
        #[serde(default = "default_sensing_range")]
        sensing_range: f32,
    },
    /// Done at an interactable whose progress stat is incomplete.
    Building,
}

/// Static description of a behavior, shared by every agent that registers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    /// Unique name within an agent.
    pub name: String,
    /// Kind and kind-specific parameters.
    #[serde(flatten)]
    pub kind: BehaviorKindSpec,
    /// Minimum seconds between starts, unless prioritized.
    #[serde(default)]
    pub retry_frequency: f32,
    /// Seconds the behavior executes for once started.
    #[serde(default = "default_execution_time")]
    pub maximum_execution_time: f32,
    /// Blocking behaviors occupy the agent exclusively.
    #[serde(default = "default_true")]
    pub is_blocking: bool,
    /// Whether a higher-weight candidate may preempt it.
    #[serde(default = "default_true")]
    pub is_interruptible: bool,
    /// Stat gates that must all hold for availability.
    #[serde(default)]
    pub required_stats: Vec<DesiredState>,
    /// Which stats the behavior pushes, and which way.
    #[serde(default)]
    pub desired_stat_impacts: Vec<StatImpact>,
    /// Influences the behavior itself grants its agent.
    #[serde(default)]
    pub influences: Vec<InfluencerTemplate>,
    /// World states that must hold for availability.
    #[serde(default)]
    pub required_world_states: Vec<String>,
    /// Weight multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
    /// Half-width of the uniform noise added to the multiplier.
    #[serde(default)]
    pub variation: f32,
    /// Interactable search radius; the configured default when absent.
    #[serde(default)]
    pub search_radius: Option<f32>,
    /// Cue played on start.
    #[serde(default)]
    pub start_cue: Option<String>,
    /// Cue played on finish; the agent is free once it completes.
    #[serde(default)]
    pub end_cue: Option<String>,
    /// Behavior prioritized for the next arbitration after this one finishes.
    #[serde(default)]
    pub chain_next: Option<String>,
}

impl BehaviorSpec {
    /// A blocking solitary behavior with defaults.
    #[must_use]
    pub fn solitary(name: impl Into<String>) -> Self {
        Self::with_kind(name, BehaviorKindSpec::Solitary)
    }

    /// A blocking behavior of the given kind with defaults.
    #[must_use]
    pub fn with_kind(name: impl Into<String>, kind: BehaviorKindSpec) -> Self {
        Self {
            name: name.into(),
            kind,
            retry_frequency: 0.0,
            maximum_execution_time: default_execution_time(),
            is_blocking: true,
            is_interruptible: true,
            required_stats: Vec::new(),
            desired_stat_impacts: Vec::new(),
            influences: Vec::new(),
            required_world_states: Vec::new(),
            multiplier: 1.0,
            variation: 0.0,
            search_radius: None,
            start_cue: None,
            end_cue: None,
            chain_next: None,
        }
    }

    /// Whether the behavior only runs at an interactable.
    #[must_use]
    pub fn requires_interactable(&self) -> bool {
        matches!(self.kind, BehaviorKindSpec::Interaction | BehaviorKindSpec::Building)
    }

    /// Check that every stat the behavior gates on or aims at exists.
    ///
    /// # Errors
    /// Returns [`BrainzError::UnknownStat`] for the first missing stat.
    pub fn validate(&self, stats: &StatsTracker) -> Result<()> {
        let referenced = self
            .required_stats
            .iter()
            .map(|d| d.stat.as_str())
            .chain(self.desired_stat_impacts.iter().map(|i| i.stat.as_str()));
        for stat in referenced {
            if !stats.has_stat(stat) {
                return Err(BrainzError::UnknownStat {
                    behavior: self.name.clone(),
                    stat: stat.to_string(),
                });
            }
        }
        if let BehaviorKindSpec::ActorInteraction { min_group_size, max_group_size, .. } = &self.kind {
            if max_group_size < min_group_size {
                return Err(BrainzError::Config(format!(
                    "behavior '{}': max_group_size {max_group_size} below min_group_size {min_group_size}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool { true }
fn default_execution_time() -> f32 { 10.0 }
fn default_multiplier() -> f32 { 1.0 }
fn default_capability() -> String { "agent".to_string() }
fn default_min_group() -> usize { 2 }
fn default_max_group() -> usize { 4 }
fn default_handshake_timeout() -> f32 { 10.0 }
fn default_sensing_range() -> f32 { 10.0 }

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Where a behavior is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    /// Not running.
    Idle,
    /// Reserved an interactable and walking to it.
    Approaching,
    /// Waiting for enough peers to commit.
    Handshaking,
    /// Running until its end time.
    Executing,
    /// Done; the brain will finish it this tick.
    Finishing,
}

/// Per-kind runtime data.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorKind {
    /// See [`BehaviorKindSpec::Solitary`].
    Solitary,
    /// See [`BehaviorKindSpec::Interaction`].
    Interaction,
    /// See [`BehaviorKindSpec::ActorInteraction`].
    ActorInteraction(Handshake),
    /// See [`BehaviorKindSpec::Building`].
    Building,
}

/// Handshake parameters and progress for an actor interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    /// Capability tag peers carry.
    pub capability: String,
    /// Members needed to commit.
    pub min_group_size: usize,
    /// Members tolerated while committed.
    pub max_group_size: usize,
    /// Seconds to wait for enough members.
    pub timeout: f32,
    /// Peer sensing range.
    pub sensing_range: f32,
    /// The gathering this agent belongs to while running.
    pub gathering: Option<GatheringId>,
    /// When the handshake began.
    pub started_at: SimTime,
}

impl BehaviorKind {
    fn from_spec(spec: &BehaviorKindSpec) -> Self {
        match spec {
            BehaviorKindSpec::Solitary => Self::Solitary,
            BehaviorKindSpec::Interaction => Self::Interaction,
            BehaviorKindSpec::Building => Self::Building,
            BehaviorKindSpec::ActorInteraction {
                capability,
                min_group_size,
                max_group_size,
                handshake_timeout,
                sensing_range,
            } => Self::ActorInteraction(Handshake {
                capability: capability.clone(),
                min_group_size: *min_group_size,
                max_group_size: *max_group_size,
                timeout: *handshake_timeout,
                sensing_range: *sensing_range,
                gathering: None,
                started_at: SimTime::ZERO,
            }),
        }
    }
}

/// Everything a behavior may touch during one call.
pub struct BehaviorCtx<'a> {
    /// Current simulation time.
    pub now: SimTime,
    /// The owning agent.
    pub agent: &'a mut Agent,
    /// The world's interactables.
    pub interactables: &'a mut InteractablePool,
    /// The world's gatherings.
    pub gatherings: &'a mut Gatherings,
    /// Host collaborators.
    pub host: &'a mut dyn Host,
    /// World counters.
    pub counters: &'a BrainzCounters,
    /// World configuration.
    pub config: &'a BrainzConfig,
}

impl BehaviorCtx<'_> {
    /// Agents carrying `capability` within `range` of this agent.
    fn sensed_agents(&self, capability: &str, range: f32) -> Vec<AgentId> {
        self.host
            .sensed_entities(self.agent.id, capability, 0.0, range)
            .into_iter()
            .filter_map(|e| match e {
                EntityRef::Agent(id) if id != self.agent.id => Some(id),
                _ => None,
            })
            .collect()
    }

    fn grant(&mut self, influencer: Influencer) {
        match self.agent.try_add_influencer(influencer, self.now) {
            InfluenceOutcome::Accepted(report) => {
                BrainzCounters::bump(&self.counters.influencers_added);
                self.count_memory(usize::from(report.merged), report.promoted, report.evicted_short + report.evicted_long);
            }
            InfluenceOutcome::Rejected => BrainzCounters::bump(&self.counters.influencers_rejected),
        }
    }

    fn count_start(&self, start: &InteractionStart) {
        BrainzCounters::add(&self.counters.influencers_added, start.granted);
        BrainzCounters::add(&self.counters.influencers_rejected, start.rejected);
        self.count_memory(start.merged, start.promoted, start.evicted);
    }

    fn count_memory(&self, merged: usize, promoted: usize, evicted: usize) {
        BrainzCounters::add(&self.counters.memories_merged, merged);
        BrainzCounters::add(&self.counters.memories_promoted, promoted);
        BrainzCounters::add(&self.counters.memories_evicted, evicted);
    }
}

/// What an update asks the brain to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Keep running.
    Running,
    /// Finish now; `early` when it did not reach its end time.
    Finish {
        /// Ended before its end time.
        early: bool,
    },
}

/// What finishing produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    /// When the agent is free again (end cue completion).
    pub free_at: SimTime,
    /// Behavior to prioritize next.
    pub chain_next: Option<String>,
}

/// One agent's instance of a behavior.
#[derive(Debug, Clone)]
pub struct Behavior {
    spec: BehaviorSpec,
    kind: BehaviorKind,
    state: BehaviorState,
    end_time: SimTime,
    last_started: Option<SimTime>,
    approach_started: SimTime,
    prioritized: bool,
    started: bool,
    target: Option<InteractableId>,
    nearby: NearbyCache,
}

impl Behavior {
    /// Instantiate a definition.
    #[must_use]
    pub fn new(spec: BehaviorSpec) -> Self {
        Self {
            kind: BehaviorKind::from_spec(&spec.kind),
            spec,
            state: BehaviorState::Idle,
            end_time: SimTime::ZERO,
            last_started: None,
            approach_started: SimTime::ZERO,
            prioritized: false,
            started: false,
            target: None,
            nearby: NearbyCache::default(),
        }
    }

    /// Behavior name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Static description.
    #[must_use]
    pub fn spec(&self) -> &BehaviorSpec {
        &self.spec
    }

    /// Runtime kind data.
    #[must_use]
    pub fn kind(&self) -> &BehaviorKind {
        &self.kind
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> BehaviorState {
        self.state
    }

    /// Whether the behavior is anywhere between selection and finish.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state != BehaviorState::Idle
    }

    /// Whether the behavior has started executing.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.state == BehaviorState::Executing
    }

    /// Blocking flag.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.spec.is_blocking
    }

    /// Interruptible flag.
    #[must_use]
    pub fn is_interruptible(&self) -> bool {
        self.spec.is_interruptible
    }

    /// Whether an external request or chain prioritized it.
    #[must_use]
    pub fn is_prioritized(&self) -> bool {
        self.prioritized
    }

    /// Mark (or unmark) as prioritized for the next arbitration.
    pub fn set_prioritized(&mut self, prioritized: bool) {
        self.prioritized = prioritized;
    }

    /// The chosen interactable, once availability found one.
    #[must_use]
    pub fn target(&self) -> Option<InteractableId> {
        self.target
    }

    /// When execution ends.
    #[must_use]
    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    fn source(&self) -> SourceId {
        SourceId::Behavior(self.spec.name.clone())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Whether [`Behavior::begin`] would succeed: behaviors that need an
    /// interactable must hold a target with room for this agent.
    #[must_use]
    pub fn can_begin(&self, ctx: &BehaviorCtx<'_>) -> bool {
        if !self.spec.requires_interactable() {
            return true;
        }
        self.target
            .and_then(|t| ctx.interactables.get(t))
            .is_some_and(|i| i.has_space() || i.is_reserved_by(ctx.agent.id) || i.is_used_by(ctx.agent.id))
    }

    /// Take the first step after winning arbitration: reserve and walk to the
    /// target, open a handshake, or start right away.
    ///
    /// Returns `false` when the target could not be reserved.
    pub fn begin(&mut self, ctx: &mut BehaviorCtx<'_>) -> bool {
        if self.spec.requires_interactable() {
            let Some(target) = self.target else {
                return false;
            };
            let Some(interactable) = ctx.interactables.get_mut(target) else {
                self.target = None;
                return false;
            };
            if !interactable.reserve_for(ctx.agent.id) {
                BrainzCounters::bump(&ctx.counters.reservations_refused);
                debug!(agent = %ctx.agent.id, behavior = %self.spec.name, interactable = %target, "reservation refused");
                self.target = None;
                self.nearby.invalidate();
                return false;
            }
            let location = interactable.location;
            ctx.host.move_to(ctx.agent.id, location);
            self.state = BehaviorState::Approaching;
            self.approach_started = ctx.now;
            debug!(agent = %ctx.agent.id, behavior = %self.spec.name, interactable = %target, "approaching");
            return true;
        }

        if let BehaviorKind::ActorInteraction(handshake) = &mut self.kind {
            let peers = ctx.sensed_agents(&handshake.capability, handshake.sensing_range);
            let gathering = match ctx
                .gatherings
                .find_for_peers(&self.spec.name, &peers, handshake.max_group_size, None)
            {
                Some(existing) => {
                    ctx.gatherings.join(existing, ctx.agent.id);
                    existing
                }
                None => ctx.gatherings.open(&self.spec.name, ctx.agent.id),
            };
            handshake.gathering = Some(gathering);
            handshake.started_at = ctx.now;
            self.state = BehaviorState::Handshaking;
            debug!(agent = %ctx.agent.id, behavior = %self.spec.name, gathering = %gathering, "handshaking");
            return true;
        }

        let duration = self.spec.maximum_execution_time;
        self.start(ctx, duration);
        true
    }

    /// Enter `Executing` for `duration` seconds and grant influences.
    pub fn start(&mut self, ctx: &mut BehaviorCtx<'_>, duration: f32) {
        self.state = BehaviorState::Executing;
        self.started = true;
        self.end_time = ctx.now.after(duration);
        self.last_started = Some(ctx.now);

        if let Some(target) = self.target {
            if let Some(interactable) = ctx.interactables.get_mut(target) {
                match interactable.start_interaction(ctx.agent, ctx.now) {
                    Ok(start) => ctx.count_start(&start),
                    Err(e) => warn!(agent = %ctx.agent.id, behavior = %self.spec.name, error = %e, "interaction refused"),
                }
            }
        }

        let source = self.source();
        for template in self.spec.influences.iter().filter(|t| !t.on_completion) {
            let influencer = Influencer::from_template(template, &self.spec.name, source.clone(), ctx.now);
            ctx.grant(influencer);
        }

        if let Some(cue) = &self.spec.start_cue {
            ctx.host.prompt(ctx.agent.id, cue, ctx.now);
        }
        BrainzCounters::bump(&ctx.counters.behaviors_started);
        debug!(agent = %ctx.agent.id, behavior = %self.spec.name, until = self.end_time.secs(), "behavior started");
    }

    /// Advance the running behavior by one tick.
    pub fn update(&mut self, ctx: &mut BehaviorCtx<'_>) -> Progress {
        let progress = match self.state {
            BehaviorState::Idle => Progress::Running,
            BehaviorState::Finishing => Progress::Finish { early: true },
            BehaviorState::Approaching => self.update_approach(ctx),
            BehaviorState::Handshaking => self.update_handshake(ctx),
            BehaviorState::Executing => self.update_executing(ctx),
        };
        if matches!(progress, Progress::Finish { .. }) {
            self.state = BehaviorState::Finishing;
        }
        progress
    }

    fn update_approach(&mut self, ctx: &mut BehaviorCtx<'_>) -> Progress {
        let Some(location) = self.target.and_then(|t| ctx.interactables.get(t)).map(|i| i.location) else {
            debug!(agent = %ctx.agent.id, behavior = %self.spec.name, "target vanished while approaching");
            return Progress::Finish { early: true };
        };
        if ctx.host.has_reached_target(ctx.agent.id) {
            ctx.agent.location = location;
            let duration = self.spec.maximum_execution_time;
            self.start(ctx, duration);
            return Progress::Running;
        }
        if ctx.now.seconds_since(self.approach_started) >= ctx.config.arbiter.approach_timeout_secs {
            warn!(agent = %ctx.agent.id, behavior = %self.spec.name, "approach timed out");
            return Progress::Finish { early: true };
        }
        Progress::Running
    }

    fn update_handshake(&mut self, ctx: &mut BehaviorCtx<'_>) -> Progress {
        let BehaviorKind::ActorInteraction(handshake) = &mut self.kind else {
            return Progress::Finish { early: true };
        };
        let Some(mut gathering) = handshake.gathering else {
            return Progress::Finish { early: true };
        };
        if ctx.gatherings.size(gathering) == 1 {
            let peers = ctx.sensed_agents(&handshake.capability, handshake.sensing_range);
            if let Some(older) =
                ctx.gatherings
                    .find_for_peers(&self.spec.name, &peers, handshake.max_group_size, Some(gathering))
            {
                ctx.gatherings.leave(gathering, ctx.agent.id);
                ctx.gatherings.join(older, ctx.agent.id);
                handshake.gathering = Some(older);
                gathering = older;
                debug!(agent = %ctx.agent.id, behavior = %self.spec.name, gathering = %older, "merged into older gathering");
            }
        }

        if ctx.gatherings.size(gathering) >= handshake.min_group_size {
            let duration = self.spec.maximum_execution_time;
            self.start(ctx, duration);
            return Progress::Running;
        }
        if ctx.now.seconds_since(handshake.started_at) >= handshake.timeout {
            debug!(agent = %ctx.agent.id, behavior = %self.spec.name, "handshake timed out");
            return Progress::Finish { early: true };
        }
        Progress::Running
    }

    fn update_executing(&mut self, ctx: &mut BehaviorCtx<'_>) -> Progress {
        if let BehaviorKind::ActorInteraction(handshake) = &self.kind {
            let Some(gathering) = handshake.gathering else {
                return Progress::Finish { early: true };
            };
            let dropped = ctx.gatherings.trim_to(gathering, handshake.max_group_size);
            if !dropped.is_empty() {
                debug!(gathering = %gathering, dropped = dropped.len(), "gathering over capacity");
            }
            if !ctx.gatherings.contains(gathering, ctx.agent.id)
                || ctx.gatherings.size(gathering) < handshake.min_group_size
            {
                debug!(agent = %ctx.agent.id, behavior = %self.spec.name, "group fell apart");
                return Progress::Finish { early: true };
            }
        }
        if ctx.now >= self.end_time {
            return Progress::Finish { early: false };
        }
        Progress::Running
    }

    /// Finish and return to `Idle`.
    ///
    /// An early finish cancels the ramps this behavior and its interactable
    /// granted and skips on-completion influences.
    pub fn finish(&mut self, ctx: &mut BehaviorCtx<'_>, early: bool) -> Finished {
        let was_executing = std::mem::take(&mut self.started);
        let source = self.source();

        if early {
            let mut cancelled = ctx.agent.stats.cancel_from(&source);
            if let Some(target) = self.target {
                cancelled += ctx.agent.stats.cancel_from(&SourceId::Interactable(target));
            }
            if cancelled > 0 {
                debug!(agent = %ctx.agent.id, behavior = %self.spec.name, cancelled, "pending influences cancelled");
            }
        } else {
            for template in self.spec.influences.iter().filter(|t| t.on_completion) {
                ctx.agent.stats.apply_direct(&template.stat, template.max_change);
            }
        }

        if let Some(target) = self.target.take() {
            let mut destroy = false;
            if let Some(interactable) = ctx.interactables.get_mut(target) {
                interactable.clear_reservation(ctx.agent.id);
                if was_executing && !early {
                    destroy = interactable.stop_interaction(ctx.agent);
                } else {
                    interactable.forget(ctx.agent.id);
                }
            }
            if destroy {
                ctx.interactables.destroy(target);
            }
        }
        ctx.host.stop_moving(ctx.agent.id);

        if let BehaviorKind::ActorInteraction(handshake) = &mut self.kind {
            if let Some(gathering) = handshake.gathering.take() {
                ctx.gatherings.leave(gathering, ctx.agent.id);
            }
        }

        let free_at = match &self.spec.end_cue {
            Some(cue) if was_executing => ctx.host.prompt(ctx.agent.id, cue, ctx.now).ends_at,
            _ => ctx.now,
        };

        if early {
            BrainzCounters::bump(&ctx.counters.behaviors_interrupted);
        } else {
            BrainzCounters::bump(&ctx.counters.behaviors_finished);
        }
        debug!(agent = %ctx.agent.id, behavior = %self.spec.name, early, "behavior finished");

        self.state = BehaviorState::Idle;
        Finished {
            free_at,
            chain_next: if early { None } else { self.spec.chain_next.clone() },
        }
    }

    /// Where the behavior wants the agent, if anywhere.
    #[must_use]
    pub fn target_location(&self, interactables: &InteractablePool) -> Option<Location> {
        self.target.and_then(|t| interactables.get(t)).map(|i| i.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::host::{CueWindow, Movement, Presentation, Sensing, WorldStateQuery};

    /// Senses a fixed set of agents and nothing else.
    #[derive(Default)]
    struct Crowd(Vec<AgentId>);

    impl Movement for Crowd {
        fn move_to(&mut self, _agent: AgentId, _target: Location) {}

        fn has_reached_target(&self, _agent: AgentId) -> bool {
            true
        }

        fn stop_moving(&mut self, _agent: AgentId) {}

        fn position(&self, _agent: AgentId) -> Option<Location> {
            None
        }
    }

    impl Presentation for Crowd {
        fn prompt(&mut self, _agent: AgentId, _cue: &str, now: SimTime) -> CueWindow {
            CueWindow::instant(now)
        }
    }

    impl Sensing for Crowd {
        fn sensed_entities(&self, _agent: AgentId, _capability: &str, _min: f32, _max: f32) -> Vec<EntityRef> {
            self.0.iter().copied().map(EntityRef::Agent).collect()
        }
    }

    impl WorldStateQuery for Crowd {
        fn is_world_state_valid(&self, _state: &str) -> bool {
            true
        }
    }

    struct Fixture {
        agent: Agent,
        pool: InteractablePool,
        gatherings: Gatherings,
        host: Crowd,
        counters: BrainzCounters,
        config: BrainzConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                agent: Agent::new(AgentId(0), "Ada", Location::default(), MemoryConfig::default(), 0),
                pool: InteractablePool::new(),
                gatherings: Gatherings::new(),
                host: Crowd::default(),
                counters: BrainzCounters::new(),
                config: BrainzConfig::default(),
            }
        }

        fn ctx(&mut self, now: f64) -> BehaviorCtx<'_> {
            BehaviorCtx {
                now: SimTime::from_secs(now),
                agent: &mut self.agent,
                interactables: &mut self.pool,
                gatherings: &mut self.gatherings,
                host: &mut self.host,
                counters: &self.counters,
                config: &self.config,
            }
        }
    }

    fn pair_chat() -> Behavior {
        Behavior::new(BehaviorSpec::with_kind(
            "chat",
            BehaviorKindSpec::ActorInteraction {
                capability: "agent".into(),
                min_group_size: 2,
                max_group_size: 2,
                handshake_timeout: 5.0,
                sensing_range: 10.0,
            },
        ))
    }

    fn gathering_of(behavior: &Behavior) -> Option<GatheringId> {
        match behavior.kind() {
            BehaviorKind::ActorInteraction(handshake) => handshake.gathering,
            _ => None,
        }
    }

    #[test]
    fn committed_group_trims_late_joiners_and_ends_below_minimum() {
        let mut fx = Fixture::new();
        let mut chat = pair_chat();
        assert!(chat.begin(&mut fx.ctx(0.0)));
        let group = gathering_of(&chat).expect("opened");
        assert_eq!(chat.state(), BehaviorState::Handshaking);

        fx.gatherings.join(group, AgentId(1));
        assert_eq!(chat.update(&mut fx.ctx(0.5)), Progress::Running);
        assert!(chat.is_executing());

        fx.gatherings.join(group, AgentId(2));
        assert_eq!(chat.update(&mut fx.ctx(1.0)), Progress::Running);
        assert_eq!(fx.gatherings.size(group), 2);
        assert!(!fx.gatherings.contains(group, AgentId(2)));

        fx.gatherings.leave(group, AgentId(1));
        assert_eq!(chat.update(&mut fx.ctx(1.5)), Progress::Finish { early: true });
    }

    #[test]
    fn lone_member_moves_into_older_gathering() {
        let mut fx = Fixture::new();
        let older = fx.gatherings.open("chat", AgentId(1));
        let mut chat = pair_chat();
        assert!(chat.begin(&mut fx.ctx(0.0)));
        let own = gathering_of(&chat).expect("opened");
        assert_ne!(own, older);

        fx.host.0.push(AgentId(1));
        assert_eq!(chat.update(&mut fx.ctx(0.5)), Progress::Running);
        assert_eq!(gathering_of(&chat), Some(older));
        assert!(fx.gatherings.get(own).is_none());
        assert!(chat.is_executing());
    }

    #[test]
    fn early_finish_leaves_gathering_without_counting_completion() {
        let mut fx = Fixture::new();
        let mut chat = pair_chat();
        assert!(chat.begin(&mut fx.ctx(0.0)));
        let group = gathering_of(&chat).expect("opened");

        assert_eq!(chat.update(&mut fx.ctx(5.0)), Progress::Finish { early: true });
        chat.finish(&mut fx.ctx(5.0), true);
        assert!(fx.gatherings.get(group).is_none());
        assert_eq!(chat.state(), BehaviorState::Idle);
        let counts = fx.counters.snapshot();
        assert_eq!((counts.behaviors_started, counts.behaviors_interrupted), (0, 1));
    }
}
