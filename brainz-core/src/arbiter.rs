//! The Brain: one agent's decision loop.
//!
//! Each agent carries its own schedule: an arbitration pass runs only when
//! `now >= next_decision_at`, and every pass pushes the next one out by the
//! decision interval with ± jitter so large populations do not all decide on
//! the same tick.
//!
//! Selection keeps the single strictly-greatest weight (ties keep the first
//! behavior seen). A running, non-interruptible behavior competes with the
//! configured floor weight instead of its computed one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, debug_span, warn};

use crate::behavior::{Behavior, BehaviorCtx, BehaviorSpec, Progress};
use crate::config::ArbiterConfig;
use crate::error::{BrainzError, Result};
use crate::metrics::{BrainzCounters, spans};
use crate::types::SimTime;

/// What an arbitration pass decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Not due yet, still busy, or locked by a non-interruptible behavior.
    Skipped,
    /// Nothing was available.
    Nothing,
    /// The winner was already running.
    Kept(String),
    /// A new behavior began (possibly the fallback).
    Began(String),
}

/// Per-agent arbiter owning the agent's behaviors.
#[derive(Debug, Clone)]
pub struct Brain {
    behaviors: Vec<Behavior>,
    active: Option<usize>,
    concurrent: Vec<usize>,
    fallback: Option<usize>,
    next_decision_at: SimTime,
    free_at: SimTime,
    config: ArbiterConfig,
    rng: StdRng,
}

impl Brain {
    /// Create a brain with no behaviors. `seed` drives jitter and weight noise.
    #[must_use]
    pub fn new(config: ArbiterConfig, seed: u64) -> Self {
        Self {
            behaviors: Vec::new(),
            active: None,
            concurrent: Vec::new(),
            fallback: None,
            next_decision_at: SimTime::ZERO,
            free_at: SimTime::ZERO,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Register a behavior.
    ///
    /// # Errors
    /// Returns [`BrainzError::Config`] when the name is already registered.
    pub fn register(&mut self, spec: BehaviorSpec) -> Result<()> {
        if self.index_of(&spec.name).is_some() {
            return Err(BrainzError::Config(format!("behavior '{}' registered twice", spec.name)));
        }
        self.behaviors.push(Behavior::new(spec));
        Ok(())
    }

    /// Use `name` when the winner needs an interactable it cannot reserve.
    ///
    /// # Errors
    /// Returns [`BrainzError::UnknownBehavior`] if `name` is not registered.
    pub fn set_fallback(&mut self, name: &str) -> Result<()> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| BrainzError::UnknownBehavior(name.to_string()))?;
        self.fallback = Some(idx);
        Ok(())
    }

    /// Mark `name` prioritized and make the next pass due immediately.
    ///
    /// # Errors
    /// Returns [`BrainzError::UnknownBehavior`] if `name` is not registered.
    pub fn prioritize(&mut self, name: &str, now: SimTime) -> Result<()> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| BrainzError::UnknownBehavior(name.to_string()))?;
        self.behaviors[idx].set_prioritized(true);
        if self.next_decision_at > now {
            self.next_decision_at = now;
        }
        Ok(())
    }

    /// Registered behaviors.
    #[must_use]
    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    /// Look up a behavior by name.
    #[must_use]
    pub fn behavior(&self, name: &str) -> Option<&Behavior> {
        self.index_of(name).map(|i| &self.behaviors[i])
    }

    /// The running blocking behavior.
    #[must_use]
    pub fn active(&self) -> Option<&Behavior> {
        self.active.map(|i| &self.behaviors[i])
    }

    /// Running non-blocking behaviors.
    pub fn concurrent(&self) -> impl Iterator<Item = &Behavior> {
        self.concurrent.iter().map(|&i| &self.behaviors[i])
    }

    /// When the next arbitration pass is due.
    #[must_use]
    pub fn next_decision_at(&self) -> SimTime {
        self.next_decision_at
    }

    /// When the last end cue completes.
    #[must_use]
    pub fn free_at(&self) -> SimTime {
        self.free_at
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.behaviors.iter().position(|b| b.name() == name)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance running behaviors, then arbitrate if due.
    pub fn tick(&mut self, ctx: &mut BehaviorCtx<'_>) -> Decision {
        self.update(ctx);
        self.arbitrate(ctx)
    }

    /// Advance every running behavior and finish the ones that are done.
    pub fn update(&mut self, ctx: &mut BehaviorCtx<'_>) {
        let _span = debug_span!(spans::BEHAVIOR_UPDATE, agent = %ctx.agent.id).entered();
        if let Some(idx) = self.active {
            if let Progress::Finish { early } = self.behaviors[idx].update(ctx) {
                self.active = None;
                self.finish(idx, ctx, early);
            }
        }
        let running = std::mem::take(&mut self.concurrent);
        for idx in running {
            match self.behaviors[idx].update(ctx) {
                Progress::Running => self.concurrent.push(idx),
                Progress::Finish { early } => self.finish(idx, ctx, early),
            }
        }
    }

    fn finish(&mut self, idx: usize, ctx: &mut BehaviorCtx<'_>, early: bool) {
        let finished = self.behaviors[idx].finish(ctx, early);
        if finished.free_at > self.free_at {
            self.free_at = finished.free_at;
        }
        if let Some(next) = finished.chain_next {
            if let Err(e) = self.prioritize(&next, ctx.now) {
                warn!(agent = %ctx.agent.id, behavior = self.behaviors[idx].name(), error = %e, "chained behavior missing");
            }
        }
    }

    /// Run one arbitration pass if the agent's schedule says it is due.
    pub fn arbitrate(&mut self, ctx: &mut BehaviorCtx<'_>) -> Decision {
        if ctx.now < self.next_decision_at {
            return Decision::Skipped;
        }
        self.schedule_next(ctx.now);
        if ctx.now < self.free_at {
            return Decision::Skipped;
        }
        if self
            .active
            .is_some_and(|i| self.behaviors[i].is_executing() && !self.behaviors[i].is_interruptible())
        {
            return Decision::Skipped;
        }

        let _span = debug_span!(spans::ARBITRATE, agent = %ctx.agent.id).entered();
        BrainzCounters::bump(&ctx.counters.decisions);

        let selected = self.select(ctx);
        for behavior in &mut self.behaviors {
            behavior.set_prioritized(false);
        }
        let Some((winner, weight)) = selected else {
            return Decision::Nothing;
        };
        let name = self.behaviors[winner].name().to_string();
        debug!(agent = %ctx.agent.id, behavior = %name, weight, "arbitration winner");

        self.switch_to(winner, name, ctx)
    }

    /// Start `winner` unless it is already running. A blocking winner
    /// preempts the active behavior only once it is known to be able to begin,
    /// so a refused reservation never leaves the agent idle.
    fn switch_to(&mut self, winner: usize, name: String, ctx: &mut BehaviorCtx<'_>) -> Decision {
        if self.active == Some(winner) || self.concurrent.contains(&winner) {
            return Decision::Kept(name);
        }

        if !self.behaviors[winner].is_blocking() {
            if self.behaviors[winner].begin(ctx) {
                self.concurrent.push(winner);
                return Decision::Began(name);
            }
            return Decision::Nothing;
        }

        if !self.behaviors[winner].can_begin(ctx) {
            BrainzCounters::bump(&ctx.counters.reservations_refused);
            if let Some(running) = self.active {
                let kept = self.behaviors[running].name().to_string();
                debug!(agent = %ctx.agent.id, behavior = %name, kept = %kept, "winner cannot begin");
                return Decision::Kept(kept);
            }
            return self.begin_fallback(winner, ctx);
        }

        if let Some(previous) = self.active.take() {
            debug!(agent = %ctx.agent.id, behavior = self.behaviors[previous].name(), "preempted");
            self.finish(previous, ctx, true);
        }

        if self.behaviors[winner].begin(ctx) {
            self.active = Some(winner);
            return Decision::Began(name);
        }
        self.begin_fallback(winner, ctx)
    }

    /// Strictly-greatest weight among available behaviors.
    fn select(&mut self, ctx: &mut BehaviorCtx<'_>) -> Option<(usize, f32)> {
        let boost = self.config.prioritized_boost;
        let floor = self.config.running_floor_weight;
        let mut best: Option<(usize, f32)> = None;

        for idx in 0..self.behaviors.len() {
            let running = self.active == Some(idx) || self.concurrent.contains(&idx);
            let behavior = &mut self.behaviors[idx];
            let weight = if running && !behavior.is_interruptible() {
                floor
            } else if running && !behavior.is_blocking() {
                continue;
            } else if behavior.is_available(ctx) {
                behavior.weight(ctx.agent, boost, &mut self.rng)
            } else {
                continue;
            };
            if best.is_none_or(|(_, top)| weight > top) {
                best = Some((idx, weight));
            }
        }
        best
    }

    fn begin_fallback(&mut self, failed: usize, ctx: &mut BehaviorCtx<'_>) -> Decision {
        let Some(fallback) = self.fallback.filter(|&f| f != failed) else {
            return Decision::Nothing;
        };
        let behavior = &mut self.behaviors[fallback];
        if behavior.is_running() || !behavior.is_available(ctx) || !behavior.begin(ctx) {
            return Decision::Nothing;
        }
        debug!(agent = %ctx.agent.id, behavior = behavior.name(), "fallback");
        let name = behavior.name().to_string();
        if behavior.is_blocking() {
            self.active = Some(fallback);
        } else {
            self.concurrent.push(fallback);
        }
        Decision::Began(name)
    }

    fn schedule_next(&mut self, now: SimTime) {
        let jitter = self.config.jitter_pct.abs();
        let factor = if jitter > 0.0 {
            1.0 + self.rng.gen_range(-jitter..=jitter)
        } else {
            1.0
        };
        self.next_decision_at = now.after(self.config.decision_interval_secs * factor);
    }

    /// Finish every running behavior early (agent removal, world reset).
    pub fn stop_all(&mut self, ctx: &mut BehaviorCtx<'_>) {
        if let Some(idx) = self.active.take() {
            self.finish(idx, ctx, true);
        }
        for idx in std::mem::take(&mut self.concurrent) {
            self.finish(idx, ctx, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::behavior::Gatherings;
    use crate::config::{BrainzConfig, MemoryConfig};
    use crate::host::InstantHost;
    use crate::interactable::InteractablePool;
    use crate::types::{AgentId, Location};

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
                agent: Agent::new(AgentId(0), "Tam", Location::default(), MemoryConfig::default(), 0),
                pool: InteractablePool::new(),
                gatherings: Gatherings::new(),
                host: InstantHost,
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

    fn weighted(name: &str, multiplier: f32) -> BehaviorSpec {
        let mut spec = BehaviorSpec::solitary(name);
        spec.multiplier = multiplier;
        spec
    }

    fn quiet() -> ArbiterConfig {
        ArbiterConfig {
            jitter_pct: 0.0,
            ..ArbiterConfig::default()
        }
    }

    #[test]
    fn highest_weight_wins_in_any_order() {
        let orders = [[0, 1, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let weights = [("stroll", 0.4), ("work", 0.9), ("idle", 0.2)];
        for order in orders {
            let mut fx = Fixture::new();
            let mut brain = Brain::new(quiet(), 1);
            for i in order {
                let (name, w) = weights[i];
                brain.register(weighted(name, w)).expect("unique");
            }
            assert_eq!(brain.arbitrate(&mut fx.ctx(0.0)), Decision::Began("work".into()));
        }
    }

    #[test]
    fn ties_keep_first_registered() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        brain.register(weighted("a", 0.5)).expect("unique");
        brain.register(weighted("b", 0.5)).expect("unique");
        assert_eq!(brain.arbitrate(&mut fx.ctx(0.0)), Decision::Began("a".into()));
    }

    #[test]
    fn waits_for_next_decision_time() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        brain.register(weighted("a", 0.5)).expect("unique");
        brain.arbitrate(&mut fx.ctx(0.0));
        assert_eq!(brain.arbitrate(&mut fx.ctx(0.1)), Decision::Skipped);
        assert_eq!(brain.arbitrate(&mut fx.ctx(0.5)), Decision::Kept("a".into()));
    }

    #[test]
    fn jitter_stays_within_band() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(ArbiterConfig::default(), 9);
        for step in 0..20 {
            let now = f64::from(step) * 10.0;
            brain.arbitrate(&mut fx.ctx(now));
            let gap = brain.next_decision_at().seconds_since(SimTime::from_secs(now));
            assert!((0.39..=0.61).contains(&gap), "gap {gap}");
        }
    }

    #[test]
    fn non_interruptible_behavior_locks_the_agent() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        let mut chore = weighted("chore", 0.5);
        chore.is_interruptible = false;
        brain.register(chore).expect("unique");
        brain.register(weighted("party", 5.0)).expect("unique");
        brain.prioritize("chore", SimTime::ZERO).expect("known");

        assert_eq!(brain.arbitrate(&mut fx.ctx(0.0)), Decision::Began("chore".into()));
        assert_eq!(brain.arbitrate(&mut fx.ctx(1.0)), Decision::Skipped);
        assert_eq!(brain.active().map(Behavior::name), Some("chore"));
    }

    #[test]
    fn higher_weight_preempts_interruptible() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        brain.register(weighted("rest", 0.5)).expect("unique");
        brain.register(weighted("flee", 0.4)).expect("unique");
        brain.arbitrate(&mut fx.ctx(0.0));

        brain.prioritize("flee", SimTime::from_secs(1.0)).expect("known");
        assert_eq!(brain.arbitrate(&mut fx.ctx(1.0)), Decision::Began("flee".into()));
        assert_eq!(fx.counters.snapshot().behaviors_interrupted, 1);
        assert!(!brain.behavior("rest").expect("registered").is_running());
    }

    #[test]
    fn refused_winner_keeps_running_behavior() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        brain.register(weighted("rest", 0.5)).expect("unique");
        brain
            .register(BehaviorSpec::with_kind("fetch", crate::behavior::BehaviorKindSpec::Interaction))
            .expect("unique");
        assert_eq!(brain.arbitrate(&mut fx.ctx(0.0)), Decision::Began("rest".into()));

        // "fetch" has no reservable target.
        let fetch = brain.index_of("fetch").expect("registered");
        assert_eq!(
            brain.switch_to(fetch, "fetch".into(), &mut fx.ctx(1.0)),
            Decision::Kept("rest".into())
        );
        assert!(brain.behavior("rest").expect("registered").is_running());
        assert_eq!(fx.counters.snapshot().behaviors_interrupted, 0);
        assert_eq!(fx.counters.snapshot().reservations_refused, 1);
    }

    #[test]
    fn idle_agent_falls_back_when_winner_is_refused() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        brain
            .register(BehaviorSpec::with_kind("fetch", crate::behavior::BehaviorKindSpec::Interaction))
            .expect("unique");
        brain.register(weighted("wander", 0.5)).expect("unique");
        brain.set_fallback("wander").expect("registered");

        let fetch = brain.index_of("fetch").expect("registered");
        assert_eq!(
            brain.switch_to(fetch, "fetch".into(), &mut fx.ctx(0.0)),
            Decision::Began("wander".into())
        );
        assert_eq!(brain.active().map(Behavior::name), Some("wander"));
        assert_eq!(fx.counters.snapshot().reservations_refused, 1);

        // The fallback never stands in for itself.
        let wander = brain.index_of("wander").expect("registered");
        brain.stop_all(&mut fx.ctx(0.5));
        assert_eq!(brain.begin_fallback(wander, &mut fx.ctx(0.5)), Decision::Nothing);
    }

    #[test]
    fn finished_behavior_chains_with_priority() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        let mut cook = weighted("cook", 2.0);
        cook.maximum_execution_time = 2.0;
        cook.chain_next = Some("eat".into());
        cook.retry_frequency = 100.0;
        brain.register(cook).expect("unique");
        brain.register(weighted("eat", 0.5)).expect("unique");

        brain.tick(&mut fx.ctx(0.0));
        brain.tick(&mut fx.ctx(2.0));
        assert!(brain.behavior("eat").expect("registered").is_running());
        assert_eq!(fx.counters.snapshot().behaviors_finished, 1);
    }

    #[test]
    fn non_blocking_runs_alongside() {
        let mut fx = Fixture::new();
        let mut brain = Brain::new(quiet(), 1);
        let mut hum = weighted("hum", 3.0);
        hum.is_blocking = false;
        brain.register(hum).expect("unique");
        brain.register(weighted("walk", 1.0)).expect("unique");

        assert_eq!(brain.arbitrate(&mut fx.ctx(0.0)), Decision::Began("hum".into()));
        assert_eq!(brain.arbitrate(&mut fx.ctx(0.5)), Decision::Began("walk".into()));
        assert_eq!(brain.concurrent().count(), 1);
        assert_eq!(brain.active().map(Behavior::name), Some("walk"));
    }

    #[test]
    fn duplicate_and_unknown_names_are_errors() {
        let mut brain = Brain::new(quiet(), 1);
        brain.register(weighted("a", 1.0)).expect("unique");
        assert!(matches!(brain.register(weighted("a", 1.0)), Err(BrainzError::Config(_))));
        assert!(matches!(brain.set_fallback("zzz"), Err(BrainzError::UnknownBehavior(_))));
    }
}
