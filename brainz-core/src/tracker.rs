//! Stats tracker for one agent's (or interactable's) stats, drift, and live influencers.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::influencer::Influencer;
use crate::stat::{DesiredState, Stat, StatTemplate};
use crate::types::{SimTime, SourceId};

/// Owns a set of stats, the desired states over them, and active influencers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsTracker {
    stats: BTreeMap<String, Stat>,
    drift: BTreeMap<String, f32>,
    desired: Vec<DesiredState>,
    influencers: Vec<Influencer>,
    last_tick: Option<SimTime>,
}

impl StatsTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tracker from host-supplied templates.
    ///
    /// # Errors
    /// Returns the first invalid stat range encountered.
    pub fn from_templates(templates: &[StatTemplate]) -> Result<Self> {
        let mut tracker = Self::new();
        for template in templates {
            tracker.add_stat(template)?;
        }
        Ok(tracker)
    }

    /// Insert (or replace) a stat from its template.
    ///
    /// # Errors
    /// Returns [`BrainzError::InvalidStatRange`](crate::BrainzError::InvalidStatRange)
    /// for an empty range.
    pub fn add_stat(&mut self, template: &StatTemplate) -> Result<()> {
        let stat = template.build()?;
        if template.drift_per_second == 0.0 {
            self.drift.remove(&template.name);
        } else {
            self.drift.insert(template.name.clone(), template.drift_per_second);
        }
        self.stats.insert(template.name.clone(), stat);
        Ok(())
    }

    /// Idempotent lookup-or-insert. New stats use the default `[0, 100]` range.
    pub fn get_or_create_stat(&mut self, name: &str, default_value: f32) -> &mut Stat {
        self.stats
            .entry(name.to_string())
            .or_insert_with(|| Stat::with_default_range(name, default_value))
    }

    /// Look up a stat.
    #[must_use]
    pub fn stat(&self, name: &str) -> Option<&Stat> {
        self.stats.get(name)
    }

    /// Whether the stat exists.
    #[must_use]
    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    /// Raw value of a stat.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f32> {
        self.stats.get(name).map(Stat::value)
    }

    /// Normalized value of a stat.
    #[must_use]
    pub fn normalized(&self, name: &str) -> Option<f32> {
        self.stats.get(name).map(Stat::normalized)
    }

    /// All stats in name order.
    pub fn stats(&self) -> impl Iterator<Item = &Stat> {
        self.stats.values()
    }

    /// Register a desired state.
    pub fn add_desired_state(&mut self, desired: DesiredState) {
        self.desired.push(desired);
    }

    /// Registered desired states.
    #[must_use]
    pub fn desired_states(&self) -> &[DesiredState] {
        &self.desired
    }

    /// Desired states whose stat currently misses the objective.
    ///
    /// A desired state over a stat that does not exist is skipped.
    #[must_use]
    pub fn unsatisfied_desired_states(&self) -> Vec<&DesiredState> {
        self.desired
            .iter()
            .filter(|d| self.stats.get(&d.stat).is_some_and(|s| !d.is_satisfied(s)))
            .collect()
    }

    /// Accept an influencer into the active set. Never rejects at this layer.
    pub fn try_add_influencer(&mut self, influencer: Influencer) -> bool {
        trace!(stat = %influencer.stat, source = %influencer.source, "influencer added");
        self.influencers.push(influencer);
        true
    }

    /// Active influencers.
    #[must_use]
    pub fn influencers(&self) -> &[Influencer] {
        &self.influencers
    }

    /// Apply a change directly, bypassing the influencer ramp. Returns what landed.
    pub fn apply_direct(&mut self, stat: &str, change: f32) -> f32 {
        self.get_or_create_stat(stat, 0.0).apply(change)
    }

    /// Drop unfinished influencers granted by `source`; returns how many.
    pub fn cancel_from(&mut self, source: &SourceId) -> usize {
        let before = self.influencers.len();
        self.influencers.retain(|inf| &inf.source != source);
        before - self.influencers.len()
    }

    /// Advance drift and influencers to `now`, assuming every source is alive.
    pub fn tick(&mut self, now: SimTime) {
        self.tick_with_sources(now, |_| true);
    }

    /// Advance drift and influencers to `now`.
    ///
    /// Influencers whose source fails `is_live` are dropped without applying;
    /// exhausted influencers are removed after their final increment.
    pub fn tick_with_sources(&mut self, now: SimTime, is_live: impl Fn(&SourceId) -> bool) {
        let elapsed = self.last_tick.map_or(0.0, |last| now.seconds_since(last));
        if elapsed > 0.0 {
            for (name, per_second) in &self.drift {
                if let Some(stat) = self.stats.get_mut(name) {
                    stat.apply(per_second * elapsed);
                }
            }
        }
        if self.last_tick.is_none_or(|last| now > last) {
            self.last_tick = Some(now);
        }

        let stats = &mut self.stats;
        self.influencers.retain_mut(|inf| {
            if !is_live(&inf.source) {
                trace!(stat = %inf.stat, source = %inf.source, "influencer orphaned");
                return false;
            }
            let delta = inf.step(now);
            if delta != 0.0 {
                stats
                    .entry(inf.stat.clone())
                    .or_insert_with(|| Stat::with_default_range(inf.stat.as_str(), 0.0))
                    .apply(delta);
            }
            !inf.is_exhausted()
        });
    }
}
