//! Influencers: time-bounded or instant modifiers of exactly one stat.
//!
//! An influencer either lands its whole `max_change` on the first tick
//! (`duration == 0`) or ramps it in at `max_change / duration` per second.
//! The running total never exceeds `|max_change|` in magnitude.

use serde::{Deserialize, Serialize};

use crate::types::{SimTime, SourceId};

/// Remaining magnitude below which an influencer counts as exhausted.
pub const EXHAUSTION_EPSILON: f32 = 1e-4;

/// Static description of an effect granted by a behavior or interactable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerTemplate {
    /// Target stat.
    pub stat: String,
    /// Signed total change.
    pub max_change: f32,
    /// Ramp duration in seconds; `0` applies instantly.
    #[serde(default)]
    pub duration: f32,
    /// Seconds before the source is worth returning to.
    #[serde(default)]
    pub cooldown: f32,
    /// Applied directly when the granting behavior finishes instead of on start.
    #[serde(default)]
    pub on_completion: bool,
}

impl InfluencerTemplate {
    /// Instant template with no cooldown.
    #[must_use]
    pub fn instant(stat: impl Into<String>, max_change: f32) -> Self {
        Self {
            stat: stat.into(),
            max_change,
            duration: 0.0,
            cooldown: 0.0,
            on_completion: false,
        }
    }

    /// Template ramped over `duration` seconds.
    #[must_use]
    pub fn ramped(stat: impl Into<String>, max_change: f32, duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            ..Self::instant(stat, max_change)
        }
    }

    /// Set the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown.max(0.0);
        self
    }

    /// Mark as applied on completion.
    #[must_use]
    pub fn on_completion(mut self) -> Self {
        self.on_completion = true;
        self
    }
}

/// A live influence being applied to one stat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Influencer {
    /// Name of the interaction that granted it.
    pub interaction: String,
    /// Target stat.
    pub stat: String,
    /// Signed total change.
    pub max_change: f32,
    /// Ramp duration (`0` = instant).
    pub duration: f32,
    /// Cooldown carried into the memory of this influence.
    pub cooldown: f32,
    /// Generator identity; the influencer dies with it.
    pub source: SourceId,
    applied: f32,
    last_update: SimTime,
}

impl Influencer {
    /// Instantiate a template granted at `now`.
    #[must_use]
    pub fn from_template(
        template: &InfluencerTemplate,
        interaction: impl Into<String>,
        source: SourceId,
        now: SimTime,
    ) -> Self {
        Self {
            interaction: interaction.into(),
            stat: template.stat.clone(),
            max_change: template.max_change,
            duration: template.duration.max(0.0),
            cooldown: template.cooldown.max(0.0),
            source,
            applied: 0.0,
            last_update: now,
        }
    }

    /// Change applied so far.
    #[must_use]
    pub fn applied(&self) -> f32 {
        self.applied
    }

    /// Whether the whole change lands on the first tick.
    #[must_use]
    pub fn is_instant(&self) -> bool {
        self.duration <= 0.0
    }

    /// Ramp rate; the full change for instant influencers.
    #[must_use]
    pub fn change_per_second(&self) -> f32 {
        if self.is_instant() {
            self.max_change
        } else {
            self.max_change / self.duration
        }
    }

    /// Change still to be applied.
    #[must_use]
    pub fn remaining(&self) -> f32 {
        self.max_change - self.applied
    }

    /// Whether the full change has landed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining().abs() <= EXHAUSTION_EPSILON
    }

    /// Advance to `now` and return the increment to add to the target stat.
    ///
    /// The increment is clamped so `|applied| <= |max_change|` always holds.
    pub fn step(&mut self, now: SimTime) -> f32 {
        let remaining = self.remaining();
        let raw = if self.is_instant() {
            remaining
        } else {
            self.change_per_second() * now.seconds_since(self.last_update)
        };
        let delta = if self.max_change >= 0.0 {
            raw.clamp(0.0, remaining.max(0.0))
        } else {
            raw.clamp(remaining.min(0.0), 0.0)
        };
        self.applied += delta;
        if self.applied.abs() > self.max_change.abs() {
            self.applied = self.max_change;
        }
        if now > self.last_update {
            self.last_update = now;
        }
        delta
    }
}
