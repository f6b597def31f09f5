//! A single remembered influence: "what did that do to me, and where".

use serde::{Deserialize, Serialize};

use crate::types::{Location, MemoryId, SimTime, SourceId};

/// One episodic record of an influence on a stat.
///
/// Short-term records merge in place; long-term records are immutable
/// aggregates produced by promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier for this memory.
    pub id: MemoryId,
    /// Who or what caused the influence, when known.
    pub about: Option<SourceId>,
    /// Where it happened.
    pub location: Location,
    /// Affected stat.
    pub stat: String,
    /// Signed net influence.
    pub influence: f32,
    /// Whether the influence moved the agent toward what it wants.
    pub is_good: bool,
    /// When the memory was formed or last refreshed.
    pub created_at: SimTime,
    /// Seconds before the source is worth returning to.
    pub cooldown: f32,
}

impl Memory {
    /// Create a memory.
    #[must_use]
    pub fn new(
        about: Option<SourceId>,
        location: Location,
        stat: impl Into<String>,
        influence: f32,
        is_good: bool,
        created_at: SimTime,
        cooldown: f32,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            about,
            location,
            stat: stat.into(),
            influence,
            is_good,
            created_at,
            cooldown: cooldown.max(0.0),
        }
    }

    /// `now >= created_at + cooldown`.
    #[must_use]
    pub fn ready_to_return(&self, now: SimTime) -> bool {
        now >= self.created_at.after(self.cooldown)
    }

    /// Same subject (or, both subject-less, same place) and same stat.
    #[must_use]
    pub fn same_subject(&self, other: &Self, radius: f32) -> bool {
        if self.stat != other.stat {
            return false;
        }
        match (&self.about, &other.about) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.location.within(&other.location, radius),
            _ => false,
        }
    }

    /// Fold a newer observation of the same subject into this one.
    ///
    /// The verdict flips to the newcomer's only when its influence pushes the
    /// other way and outweighs the accumulated influence.
    pub fn merge(&mut self, newer: &Self) {
        let opposed = self.influence * newer.influence < 0.0;
        if opposed && self.influence.abs() < newer.influence.abs() {
            self.is_good = newer.is_good;
        }
        self.influence += newer.influence;
        self.location = newer.location;
        self.created_at = newer.created_at;
        self.cooldown = newer.cooldown;
    }
}
