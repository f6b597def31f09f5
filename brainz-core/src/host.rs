//! Host contracts: the narrow interfaces through which the engine drives
//! movement, presentation, sensing and world-state lookups it does not own.
//!
//! A host implements the four traits; [`Host`] is blanket-implemented for
//! anything that does.

use crate::types::{AgentId, EntityRef, Location, SimTime};

/// Walks agents around.
pub trait Movement {
    /// Start moving `agent` toward `target`.
    fn move_to(&mut self, agent: AgentId, target: Location);
    /// Whether `agent` has arrived at its last target.
    fn has_reached_target(&self, agent: AgentId) -> bool;
    /// Halt `agent` where it stands.
    fn stop_moving(&mut self, agent: AgentId);
    /// Where `agent` currently is, if the host tracks it.
    fn position(&self, agent: AgentId) -> Option<Location>;
}

/// When a presentation cue plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueWindow {
    /// When the cue begins.
    pub starts_at: SimTime,
    /// When it completes.
    pub ends_at: SimTime,
}

impl CueWindow {
    /// A cue that completes the moment it starts.
    #[must_use]
    pub fn instant(now: SimTime) -> Self {
        Self {
            starts_at: now,
            ends_at: now,
        }
    }
}

/// Plays animations, barks, and other fire-and-observe cues.
pub trait Presentation {
    /// Play `cue` for `agent`; the engine only uses the returned window.
    fn prompt(&mut self, agent: AgentId, cue: &str, now: SimTime) -> CueWindow;
}

/// Reports what an agent can perceive.
pub trait Sensing {
    /// Entities carrying `capability` between `min_range` and `max_range` of `agent`.
    fn sensed_entities(&self, agent: AgentId, capability: &str, min_range: f32, max_range: f32) -> Vec<EntityRef>;
}

/// Answers world-state preconditions ("is it daytime", "is the gate open").
pub trait WorldStateQuery {
    /// Whether the named state currently holds.
    fn is_world_state_valid(&self, state: &str) -> bool;
}

/// Everything the engine needs from its host.
pub trait Host: Movement + Presentation + Sensing + WorldStateQuery {}

impl<T: Movement + Presentation + Sensing + WorldStateQuery> Host for T {}

/// A host where movement is instant, cues take no time, nothing is sensed,
/// and every world state holds. Useful for tests and headless evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantHost;

impl Movement for InstantHost {
    fn move_to(&mut self, _agent: AgentId, _target: Location) {}

    fn has_reached_target(&self, _agent: AgentId) -> bool {
        true
    }

    fn stop_moving(&mut self, _agent: AgentId) {}

    fn position(&self, _agent: AgentId) -> Option<Location> {
        None
    }
}

impl Presentation for InstantHost {
    fn prompt(&mut self, _agent: AgentId, _cue: &str, now: SimTime) -> CueWindow {
        CueWindow::instant(now)
    }
}

impl Sensing for InstantHost {
    fn sensed_entities(&self, _agent: AgentId, _capability: &str, _min: f32, _max: f32) -> Vec<EntityRef> {
        Vec::new()
    }
}

impl WorldStateQuery for InstantHost {
    fn is_world_state_valid(&self, _state: &str) -> bool {
        true
    }
}
