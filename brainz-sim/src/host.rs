//! A flat-world host: agents walk in straight lines at a fixed speed, cues
//! last a fixed time, sensing is a radius query, and world states are a set
//! of names toggled by the runner.

use std::collections::{BTreeMap, BTreeSet};

use brainz_core::host::{CueWindow, Movement, Presentation, Sensing, WorldStateQuery};
use brainz_core::{AgentId, EntityRef, Location, SimTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Tuning for the reference host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSettings {
    /// Walking speed in world units per second.
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,
    /// Distance at which an agent counts as arrived.
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f32,
    /// How long every presentation cue plays.
    #[serde(default = "default_cue_secs")]
    pub cue_secs: f32,
    /// World states that hold from the start.
    #[serde(default)]
    pub world_states: Vec<String>,
    /// Simulation step.
    #[serde(default = "default_step_secs")]
    pub step_secs: f32,
    /// Default run length.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f32,
    /// Interval between emitted snapshots.
    #[serde(default = "default_snapshot_every_secs")]
    pub snapshot_every_secs: f32,
}

fn default_walk_speed() -> f32 { 1.5 }
fn default_arrival_radius() -> f32 { 0.25 }
fn default_cue_secs() -> f32 { 1.0 }
fn default_step_secs() -> f32 { 0.25 }
fn default_duration_secs() -> f32 { 120.0 }
fn default_snapshot_every_secs() -> f32 { 10.0 }

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            walk_speed: default_walk_speed(),
            arrival_radius: default_arrival_radius(),
            cue_secs: default_cue_secs(),
            world_states: Vec::new(),
            step_secs: default_step_secs(),
            duration_secs: default_duration_secs(),
            snapshot_every_secs: default_snapshot_every_secs(),
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    position: Location,
    target: Option<Location>,
    capabilities: BTreeSet<String>,
}

/// Reference implementation of every host contract.
#[derive(Debug, Clone)]
pub struct SimHost {
    walk_speed: f32,
    arrival_radius: f32,
    cue_secs: f32,
    bodies: BTreeMap<AgentId, Body>,
    world_states: BTreeSet<String>,
    last_advance: Option<SimTime>,
    cues_played: u64,
}

impl SimHost {
    /// Create a host with no bodies.
    #[must_use]
    pub fn new(settings: &SimSettings) -> Self {
        Self {
            walk_speed: settings.walk_speed.max(0.0),
            arrival_radius: settings.arrival_radius.max(0.0),
            cue_secs: settings.cue_secs.max(0.0),
            bodies: BTreeMap::new(),
            world_states: settings.world_states.iter().cloned().collect(),
            last_advance: None,
            cues_played: 0,
        }
    }

    /// Give `agent` a body at `location` advertising `capabilities` to sensing.
    pub fn place<I, S>(&mut self, agent: AgentId, location: Location, capabilities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bodies.insert(
            agent,
            Body {
                position: location,
                target: None,
                capabilities: capabilities.into_iter().map(Into::into).collect(),
            },
        );
    }

    /// Turn a world state on or off.
    pub fn set_world_state(&mut self, state: impl Into<String>, valid: bool) {
        let state = state.into();
        debug!(state = %state, valid, "world state changed");
        if valid {
            self.world_states.insert(state);
        } else {
            self.world_states.remove(&state);
        }
    }

    /// Walk every moving body toward its target for the time since the last call.
    pub fn advance(&mut self, now: SimTime) {
        let elapsed = self.last_advance.map_or(0.0, |last| now.seconds_since(last));
        if self.last_advance.is_none_or(|last| now > last) {
            self.last_advance = Some(now);
        }
        if elapsed <= 0.0 {
            return;
        }
        let reach = self.walk_speed * elapsed;
        for (agent, body) in &mut self.bodies {
            let Some(target) = body.target else {
                continue;
            };
            let distance = body.position.distance(&target);
            if distance <= reach {
                body.position = target;
            } else {
                let t = reach / distance;
                body.position = Location::new(
                    body.position.x + (target.x - body.position.x) * t,
                    body.position.y + (target.y - body.position.y) * t,
                    body.position.z + (target.z - body.position.z) * t,
                );
            }
            trace!(agent = %agent, position = %body.position, "moved");
        }
    }

    /// Whether `agent` is walking somewhere it has not reached.
    #[must_use]
    pub fn is_moving(&self, agent: AgentId) -> bool {
        self.bodies
            .get(&agent)
            .is_some_and(|b| b.target.is_some_and(|t| !b.position.within(&t, self.arrival_radius)))
    }

    /// Cues played so far.
    #[must_use]
    pub fn cues_played(&self) -> u64 {
        self.cues_played
    }
}

impl Movement for SimHost {
    fn move_to(&mut self, agent: AgentId, target: Location) {
        if let Some(body) = self.bodies.get_mut(&agent) {
            body.target = Some(target);
        }
    }

    fn has_reached_target(&self, agent: AgentId) -> bool {
        self.bodies.get(&agent).is_some_and(|b| {
            b.target
                .is_none_or(|t| b.position.within(&t, self.arrival_radius))
        })
    }

    fn stop_moving(&mut self, agent: AgentId) {
        if let Some(body) = self.bodies.get_mut(&agent) {
            body.target = None;
        }
    }

    fn position(&self, agent: AgentId) -> Option<Location> {
        self.bodies.get(&agent).map(|b| b.position)
    }
}

impl Presentation for SimHost {
    fn prompt(&mut self, agent: AgentId, cue: &str, now: SimTime) -> CueWindow {
        self.cues_played += 1;
        debug!(agent = %agent, cue, "cue");
        CueWindow {
            starts_at: now,
            ends_at: now.after(self.cue_secs),
        }
    }
}

impl Sensing for SimHost {
    fn sensed_entities(&self, agent: AgentId, capability: &str, min_range: f32, max_range: f32) -> Vec<EntityRef> {
        let Some(me) = self.bodies.get(&agent) else {
            return Vec::new();
        };
        self.bodies
            .iter()
            .filter(|(id, body)| {
                let distance = me.position.distance(&body.position);
                **id != agent
                    && body.capabilities.contains(capability)
                    && distance >= min_range
                    && distance <= max_range
            })
            .map(|(id, _)| EntityRef::Agent(*id))
            .collect()
    }
}

impl WorldStateQuery for SimHost {
    fn is_world_state_valid(&self, state: &str) -> bool {
        self.world_states.contains(state)
    }
}
