//! Core type definitions for the BRAINZ arbitration engine.
//!
//! Agents and interactables live in arenas owned by the [`World`](crate::world::World)
//! registry and are referred to by index handles, never by reference.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Handle of an agent in the world registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    /// Arena slot this handle points at.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Handle of an interactable in the world registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractableId(pub u32);

impl InteractableId {
    /// Arena slot this handle points at.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InteractableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interactable#{}", self.0)
    }
}

/// Unique identifier for a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whoever generated an influence: the subject a memory is "about".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// Another agent (actor interactions).
    Agent(AgentId),
    /// A shared world resource.
    Interactable(InteractableId),
    /// A behavior acting on its own agent (solitary conduct).
    Behavior(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "{id}"),
            Self::Interactable(id) => write!(f, "{id}"),
            Self::Behavior(name) => write!(f, "behavior:{name}"),
        }
    }
}

/// An entity reported by the host's sensing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A sensed agent.
    Agent(AgentId),
    /// A sensed interactable.
    Interactable(InteractableId),
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A 3D position in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Location {
    /// Create a location from its coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance; cheap enough for nearest-candidate scans.
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Whether `other` lies within `radius` of this location (inclusive).
    #[must_use]
    pub fn within(&self, other: &Self, radius: f32) -> bool {
        self.distance_squared(other) <= radius * radius
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Simulation time in seconds since the world was created.
///
/// Every agent reads the same clock; ticks are decorrelated by scheduling
/// jitter, not by separate clocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    /// The world's epoch.
    pub const ZERO: Self = Self(0.0);

    /// Build a timestamp from seconds.
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Raw seconds.
    #[must_use]
    pub fn secs(self) -> f64 {
        self.0
    }

    /// The timestamp `secs` seconds later.
    #[must_use]
    pub fn after(self, secs: f32) -> Self {
        Self(self.0 + f64::from(secs))
    }

    /// Seconds elapsed since `earlier`, never negative.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn seconds_since(self, earlier: Self) -> f32 {
        (self.0 - earlier.0).max(0.0) as f32
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.2}s", self.0)
    }
}

// ---------------------------------------------------------------------------
// Utility Weight
// ---------------------------------------------------------------------------

/// Totally ordered utility weight used to rank candidate behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Weight(pub OrderedFloat<f32>);

impl Weight {
    /// Create a weight from a raw f32.
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self(OrderedFloat(weight))
    }

    /// Get the raw weight value.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0.into_inner()
    }
}
