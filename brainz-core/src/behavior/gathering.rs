//! Gatherings: the shared table that actor-interaction handshakes meet in.
//!
//! Agents never hold references to each other. An agent starting an actor
//! interaction joins a sensed peer's gathering for the same behavior or opens
//! its own. Members are kept in join order so over-capacity trims drop the
//! newest arrivals.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::types::AgentId;

/// Handle to a gathering. Lower ids are older gatherings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GatheringId(pub u32);

impl fmt::Display for GatheringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gathering#{}", self.0)
    }
}

/// Agents meeting for one behavior.
#[derive(Debug, Clone, Serialize)]
pub struct Gathering {
    /// Behavior the members share.
    pub behavior: String,
    /// Members in join order.
    pub members: Vec<AgentId>,
}

/// All open gatherings in a world.
#[derive(Debug, Clone, Default)]
pub struct Gatherings {
    next_id: u32,
    open: BTreeMap<GatheringId, Gathering>,
}

impl Gatherings {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a gathering with `founder` as its only member.
    pub fn open(&mut self, behavior: &str, founder: AgentId) -> GatheringId {
        let id = GatheringId(self.next_id);
        self.next_id += 1;
        self.open.insert(
            id,
            Gathering {
                behavior: behavior.to_string(),
                members: vec![founder],
            },
        );
        debug!(gathering = %id, behavior, agent = %founder, "gathering opened");
        id
    }

    /// Look up a gathering.
    #[must_use]
    pub fn get(&self, id: GatheringId) -> Option<&Gathering> {
        self.open.get(&id)
    }

    /// Member count (0 for a closed gathering).
    #[must_use]
    pub fn size(&self, id: GatheringId) -> usize {
        self.open.get(&id).map_or(0, |g| g.members.len())
    }

    /// Whether `agent` belongs to `id`.
    #[must_use]
    pub fn contains(&self, id: GatheringId, agent: AgentId) -> bool {
        self.open.get(&id).is_some_and(|g| g.members.contains(&agent))
    }

    /// The oldest gathering for `behavior` that has a member among `peers`,
    /// fewer than `max_size` members, and an id below `below` when given.
    #[must_use]
    pub fn find_for_peers(
        &self,
        behavior: &str,
        peers: &[AgentId],
        max_size: usize,
        below: Option<GatheringId>,
    ) -> Option<GatheringId> {
        self.open
            .iter()
            .filter(|(id, _)| below.is_none_or(|limit| **id < limit))
            .find(|(_, g)| {
                g.behavior == behavior
                    && g.members.len() < max_size
                    && g.members.iter().any(|m| peers.contains(m))
            })
            .map(|(id, _)| *id)
    }

    /// Add `agent` to `id`. Returns `false` if the gathering is closed.
    pub fn join(&mut self, id: GatheringId, agent: AgentId) -> bool {
        match self.open.get_mut(&id) {
            Some(g) => {
                if !g.members.contains(&agent) {
                    g.members.push(agent);
                }
                true
            }
            None => false,
        }
    }

    /// Remove `agent`; an emptied gathering closes.
    pub fn leave(&mut self, id: GatheringId, agent: AgentId) {
        let emptied = match self.open.get_mut(&id) {
            Some(g) => {
                g.members.retain(|m| *m != agent);
                g.members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.open.remove(&id);
            debug!(gathering = %id, "gathering closed");
        }
    }

    /// Drop the newest members beyond `max_size`; returns who was dropped.
    pub fn trim_to(&mut self, id: GatheringId, max_size: usize) -> Vec<AgentId> {
        match self.open.get_mut(&id) {
            Some(g) if g.members.len() > max_size => g.members.split_off(max_size),
            _ => Vec::new(),
        }
    }

    /// Number of open gatherings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether no gathering is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
