//! Static world data (behaviors, interactable kinds, agent archetypes, and
//! where to place them), loaded from TOML or JSON.
//!
//! The engine treats this as input supplied by the host; nothing here is
//! written back.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::behavior::BehaviorSpec;
use crate::error::{BrainzError, Result};
use crate::interactable::InteractableSpec;
use crate::types::{AgentId, InteractableId, Location};
use crate::world::{AgentArchetype, World};

/// An interactable to place at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractablePlacement {
    /// Interactable kind name.
    pub kind: String,
    /// Where to place it.
    pub location: Location,
}

/// An agent to spawn at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPlacement {
    /// Display name.
    pub name: String,
    /// Archetype name.
    pub archetype: String,
    /// Where it starts.
    pub location: Location,
}

/// Everything needed to populate a world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    /// Behavior definitions, referenced by name from archetypes.
    #[serde(default)]
    pub behaviors: Vec<BehaviorSpec>,
    /// Interactable kinds.
    #[serde(default)]
    pub interactables: Vec<InteractableSpec>,
    /// Agent archetypes.
    #[serde(default)]
    pub archetypes: Vec<AgentArchetype>,
    /// Interactables placed at startup.
    #[serde(default)]
    pub placements: Vec<InteractablePlacement>,
    /// Agents spawned at startup.
    #[serde(default)]
    pub agents: Vec<AgentPlacement>,
}

/// Handles created by [`Definitions::populate`].
#[derive(Debug, Clone, Default)]
pub struct Populated {
    /// Spawned agents in definition order.
    pub agents: Vec<AgentId>,
    /// Placed interactables in definition order.
    pub interactables: Vec<InteractableId>,
}

impl Definitions {
    /// Parse from TOML.
    ///
    /// # Errors
    /// Returns [`BrainzError::Config`] if the document is invalid.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BrainzError::Config(e.to_string()))
    }

    /// Parse from JSON.
    ///
    /// # Errors
    /// Returns [`BrainzError::Config`] if the document is invalid.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BrainzError::Config(e.to_string()))
    }

    /// Load from a file, choosing the format by extension (`.json` or TOML).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_toml(&text),
        }
    }

    /// Look up an archetype.
    #[must_use]
    pub fn archetype(&self, name: &str) -> Option<&AgentArchetype> {
        self.archetypes.iter().find(|a| a.name == name)
    }

    /// Look up an interactable kind.
    #[must_use]
    pub fn interactable(&self, name: &str) -> Option<&InteractableSpec> {
        self.interactables.iter().find(|i| i.name == name)
    }

    /// Place every interactable and spawn every agent.
    ///
    /// # Errors
    /// Returns [`BrainzError::Config`] for a placement naming an unknown kind
    /// or archetype, and propagates stat template errors.
    pub fn populate(&self, world: &mut World) -> Result<Populated> {
        let mut populated = Populated::default();
        for placement in &self.placements {
            let spec = self
                .interactable(&placement.kind)
                .ok_or_else(|| BrainzError::Config(format!("unknown interactable kind '{}'", placement.kind)))?;
            populated
                .interactables
                .push(world.add_interactable(spec.clone(), placement.location)?);
        }
        for placement in &self.agents {
            let archetype = self
                .archetype(&placement.archetype)
                .ok_or_else(|| BrainzError::Config(format!("unknown archetype '{}'", placement.archetype)))?;
            populated.agents.push(world.add_agent(
                placement.name.clone(),
                archetype,
                &self.behaviors,
                placement.location,
            )?);
        }
        info!(
            agents = populated.agents.len(),
            interactables = populated.interactables.len(),
            "world populated"
        );
        Ok(populated)
    }
}
