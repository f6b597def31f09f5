//! Error types for the BRAINZ core library.

use thiserror::Error;

use crate::types::{AgentId, InteractableId};

/// Top-level error type for all BRAINZ operations.
#[derive(Error, Debug)]
pub enum BrainzError {
    /// A behavior references a stat the agent does not track.
    #[error("Behavior '{behavior}' references unknown stat '{stat}'")]
    UnknownStat {
        /// Behavior that carries the bad reference.
        behavior: String,
        /// The missing stat name.
        stat: String,
    },

    /// A behavior name (fallback, chain target, prioritization) is not registered.
    #[error("Unknown behavior: {0}")]
    UnknownBehavior(String),

    /// A stat was declared with an empty or inverted range.
    #[error("Invalid range for stat '{stat}': min {min} must be below max {max}")]
    InvalidStatRange {
        /// The stat name.
        stat: String,
        /// Declared minimum.
        min: f32,
        /// Declared maximum.
        max: f32,
    },

    /// Agent not found in the registry.
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    /// Interactable not found in the registry (never existed or destroyed).
    #[error("Interactable not found: {0}")]
    InteractableNotFound(InteractableId),

    /// Interactable has no reservation space left.
    #[error("Interactable {interactable} is full ({capacity} concurrent users)")]
    InteractableFull {
        /// Which interactable refused.
        interactable: InteractableId,
        /// Its configured capacity.
        capacity: usize,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, BrainzError>;
