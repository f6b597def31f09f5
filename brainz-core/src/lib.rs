//! # BRAINZ Core Library
//!
//! Engine-agnostic behavior arbitration for autonomous characters.
//!
//! Every agent owns a [`StatsTracker`] of bounded numeric needs, a
//! [`MemoryStore`] of what changed those needs and who caused it, and a
//! [`Brain`] that periodically scores its behaviors and runs the winner:
//!
//! - **Stats**: bounded values with drift and desired states
//! - **Influencers**: time-distributed changes to a single stat
//! - **Memory**: short-term episodes, merged and promoted to long-term
//! - **Interactables**: world objects with reservations and cooldowns
//! - **Behaviors**: solitary, interaction, group and building activities
//! - **Arbitration**: jittered utility selection with preemption and chaining
//!
//! The [`World`] registry owns all of it explicitly; a host engine plugs in
//! movement, presentation, sensing and world-state queries through the
//! [`Host`] trait.
//!
//! ## Performance Contract
//!
//! - Stat tick (20 stats, 10 influencers): < 5μs
//! - Memory insertion with merge/promote/evict: < 20μs
//! - Arbitration (10 behaviors): < 50μs

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod arbiter;
pub mod behavior;
pub mod config;
pub mod consolidation;
pub mod definitions;
pub mod error;
pub mod eviction;
pub mod host;
pub mod influencer;
pub mod interactable;
pub mod memory;
pub mod metrics;
pub mod stat;
pub mod tracker;
pub mod types;
pub mod world;

pub use agent::{Agent, InfluenceOutcome};
pub use arbiter::{Brain, Decision};
pub use behavior::{Behavior, BehaviorKindSpec, BehaviorSpec, BehaviorState};
pub use config::BrainzConfig;
pub use definitions::Definitions;
pub use error::{BrainzError, Result};
pub use host::{Host, InstantHost};
pub use influencer::{Influencer, InfluencerTemplate};
pub use interactable::{Interactable, InteractablePool, InteractableSpec};
pub use memory::{Memory, MemoryStore};
pub use stat::{DesiredState, Objective, Stat, StatImpact, StatTemplate};
pub use tracker::StatsTracker;
pub use types::*;
pub use world::{AgentArchetype, AgentSnapshot, World};
