//! # brainz-sim: Reference Host for BRAINZ
//!
//! This crate provides a minimal host for the engine-agnostic `brainz-core`
//! library, enough to run populations headless and inspect what they do.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │              brainz-sim              │
//! │  ┌────────────┐    ┌──────────────┐  │
//! │  │  SimHost   │◄───┤  Simulation  │  │
//! │  └─────┬──────┘    └──────┬───────┘  │
//! │        │ Host traits      │ tick     │
//! │        ▼                  ▼          │
//! │   ┌──────────────────────────────┐   │
//! │   │          brainz-core         │   │
//! │   └──────────────────────────────┘   │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `host`: movement, cues, sensing and world states for a flat world
//! - `runner`: fixed-step loop, config file, snapshot frames

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod host;
pub mod runner;

pub use host::{SimHost, SimSettings};
pub use runner::{Frame, RunSummary, SimConfig, Simulation};
