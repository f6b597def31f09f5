//! Headless simulation: a [`World`] driven by a [`SimHost`] on a fixed step.

use std::path::Path;

use brainz_core::metrics::{CounterSnapshot, TickSummary};
use brainz_core::{AgentId, AgentSnapshot, BrainzConfig, BrainzError, Decision, Definitions, SimTime, World};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::host::{SimHost, SimSettings};

/// Capability every simulated agent advertises to sensing.
pub const AGENT_CAPABILITY: &str = "agent";

/// Engine configuration plus the `[sim]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Engine settings (`[general]`, `[arbiter]`, `[memory]`, ...).
    #[serde(flatten)]
    pub engine: BrainzConfig,
    /// Host settings.
    #[serde(default)]
    pub sim: SimSettings,
}

impl SimConfig {
    /// Parse from TOML.
    ///
    /// # Errors
    /// Returns [`BrainzError::Config`] if the document is invalid.
    pub fn from_toml(toml_str: &str) -> brainz_core::Result<Self> {
        toml::from_str(toml_str).map_err(|e| BrainzError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> brainz_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Every agent's state at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Simulation time.
    pub time: f64,
    /// One entry per agent.
    pub agents: Vec<AgentSnapshot>,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Simulation time at the end.
    pub time: f64,
    /// World ticks executed.
    pub ticks: u64,
    /// Behaviors begun across all agents.
    pub began: u64,
    /// Engine counters.
    pub counters: CounterSnapshot,
    /// Where tick time went.
    pub timing: TickSummary,
}

/// A populated world and its host.
pub struct Simulation {
    world: World,
    host: SimHost,
    step_secs: f64,
    ticks: u64,
    began: u64,
}

impl Simulation {
    /// Build a world from `definitions` and give every agent a body.
    ///
    /// # Errors
    /// Propagates definition errors and rejects a non-positive step.
    pub fn new(config: SimConfig, definitions: &Definitions) -> brainz_core::Result<Self> {
        if config.sim.step_secs <= 0.0 {
            return Err(BrainzError::Config(format!(
                "sim.step_secs must be positive, got {}",
                config.sim.step_secs
            )));
        }
        let mut host = SimHost::new(&config.sim);
        let step_secs = f64::from(config.sim.step_secs);
        let mut world = World::new(config.engine);
        let populated = definitions.populate(&mut world)?;
        for id in populated.agents {
            host.place(id, world.agent(id)?.location, [AGENT_CAPABILITY]);
        }
        Ok(Self {
            world,
            host,
            step_secs,
            ticks: 0,
            began: 0,
        })
    }

    /// The simulated world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The simulated world, mutably (prioritization, spawning).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The host.
    #[must_use]
    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// The host, mutably (world states).
    pub fn host_mut(&mut self) -> &mut SimHost {
        &mut self.host
    }

    /// Time of the next tick.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn now(&self) -> SimTime {
        SimTime::from_secs(self.ticks as f64 * self.step_secs)
    }

    /// Advance one step: move bodies, then tick the world.
    pub fn step(&mut self) -> Vec<(AgentId, Decision)> {
        let now = self.now();
        self.host.advance(now);
        let decisions = self.world.tick(now, &mut self.host);
        for (agent, decision) in &decisions {
            if let Decision::Began(name) = decision {
                self.began += 1;
                debug!(agent = %agent, behavior = %name, time = now.secs(), "began");
            }
        }
        self.ticks += 1;
        decisions
    }

    /// Every agent's state right now.
    #[must_use]
    pub fn frame(&self) -> Frame {
        Frame {
            time: self.world.now().secs(),
            agents: self.world.snapshots(),
        }
    }

    /// Run for `secs` simulated seconds, handing a [`Frame`] to `on_frame`
    /// every `frame_every` seconds and once at the end.
    pub fn run_for(&mut self, secs: f64, frame_every: f64, mut on_frame: impl FnMut(&Frame)) -> RunSummary {
        let end = self.now().secs() + secs;
        let mut next_frame = self.now().secs();
        while self.now().secs() < end {
            self.step();
            if frame_every > 0.0 && self.world.now().secs() >= next_frame {
                on_frame(&self.frame());
                next_frame += frame_every;
            }
        }
        on_frame(&self.frame());

        let summary = RunSummary {
            time: self.world.now().secs(),
            ticks: self.ticks,
            began: self.began,
            counters: self.world.counters(),
            timing: self.world.profiler().summary(),
        };
        info!(
            ticks = summary.ticks,
            began = summary.began,
            time = summary.time,
            us_per_agent = summary.timing.us_per_agent,
            arbitration_share = summary.timing.arbitration_share,
            "simulation finished"
        );
        summary
    }
}
