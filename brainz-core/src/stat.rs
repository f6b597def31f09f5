//! Stats and desired states: "What I need".
//!
//! A [`Stat`] is a bounded scalar (hunger, energy, stock of food) with a
//! normalized `[0, 1]` view. A [`DesiredState`] is the target an agent wants
//! that normalized value to satisfy. Behaviors advertise which way they push a
//! stat through [`StatImpact`].

use serde::{Deserialize, Serialize};

use crate::error::{BrainzError, Result};

/// Default tolerance band for [`Objective::Approximately`].
pub const DEFAULT_APPROXIMATE_TOLERANCE: f32 = 0.05;

/// Lower bound of a stat created lazily on first reference.
pub const DEFAULT_STAT_MIN: f32 = 0.0;

/// Upper bound of a stat created lazily on first reference.
pub const DEFAULT_STAT_MAX: f32 = 100.0;

/// A bounded, named numeric need or attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stat {
    name: String,
    min: f32,
    max: f32,
    current: f32,
}

impl Stat {
    /// Create a stat, clamping `initial` into `[min, max]`.
    ///
    /// # Errors
    /// Returns [`BrainzError::InvalidStatRange`] unless `min < max`.
    pub fn new(name: impl Into<String>, min: f32, max: f32, initial: f32) -> Result<Self> {
        let name = name.into();
        if !(min < max) {
            return Err(BrainzError::InvalidStatRange { stat: name, min, max });
        }
        Ok(Self {
            name,
            min,
            max,
            current: initial.clamp(min, max),
        })
    }

    /// Stat over the default `[0, 100]` range; used for get-or-create.
    #[must_use]
    pub fn with_default_range(name: impl Into<String>, initial: f32) -> Self {
        Self {
            name: name.into(),
            min: DEFAULT_STAT_MIN,
            max: DEFAULT_STAT_MAX,
            current: initial.clamp(DEFAULT_STAT_MIN, DEFAULT_STAT_MAX),
        }
    }

    /// Stat name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower bound.
    #[must_use]
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Current raw value.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// `(current - min) / (max - min)`; the range is validated at construction.
    #[must_use]
    pub fn normalized(&self) -> f32 {
        (self.current - self.min) / (self.max - self.min)
    }

    /// Clamped assignment.
    pub fn set(&mut self, value: f32) {
        self.current = value.clamp(self.min, self.max);
    }

    /// Add `delta` with clamping; returns the change actually applied.
    pub fn apply(&mut self, delta: f32) -> f32 {
        let before = self.current;
        self.set(before + delta);
        self.current - before
    }
}

/// Static description of a stat, supplied by host data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatTemplate {
    /// Stat name.
    pub name: String,
    /// Lower bound.
    #[serde(default)]
    pub min: f32,
    /// Upper bound.
    #[serde(default = "default_max")]
    pub max: f32,
    /// Value at creation.
    #[serde(default)]
    pub initial: f32,
    /// Ambient change per simulated second (hunger rising, stock regrowing).
    #[serde(default)]
    pub drift_per_second: f32,
}

impl StatTemplate {
    /// Template with no drift.
    #[must_use]
    pub fn new(name: impl Into<String>, min: f32, max: f32, initial: f32) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            initial,
            drift_per_second: 0.0,
        }
    }

    /// Set the ambient drift.
    #[must_use]
    pub fn with_drift(mut self, per_second: f32) -> Self {
        self.drift_per_second = per_second;
        self
    }

    /// Instantiate the stat.
    ///
    /// # Errors
    /// Propagates [`Stat::new`] range validation.
    pub fn build(&self) -> Result<Stat> {
        Stat::new(self.name.clone(), self.min, self.max, self.initial)
    }
}

/// Which way a normalized value should relate to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Value should sit below the target.
    LessThan,
    /// Value should sit within a tolerance of the target.
    Approximately,
    /// Value should sit above the target.
    GreaterThan,
}

/// A target condition on one stat's normalized value.
///
/// Behaviors reuse this shape for their required-stat gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Stat the condition reads.
    pub stat: String,
    /// Relation to the target.
    pub objective: Objective,
    /// Target in normalized `[0, 1]` space.
    pub target: f32,
    /// Half-width of the band accepted by [`Objective::Approximately`].
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

impl DesiredState {
    /// Create a desired state with the default tolerance.
    #[must_use]
    pub fn new(stat: impl Into<String>, objective: Objective, target: f32) -> Self {
        Self {
            stat: stat.into(),
            objective,
            target: target.clamp(0.0, 1.0),
            tolerance: DEFAULT_APPROXIMATE_TOLERANCE,
        }
    }

    /// Whether a normalized value meets the objective.
    #[must_use]
    pub fn is_satisfied_by(&self, normalized: f32) -> bool {
        match self.objective {
            Objective::LessThan => normalized < self.target,
            Objective::GreaterThan => normalized > self.target,
            Objective::Approximately => (normalized - self.target).abs() <= self.tolerance,
        }
    }

    /// Whether the given stat snapshot meets the objective.
    #[must_use]
    pub fn is_satisfied(&self, stat: &Stat) -> bool {
        self.is_satisfied_by(stat.normalized())
    }

    /// How far the value is from the target, in normalized units.
    #[must_use]
    pub fn distance(&self, normalized: f32) -> f32 {
        (self.target - normalized).abs()
    }
}

/// The direction a behavior (or influence) pushes a stat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatImpact {
    /// Affected stat.
    pub stat: String,
    /// Direction of the push.
    pub objective: Objective,
}

impl StatImpact {
    /// Create an impact.
    #[must_use]
    pub fn new(stat: impl Into<String>, objective: Objective) -> Self {
        Self {
            stat: stat.into(),
            objective,
        }
    }

    /// Whether a raw change on this stat goes the advertised way.
    #[must_use]
    pub fn matches_change(&self, change: f32) -> bool {
        match self.objective {
            Objective::LessThan => change < 0.0,
            Objective::GreaterThan => change > 0.0,
            Objective::Approximately => change.abs() > f32::EPSILON,
        }
    }

    /// Whether pushing this way moves `desired` toward being satisfied.
    #[must_use]
    pub fn relieves(&self, desired: &DesiredState, normalized: f32) -> bool {
        if self.stat != desired.stat {
            return false;
        }
        match desired.objective {
            Objective::LessThan => self.objective == Objective::LessThan,
            Objective::GreaterThan => self.objective == Objective::GreaterThan,
            Objective::Approximately => match self.objective {
                Objective::Approximately => true,
                Objective::LessThan => normalized > desired.target,
                Objective::GreaterThan => normalized < desired.target,
            },
        }
    }
}

fn default_max() -> f32 { DEFAULT_STAT_MAX }
fn default_tolerance() -> f32 { DEFAULT_APPROXIMATE_TOLERANCE }
