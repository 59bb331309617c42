//! Schedules for exploration and learning rates
//!
//! A schedule maps a clock reading (episode index, step count or
//! simulation time) to a rate. Agents clamp the result into `[0, 1]`
//! before using it.

use serde::{Deserialize, Serialize};

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule: Send + Sync {
    /// Get value at clock reading `t`
    fn value(&self, t: f64) -> f64;
}

/// Constant schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantSchedule {
    /// Constant value
    pub value: f64,
}

impl Schedule for ConstantSchedule {
    fn value(&self, _t: f64) -> f64 {
        self.value
    }
}

/// Linear schedule that decays from start to end over steps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSchedule {
    /// Starting value
    pub start: f64,
    /// Ending value
    pub end: f64,
    /// Clock span of the decay
    pub steps: f64,
}

impl LinearSchedule {
    /// Create a new linear schedule
    #[must_use]
    pub fn new(start: f64, end: f64, steps: f64) -> Self {
        Self { start, end, steps }
    }
}

impl Schedule for LinearSchedule {
    fn value(&self, t: f64) -> f64 {
        if t >= self.steps {
            self.end
        } else {
            let progress = t / self.steps;
            self.start + (self.end - self.start) * progress
        }
    }
}

/// Exponential decay schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl Schedule for ExponentialSchedule {
    fn value(&self, t: f64) -> f64 {
        let value = self.start * self.decay_rate.powf(t);
        value.max(self.min_value)
    }
}

/// Harmonic decay `scale / (1 + t)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseSchedule {
    /// Value at `t = 0`
    pub scale: f64,
}

impl Schedule for InverseSchedule {
    fn value(&self, t: f64) -> f64 {
        self.scale / (1.0 + t.max(0.0))
    }
}

/// Serializable choice of schedule, as found in agent configuration files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleConfig {
    /// See [`ConstantSchedule`]
    Constant(ConstantSchedule),
    /// See [`LinearSchedule`]
    Linear(LinearSchedule),
    /// See [`ExponentialSchedule`]
    Exponential(ExponentialSchedule),
    /// See [`InverseSchedule`]
    Inverse(InverseSchedule),
}

impl ScheduleConfig {
    /// Constant schedule
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::Constant(ConstantSchedule { value })
    }

    /// `1 / (1 + t)`
    #[must_use]
    pub fn inverse() -> Self {
        Self::Inverse(InverseSchedule { scale: 1.0 })
    }

    /// Schedule output clamped into `[0, 1]`
    #[must_use]
    pub fn rate(&self, t: f64) -> f64 {
        let v = self.value(t);
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, 1.0)
        }
    }
}

impl Schedule for ScheduleConfig {
    fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant(s) => s.value(t),
            Self::Linear(s) => s.value(t),
            Self::Exponential(s) => s.value(t),
            Self::Inverse(s) => s.value(t),
        }
    }
}

/// Which clock drives a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleClock {
    /// Number of completed episodes
    #[default]
    Episode,
    /// Number of `apply` calls since the last reinitialisation
    Step,
    /// Simulation time passed to `apply`
    Time,
}

impl ScheduleClock {
    /// Pick the reading for this clock
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reading(self, episode: usize, step: usize, time: f64) -> f64 {
        match self {
            Self::Episode => episode as f64,
            Self::Step => step as f64,
            Self::Time => time,
        }
    }
}
