//! Shared agent configuration

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::schedule::{ScheduleClock, ScheduleConfig};
use crate::{RLError, Result};

/// Parameters of the Gaussian used to draw initial tables and weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianInit {
    /// Mean of every drawn value
    pub mean: f64,
    /// Standard deviation; zero yields a constant table
    pub std: f64,
}

impl Default for GaussianInit {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 0.01,
        }
    }
}

/// Configuration shared by every agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor
    pub gamma: f64,
    /// Exploration rate schedule
    pub exploration: ScheduleConfig,
    /// Learning rate schedule
    pub learning_rate: ScheduleConfig,
    /// Clock that drives both schedules
    pub clock: ScheduleClock,
    /// Initial value distribution
    pub init: GaussianInit,
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            exploration: ScheduleConfig::inverse(),
            learning_rate: ScheduleConfig::constant(0.1),
            clock: ScheduleClock::Episode,
            init: GaussianInit::default(),
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        check_unit("gamma", self.gamma)?;
        if !(self.init.std >= 0.0) {
            return Err(RLError::InvalidConfig(format!(
                "init.std must be non-negative, got {}",
                self.init.std
            )));
        }
        Ok(())
    }

    /// Build the agent RNG from the configured seed
    #[must_use]
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Fail unless `value` lies in `[0, 1]`
pub fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RLError::InvalidConfig(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

/// Fail unless `value` is non-zero
pub fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        Err(RLError::InvalidConfig(format!("{name} must be positive")))
    } else {
        Ok(())
    }
}

/// Parse any agent configuration from JSON
pub fn from_json<C: for<'de> Deserialize<'de>>(json: &str) -> Result<C> {
    Ok(serde_json::from_str(json)?)
}
