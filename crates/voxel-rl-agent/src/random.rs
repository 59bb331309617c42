//! Random agent for baseline comparisons

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use voxel_rl_core::{
    ensure_dimension, AgentConfig, AgentSnapshot, ContinuousAgent, Lifecycle, RLError, Result,
    StepView,
};

/// Agent that draws every action channel uniformly from `[low, high]`
#[derive(Debug, Clone)]
pub struct RandomAgent {
    observation_dim: usize,
    low: Vec<f64>,
    high: Vec<f64>,
    config: AgentConfig,
    last_action: Option<Vec<f64>>,
    last_reward: Option<f64>,
    episode: usize,
    steps: usize,
    rng: StdRng,
}

impl RandomAgent {
    /// Create a new random agent over the box `[low, high]`
    pub fn new(
        observation_dim: usize,
        low: Vec<f64>,
        high: Vec<f64>,
        config: AgentConfig,
    ) -> Result<Self> {
        ensure_dimension("random action bounds", low.len(), high.len())?;
        if low.iter().chain(&high).any(|b| !b.is_finite()) {
            return Err(RLError::InvalidConfig("action bounds must be finite".to_string()));
        }
        if let Some((l, h)) = low.iter().zip(&high).find(|(l, h)| !(l <= h)) {
            return Err(RLError::InvalidConfig(format!(
                "action bound low {l} exceeds high {h}"
            )));
        }
        let rng = config.rng();
        Ok(Self {
            observation_dim,
            low,
            high,
            config,
            last_action: None,
            last_reward: None,
            episode: 0,
            steps: 0,
            rng,
        })
    }
}

impl Lifecycle for RandomAgent {
    fn reset(&mut self) {
        self.last_action = None;
        self.last_reward = None;
        self.episode += 1;
    }

    fn reinitialize(&mut self) {
        self.rng = self.config.rng();
        self.last_action = None;
        self.last_reward = None;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = "random", "generator reseeded");
    }

    fn snapshot(&self) -> AgentSnapshot {
        let mut snapshot = AgentSnapshot::new("random");
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.exploration_rate = 1.0;
        snapshot.learning = false;
        snapshot.action = self.last_action.clone().map(StepView::Vector);
        snapshot.reward = self.last_reward;
        snapshot
    }

    // Nothing to learn
    fn set_learning(&mut self, _learning: bool) {}

    fn is_learning(&self) -> bool {
        false
    }
}

impl ContinuousAgent for RandomAgent {
    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_dim(&self) -> usize {
        self.low.len()
    }

    fn apply(&mut self, _time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("random observation", self.observation_dim, observation.len())?;
        let action: Vec<f64> = self
            .low
            .iter()
            .zip(&self.high)
            .map(|(&l, &h)| if l < h { self.rng.gen_range(l..h) } else { l })
            .collect();
        self.last_action = Some(action.clone());
        self.last_reward = Some(reward);
        self.steps += 1;
        Ok(action)
    }
}
