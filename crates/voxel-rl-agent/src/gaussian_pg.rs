//! Linear Gaussian policy gradient
//!
//! Each output channel has a linear mean over Gaussian features centred at
//! 0 and 1 on every observation axis. A candidate `mean + σ·n` is kept with
//! probability `pdf(candidate) / pdf(mean)`; otherwise the channel falls
//! back to its mean. The emitted value is `tanh(chosen) * action_scale`.
//!
//! The return accumulator `G = r + γG` runs across episodes unless
//! `episodic_return` is set, in which case [`Lifecycle::reset`] clears it.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use tracing::{debug, trace};

use voxel_rl_core::config::check_positive;
use voxel_rl_core::math::{gaussian_matrix, normalize_in_place};
use voxel_rl_core::{
    ensure_dimension, AgentConfig, AgentSnapshot, ContinuousAgent, Lifecycle, RLError, Result,
    StepView,
};

const FEATURE_CENTRES: [f64; 2] = [0.0, 1.0];

/// Gaussian policy-gradient configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianPgConfig {
    /// Base agent configuration; its exploration schedule is not used
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Standard deviation of the action noise
    pub sigma: f64,
    /// Width of the observation features
    pub feature_width: f64,
    /// Factor applied after `tanh`
    pub action_scale: f64,
    /// Clear the return accumulator on every episode reset
    pub episodic_return: bool,
}

impl Default for GaussianPgConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            sigma: 0.1,
            feature_width: 0.5,
            action_scale: 0.5,
            episodic_return: false,
        }
    }
}

impl GaussianPgConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        for (name, value) in [
            ("sigma", self.sigma),
            ("feature_width", self.feature_width),
            ("action_scale", self.action_scale),
        ] {
            if !(value > 0.0) {
                return Err(RLError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// `exp(-(s_i - c)² / (2w²))` for every axis `i` and centre `c ∈ {0, 1}`
#[must_use]
pub fn policy_features(observation: &[f64], width: f64) -> Array1<f64> {
    let denom = 2.0 * width * width;
    observation
        .iter()
        .flat_map(|&s| FEATURE_CENTRES.iter().map(move |c| (-(s - c).powi(2) / denom).exp()))
        .collect()
}

#[derive(Debug, Clone)]
struct Decision {
    features: Array1<f64>,
    means: Array1<f64>,
    /// Pre-`tanh` value per channel
    chosen: Array1<f64>,
}

/// REINFORCE-style agent with an accept/reject gate on sampled actions
#[derive(Debug, Clone)]
pub struct GaussianPgAgent {
    config: GaussianPgConfig,
    observation_dim: usize,
    /// One row per output channel
    weights: Array2<f64>,
    accumulated_return: f64,
    previous: Option<Decision>,
    last_observation: Option<Vec<f64>>,
    last_action: Option<Vec<f64>>,
    last_reward: Option<f64>,
    learning_rate: f64,
    accepted: usize,
    episode: usize,
    steps: usize,
    learning: bool,
    rng: StdRng,
}

impl GaussianPgAgent {
    /// Create an agent mapping `observation_dim` inputs to `action_dim` outputs
    pub fn new(
        observation_dim: usize,
        action_dim: usize,
        config: GaussianPgConfig,
    ) -> Result<Self> {
        check_positive("observation_dim", observation_dim)?;
        check_positive("action_dim", action_dim)?;
        config.validate()?;

        let mut rng = config.base.rng();
        let weights = gaussian_matrix(
            action_dim,
            observation_dim * FEATURE_CENTRES.len(),
            config.base.init,
            &mut rng,
        );

        Ok(Self {
            config,
            observation_dim,
            weights,
            accumulated_return: 0.0,
            previous: None,
            last_observation: None,
            last_action: None,
            last_reward: None,
            learning_rate: 0.0,
            accepted: 0,
            episode: 0,
            steps: 0,
            learning: true,
            rng,
        })
    }

    /// Weight matrix, one row per output channel
    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Current value of the return accumulator
    #[must_use]
    pub fn accumulated_return(&self) -> f64 {
        self.accumulated_return
    }

    /// Number of sampled candidates kept since the last reinitialisation
    #[must_use]
    pub fn accepted_samples(&self) -> usize {
        self.accepted
    }

    /// Deterministic action `tanh(mean) * action_scale`
    pub fn greedy_action(&self, observation: &[f64]) -> Result<Vec<f64>> {
        ensure_dimension("policy observation", self.observation_dim, observation.len())?;
        let features = policy_features(observation, self.config.feature_width);
        let scale = self.config.action_scale;
        Ok(self
            .weights
            .dot(&features)
            .iter()
            .map(|m| m.tanh() * scale)
            .collect())
    }

    fn decide(&mut self, observation: &[f64]) -> Result<Decision> {
        let features = policy_features(observation, self.config.feature_width);
        let means = self.weights.dot(&features);
        let sigma = self.config.sigma;

        let mut chosen = means.clone();
        for (c, &mean) in chosen.iter_mut().zip(means.iter()) {
            let density = Normal::new(mean, sigma)
                .map_err(|e| RLError::InvalidConfig(format!("policy density: {e}")))?;
            let noise: f64 = self.rng.sample(StandardNormal);
            let candidate = mean + sigma * noise;
            let ratio = density.pdf(candidate) / density.pdf(mean);
            if self.rng.gen::<f64>() < ratio {
                *c = candidate;
                self.accepted += 1;
            }
        }
        Ok(Decision {
            features,
            means,
            chosen,
        })
    }

    fn learn(&mut self, alpha: f64) {
        let Some(prev) = &self.previous else {
            return;
        };
        let variance = self.config.sigma * self.config.sigma;
        let g = self.accumulated_return;
        for (j, mut row) in self.weights.axis_iter_mut(Axis(0)).enumerate() {
            let score = (prev.chosen[j] - prev.means[j]) / variance;
            row.scaled_add(alpha * g * score, &prev.features);
            normalize_in_place(row);
        }
        trace!(accumulated_return = g, "policy gradient step");
    }
}

impl Lifecycle for GaussianPgAgent {
    fn reset(&mut self) {
        self.previous = None;
        self.last_observation = None;
        self.last_action = None;
        self.last_reward = None;
        if self.config.episodic_return {
            self.accumulated_return = 0.0;
        }
        self.episode += 1;
        debug!(algorithm = "gaussian_pg", episode = self.episode, "episode reset");
    }

    fn reinitialize(&mut self) {
        let (rows, cols) = self.weights.dim();
        self.weights = gaussian_matrix(rows, cols, self.config.base.init, &mut self.rng);
        self.accumulated_return = 0.0;
        self.previous = None;
        self.last_observation = None;
        self.last_action = None;
        self.last_reward = None;
        self.accepted = 0;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = "gaussian_pg", "weights reinitialized");
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> AgentSnapshot {
        let mut snapshot = AgentSnapshot::new("gaussian_pg")
            .with_tensor("weights", self.weights.clone())
            .with_scalar("return", self.accumulated_return)
            .with_scalar("sigma", self.config.sigma)
            .with_scalar("accepted", self.accepted as f64);
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.learning_rate = self.learning_rate;
        snapshot.learning = self.learning;
        snapshot.state = self.last_observation.clone().map(StepView::Vector);
        snapshot.action = self.last_action.clone().map(StepView::Vector);
        snapshot.reward = self.last_reward;
        snapshot
    }

    fn set_learning(&mut self, learning: bool) {
        self.learning = learning;
    }

    fn is_learning(&self) -> bool {
        self.learning
    }
}

impl ContinuousAgent for GaussianPgAgent {
    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_dim(&self) -> usize {
        self.weights.nrows()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("policy observation", self.observation_dim, observation.len())?;

        let base = &self.config.base;
        let alpha = base
            .learning_rate
            .rate(base.clock.reading(self.episode, self.steps, time));
        self.learning_rate = alpha;

        if self.learning {
            self.accumulated_return = reward + base.gamma * self.accumulated_return;
            self.learn(alpha);
        }

        let decision = self.decide(observation)?;
        let scale = self.config.action_scale;
        let action: Vec<f64> = decision.chosen.iter().map(|u| u.tanh() * scale).collect();

        self.previous = Some(decision);
        self.last_observation = Some(observation.to_vec());
        self.last_action = Some(action.clone());
        self.last_reward = Some(reward);
        self.steps += 1;
        Ok(action)
    }
}
