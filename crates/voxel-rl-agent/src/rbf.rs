//! SARSA(λ) over Gaussian radial-basis features
//!
//! A `d`-dimensional observation is expanded into `4^d + 1` features: one
//! Gaussian bump per point of the grid `{0, 0.25, 0.75, 1}^d` plus a
//! constant bias. Each discrete action owns a weight vector; its value is
//! the dot product with the features. After every update, any weight
//! vector whose norm exceeds 1 is scaled back to unit norm.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use voxel_rl_core::config::{check_positive, check_unit};
use voxel_rl_core::converter::MixedRadix;
use voxel_rl_core::math::{argmax, gaussian_matrix, l2_norm};
use voxel_rl_core::{
    ensure_dimension, AgentConfig, AgentSnapshot, ContinuousAgent, Lifecycle, OutputConverter,
    RLError, Result, StepView,
};

/// Centre coordinates used on every observation axis
pub const RBF_CENTRES: [f64; 4] = [0.0, 0.25, 0.75, 1.0];

const FEATURE_WARN_LIMIT: usize = 1 << 14;

/// RBF SARSA(λ) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RbfSarsaConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Trace decay
    pub lambda: f64,
    /// Width of every basis function
    pub sigma: f64,
}

impl Default for RbfSarsaConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            lambda: 0.9,
            sigma: 0.25,
        }
    }
}

impl RbfSarsaConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_unit("lambda", self.lambda)?;
        if !(self.sigma > 0.0) {
            return Err(RLError::InvalidConfig(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

/// Every point of `RBF_CENTRES^dim`, one per row, first axis most significant
pub fn rbf_centroids(dim: usize) -> Result<Array2<f64>> {
    let radix = MixedRadix::new(vec![RBF_CENTRES.len(); dim])?;
    let mut centroids = Array2::zeros((radix.cardinality(), dim));
    for (i, mut row) in centroids.axis_iter_mut(Axis(0)).enumerate() {
        for (x, digit) in row.iter_mut().zip(radix.decode(i)?) {
            *x = RBF_CENTRES[digit];
        }
    }
    Ok(centroids)
}

/// `exp(-‖state - c‖ / (2σ²))` for every centroid, followed by a bias of 1
#[must_use]
pub fn rbf_features(state: &[f64], centroids: &Array2<f64>, sigma: f64) -> Array1<f64> {
    let denom = 2.0 * sigma * sigma;
    let mut features = Array1::ones(centroids.nrows() + 1);
    for (f, centroid) in features.iter_mut().zip(centroids.axis_iter(Axis(0))) {
        let dist = centroid
            .iter()
            .zip(state)
            .map(|(c, s)| (s - c).powi(2))
            .sum::<f64>()
            .sqrt();
        *f = (-dist / denom).exp();
    }
    features
}

/// Linear SARSA(λ) agent on RBF features
#[derive(Debug, Clone)]
pub struct RbfSarsaAgent {
    config: RbfSarsaConfig,
    output: Arc<dyn OutputConverter>,
    observation_dim: usize,
    centroids: Array2<f64>,
    /// One row per action
    weights: Array2<f64>,
    traces: Array2<f64>,
    /// Features and action of the last call
    previous: Option<(Array1<f64>, usize)>,
    last_observation: Option<Vec<f64>>,
    last_reward: Option<f64>,
    learning_rate: f64,
    exploration_rate: f64,
    episode: usize,
    steps: usize,
    learning: bool,
    rng: StdRng,
}

impl RbfSarsaAgent {
    /// Create an agent for `observation_dim` inputs in `[0, 1]`; actions
    /// are the indices accepted by `output`
    pub fn new(
        observation_dim: usize,
        output: Arc<dyn OutputConverter>,
        config: RbfSarsaConfig,
    ) -> Result<Self> {
        check_positive("observation_dim", observation_dim)?;
        check_positive("action count", output.input_dim())?;
        config.validate()?;

        let centroids = rbf_centroids(observation_dim)?;
        let features = centroids.nrows() + 1;
        if features > FEATURE_WARN_LIMIT {
            warn!(features, observation_dim, "large RBF feature expansion");
        }
        let actions = output.input_dim();
        let mut rng = config.base.rng();
        let weights = gaussian_matrix(actions, features, config.base.init, &mut rng);

        Ok(Self {
            config,
            output,
            observation_dim,
            centroids,
            weights,
            traces: Array2::zeros((actions, features)),
            previous: None,
            last_observation: None,
            last_reward: None,
            learning_rate: 0.0,
            exploration_rate: 0.0,
            episode: 0,
            steps: 0,
            learning: true,
            rng,
        })
    }

    /// Number of features, bias included
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.weights.ncols()
    }

    /// Weight matrix, one row per action
    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Action values for an observation
    pub fn q_values(&self, observation: &[f64]) -> Result<Array1<f64>> {
        ensure_dimension("rbf observation", self.observation_dim, observation.len())?;
        let features = rbf_features(observation, &self.centroids, self.config.sigma);
        Ok(self.weights.dot(&features))
    }

    fn learn(&mut self, reward: f64, next_value: f64, alpha: f64) {
        let Some((features, action)) = &self.previous else {
            return;
        };
        let gamma = self.config.base.gamma;
        let delta = reward + gamma * next_value - self.weights.row(*action).dot(features);

        {
            let mut trace = self.traces.row_mut(*action);
            trace += features;
        }
        self.weights.scaled_add(alpha * delta, &self.traces);
        let decay = gamma * self.config.lambda;
        self.traces.mapv_inplace(|e| e * decay);

        for mut row in self.weights.axis_iter_mut(Axis(0)) {
            let norm = l2_norm(row.view());
            if norm > 1.0 {
                row.mapv_inplace(|w| w / norm);
            }
        }
    }
}

impl Lifecycle for RbfSarsaAgent {
    fn reset(&mut self) {
        self.previous = None;
        self.last_observation = None;
        self.last_reward = None;
        self.traces.fill(0.0);
        self.episode += 1;
        debug!(algorithm = "rbf_sarsa_lambda", episode = self.episode, "episode reset");
    }

    fn reinitialize(&mut self) {
        let (actions, features) = self.weights.dim();
        self.weights = gaussian_matrix(actions, features, self.config.base.init, &mut self.rng);
        self.traces.fill(0.0);
        self.previous = None;
        self.last_observation = None;
        self.last_reward = None;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = "rbf_sarsa_lambda", "weights reinitialized");
    }

    fn snapshot(&self) -> AgentSnapshot {
        let mut snapshot = AgentSnapshot::new("rbf_sarsa_lambda")
            .with_tensor("weights", self.weights.clone())
            .with_tensor("traces", self.traces.clone())
            .with_scalar("lambda", self.config.lambda)
            .with_scalar("sigma", self.config.sigma);
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.learning_rate = self.learning_rate;
        snapshot.exploration_rate = self.exploration_rate;
        snapshot.learning = self.learning;
        snapshot.state = self.last_observation.clone().map(StepView::Vector);
        snapshot.action = self.previous.as_ref().map(|(_, a)| StepView::Index(*a));
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

impl ContinuousAgent for RbfSarsaAgent {
    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    fn action_dim(&self) -> usize {
        self.output.output_dim()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("rbf observation", self.observation_dim, observation.len())?;

        let base = &self.config.base;
        let clock = base.clock.reading(self.episode, self.steps, time);
        let epsilon = base.exploration.rate(clock);
        let alpha = base.learning_rate.rate(clock);
        self.exploration_rate = epsilon;
        self.learning_rate = alpha;

        let features = rbf_features(observation, &self.centroids, self.config.sigma);
        let q = self.weights.dot(&features);
        let actions = q.len();
        let action = if self.rng.gen::<f64>() < epsilon {
            self.rng.gen_range(0..actions)
        } else {
            argmax(q.iter())
        };

        if self.learning {
            self.learn(reward, q[action], alpha);
        }

        self.previous = Some((features, action));
        self.last_observation = Some(observation.to_vec());
        self.last_reward = Some(reward);
        self.steps += 1;

        let out = self.output.apply(action)?;
        ensure_dimension("rbf action", self.output.output_dim(), out.len())?;
        Ok(out)
    }
}
