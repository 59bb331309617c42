//! Proximal Policy Optimization (PPO) agent
//!
//! The policy network emits the mean of a diagonal Gaussian whose per-channel
//! log standard deviation is a free parameter. Steps are collected into a
//! rollout buffer of `horizon` entries; when it is full, advantages are
//! estimated with GAE(λ) against a separate value network, normalised, and
//! both networks are trained for `epochs` passes over shuffled minibatches
//! with the clipped surrogate objective.

use metrics::counter;
use ndarray::{Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, trace};

use voxel_rl_core::config::{check_positive, check_unit};
use voxel_rl_core::{
    ensure_dimension, AgentConfig, AgentSnapshot, ContinuousAgent, Lifecycle, RLError, Result,
    StepView,
};

use crate::nn::{Activation, Gradients, Mlp};

/// PPO-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    /// Base agent configuration; its exploration schedule is not used
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Widths of the two hidden layers of both networks
    pub hidden: (usize, usize),
    /// Steps collected before each update
    pub horizon: usize,
    /// Passes over the rollout per update
    pub epochs: usize,
    /// Steps per gradient step
    pub minibatch_size: usize,
    /// Clipping range ε of the probability ratio
    pub clip_range: f64,
    /// GAE λ
    pub gae_lambda: f64,
    /// Weight of the value loss
    pub value_coef: f64,
    /// Weight of the entropy bonus
    pub entropy_coef: f64,
    /// Initial log standard deviation of every action channel
    pub init_log_std: f64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig {
                learning_rate: voxel_rl_core::ScheduleConfig::constant(3e-3),
                gamma: 0.99,
                ..AgentConfig::default()
            },
            hidden: (32, 32),
            horizon: 128,
            epochs: 4,
            minibatch_size: 32,
            clip_range: 0.2,
            gae_lambda: 0.95,
            value_coef: 0.5,
            entropy_coef: 0.0,
            init_log_std: -0.5,
        }
    }
}

impl PpoConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_positive("hidden.0", self.hidden.0)?;
        check_positive("hidden.1", self.hidden.1)?;
        check_positive("horizon", self.horizon)?;
        check_positive("epochs", self.epochs)?;
        check_positive("minibatch_size", self.minibatch_size)?;
        check_unit("clip_range", self.clip_range)?;
        check_unit("gae_lambda", self.gae_lambda)?;
        if !(self.value_coef >= 0.0 && self.entropy_coef >= 0.0) {
            return Err(RLError::InvalidConfig(
                "value_coef and entropy_coef must be non-negative".to_string(),
            ));
        }
        if !self.init_log_std.is_finite() {
            return Err(RLError::InvalidConfig("init_log_std must be finite".to_string()));
        }
        Ok(())
    }
}

/// Log density of `action` under `N(mean, exp(log_std)²)` per channel
#[must_use]
pub fn gaussian_log_prob(
    action: ArrayView1<'_, f64>,
    mean: ArrayView1<'_, f64>,
    log_std: ArrayView1<'_, f64>,
) -> f64 {
    let half_log_two_pi = 0.5 * (2.0 * PI).ln();
    action
        .iter()
        .zip(mean)
        .zip(log_std)
        .map(|((a, m), ls)| {
            let var = (2.0 * ls).exp();
            -(a - m).powi(2) / (2.0 * var) - ls - half_log_two_pi
        })
        .sum()
}

/// Derivative of `-min(ρA, clip(ρ, 1-ε, 1+ε)A)` with respect to `log ρ`
///
/// Zero whenever the clipped branch is the minimum.
#[must_use]
pub fn surrogate_gradient(ratio: f64, advantage: f64, clip_range: f64) -> f64 {
    let clipped = (advantage > 0.0 && ratio > 1.0 + clip_range)
        || (advantage < 0.0 && ratio < 1.0 - clip_range);
    if clipped {
        0.0
    } else {
        -ratio * advantage
    }
}

/// Fixed-horizon storage of collected steps
#[derive(Debug, Clone, Default)]
pub struct RolloutBuffer {
    observations: Vec<Array1<f64>>,
    actions: Vec<Array1<f64>>,
    rewards: Vec<f64>,
    values: Vec<f64>,
    log_probs: Vec<f64>,
    dones: Vec<bool>,
    advantages: Vec<f64>,
    returns: Vec<f64>,
}

impl RolloutBuffer {
    fn push(&mut self, step: PendingStep, reward: f64, done: bool) {
        self.observations.push(step.observation);
        self.actions.push(step.action);
        self.rewards.push(reward);
        self.values.push(step.value);
        self.log_probs.push(step.log_prob);
        self.dones.push(done);
    }

    /// Stored steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Whether no step is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Episode-end flags
    #[must_use]
    pub fn dones(&self) -> &[bool] {
        &self.dones
    }

    /// Advantages from the last [`RolloutBuffer::compute_advantages`]
    #[must_use]
    pub fn advantages(&self) -> &[f64] {
        &self.advantages
    }

    /// Value targets from the last [`RolloutBuffer::compute_advantages`]
    #[must_use]
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// GAE(λ) advantages and value targets, bootstrapping the final step
    /// with `last_value` unless it ended an episode
    pub fn compute_advantages(&mut self, last_value: f64, gamma: f64, lambda: f64) {
        let n = self.len();
        self.advantages = vec![0.0; n];
        self.returns = vec![0.0; n];

        let mut gae = 0.0;
        for i in (0..n).rev() {
            let non_terminal = if self.dones[i] { 0.0 } else { 1.0 };
            let next_value = if i + 1 == n { last_value } else { self.values[i + 1] };
            let delta = self.rewards[i] + gamma * next_value * non_terminal - self.values[i];
            gae = delta + gamma * lambda * non_terminal * gae;
            self.advantages[i] = gae;
            self.returns[i] = gae + self.values[i];
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn normalize_advantages(&mut self) {
        let n = self.advantages.len() as f64;
        if n == 0.0 {
            return;
        }
        let mean = self.advantages.iter().sum::<f64>() / n;
        let variance = self.advantages.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt() + 1e-8;
        for adv in &mut self.advantages {
            *adv = (*adv - mean) / std;
        }
    }

    fn clear(&mut self) {
        self.observations.clear();
        self.actions.clear();
        self.rewards.clear();
        self.values.clear();
        self.log_probs.clear();
        self.dones.clear();
        self.advantages.clear();
        self.returns.clear();
    }
}

/// Step waiting for its reward
#[derive(Debug, Clone)]
struct PendingStep {
    observation: Array1<f64>,
    action: Array1<f64>,
    value: f64,
    log_prob: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Losses {
    policy: f64,
    value: f64,
}

/// PPO agent with a Gaussian policy
#[derive(Debug, Clone)]
pub struct PpoAgent {
    config: PpoConfig,
    policy: Mlp,
    value: Mlp,
    log_std: Array1<f64>,
    buffer: RolloutBuffer,
    pending: Option<PendingStep>,
    last_reward: Option<f64>,
    last_losses: Losses,
    learning_rate: f64,
    updates: usize,
    episode: usize,
    steps: usize,
    learning: bool,
    rng: StdRng,
}

impl PpoAgent {
    /// Create an agent mapping `observation_dim` inputs to `action_dim` outputs
    pub fn new(observation_dim: usize, action_dim: usize, config: PpoConfig) -> Result<Self> {
        check_positive("observation_dim", observation_dim)?;
        check_positive("action_dim", action_dim)?;
        config.validate()?;

        let mut rng = config.base.rng();
        let policy = Mlp::three_layer(
            observation_dim,
            config.hidden,
            action_dim,
            [Activation::Relu, Activation::Relu, Activation::Tanh],
            &mut rng,
        );
        let value = Mlp::three_layer(
            observation_dim,
            config.hidden,
            1,
            [Activation::Relu, Activation::Relu, Activation::Identity],
            &mut rng,
        );
        let log_std = Array1::from_elem(action_dim, config.init_log_std);

        Ok(Self {
            config,
            policy,
            value,
            log_std,
            buffer: RolloutBuffer::default(),
            pending: None,
            last_reward: None,
            last_losses: Losses::default(),
            learning_rate: 0.0,
            updates: 0,
            episode: 0,
            steps: 0,
            learning: true,
            rng,
        })
    }

    /// Policy mean network
    #[must_use]
    pub fn policy(&self) -> &Mlp {
        &self.policy
    }

    /// Value network
    #[must_use]
    pub fn value_network(&self) -> &Mlp {
        &self.value
    }

    /// Per-channel log standard deviation
    #[must_use]
    pub fn log_std(&self) -> &Array1<f64> {
        &self.log_std
    }

    /// Collected steps not yet trained on
    #[must_use]
    pub fn rollout(&self) -> &RolloutBuffer {
        &self.buffer
    }

    /// Completed update rounds since the last reinitialisation
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Mean action for an observation
    pub fn mean_action(&self, observation: &[f64]) -> Result<Vec<f64>> {
        Ok(self.policy.forward(ArrayView1::from(observation))?.to_vec())
    }

    fn state_value(&self, observation: ArrayView1<'_, f64>) -> Result<f64> {
        Ok(self.value.forward(observation)?[0])
    }

    fn update(&mut self, last_value: f64, alpha: f64) -> Result<()> {
        self.buffer
            .compute_advantages(last_value, self.config.base.gamma, self.config.gae_lambda);
        self.buffer.normalize_advantages();

        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        let mut losses = Losses::default();
        let mut batches = 0_usize;
        for _ in 0..self.config.epochs {
            indices.shuffle(&mut self.rng);
            for chunk in indices.chunks(self.config.minibatch_size) {
                let l = self.minibatch_step(chunk, alpha)?;
                losses.policy += l.policy;
                losses.value += l.value;
                batches += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let batches = batches.max(1) as f64;
        self.last_losses = Losses {
            policy: losses.policy / batches,
            value: losses.value / batches,
        };
        self.updates += 1;
        self.buffer.clear();
        counter!("voxel_rl_ppo_updates", 1);
        debug!(
            update = self.updates,
            policy_loss = self.last_losses.policy,
            value_loss = self.last_losses.value,
            "ppo update"
        );
        Ok(())
    }

    fn minibatch_step(&mut self, indices: &[usize], alpha: f64) -> Result<Losses> {
        let clip = self.config.clip_range;
        let value_coef = self.config.value_coef;
        let variance = self.log_std.mapv(|ls| (2.0 * ls).exp());

        let mut policy_grads = Gradients::zeros_like(&self.policy);
        let mut value_grads = Gradients::zeros_like(&self.value);
        let mut log_std_grad = Array1::<f64>::zeros(self.log_std.len());
        let mut losses = Losses::default();

        for &i in indices {
            let observation = self.buffer.observations[i].view();
            let action = &self.buffer.actions[i];
            let advantage = self.buffer.advantages[i];
            let target = self.buffer.returns[i];

            let pass = self.policy.forward_pass(observation)?;
            let log_prob =
                gaussian_log_prob(action.view(), pass.output.view(), self.log_std.view());
            let ratio = (log_prob - self.buffer.log_probs[i]).exp();
            let clipped = ratio.clamp(1.0 - clip, 1.0 + clip);
            losses.policy -= (ratio * advantage).min(clipped * advantage);

            let coef = surrogate_gradient(ratio, advantage, clip);
            if coef != 0.0 {
                let diff = action - &pass.output;
                let grad_mean = &diff / &variance * coef;
                policy_grads.accumulate(&self.policy.backward(&pass, &grad_mean)?);
                log_std_grad += &((&diff * &diff / &variance - 1.0) * coef);
            }
            log_std_grad -= self.config.entropy_coef;

            let value_pass = self.value.forward_pass(observation)?;
            let error = value_pass.output[0] - target;
            losses.value += 0.5 * error * error;
            let grad_value = Array1::from_elem(1, value_coef * error);
            value_grads.accumulate(&self.value.backward(&value_pass, &grad_value)?);
        }

        #[allow(clippy::cast_precision_loss)]
        let n = indices.len().max(1) as f64;
        policy_grads.scale(1.0 / n);
        value_grads.scale(1.0 / n);
        self.policy.apply_gradients(&policy_grads, alpha);
        self.value.apply_gradients(&value_grads, alpha);
        self.log_std.scaled_add(-alpha / n, &log_std_grad);

        trace!(policy_loss = losses.policy / n, value_loss = losses.value / n, "ppo minibatch");
        Ok(Losses {
            policy: losses.policy / n,
            value: losses.value / n,
        })
    }
}

impl Lifecycle for PpoAgent {
    /// Closes the pending step as an episode end with zero reward
    fn reset(&mut self) {
        if let Some(step) = self.pending.take() {
            if self.learning {
                self.buffer.push(step, 0.0, true);
            }
        }
        self.last_reward = None;
        self.episode += 1;
        debug!(algorithm = "ppo", episode = self.episode, "episode reset");
    }

    fn reinitialize(&mut self) {
        self.policy.reinitialize(&mut self.rng);
        self.value.reinitialize(&mut self.rng);
        self.log_std.fill(self.config.init_log_std);
        self.buffer.clear();
        self.pending = None;
        self.last_reward = None;
        self.last_losses = Losses::default();
        self.updates = 0;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = "ppo", "networks reinitialized");
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> AgentSnapshot {
        let snapshot = self.policy.export("policy", AgentSnapshot::new("ppo"));
        let mut snapshot = self
            .value
            .export("value", snapshot)
            .with_tensor("log_std", self.log_std.clone().insert_axis(Axis(0)))
            .with_scalar("rollout_len", self.buffer.len() as f64)
            .with_scalar("updates", self.updates as f64)
            .with_scalar("policy_loss", self.last_losses.policy)
            .with_scalar("value_loss", self.last_losses.value)
            .with_scalar("std", self.log_std.mapv(f64::exp).mean().unwrap_or(0.0));
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.learning_rate = self.learning_rate;
        snapshot.learning = self.learning;
        snapshot.state = self
            .pending
            .as_ref()
            .map(|p| StepView::Vector(p.observation.to_vec()));
        snapshot.action = self
            .pending
            .as_ref()
            .map(|p| StepView::Vector(p.action.to_vec()));
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

impl ContinuousAgent for PpoAgent {
    fn observation_dim(&self) -> usize {
        self.policy.input_dim()
    }

    fn action_dim(&self) -> usize {
        self.policy.output_dim()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("ppo observation", self.policy.input_dim(), observation.len())?;
        let observation = ArrayView1::from(observation);

        let base = &self.config.base;
        let alpha = base
            .learning_rate
            .rate(base.clock.reading(self.episode, self.steps, time));
        self.learning_rate = alpha;

        let value = self.state_value(observation)?;
        if self.learning {
            if let Some(step) = self.pending.take() {
                self.buffer.push(step, reward, false);
            }
            if self.buffer.len() >= self.config.horizon {
                self.update(value, alpha)?;
            }
        }

        let mean = self.policy.forward(observation)?;
        let noise: Array1<f64> = (0..mean.len())
            .map(|_| self.rng.sample::<f64, _>(StandardNormal))
            .collect();
        let action = &mean + &(&self.log_std.mapv(f64::exp) * &noise);
        let log_prob = gaussian_log_prob(action.view(), mean.view(), self.log_std.view());
        // the value may have moved if an update just ran
        let value = if self.learning { self.state_value(observation)? } else { value };

        self.pending = Some(PendingStep {
            observation: observation.to_owned(),
            action: action.clone(),
            value,
            log_prob,
        });
        self.last_reward = Some(reward);
        self.steps += 1;
        Ok(action.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use voxel_rl_core::ScheduleConfig;

    fn config(horizon: usize) -> PpoConfig {
        PpoConfig {
            base: AgentConfig {
                learning_rate: ScheduleConfig::constant(0.01),
                seed: Some(21),
                ..AgentConfig::default()
            },
            hidden: (8, 8),
            horizon,
            epochs: 2,
            minibatch_size: 4,
            ..PpoConfig::default()
        }
    }

    #[test]
    fn test_log_prob_at_mean() {
        let lp = gaussian_log_prob(
            arr1(&[1.0, -2.0]).view(),
            arr1(&[1.0, -2.0]).view(),
            arr1(&[0.0, 0.0]).view(),
        );
        assert_relative_eq!(lp, -(2.0 * PI).ln());
    }

    #[test]
    fn test_surrogate_gradient_clips() {
        assert_relative_eq!(surrogate_gradient(1.5, 1.0, 0.2), 0.0);
        assert_relative_eq!(surrogate_gradient(1.5, -1.0, 0.2), 1.5);
        assert_relative_eq!(surrogate_gradient(0.5, -1.0, 0.2), 0.0);
        assert_relative_eq!(surrogate_gradient(0.5, 1.0, 0.2), -0.5);
        assert_relative_eq!(surrogate_gradient(1.0, 2.0, 0.2), -2.0);
    }

    #[test]
    fn test_gae_respects_episode_end() {
        let mut buffer = RolloutBuffer::default();
        for done in [false, true] {
            let step = PendingStep {
                observation: arr1(&[0.0]),
                action: arr1(&[0.0]),
                value: 0.0,
                log_prob: 0.0,
            };
            buffer.push(step, 1.0, done);
        }
        buffer.compute_advantages(5.0, 0.5, 1.0);
        assert_relative_eq!(buffer.advantages()[1], 1.0);
        assert_relative_eq!(buffer.advantages()[0], 1.5);
        assert_relative_eq!(buffer.returns()[0], 1.5);
    }

    #[test]
    fn test_update_runs_when_rollout_is_full() {
        let mut agent = PpoAgent::new(2, 1, config(8)).unwrap();
        let policy = agent.policy().clone();
        let log_std = agent.log_std().clone();
        for t in 0..8 {
            agent.apply(f64::from(t), &[0.1, 0.2], 1.0).unwrap();
        }
        assert_eq!(agent.rollout().len(), 7);
        assert_eq!(agent.updates(), 0);

        agent.apply(8.0, &[0.1, 0.2], 1.0).unwrap();
        assert_eq!(agent.updates(), 1);
        assert!(agent.rollout().is_empty());
        assert_ne!(agent.policy(), &policy);
        assert_ne!(agent.log_std(), &log_std);
        assert!(agent.log_std().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_reset_closes_pending_step() {
        let mut agent = PpoAgent::new(1, 1, config(16)).unwrap();
        agent.apply(0.0, &[0.5], 0.0).unwrap();
        agent.apply(1.0, &[0.6], 1.0).unwrap();
        agent.reset();
        assert_eq!(agent.rollout().dones(), &[false, true]);
    }

    #[test]
    fn test_learning_disabled_collects_nothing() {
        let mut agent = PpoAgent::new(1, 2, config(4)).unwrap();
        agent.set_learning(false);
        for t in 0..10 {
            let action = agent.apply(f64::from(t), &[0.5], 1.0).unwrap();
            assert_eq!(action.len(), 2);
        }
        agent.reset();
        assert!(agent.rollout().is_empty());
        assert_eq!(agent.updates(), 0);
    }

    #[test]
    fn test_reinitialize_restores_log_std() {
        let mut agent = PpoAgent::new(1, 1, config(4)).unwrap();
        for t in 0..10 {
            agent.apply(f64::from(t), &[0.5], 1.0).unwrap();
        }
        agent.reinitialize();
        assert_eq!(agent.log_std(), &Array1::from_elem(1, -0.5));
        assert!(agent.rollout().is_empty());
        assert_eq!(agent.updates(), 0);
    }

    #[test]
    fn test_wrong_observation_length() {
        let mut agent = PpoAgent::new(3, 1, config(4)).unwrap();
        assert!(matches!(
            agent.apply(0.0, &[0.5], 0.0),
            Err(RLError::DimensionMismatch { expected: 3, actual: 1, .. })
        ));
    }

    #[test]
    fn test_snapshot_reports_std_as_scalar() {
        let config = PpoConfig {
            init_log_std: 1.0,
            ..config(4)
        };
        let mut agent = PpoAgent::new(1, 1, config).unwrap();
        agent.apply(0.0, &[0.5], 0.0).unwrap();
        let snapshot = agent.snapshot();
        assert_relative_eq!(snapshot.scalars["std"], 1.0f64.exp());
        assert_relative_eq!(snapshot.exploration_rate, 0.0);
    }
}
