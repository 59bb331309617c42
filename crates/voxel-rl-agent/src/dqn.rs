//! Deep Q-Network (DQN) agent
//!
//! A three-layer perceptron maps an observation to one value per discrete
//! action. Every layer, the output included, uses ReLU. Transitions are kept
//! in a bounded [`ReplayMemory`]; once it holds more than `batch_size` of
//! them, each step samples a batch and takes one gradient step on the
//! squared TD error of the actions actually taken. Bootstrap targets come
//! from a target network that is overwritten with the online weights every
//! `target_sync_every` gradient steps.

use metrics::counter;
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use voxel_rl_core::config::{check_positive, check_unit};
use voxel_rl_core::math::argmax;
use voxel_rl_core::{
    ensure_dimension, AgentConfig, AgentSnapshot, ContinuousAgent, Lifecycle, OutputConverter,
    RLError, ReplayMemory, Result, StepView, Transition,
};

use crate::nn::{Activation, Gradients, Mlp};

/// DQN-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Base agent configuration; its exploration schedule is not used
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Widths of the two hidden layers
    pub hidden: (usize, usize),
    /// Transitions per gradient step
    pub batch_size: usize,
    /// Replay memory capacity
    pub memory_capacity: usize,
    /// Gradient steps between target network syncs
    pub target_sync_every: usize,
    /// Exploration rate at step zero
    pub epsilon_start: f64,
    /// Exploration decrease per step
    pub epsilon_decay: f64,
    /// Lowest exploration rate
    pub epsilon_floor: f64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            hidden: (32, 32),
            batch_size: 32,
            memory_capacity: 10_000,
            target_sync_every: 100,
            epsilon_start: 1.0,
            epsilon_decay: 1e-3,
            epsilon_floor: 0.1,
        }
    }
}

impl DqnConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_positive("hidden.0", self.hidden.0)?;
        check_positive("hidden.1", self.hidden.1)?;
        check_positive("batch_size", self.batch_size)?;
        check_positive("target_sync_every", self.target_sync_every)?;
        check_unit("epsilon_start", self.epsilon_start)?;
        check_unit("epsilon_floor", self.epsilon_floor)?;
        if self.memory_capacity <= self.batch_size {
            return Err(RLError::InvalidConfig(format!(
                "memory_capacity ({}) must exceed batch_size ({})",
                self.memory_capacity, self.batch_size
            )));
        }
        if !(self.epsilon_decay >= 0.0) {
            return Err(RLError::InvalidConfig(format!(
                "epsilon_decay must be non-negative, got {}",
                self.epsilon_decay
            )));
        }
        Ok(())
    }

    /// Linearly decayed exploration rate after `steps` steps
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn epsilon(&self, steps: usize) -> f64 {
        (self.epsilon_start - self.epsilon_decay * steps as f64).max(self.epsilon_floor)
    }
}

/// Replayed DQN step
pub type Experience = Transition<Array1<f64>, usize>;

/// DQN agent
#[derive(Debug, Clone)]
pub struct DqnAgent {
    config: DqnConfig,
    output: Arc<dyn OutputConverter>,
    online: Mlp,
    target: Mlp,
    memory: ReplayMemory<Experience>,
    previous: Option<(Array1<f64>, usize)>,
    last_reward: Option<f64>,
    learning_rate: f64,
    exploration_rate: f64,
    last_loss: f64,
    gradient_steps: usize,
    episode: usize,
    steps: usize,
    learning: bool,
    rng: StdRng,
}

impl DqnAgent {
    /// Create an agent for `observation_dim` inputs; actions are the indices
    /// accepted by `output`
    pub fn new(
        observation_dim: usize,
        output: Arc<dyn OutputConverter>,
        config: DqnConfig,
    ) -> Result<Self> {
        check_positive("observation_dim", observation_dim)?;
        check_positive("action count", output.input_dim())?;
        config.validate()?;

        let mut rng = config.base.rng();
        let online = Mlp::three_layer(
            observation_dim,
            config.hidden,
            output.input_dim(),
            [Activation::Relu; 3],
            &mut rng,
        );
        let target = online.clone();
        let memory = ReplayMemory::new(config.memory_capacity)?;

        Ok(Self {
            config,
            output,
            online,
            target,
            memory,
            previous: None,
            last_reward: None,
            learning_rate: 0.0,
            exploration_rate: 0.0,
            last_loss: 0.0,
            gradient_steps: 0,
            episode: 0,
            steps: 0,
            learning: true,
            rng,
        })
    }

    /// Online network
    #[must_use]
    pub fn network(&self) -> &Mlp {
        &self.online
    }

    /// Target network
    #[must_use]
    pub fn target_network(&self) -> &Mlp {
        &self.target
    }

    /// Stored transitions
    #[must_use]
    pub fn memory(&self) -> &ReplayMemory<Experience> {
        &self.memory
    }

    /// Gradient steps since the last reinitialisation
    #[must_use]
    pub fn gradient_steps(&self) -> usize {
        self.gradient_steps
    }

    /// Action values from the online network
    pub fn q_values(&self, observation: &[f64]) -> Result<Array1<f64>> {
        self.online.forward(ArrayView1::from(observation))
    }

    /// One gradient step on a sampled batch
    fn train_step(&mut self, alpha: f64) -> Result<()> {
        let batch = self.memory.sample_batch(self.config.batch_size, &mut self.rng)?;
        let gamma = self.config.base.gamma;

        let mut total = Gradients::zeros_like(&self.online);
        let mut loss = 0.0;
        for experience in &batch {
            let pass = self.online.forward_pass(experience.state.view())?;
            let next = self.target.forward(experience.next_state.view())?;
            let best = next[argmax(next.iter())];
            let td = pass.output[experience.action] - (experience.reward + gamma * best);

            let mut grad_output = Array1::zeros(pass.output.len());
            grad_output[experience.action] = td;
            total.accumulate(&self.online.backward(&pass, &grad_output)?);
            loss += 0.5 * td * td;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = batch.len() as f64;
        total.scale(1.0 / n);
        self.online.apply_gradients(&total, alpha);
        self.last_loss = loss / n;
        self.gradient_steps += 1;
        counter!("voxel_rl_dqn_gradient_steps", 1);
        trace!(loss = self.last_loss, step = self.gradient_steps, "dqn gradient step");

        if self.gradient_steps % self.config.target_sync_every == 0 {
            self.target.copy_from(&self.online);
            counter!("voxel_rl_dqn_target_syncs", 1);
            debug!(step = self.gradient_steps, "target network synced");
        }
        Ok(())
    }
}

impl Lifecycle for DqnAgent {
    fn reset(&mut self) {
        self.previous = None;
        self.last_reward = None;
        self.episode += 1;
        debug!(algorithm = "dqn", episode = self.episode, "episode reset");
    }

    fn reinitialize(&mut self) {
        self.online.reinitialize(&mut self.rng);
        self.target.copy_from(&self.online);
        self.memory.clear();
        self.previous = None;
        self.last_reward = None;
        self.last_loss = 0.0;
        self.gradient_steps = 0;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = "dqn", "networks reinitialized");
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> AgentSnapshot {
        let mut snapshot = self
            .online
            .export("online", AgentSnapshot::new("dqn"))
            .with_scalar("memory_len", self.memory.len() as f64)
            .with_scalar("gradient_steps", self.gradient_steps as f64)
            .with_scalar("loss", self.last_loss);
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.learning_rate = self.learning_rate;
        snapshot.exploration_rate = self.exploration_rate;
        snapshot.learning = self.learning;
        snapshot.state = self
            .previous
            .as_ref()
            .map(|(s, _)| StepView::Vector(s.to_vec()));
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

impl ContinuousAgent for DqnAgent {
    fn observation_dim(&self) -> usize {
        self.online.input_dim()
    }

    fn action_dim(&self) -> usize {
        self.output.output_dim()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("dqn observation", self.online.input_dim(), observation.len())?;

        let base = &self.config.base;
        let alpha = base
            .learning_rate
            .rate(base.clock.reading(self.episode, self.steps, time));
        let epsilon = self.config.epsilon(self.steps);
        self.learning_rate = alpha;
        self.exploration_rate = epsilon;

        let state = Array1::from(observation.to_vec());
        if self.learning {
            if let Some((prev_state, prev_action)) = self.previous.take() {
                self.memory.push(Transition::new(
                    prev_state,
                    prev_action,
                    reward,
                    state.clone(),
                ));
            }
            if self.memory.len() > self.config.batch_size {
                self.train_step(alpha)?;
            }
        }

        let q = self.online.forward(state.view())?;
        let action = if self.rng.gen::<f64>() < epsilon {
            self.rng.gen_range(0..q.len())
        } else {
            argmax(q.iter())
        };

        self.previous = Some((state, action));
        self.last_reward = Some(reward);
        self.steps += 1;

        let out = self.output.apply(action)?;
        ensure_dimension("dqn action", self.output.output_dim(), out.len())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxel_rl_core::converter::BinaryOutput;
    use voxel_rl_core::ScheduleConfig;

    fn config() -> DqnConfig {
        DqnConfig {
            base: AgentConfig {
                learning_rate: ScheduleConfig::constant(0.05),
                seed: Some(11),
                ..AgentConfig::default()
            },
            hidden: (8, 8),
            batch_size: 4,
            memory_capacity: 16,
            target_sync_every: 3,
            epsilon_start: 1.0,
            epsilon_decay: 0.1,
            epsilon_floor: 0.1,
        }
    }

    fn agent() -> DqnAgent {
        let output = Arc::new(BinaryOutput::new(1, 1.0).unwrap());
        DqnAgent::new(2, output, config()).unwrap()
    }

    #[test]
    fn test_epsilon_decays_to_floor() {
        let c = config();
        assert!((c.epsilon(0) - 1.0).abs() < 1e-12);
        assert!((c.epsilon(5) - 0.5).abs() < 1e-12);
        assert!((c.epsilon(1000) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_config() {
        let mut c = config();
        c.memory_capacity = 4;
        assert!(matches!(c.validate(), Err(RLError::InvalidConfig(_))));
    }

    #[test]
    fn test_q_values_are_non_negative() {
        let agent = agent();
        let q = agent.q_values(&[-3.0, 2.0]).unwrap();
        assert_eq!(q.len(), 2);
        assert!(q.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_training_starts_after_batch_size_and_syncs_target() {
        let mut agent = agent();
        for t in 0..5 {
            agent.apply(f64::from(t), &[0.1 * f64::from(t), 1.0], 1.0).unwrap();
        }
        // four transitions stored, not yet more than batch_size
        assert_eq!(agent.memory().len(), 4);
        assert_eq!(agent.gradient_steps(), 0);

        agent.apply(5.0, &[0.5, 1.0], 1.0).unwrap();
        assert_eq!(agent.gradient_steps(), 1);

        for t in 6..8 {
            agent.apply(f64::from(t), &[0.2, 0.3], 1.0).unwrap();
        }
        assert_eq!(agent.gradient_steps(), 3);
        assert_eq!(agent.network(), agent.target_network());
    }

    #[test]
    fn test_memory_stays_bounded() {
        let mut agent = agent();
        for t in 0..40 {
            agent.apply(f64::from(t), &[0.0, 1.0], 0.0).unwrap();
        }
        assert_eq!(agent.memory().len(), 16);
    }

    #[test]
    fn test_learning_disabled_leaves_memory_empty() {
        let mut agent = agent();
        agent.set_learning(false);
        for t in 0..10 {
            agent.apply(f64::from(t), &[0.0, 1.0], 1.0).unwrap();
        }
        assert!(agent.memory().is_empty());
        assert_eq!(agent.gradient_steps(), 0);
    }

    #[test]
    fn test_reinitialize_clears_memory() {
        let mut agent = agent();
        for t in 0..10 {
            agent.apply(f64::from(t), &[0.0, 1.0], 1.0).unwrap();
        }
        let before = agent.network().clone();
        agent.reinitialize();
        assert!(agent.memory().is_empty());
        assert_ne!(agent.network(), &before);
        assert_eq!(agent.network(), agent.target_network());
        assert_eq!(agent.snapshot().episode, 0);
    }

    #[test]
    fn test_reset_keeps_weights_and_skips_cross_episode_transition() {
        let mut agent = agent();
        agent.apply(0.0, &[0.0, 1.0], 0.0).unwrap();
        agent.reset();
        let weights = agent.network().clone();
        agent.apply(1.0, &[1.0, 0.0], 5.0).unwrap();
        assert_eq!(agent.network(), &weights);
        assert!(agent.memory().is_empty());
    }
}
