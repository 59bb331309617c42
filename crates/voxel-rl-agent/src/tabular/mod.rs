//! Tabular action-value agents
//!
//! One agent structure serves every tabular algorithm; the temporal
//! difference target is chosen by an [`UpdateRule`]. Each call to
//! [`DiscreteAgent::apply`]:
//!
//! 1. reads ε and α from the configured schedules,
//! 2. finds the greedy action in the new state (lowest index on ties),
//! 3. picks the greedy action with probability `1 - ε`, else a uniform one,
//! 4. updates the tables from the previous transition, if any,
//! 5. remembers the new state and action for the next call.
//!
//! The greedy action and ε-greedy draw are taken before the update, so the
//! result matches an update-then-select ordering while letting SARSA
//! bootstrap on the action it actually takes.

mod rule;

pub use rule::UpdateRule;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use voxel_rl_core::config::{check_positive, check_unit};
use voxel_rl_core::math::{argmax, gaussian_matrix};
use voxel_rl_core::{
    AgentConfig, AgentSnapshot, DiscreteAgent, Lifecycle, RLError, Result, StepView,
};

use rule::{QTables, TdStep};

/// Tabular agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Update rule
    pub rule: UpdateRule,
}

impl TabularConfig {
    /// Default configuration with the given rule
    #[must_use]
    pub fn with_rule(rule: UpdateRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if let Some(lambda) = self.rule.lambda() {
            check_unit("lambda", lambda)?;
        }
        Ok(())
    }
}

/// Agent holding a `states × actions` table of action values
#[derive(Debug, Clone)]
pub struct QTableAgent {
    config: TabularConfig,
    tables: QTables,
    /// State and action of the last call
    previous: Option<(usize, usize)>,
    last_reward: Option<f64>,
    learning_rate: f64,
    exploration_rate: f64,
    episode: usize,
    steps: usize,
    learning: bool,
    rng: StdRng,
}

impl QTableAgent {
    /// Create a new tabular agent
    pub fn new(states: usize, actions: usize, config: TabularConfig) -> Result<Self> {
        check_positive("states", states)?;
        check_positive("actions", actions)?;
        config.validate()?;

        let mut rng = config.base.rng();
        let tables = Self::fresh_tables(states, actions, &config, &mut rng);

        Ok(Self {
            config,
            tables,
            previous: None,
            last_reward: None,
            learning_rate: 0.0,
            exploration_rate: 0.0,
            episode: 0,
            steps: 0,
            learning: true,
            rng,
        })
    }

    fn fresh_tables(
        states: usize,
        actions: usize,
        config: &TabularConfig,
        rng: &mut StdRng,
    ) -> QTables {
        let init = config.base.init;
        let a = gaussian_matrix(states, actions, init, rng);
        let b = config
            .rule
            .uses_second_table()
            .then(|| gaussian_matrix(states, actions, init, rng));
        let traces = config
            .rule
            .lambda()
            .map(|_| Array2::zeros((states, actions)));
        QTables { a, b, traces }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &TabularConfig {
        &self.config
    }

    /// Primary action-value table
    #[must_use]
    pub fn q_table(&self) -> &Array2<f64> {
        &self.tables.a
    }

    /// Greedy action in `state`, using both tables under double learning
    pub fn greedy_action(&self, state: usize) -> Result<usize> {
        self.check_state(state)?;
        Ok(argmax(&self.tables.combined_row(state)))
    }

    /// Current eligibility traces, for rules that keep them
    #[must_use]
    pub fn traces(&self) -> Option<&Array2<f64>> {
        self.tables.traces.as_ref()
    }

    fn check_state(&self, state: usize) -> Result<()> {
        let limit = self.tables.a.nrows();
        if state < limit {
            Ok(())
        } else {
            Err(RLError::IndexOutOfRange {
                context: "tabular state",
                index: state,
                limit,
            })
        }
    }
}

impl Lifecycle for QTableAgent {
    fn reset(&mut self) {
        self.previous = None;
        self.last_reward = None;
        self.episode += 1;
        if let Some(traces) = self.tables.traces.as_mut() {
            traces.fill(0.0);
        }
        debug!(algorithm = self.config.rule.name(), episode = self.episode, "episode reset");
    }

    fn reinitialize(&mut self) {
        let (states, actions) = self.tables.a.dim();
        self.tables = Self::fresh_tables(states, actions, &self.config, &mut self.rng);
        self.previous = None;
        self.last_reward = None;
        self.episode = 0;
        self.steps = 0;
        debug!(algorithm = self.config.rule.name(), "tables reinitialized");
    }

    fn snapshot(&self) -> AgentSnapshot {
        let mut snapshot = AgentSnapshot::new(self.config.rule.name())
            .with_tensor("q", self.tables.a.clone())
            .with_scalar("gamma", self.config.base.gamma);
        if let Some(b) = &self.tables.b {
            snapshot = snapshot.with_tensor("q_b", b.clone());
        }
        if let Some(traces) = &self.tables.traces {
            snapshot = snapshot.with_tensor("traces", traces.clone());
        }
        if let Some(lambda) = self.config.rule.lambda() {
            snapshot = snapshot.with_scalar("lambda", lambda);
        }
        snapshot.episode = self.episode;
        snapshot.steps = self.steps;
        snapshot.learning_rate = self.learning_rate;
        snapshot.exploration_rate = self.exploration_rate;
        snapshot.learning = self.learning;
        snapshot.state = self.previous.map(|(s, _)| StepView::Index(s));
        snapshot.action = self.previous.map(|(_, a)| StepView::Index(a));
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

impl DiscreteAgent for QTableAgent {
    fn state_count(&self) -> usize {
        self.tables.a.nrows()
    }

    fn action_count(&self) -> usize {
        self.tables.a.ncols()
    }

    fn apply(&mut self, time: f64, state: usize, reward: f64) -> Result<usize> {
        self.check_state(state)?;

        let base = &self.config.base;
        let clock = base.clock.reading(self.episode, self.steps, time);
        let epsilon = base.exploration.rate(clock);
        let alpha = base.learning_rate.rate(clock);
        self.exploration_rate = epsilon;
        self.learning_rate = alpha;

        let actions = self.action_count();
        let greedy = argmax(&self.tables.combined_row(state));
        let action = if self.rng.gen::<f64>() < epsilon {
            self.rng.gen_range(0..actions)
        } else {
            greedy
        };

        if let (Some((prev_state, prev_action)), true) = (self.previous, self.learning) {
            let step = TdStep {
                state: prev_state,
                action: prev_action,
                reward,
                next_state: state,
                next_action: action,
                greedy_next: greedy,
                alpha,
                epsilon,
                gamma: self.config.base.gamma,
            };
            self.config.rule.update(&mut self.tables, &step, &mut self.rng);
            trace!(
                algorithm = self.config.rule.name(),
                prev_state,
                prev_action,
                reward,
                state,
                "td update"
            );
        }

        self.previous = Some((state, action));
        self.last_reward = Some(reward);
        self.steps += 1;
        Ok(action)
    }
}
