//! Temporal-difference update rules for tabular agents

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use voxel_rl_core::math::{argmax, max_value};

/// Which temporal-difference target a [`super::QTableAgent`] learns from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateRule {
    /// Off-policy one-step Q-learning
    #[default]
    QLearning,
    /// On-policy SARSA with accumulating eligibility traces
    Sarsa {
        /// Trace decay
        lambda: f64,
    },
    /// Watkins Q(λ): greedy bootstrap, traces cut after exploratory actions
    WatkinsQ {
        /// Trace decay
        lambda: f64,
    },
    /// Bootstraps on the expected value under the ε-greedy policy
    ExpectedSarsa,
    /// Two tables, each bootstrapped from the other
    DoubleQ,
}

impl UpdateRule {
    /// Algorithm name used in snapshots and logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::QLearning => "q_learning",
            Self::Sarsa { .. } => "sarsa_lambda",
            Self::WatkinsQ { .. } => "watkins_q_lambda",
            Self::ExpectedSarsa => "expected_sarsa",
            Self::DoubleQ => "double_q_learning",
        }
    }

    /// Trace decay, for rules that keep traces
    #[must_use]
    pub fn lambda(&self) -> Option<f64> {
        match self {
            Self::Sarsa { lambda } | Self::WatkinsQ { lambda } => Some(*lambda),
            _ => None,
        }
    }

    /// Whether a second table is kept
    #[must_use]
    pub fn uses_second_table(&self) -> bool {
        matches!(self, Self::DoubleQ)
    }

    /// Apply one update to `tables`
    pub(crate) fn update<R: Rng + ?Sized>(&self, tables: &mut QTables, step: &TdStep, rng: &mut R) {
        let TdStep {
            state: s,
            action: a,
            reward: r,
            next_state: s2,
            next_action: a2,
            greedy_next,
            alpha,
            epsilon,
            gamma,
        } = *step;

        match self {
            Self::QLearning => {
                let target = r + gamma * max_value(tables.a.row(s2));
                tables.a[[s, a]] += alpha * (target - tables.a[[s, a]]);
            }
            Self::ExpectedSarsa => {
                let actions = tables.a.ncols();
                #[allow(clippy::cast_precision_loss)]
                let share = epsilon / actions as f64;
                let row = tables.a.row(s2);
                let expected: f64 = row
                    .iter()
                    .enumerate()
                    .map(|(i, &q)| {
                        let p = if i == greedy_next { 1.0 - epsilon + share } else { share };
                        p * q
                    })
                    .sum();
                let target = r + gamma * expected;
                tables.a[[s, a]] += alpha * (target - tables.a[[s, a]]);
            }
            Self::Sarsa { lambda } => {
                let delta = r + gamma * tables.a[[s2, a2]] - tables.a[[s, a]];
                if let Some(traces) = tables.traces.as_mut() {
                    traces[[s, a]] += 1.0;
                    tables.a.scaled_add(alpha * delta, &*traces);
                    traces.mapv_inplace(|e| e * gamma * lambda);
                }
            }
            Self::WatkinsQ { lambda } => {
                let delta = r + gamma * max_value(tables.a.row(s2)) - tables.a[[s, a]];
                if let Some(traces) = tables.traces.as_mut() {
                    traces[[s, a]] += 1.0;
                    tables.a.scaled_add(alpha * delta, &*traces);
                    if a2 == greedy_next {
                        traces.mapv_inplace(|e| e * gamma * lambda);
                    } else {
                        traces.fill(0.0);
                    }
                }
            }
            Self::DoubleQ => {
                if let Some(b) = tables.b.as_mut() {
                    if rng.gen_bool(0.5) {
                        cross_update(&mut tables.a, b, step);
                    } else {
                        cross_update(b, &tables.a, step);
                    }
                }
            }
        }
    }
}

/// Double-learning step: `learner` picks the bootstrap action, `critic` values it
fn cross_update(learner: &mut Array2<f64>, critic: &Array2<f64>, step: &TdStep) {
    let (s, a, s2) = (step.state, step.action, step.next_state);
    let best = argmax(learner.row(s2).iter());
    let target = step.reward + step.gamma * critic[[s2, best]];
    learner[[s, a]] += step.alpha * (target - learner[[s, a]]);
}

/// Value tables owned by one tabular agent
#[derive(Debug, Clone)]
pub(crate) struct QTables {
    /// Primary table
    pub a: Array2<f64>,
    /// Second table for double learning
    pub b: Option<Array2<f64>>,
    /// Eligibility traces
    pub traces: Option<Array2<f64>>,
}

impl QTables {
    /// Action values used for greedy selection in `state`
    pub fn combined_row(&self, state: usize) -> Vec<f64> {
        match &self.b {
            Some(b) => self
                .a
                .row(state)
                .iter()
                .zip(b.row(state))
                .map(|(x, y)| x + y)
                .collect(),
            None => self.a.row(state).to_vec(),
        }
    }
}

/// Everything a rule needs to update on one transition
#[derive(Debug, Clone, Copy)]
pub(crate) struct TdStep {
    pub state: usize,
    pub action: usize,
    pub reward: f64,
    pub next_state: usize,
    pub next_action: usize,
    pub greedy_next: usize,
    pub alpha: f64,
    pub epsilon: f64,
    pub gamma: f64,
}
