//! Read-only views of an agent's learning state
//!
//! Snapshots are copies; nothing written into one flows back into the
//! agent that produced it.

use ndarray::Array2;
use serde::Serialize;
use std::collections::BTreeMap;

/// What the agent last saw and did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepView {
    /// Discrete state/action index
    Index(usize),
    /// Continuous vector
    Vector(Vec<f64>),
}

/// Diagnostic copy of an agent's internals
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    /// Algorithm name
    pub algorithm: &'static str,
    /// Completed episodes since the last reinitialisation
    pub episode: usize,
    /// `apply` calls since the last reinitialisation
    pub steps: usize,
    /// Learning rate used on the last step
    pub learning_rate: f64,
    /// Exploration rate used on the last step
    pub exploration_rate: f64,
    /// Whether updates are enabled
    pub learning: bool,
    /// Last observed state
    pub state: Option<StepView>,
    /// Last emitted action
    pub action: Option<StepView>,
    /// Last received reward
    pub reward: Option<f64>,
    /// Tables, weight matrices and traces by name
    pub tensors: BTreeMap<String, Array2<f64>>,
    /// Algorithm-specific scalars
    pub scalars: BTreeMap<String, f64>,
}

impl AgentSnapshot {
    /// Empty snapshot for `algorithm`
    #[must_use]
    pub fn new(algorithm: &'static str) -> Self {
        Self {
            algorithm,
            episode: 0,
            steps: 0,
            learning_rate: 0.0,
            exploration_rate: 0.0,
            learning: true,
            state: None,
            action: None,
            reward: None,
            tensors: BTreeMap::new(),
            scalars: BTreeMap::new(),
        }
    }

    /// Add a named tensor
    #[must_use]
    pub fn with_tensor(mut self, name: &str, tensor: Array2<f64>) -> Self {
        self.tensors.insert(name.to_string(), tensor);
        self
    }

    /// Add a named scalar
    #[must_use]
    pub fn with_scalar(mut self, name: &str, value: f64) -> Self {
        self.scalars.insert(name.to_string(), value);
        self
    }

    /// Pretty JSON for plotting tools
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_contains_tensors() {
        let snapshot = AgentSnapshot::new("q_learning")
            .with_tensor("q", Array2::zeros((2, 3)))
            .with_scalar("lambda", 0.9);
        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["algorithm"], "q_learning");
        assert_eq!(value["tensors"]["q"]["dim"][1], 3);
        assert_eq!(value["scalars"]["lambda"], 0.9);
    }
}
