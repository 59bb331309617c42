//! Single-step experience

use serde::{Deserialize, Serialize};

/// One `(state, action, reward, next_state)` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<S, A> {
    /// State the action was taken in
    pub state: S,
    /// Action taken
    pub action: A,
    /// Reward received for the action
    pub reward: f64,
    /// State reached
    pub next_state: S,
}

impl<S, A> Transition<S, A> {
    /// Create a new transition
    pub fn new(state: S, action: A, reward: f64, next_state: S) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
        }
    }
}
