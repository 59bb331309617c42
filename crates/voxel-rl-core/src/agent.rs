//! Agent traits
//!
//! Agents are stepped once per simulation tick with the current time, the
//! latest observation and the reward earned by the previous action. They
//! mutate in place and are not meant to be shared between callers.

use crate::snapshot::AgentSnapshot;

/// Episode and trial management common to every agent
pub trait Lifecycle {
    /// Start a new episode: forget the previous transition, bump the
    /// episode counter and clear eligibility traces. Learned values stay.
    fn reset(&mut self);

    /// Start a new trial: redraw every table or weight from the initial
    /// distribution and zero the episode counter.
    fn reinitialize(&mut self);

    /// Copy of the internal learning state for diagnostics
    fn snapshot(&self) -> AgentSnapshot;

    /// Enable or disable updates
    fn set_learning(&mut self, learning: bool);

    /// Check if updates are enabled
    fn is_learning(&self) -> bool;
}

/// Agent acting on discrete state indices with discrete action indices
pub trait DiscreteAgent: Lifecycle {
    /// Number of state indices accepted
    fn state_count(&self) -> usize;

    /// Number of action indices produced
    fn action_count(&self) -> usize;

    /// Learn from the reward of the previous action and pick the next one
    fn apply(&mut self, time: f64, state: usize, reward: f64) -> crate::Result<usize>;
}

/// Agent acting on observation vectors with action vectors
pub trait ContinuousAgent: Lifecycle {
    /// Length of the observation vector
    fn observation_dim(&self) -> usize;

    /// Length of the action vector
    fn action_dim(&self) -> usize;

    /// Learn from the reward of the previous action and pick the next one
    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> crate::Result<Vec<f64>>;
}

impl<A: Lifecycle + ?Sized> Lifecycle for Box<A> {
    fn reset(&mut self) {
        (**self).reset();
    }

    fn reinitialize(&mut self) {
        (**self).reinitialize();
    }

    fn snapshot(&self) -> AgentSnapshot {
        (**self).snapshot()
    }

    fn set_learning(&mut self, learning: bool) {
        (**self).set_learning(learning);
    }

    fn is_learning(&self) -> bool {
        (**self).is_learning()
    }
}

impl<A: DiscreteAgent + ?Sized> DiscreteAgent for Box<A> {
    fn state_count(&self) -> usize {
        (**self).state_count()
    }

    fn action_count(&self) -> usize {
        (**self).action_count()
    }

    fn apply(&mut self, time: f64, state: usize, reward: f64) -> crate::Result<usize> {
        (**self).apply(time, state, reward)
    }
}

impl<A: ContinuousAgent + ?Sized> ContinuousAgent for Box<A> {
    fn observation_dim(&self) -> usize {
        (**self).observation_dim()
    }

    fn action_dim(&self) -> usize {
        (**self).action_dim()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> crate::Result<Vec<f64>> {
        (**self).apply(time, observation, reward)
    }
}
