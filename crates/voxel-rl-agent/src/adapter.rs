//! Running discrete agents against continuous observations and actions

use std::sync::Arc;
use tracing::trace;

use voxel_rl_core::{
    ensure_dimension, AgentSnapshot, ContinuousAgent, DiscreteAgent, InputConverter, Lifecycle,
    OutputConverter, RLError, Result,
};

/// A [`DiscreteAgent`] seen through an input and an output converter
///
/// `apply(t, v, r)` is `output(agent.apply(t, input(v), r))`. Lifecycle calls
/// go straight to the wrapped agent.
#[derive(Debug)]
pub struct DiscreteAdapter<A> {
    agent: A,
    input: Arc<dyn InputConverter>,
    output: Arc<dyn OutputConverter>,
}

impl<A: DiscreteAgent> DiscreteAdapter<A> {
    /// Wrap `agent`, checking that the converters match its state and
    /// action counts
    pub fn new(
        agent: A,
        input: Arc<dyn InputConverter>,
        output: Arc<dyn OutputConverter>,
    ) -> Result<Self> {
        if input.output_dim() != agent.state_count() {
            return Err(RLError::dimension(
                "adapter state count",
                agent.state_count(),
                input.output_dim(),
            ));
        }
        if output.input_dim() != agent.action_count() {
            return Err(RLError::dimension(
                "adapter action count",
                agent.action_count(),
                output.input_dim(),
            ));
        }
        Ok(Self {
            agent,
            input,
            output,
        })
    }

    /// Wrapped agent
    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Mutable access to the wrapped agent
    pub fn agent_mut(&mut self) -> &mut A {
        &mut self.agent
    }

    /// Unwrap the agent
    pub fn into_inner(self) -> A {
        self.agent
    }
}

/// Wrap a discrete agent as a [`ContinuousAgent`]
pub fn adapt<A: DiscreteAgent>(
    agent: A,
    input: Arc<dyn InputConverter>,
    output: Arc<dyn OutputConverter>,
) -> Result<DiscreteAdapter<A>> {
    DiscreteAdapter::new(agent, input, output)
}

impl<A: DiscreteAgent> Lifecycle for DiscreteAdapter<A> {
    fn reset(&mut self) {
        self.agent.reset();
    }

    fn reinitialize(&mut self) {
        self.agent.reinitialize();
    }

    fn snapshot(&self) -> AgentSnapshot {
        self.agent.snapshot()
    }

    fn set_learning(&mut self, learning: bool) {
        self.agent.set_learning(learning);
    }

    fn is_learning(&self) -> bool {
        self.agent.is_learning()
    }
}

impl<A: DiscreteAgent> ContinuousAgent for DiscreteAdapter<A> {
    fn observation_dim(&self) -> usize {
        self.input.input_dim()
    }

    fn action_dim(&self) -> usize {
        self.output.output_dim()
    }

    fn apply(&mut self, time: f64, observation: &[f64], reward: f64) -> Result<Vec<f64>> {
        ensure_dimension("adapter observation", self.input.input_dim(), observation.len())?;
        let state = self.input.apply(observation)?;
        let action = self.agent.apply(time, state, reward)?;
        trace!(state, action, "adapter step");
        let out = self.output.apply(action)?;
        ensure_dimension("adapter action", self.output.output_dim(), out.len())?;
        Ok(out)
    }
}
