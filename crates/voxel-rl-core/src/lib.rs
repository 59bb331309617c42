//! Core reinforcement learning types for the voxel robotics platform
//!
//! This crate provides the pieces every learning controller shares:
//! the agent traits, converters between continuous and discrete spaces,
//! replay memory, rate schedules and diagnostic snapshots. It performs no
//! I/O; observations, rewards and actions are plain vectors and scalars.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod converter;
pub mod error;
pub mod math;
pub mod memory;
pub mod schedule;
pub mod snapshot;
pub mod transition;

// Re-export core traits and types
pub use agent::{ContinuousAgent, DiscreteAgent, Lifecycle};
pub use config::{AgentConfig, GaussianInit};
pub use converter::{InputConverter, OutputConverter};
pub use error::{ensure_dimension, RLError, Result};
pub use memory::ReplayMemory;
pub use schedule::{Schedule, ScheduleClock, ScheduleConfig};
pub use snapshot::{AgentSnapshot, StepView};
pub use transition::Transition;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentConfig, AgentSnapshot, ContinuousAgent, DiscreteAgent, InputConverter, Lifecycle,
        OutputConverter, Result,
    };
}
