//! Reinforcement learning agents for the voxel robotics platform
//!
//! This crate provides the learning controllers built on `voxel-rl-core`:
//! - Tabular Q-learning, SARSA(λ), Watkins Q(λ), Expected SARSA and
//!   Double Q-learning behind one [`QTableAgent`]
//! - Linear SARSA(λ) on radial-basis features
//! - Deep Q-Networks (DQN) with replay memory and a target network
//! - A linear Gaussian policy-gradient agent
//! - Proximal Policy Optimization (PPO)
//! - An adapter running any discrete agent on continuous vectors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod dqn;
pub mod gaussian_pg;
pub mod nn;
pub mod ppo;
pub mod random;
pub mod rbf;
pub mod tabular;

// Re-export agents
pub use adapter::{adapt, DiscreteAdapter};
pub use dqn::{DqnAgent, DqnConfig};
pub use gaussian_pg::{GaussianPgAgent, GaussianPgConfig};
pub use ppo::{PpoAgent, PpoConfig};
pub use random::RandomAgent;
pub use rbf::{RbfSarsaAgent, RbfSarsaConfig};
pub use tabular::{QTableAgent, TabularConfig, UpdateRule};

// Re-export network components
pub use nn::{Activation, Mlp};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        adapt, DqnAgent, DqnConfig, GaussianPgAgent, GaussianPgConfig, PpoAgent, PpoConfig,
        QTableAgent, RandomAgent, RbfSarsaAgent, RbfSarsaConfig, TabularConfig, UpdateRule,
    };
    pub use voxel_rl_core::prelude::*;
}
