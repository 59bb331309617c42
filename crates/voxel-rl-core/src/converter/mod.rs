//! Converters between continuous vectors and discrete indices
//!
//! An [`InputConverter`] discretises an observation vector into a single
//! state index; an [`OutputConverter`] expands an action index into an
//! actuator vector. Both are stateless and are shared behind `Arc` by the
//! agents and adapters that use them.

mod cluster;
mod input;
mod output;
mod radix;

pub use cluster::{ClusterBroadcast, ClusterMean};
pub use input::{Binning, DiscretizingInput};
pub use output::{BinaryOutput, GridOutput, LeveledOutput};
pub use radix::MixedRadix;

use std::fmt::Debug;

/// Continuous vector to discrete index
pub trait InputConverter: Debug + Send + Sync {
    /// Length of the vectors accepted by [`InputConverter::apply`]
    fn input_dim(&self) -> usize;

    /// Number of distinct indices produced
    fn output_dim(&self) -> usize;

    /// Map a vector to its index
    fn apply(&self, input: &[f64]) -> crate::Result<usize>;
}

/// Discrete index to continuous vector
pub trait OutputConverter: Debug + Send + Sync {
    /// Number of distinct indices accepted by [`OutputConverter::apply`]
    fn input_dim(&self) -> usize;

    /// Length of the produced vectors
    fn output_dim(&self) -> usize;

    /// Map an index to its vector
    fn apply(&self, index: usize) -> crate::Result<Vec<f64>>;
}
