//! Error types for the RL core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// A vector or table did not have the declared size
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// Declared size
        expected: usize,
        /// Size actually supplied
        actual: usize,
    },

    /// A replay batch larger than the memory contents was requested
    #[error("Requested batch of {requested} transitions but memory holds {available}")]
    BatchTooLarge {
        /// Batch size asked for
        requested: usize,
        /// Transitions currently stored
        available: usize,
    },

    /// A discrete index outside its declared range
    #[error("Index {index} out of range in {context} (limit {limit})")]
    IndexOutOfRange {
        /// Where the index was rejected
        context: &'static str,
        /// Offending index
        index: usize,
        /// Exclusive upper bound
        limit: usize,
    },

    /// A channel cluster with no members
    #[error("Cluster {cluster} has no members")]
    EmptyCluster {
        /// Position of the empty cluster
        cluster: usize,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RLError {
    /// Shorthand for a dimension mismatch
    #[must_use]
    pub fn dimension(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;

/// Fail with [`RLError::DimensionMismatch`] unless `actual == expected`
pub fn ensure_dimension(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RLError::dimension(context, expected, actual))
    }
}
