//! Channel clusters
//!
//! Voxel bodies often drive several actuators with one signal, or read
//! several sensors as one. A cluster is a non-empty list of channel
//! positions; empty clusters are rejected at construction.

use super::{InputConverter, OutputConverter};
use crate::{ensure_dimension, RLError, Result};

fn validate_clusters(clusters: &[Vec<usize>], channels: usize) -> Result<()> {
    for (cluster, members) in clusters.iter().enumerate() {
        if members.is_empty() {
            return Err(RLError::EmptyCluster { cluster });
        }
        if let Some(&bad) = members.iter().find(|&&m| m >= channels) {
            return Err(RLError::IndexOutOfRange {
                context: "cluster member",
                index: bad,
                limit: channels,
            });
        }
    }
    Ok(())
}

/// Replicates each decoded value across every channel of its cluster
///
/// Channels that belong to no cluster receive `0.0`.
#[derive(Debug, Clone)]
pub struct ClusterBroadcast<O> {
    inner: O,
    clusters: Vec<Vec<usize>>,
    channels: usize,
}

impl<O: OutputConverter> ClusterBroadcast<O> {
    /// Wrap `inner`, whose output has one value per cluster
    pub fn new(inner: O, clusters: Vec<Vec<usize>>, channels: usize) -> Result<Self> {
        ensure_dimension("cluster broadcast", inner.output_dim(), clusters.len())?;
        validate_clusters(&clusters, channels)?;
        Ok(Self {
            inner,
            clusters,
            channels,
        })
    }
}

impl<O: OutputConverter> OutputConverter for ClusterBroadcast<O> {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.channels
    }

    fn apply(&self, index: usize) -> Result<Vec<f64>> {
        let per_cluster = self.inner.apply(index)?;
        let mut out = vec![0.0; self.channels];
        for (value, members) in per_cluster.iter().zip(&self.clusters) {
            for &m in members {
                out[m] = *value;
            }
        }
        Ok(out)
    }
}

/// Averages each cluster's channels before handing them to `inner`
#[derive(Debug, Clone)]
pub struct ClusterMean<I> {
    inner: I,
    clusters: Vec<Vec<usize>>,
    channels: usize,
}

impl<I: InputConverter> ClusterMean<I> {
    /// Wrap `inner`, whose input has one value per cluster
    pub fn new(inner: I, clusters: Vec<Vec<usize>>, channels: usize) -> Result<Self> {
        ensure_dimension("cluster mean", inner.input_dim(), clusters.len())?;
        validate_clusters(&clusters, channels)?;
        Ok(Self {
            inner,
            clusters,
            channels,
        })
    }
}

impl<I: InputConverter> InputConverter for ClusterMean<I> {
    fn input_dim(&self) -> usize {
        self.channels
    }

    fn output_dim(&self) -> usize {
        self.inner.output_dim()
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(&self, input: &[f64]) -> Result<usize> {
        ensure_dimension("cluster mean input", self.channels, input.len())?;
        let means: Vec<f64> = self
            .clusters
            .iter()
            .map(|members| members.iter().map(|&m| input[m]).sum::<f64>() / members.len() as f64)
            .collect();
        self.inner.apply(&means)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{BinaryOutput, DiscretizingInput};

    #[test]
    fn test_broadcast_replicates_cluster_value() {
        let inner = BinaryOutput::new(2, 1.0).unwrap();
        let c = ClusterBroadcast::new(inner, vec![vec![0, 2], vec![1, 3, 4]], 6).unwrap();
        assert_eq!(c.output_dim(), 6);
        assert_eq!(c.apply(1).unwrap(), vec![1.0, -1.0, 1.0, -1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_empty_cluster_rejected() {
        let inner = BinaryOutput::new(2, 1.0).unwrap();
        let err = ClusterBroadcast::new(inner, vec![vec![0], vec![]], 2).unwrap_err();
        assert!(matches!(err, RLError::EmptyCluster { cluster: 1 }));
    }

    #[test]
    fn test_member_out_of_range_rejected() {
        let inner = DiscretizingInput::unit(&[2]).unwrap();
        assert!(ClusterMean::new(inner, vec![vec![0, 5]], 3).is_err());
    }

    #[test]
    fn test_cluster_mean_feeds_inner() {
        let inner = DiscretizingInput::unit(&[4, 4]).unwrap();
        let c = ClusterMean::new(inner, vec![vec![0, 1], vec![2]], 3).unwrap();
        // means are 0.3 and 0.7
        assert_eq!(c.apply(&[0.2, 0.4, 0.7]).unwrap(), 6);
        assert!(c.apply(&[0.2, 0.4]).is_err());
    }
}
