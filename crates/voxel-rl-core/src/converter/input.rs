//! Observation discretisation

use super::{InputConverter, MixedRadix};
use crate::{ensure_dimension, RLError, Result};

/// How one observation channel is split into buckets
#[derive(Debug, Clone, PartialEq)]
pub enum Binning {
    /// `bins` equal-width buckets over `[low, high]`; values outside are clamped
    Uniform {
        /// Lower edge of the domain
        low: f64,
        /// Upper edge of the domain
        high: f64,
        /// Number of buckets
        bins: usize,
    },
    /// Buckets delimited by ascending split points; `n` points give `n + 1` buckets
    SplitPoints(Vec<f64>),
    /// Two buckets: `0` at or above the threshold, `1` below it
    Threshold(f64),
}

impl Binning {
    fn bins(&self) -> usize {
        match self {
            Self::Uniform { bins, .. } => *bins,
            Self::SplitPoints(points) => points.len() + 1,
            Self::Threshold(_) => 2,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn bucket(&self, x: f64) -> usize {
        match self {
            Self::Uniform { low, high, bins } => {
                let clamped = x.clamp(*low, *high);
                let scaled = (clamped - low) / (high - low) * *bins as f64;
                // NaN casts to 0
                (scaled.floor() as usize).min(bins - 1)
            }
            Self::SplitPoints(points) => points.iter().take_while(|&&p| x >= p).count(),
            Self::Threshold(t) => usize::from(x < *t),
        }
    }

    fn validate(&self, channel: usize) -> Result<()> {
        match self {
            Self::Uniform { low, high, bins } => {
                if *bins == 0 || !low.is_finite() || !high.is_finite() || !(high > low) {
                    return Err(RLError::InvalidConfig(format!(
                        "channel {channel}: uniform binning needs bins > 0 and finite low < high"
                    )));
                }
            }
            Self::SplitPoints(points) => {
                if points.iter().any(|p| !p.is_finite())
                    || points.windows(2).any(|w| !(w[0] < w[1]))
                {
                    return Err(RLError::InvalidConfig(format!(
                        "channel {channel}: split points must be finite and strictly ascending"
                    )));
                }
            }
            Self::Threshold(t) => {
                if !t.is_finite() {
                    return Err(RLError::InvalidConfig(format!(
                        "channel {channel}: threshold must be finite"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Buckets each channel and packs the bucket indices in mixed radix
#[derive(Debug, Clone)]
pub struct DiscretizingInput {
    channels: Vec<Binning>,
    radix: MixedRadix,
}

impl DiscretizingInput {
    /// Build from explicit per-channel binnings
    pub fn new(channels: Vec<Binning>) -> Result<Self> {
        for (i, binning) in channels.iter().enumerate() {
            binning.validate(i)?;
        }
        let radix = MixedRadix::new(channels.iter().map(Binning::bins).collect())?;
        Ok(Self { channels, radix })
    }

    /// Equal-width buckets over per-channel `[low, high]` domains
    pub fn uniform(low: &[f64], high: &[f64], bins: &[usize]) -> Result<Self> {
        ensure_dimension("uniform binning upper bounds", low.len(), high.len())?;
        ensure_dimension("uniform binning bucket counts", low.len(), bins.len())?;
        Self::new(
            low.iter()
                .zip(high)
                .zip(bins)
                .map(|((&low, &high), &bins)| Binning::Uniform { low, high, bins })
                .collect(),
        )
    }

    /// Equal-width buckets over `[0, 1]` for every channel
    pub fn unit(bins: &[usize]) -> Result<Self> {
        let low = vec![0.0; bins.len()];
        let high = vec![1.0; bins.len()];
        Self::uniform(&low, &high, bins)
    }

    /// Buckets delimited by explicit split points per channel
    pub fn split_points(points: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(points.into_iter().map(Binning::SplitPoints).collect())
    }

    /// One bit per channel, set when the value is below its threshold
    pub fn binary(thresholds: &[f64]) -> Result<Self> {
        Self::new(thresholds.iter().map(|&t| Binning::Threshold(t)).collect())
    }

    /// Per-channel bucket indices, before packing
    pub fn buckets(&self, input: &[f64]) -> Result<Vec<usize>> {
        ensure_dimension("input converter", self.channels.len(), input.len())?;
        Ok(self
            .channels
            .iter()
            .zip(input)
            .map(|(binning, &x)| binning.bucket(x))
            .collect())
    }

    /// Per-channel binnings
    #[must_use]
    pub fn channels(&self) -> &[Binning] {
        &self.channels
    }
}

impl InputConverter for DiscretizingInput {
    fn input_dim(&self) -> usize {
        self.channels.len()
    }

    fn output_dim(&self) -> usize {
        self.radix.cardinality()
    }

    fn apply(&self, input: &[f64]) -> Result<usize> {
        let buckets = self.buckets(input)?;
        self.radix.encode(&buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_clamps_out_of_domain() {
        let c = DiscretizingInput::unit(&[4]).unwrap();
        assert_eq!(c.apply(&[-3.0]).unwrap(), 0);
        assert_eq!(c.apply(&[1.0]).unwrap(), 3);
        assert_eq!(c.apply(&[7.5]).unwrap(), 3);
        assert_eq!(c.apply(&[0.26]).unwrap(), 1);
    }

    #[test]
    fn test_split_points() {
        let c = DiscretizingInput::split_points(vec![vec![-1.0, 0.0, 2.0], vec![0.5]]).unwrap();
        assert_eq!(c.output_dim(), 8);
        assert_eq!(c.buckets(&[-5.0, 0.0]).unwrap(), vec![0, 0]);
        assert_eq!(c.buckets(&[0.0, 0.5]).unwrap(), vec![2, 1]);
        assert_eq!(c.apply(&[3.0, 1.0]).unwrap(), 7);
    }

    #[test]
    fn test_unsorted_split_points_rejected() {
        assert!(DiscretizingInput::split_points(vec![vec![1.0, 0.0]]).is_err());
    }

    #[test]
    fn test_binary_threshold() {
        let c = DiscretizingInput::binary(&[0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(c.output_dim(), 16);
        assert_eq!(c.apply(&[0.5, -0.5, 0.5, -0.5]).unwrap(), 5);
    }

    #[test]
    fn test_wrong_length_fails_fast() {
        let c = DiscretizingInput::unit(&[4, 4]).unwrap();
        let err = c.apply(&[0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(
            err,
            RLError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_degenerate_domain_rejected() {
        assert!(DiscretizingInput::uniform(&[1.0], &[1.0], &[3]).is_err());
        assert!(DiscretizingInput::uniform(&[0.0], &[1.0], &[0]).is_err());
    }

    #[test]
    fn test_unbounded_domain_rejected() {
        let inf = f64::INFINITY;
        assert!(DiscretizingInput::uniform(&[-inf], &[inf], &[4]).is_err());
        assert!(DiscretizingInput::uniform(&[0.0], &[inf], &[4]).is_err());
        assert!(DiscretizingInput::uniform(&[f64::NAN], &[1.0], &[4]).is_err());
        assert!(DiscretizingInput::split_points(vec![vec![0.0, f64::NAN]]).is_err());
        assert!(DiscretizingInput::binary(&[f64::NAN]).is_err());
    }
}
