//! Action expansion

use super::{MixedRadix, OutputConverter};
use crate::{ensure_dimension, RLError, Result};

/// Decodes an index in mixed radix and emits the centre of each channel's bucket
#[derive(Debug, Clone)]
pub struct GridOutput {
    low: Vec<f64>,
    high: Vec<f64>,
    radix: MixedRadix,
}

impl GridOutput {
    /// Equal-width buckets over per-channel `[low, high]` ranges
    pub fn new(low: Vec<f64>, high: Vec<f64>, levels: Vec<usize>) -> Result<Self> {
        ensure_dimension("grid output upper bounds", low.len(), high.len())?;
        ensure_dimension("grid output level counts", low.len(), levels.len())?;
        if low
            .iter()
            .zip(&high)
            .any(|(l, h)| !l.is_finite() || !h.is_finite() || !(h > l))
        {
            return Err(RLError::InvalidConfig(
                "grid output needs finite low < high on every channel".to_string(),
            ));
        }
        let radix = MixedRadix::new(levels)?;
        Ok(Self { low, high, radix })
    }
}

impl OutputConverter for GridOutput {
    fn input_dim(&self) -> usize {
        self.radix.cardinality()
    }

    fn output_dim(&self) -> usize {
        self.low.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(&self, index: usize) -> Result<Vec<f64>> {
        let digits = self.radix.decode(index)?;
        Ok(digits
            .iter()
            .zip(self.radix.sizes())
            .zip(self.low.iter().zip(&self.high))
            .map(|((&d, &n), (&low, &high))| low + (d as f64 + 0.5) * (high - low) / n as f64)
            .collect())
    }
}

/// Zero-padded base-2 expansion: bit `0` drives `+force`, bit `1` drives `-force`
///
/// The most significant bit goes to channel 0, so with four channels
/// index 5 (`0101`) becomes `[+f, -f, +f, -f]`.
#[derive(Debug, Clone)]
pub struct BinaryOutput {
    force: f64,
    radix: MixedRadix,
}

impl BinaryOutput {
    /// One bit per channel
    pub fn new(channels: usize, force: f64) -> Result<Self> {
        let radix = MixedRadix::new(vec![2; channels])?;
        Ok(Self { force, radix })
    }
}

impl OutputConverter for BinaryOutput {
    fn input_dim(&self) -> usize {
        self.radix.cardinality()
    }

    fn output_dim(&self) -> usize {
        self.radix.len()
    }

    fn apply(&self, index: usize) -> Result<Vec<f64>> {
        let bits = self.radix.decode(index)?;
        Ok(bits
            .into_iter()
            .map(|bit| if bit == 0 { self.force } else { -self.force })
            .collect())
    }
}

/// Zero-padded base-N expansion with digits spread evenly over `[-max, +max]`
#[derive(Debug, Clone)]
pub struct LeveledOutput {
    max_value: f64,
    partitions: usize,
    radix: MixedRadix,
}

impl LeveledOutput {
    /// `partitions` levels per channel; a single level always emits zero
    pub fn new(channels: usize, partitions: usize, max_value: f64) -> Result<Self> {
        let radix = MixedRadix::new(vec![partitions; channels])?;
        Ok(Self {
            max_value,
            partitions,
            radix,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn level(&self, digit: usize) -> f64 {
        if self.partitions == 1 {
            return 0.0;
        }
        -self.max_value + 2.0 * self.max_value * digit as f64 / (self.partitions - 1) as f64
    }
}

impl OutputConverter for LeveledOutput {
    fn input_dim(&self) -> usize {
        self.radix.cardinality()
    }

    fn output_dim(&self) -> usize {
        self.radix.len()
    }

    fn apply(&self, index: usize) -> Result<Vec<f64>> {
        let digits = self.radix.decode(index)?;
        Ok(digits.into_iter().map(|d| self.level(d)).collect())
    }
}
