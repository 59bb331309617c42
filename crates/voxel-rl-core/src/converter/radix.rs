//! Mixed-radix packing of per-dimension digits

use crate::{RLError, Result};

/// Place-value system whose radix differs per position
///
/// The first position is the most significant:
/// `index = Σ_i digit[i] * Π_{j>i} sizes[j]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedRadix {
    sizes: Vec<usize>,
    cardinality: usize,
}

impl MixedRadix {
    /// Create a radix system; every size must be positive
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        if sizes.is_empty() {
            return Err(RLError::InvalidConfig(
                "mixed radix needs at least one position".to_string(),
            ));
        }
        let mut cardinality: usize = 1;
        for (i, &size) in sizes.iter().enumerate() {
            if size == 0 {
                return Err(RLError::InvalidConfig(format!(
                    "radix at position {i} must be positive"
                )));
            }
            cardinality = cardinality.checked_mul(size).ok_or_else(|| {
                RLError::InvalidConfig("mixed radix cardinality overflows usize".to_string())
            })?;
        }
        Ok(Self { sizes, cardinality })
    }

    /// Radix of each position
    #[must_use]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of positions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Always false; a radix system has at least one position
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Number of representable indices, `Π sizes`
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Pack digits into an index
    pub fn encode(&self, digits: &[usize]) -> Result<usize> {
        crate::ensure_dimension("mixed radix digits", self.sizes.len(), digits.len())?;
        let mut index = 0;
        for (&digit, &size) in digits.iter().zip(&self.sizes) {
            if digit >= size {
                return Err(RLError::IndexOutOfRange {
                    context: "mixed radix digit",
                    index: digit,
                    limit: size,
                });
            }
            index = index * size + digit;
        }
        Ok(index)
    }

    /// Unpack an index into digits
    pub fn decode(&self, index: usize) -> Result<Vec<usize>> {
        if index >= self.cardinality {
            return Err(RLError::IndexOutOfRange {
                context: "mixed radix index",
                index,
                limit: self.cardinality,
            });
        }
        let mut digits = vec![0; self.sizes.len()];
        let mut rest = index;
        for (digit, &size) in digits.iter_mut().zip(&self.sizes).rev() {
            *digit = rest % size;
            rest /= size;
        }
        Ok(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_first_position_most_significant() {
        let radix = MixedRadix::new(vec![4, 4]).unwrap();
        assert_eq!(radix.encode(&[1, 2]).unwrap(), 6);
        assert_eq!(radix.decode(6).unwrap(), vec![1, 2]);

        let radix = MixedRadix::new(vec![2, 3, 5]).unwrap();
        assert_eq!(radix.encode(&[1, 2, 4]).unwrap(), 29);
        assert_eq!(radix.cardinality(), 30);
    }

    #[test]
    fn test_out_of_range() {
        let radix = MixedRadix::new(vec![2, 2]).unwrap();
        assert!(radix.decode(4).is_err());
        assert!(radix.encode(&[0, 2]).is_err());
        assert!(radix.encode(&[0]).is_err());
    }

    #[test]
    fn test_zero_radix_rejected() {
        assert!(MixedRadix::new(vec![3, 0]).is_err());
        assert!(MixedRadix::new(vec![]).is_err());
    }

    proptest! {
        #[test]
        fn prop_every_index_round_trips(sizes in prop::collection::vec(1usize..6, 1..5)) {
            let radix = MixedRadix::new(sizes.clone()).unwrap();
            for index in 0..radix.cardinality() {
                let digits = radix.decode(index).unwrap();
                prop_assert!(digits.iter().zip(&sizes).all(|(d, s)| d < s));
                prop_assert_eq!(radix.encode(&digits).unwrap(), index);
            }
        }
    }
}
