//! Numeric helpers shared by the agents

use ndarray::{Array2, ArrayView1, ArrayViewMut1};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::GaussianInit;

/// Index of the largest value, lowest index on ties.
///
/// The scan keeps the first strictly greater value, so `[1, 3, 3]`
/// yields `1`. NaN entries never win. Empty input yields `0`.
pub fn argmax<'a, I>(values: I) -> usize
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut best_index = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, &v) in values.into_iter().enumerate() {
        if v > best {
            best = v;
            best_index = i;
        }
    }
    best_index
}

/// Largest value of a non-empty row
#[must_use]
pub fn max_value(values: ArrayView1<'_, f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
}

/// Euclidean norm
#[must_use]
pub fn l2_norm(values: ArrayView1<'_, f64>) -> f64 {
    values.dot(&values).sqrt()
}

/// Scale `values` to unit norm; zero vectors are left untouched
pub fn normalize_in_place(mut values: ArrayViewMut1<'_, f64>) {
    let norm = l2_norm(values.view());
    if norm > 0.0 {
        values.mapv_inplace(|v| v / norm);
    }
}

fn normal(init: GaussianInit) -> Option<Normal<f64>> {
    if init.std > 0.0 {
        Normal::new(init.mean, init.std).ok()
    } else {
        None
    }
}

/// Matrix of independent draws from `init`
pub fn gaussian_matrix<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    init: GaussianInit,
    rng: &mut R,
) -> Array2<f64> {
    match normal(init) {
        Some(dist) => Array2::from_shape_simple_fn((rows, cols), || dist.sample(&mut *rng)),
        None => Array2::from_elem((rows, cols), init.mean),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[2.0, 2.0, 2.0]), 0);
        assert_eq!(argmax(&[-5.0, -1.0, -3.0]), 1);
    }

    #[test]
    fn test_argmax_on_ndarray_row() {
        let row = arr1(&[0.1, 0.7, 0.7, 0.2]);
        assert_eq!(argmax(row.iter()), 1);
    }

    #[test]
    fn test_normalize_in_place() {
        let mut v = arr1(&[3.0, 4.0]);
        normalize_in_place(v.view_mut());
        assert_relative_eq!(v[0], 0.6);
        assert_relative_eq!(v[1], 0.8);

        let mut zero = arr1(&[0.0, 0.0]);
        normalize_in_place(zero.view_mut());
        assert_relative_eq!(zero[0], 0.0);
    }

    #[test]
    fn test_zero_std_gives_constant_matrix() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = gaussian_matrix(2, 3, GaussianInit { mean: 0.5, std: 0.0 }, &mut rng);
        assert!(m.iter().all(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_gaussian_matrix_is_seeded() {
        let init = GaussianInit { mean: 0.0, std: 1.0 };
        let a = gaussian_matrix(3, 3, init, &mut StdRng::seed_from_u64(9));
        let b = gaussian_matrix(3, 3, init, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
