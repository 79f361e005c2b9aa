//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::error::ModelError;

/// Row indices of the two partitions, each in shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    /// Rows used for fitting.
    pub train: Vec<usize>,
    /// Rows held out for evaluation.
    pub test: Vec<usize>,
}

/// Shuffle `0..n_samples` with a seeded ChaCha8 stream and hold out
/// `ceil(n_samples * test_fraction)` rows.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::InvalidTestFraction`] | `test_fraction` not in `(0, 1)` |
/// | [`ModelError::EmptyPartition`] | either partition would be empty |
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<HoldoutSplit, ModelError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ModelError::InvalidTestFraction {
            value: test_fraction,
        });
    }
    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(ModelError::EmptyPartition { n_samples, n_test });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok(HoldoutSplit {
        train,
        test: indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_test_up() {
        let split = train_test_split(90, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 18);
        assert_eq!(split.train.len(), 72);

        let split = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn partitions_cover_all_rows_once() {
        let split = train_test_split(50, 0.3, 7).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_split() {
        assert_eq!(
            train_test_split(40, 0.2, 42).unwrap(),
            train_test_split(40, 0.2, 42).unwrap()
        );
        assert_ne!(
            train_test_split(40, 0.2, 42).unwrap(),
            train_test_split(40, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn rejects_bad_fraction_and_tiny_tables() {
        for bad in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(matches!(
                train_test_split(10, bad, 0),
                Err(ModelError::InvalidTestFraction { .. })
            ));
        }
        assert!(matches!(
            train_test_split(1, 0.2, 0),
            Err(ModelError::EmptyPartition { n_samples: 1, n_test: 1 })
        ));
        assert!(matches!(
            train_test_split(0, 0.2, 0),
            Err(ModelError::EmptyPartition { n_samples: 0, n_test: 0 })
        ));
    }
}
