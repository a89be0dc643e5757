//! Row splitting for cross-validation and hold-out evaluation.

use rand::prelude::*;

/// One train/test partition of row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold splitter over shuffled rows.
///
/// The first `n % k` folds get one extra test row; every row is in exactly
/// one test fold.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Partition `0..n_rows`. Returns no folds when there are fewer rows than splits.
    pub fn split(&self, n_rows: usize) -> Vec<Fold> {
        if self.n_splits < 2 || n_rows < self.n_splits {
            return Vec::new();
        }
        let order = shuffled(n_rows, self.seed);
        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            let end = start + size;
            let mut test = order[start..end].to_vec();
            let mut train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();
            test.sort_unstable();
            train.sort_unstable();
            folds.push(Fold { train, test });
            start = end;
        }
        folds
    }
}

/// Shuffled hold-out split; the test side gets `ceil(test_fraction * n_rows)` rows.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Fold {
    let n_test = ((test_fraction.clamp(0.0, 1.0) * n_rows as f64).ceil() as usize).min(n_rows);
    let order = shuffled(n_rows, seed);
    Fold {
        test: order[..n_test].to_vec(),
        train: order[n_test..].to_vec(),
    }
}

fn shuffled(n_rows: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut rng);
    order
}
