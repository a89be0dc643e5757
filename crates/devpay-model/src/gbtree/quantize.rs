//! Feature quantization: raw values to histogram bin indices.

use devpay_core::FeatureMatrix;

/// Bin boundaries for every feature.
///
/// For a feature with cuts `c_0 < c_1 < ... < c_{k-1}`, a value `v` lands in
/// bin `b` = number of cuts strictly below `v`, so bin `b` holds values in
/// `(c_{b-1}, c_b]`. Sending bins `0..=b` left is therefore the same as the
/// raw test `v <= c_b`, which is what the finished tree stores.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cuts: Vec<Vec<f64>>,
}

impl BinCuts {
    /// Derive cuts from the training matrix with at most `max_bins` bins per feature.
    ///
    /// Features with few distinct values get one bin per value, split at the
    /// midpoints. Others are cut at evenly spaced quantiles.
    pub fn fit(matrix: &FeatureMatrix, max_bins: usize) -> Self {
        let max_bins = max_bins.max(2);
        let cuts = (0..matrix.n_cols())
            .map(|j| {
                let mut values = matrix.column_values(j);
                values.sort_by(f64::total_cmp);
                feature_cuts(&values, max_bins)
            })
            .collect();
        Self { cuts }
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Upper edge of `bin`, used as the split threshold.
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cuts[feature][bin]
    }

    pub fn bin(&self, feature: usize, value: f64) -> usize {
        self.cuts[feature].partition_point(|&c| c < value)
    }
}

fn feature_cuts(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut distinct = sorted.to_vec();
    distinct.dedup();
    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..max_bins).map(|i| sorted[i * n / max_bins]).collect();
    cuts.dedup();
    // The top cut must leave something on its right.
    if let (Some(&last), Some(&max)) = (cuts.last(), sorted.last())
        && last >= max
    {
        cuts.pop();
    }
    cuts
}

/// Training matrix with every value replaced by its bin index (row-major).
#[derive(Debug, Clone)]
pub struct QuantizedMatrix {
    bins: Vec<u16>,
    n_rows: usize,
    n_features: usize,
}

impl QuantizedMatrix {
    pub fn new(matrix: &FeatureMatrix, cuts: &BinCuts) -> Self {
        let n_features = matrix.n_cols();
        let mut bins = Vec::with_capacity(matrix.n_rows() * n_features);
        for row in matrix.rows() {
            // max_bins is far below u16::MAX, see `GbtParams::max_bins`.
            bins.extend(row.iter().enumerate().map(|(j, &v)| cuts.bin(j, v) as u16));
        }
        Self {
            bins,
            n_rows: matrix.n_rows(),
            n_features,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, i: usize) -> &[u16] {
        &self.bins[i * self.n_features..(i + 1) * self.n_features]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(column: &[f64]) -> FeatureMatrix {
        FeatureMatrix::from_rows(vec!["x".into()], column.to_vec())
    }

    #[test]
    fn indicator_gets_single_midpoint_cut() {
        let cuts = BinCuts::fit(&matrix(&[0.0, 1.0, 1.0, 0.0]), 256);
        assert_eq!(cuts.n_bins(0), 2);
        assert_eq!(cuts.threshold(0, 0), 0.5);
        assert_eq!(cuts.bin(0, 0.0), 0);
        assert_eq!(cuts.bin(0, 1.0), 1);
    }

    #[test]
    fn constant_feature_has_one_bin() {
        let cuts = BinCuts::fit(&matrix(&[3.0, 3.0, 3.0]), 256);
        assert_eq!(cuts.n_bins(0), 1);
        assert_eq!(cuts.bin(0, 100.0), 0);
    }

    #[test]
    fn bin_matches_threshold_test() {
        let values: Vec<f64> = (0..1000).map(|i| (i % 97) as f64 * 0.5).collect();
        let cuts = BinCuts::fit(&matrix(&values), 16);
        assert!(cuts.n_bins(0) <= 16);
        for &v in &values {
            let b = cuts.bin(0, v);
            for edge in 0..cuts.n_bins(0) - 1 {
                assert_eq!(b <= edge, v <= cuts.threshold(0, edge));
            }
        }
    }

    #[test]
    fn many_distinct_values_are_capped() {
        let values: Vec<f64> = (0..10_000).map(f64::from).collect();
        let cuts = BinCuts::fit(&matrix(&values), 256);
        assert!(cuts.n_bins(0) <= 256);
        assert!(cuts.n_bins(0) > 200);
    }

    #[test]
    fn quantized_rows_follow_cuts() {
        let m = FeatureMatrix::from_rows(vec!["a".into(), "b".into()], vec![0.0, 5.0, 1.0, 7.0]);
        let cuts = BinCuts::fit(&m, 256);
        let q = QuantizedMatrix::new(&m, &cuts);
        assert_eq!(q.n_rows(), 2);
        assert_eq!(q.row(0), [0, 0]);
        assert_eq!(q.row(1), [1, 1]);
    }
}
