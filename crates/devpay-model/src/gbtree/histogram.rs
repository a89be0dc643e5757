//! Gradient/hessian histograms per node.

use std::ops::Sub;

use super::quantize::{BinCuts, QuantizedMatrix};

/// Summed gradient and hessian.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradStats {
    pub grad: f64,
    pub hess: f64,
}

impl GradStats {
    pub fn add(&mut self, grad: f64, hess: f64) {
        self.grad += grad;
        self.hess += hess;
    }
}

impl std::ops::AddAssign for GradStats {
    fn add_assign(&mut self, other: Self) {
        self.grad += other.grad;
        self.hess += other.hess;
    }
}

impl Sub for GradStats {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

/// Per-feature bin statistics for one node, stored flat.
#[derive(Debug, Clone)]
pub struct NodeHistogram {
    bins: Vec<GradStats>,
    offsets: Vec<usize>,
    total: GradStats,
}

impl NodeHistogram {
    /// Accumulate `rows` of `quantized` into a fresh histogram.
    pub fn build(
        quantized: &QuantizedMatrix,
        cuts: &BinCuts,
        rows: &[usize],
        grad: &[f64],
        hess: &[f64],
    ) -> Self {
        let mut offsets = Vec::with_capacity(cuts.n_features() + 1);
        let mut width = 0;
        for j in 0..cuts.n_features() {
            offsets.push(width);
            width += cuts.n_bins(j);
        }
        offsets.push(width);

        let mut bins = vec![GradStats::default(); width];
        let mut total = GradStats::default();
        for &i in rows {
            let (g, h) = (grad[i], hess[i]);
            total.add(g, h);
            for (j, &b) in quantized.row(i).iter().enumerate() {
                bins[offsets[j] + b as usize].add(g, h);
            }
        }
        Self {
            bins,
            offsets,
            total,
        }
    }

    /// Sibling histogram from the parent: `parent - self`.
    pub fn sibling(&self, parent: &NodeHistogram) -> NodeHistogram {
        NodeHistogram {
            bins: parent
                .bins
                .iter()
                .zip(&self.bins)
                .map(|(p, c)| *p - *c)
                .collect(),
            offsets: self.offsets.clone(),
            total: parent.total - self.total,
        }
    }

    pub fn total(&self) -> GradStats {
        self.total
    }

    pub fn n_features(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn feature(&self, j: usize) -> &[GradStats] {
        &self.bins[self.offsets[j]..self.offsets[j + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpay_core::FeatureMatrix;

    fn setup() -> (QuantizedMatrix, BinCuts) {
        let m = FeatureMatrix::from_rows(
            vec!["a".into(), "b".into()],
            vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        );
        let cuts = BinCuts::fit(&m, 256);
        (QuantizedMatrix::new(&m, &cuts), cuts)
    }

    #[test]
    fn build_sums_per_bin() {
        let (q, cuts) = setup();
        let grad = [1.0, 2.0, 3.0, 4.0];
        let hess = [1.0; 4];
        let hist = NodeHistogram::build(&q, &cuts, &[0, 1, 2, 3], &grad, &hess);
        assert_eq!(hist.total(), GradStats { grad: 10.0, hess: 4.0 });
        assert_eq!(hist.feature(0)[0].grad, 4.0);
        assert_eq!(hist.feature(0)[1].grad, 6.0);
        assert_eq!(hist.feature(1)[1].grad, 3.0);
    }

    #[test]
    fn sibling_equals_direct_build() {
        let (q, cuts) = setup();
        let grad = [1.0, -2.0, 3.5, 4.0];
        let hess = [1.0; 4];
        let parent = NodeHistogram::build(&q, &cuts, &[0, 1, 2, 3], &grad, &hess);
        let left = NodeHistogram::build(&q, &cuts, &[0, 2], &grad, &hess);
        let right = NodeHistogram::build(&q, &cuts, &[1, 3], &grad, &hess);
        let derived = left.sibling(&parent);
        assert_eq!(derived.total(), right.total());
        for j in 0..derived.n_features() {
            assert_eq!(derived.feature(j), right.feature(j));
        }
    }
}
