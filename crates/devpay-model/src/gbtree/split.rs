//! Split scoring for second-order boosting.

use super::histogram::{GradStats, NodeHistogram};

/// Regularisation that shapes leaf weights and split gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParams {
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum in each child of a split.
    pub min_child_weight: f64,
}

/// Optimal leaf weight: `-G / (H + lambda)`.
pub fn leaf_weight(stats: GradStats, params: &GainParams) -> f64 {
    let denom = stats.hess + params.reg_lambda;
    if denom <= 0.0 { 0.0 } else { -stats.grad / denom }
}

/// Structure score `G^2 / (H + lambda)` of a node.
pub fn leaf_objective(stats: GradStats, params: &GainParams) -> f64 {
    let denom = stats.hess + params.reg_lambda;
    if denom <= 0.0 { 0.0 } else { stats.grad * stats.grad / denom }
}

/// Loss reduction from splitting `parent` into `left` and `right`.
pub fn split_gain(left: GradStats, right: GradStats, parent: GradStats, params: &GainParams) -> f64 {
    0.5 * (leaf_objective(left, params) + leaf_objective(right, params)
        - leaf_objective(parent, params))
}

/// Best split found for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitInfo {
    pub feature: usize,
    /// Bins `0..=bin` go left.
    pub bin: usize,
    pub gain: f64,
    pub left: GradStats,
    pub right: GradStats,
}

/// Scan every feature's bins left to right and keep the best positive-gain
/// split whose children both satisfy `min_child_weight`.
///
/// Ties keep the earlier feature and bin, so the result is deterministic.
pub fn find_best_split(hist: &NodeHistogram, params: &GainParams) -> Option<SplitInfo> {
    let parent = hist.total();
    let mut best: Option<SplitInfo> = None;

    for feature in 0..hist.n_features() {
        let bins = hist.feature(feature);
        let mut left = GradStats::default();
        // The last bin can't be a left edge: nothing would go right.
        for (bin, stats) in bins.iter().enumerate().take(bins.len().saturating_sub(1)) {
            left += *stats;
            let right = parent - left;
            if left.hess < params.min_child_weight || right.hess < params.min_child_weight {
                continue;
            }
            let gain = split_gain(left, right, parent, params);
            if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitInfo {
                    feature,
                    bin,
                    gain,
                    left,
                    right,
                });
            }
        }
    }
    best
}
