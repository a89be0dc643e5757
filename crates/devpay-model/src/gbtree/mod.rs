//! Histogram-based gradient-boosted regression trees.
//!
//! Training workflow:
//! 1. Quantize features into bins with [`BinCuts`] / [`QuantizedMatrix`]
//! 2. Accumulate gradient/hessian [`NodeHistogram`]s and pick splits by gain
//! 3. Grow each tree level by level with [`TreeGrower`]
//! 4. Repeat under [`GbtTrainer`], optionally early-stopping on an [`EvalSet`]
//!
//! The objective is squared error, so every row has gradient `pred - y` and
//! hessian 1. The fitted [`GbtRegressor`] keeps raw thresholds and predicts
//! directly on unbinned values.

mod histogram;
mod quantize;
mod split;
mod trainer;
mod tree;

pub use histogram::{GradStats, NodeHistogram};
pub use quantize::{BinCuts, QuantizedMatrix};
pub use split::{GainParams, SplitInfo, find_best_split, leaf_objective, leaf_weight, split_gain};
pub use trainer::{BoostError, EvalSet, GbtParams, GbtRegressor, GbtTrainer};
pub use tree::{Node, Tree, TreeGrower, TreeParams};
