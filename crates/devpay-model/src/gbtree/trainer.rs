//! Boosting loop, early stopping, and the fitted regressor.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use devpay_core::FeatureMatrix;
use devpay_core::config::ModelParams;

use super::quantize::{BinCuts, QuantizedMatrix};
use super::split::GainParams;
use super::tree::{Tree, TreeGrower, TreeParams};
use crate::metrics::{r2_score, rmse};

#[derive(Debug, Clone, Error)]
pub enum BoostError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("number of targets ({targets}) does not match number of rows ({rows})")]
    TargetLenMismatch { rows: usize, targets: usize },

    #[error("expected {expected} features, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("target contains a non-finite value at row {row}")]
    NonFiniteTarget { row: usize },
}

/// Booster hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GbtParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    /// Histogram bins per feature, capped at 65535.
    pub max_bins: usize,
    /// Stop after this many rounds without eval improvement; 0 disables.
    pub early_stopping_rounds: usize,
}

impl Default for GbtParams {
    fn default() -> Self {
        Self::from(&ModelParams::default())
    }
}

impl From<&ModelParams> for GbtParams {
    fn from(p: &ModelParams) -> Self {
        Self {
            n_estimators: p.n_estimators,
            learning_rate: p.learning_rate,
            max_depth: p.max_depth,
            min_child_weight: p.min_child_weight,
            reg_lambda: p.reg_lambda,
            max_bins: p.max_bins,
            early_stopping_rounds: p.early_stopping_rounds,
        }
    }
}

/// Held-out rows monitored for early stopping.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub features: &'a FeatureMatrix,
    pub target: &'a [f64],
}

/// Squared-error gradient boosting trainer.
pub struct GbtTrainer {
    params: GbtParams,
}

impl GbtTrainer {
    pub fn new(params: GbtParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GbtParams {
        &self.params
    }

    /// Fit on `features`/`target`.
    ///
    /// With an eval set, RMSE on it is tracked every round; training stops
    /// once it has not improved for `early_stopping_rounds` rounds, and the
    /// ensemble is truncated to the best round.
    pub fn fit(
        &self,
        features: &FeatureMatrix,
        target: &[f64],
        eval: Option<EvalSet<'_>>,
    ) -> Result<GbtRegressor, BoostError> {
        check_shapes(features, target)?;
        if let Some(e) = eval {
            check_shapes(e.features, e.target)?;
            if e.features.n_cols() != features.n_cols() {
                return Err(BoostError::FeatureCountMismatch {
                    expected: features.n_cols(),
                    got: e.features.n_cols(),
                });
            }
        }

        let p = &self.params;
        let n_features = features.n_cols();
        let cuts = BinCuts::fit(features, p.max_bins.min(u16::MAX as usize));
        let quantized = QuantizedMatrix::new(features, &cuts);
        let grower = TreeGrower::new(
            &quantized,
            &cuts,
            TreeParams {
                max_depth: p.max_depth,
                gain: GainParams {
                    reg_lambda: p.reg_lambda,
                    min_child_weight: p.min_child_weight,
                },
                learning_rate: p.learning_rate,
            },
        );

        let base_score = target.iter().sum::<f64>() / target.len() as f64;
        let mut pred = vec![base_score; target.len()];
        let mut eval_pred = eval.map(|e| vec![base_score; e.target.len()]);
        let hess = vec![1.0; target.len()];
        let mut grad = vec![0.0; target.len()];

        let mut trees = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        for round in 0..p.n_estimators {
            for ((g, &yhat), &y) in grad.iter_mut().zip(&pred).zip(target) {
                *g = yhat - y;
            }
            let tree = grower.grow(&grad, &hess);
            for (i, yhat) in pred.iter_mut().enumerate() {
                *yhat += tree.predict_row(features.row(i));
            }

            if let (Some(e), Some(ep)) = (eval, eval_pred.as_mut()) {
                for (i, yhat) in ep.iter_mut().enumerate() {
                    *yhat += tree.predict_row(e.features.row(i));
                }
                let score = rmse(e.target, ep);
                if best.is_none_or(|(_, s)| score < s) {
                    best = Some((round, score));
                }
            }
            trees.push(tree);

            if let Some((best_round, _)) = best
                && p.early_stopping_rounds > 0
                && round - best_round >= p.early_stopping_rounds
            {
                debug!(round, best_round, "early stopping");
                break;
            }
        }

        if let Some((best_round, _)) = best {
            trees.truncate(best_round + 1);
        }

        Ok(GbtRegressor {
            base_score,
            n_features,
            trees,
            best_iteration: best.map(|(r, _)| r),
            best_score: best.map(|(_, s)| s),
        })
    }
}

fn check_shapes(features: &FeatureMatrix, target: &[f64]) -> Result<(), BoostError> {
    if features.n_rows() != target.len() {
        return Err(BoostError::TargetLenMismatch {
            rows: features.n_rows(),
            targets: target.len(),
        });
    }
    if target.is_empty() {
        return Err(BoostError::EmptyTrainingSet);
    }
    if let Some(row) = target.iter().position(|y| !y.is_finite()) {
        return Err(BoostError::NonFiniteTarget { row });
    }
    Ok(())
}

/// A fitted additive tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbtRegressor {
    base_score: f64,
    n_features: usize,
    trees: Vec<Tree>,
    /// Zero-based round with the best eval RMSE, when an eval set was given.
    best_iteration: Option<usize>,
    best_score: Option<f64>,
}

impl GbtRegressor {
    /// Predict one row laid out in training column order.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.n_features);
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, BoostError> {
        if features.n_cols() != self.n_features {
            return Err(BoostError::FeatureCountMismatch {
                expected: self.n_features,
                got: features.n_cols(),
            });
        }
        Ok(features.rows().map(|r| self.predict_row(r)).collect())
    }

    /// Coefficient of determination on `features`/`target`.
    pub fn score(&self, features: &FeatureMatrix, target: &[f64]) -> Result<f64, BoostError> {
        Ok(r2_score(target, &self.predict(features)?))
    }

    /// Total split gain per feature, normalised to sum to 1 (all zero for an
    /// ensemble without splits).
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gain(&mut importance);
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }
        importance
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }
}
