//! Feature analysis of a training run, for comparing against inference.

use serde::Serialize;

use devpay_core::cardinality::frequencies;
use devpay_core::field::NUMERIC_COLUMNS;
use devpay_core::{CategoricalField, FeatureMatrix};

use crate::gbtree::GbtRegressor;
use crate::metrics::{mean, quantile_sorted};
use crate::trainer::{StageCounts, TrainingData};

const TOP_CATEGORIES: usize = 10;
const TOP_IMPORTANCES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub field: CategoricalField,
    /// Most common values with their row counts, most common first.
    pub top: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: &'static str,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
}

impl NumericSummary {
    fn of(column: &'static str, values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            column,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            max: sorted.last().copied().unwrap_or(f64::NAN),
            mean: mean(&sorted),
            median: quantile_sorted(&sorted, 0.5),
            p25: quantile_sorted(&sorted, 0.25),
            p75: quantile_sorted(&sorted, 0.75),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub stages: StageCounts,
    pub n_rows: usize,
    pub n_features: usize,
    pub categories: Vec<CategoryCounts>,
    pub numeric: Vec<NumericSummary>,
    /// Indicator columns per field in the encoded matrix.
    pub one_hot_columns: Vec<(CategoricalField, usize)>,
    /// Highest-gain features, normalised importance.
    pub top_importances: Vec<(String, f64)>,
    pub n_trees: usize,
    pub holdout_r2: f64,
}

impl TrainingReport {
    pub fn build(data: &TrainingData, model: &GbtRegressor, holdout_r2: f64) -> Self {
        let categories = CategoricalField::ALL
            .into_iter()
            .map(|field| {
                let column: Vec<Option<String>> = data
                    .records()
                    .map(|r| r.categorical(field).map(str::to_string))
                    .collect();
                CategoryCounts {
                    field,
                    top: frequencies(&column).into_iter().take(TOP_CATEGORIES).collect(),
                }
            })
            .collect();

        let numeric = NUMERIC_COLUMNS
            .into_iter()
            .filter_map(|name| {
                let j = data.features.column_index(name)?;
                Some(NumericSummary::of(name, &data.features.column_values(j)))
            })
            .collect();

        Self {
            stages: data.stages,
            n_rows: data.features.n_rows(),
            n_features: data.features.n_cols(),
            categories,
            numeric,
            one_hot_columns: one_hot_counts(&data.features),
            top_importances: top_importances(data.features.columns(), model, TOP_IMPORTANCES),
            n_trees: model.n_trees(),
            holdout_r2,
        }
    }
}

/// Count indicator columns per field by their `<Field>_` prefix.
pub fn one_hot_counts(features: &FeatureMatrix) -> Vec<(CategoricalField, usize)> {
    CategoricalField::ALL
        .into_iter()
        .map(|field| {
            let prefix = field.column_prefix();
            let n = features
                .columns()
                .iter()
                .filter(|c| c.starts_with(&prefix))
                .count();
            (field, n)
        })
        .collect()
}

/// The `n` most important features, ties broken by column order.
pub fn top_importances(columns: &[String], model: &GbtRegressor, n: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = columns
        .iter()
        .cloned()
        .zip(model.feature_importances())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(n);
    ranked
}
