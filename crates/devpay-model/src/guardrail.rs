//! Per-category model quality from out-of-fold predictions.
//!
//! Every training row is predicted by the fold model that never saw it. The
//! predictions are then grouped by each categorical field's value, and a
//! category is flagged when its R² is too low or its mean prediction drifts
//! too far from its mean actual salary.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use devpay_core::config::GuardrailConfig;
use devpay_core::encoder::prepare;
use devpay_core::{CategoricalField, ModelConfig, SurveyRow};

use crate::metrics::{mean, r2_score};
use crate::trainer::{cross_validate, prepare_training_data};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMetrics {
    pub category: String,
    pub count: usize,
    /// `None` for categories with fewer than two rows.
    pub r2: Option<f64>,
    pub mean_actual: f64,
    pub mean_predicted: f64,
    pub abs_pct_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetrics {
    pub field: CategoricalField,
    /// Sorted by category.
    pub categories: Vec<CategoryMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ViolationKind {
    LowR2 { r2: f64, threshold: f64 },
    MeanDrift { abs_pct_diff: f64, threshold: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: CategoricalField,
    pub category: String,
    pub kind: ViolationKind,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::LowR2 { r2, threshold } => write!(
                f,
                "{} \"{}\": R2 = {r2:.2} (threshold: {threshold})",
                self.field, self.category
            ),
            ViolationKind::MeanDrift {
                abs_pct_diff,
                threshold,
            } => write!(
                f,
                "{} \"{}\": Abs % Diff = {abs_pct_diff:.1}% (threshold: {threshold}%)",
                self.field, self.category
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailReport {
    pub n_rows: usize,
    pub n_features: usize,
    pub overall_r2: f64,
    pub fields: Vec<FieldMetrics>,
    pub violations: Vec<Violation>,
}

impl GuardrailReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Run the training preprocessing and cross-validation, then score each category.
pub fn evaluate(rows: Vec<SurveyRow>, config: &ModelConfig) -> Result<GuardrailReport> {
    config.validate()?;
    let data = prepare_training_data(rows, config)?;
    let cv = cross_validate(&data.features, &data.target, config)?;
    let overall_r2 = r2_score(&data.target, &cv.oof_predictions);
    info!(overall_r2, "out-of-fold predictions ready");

    let other = config.features.cardinality.other_category.as_str();
    let prepared: Vec<_> = data.records().map(|r| prepare(r, other)).collect();

    let fields: Vec<FieldMetrics> = CategoricalField::ALL
        .into_iter()
        .map(|field| {
            let labels: Vec<&str> = prepared.iter().map(|p| p.category(field)).collect();
            FieldMetrics {
                field,
                categories: category_metrics(&labels, &data.target, &cv.oof_predictions),
            }
        })
        .collect();
    let violations = find_violations(&fields, &config.guardrails);

    Ok(GuardrailReport {
        n_rows: data.features.n_rows(),
        n_features: data.features.n_cols(),
        overall_r2,
        fields,
        violations,
    })
}

/// Metrics per distinct label, sorted by label.
pub fn category_metrics(labels: &[&str], actual: &[f64], predicted: &[f64]) -> Vec<CategoryMetrics> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for ((&label, &y), &p) in labels.iter().zip(actual).zip(predicted) {
        let (ys, ps) = groups.entry(label).or_default();
        ys.push(y);
        ps.push(p);
    }

    groups
        .into_iter()
        .map(|(label, (ys, ps))| {
            let mean_actual = mean(&ys);
            let mean_predicted = mean(&ps);
            CategoryMetrics {
                category: label.to_string(),
                count: ys.len(),
                r2: (ys.len() >= 2).then(|| r2_score(&ys, &ps)),
                mean_actual,
                mean_predicted,
                abs_pct_diff: (mean_predicted - mean_actual).abs() / mean_actual * 100.0,
            }
        })
        .collect()
}

pub fn find_violations(fields: &[FieldMetrics], thresholds: &GuardrailConfig) -> Vec<Violation> {
    let mut violations = Vec::new();
    for fm in fields {
        for c in &fm.categories {
            if let Some(r2) = c.r2
                && r2 < thresholds.min_r2_per_category
            {
                violations.push(Violation {
                    field: fm.field,
                    category: c.category.clone(),
                    kind: ViolationKind::LowR2 {
                        r2,
                        threshold: thresholds.min_r2_per_category,
                    },
                });
            }
            if c.abs_pct_diff > thresholds.max_abs_pct_diff {
                violations.push(Violation {
                    field: fm.field,
                    category: c.category.clone(),
                    kind: ViolationKind::MeanDrift {
                        abs_pct_diff: c.abs_pct_diff,
                        threshold: thresholds.max_abs_pct_diff,
                    },
                });
            }
        }
    }
    violations
}
