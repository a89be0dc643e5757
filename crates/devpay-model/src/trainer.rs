//! Offline training: survey rows in, model artifact and companions out.
//!
//! Stages, in order:
//! 1. Normalise the categorical cells
//! 2. Drop rows whose compensation is missing or at most `data.min_salary`
//! 3. Trim each country's compensation to its percentile band
//! 4. Collapse long-tail categories into `Other`
//! 5. Drop `Other` rows for the fields in `drop_other_from`
//! 6. Observe the vocabulary and encode in training mode
//! 7. K-fold cross-validation, folds in parallel
//! 8. Fit the final model on a 90/10 split, early-stopping on the 10%
//! 9. Derive the currency table

use std::collections::HashMap;

use anyhow::{Context, Result, ensure};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use devpay_core::cardinality::drop_other_rows;
use devpay_core::{
    CardinalityReducer, CategoricalField, CurrencyTable, FeatureEncoder, FeatureMatrix,
    FeatureSchema, ModelConfig, RawRecord, SurveyRow, Vocabulary, normalize_category,
};

use crate::artifact::ModelArtifact;
use crate::cv::{KFold, train_test_split};
use crate::gbtree::{BoostError, EvalSet, GbtParams, GbtRegressor, GbtTrainer};
use crate::metrics::{mean, quantile_sorted, r2_score, std_dev};
use crate::report::TrainingReport;

/// Fraction of rows held out for early stopping of the final model.
const HOLDOUT_FRACTION: f64 = 0.1;

/// Row counts after each filtering stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub loaded: usize,
    pub above_min_salary: usize,
    pub within_percentiles: usize,
    pub after_drop_other: usize,
}

/// The encoded training set and what produced it.
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Filtered rows with reduced categories, aligned with `features`.
    pub rows: Vec<SurveyRow>,
    pub vocabulary: Vocabulary,
    pub features: FeatureMatrix,
    pub target: Vec<f64>,
    pub stages: StageCounts,
}

impl TrainingData {
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.rows.iter().map(|r| &r.profile)
    }
}

/// Scores of one cross-validation fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    /// One-based.
    pub fold: usize,
    pub train_r2: f64,
    pub test_r2: f64,
    /// Number of trees kept after early stopping.
    pub best_iteration: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub folds: Vec<FoldScore>,
    pub mean_train_r2: f64,
    pub mean_test_r2: f64,
    pub std_test_r2: f64,
    pub mean_best_iteration: usize,
}

impl CvSummary {
    pub fn from_folds(folds: Vec<FoldScore>) -> Self {
        let train: Vec<f64> = folds.iter().map(|f| f.train_r2).collect();
        let test: Vec<f64> = folds.iter().map(|f| f.test_r2).collect();
        let iters: Vec<f64> = folds.iter().map(|f| f.best_iteration as f64).collect();
        Self {
            mean_train_r2: mean(&train),
            mean_test_r2: mean(&test),
            std_test_r2: std_dev(&test),
            mean_best_iteration: mean(&iters) as usize,
            folds,
        }
    }
}

/// Cross-validation scores plus one out-of-fold prediction per row.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub summary: CvSummary,
    pub oof_predictions: Vec<f64>,
}

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub vocabulary: Vocabulary,
    pub currency: CurrencyTable,
    pub report: TrainingReport,
}

/// Run the whole pipeline on raw survey rows.
pub fn train(rows: Vec<SurveyRow>, config: &ModelConfig) -> Result<TrainingOutcome> {
    config.validate()?;
    let data = prepare_training_data(rows, config)?;
    info!(
        rows = data.features.n_rows(),
        features = data.features.n_cols(),
        "encoded training set"
    );

    let cv = cross_validate(&data.features, &data.target, config)?;
    info!(
        mean_train_r2 = cv.summary.mean_train_r2,
        mean_test_r2 = cv.summary.mean_test_r2,
        std_test_r2 = cv.summary.std_test_r2,
        "cross-validation finished"
    );

    let (regressor, holdout_r2) = fit_final(&data.features, &data.target, config)?;
    info!(
        trees = regressor.n_trees(),
        holdout_r2, "final model trained"
    );

    let currency = CurrencyTable::from_survey(
        &data.rows,
        data.vocabulary.values(CategoricalField::Country),
    );
    info!(countries = currency.len(), "derived currency table");

    let report = TrainingReport::build(&data, &regressor, holdout_r2);
    let artifact = ModelArtifact {
        regressor,
        feature_columns: FeatureSchema::of(&data.features),
        trained_at: Utc::now().to_rfc3339(),
        cv: cv.summary,
    };

    Ok(TrainingOutcome {
        artifact,
        vocabulary: data.vocabulary,
        currency,
        report,
    })
}

/// Stages 1 to 6: filter, reduce, observe and encode.
pub fn prepare_training_data(mut rows: Vec<SurveyRow>, config: &ModelConfig) -> Result<TrainingData> {
    let cardinality = &config.features.cardinality;
    let other = cardinality.other_category.as_str();
    let mut stages = StageCounts {
        loaded: rows.len(),
        ..Default::default()
    };

    for row in &mut rows {
        for field in CategoricalField::ALL {
            if let Some(value) = row.profile.categorical_mut(field) {
                *value = normalize_category(value, other);
            }
        }
    }

    let min_salary = config.data.min_salary;
    rows.retain(|r| r.compensation.is_some_and(|y| y.is_finite() && y > min_salary));
    stages.above_min_salary = rows.len();
    debug!(rows = rows.len(), min_salary, "dropped low or missing compensation");

    trim_per_country(
        &mut rows,
        config.data.lower_percentile / 100.0,
        config.data.upper_percentile / 100.0,
    );
    stages.within_percentiles = rows.len();
    debug!(rows = rows.len(), "trimmed per-country outliers");

    let reducer = CardinalityReducer::from_config(cardinality);
    for field in CategoricalField::ALL {
        reducer.reduce_rows(&mut rows, field);
    }

    if !cardinality.drop_other_from.is_empty() {
        let dropped = drop_other_rows(&mut rows, &cardinality.drop_other_from, other);
        info!(dropped, other, fields = ?cardinality.drop_other_from, "dropped catch-all rows");
    }
    stages.after_drop_other = rows.len();
    ensure!(!rows.is_empty(), "no training rows left after filtering");

    let records: Vec<RawRecord> = rows.iter().map(|r| r.profile.clone()).collect();
    let vocabulary = Vocabulary::observe(&records, other);
    let features = FeatureEncoder::new(&vocabulary, other)
        .encode_for_training(&records, config.features.encoding.drop_first);
    let target: Vec<f64> = rows.iter().filter_map(|r| r.compensation).collect();

    Ok(TrainingData {
        rows,
        vocabulary,
        features,
        target,
        stages,
    })
}

/// Keep rows strictly inside their country's `(lower, upper)` quantile band.
///
/// Quantiles interpolate linearly between closest ranks. Rows without a
/// country have no band and are dropped.
pub fn trim_per_country(rows: &mut Vec<SurveyRow>, lower: f64, upper: f64) {
    let mut by_country: HashMap<String, Vec<f64>> = HashMap::new();
    for row in rows.iter() {
        if let (Some(country), Some(y)) = (&row.profile.country, row.compensation) {
            by_country.entry(country.clone()).or_default().push(y);
        }
    }
    let bands: HashMap<String, (f64, f64)> = by_country
        .into_iter()
        .map(|(country, mut values)| {
            values.sort_by(f64::total_cmp);
            let band = (quantile_sorted(&values, lower), quantile_sorted(&values, upper));
            (country, band)
        })
        .collect();

    rows.retain(|row| {
        let (Some(country), Some(y)) = (&row.profile.country, row.compensation) else {
            return false;
        };
        bands
            .get(country)
            .is_some_and(|&(lo, hi)| y > lo && y < hi)
    });
}

/// K-fold cross-validation on `config.model.n_jobs` threads.
///
/// Each fold early-stops on its own test rows.
pub fn cross_validate(
    features: &FeatureMatrix,
    target: &[f64],
    config: &ModelConfig,
) -> Result<CrossValidation> {
    let folds = KFold::new(config.data.cv_splits, config.data.random_state).split(target.len());
    ensure!(
        !folds.is_empty(),
        "need at least {} rows for {}-fold cross-validation, got {}",
        config.data.cv_splits,
        config.data.cv_splits,
        target.len()
    );

    let trainer = GbtTrainer::new(GbtParams::from(&config.model));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.model.threads().unwrap_or(0))
        .build()
        .context("failed to build cross-validation thread pool")?;

    let results = pool.install(|| {
        folds
            .par_iter()
            .enumerate()
            .map(|(k, fold)| -> Result<(FoldScore, Vec<f64>), BoostError> {
                let x_train = features.select_rows(&fold.train);
                let x_test = features.select_rows(&fold.test);
                let y_train = pick(target, &fold.train);
                let y_test = pick(target, &fold.test);

                let model = trainer.fit(
                    &x_train,
                    &y_train,
                    Some(EvalSet {
                        features: &x_test,
                        target: &y_test,
                    }),
                )?;
                let test_pred = model.predict(&x_test)?;
                let score = FoldScore {
                    fold: k + 1,
                    train_r2: model.score(&x_train, &y_train)?,
                    test_r2: r2_score(&y_test, &test_pred),
                    best_iteration: model.n_trees(),
                };
                debug!(
                    fold = score.fold,
                    train_r2 = score.train_r2,
                    test_r2 = score.test_r2,
                    best_iteration = score.best_iteration,
                    "fold finished"
                );
                Ok((score, test_pred))
            })
            .collect::<Result<Vec<_>, BoostError>>()
    })?;

    let mut oof_predictions = vec![f64::NAN; target.len()];
    let mut scores = Vec::with_capacity(results.len());
    for ((score, pred), fold) in results.into_iter().zip(&folds) {
        for (&i, p) in fold.test.iter().zip(pred) {
            oof_predictions[i] = p;
        }
        scores.push(score);
    }

    Ok(CrossValidation {
        summary: CvSummary::from_folds(scores),
        oof_predictions,
    })
}

/// Fit on 90% of the rows, early-stopping on the rest. Returns the model
/// and its R² on the held-out rows.
pub fn fit_final(features: &FeatureMatrix, target: &[f64], config: &ModelConfig) -> Result<(GbtRegressor, f64)> {
    let split = train_test_split(target.len(), HOLDOUT_FRACTION, config.data.random_state);
    let x_train = features.select_rows(&split.train);
    let x_hold = features.select_rows(&split.test);
    let y_train = pick(target, &split.train);
    let y_hold = pick(target, &split.test);

    let model = GbtTrainer::new(GbtParams::from(&config.model))
        .fit(
            &x_train,
            &y_train,
            Some(EvalSet {
                features: &x_hold,
                target: &y_hold,
            }),
        )
        .context("final model fit failed")?;
    let holdout_r2 = model.score(&x_hold, &y_hold)?;
    Ok((model, holdout_r2))
}

fn pick(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}
