//! Training and serving parameters, read from `config/model_parameters.json`.
//!
//! Every key is optional; absent keys take the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::field::CategoricalField;
use crate::normalize::OTHER;

pub const DEFAULT_CONFIG_PATH: &str = "config/model_parameters.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub data: DataConfig,
    pub model: ModelParams,
    pub features: FeaturesConfig,
    pub guardrails: GuardrailConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Rows at or below this target are dropped.
    pub min_salary: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub cv_splits: usize,
    pub random_state: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            min_salary: 1000.0,
            lower_percentile: 2.0,
            upper_percentile: 98.0,
            cv_splits: 5,
            random_state: 42,
        }
    }
}

/// Regressor hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub random_state: u64,
    /// Worker threads for cross-validation; `-1` means all cores.
    pub n_jobs: i32,
    pub early_stopping_rounds: usize,
    pub reg_lambda: f64,
    pub max_bins: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_estimators: 5000,
            learning_rate: 0.05,
            max_depth: 6,
            min_child_weight: 3.0,
            random_state: 42,
            n_jobs: -1,
            early_stopping_rounds: 50,
            reg_lambda: 1.0,
            max_bins: 256,
        }
    }
}

impl ModelParams {
    /// Thread count for a pool, or `None` for the runtime default.
    pub fn threads(&self) -> Option<usize> {
        usize::try_from(self.n_jobs).ok().filter(|&n| n > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub cardinality: CardinalityConfig,
    pub encoding: EncodingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardinalityConfig {
    pub max_categories: usize,
    pub min_frequency: usize,
    pub other_category: String,
    /// Fields whose `Other` rows are removed from the training set.
    pub drop_other_from: Vec<CategoricalField>,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self {
            max_categories: 20,
            min_frequency: 50,
            other_category: OTHER.to_string(),
            drop_other_from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub drop_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub min_r2_per_category: f64,
    pub max_abs_pct_diff: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_r2_per_category: 0.30,
            max_abs_pct_diff: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub artifact_dir: PathBuf,
    pub verbose: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            verbose: false,
        }
    }
}

impl ModelConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::ConfigurationMissing {
                what: "configuration file",
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let d = &self.data;
        if d.cv_splits < 2 {
            return invalid(format!("data.cv_splits must be at least 2, got {}", d.cv_splits));
        }
        if !(0.0 <= d.lower_percentile && d.lower_percentile < d.upper_percentile && d.upper_percentile <= 100.0) {
            return invalid(format!(
                "percentiles must satisfy 0 <= lower < upper <= 100, got {} and {}",
                d.lower_percentile, d.upper_percentile
            ));
        }

        let m = &self.model;
        if !(m.learning_rate.is_finite() && m.learning_rate > 0.0) {
            return invalid(format!("model.learning_rate must be positive, got {}", m.learning_rate));
        }
        if m.max_depth == 0 {
            return invalid("model.max_depth must be at least 1".into());
        }
        if m.n_jobs == 0 || m.n_jobs < -1 {
            return invalid(format!("model.n_jobs must be -1 or positive, got {}", m.n_jobs));
        }
        if m.max_bins < 2 {
            return invalid(format!("model.max_bins must be at least 2, got {}", m.max_bins));
        }
        if m.reg_lambda < 0.0 || m.min_child_weight < 0.0 {
            return invalid("model.reg_lambda and model.min_child_weight must be non-negative".into());
        }

        let c = &self.features.cardinality;
        if c.max_categories == 0 {
            return invalid("features.cardinality.max_categories must be at least 1".into());
        }
        if c.other_category.is_empty() {
            return invalid("features.cardinality.other_category must not be empty".into());
        }
        Ok(())
    }
}

fn invalid(message: String) -> Result<(), PipelineError> {
    Err(PipelineError::InvalidConfig(message))
}
