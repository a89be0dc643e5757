//! JSON persistence of the files one training run produces.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use devpay_core::{CurrencyTable, PipelineError, Vocabulary};
use devpay_model::{ModelArtifact, Predictor, TrainingOutcome};

use crate::StoreError;

pub const MODEL_FILE: &str = "model.json";
pub const VOCABULARY_FILE: &str = "valid_categories.json";
pub const CURRENCY_FILE: &str = "currency_rates.json";
pub const REPORT_FILE: &str = "training_report.json";

/// A directory holding the model, vocabulary, and currency files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Write every artifact of a training run, creating the directory.
    pub fn save(&self, outcome: &TrainingOutcome) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        write_json(&self.path(MODEL_FILE), &outcome.artifact)?;
        write_json(&self.path(VOCABULARY_FILE), &outcome.vocabulary)?;
        write_json(&self.path(CURRENCY_FILE), &outcome.currency)?;
        write_json(&self.path(REPORT_FILE), &outcome.report)?;
        info!(dir = %self.dir.display(), "saved training artifacts");
        Ok(())
    }

    pub fn load_model(&self) -> Result<ModelArtifact, StoreError> {
        read_json(&self.path(MODEL_FILE), "model artifact")
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary, StoreError> {
        read_json(&self.path(VOCABULARY_FILE), "valid categories file")
    }

    pub fn load_currency(&self) -> Result<CurrencyTable, StoreError> {
        read_json(&self.path(CURRENCY_FILE), "currency rates file")
    }

    /// Load the serving files and build the predictor.
    ///
    /// The model and vocabulary are required. Without a currency file the
    /// predictor serves USD only. Rejected requests are pointed at the
    /// vocabulary file.
    pub fn load_predictor(&self, other_label: &str) -> Result<Predictor, StoreError> {
        let artifact = self.load_model()?;
        let vocabulary = self.load_vocabulary()?;
        let currency_path = self.path(CURRENCY_FILE);
        let currency = if currency_path.exists() {
            self.load_currency()?
        } else {
            warn!(
                path = %currency_path.display(),
                "currency rates file missing; local currency conversion disabled"
            );
            CurrencyTable::default()
        };
        let catalogue = self.path(VOCABULARY_FILE).display().to_string();
        Ok(Predictor::new(artifact, vocabulary, currency, other_label, catalogue)?)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, StoreError> {
    if !path.exists() {
        return Err(PipelineError::ConfigurationMissing {
            what,
            path: path.to_path_buf(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
