//! The serving context: load once, predict from any thread.

use serde::Serialize;
use tracing::{debug, info};

use devpay_core::{
    CategoricalField, CurrencyTable, FeatureEncoder, FeatureMatrix, LocalSalary, PipelineError,
    SalaryInput, ValidationGate, Vocabulary,
};

use crate::artifact::ModelArtifact;

const YEARS_SWEEP: [f64; 5] = [0.0, 2.0, 5.0, 10.0, 20.0];

/// Read-only model, vocabulary and currency state behind every prediction.
///
/// Built once at startup; nothing in it changes afterwards, so a shared
/// reference is all concurrent callers need.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: ModelArtifact,
    gate: ValidationGate,
    currency: CurrencyTable,
    other_label: String,
}

impl Predictor {
    /// Fails with `SchemaMismatch` when the model's columns cannot all be
    /// produced from `vocabulary`, i.e. the files come from different runs.
    pub fn new(
        artifact: ModelArtifact,
        vocabulary: Vocabulary,
        currency: CurrencyTable,
        other_label: impl Into<String>,
        catalogue: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        artifact.feature_columns.verify_against(&vocabulary)?;
        if artifact.regressor.n_features() != artifact.feature_columns.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "regressor expects {} features but the schema lists {}",
                artifact.regressor.n_features(),
                artifact.feature_columns.len()
            )));
        }
        info!(
            features = artifact.feature_columns.len(),
            trees = artifact.regressor.n_trees(),
            currencies = currency.len(),
            "predictor ready"
        );
        Ok(Self {
            artifact,
            gate: ValidationGate::new(vocabulary, catalogue),
            currency,
            other_label: other_label.into(),
        })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        self.gate.vocabulary()
    }

    pub fn currency(&self) -> &CurrencyTable {
        &self.currency
    }

    /// Validate, encode, align, and predict an annual USD salary (never negative).
    pub fn predict(&self, input: &SalaryInput) -> Result<f64, PipelineError> {
        let aligned = self.encode(input)?;
        let raw = self.artifact.regressor.predict_row(aligned.row(0));
        debug!(raw, "prediction");
        Ok(raw.max(0.0))
    }

    /// The aligned feature row the regressor sees for `input`.
    pub fn encode(&self, input: &SalaryInput) -> Result<FeatureMatrix, PipelineError> {
        self.gate.check(input)?;
        let encoder = FeatureEncoder::new(self.gate.vocabulary(), &self.other_label);
        self.artifact
            .feature_columns
            .align(&encoder.encode_for_inference(input))
    }

    pub fn local_currency(&self, country: &str, salary_usd: f64) -> Option<LocalSalary> {
        self.currency.convert(country, salary_usd)
    }

    /// Check that the model reacts to its inputs around `base`.
    ///
    /// Sweeps coding years, swaps each categorical field through (up to five
    /// of) its vocabulary values, and lists the non-zero encoded columns.
    pub fn diagnose(&self, base: &SalaryInput) -> Result<Diagnosis, PipelineError> {
        let mut years_sweep = Vec::with_capacity(YEARS_SWEEP.len());
        for years in YEARS_SWEEP {
            let mut request = base.request().clone();
            request.years_code = years;
            let prediction = self.predict(&SalaryInput::new(request)?)?;
            years_sweep.push((years, prediction));
        }

        let mut variations = Vec::new();
        for field in CategoricalField::ALL {
            let mut predictions = Vec::new();
            for value in self.vocabulary().values(field).iter().take(5) {
                let mut request = base.request().clone();
                *request_field(&mut request, field) = value.clone();
                let prediction = self.predict(&SalaryInput::new(request)?)?;
                predictions.push((value.clone(), prediction));
            }
            variations.push(FieldVariation { field, predictions });
        }

        let encoded = self.encode(base)?;
        Ok(Diagnosis {
            years_sweep,
            variations,
            nonzero_columns: encoded.nonzero_columns(0).into_iter().map(str::to_string).collect(),
        })
    }
}

fn request_field(request: &mut devpay_core::ProfileRequest, field: CategoricalField) -> &mut String {
    match field {
        CategoricalField::Country => &mut request.country,
        CategoricalField::EdLevel => &mut request.education_level,
        CategoricalField::DevType => &mut request.dev_type,
        CategoricalField::Industry => &mut request.industry,
        CategoricalField::Age => &mut request.age,
        CategoricalField::ICorPM => &mut request.ic_or_pm,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldVariation {
    pub field: CategoricalField,
    pub predictions: Vec<(String, f64)>,
}

impl FieldVariation {
    pub fn distinct(&self) -> usize {
        distinct_count(self.predictions.iter().map(|(_, p)| *p))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub years_sweep: Vec<(f64, f64)>,
    pub variations: Vec<FieldVariation>,
    pub nonzero_columns: Vec<String>,
}

impl Diagnosis {
    pub fn years_distinct(&self) -> usize {
        distinct_count(self.years_sweep.iter().map(|(_, p)| *p))
    }

    /// Every sweep and every field with more than one value moved the prediction.
    pub fn is_sensitive(&self) -> bool {
        self.years_distinct() == self.years_sweep.len()
            && self
                .variations
                .iter()
                .filter(|v| v.predictions.len() > 1)
                .all(|v| v.distinct() > 1)
    }
}

fn distinct_count(values: impl Iterator<Item = f64>) -> usize {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(f64::total_cmp);
    v.dedup();
    v.len()
}
