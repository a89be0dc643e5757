use std::path::PathBuf;

use thiserror::Error;

use crate::field::CategoricalField;

/// Failures of the encoding pipeline and its serving boundary.
///
/// All of these are synchronous and final: nothing in the pipeline retries,
/// and a rejected request never yields a partial prediction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A configuration file or training artifact is absent.
    #[error("{what} not found at {}. Run `devpay train` first.", .path.display())]
    ConfigurationMissing { what: &'static str, path: PathBuf },

    /// A configuration file exists but cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A categorical input value is outside its frozen vocabulary.
    #[error(
        "Invalid {}: '{value}'. Must be one of {allowed} valid {}. Check {catalogue} for all valid values.",
        .field.noun(),
        .field.plural_noun()
    )]
    InvalidCategory {
        field: CategoricalField,
        value: String,
        allowed: usize,
        catalogue: String,
    },

    /// A numeric profile field is negative or not finite.
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidNumericRange { field: &'static str, value: f64 },

    /// Encoded columns cannot be reconciled with the frozen feature schema.
    ///
    /// Signals a stale or mismatched vocabulary/model pairing, not bad input.
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl PipelineError {
    /// True for errors caused by the caller's request rather than the deployment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCategory { .. } | Self::InvalidNumericRange { .. }
        )
    }
}
