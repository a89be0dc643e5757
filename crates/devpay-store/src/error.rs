use devpay_core::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("survey file not found: {0}")]
    SurveyNotFound(std::path::PathBuf),

    #[error("survey is missing column {0}")]
    MissingColumn(String),

    #[error("unsupported survey format: {0}")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "parquet")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("json error in {}: {source}", .path.display())]
    Json {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}
