//! Salary model layer: in-tree gradient boosting, cross-validated training,
//! per-category guardrails, and the thread-safe serving predictor.

pub mod artifact;
pub mod cv;
pub mod gbtree;
pub mod guardrail;
pub mod metrics;
pub mod predictor;
pub mod report;
pub mod trainer;

pub use artifact::ModelArtifact;
pub use gbtree::{BoostError, GbtParams, GbtRegressor, GbtTrainer};
pub use guardrail::{GuardrailReport, Violation};
pub use predictor::{Diagnosis, Predictor};
pub use report::TrainingReport;
pub use trainer::{CvSummary, TrainingData, TrainingOutcome, train};
