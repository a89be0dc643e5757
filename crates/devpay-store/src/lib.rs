//! Storage layer: survey ingestion through Arrow, JSON training artifacts.

mod error;
pub use error::StoreError;

pub mod artifacts;
pub mod survey;

pub use artifacts::ArtifactStore;
pub use survey::{read_survey, rows_from_batches};
