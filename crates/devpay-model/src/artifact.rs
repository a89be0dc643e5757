use serde::{Deserialize, Serialize};

use devpay_core::FeatureSchema;

use crate::gbtree::GbtRegressor;
use crate::trainer::CvSummary;

/// The persisted model: regressor plus the column layout it was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub regressor: GbtRegressor,
    pub feature_columns: FeatureSchema,
    /// RFC 3339 timestamp of the training run.
    pub trained_at: String,
    pub cv: CvSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::tests::{fast_config, synthetic_survey};
    use crate::trainer::{prepare_training_data, train};

    #[test]
    fn json_round_trip_preserves_predictions() {
        let config = fast_config();
        let sample = prepare_training_data(synthetic_survey(90), &config).unwrap().features;
        let outcome = train(synthetic_survey(300), &config).unwrap();
        let json = serde_json::to_string(&outcome.artifact).unwrap();
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();

        assert_eq!(back.feature_columns, outcome.artifact.feature_columns);
        assert_eq!(back.regressor.n_trees(), outcome.artifact.regressor.n_trees());
        let sample = outcome.artifact.feature_columns.align(&sample).unwrap();
        let before = outcome.artifact.regressor.predict(&sample).unwrap();
        let after = back.regressor.predict(&sample).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }
}
