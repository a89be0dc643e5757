//! Reconciling inference-time encodings with the training-time column layout.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::encoder::{FeatureMatrix, indicator_column};
use crate::field::{CategoricalField, NUMERIC_COLUMNS};
use crate::vocabulary::Vocabulary;

/// The ordered feature columns frozen at training time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Column names must be unique.
    pub fn new(columns: Vec<String>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(PipelineError::SchemaMismatch(format!(
                "duplicate feature column {dup:?}"
            )));
        }
        Ok(Self { columns })
    }

    /// Freeze the columns of a training matrix.
    pub fn of(matrix: &FeatureMatrix) -> Self {
        Self {
            columns: matrix.columns().to_vec(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Reindex `matrix` to exactly the frozen columns, in frozen order.
    ///
    /// Frozen indicator columns the matrix lacks are filled with 0; matrix
    /// columns outside the schema are dropped. A frozen numeric column that
    /// the matrix lacks is an error, since zero-filling it would silently
    /// feed the model a constant.
    pub fn align(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix, PipelineError> {
        for numeric in NUMERIC_COLUMNS {
            if self.columns.iter().any(|c| c == numeric) && matrix.column_index(numeric).is_none() {
                return Err(PipelineError::SchemaMismatch(format!(
                    "encoded row has no {numeric} column"
                )));
            }
        }

        let source: HashMap<&str, usize> = matrix
            .columns()
            .iter()
            .enumerate()
            .map(|(j, c)| (c.as_str(), j))
            .collect();
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| source.get(c.as_str()).copied())
            .collect();

        let mut data = Vec::with_capacity(matrix.n_rows() * self.columns.len());
        for row in matrix.rows() {
            data.extend(mapping.iter().map(|m| m.map_or(0.0, |j| row[j])));
        }
        Ok(FeatureMatrix::from_rows(self.columns.clone(), data))
    }

    /// Check that every frozen column can be produced from `vocabulary`.
    ///
    /// Both numeric columns must be present, and every other column must be
    /// `<Field>_<Value>` for a value in the vocabulary. Anything else means the
    /// model and vocabulary come from different training runs.
    pub fn verify_against(&self, vocabulary: &Vocabulary) -> Result<(), PipelineError> {
        for numeric in NUMERIC_COLUMNS {
            if !self.columns.iter().any(|c| c == numeric) {
                return Err(PipelineError::SchemaMismatch(format!(
                    "feature schema has no {numeric} column"
                )));
            }
        }

        let producible: HashSet<String> = CategoricalField::ALL
            .into_iter()
            .flat_map(|f| vocabulary.values(f).iter().map(move |v| indicator_column(f, v)))
            .chain(NUMERIC_COLUMNS.iter().map(|s| s.to_string()))
            .collect();

        let orphans: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !producible.contains(c.as_str()))
            .map(String::as_str)
            .collect();
        if !orphans.is_empty() {
            return Err(PipelineError::SchemaMismatch(format!(
                "{} feature column(s) unknown to the vocabulary, e.g. {:?}",
                orphans.len(),
                orphans[0]
            )));
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = PipelineError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeMode, FeatureEncoder};
    use crate::normalize::OTHER;
    use crate::record::tests::sample_request;
    use crate::record::{RawRecord, SalaryInput};

    fn training_rows() -> Vec<RawRecord> {
        ["United States of America", "Germany", "India"]
            .iter()
            .enumerate()
            .map(|(i, country)| {
                let mut r = SalaryInput::new(sample_request()).unwrap().to_record();
                r.country = Some(country.to_string());
                r.years_code = Some(i as f64);
                r
            })
            .collect()
    }

    fn schema(cols: &[&str]) -> FeatureSchema {
        FeatureSchema::new(cols.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn inserts_missing_and_drops_extra() {
        let row = FeatureMatrix::from_rows(
            vec!["YearsCode".into(), "WorkExp".into(), "Country_India".into(), "Country_Narnia".into()],
            vec![5.0, 3.0, 1.0, 1.0],
        );
        let frozen = schema(&["Country_Germany", "YearsCode", "Country_India", "WorkExp"]);
        let aligned = frozen.align(&row).unwrap();
        assert_eq!(aligned.columns(), frozen.columns());
        assert_eq!(aligned.row(0), [0.0, 5.0, 1.0, 3.0]);
    }

    #[test]
    fn aligned_inference_row_matches_training_layout() {
        let rows = training_rows();
        let vocab = Vocabulary::observe(&rows, OTHER);
        let enc = FeatureEncoder::new(&vocab, OTHER);
        let training = enc.encode(&rows, EncodeMode::Training { drop_first: true });
        let frozen = FeatureSchema::of(&training);

        let mut req = sample_request();
        req.country = "Germany".into();
        let row = enc.encode_for_inference(&SalaryInput::new(req).unwrap());
        assert!(row.n_cols() > frozen.len());

        let aligned = frozen.align(&row).unwrap();
        assert_eq!(aligned.columns(), frozen.columns());
        assert_eq!(aligned.value(0, "Country_India"), Some(0.0));
        // Germany is the dropped first country, so it has no column at all.
        assert_eq!(aligned.value(0, "Country_Germany"), None);
        assert_eq!(aligned.value(0, "Country_United States of America"), Some(0.0));
        assert_eq!(aligned.value(0, "YearsCode"), Some(5.0));
    }

    #[test]
    fn every_absent_column_is_zero() {
        let rows = training_rows();
        let vocab = Vocabulary::observe(&rows, OTHER);
        let enc = FeatureEncoder::new(&vocab, OTHER);
        let frozen = FeatureSchema::of(&enc.encode_for_training(&rows, false));
        let only_numeric =
            FeatureMatrix::from_rows(vec!["YearsCode".into(), "WorkExp".into()], vec![1.0, 2.0]);
        let aligned = frozen.align(&only_numeric).unwrap();
        assert_eq!(aligned.row(0)[2..].iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn missing_numeric_column_is_mismatch() {
        let frozen = schema(&["YearsCode", "WorkExp", "Country_India"]);
        let row = FeatureMatrix::from_rows(vec!["WorkExp".into()], vec![1.0]);
        assert!(matches!(frozen.align(&row), Err(PipelineError::SchemaMismatch(_))));
    }

    #[test]
    fn duplicate_columns_rejected() {
        assert!(FeatureSchema::new(vec!["YearsCode".into(), "YearsCode".into()]).is_err());
    }

    #[test]
    fn verify_accepts_matching_vocabulary() {
        let rows = training_rows();
        let vocab = Vocabulary::observe(&rows, OTHER);
        let frozen = FeatureSchema::of(&FeatureEncoder::new(&vocab, OTHER).encode_for_training(&rows, true));
        frozen.verify_against(&vocab).unwrap();
    }

    #[test]
    fn verify_rejects_stale_vocabulary() {
        let rows = training_rows();
        let vocab = Vocabulary::observe(&rows, OTHER);
        let frozen = FeatureSchema::of(&FeatureEncoder::new(&vocab, OTHER).encode_for_training(&rows, false));
        let stale = Vocabulary::observe(&rows[..1], OTHER);
        let err = frozen.verify_against(&stale).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn verify_requires_numeric_columns() {
        let vocab = Vocabulary::observe(&training_rows(), OTHER);
        assert!(schema(&["YearsCode", "Country_India"]).verify_against(&vocab).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let frozen = schema(&["YearsCode", "WorkExp"]);
        let json = serde_json::to_string(&frozen).unwrap();
        assert_eq!(json, r#"["YearsCode","WorkExp"]"#);
        let back: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frozen);
        assert!(serde_json::from_str::<FeatureSchema>(r#"["A","A"]"#).is_err());
    }
}
