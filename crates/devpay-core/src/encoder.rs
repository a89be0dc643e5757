//! One-hot feature encoding over a frozen vocabulary.
//!
//! Columns are laid out as `YearsCode`, `WorkExp`, then one `<Field>_<Value>`
//! indicator per vocabulary value, grouped in canonical field order and sorted
//! by value within a group. Indicator columns come from iterating the
//! vocabulary, never from whatever values happen to appear in the batch, so
//! the same vocabulary always yields the same column list.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::field::{CategoricalField, NUMERIC_COLUMNS};
use crate::normalize::{UNKNOWN, normalize_category};
use crate::record::{RawRecord, SalaryInput};
use crate::schema::feature_table_schema;
use crate::vocabulary::Vocabulary;

/// How the drop-first collinearity policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Batch encoding for model fitting. With `drop_first`, the first
    /// vocabulary value of each field gets no column.
    Training { drop_first: bool },
    /// Encoding of a single request. Never drops a column; the feature schema
    /// reconciles the extra indicator against the training layout.
    Inference,
}

impl EncodeMode {
    fn drops_first(self) -> bool {
        matches!(self, Self::Training { drop_first: true })
    }
}

/// A record after normalisation and missing-value filling.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub years_code: f64,
    pub work_exp: f64,
    categories: [String; 6],
}

impl PreparedRecord {
    pub fn category(&self, field: CategoricalField) -> &str {
        &self.categories[field as usize]
    }
}

/// Normalise categorical cells, fill missing numerics with 0 and missing
/// categoricals with `Unknown`.
pub fn prepare(record: &RawRecord, other_label: &str) -> PreparedRecord {
    let categories = CategoricalField::ALL.map(|field| match record.categorical(field) {
        Some(v) => normalize_category(v, other_label),
        None => UNKNOWN.to_string(),
    });
    PreparedRecord {
        years_code: record.years_code.unwrap_or(0.0),
        work_exp: record.work_exp.unwrap_or(0.0),
        categories,
    }
}

/// Indicator column name for a (field, value) pair.
pub fn indicator_column(field: CategoricalField, value: &str) -> String {
    format!("{}_{}", field.column(), value)
}

/// Dense row-major numeric table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from row-major values. `data.len()` must be a multiple of the column count.
    pub fn from_rows(columns: Vec<String>, data: Vec<f64>) -> Self {
        let n_cols = columns.len();
        let n_rows = if n_cols == 0 { 0 } else { data.len() / n_cols };
        debug_assert_eq!(n_rows * n_cols, data.len());
        Self {
            columns,
            data,
            n_rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(|i| self.row(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        self.column_index(column).map(|j| self.row(row)[j])
    }

    /// Column values as a vector (column-major view of one column).
    pub fn column_values(&self, j: usize) -> Vec<f64> {
        self.rows().map(|r| r[j]).collect()
    }

    /// Column names with a non-zero value in `row`.
    pub fn nonzero_columns(&self, row: usize) -> Vec<&str> {
        self.columns
            .iter()
            .zip(self.row(row))
            .filter(|(_, v)| **v != 0.0)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    /// Per-column sums, i.e. occurrence counts for indicator columns.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_cols()];
        for row in self.rows() {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        sums
    }

    /// A new matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols());
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        FeatureMatrix {
            columns: self.columns.clone(),
            data,
            n_rows: indices.len(),
        }
    }

    /// Arrow view of the matrix: one non-null `Float64` column per feature.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let schema = Arc::new(feature_table_schema(&self.columns));
        let arrays: Vec<ArrayRef> = (0..self.n_cols())
            .map(|j| Arc::new(Float64Array::from(self.column_values(j))) as ArrayRef)
            .collect();
        RecordBatch::try_new(schema, arrays)
    }
}

/// Encodes records against a vocabulary.
pub struct FeatureEncoder<'a> {
    vocabulary: &'a Vocabulary,
    other_label: &'a str,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(vocabulary: &'a Vocabulary, other_label: &'a str) -> Self {
        Self {
            vocabulary,
            other_label,
        }
    }

    /// Column names produced in `mode`, in order.
    pub fn column_names(&self, mode: EncodeMode) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_COLUMNS.iter().map(|s| s.to_string()).collect();
        for (field, values) in self.groups(mode) {
            names.extend(values.iter().map(|v| indicator_column(field, v)));
        }
        names
    }

    /// Encode a batch of records.
    ///
    /// A value missing from the vocabulary sets none of its field's indicators.
    /// Training batches are encoded against the vocabulary observed from the
    /// same batch, so this only happens for values the caller let through.
    pub fn encode(&self, records: &[RawRecord], mode: EncodeMode) -> FeatureMatrix {
        let groups = self.groups(mode);
        let columns = self.column_names(mode);
        let width = columns.len();
        let mut data = Vec::with_capacity(records.len() * width);

        for record in records {
            let prepared = prepare(record, self.other_label);
            data.push(prepared.years_code);
            data.push(prepared.work_exp);
            for (field, values) in &groups {
                let value = prepared.category(*field);
                data.extend(values.iter().map(|v| if v == value { 1.0 } else { 0.0 }));
            }
        }

        FeatureMatrix::from_rows(columns, data)
    }

    pub fn encode_for_training(&self, records: &[RawRecord], drop_first: bool) -> FeatureMatrix {
        self.encode(records, EncodeMode::Training { drop_first })
    }

    pub fn encode_for_inference(&self, input: &SalaryInput) -> FeatureMatrix {
        self.encode(&[input.to_record()], EncodeMode::Inference)
    }

    fn groups(&self, mode: EncodeMode) -> Vec<(CategoricalField, &'a [String])> {
        let skip = usize::from(mode.drops_first());
        CategoricalField::ALL
            .into_iter()
            .map(|field| {
                let values = self.vocabulary.values(field);
                (field, values.get(skip..).unwrap_or(&[]))
            })
            .collect()
    }
}
