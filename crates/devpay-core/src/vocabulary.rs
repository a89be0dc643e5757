//! Frozen per-field category lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::encoder::prepare;
use crate::field::CategoricalField;
use crate::record::RawRecord;

/// Allowed values for each categorical field, sorted and deduplicated.
///
/// Produced once per training run. At serve time it is read-only: every value
/// that reaches the encoder must be a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, Vec<String>>", try_from = "BTreeMap<String, Vec<String>>")]
pub struct Vocabulary {
    fields: BTreeMap<CategoricalField, Vec<String>>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct values seen in `records` after normalisation and filling.
    ///
    /// Every field gets an entry, even when `records` is empty.
    pub fn observe(records: &[RawRecord], other_label: &str) -> Self {
        let mut seen: BTreeMap<CategoricalField, BTreeSet<String>> = CategoricalField::ALL
            .into_iter()
            .map(|f| (f, BTreeSet::new()))
            .collect();
        for record in records {
            let prepared = prepare(record, other_label);
            for field in CategoricalField::ALL {
                if let Some(set) = seen.get_mut(&field) {
                    set.insert(prepared.category(field).to_string());
                }
            }
        }
        Self {
            fields: seen
                .into_iter()
                .map(|(f, set)| (f, set.into_iter().collect()))
                .collect(),
        }
    }

    /// Replace the values for `field`; they are sorted and deduplicated.
    pub fn insert<I, S>(&mut self, field: CategoricalField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        self.fields.insert(field, set.into_iter().collect());
    }

    pub fn with<I, S>(mut self, field: CategoricalField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(field, values);
        self
    }

    /// Sorted values for `field`; empty if the field is absent.
    pub fn values(&self, field: CategoricalField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: CategoricalField, value: &str) -> bool {
        self.values(field)
            .binary_search_by(|v| v.as_str().cmp(value))
            .is_ok()
    }

    pub fn len(&self, field: CategoricalField) -> usize {
        self.values(field).len()
    }

    pub fn is_complete(&self) -> bool {
        CategoricalField::ALL
            .iter()
            .all(|f| self.fields.contains_key(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoricalField, &[String])> {
        self.fields.iter().map(|(f, v)| (*f, v.as_slice()))
    }
}

impl From<Vocabulary> for BTreeMap<String, Vec<String>> {
    fn from(vocab: Vocabulary) -> Self {
        vocab
            .fields
            .into_iter()
            .map(|(f, v)| (f.column().to_string(), v))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for Vocabulary {
    type Error = PipelineError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let mut vocab = Vocabulary::new();
        for (name, values) in map {
            let field: CategoricalField = name.parse()?;
            vocab.insert(field, values);
        }
        if let Some(missing) = CategoricalField::ALL
            .iter()
            .find(|f| !vocab.fields.contains_key(f))
        {
            return Err(PipelineError::SchemaMismatch(format!(
                "vocabulary has no entry for {missing}"
            )));
        }
        Ok(vocab)
    }
}
