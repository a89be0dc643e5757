//! Rejects prediction requests whose categories fall outside the vocabulary.

use crate::PipelineError;
use crate::field::CategoricalField;
use crate::record::SalaryInput;
use crate::vocabulary::Vocabulary;

/// Membership check of request values against the frozen vocabulary.
///
/// Values are compared exactly as submitted: the gate neither normalises nor
/// coerces, so a request must use the spelling the vocabulary lists.
#[derive(Debug, Clone)]
pub struct ValidationGate {
    vocabulary: Vocabulary,
    catalogue: String,
}

impl ValidationGate {
    /// `catalogue` tells a rejected caller where the allowed values are listed.
    pub fn new(vocabulary: Vocabulary, catalogue: impl Into<String>) -> Self {
        Self {
            vocabulary,
            catalogue: catalogue.into(),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Check the six categorical fields in canonical order; the first value
    /// outside its vocabulary fails the request.
    pub fn check(&self, input: &SalaryInput) -> Result<(), PipelineError> {
        for field in CategoricalField::ALL {
            let value = input.categorical(field);
            if !self.vocabulary.contains(field, value) {
                return Err(PipelineError::InvalidCategory {
                    field,
                    value: value.to_string(),
                    allowed: self.vocabulary.len(field),
                    catalogue: self.catalogue.clone(),
                });
            }
        }
        Ok(())
    }
}
