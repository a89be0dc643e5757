//! The six categorical survey fields and the two numeric passthrough columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Coding years, including education.
pub const YEARS_CODE: &str = "YearsCode";
/// Professional working years.
pub const WORK_EXP: &str = "WorkExp";
/// Numeric passthrough columns, in feature order.
pub const NUMERIC_COLUMNS: [&str; 2] = [YEARS_CODE, WORK_EXP];

/// A categorical profile field.
///
/// Declaration order is the canonical feature order: one-hot groups are laid
/// out in this order, and the validation gate checks fields in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoricalField {
    Country,
    EdLevel,
    DevType,
    Industry,
    Age,
    ICorPM,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 6] = [
        Self::Country,
        Self::EdLevel,
        Self::DevType,
        Self::Industry,
        Self::Age,
        Self::ICorPM,
    ];

    /// Survey column name, also the one-hot column prefix.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::EdLevel => "EdLevel",
            Self::DevType => "DevType",
            Self::Industry => "Industry",
            Self::Age => "Age",
            Self::ICorPM => "ICorPM",
        }
    }

    /// Field name in a prediction request.
    pub fn request_name(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::EdLevel => "education_level",
            Self::DevType => "dev_type",
            Self::Industry => "industry",
            Self::Age => "age",
            Self::ICorPM => "ic_or_pm",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::EdLevel => "education level",
            Self::DevType => "developer type",
            Self::Industry => "industry",
            Self::Age => "age",
            Self::ICorPM => "IC or PM value",
        }
    }

    pub fn plural_noun(&self) -> &'static str {
        match self {
            Self::Country => "countries",
            Self::EdLevel => "education levels",
            Self::DevType => "developer types",
            Self::Industry => "industries",
            Self::Age => "age ranges",
            Self::ICorPM => "values",
        }
    }

    /// Prefix shared by this field's indicator columns, e.g. `Country_`.
    pub fn column_prefix(&self) -> String {
        format!("{}_", self.column())
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for CategoricalField {
    type Err = PipelineError;

    /// Accepts the survey column name or the request field name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| {
                f.column().eq_ignore_ascii_case(wanted)
                    || f.request_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown categorical field {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_and_request_names() {
        assert_eq!("Country".parse::<CategoricalField>().unwrap(), CategoricalField::Country);
        assert_eq!("edlevel".parse::<CategoricalField>().unwrap(), CategoricalField::EdLevel);
        assert_eq!(
            "education_level".parse::<CategoricalField>().unwrap(),
            CategoricalField::EdLevel
        );
        assert_eq!("ic_or_pm".parse::<CategoricalField>().unwrap(), CategoricalField::ICorPM);
        assert!("Salary".parse::<CategoricalField>().is_err());
    }

    #[test]
    fn canonical_order_matches_ord() {
        let mut sorted = CategoricalField::ALL;
        sorted.sort();
        assert_eq!(sorted, CategoricalField::ALL);
    }

    #[test]
    fn serde_uses_column_names() {
        let json = serde_json::to_string(&CategoricalField::ICorPM).unwrap();
        assert_eq!(json, "\"ICorPM\"");
        let back: CategoricalField = serde_json::from_str("\"DevType\"").unwrap();
        assert_eq!(back, CategoricalField::DevType);
    }
}
