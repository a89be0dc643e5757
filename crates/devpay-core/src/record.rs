//! Survey records and validated prediction requests.

use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::field::CategoricalField;

/// One developer profile as it appears in the survey.
///
/// Every cell may be missing; the encoder fills the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub country: Option<String>,
    pub years_code: Option<f64>,
    pub work_exp: Option<f64>,
    pub ed_level: Option<String>,
    pub dev_type: Option<String>,
    pub industry: Option<String>,
    pub age: Option<String>,
    pub ic_or_pm: Option<String>,
}

impl RawRecord {
    pub fn categorical(&self, field: CategoricalField) -> Option<&str> {
        match field {
            CategoricalField::Country => self.country.as_deref(),
            CategoricalField::EdLevel => self.ed_level.as_deref(),
            CategoricalField::DevType => self.dev_type.as_deref(),
            CategoricalField::Industry => self.industry.as_deref(),
            CategoricalField::Age => self.age.as_deref(),
            CategoricalField::ICorPM => self.ic_or_pm.as_deref(),
        }
    }

    pub fn categorical_mut(&mut self, field: CategoricalField) -> &mut Option<String> {
        match field {
            CategoricalField::Country => &mut self.country,
            CategoricalField::EdLevel => &mut self.ed_level,
            CategoricalField::DevType => &mut self.dev_type,
            CategoricalField::Industry => &mut self.industry,
            CategoricalField::Age => &mut self.age,
            CategoricalField::ICorPM => &mut self.ic_or_pm,
        }
    }
}

/// A training row: the profile plus the columns only training reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyRow {
    pub profile: RawRecord,
    /// Annual compensation in USD (the regression target).
    pub compensation: Option<f64>,
    /// Raw currency label, e.g. `"EUR European Euro"`.
    pub currency: Option<String>,
    /// Compensation in the local currency.
    pub comp_total: Option<f64>,
}

/// The eight profile fields of a prediction request, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub country: String,
    pub years_code: f64,
    pub work_exp: f64,
    pub education_level: String,
    pub dev_type: String,
    pub industry: String,
    pub age: String,
    pub ic_or_pm: String,
}

/// A prediction request whose numeric fields have been range-checked.
///
/// Categorical values are not checked here; that is the validation gate's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SalaryInput(ProfileRequest);

impl SalaryInput {
    pub fn new(request: ProfileRequest) -> Result<Self, PipelineError> {
        check_non_negative("years_code", request.years_code)?;
        check_non_negative("work_exp", request.work_exp)?;
        Ok(Self(request))
    }

    pub fn request(&self) -> &ProfileRequest {
        &self.0
    }

    pub fn years_code(&self) -> f64 {
        self.0.years_code
    }

    pub fn work_exp(&self) -> f64 {
        self.0.work_exp
    }

    pub fn categorical(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Country => &self.0.country,
            CategoricalField::EdLevel => &self.0.education_level,
            CategoricalField::DevType => &self.0.dev_type,
            CategoricalField::Industry => &self.0.industry,
            CategoricalField::Age => &self.0.age,
            CategoricalField::ICorPM => &self.0.ic_or_pm,
        }
    }

    /// The request as a fully-populated survey record.
    pub fn to_record(&self) -> RawRecord {
        let r = &self.0;
        RawRecord {
            country: Some(r.country.clone()),
            years_code: Some(r.years_code),
            work_exp: Some(r.work_exp),
            ed_level: Some(r.education_level.clone()),
            dev_type: Some(r.dev_type.clone()),
            industry: Some(r.industry.clone()),
            age: Some(r.age.clone()),
            ic_or_pm: Some(r.ic_or_pm.clone()),
        }
    }
}

impl TryFrom<ProfileRequest> for SalaryInput {
    type Error = PipelineError;

    fn try_from(request: ProfileRequest) -> Result<Self, Self::Error> {
        Self::new(request)
    }
}

impl<'de> Deserialize<'de> for SalaryInput {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let request = ProfileRequest::deserialize(deserializer)?;
        Self::new(request).map_err(serde::de::Error::custom)
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), PipelineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidNumericRange { field, value })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_request() -> ProfileRequest {
        ProfileRequest {
            country: "United States of America".into(),
            years_code: 5.0,
            work_exp: 3.0,
            education_level: "Bachelor's degree (B.A., B.S., B.Eng., etc.)".into(),
            dev_type: "Developer, full-stack".into(),
            industry: "Software Development".into(),
            age: "25-34 years old".into(),
            ic_or_pm: "Individual contributor".into(),
        }
    }

    #[test]
    fn valid_input_keeps_every_field() {
        let input = SalaryInput::new(sample_request()).unwrap();
        assert_eq!(input.categorical(CategoricalField::Country), "United States of America");
        assert_eq!(input.categorical(CategoricalField::ICorPM), "Individual contributor");
        assert_eq!(input.years_code(), 5.0);
        assert_eq!(input.work_exp(), 3.0);
    }

    #[test]
    fn negative_years_code_rejected() {
        let mut req = sample_request();
        req.years_code = -1.0;
        let err = SalaryInput::new(req).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidNumericRange { field: "years_code", .. }
        ));
    }

    #[test]
    fn non_finite_numbers_rejected() {
        for value in [f64::INFINITY, f64::NAN] {
            let mut req = sample_request();
            req.years_code = value;
            assert!(matches!(
                SalaryInput::new(req).unwrap_err(),
                PipelineError::InvalidNumericRange { field: "years_code", .. }
            ));
        }
        let mut req = sample_request();
        req.work_exp = f64::INFINITY;
        assert!(matches!(
            SalaryInput::new(req).unwrap_err(),
            PipelineError::InvalidNumericRange { field: "work_exp", .. }
        ));
    }

    #[test]
    fn negative_work_exp_rejected() {
        let mut req = sample_request();
        req.work_exp = -5.0;
        let err = SalaryInput::new(req).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidNumericRange { field: "work_exp", .. }
        ));
    }

    #[test]
    fn nan_rejected() {
        let mut req = sample_request();
        req.work_exp = f64::NAN;
        assert!(SalaryInput::new(req).is_err());
    }

    #[test]
    fn zero_experience_is_valid() {
        let mut req = sample_request();
        req.years_code = 0.0;
        req.work_exp = 0.0;
        assert!(SalaryInput::new(req).is_ok());
    }

    #[test]
    fn deserialize_enforces_range() {
        let ok = r#"{"country":"India","years_code":2,"work_exp":1,"education_level":"Other",
            "dev_type":"Developer, back-end","industry":"Software Development",
            "age":"25-34 years old","ic_or_pm":"Individual contributor"}"#;
        assert!(serde_json::from_str::<SalaryInput>(ok).is_ok());

        let bad = ok.replace("\"years_code\":2", "\"years_code\":-2");
        assert!(serde_json::from_str::<SalaryInput>(&bad).is_err());
    }

    #[test]
    fn missing_field_rejected() {
        let missing_country = r#"{"years_code":2,"work_exp":1,"education_level":"Other",
            "dev_type":"Developer, back-end","industry":"Software Development",
            "age":"25-34 years old","ic_or_pm":"Individual contributor"}"#;
        assert!(serde_json::from_str::<SalaryInput>(missing_country).is_err());
    }

    #[test]
    fn to_record_populates_all_cells() {
        let record = SalaryInput::new(sample_request()).unwrap().to_record();
        for field in CategoricalField::ALL {
            assert!(record.categorical(field).is_some(), "{field} missing");
        }
        assert_eq!(record.years_code, Some(5.0));
    }
}
