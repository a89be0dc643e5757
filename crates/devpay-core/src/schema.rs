use arrow::datatypes::{DataType, Field, Schema};

/// Survey column names read at training time.
pub mod survey {
    pub const COUNTRY: &str = "Country";
    pub const YEARS_CODE: &str = "YearsCode";
    /// Older survey exports name the coding-years column this way.
    pub const YEARS_CODE_LEGACY: &str = "YearsCodePro";
    pub const WORK_EXP: &str = "WorkExp";
    pub const ED_LEVEL: &str = "EdLevel";
    pub const DEV_TYPE: &str = "DevType";
    pub const INDUSTRY: &str = "Industry";
    pub const AGE: &str = "Age";
    pub const IC_OR_PM: &str = "ICorPM";
    /// Target column candidates, in lookup order.
    pub const TARGET: [&str; 2] = ["ConvertedCompYearly", "AnnualCompensation"];
    pub const CURRENCY: &str = "Currency";
    pub const COMP_TOTAL: &str = "CompTotal";

    /// Cell values treated as missing in text columns.
    pub const MISSING_MARKERS: [&str; 2] = ["", "NA"];
}

/// Schema for an encoded feature table: one non-null `Float64` per column.
pub fn feature_table_schema(columns: &[String]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c, DataType::Float64, false))
            .collect::<Vec<_>>(),
    )
}
