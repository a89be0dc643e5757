//! Survey ingestion: CSV or Parquet into [`SurveyRow`]s.
//!
//! CSV files are read with every column as `Utf8` and numbers are parsed per
//! cell, so a stray text value in a numeric column becomes a missing value
//! instead of failing schema inference. Parquet columns may be typed.

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray, RecordBatch,
    StringArray,
};
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use tracing::info;

use devpay_core::schema::survey::{
    COMP_TOTAL, CURRENCY, MISSING_MARKERS, TARGET, WORK_EXP, YEARS_CODE, YEARS_CODE_LEGACY,
};
use devpay_core::{CategoricalField, RawRecord, SurveyRow};

use crate::StoreError;

/// Read a survey file, choosing the reader from its extension.
pub fn read_survey(path: &Path) -> Result<Vec<SurveyRow>, StoreError> {
    if !path.exists() {
        return Err(StoreError::SurveyNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let batches = match ext.as_str() {
        "csv" => read_csv(path)?,
        #[cfg(feature = "parquet")]
        "parquet" => read_parquet(path)?,
        other => return Err(StoreError::UnsupportedFormat(other.to_string())),
    };
    let rows = rows_from_batches(&batches)?;
    info!(rows = rows.len(), path = %path.display(), "loaded survey");
    Ok(rows)
}

/// Read a CSV file with a header row into all-`Utf8` record batches.
pub fn read_csv(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let mut file = File::open(path)?;
    let (header, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(0))?;
    let schema = Schema::new(
        header
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    file.rewind()?;

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .build(file)?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read a Parquet file into Arrow record batches.
#[cfg(feature = "parquet")]
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Convert record batches into survey rows.
///
/// Profile columns and one target column are required; `Currency` and
/// `CompTotal` are optional.
pub fn rows_from_batches(batches: &[RecordBatch]) -> Result<Vec<SurveyRow>, StoreError> {
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());

    for batch in batches {
        let years = first_column(batch, &[YEARS_CODE, YEARS_CODE_LEGACY])
            .ok_or_else(|| StoreError::MissingColumn(YEARS_CODE.into()))?;
        let work_exp = required(batch, WORK_EXP)?;
        let target = first_column(batch, &TARGET)
            .ok_or_else(|| StoreError::MissingColumn(TARGET.join(" or ")))?;
        let categorical = CategoricalField::ALL
            .into_iter()
            .map(|field| Ok((field, required(batch, field.column())?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let currency = column(batch, CURRENCY);
        let comp_total = column(batch, COMP_TOTAL);

        for row in 0..batch.num_rows() {
            let mut profile = RawRecord {
                years_code: get_f64(years, row),
                work_exp: get_f64(work_exp, row),
                ..RawRecord::default()
            };
            for (field, col) in &categorical {
                *profile.categorical_mut(*field) = get_string(*col, row);
            }
            rows.push(SurveyRow {
                profile,
                compensation: get_f64(target, row),
                currency: currency.and_then(|c| get_string(c, row)),
                comp_total: comp_total.and_then(|c| get_f64(c, row)),
            });
        }
    }
    Ok(rows)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a dyn Array> {
    batch.column_by_name(name).map(|c| c.as_ref())
}

fn required<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array, StoreError> {
    column(batch, name).ok_or_else(|| StoreError::MissingColumn(name.to_string()))
}

fn first_column<'a>(batch: &'a RecordBatch, names: &[&str]) -> Option<&'a dyn Array> {
    names.iter().find_map(|name| column(batch, name))
}

// ── Arrow extraction helpers ──

fn is_missing(value: &str) -> bool {
    MISSING_MARKERS.contains(&value.trim())
}

/// A string cell (Utf8 or LargeUtf8); empty and `NA` cells are missing.
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row))
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row))
        })
        .filter(|v| !is_missing(v))
        .map(str::to_string)
}

/// A numeric cell from a float, integer, or text column. Unparsable text and
/// non-finite values are missing.
fn get_f64(col: &dyn Array, row: usize) -> Option<f64> {
    if col.is_null(row) {
        return None;
    }
    let any = col.as_any();
    let value = if let Some(a) = any.downcast_ref::<Float64Array>() {
        Some(a.value(row))
    } else if let Some(a) = any.downcast_ref::<Float32Array>() {
        Some(f64::from(a.value(row)))
    } else if let Some(a) = any.downcast_ref::<Int64Array>() {
        Some(a.value(row) as f64)
    } else if let Some(a) = any.downcast_ref::<Int32Array>() {
        Some(f64::from(a.value(row)))
    } else {
        get_string(col, row).and_then(|s| s.trim().parse::<f64>().ok())
    };
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "ResponseId,Country,YearsCode,WorkExp,EdLevel,DevType,Industry,Age,ICorPM,Currency,CompTotal,ConvertedCompYearly";

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn reads_csv_rows() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "{HEADER}\n\
             1,Germany,10,8,\"Master\u{2019}s degree (M.A., M.S., M.Eng., MBA, etc.)\",\"Developer, back-end\",Software Development,25-34 years old,Individual contributor,EUR European Euro,72000,80000\n\
             2,India,NA,,Something else,\"Developer, full-stack\",NA,18-24 years old,People manager,,,\n"
        );
        let rows = read_survey(&write(&dir, "survey.csv", &body)).unwrap();
        assert_eq!(rows.len(), 2);

        let de = &rows[0];
        assert_eq!(de.profile.country.as_deref(), Some("Germany"));
        assert_eq!(de.profile.years_code, Some(10.0));
        assert_eq!(de.profile.dev_type.as_deref(), Some("Developer, back-end"));
        assert_eq!(de.currency.as_deref(), Some("EUR European Euro"));
        assert_eq!(de.comp_total, Some(72_000.0));
        assert_eq!(de.compensation, Some(80_000.0));

        let india = &rows[1];
        assert_eq!(india.profile.years_code, None);
        assert_eq!(india.profile.work_exp, None);
        assert_eq!(india.profile.industry, None);
        assert_eq!(india.compensation, None);
        assert_eq!(india.currency, None);
    }

    #[test]
    fn legacy_columns_accepted() {
        let dir = TempDir::new().unwrap();
        let body = "Country,YearsCodePro,WorkExp,EdLevel,DevType,Industry,Age,ICorPM,AnnualCompensation\n\
                    India,4,3,Bachelor's,Developer,Fintech,25-34 years old,Individual contributor,20000\n";
        let rows = read_survey(&write(&dir, "legacy.csv", body)).unwrap();
        assert_eq!(rows[0].profile.years_code, Some(4.0));
        assert_eq!(rows[0].compensation, Some(20_000.0));
        assert_eq!(rows[0].comp_total, None);
    }

    #[test]
    fn unparsable_numbers_are_missing() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "{HEADER}\n1,India,Less than 1 year,x,a,b,c,d,e,INR Indian rupee,abc,1500\n"
        );
        let rows = read_survey(&write(&dir, "text.csv", &body)).unwrap();
        assert_eq!(rows[0].profile.years_code, None);
        assert_eq!(rows[0].profile.work_exp, None);
        assert_eq!(rows[0].comp_total, None);
        assert_eq!(rows[0].compensation, Some(1500.0));
    }

    #[test]
    fn missing_columns_reported() {
        let dir = TempDir::new().unwrap();
        let no_target = write(
            &dir,
            "a.csv",
            "Country,YearsCode,WorkExp,EdLevel,DevType,Industry,Age,ICorPM\nIndia,1,1,a,b,c,d,e\n",
        );
        let err = read_survey(&no_target).unwrap_err();
        assert!(
            matches!(&err, StoreError::MissingColumn(c) if c == "ConvertedCompYearly or AnnualCompensation"),
            "{err}"
        );

        let no_age = write(
            &dir,
            "b.csv",
            "Country,YearsCode,WorkExp,EdLevel,DevType,Industry,ICorPM,ConvertedCompYearly\nIndia,1,1,a,b,c,e,5000\n",
        );
        assert!(matches!(read_survey(&no_age), Err(StoreError::MissingColumn(c)) if c == "Age"));
    }

    #[test]
    fn missing_and_unknown_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_survey(&dir.path().join("nope.csv")),
            Err(StoreError::SurveyNotFound(_))
        ));
        let txt = write(&dir, "survey.txt", "x");
        assert!(matches!(read_survey(&txt), Err(StoreError::UnsupportedFormat(e)) if e == "txt"));
    }

    #[cfg(feature = "parquet")]
    #[test]
    fn reads_typed_parquet() {
        use parquet::arrow::ArrowWriter;

        let text = |v: &[Option<&str>]| Arc::new(StringArray::from(v.to_vec())) as Arc<dyn Array>;
        let mut columns: Vec<(&str, Arc<dyn Array>)> = vec![
            ("YearsCode", Arc::new(Int64Array::from(vec![Some(3), None]))),
            ("WorkExp", Arc::new(Float64Array::from(vec![1.5, 2.0]))),
            ("ConvertedCompYearly", Arc::new(Float64Array::from(vec![Some(50_000.0), Some(f64::NAN)]))),
        ];
        for field in CategoricalField::ALL {
            columns.push((field.column(), text(&[Some("x"), Some("NA")])));
        }
        let batch = RecordBatch::try_from_iter(columns).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("survey.parquet");
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let rows = read_survey(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].profile.years_code, Some(3.0));
        assert_eq!(rows[0].profile.age.as_deref(), Some("x"));
        assert_eq!(rows[1].profile.years_code, None);
        assert_eq!(rows[1].profile.work_exp, Some(2.0));
        assert_eq!(rows[1].compensation, None);
        assert_eq!(rows[1].profile.country, None);
        assert_eq!(rows[1].currency, None);
    }
}
