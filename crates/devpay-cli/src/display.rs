//! Terminal rendering of training, prediction, and diagnostic results.

use devpay_core::config::GuardrailConfig;
use devpay_core::{CategoricalField, FeatureMatrix, LocalSalary};
use devpay_model::guardrail::{FieldMetrics, GuardrailReport};
use devpay_model::predictor::Diagnosis;
use devpay_model::{CvSummary, TrainingReport};

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

pub fn print_training_report(report: &TrainingReport, cv: &CvSummary) {
    println!("=== Training ===");
    println!();

    println!("Rows");
    let s = &report.stages;
    println!("  {:<26} {}", "loaded", s.loaded);
    println!("  {:<26} {}", "above min salary", s.above_min_salary);
    println!("  {:<26} {}", "within percentiles", s.within_percentiles);
    println!("  {:<26} {}", "after drop-other", s.after_drop_other);
    println!("  {:<26} {}", "features", report.n_features);
    println!();

    println!("Top categories");
    for counts in &report.categories {
        println!("  {}", counts.field);
        for (value, n) in counts.top.iter().take(MAX_LIST_ITEMS) {
            println!("    {:<40} {n}", truncate(value, 40));
        }
    }
    println!();

    println!("Numeric features");
    for n in &report.numeric {
        println!(
            "  {:<12} min {:>6.1}  p25 {:>6.1}  median {:>6.1}  p75 {:>6.1}  max {:>6.1}  mean {:>6.2}",
            n.column, n.min, n.p25, n.median, n.p75, n.max, n.mean
        );
    }
    println!();

    println!("One-hot columns");
    for (field, n) in &report.one_hot_columns {
        println!("  {:<26} {n}", field.to_string());
    }
    println!();

    println!("Cross-validation ({} folds)", cv.folds.len());
    for fold in &cv.folds {
        println!(
            "  fold {:<3} train R2 {:.4}  test R2 {:.4}  trees {}",
            fold.fold, fold.train_r2, fold.test_r2, fold.best_iteration
        );
    }
    println!(
        "  mean     train R2 {:.4}  test R2 {:.4} (± {:.4})  trees {}",
        cv.mean_train_r2, cv.mean_test_r2, cv.std_test_r2, cv.mean_best_iteration
    );
    println!();

    println!("Final model");
    println!("  {:<26} {}", "trees", report.n_trees);
    println!("  {:<26} {:.4}", "holdout R2", report.holdout_r2);
    println!("  top features");
    for (name, importance) in report.top_importances.iter().take(MAX_LIST_ITEMS) {
        println!("    {:<40} {:.4}", truncate(name, 40), importance);
    }
    println!();
}

pub fn print_prediction(salary_usd: f64, local: Option<&LocalSalary>) {
    println!("Predicted salary: ${} USD", format_money(salary_usd));
    if let Some(l) = local
        && l.code != "USD"
    {
        println!(
            "  local: {} {} ({}, rate {})",
            format_money(l.salary_local),
            l.code,
            l.name,
            l.rate
        );
    }
}

pub fn print_values(field: CategoricalField, values: &[String]) {
    println!("{} ({})", field, values.len());
    for v in values {
        println!("  {v}");
    }
    println!();
}

pub fn print_diagnosis(diagnosis: &Diagnosis, row: &FeatureMatrix) -> anyhow::Result<()> {
    println!("Years of coding sweep");
    for (years, prediction) in &diagnosis.years_sweep {
        println!("  {:<26} ${}", format!("{years} years"), format_money(*prediction));
    }
    println!(
        "  distinct predictions: {}/{}",
        diagnosis.years_distinct(),
        diagnosis.years_sweep.len()
    );
    println!();

    for variation in &diagnosis.variations {
        println!("{} variation", variation.field);
        for (value, prediction) in &variation.predictions {
            println!("  {:<40} ${}", truncate(value, 40), format_money(*prediction));
        }
        println!(
            "  distinct predictions: {}/{}",
            variation.distinct(),
            variation.predictions.len()
        );
        println!();
    }

    println!("Non-zero encoded columns ({})", diagnosis.nonzero_columns.len());
    let batch = row.to_record_batch()?;
    let indices: Vec<usize> = diagnosis
        .nonzero_columns
        .iter()
        .filter_map(|c| row.column_index(c))
        .collect();
    let projected = batch.project(&indices)?;
    println!("{}", arrow::util::pretty::pretty_format_batches(&[projected])?);
    Ok(())
}

pub fn print_guardrail_report(report: &GuardrailReport, thresholds: &GuardrailConfig) {
    println!("=== Guardrail ===");
    println!(
        "  {} rows, {} features, overall out-of-fold R2 {:.4}",
        report.n_rows, report.n_features, report.overall_r2
    );
    println!(
        "  thresholds: R2 >= {}, abs % diff <= {}%",
        thresholds.min_r2_per_category, thresholds.max_abs_pct_diff
    );
    println!();

    for fm in &report.fields {
        print_field_metrics(fm);
    }

    if report.passed() {
        println!("All categories within thresholds.");
    } else {
        println!("Violations ({})", report.violations.len());
        for v in &report.violations {
            println!("  {v}");
        }
    }
}

// ── Helpers ──

fn print_field_metrics(fm: &FieldMetrics) {
    println!("{}", fm.field);
    println!(
        "  {:<40} {:>7} {:>8} {:>12} {:>12} {:>8}",
        "category", "count", "R2", "mean actual", "mean pred", "% diff"
    );
    for c in &fm.categories {
        let r2 = c.r2.map_or_else(|| "-".to_string(), |r| format!("{r:.3}"));
        println!(
            "  {:<40} {:>7} {:>8} {:>12} {:>12} {:>7.1}%",
            truncate(&c.category, 40),
            c.count,
            r2,
            format_money(c.mean_actual),
            format_money(c.mean_predicted),
            c.abs_pct_diff
        );
    }
    println!();
}

/// Whole units with thousands separators.
fn format_money(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_grouping() {
        assert_eq!(format_money(0.0), "0");
        assert_eq!(format_money(999.4), "999");
        assert_eq!(format_money(1_000.0), "1,000");
        assert_eq!(format_money(85_432.6), "85,433");
        assert_eq!(format_money(1_234_567.0), "1,234,567");
        assert_eq!(format_money(-12_000.0), "-12,000");
    }

    #[test]
    fn long_labels_truncated() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Developer, full-stack engineer", 12), "Developer...");
    }
}
