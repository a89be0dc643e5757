//! Long-tail collapse of categorical columns into the `Other` bucket.

use std::collections::{HashMap, HashSet};

use crate::config::CardinalityConfig;
use crate::field::CategoricalField;
use crate::record::SurveyRow;

/// Keeps at most `max_categories` values per column, each seen at least
/// `min_frequency` times; everything else becomes `other_label`.
#[derive(Debug, Clone)]
pub struct CardinalityReducer {
    max_categories: usize,
    min_frequency: usize,
    other_label: String,
}

impl CardinalityReducer {
    pub fn new(max_categories: usize, min_frequency: usize, other_label: impl Into<String>) -> Self {
        Self {
            max_categories,
            min_frequency,
            other_label: other_label.into(),
        }
    }

    pub fn from_config(config: &CardinalityConfig) -> Self {
        Self::new(
            config.max_categories,
            config.min_frequency,
            config.other_category.clone(),
        )
    }

    pub fn other_label(&self) -> &str {
        &self.other_label
    }

    /// Kept values in rank order (count descending, then label ascending).
    pub fn kept_categories(&self, column: &[Option<String>]) -> Vec<String> {
        frequencies(column)
            .into_iter()
            .take(self.max_categories)
            .filter(|(_, count)| *count >= self.min_frequency)
            .map(|(label, _)| label)
            .collect()
    }

    /// Replace every value outside the kept set (missing cells included)
    /// with the other label.
    pub fn reduce(&self, column: &[Option<String>]) -> Vec<String> {
        let kept: HashSet<String> = self.kept_categories(column).into_iter().collect();
        column
            .iter()
            .map(|v| match v {
                Some(s) if kept.contains(s) => s.clone(),
                _ => self.other_label.clone(),
            })
            .collect()
    }

    /// Reduce one categorical field across all rows, in place.
    pub fn reduce_rows(&self, rows: &mut [SurveyRow], field: CategoricalField) {
        let column: Vec<Option<String>> = rows
            .iter()
            .map(|r| r.profile.categorical(field).map(str::to_string))
            .collect();
        let reduced = self.reduce(&column);
        for (row, value) in rows.iter_mut().zip(reduced) {
            *row.profile.categorical_mut(field) = Some(value);
        }
    }
}

/// Value counts sorted by count descending, then label ascending.
///
/// Missing cells are not counted.
pub fn frequencies(column: &[Option<String>]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in column.iter().flatten() {
        *counts.entry(value.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Remove rows whose value for any of `fields` is the other label.
///
/// Returns the number of rows removed.
pub fn drop_other_rows(rows: &mut Vec<SurveyRow>, fields: &[CategoricalField], other_label: &str) -> usize {
    let before = rows.len();
    rows.retain(|row| {
        fields
            .iter()
            .all(|&f| row.profile.categorical(f) != Some(other_label))
    });
    before - rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::OTHER;
    use crate::record::RawRecord;

    fn column(counts: &[(&str, usize)]) -> Vec<Option<String>> {
        counts.iter()
            .flat_map(|(v, n)| std::iter::repeat_n(Some(v.to_string()), *n))
            .collect()
    }

    #[test]
    fn groups_rare_categories() {
        let col = column(&[("Common", 100), ("Rare1", 1), ("Rare2", 1), ("Rare3", 1)]);
        let reduced = CardinalityReducer::new(5, 10, OTHER).reduce(&col);
        assert!(reduced.iter().any(|v| v == "Common"));
        assert!(!reduced.iter().any(|v| v == "Rare1"));
        assert_eq!(reduced.iter().filter(|v| *v == "Other").count(), 3);
        assert_eq!(reduced.iter().filter(|v| *v == "Common").count(), 100);
    }

    #[test]
    fn keeps_frequent_categories() {
        let col = column(&[("A", 100), ("B", 80), ("C", 60)]);
        let reduced = CardinalityReducer::new(5, 50, OTHER).reduce(&col);
        let distinct: HashSet<&str> = reduced.iter().map(String::as_str).collect();
        assert_eq!(distinct, HashSet::from(["A", "B", "C"]));
    }

    #[test]
    fn max_categories_caps_by_rank() {
        let col = column(&[("A", 30), ("B", 20), ("C", 10)]);
        let reducer = CardinalityReducer::new(2, 1, OTHER);
        assert_eq!(reducer.kept_categories(&col), vec!["A", "B"]);
        let reduced = reducer.reduce(&col);
        assert_eq!(reduced.iter().filter(|v| *v == "Other").count(), 10);
    }

    #[test]
    fn ties_break_by_label() {
        let col = column(&[("Zeta", 5), ("Alpha", 5), ("Mid", 5)]);
        let reducer = CardinalityReducer::new(2, 1, OTHER);
        assert_eq!(reducer.kept_categories(&col), vec!["Alpha", "Mid"]);
    }

    #[test]
    fn missing_values_become_other() {
        let mut col = column(&[("A", 3)]);
        col.push(None);
        let reduced = CardinalityReducer::new(5, 1, OTHER).reduce(&col);
        assert_eq!(reduced.last().unwrap(), "Other");
    }

    #[test]
    fn frequent_other_is_kept_as_itself() {
        let col = column(&[("Other", 50), ("A", 40), ("B", 2)]);
        let reducer = CardinalityReducer::new(5, 10, OTHER);
        assert_eq!(reducer.kept_categories(&col), vec!["Other", "A"]);
        let reduced = reducer.reduce(&col);
        assert_eq!(reduced.iter().filter(|v| *v == "Other").count(), 52);
    }

    #[test]
    fn reduce_rows_writes_back() {
        let mut rows: Vec<SurveyRow> = ["India", "India", "Chad"]
            .iter()
            .map(|c| SurveyRow {
                profile: RawRecord {
                    country: Some(c.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        CardinalityReducer::new(5, 2, OTHER).reduce_rows(&mut rows, CategoricalField::Country);
        let countries: Vec<_> = rows.iter().map(|r| r.profile.country.as_deref().unwrap()).collect();
        assert_eq!(countries, vec!["India", "India", "Other"]);
    }

    #[test]
    fn drop_other_rows_filters_listed_fields_only() {
        let row = |country: &str, industry: &str| SurveyRow {
            profile: RawRecord {
                country: Some(country.into()),
                industry: Some(industry.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut rows = vec![
            row("India", "Other"),
            row("Other", "Healthcare"),
            row("Germany", "Healthcare"),
        ];
        let dropped = drop_other_rows(&mut rows, &[CategoricalField::Industry], OTHER);
        assert_eq!(dropped, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].profile.country.as_deref(), Some("Other"));
    }
}
