//! Canonical spelling for free-text survey categories.
//!
//! Survey exports carry the same answer in several spellings. Two variants
//! matter for one-hot encoding, because each spelling would otherwise become
//! its own indicator column:
//!
//! - Typographic apostrophes: `Bachelor’s degree` vs `Bachelor's degree`
//! - "Other" write-ins: `Other (please specify):`, `Other:`, `Other`

/// Canonical label for the long-tail bucket.
pub const OTHER: &str = "Other";

/// Fill value for missing categorical cells.
pub const UNKNOWN: &str = "Unknown";

const RIGHT_SINGLE_QUOTE: char = '\u{2019}';

/// Normalise a single category value.
///
/// 1. Replace U+2019 with ASCII `'`
/// 2. If the value starts with the word `Other` (followed by the end of the
///    string or a non-word character), replace the whole value with
///    `other_label`
///
/// Idempotent: normalising an already-normalised value returns it unchanged.
pub fn normalize_category(value: &str, other_label: &str) -> String {
    let value = value.replace(RIGHT_SINGLE_QUOTE, "'");
    if is_other_variant(&value) {
        other_label.to_string()
    } else {
        value
    }
}

/// Normalise a column, leaving missing cells missing.
pub fn normalize_column(values: &[Option<String>], other_label: &str) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| v.as_deref().map(|s| normalize_category(s, other_label)))
        .collect()
}

/// `Other` at the start of the value, then a word boundary.
fn is_other_variant(value: &str) -> bool {
    match value.strip_prefix(OTHER) {
        Some(rest) => rest
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_')),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_please_specify() {
        assert_eq!(normalize_category("Other (please specify):", OTHER), "Other");
    }

    #[test]
    fn other_colon() {
        assert_eq!(normalize_category("Other:", OTHER), "Other");
    }

    #[test]
    fn exact_other_kept() {
        assert_eq!(normalize_category("Other", OTHER), "Other");
    }

    #[test]
    fn words_starting_with_other_untouched() {
        assert_eq!(normalize_category("Otherwise", OTHER), "Otherwise");
        assert_eq!(normalize_category("Others", OTHER), "Others");
        assert_eq!(normalize_category("Other_thing", OTHER), "Other_thing");
    }

    #[test]
    fn other_in_the_middle_untouched() {
        assert_eq!(
            normalize_category("Some Other degree", OTHER),
            "Some Other degree"
        );
    }

    #[test]
    fn non_other_values_unchanged() {
        for v in ["Developer, back-end", "Software Development", "India"] {
            assert_eq!(normalize_category(v, OTHER), v);
        }
    }

    #[test]
    fn curly_apostrophe_replaced() {
        assert_eq!(
            normalize_category("Bachelor\u{2019}s degree (B.A., B.S., B.Eng., etc.)", OTHER),
            "Bachelor's degree (B.A., B.S., B.Eng., etc.)"
        );
    }

    #[test]
    fn configured_other_label() {
        assert_eq!(normalize_category("Other:", "Misc"), "Misc");
    }

    #[test]
    fn missing_values_stay_missing() {
        let col = vec![None, Some("Other:".to_string())];
        assert_eq!(normalize_column(&col, OTHER), vec![None, Some("Other".to_string())]);
    }

    #[test]
    fn idempotent() {
        let col: Vec<Option<String>> = [
            "Other (please specify):",
            "Master\u{2019}s degree",
            "Germany",
            "Other",
            "Otherwise",
        ]
        .iter()
        .map(|s| Some(s.to_string()))
        .collect();
        let once = normalize_column(&col, OTHER);
        let twice = normalize_column(&once, OTHER);
        assert_eq!(once, twice);
    }
}
