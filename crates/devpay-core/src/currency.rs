//! Per-country local currency, derived from the survey's own compensation pairs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::SurveyRow;

/// Samples with a local/USD ratio outside this open interval are discarded.
const RATE_BOUNDS: (f64, f64) = (0.001, 100_000.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
    /// Local currency units per USD.
    pub rate: f64,
}

/// A USD amount expressed in a country's currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSalary {
    pub code: String,
    pub name: String,
    pub rate: f64,
    pub salary_local: f64,
}

/// Country to currency mapping, keyed by vocabulary country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyTable {
    rates: BTreeMap<String, CurrencyInfo>,
}

struct Sample<'a> {
    code: &'a str,
    name: &'a str,
    rate: f64,
}

impl CurrencyTable {
    /// Derive the table from training rows, for each of `countries`.
    ///
    /// For a country, the most common currency code wins (ties go to the
    /// smaller code), its name comes from the first row using that code, and
    /// the rate is the median `CompTotal / compensation` over those rows,
    /// rounded to two decimals. Countries with no usable sample are left out.
    pub fn from_survey<S: AsRef<str>>(rows: &[SurveyRow], countries: &[S]) -> Self {
        let mut by_country: HashMap<&str, Vec<Sample<'_>>> = HashMap::new();
        for row in rows {
            let (Some(country), Some(label), Some(local), Some(usd)) = (
                row.profile.country.as_deref(),
                row.currency.as_deref(),
                row.comp_total,
                row.compensation,
            ) else {
                continue;
            };
            let rate = local / usd;
            if !(rate > RATE_BOUNDS.0 && rate < RATE_BOUNDS.1) {
                continue;
            }
            let (code, name) = split_label(label);
            if code.is_empty() {
                continue;
            }
            by_country.entry(country).or_default().push(Sample { code, name, rate });
        }

        let mut rates = BTreeMap::new();
        for country in countries {
            let country = country.as_ref();
            let Some(samples) = by_country.get(country) else {
                debug!(country, "no currency samples, skipping");
                continue;
            };
            if let Some(info) = summarise(samples) {
                rates.insert(country.to_string(), info);
            }
        }
        Self { rates }
    }

    pub fn insert(&mut self, country: impl Into<String>, info: CurrencyInfo) {
        self.rates.insert(country.into(), info);
    }

    pub fn get(&self, country: &str) -> Option<&CurrencyInfo> {
        self.rates.get(country)
    }

    /// Convert a USD salary; `None` when the country has no currency entry.
    pub fn convert(&self, country: &str, salary_usd: f64) -> Option<LocalSalary> {
        self.get(country).map(|info| LocalSalary {
            code: info.code.clone(),
            name: info.name.clone(),
            rate: info.rate,
            salary_local: round2(salary_usd * info.rate),
        })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CurrencyInfo)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// `"EUR European Euro"` -> `("EUR", "European Euro")`.
fn split_label(label: &str) -> (&str, &str) {
    let label = label.trim();
    match label.split_once(char::is_whitespace) {
        Some((code, rest)) => {
            let rest = rest.trim_start();
            (code, if rest.is_empty() { code } else { rest })
        }
        None => (label, label),
    }
}

fn summarise(samples: &[Sample<'_>]) -> Option<CurrencyInfo> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in samples {
        *counts.entry(s.code).or_insert(0) += 1;
    }
    // BTreeMap iterates codes ascending; keep the first maximum.
    let (code, _) = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (&code, &n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((code, n)),
        })?;

    let name = samples.iter().find(|s| s.code == code)?.name;
    let mut rates: Vec<f64> = samples
        .iter()
        .filter(|s| s.code == code)
        .map(|s| s.rate)
        .collect();
    Some(CurrencyInfo {
        code: code.to_string(),
        name: name.to_string(),
        rate: round2(median(&mut rates)?),
    })
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
