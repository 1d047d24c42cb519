use std::collections::{HashMap, HashSet};

use crate::config::*;
use crate::{MONTH_COL, REFERRAL_COL};

/// Prefix shared by the secondary crisis flag columns.
const SECONDARY_CRISIS_PREFIX: &str = "secondary crisis: ";

/// The distinct referral reasons appearing in the dataset, in first-seen
/// order. The column holds comma-separated lists; each entry counts once.
pub fn referral_reason_values(dataset: &Table) -> Result<Vec<String>, CleanError> {
    let index = dataset.require_column(REFERRAL_COL)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut values: Vec<String> = Vec::new();
    for row in dataset.rows() {
        if let Cell::Text(s) = &row[index] {
            for part in s.split(", ") {
                let part = part.trim();
                if !part.is_empty() && seen.insert(part.to_string()) {
                    values.push(part.to_string());
                }
            }
        }
    }
    Ok(values)
}

/// Occurrences of each distinct value of one column, most frequent first.
/// Null cells are not counted. Ties keep first-seen order.
pub fn value_counts(dataset: &Table, column: &str) -> Result<Vec<(String, u64)>, CleanError> {
    let index = dataset.require_column(column)?;
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for row in dataset.rows() {
        if row[index].is_empty() {
            continue;
        }
        let value = row[index].to_string();
        if !counts.contains_key(&value) {
            order.push(value.clone());
        }
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut result: Vec<(String, u64)> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            (value, count)
        })
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(result)
}

/// Voucher counts per month bucket, in chronological order.
pub fn monthly_voucher_counts(dataset: &Table) -> Result<Vec<(String, u64)>, CleanError> {
    let mut result = value_counts(dataset, MONTH_COL)?;
    // The bucket labels are `YYYY-MM`, so the lexical order is the
    // chronological one.
    result.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(result)
}

/// How many records flag each secondary crisis, labeled by the crisis name
/// without its column prefix. Columns are reported in table order even when
/// no record flags them.
pub fn secondary_crisis_counts(dataset: &Table) -> Vec<(String, u64)> {
    let mut result: Vec<(String, u64)> = Vec::new();
    for (index, column) in dataset.columns().iter().enumerate() {
        let label = match column.strip_prefix(SECONDARY_CRISIS_PREFIX) {
            Some(label) => label,
            None => continue,
        };
        let count = dataset
            .rows()
            .iter()
            .filter(|row| row[index].is_set())
            .count() as u64;
        result.push((label.to_string(), count));
    }
    result
}
