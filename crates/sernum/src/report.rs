use crate::{SerialRecord, YearMonth};
use chrono::{DateTime, Utc};
use core::fmt;
use std::collections::BTreeMap;

/// How many months [`Summary::by_month`] keeps.
pub const SUMMARY_MONTHS: usize = 12;

/// Counts over a set of records, as shown on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    /// The month `this_month` refers to.
    pub month: YearMonth,
    pub this_month: usize,
    pub total: usize,
    /// Ordered by model number.
    pub by_model: Vec<(String, usize)>,
    /// Ordered by operator code.
    pub by_operator: Vec<(String, usize)>,
    /// The most recent months that have records, newest first.
    pub by_month: Vec<(YearMonth, usize)>,
}

impl Summary {
    pub fn from_records(records: &[SerialRecord], now: DateTime<Utc>) -> Self {
        let month = YearMonth::of(now);
        Self {
            month,
            this_month: count_in_month(records, month),
            total: records.len(),
            by_model: count_by_model(records),
            by_operator: count_by_operator(records),
            by_month: count_by_month(records, SUMMARY_MONTHS),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total serials: {}", self.total)?;
        writeln!(f, "This month ({}): {}", self.month, self.this_month)?;
        writeln!(f, "\nBy model:")?;
        for (model, n) in &self.by_model {
            writeln!(f, "  {model:<20} {n:>8}")?;
        }
        writeln!(f, "\nBy operator:")?;
        for (op, n) in &self.by_operator {
            writeln!(f, "  {op:<20} {n:>8}")?;
        }
        writeln!(f, "\nBy month:")?;
        for (month, n) in &self.by_month {
            writeln!(f, "  {:<20} {n:>8}", month.to_string())?;
        }
        Ok(())
    }
}

/// Records created during `month`.
pub fn count_in_month(records: &[SerialRecord], month: YearMonth) -> usize {
    records
        .iter()
        .filter(|r| month.contains(r.created_at))
        .count()
}

pub fn count_by_model(records: &[SerialRecord]) -> Vec<(String, usize)> {
    tally(records.iter().map(|r| r.metadata.model_number.as_str()))
}

pub fn count_by_operator(records: &[SerialRecord]) -> Vec<(String, usize)> {
    tally(records.iter().map(|r| r.metadata.operator_code.as_str()))
}

/// Per-month counts for the `limit` most recent months that have any
/// records, newest first. Months without records are skipped.
pub fn count_by_month(records: &[SerialRecord], limit: usize) -> Vec<(YearMonth, usize)> {
    let mut months: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for r in records {
        *months.entry(YearMonth::of(r.created_at)).or_default() += 1;
    }
    months.into_iter().rev().take(limit).collect()
}

fn tally<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for k in keys {
        *counts.entry(k).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, n)| (k.to_owned(), n))
        .collect()
}
