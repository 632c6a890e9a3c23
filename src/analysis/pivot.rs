use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use super::table::WideTable;
use super::types::Fact;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y"];

/// Parses a reported period end. Timestamps are cut to their date part.
pub fn parse_period_end(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let date_part = match raw.find(|c| c == 'T' || c == ' ') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Pivots long-form facts into a period-indexed table, one column per metric name.
///
/// The first fact for a `(period_end, metric_name)` pair wins; later duplicates
/// are treated as restatements and ignored. Facts with a blank name, no value or
/// an unparseable period end are skipped, so malformed input yields an empty
/// table rather than an error.
pub fn pivot_facts(facts: &[Fact]) -> WideTable {
    let mut first_values: HashMap<(NaiveDate, &str), f64> = HashMap::new();
    let mut periods = BTreeSet::new();
    let mut columns = BTreeSet::new();
    let mut skipped = 0usize;

    for fact in facts {
        let name = fact.metric_name.as_str();
        let value = fact.value.filter(|v| v.is_finite());
        let period = parse_period_end(&fact.period_end);
        let (Some(value), Some(period)) = (value, period) else {
            skipped += 1;
            continue;
        };
        if name.trim().is_empty() {
            skipped += 1;
            continue;
        }
        first_values.entry((period, name)).or_insert(value);
        periods.insert(period);
        columns.insert(name);
    }

    if skipped > 0 {
        log::debug!("Pivot skipped {} of {} facts", skipped, facts.len());
    }

    let mut table = WideTable::with_shape(
        periods.into_iter().collect(),
        columns.into_iter().map(str::to_string).collect(),
    );
    for ((period, name), value) in first_values {
        if let (Some(row), Some(column)) = (table.row_index(period), table.column_index(name)) {
            table.set(row, column, Some(value));
        }
    }
    table
}
