use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

use super::types::Fact;

/// Denominators smaller than this in magnitude count as zero.
pub const ZERO_TOLERANCE: f64 = 1e-12;

/// Division that treats a zero denominator, or a non-finite quotient, as missing.
pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.abs() < ZERO_TOLERANCE {
        return None;
    }
    let quotient = numerator / denominator;
    quotient.is_finite().then_some(quotient)
}

pub fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    safe_div(numerator, denominator).map(|ratio| ratio * 100.0)
}

/// Period-indexed table with one column per metric name.
///
/// Rows are unique period ends in ascending order and column names are unique.
/// A cell is `None` when nothing was reported or nothing could be computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WideTable {
    periods: Vec<NaiveDate>,
    columns: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl WideTable {
    /// A table of the given shape with every cell absent.
    ///
    /// `periods` are sorted and deduplicated; duplicate column names keep their
    /// first position.
    pub fn with_shape(mut periods: Vec<NaiveDate>, columns: Vec<String>) -> Self {
        periods.sort();
        periods.dedup();
        let mut unique: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(&column) {
                unique.push(column);
            }
        }
        let cells = vec![vec![None; unique.len()]; periods.len()];
        Self {
            periods,
            columns: unique,
            cells,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.columns.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.periods.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_index(&self, period: NaiveDate) -> Option<usize> {
        self.periods.binary_search(&period).ok()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    pub fn value(&self, period: NaiveDate, column: &str) -> Option<f64> {
        self.get(self.row_index(period)?, self.column_index(column)?)
    }

    /// Stores a value; non-finite values are stored as absent.
    pub fn set(&mut self, row: usize, column: usize, value: Option<f64>) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.filter(|v| v.is_finite());
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = self.column_index(name)?;
        Some(self.cells.iter().map(|row| row[index]).collect())
    }

    /// The named column realigned onto `periods`; periods this table lacks are absent.
    pub fn series_on(&self, name: &str, periods: &[NaiveDate]) -> Option<Vec<Option<f64>>> {
        let index = self.column_index(name)?;
        let rows: HashMap<NaiveDate, usize> = self
            .periods
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i))
            .collect();
        Some(
            periods
                .iter()
                .map(|p| rows.get(p).and_then(|&row| self.cells[row][index]))
                .collect(),
        )
    }

    /// Appends a column aligned with the existing rows.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(anyhow!("Duplicate column: {}", name));
        }
        if values.len() != self.periods.len() {
            return Err(anyhow!(
                "Column {} has {} values but the table has {} rows",
                name,
                values.len(),
                self.periods.len()
            ));
        }
        for (row, value) in self.cells.iter_mut().zip(values) {
            row.push(value.filter(|v| v.is_finite()));
        }
        self.columns.push(name);
        Ok(())
    }

    /// Drops every row for which `keep` returns false.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(NaiveDate, &[Option<f64>]) -> bool,
    {
        let mut periods = Vec::with_capacity(self.periods.len());
        let mut cells = Vec::with_capacity(self.cells.len());
        for (period, row) in self.periods.drain(..).zip(self.cells.drain(..)) {
            if keep(period, &row) {
                periods.push(period);
                cells.push(row);
            }
        }
        self.periods = periods;
        self.cells = cells;
    }

    /// Back to long form: one fact per present cell, ordered by period then column.
    pub fn to_facts(&self) -> Vec<Fact> {
        let mut facts = Vec::new();
        for (period, row) in self.periods.iter().zip(&self.cells) {
            for (column, value) in self.columns.iter().zip(row) {
                if let Some(value) = value {
                    facts.push(Fact::new(
                        column.clone(),
                        period.format("%Y-%m-%d").to_string(),
                        *value,
                    ));
                }
            }
        }
        facts
    }

    /// Writes the table as CSV with a leading `period_end` column.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push("period_end".to_string());
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (period, row) in self.periods.iter().zip(&self.cells) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(period.format("%Y-%m-%d").to_string());
            record.extend(row.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_safe_div_guards_zero() {
        assert_eq!(safe_div(10.0, 2.0), Some(5.0));
        assert_eq!(safe_div(10.0, 0.0), None);
        assert_eq!(safe_div(10.0, 1e-15), None);
        assert_eq!(percent(1.0, 4.0), Some(25.0));
    }

    #[test]
    fn test_with_shape_sorts_and_dedups() {
        let table = WideTable::with_shape(
            vec![date("2023-12-31"), date("2022-12-31"), date("2023-12-31")],
            vec!["B".to_string(), "A".to_string(), "B".to_string()],
        );
        assert_eq!(table.periods(), &[date("2022-12-31"), date("2023-12-31")]);
        assert_eq!(table.columns(), &["B".to_string(), "A".to_string()]);
        assert_eq!(table.get(0, 0), None);
    }

    #[test]
    fn test_set_rejects_non_finite() {
        let mut table = WideTable::with_shape(vec![date("2023-12-31")], vec!["A".to_string()]);
        table.set(0, 0, Some(f64::INFINITY));
        assert_eq!(table.get(0, 0), None);
        table.set(0, 0, Some(3.0));
        assert_eq!(table.value(date("2023-12-31"), "A"), Some(3.0));
    }

    #[test]
    fn test_series_on_realigns() {
        let mut table = WideTable::with_shape(vec![date("2023-12-31")], vec!["A".to_string()]);
        table.set(0, 0, Some(7.0));
        let series = table
            .series_on("A", &[date("2022-12-31"), date("2023-12-31")])
            .unwrap();
        assert_eq!(series, vec![None, Some(7.0)]);
        assert!(table.series_on("missing", &[]).is_none());
    }

    #[test]
    fn test_push_column_checks_length() {
        let mut table = WideTable::with_shape(vec![date("2023-12-31")], vec!["A".to_string()]);
        assert!(table.push_column("B", vec![Some(1.0), Some(2.0)]).is_err());
        assert!(table.push_column("A", vec![Some(1.0)]).is_err());
        table.push_column("B", vec![Some(1.0)]).unwrap();
        assert_eq!(table.column("B"), Some(vec![Some(1.0)]));
    }

    #[test]
    fn test_write_csv() {
        let mut table = WideTable::with_shape(
            vec![date("2022-12-31"), date("2023-12-31")],
            vec!["Revenues".to_string()],
        );
        table.set(1, 0, Some(120.5));
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(csv, "period_end,Revenues\n2022-12-31,\n2023-12-31,120.5\n");
    }
}
