use super::table::{percent, WideTable};

/// Percent change from `previous` to `current`; absent when `previous` is zero.
pub fn pct_change(previous: f64, current: f64) -> Option<f64> {
    percent(current - previous, previous)
}

/// Period-over-period percent change for every column.
///
/// The first period has no predecessor and is omitted, so tables with fewer
/// than two rows produce an empty result.
pub fn flux(table: &WideTable) -> WideTable {
    if table.is_empty() || table.num_rows() < 2 {
        return WideTable::default();
    }

    let mut result = WideTable::with_shape(table.periods()[1..].to_vec(), table.columns().to_vec());
    for row in 1..table.num_rows() {
        for column in 0..table.num_columns() {
            let change = match (table.get(row - 1, column), table.get(row, column)) {
                (Some(previous), Some(current)) => pct_change(previous, current),
                _ => None,
            };
            result.set(row - 1, column, change);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pivot::pivot_facts;
    use crate::analysis::types::Fact;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_flux_example() {
        let table = pivot_facts(&[
            Fact::new("Revenues", "2022-12-31", 100.0),
            Fact::new("NetIncomeLoss", "2022-12-31", 10.0),
            Fact::new("Revenues", "2023-12-31", 120.0),
            Fact::new("NetIncomeLoss", "2023-12-31", 18.0),
        ]);
        let result = flux(&table);
        assert_eq!(result.periods(), &[date("2023-12-31")]);
        assert_eq!(result.value(date("2023-12-31"), "Revenues"), Some(20.0));
        assert_eq!(result.value(date("2023-12-31"), "NetIncomeLoss"), Some(80.0));
    }

    #[test]
    fn test_flux_single_row_is_empty() {
        let table = pivot_facts(&[Fact::new("Revenues", "2022-12-31", 100.0)]);
        assert!(flux(&table).is_empty());
        assert!(flux(&WideTable::default()).is_empty());
    }

    #[test]
    fn test_flux_zero_previous_is_absent() {
        let table = pivot_facts(&[
            Fact::new("OtherIncome", "2021-12-31", 0.0),
            Fact::new("OtherIncome", "2022-12-31", 5.0),
            Fact::new("OtherIncome", "2023-12-31", 10.0),
        ]);
        let result = flux(&table);
        assert_eq!(result.value(date("2022-12-31"), "OtherIncome"), None);
        assert_eq!(result.value(date("2023-12-31"), "OtherIncome"), Some(100.0));
    }

    #[test]
    fn test_flux_is_idempotent() {
        let table = pivot_facts(&[
            Fact::new("Assets", "2021-12-31", 50.0),
            Fact::new("Assets", "2022-12-31", 75.0),
            Fact::new("Assets", "2023-12-31", 60.0),
        ]);
        assert_eq!(flux(&table), flux(&table));
    }

    #[test]
    fn test_pct_change_negative_base() {
        assert_eq!(pct_change(-10.0, -5.0), Some(-50.0));
    }
}
