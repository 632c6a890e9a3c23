use super::table::{percent, WideTable};

/// Expresses every column as a percentage of the denominator column, per period.
///
/// Returns an empty table when there is no denominator or nothing to divide.
/// A zero denominator leaves that period's cells absent.
pub fn common_size(table: &WideTable, denominator: Option<&str>) -> WideTable {
    let Some(denominator) = denominator else {
        return WideTable::default();
    };
    if table.is_empty() {
        return WideTable::default();
    }
    let Some(base_column) = table.column_index(denominator) else {
        log::debug!("Denominator column {} not in table", denominator);
        return WideTable::default();
    };

    let mut result = WideTable::with_shape(table.periods().to_vec(), table.columns().to_vec());
    for row in 0..table.num_rows() {
        let Some(base) = table.get(row, base_column) else {
            continue;
        };
        for column in 0..table.num_columns() {
            let value = table.get(row, column).and_then(|v| percent(v, base));
            result.set(row, column, value);
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

    fn income() -> WideTable {
        pivot_facts(&[
            Fact::new("Revenues", "2021-12-31", 80.0),
            Fact::new("CostOfRevenue", "2021-12-31", 20.0),
            Fact::new("Revenues", "2022-12-31", 0.0),
            Fact::new("CostOfRevenue", "2022-12-31", 30.0),
            Fact::new("Revenues", "2023-12-31", 200.0),
            Fact::new("CostOfRevenue", "2023-12-31", 50.0),
        ])
    }

    #[test]
    fn test_denominator_column_is_one_hundred() {
        let result = common_size(&income(), Some("Revenues"));
        assert_eq!(result.value(date("2021-12-31"), "Revenues"), Some(100.0));
        assert_eq!(result.value(date("2023-12-31"), "Revenues"), Some(100.0));
    }

    #[test]
    fn test_zero_denominator_only_affects_its_period() {
        let result = common_size(&income(), Some("Revenues"));
        assert_eq!(result.value(date("2022-12-31"), "CostOfRevenue"), None);
        assert_eq!(result.value(date("2022-12-31"), "Revenues"), None);
        assert_eq!(result.value(date("2021-12-31"), "CostOfRevenue"), Some(25.0));
        assert_eq!(result.value(date("2023-12-31"), "CostOfRevenue"), Some(25.0));
    }

    #[test]
    fn test_missing_denominator_is_empty() {
        assert!(common_size(&income(), None).is_empty());
        assert!(common_size(&income(), Some("Assets")).is_empty());
        assert!(common_size(&WideTable::default(), Some("Revenues")).is_empty());
    }
}
