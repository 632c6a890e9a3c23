use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumIter;

use super::pivot::pivot_facts;
use super::table::WideTable;

/// A single reported value as delivered by the fetch layer.
///
/// Field names accept both the long names and the short keys used in SEC
/// company-facts records (`concept`, `end`, `val`, `fy`, `fp`, `accn`). Missing
/// required fields deserialize to empty values and are dropped by the pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(default, alias = "concept")]
    pub metric_name: String,
    #[serde(default, alias = "end")]
    pub period_end: String,
    #[serde(default, alias = "val")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, alias = "fy", skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    #[serde(default, alias = "fp", skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    #[serde(default, alias = "accn", skip_serializing_if = "Option::is_none")]
    pub accession: Option<String>,
}

impl Fact {
    pub fn new(metric_name: impl Into<String>, period_end: impl Into<String>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            period_end: period_end.into(),
            value: Some(value),
            unit: None,
            form: None,
            fiscal_year: None,
            fiscal_period: None,
            accession: None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Income,
    Balance,
    CashFlow,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Income => write!(f, "income_statement"),
            Statement::Balance => write!(f, "balance_sheet"),
            Statement::CashFlow => write!(f, "cash_flow"),
        }
    }
}

/// Long-form facts for one company, split by statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementFacts {
    #[serde(default)]
    pub income: Vec<Fact>,
    #[serde(default)]
    pub balance: Vec<Fact>,
    #[serde(default)]
    pub cash_flow: Vec<Fact>,
}

impl StatementFacts {
    pub fn get(&self, statement: Statement) -> &[Fact] {
        match statement {
            Statement::Income => &self.income,
            Statement::Balance => &self.balance,
            Statement::CashFlow => &self.cash_flow,
        }
    }

    pub fn get_mut(&mut self, statement: Statement) -> &mut Vec<Fact> {
        match statement {
            Statement::Income => &mut self.income,
            Statement::Balance => &mut self.balance,
            Statement::CashFlow => &mut self.cash_flow,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.income.is_empty() && self.balance.is_empty() && self.cash_flow.is_empty()
    }

    pub fn len(&self) -> usize {
        self.income.len() + self.balance.len() + self.cash_flow.len()
    }
}

/// The three wide statement tables of one company. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementBundle {
    pub income: WideTable,
    pub balance: WideTable,
    pub cash_flow: WideTable,
}

impl StatementBundle {
    pub fn from_facts(facts: &StatementFacts) -> Self {
        Self {
            income: pivot_facts(&facts.income),
            balance: pivot_facts(&facts.balance),
            cash_flow: pivot_facts(&facts.cash_flow),
        }
    }

    pub fn get(&self, statement: Statement) -> &WideTable {
        match statement {
            Statement::Income => &self.income,
            Statement::Balance => &self.balance,
            Statement::CashFlow => &self.cash_flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_accepts_company_facts_keys() {
        let raw = r#"{"concept": "Revenues", "end": "2023-12-31", "val": 120.0, "fy": 2023, "fp": "FY", "accn": "0000-1"}"#;
        let fact: Fact = serde_json::from_str(raw).unwrap();
        assert_eq!(fact.metric_name, "Revenues");
        assert_eq!(fact.period_end, "2023-12-31");
        assert_eq!(fact.value, Some(120.0));
        assert_eq!(fact.fiscal_year, Some(2023));
        assert_eq!(fact.accession.as_deref(), Some("0000-1"));
    }

    #[test]
    fn test_fact_missing_fields_deserialize_empty() {
        let fact: Fact = serde_json::from_str(r#"{"unit": "USD"}"#).unwrap();
        assert!(fact.metric_name.is_empty());
        assert!(fact.value.is_none());
    }

    #[test]
    fn test_statement_display_names() {
        assert_eq!(Statement::Income.to_string(), "income_statement");
        assert_eq!(Statement::Balance.to_string(), "balance_sheet");
        assert_eq!(Statement::CashFlow.to_string(), "cash_flow");
    }
}
