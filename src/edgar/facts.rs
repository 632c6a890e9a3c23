use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::denominator::CandidateNameSet;
use crate::analysis::types::{Fact, Statement, StatementFacts};

/// Taxonomies read from a company-facts document, in this order.
pub const TAXONOMIES: &[&str] = &["us-gaap", "dei"];

/// Which concept tags land in which statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementTags {
    pub income: CandidateNameSet,
    pub balance: CandidateNameSet,
    pub cash_flow: CandidateNameSet,
}

impl StatementTags {
    /// First bucket containing `tag`, checked income, balance, cash flow.
    pub fn statement_for(&self, tag: &str) -> Option<Statement> {
        if self.income.contains(tag) {
            Some(Statement::Income)
        } else if self.balance.contains(tag) {
            Some(Statement::Balance)
        } else if self.cash_flow.contains(tag) {
            Some(Statement::CashFlow)
        } else {
            None
        }
    }
}

impl Default for StatementTags {
    fn default() -> Self {
        Self {
            income: CandidateNameSet::new([
                "Revenues",
                "RevenueFromContractWithCustomerExcludingAssessedTax",
                "SalesRevenueNet",
                "NetIncomeLoss",
                "GrossProfit",
                "OperatingIncomeLoss",
                "CostOfRevenue",
                "CostOfGoodsAndServicesSold",
                "OperatingExpenses",
                "ResearchAndDevelopmentExpense",
                "SellingGeneralAndAdministrativeExpense",
                "InterestExpense",
            ]),
            balance: CandidateNameSet::new([
                "Assets",
                "AssetsCurrent",
                "Liabilities",
                "LiabilitiesCurrent",
                "StockholdersEquity",
                "LiabilitiesAndStockholdersEquity",
                "CashAndCashEquivalentsAtCarryingValue",
                "AccountsReceivableNetCurrent",
                "InventoryNet",
                "PropertyPlantAndEquipmentNet",
                "AccountsPayableCurrent",
                "LongTermDebt",
                "LongTermDebtNoncurrent",
                "ShortTermDebt",
                "ShortTermBorrowings",
                "CommonStockSharesOutstanding",
                "EntityCommonStockSharesOutstanding",
            ]),
            cash_flow: CandidateNameSet::new([
                "NetCashProvidedByUsedInOperatingActivities",
                "NetCashProvidedByUsedInInvestingActivities",
                "NetCashProvidedByUsedInFinancingActivities",
                "CashAndCashEquivalentsPeriodIncreaseDecrease",
                "PaymentsToAcquirePropertyPlantAndEquipment",
            ]),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompanyFacts {
    #[serde(default)]
    facts: BTreeMap<String, BTreeMap<String, ConceptFacts>>,
}

#[derive(Debug, Deserialize)]
struct ConceptFacts {
    #[serde(default)]
    units: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FactValue {
    end: Option<String>,
    instant: Option<String>,
    val: Option<f64>,
    fy: Option<i32>,
    fp: Option<String>,
    form: Option<String>,
    accn: Option<String>,
}

/// Splits an SEC company-facts JSON document into per-statement fact lists.
///
/// Unit payloads that are not arrays, and entries that fail to decode or carry
/// no value, are skipped. Entry order within a concept is kept.
pub fn statement_facts(json: &str, tags: &StatementTags) -> Result<StatementFacts> {
    let document: CompanyFacts = serde_json::from_str(json)
        .map_err(|e| anyhow!("Failed to parse company facts: {}", e))?;

    let mut result = StatementFacts::default();
    for taxonomy in TAXONOMIES {
        let Some(concepts) = document.facts.get(*taxonomy) else {
            continue;
        };
        for (concept, meta) in concepts {
            let tag = concept.rsplit('/').next().unwrap_or(concept);
            let Some(statement) = tags.statement_for(tag) else {
                continue;
            };
            for (unit, entries) in &meta.units {
                let Some(entries) = entries.as_array() else {
                    log::debug!("Skipping non-list units for {} ({})", concept, unit);
                    continue;
                };
                let target = result.get_mut(statement);
                for entry in entries {
                    let Ok(entry) = serde_json::from_value::<FactValue>(entry.clone()) else {
                        continue;
                    };
                    let Some(value) = entry.val else {
                        continue;
                    };
                    target.push(Fact {
                        metric_name: concept.clone(),
                        period_end: entry.end.or(entry.instant).unwrap_or_default(),
                        value: Some(value),
                        unit: Some(unit.clone()),
                        form: entry.form,
                        fiscal_year: entry.fy,
                        fiscal_period: entry.fp,
                        accession: entry.accn,
                    });
                }
            }
        }
    }

    log::debug!(
        "Company facts: {} income, {} balance, {} cash flow",
        result.income.len(),
        result.balance.len(),
        result.cash_flow.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cik": 320193,
        "entityName": "Example Corp",
        "facts": {
            "dei": {
                "EntityCommonStockSharesOutstanding": {
                    "units": {"shares": [{"end": "2023-10-20", "val": 15550061000, "form": "10-K"}]}
                }
            },
            "us-gaap": {
                "Revenues": {
                    "label": "Revenues",
                    "units": {"USD": [
                        {"end": "2022-12-31", "val": 100, "fy": 2022, "fp": "FY", "form": "10-K", "accn": "a-1"},
                        {"end": "2023-12-31", "val": 120, "fy": 2023, "fp": "FY", "form": "10-K", "accn": "a-2"},
                        {"end": "2023-12-31", "fy": 2023}
                    ]}
                },
                "Assets": {"units": {"USD": [{"instant": "2023-12-31", "val": 500}]}},
                "NetCashProvidedByUsedInOperatingActivities": {"units": {"USD": "malformed"}},
                "SomethingElse": {"units": {"USD": [{"end": "2023-12-31", "val": 1}]}}
            }
        }
    }"#;

    #[test]
    fn test_statement_facts_buckets_by_tag() {
        let facts = statement_facts(SAMPLE, &StatementTags::default()).unwrap();
        assert_eq!(facts.income.len(), 2);
        assert_eq!(facts.income[0].metric_name, "Revenues");
        assert_eq!(facts.income[1].value, Some(120.0));
        assert_eq!(facts.income[1].accession.as_deref(), Some("a-2"));
        assert_eq!(facts.balance.len(), 2);
        assert!(facts.cash_flow.is_empty());
    }

    #[test]
    fn test_instant_used_when_end_missing() {
        let facts = statement_facts(SAMPLE, &StatementTags::default()).unwrap();
        let assets = facts
            .balance
            .iter()
            .find(|f| f.metric_name == "Assets")
            .unwrap();
        assert_eq!(assets.period_end, "2023-12-31");
        assert_eq!(assets.unit.as_deref(), Some("USD"));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(statement_facts("{", &StatementTags::default()).is_err());
        assert!(statement_facts("{}", &StatementTags::default()).unwrap().is_empty());
    }

    #[test]
    fn test_statement_for_is_normalized() {
        let tags = StatementTags::default();
        assert_eq!(tags.statement_for("revenues"), Some(Statement::Income));
        assert_eq!(tags.statement_for("Assets"), Some(Statement::Balance));
        assert_eq!(tags.statement_for("Goodwill"), None);
    }
}
