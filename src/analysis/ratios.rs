use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use strum::{Display, EnumIter, IntoEnumIterator};

use super::denominator::resolve_column;
use super::table::{percent, safe_div, WideTable};
use super::types::{Statement, StatementBundle};
use crate::core::config::ConceptConfig;

/// Financial concepts the ratio engine looks for in the statement tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Concept {
    Revenue,
    CostOfRevenue,
    GrossProfit,
    OperatingIncome,
    NetIncome,
    InterestExpense,
    TotalAssets,
    TotalLiabilities,
    StockholdersEquity,
    LongTermDebt,
    ShortTermDebt,
    CurrentAssets,
    CurrentLiabilities,
    CashAndEquivalents,
    AccountsReceivable,
    Inventory,
    AccountsPayable,
    SharesOutstanding,
    OperatingCashFlow,
    CapitalExpenditure,
    /// Long-term plus short-term debt.
    TotalDebt,
    /// Operating cash flow less absolute capital expenditure.
    FreeCashFlow,
}

impl Concept {
    /// The statement searched for this concept; `None` for derived concepts.
    pub fn statement(self) -> Option<Statement> {
        match self {
            Concept::Revenue
            | Concept::CostOfRevenue
            | Concept::GrossProfit
            | Concept::OperatingIncome
            | Concept::NetIncome
            | Concept::InterestExpense => Some(Statement::Income),
            Concept::TotalAssets
            | Concept::TotalLiabilities
            | Concept::StockholdersEquity
            | Concept::LongTermDebt
            | Concept::ShortTermDebt
            | Concept::CurrentAssets
            | Concept::CurrentLiabilities
            | Concept::CashAndEquivalents
            | Concept::AccountsReceivable
            | Concept::Inventory
            | Concept::AccountsPayable
            | Concept::SharesOutstanding => Some(Statement::Balance),
            Concept::OperatingCashFlow | Concept::CapitalExpenditure => Some(Statement::CashFlow),
            Concept::TotalDebt | Concept::FreeCashFlow => None,
        }
    }

    pub fn is_derived(self) -> bool {
        self.statement().is_none()
    }
}

/// A named output column and the concepts it needs.
pub struct RatioDef {
    pub name: &'static str,
    pub inputs: &'static [Concept],
    formula: fn(&[f64]) -> Option<f64>,
}

impl RatioDef {
    /// `operands` are in the order of `inputs`.
    pub fn compute(&self, operands: &[f64]) -> Option<f64> {
        if operands.len() != self.inputs.len() {
            return None;
        }
        (self.formula)(operands).filter(|v| v.is_finite())
    }
}

impl std::fmt::Debug for RatioDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatioDef")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish()
    }
}

pub static RATIOS: &[RatioDef] = &[
    RatioDef {
        name: "gross_margin_pct",
        inputs: &[Concept::GrossProfit, Concept::Revenue],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "operating_margin_pct",
        inputs: &[Concept::OperatingIncome, Concept::Revenue],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "net_margin_pct",
        inputs: &[Concept::NetIncome, Concept::Revenue],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "cost_of_revenue_pct",
        inputs: &[Concept::CostOfRevenue, Concept::Revenue],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "return_on_assets_pct",
        inputs: &[Concept::NetIncome, Concept::TotalAssets],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "return_on_equity_pct",
        inputs: &[Concept::NetIncome, Concept::StockholdersEquity],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "current_ratio",
        inputs: &[Concept::CurrentAssets, Concept::CurrentLiabilities],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "quick_ratio",
        inputs: &[Concept::CurrentAssets, Concept::Inventory, Concept::CurrentLiabilities],
        formula: |v| safe_div(v[0] - v[1], v[2]),
    },
    RatioDef {
        name: "cash_ratio",
        inputs: &[Concept::CashAndEquivalents, Concept::CurrentLiabilities],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "debt_to_equity",
        inputs: &[Concept::TotalDebt, Concept::StockholdersEquity],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "debt_to_assets",
        inputs: &[Concept::TotalDebt, Concept::TotalAssets],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "liabilities_to_assets",
        inputs: &[Concept::TotalLiabilities, Concept::TotalAssets],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "equity_multiplier",
        inputs: &[Concept::TotalAssets, Concept::StockholdersEquity],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "asset_turnover",
        inputs: &[Concept::Revenue, Concept::TotalAssets],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "receivables_turnover",
        inputs: &[Concept::Revenue, Concept::AccountsReceivable],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "inventory_turnover",
        inputs: &[Concept::CostOfRevenue, Concept::Inventory],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "payables_turnover",
        inputs: &[Concept::CostOfRevenue, Concept::AccountsPayable],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "interest_coverage",
        inputs: &[Concept::OperatingIncome, Concept::InterestExpense],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "operating_cash_flow_ratio",
        inputs: &[Concept::OperatingCashFlow, Concept::CurrentLiabilities],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "cash_flow_to_net_income",
        inputs: &[Concept::OperatingCashFlow, Concept::NetIncome],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "free_cash_flow",
        inputs: &[Concept::FreeCashFlow],
        formula: |v| Some(v[0]),
    },
    RatioDef {
        name: "free_cash_flow_margin_pct",
        inputs: &[Concept::FreeCashFlow, Concept::Revenue],
        formula: |v| percent(v[0], v[1]),
    },
    RatioDef {
        name: "earnings_per_share",
        inputs: &[Concept::NetIncome, Concept::SharesOutstanding],
        formula: |v| safe_div(v[0], v[1]),
    },
    RatioDef {
        name: "book_value_per_share",
        inputs: &[Concept::StockholdersEquity, Concept::SharesOutstanding],
        formula: |v| safe_div(v[0], v[1]),
    },
];

pub fn ratio_def(name: &str) -> Option<&'static RatioDef> {
    RATIOS.iter().find(|ratio| ratio.name == name)
}

/// Where a concept was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConcept {
    pub concept: Concept,
    pub statement: Statement,
    pub column: String,
}

/// Resolves every non-derived concept against its home statement.
///
/// Strategies run as tiers in the configured order. A column taken by any
/// concept in one tier is unavailable to later tiers, so a loose match never
/// steals a column another concept matched exactly.
pub fn resolve_concepts(bundle: &StatementBundle, config: &ConceptConfig) -> Vec<ResolvedConcept> {
    let mut resolved: BTreeMap<Concept, ResolvedConcept> = BTreeMap::new();
    let mut claimed: HashSet<(Statement, String)> = HashSet::new();

    for &strategy in &config.strategies {
        let mut tier: Vec<ResolvedConcept> = Vec::new();
        for concept in Concept::iter().filter(|c| !resolved.contains_key(c)) {
            let (Some(statement), Some(candidates)) = (concept.statement(), config.candidates(concept))
            else {
                continue;
            };
            let available: Vec<&str> = bundle
                .get(statement)
                .columns()
                .iter()
                .map(String::as_str)
                .filter(|column| !claimed.contains(&(statement, column.to_string())))
                .collect();
            if let Some(column) = resolve_column(&available, candidates, &[strategy]) {
                tier.push(ResolvedConcept {
                    concept,
                    statement,
                    column: column.to_string(),
                });
            }
        }
        for found in tier {
            claimed.insert((found.statement, found.column.clone()));
            resolved.insert(found.concept, found);
        }
    }
    resolved.into_values().collect()
}

type SeriesMap = BTreeMap<Concept, Vec<Option<f64>>>;

fn add_derived_series(series: &mut SeriesMap) {
    let total_debt = match (
        series.get(&Concept::LongTermDebt),
        series.get(&Concept::ShortTermDebt),
    ) {
        (Some(long_term), Some(short_term)) => Some(
            long_term
                .iter()
                .zip(short_term)
                .map(|(l, s)| match (*l, *s) {
                    (Some(l), Some(s)) => Some(l + s),
                    (Some(one), None) | (None, Some(one)) => Some(one),
                    (None, None) => None,
                })
                .collect(),
        ),
        (Some(one), None) | (None, Some(one)) => Some(one.clone()),
        (None, None) => None,
    };
    if let Some(total_debt) = total_debt {
        series.insert(Concept::TotalDebt, total_debt);
    }

    let free_cash_flow = match (
        series.get(&Concept::OperatingCashFlow),
        series.get(&Concept::CapitalExpenditure),
    ) {
        (Some(operating), Some(capex)) => Some(
            operating
                .iter()
                .zip(capex)
                .map(|(o, c)| match (*o, *c) {
                    (Some(o), Some(c)) => Some(o - c.abs()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    };
    if let Some(free_cash_flow) = free_cash_flow {
        series.insert(Concept::FreeCashFlow, free_cash_flow);
    }
}

/// Computes the ratio table over the union of all statement periods.
///
/// A ratio column is present only when every concept it needs resolved. Cells
/// lacking an operand, or dividing by zero, are absent. Periods with no ratio
/// at all are dropped.
pub fn compute_ratios(bundle: &StatementBundle, config: &ConceptConfig) -> WideTable {
    let periods: Vec<NaiveDate> = Statement::iter()
        .flat_map(|statement| bundle.get(statement).periods().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if periods.is_empty() {
        return WideTable::default();
    }

    let mut series = SeriesMap::new();
    for resolved in resolve_concepts(bundle, config) {
        log::debug!(
            "Resolved {} to {} column {}",
            resolved.concept,
            resolved.statement,
            resolved.column
        );
        if let Some(values) = bundle.get(resolved.statement).series_on(&resolved.column, &periods) {
            series.insert(resolved.concept, values);
        }
    }
    add_derived_series(&mut series);

    let mut table = WideTable::with_shape(periods.clone(), Vec::new());
    for ratio in RATIOS {
        let Some(inputs) = ratio
            .inputs
            .iter()
            .map(|concept| series.get(concept))
            .collect::<Option<Vec<_>>>()
        else {
            log::debug!("Skipping {}: not every input resolved", ratio.name);
            continue;
        };

        let values = (0..periods.len())
            .map(|row| {
                let operands = inputs.iter().map(|s| s[row]).collect::<Option<Vec<f64>>>()?;
                ratio.compute(&operands)
            })
            .collect();
        if let Err(e) = table.push_column(ratio.name, values) {
            log::warn!("Failed to add ratio column {}: {}", ratio.name, e);
        }
    }

    table.retain_rows(|_, row| row.iter().any(Option::is_some));
    table
}
