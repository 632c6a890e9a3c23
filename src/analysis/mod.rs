pub mod common_size;
pub mod denominator;
pub mod flux;
pub mod pivot;
pub mod ratios;
pub mod table;
pub mod types;

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::core::config::AnalysisConfig;

pub use common_size::common_size;
pub use denominator::{
    normalize_name, resolve_column, resolve_denominator, CandidateNameSet, MatchStrategy,
};
pub use flux::{flux, pct_change};
pub use pivot::{parse_period_end, pivot_facts};
pub use ratios::{compute_ratios, resolve_concepts, Concept, RatioDef, RATIOS};
pub use table::{percent, safe_div, WideTable};
pub use types::{Fact, Statement, StatementBundle, StatementFacts};

/// Outputs for one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementAnalysis {
    pub statement: Statement,
    pub table: WideTable,
    pub denominator: Option<String>,
    pub common_size: WideTable,
    pub flux: WideTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyAnalysis {
    pub statements: Vec<StatementAnalysis>,
    pub ratios: WideTable,
    pub ratio_flux: WideTable,
}

impl CompanyAnalysis {
    pub fn statement(&self, statement: Statement) -> Option<&StatementAnalysis> {
        self.statements.iter().find(|s| s.statement == statement)
    }

    /// Every non-empty output table under a stable name.
    pub fn tables(&self) -> Vec<(String, &WideTable)> {
        let mut tables = Vec::new();
        for analysis in &self.statements {
            tables.push((analysis.statement.to_string(), &analysis.table));
            tables.push((format!("common_size_{}", analysis.statement), &analysis.common_size));
            tables.push((format!("flux_{}", analysis.statement), &analysis.flux));
        }
        tables.push(("ratios".to_string(), &self.ratios));
        tables.push(("ratio_flux".to_string(), &self.ratio_flux));
        tables.retain(|(_, table)| !table.is_empty());
        tables
    }
}

/// Pivots one statement and derives its common-size and flux tables.
pub fn analyze_statement(
    statement: Statement,
    table: WideTable,
    config: &AnalysisConfig,
) -> StatementAnalysis {
    let denominator =
        resolve_denominator(table.columns(), config.denominators.get(statement)).map(str::to_string);
    match &denominator {
        Some(column) => log::debug!("{} denominator: {}", statement, column),
        None if !table.is_empty() => log::info!("No {} denominator found", statement),
        None => {}
    }
    let common_size = common_size(&table, denominator.as_deref());
    let flux = flux(&table);
    StatementAnalysis {
        statement,
        table,
        denominator,
        common_size,
        flux,
    }
}

pub fn analyze_company(facts: &StatementFacts, config: &AnalysisConfig) -> CompanyAnalysis {
    let bundle = StatementBundle::from_facts(facts);
    let ratios = compute_ratios(&bundle, &config.concepts);
    let ratio_flux = flux(&ratios);
    let statements = Statement::iter()
        .map(|statement| analyze_statement(statement, bundle.get(statement).clone(), config))
        .collect();

    log::info!(
        "Analyzed {} facts: {} ratio columns over {} periods",
        facts.len(),
        ratios.num_columns(),
        ratios.num_rows()
    );
    CompanyAnalysis {
        statements,
        ratios,
        ratio_flux,
    }
}
