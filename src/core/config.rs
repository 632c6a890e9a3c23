use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;

use crate::analysis::denominator::{CandidateNameSet, MatchStrategy, EXACT_THEN_SUBSTRING};
use crate::analysis::ratios::Concept;
use crate::analysis::types::Statement;
use crate::edgar::facts::StatementTags;
use crate::edgar::report::FormType;

/// Environment variable naming a JSON file that overrides the defaults.
pub const CONFIG_ENV_VAR: &str = "COMMONSENSE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub denominators: DenominatorConfig,
    pub concepts: ConceptConfig,
    pub statement_tags: StatementTags,
    pub narrative: NarrativeConfig,
}

impl AnalysisConfig {
    /// Defaults, or the file named by `COMMONSENSE_CONFIG` when it is set.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::info!("Loaded analysis config from {}", path.display());
        Ok(config)
    }

    /// Parses a partial JSON document; anything not given keeps its default.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.concepts.fill_missing(&ConceptConfig::default());
        if config.concepts.strategies.is_empty() {
            return Err(anyhow!("concepts.strategies must not be empty"));
        }
        Ok(config)
    }
}

/// Common-size denominator candidates per statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenominatorConfig {
    pub income: CandidateNameSet,
    pub balance: CandidateNameSet,
    pub cash_flow: CandidateNameSet,
}

impl DenominatorConfig {
    pub fn get(&self, statement: Statement) -> &CandidateNameSet {
        match statement {
            Statement::Income => &self.income,
            Statement::Balance => &self.balance,
            Statement::CashFlow => &self.cash_flow,
        }
    }
}

impl Default for DenominatorConfig {
    fn default() -> Self {
        Self {
            income: CandidateNameSet::new([
                "revenues",
                "revenue",
                "revenuefromcontractwithcustomerexcludingassessedtax",
                "salesrevenuenet",
                "salesrevenuegoodsnet",
                "salesrevenueservicesnet",
            ]),
            balance: CandidateNameSet::new([
                "assets",
                "liabilitiesandstockholdersequity",
                "stockholdersequity",
            ]),
            cash_flow: CandidateNameSet::new([
                "netcashprovidedbyusedinoperatingactivities",
                "netcashprovidedbyusedininvestingactivities",
                "netcashprovidedbyusedinfinancingactivities",
            ]),
        }
    }
}

const DEFAULT_CONCEPT_NAMES: &[(Concept, &[&str])] = &[
    (
        Concept::Revenue,
        &[
            "revenues",
            "revenue",
            "revenuefromcontractwithcustomerexcludingassessedtax",
            "revenuefromcontractwithcustomerincludingassessedtax",
            "salesrevenuenet",
            "salesrevenuegoodsnet",
            "salesrevenueservicesnet",
        ],
    ),
    (
        Concept::CostOfRevenue,
        &[
            "costofrevenue",
            "costofgoodsandservicessold",
            "costofgoodssold",
            "costofsales",
            "costofservices",
        ],
    ),
    (Concept::GrossProfit, &["grossprofit"]),
    (
        Concept::OperatingIncome,
        &["operatingincomeloss", "operatingincome", "profitlossfromoperatingactivities"],
    ),
    (
        Concept::NetIncome,
        &[
            "netincomeloss",
            "netincome",
            "profitloss",
            "netincomelossavailabletocommonstockholdersbasic",
        ],
    ),
    (
        Concept::InterestExpense,
        &["interestexpense", "interestexpensedebt", "financecosts"],
    ),
    (Concept::TotalAssets, &["assets", "totalassets"]),
    (Concept::TotalLiabilities, &["liabilities", "totalliabilities"]),
    (
        Concept::StockholdersEquity,
        &[
            "stockholdersequity",
            "stockholdersequityincludingportionattributabletononcontrollinginterest",
            "equity",
            "equityattributabletoownersofparent",
        ],
    ),
    (
        Concept::LongTermDebt,
        &[
            "longtermdebtnoncurrent",
            "longtermdebt",
            "longtermborrowings",
            "noncurrentborrowings",
        ],
    ),
    (
        Concept::ShortTermDebt,
        &[
            "shorttermborrowings",
            "shorttermdebt",
            "longtermdebtcurrent",
            "debtcurrent",
            "commercialpaper",
            "currentborrowings",
        ],
    ),
    (Concept::CurrentAssets, &["assetscurrent", "currentassets"]),
    (
        Concept::CurrentLiabilities,
        &["liabilitiescurrent", "currentliabilities"],
    ),
    (
        Concept::CashAndEquivalents,
        &[
            "cashandcashequivalentsatcarryingvalue",
            "cashandcashequivalents",
            "cashcashequivalentsrestrictedcashandrestrictedcashequivalents",
        ],
    ),
    (
        Concept::AccountsReceivable,
        &[
            "accountsreceivablenetcurrent",
            "accountsreceivablenet",
            "tradeandothercurrentreceivables",
        ],
    ),
    (Concept::Inventory, &["inventorynet", "inventory", "inventories"]),
    (
        Concept::AccountsPayable,
        &[
            "accountspayablecurrent",
            "accountspayable",
            "tradeandothercurrentpayables",
        ],
    ),
    (
        Concept::SharesOutstanding,
        &[
            "commonstocksharesoutstanding",
            "entitycommonstocksharesoutstanding",
            "weightedaveragenumberofsharesoutstandingbasic",
        ],
    ),
    (
        Concept::OperatingCashFlow,
        &[
            "netcashprovidedbyusedinoperatingactivities",
            "netcashprovidedbyoperatingactivities",
            "cashflowsfromusedinoperatingactivities",
        ],
    ),
    (
        Concept::CapitalExpenditure,
        &[
            "paymentstoacquirepropertyplantandequipment",
            "capitalexpenditure",
            "purchaseofpropertyplantandequipment",
        ],
    ),
];

/// Candidate names per ratio concept and the ordered strategies used to match them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConceptConfig {
    pub candidates: BTreeMap<Concept, CandidateNameSet>,
    pub strategies: Vec<MatchStrategy>,
}

impl ConceptConfig {
    /// No candidates at all, with the default strategies.
    pub fn empty() -> Self {
        Self {
            candidates: BTreeMap::new(),
            strategies: EXACT_THEN_SUBSTRING.to_vec(),
        }
    }

    pub fn candidates(&self, concept: Concept) -> Option<&CandidateNameSet> {
        self.candidates.get(&concept).filter(|set| !set.is_empty())
    }

    pub fn with_candidates<I, S>(mut self, concept: Concept, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.candidates.insert(concept, CandidateNameSet::new(names));
        self
    }

    pub fn with_strategies(mut self, strategies: &[MatchStrategy]) -> Self {
        self.strategies = strategies.to_vec();
        self
    }

    /// Copies every concept this config has no entry for from `defaults`.
    pub fn fill_missing(&mut self, defaults: &ConceptConfig) {
        for concept in Concept::iter() {
            if self.candidates.contains_key(&concept) {
                continue;
            }
            if let Some(set) = defaults.candidates.get(&concept) {
                self.candidates.insert(concept, set.clone());
            }
        }
    }
}

impl Default for ConceptConfig {
    fn default() -> Self {
        let candidates = DEFAULT_CONCEPT_NAMES
            .iter()
            .map(|(concept, names)| (*concept, CandidateNameSet::new(names.iter())))
            .collect();
        Self {
            candidates,
            strategies: EXACT_THEN_SUBSTRING.to_vec(),
        }
    }
}

/// Heading patterns for one form type. Patterns are case-insensitive regexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingPatterns {
    pub start: Vec<String>,
    pub end: Vec<String>,
    #[serde(default)]
    pub structural_marker: Option<String>,
    /// Candidates after the last line-start match are dropped when an earlier
    /// candidate exists.
    #[serde(default)]
    pub cutoff_marker: Option<String>,
}

impl HeadingPatterns {
    fn new(start: &[&str], end: &[&str], structural_marker: Option<&str>) -> Self {
        Self {
            start: start.iter().map(|s| s.to_string()).collect(),
            end: end.iter().map(|s| s.to_string()).collect(),
            structural_marker: structural_marker.map(str::to_string),
            cutoff_marker: None,
        }
    }

    fn with_cutoff_marker(mut self, marker: &str) -> Self {
        self.cutoff_marker = Some(marker.to_string());
        self
    }

    pub fn annual_report() -> Self {
        Self::new(
            &[
                r"Item\s+7\s*[.:\-–—]?\s*Management['’]?s?\s+Discussion\s+and\s+Analysis",
                r"Item\s+7\b",
                r"Management['’]?s?\s+Discussion\s+and\s+Analysis\s+of\s+Financial",
            ],
            &[r"Item\s+7A\b", r"Item\s+8\b"],
            Some(r"Part\s+II\b"),
        )
    }

    pub fn quarterly_report() -> Self {
        Self::new(
            &[
                r"Item\s+2\s*[.:\-–—]?\s*Management['’]?s?\s+Discussion\s+and\s+Analysis",
                r"Item\s+2\b",
                r"Management['’]?s?\s+Discussion\s+and\s+Analysis\s+of\s+Financial",
            ],
            &[
                r"Item\s+3\b",
                r"Item\s+4\b",
                r"Item\s+5\b",
                r"Item\s+6\b",
                r"Part\s+II\b",
            ],
            None,
        )
        .with_cutoff_marker(r"Part\s+II\b")
    }

    pub fn foreign_annual_report() -> Self {
        Self::new(
            &[
                r"Item\s+5\s*[.:\-–—]?\s*Operating\s+and\s+Financial\s+Review",
                r"Item\s+5\b",
                r"Operating\s+and\s+Financial\s+Review\s+and\s+Prospects",
            ],
            &[r"Item\s+6\b"],
            None,
        )
    }
}

/// Pattern sets and tunables for the narrative section extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub annual_report: HeadingPatterns,
    pub quarterly_report: HeadingPatterns,
    pub foreign_annual_report: HeadingPatterns,
    /// Gap after a heading before an end marker is honoured.
    pub min_chars_before_end_marker: usize,
    /// Window after a heading inspected for table-of-contents structure.
    pub toc_window_chars: usize,
    /// Minimum span length for a candidate to be accepted outright.
    pub min_content_chars: usize,
}

impl NarrativeConfig {
    /// Unknown form types fall back to the annual report patterns.
    pub fn patterns_for(&self, form: &FormType) -> &HeadingPatterns {
        match form {
            FormType::Form10K | FormType::Other(_) => &self.annual_report,
            FormType::Form10Q => &self.quarterly_report,
            FormType::Form20F => &self.foreign_annual_report,
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            annual_report: HeadingPatterns::annual_report(),
            quarterly_report: HeadingPatterns::quarterly_report(),
            foreign_annual_report: HeadingPatterns::foreign_annual_report(),
            min_chars_before_end_marker: 800,
            toc_window_chars: 600,
            min_content_chars: 2000,
        }
    }
}
