pub mod analysis;
pub mod core;
pub mod edgar;

// Re-exports
pub use crate::analysis::{analyze_company, CompanyAnalysis, Fact, StatementFacts, WideTable};
pub use crate::core::config::AnalysisConfig;
pub use crate::edgar::parsing::{extract_mdna, extract_mdna_from_html, NarrativeSection};
