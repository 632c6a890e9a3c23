pub mod config;

pub use config::{AnalysisConfig, ConceptConfig, DenominatorConfig, HeadingPatterns, NarrativeConfig};
