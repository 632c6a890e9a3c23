pub mod facts;
pub mod parsing;
pub mod report;

pub use facts::{statement_facts, StatementTags};
pub use report::FormType;
