pub mod section;
pub mod text;
pub mod types;

pub use section::{extract_mdna, extract_mdna_from_html, extract_section, try_extract_section};
pub use text::{clean_section_text, flatten_html, normalize_text};
pub use types::{Candidate, CandidateStatus, NarrativeSection};
