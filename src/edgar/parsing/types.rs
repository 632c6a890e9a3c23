use serde::{Deserialize, Serialize};

use crate::edgar::report::FormType;

/// An extracted narrative section. Offsets are byte offsets into the flattened text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub form_type: FormType,
    pub start_offset: usize,
    pub end_offset: usize,
    pub raw_text: String,
    pub cleaned_text: String,
}

impl NarrativeSection {
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned_text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Long enough to be the section body.
    Accepted,
    BelowThreshold,
    /// Looks like a table-of-contents entry.
    TableOfContents,
}

/// A heading occurrence and the span it would produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub status: CandidateStatus,
}

impl Candidate {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
