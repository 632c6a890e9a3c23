use serde::{Deserialize, Serialize};

/// Case-folds and strips whitespace, hyphens and underscores.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered set of normalized metric names accepted as a proxy for one concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CandidateNameSet {
    names: Vec<String>,
}

impl CandidateNameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for name in names {
            set.insert(name);
        }
        set
    }

    /// Adds a name (normalized). Returns false if it was already present or blank.
    pub fn insert<S: AsRef<str>>(&mut self, name: S) -> bool {
        let normalized = normalize_name(name.as_ref());
        if normalized.is_empty() || self.names.contains(&normalized) {
            return false;
        }
        self.names.push(normalized);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        let normalized = normalize_name(name);
        self.names.iter().any(|n| *n == normalized)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<String>> for CandidateNameSet {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<CandidateNameSet> for Vec<String> {
    fn from(set: CandidateNameSet) -> Self {
        set.names
    }
}

/// One way of comparing a normalized candidate name with a normalized column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    /// Either name contains the other.
    Substring,
}

impl MatchStrategy {
    pub fn matches(self, candidate: &str, column: &str) -> bool {
        match self {
            MatchStrategy::Exact => candidate == column,
            MatchStrategy::Substring => {
                !candidate.is_empty()
                    && !column.is_empty()
                    && (column.contains(candidate) || candidate.contains(column))
            }
        }
    }
}

pub const EXACT_ONLY: &[MatchStrategy] = &[MatchStrategy::Exact];
pub const EXACT_THEN_SUBSTRING: &[MatchStrategy] = &[MatchStrategy::Exact, MatchStrategy::Substring];

/// Tries each strategy in order.
///
/// Exact matching takes the first column (in table order) equal to any
/// candidate. Looser strategies walk the candidates in their configured order
/// and take the first column matching each one, so a preferred name is never
/// beaten by an earlier column that merely contains a weaker one.
pub fn resolve_column<'a, S: AsRef<str>>(
    columns: &'a [S],
    candidates: &CandidateNameSet,
    strategies: &[MatchStrategy],
) -> Option<&'a str> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize_name(c.as_ref())).collect();
    let first_match = |candidate: &str, strategy: MatchStrategy| -> Option<&'a str> {
        columns
            .iter()
            .zip(&normalized)
            .find(|(_, column)| strategy.matches(candidate, column))
            .map(|(original, _)| original.as_ref())
    };
    strategies.iter().find_map(|&strategy| match strategy {
        MatchStrategy::Exact => columns
            .iter()
            .zip(&normalized)
            .find(|(_, column)| candidates.iter().any(|c| strategy.matches(c, column)))
            .map(|(original, _)| original.as_ref()),
        MatchStrategy::Substring => candidates.iter().find_map(|c| first_match(c, strategy)),
    })
}

/// Common-size denominator: exact normalized match only, first column wins.
pub fn resolve_denominator<'a, S: AsRef<str>>(
    columns: &'a [S],
    candidates: &CandidateNameSet,
) -> Option<&'a str> {
    resolve_column(columns, candidates, EXACT_ONLY)
}
