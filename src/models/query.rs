//! Query models for a single-source pull.

use serde::{Deserialize, Serialize};

use super::SourceType;

/// Upper bound on how many records a pull may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxResults {
    /// Stop after this many records
    Limit(usize),
    /// Page until the source signals exhaustion
    #[default]
    Unbounded,
}

impl MaxResults {
    /// How many more records may be taken after `taken`, `None` when unbounded
    pub fn remaining(&self, taken: usize) -> Option<usize> {
        match self {
            MaxResults::Limit(limit) => Some(limit.saturating_sub(taken)),
            MaxResults::Unbounded => None,
        }
    }

    /// Whether `taken` records exhaust the bound
    pub fn is_reached(&self, taken: usize) -> bool {
        self.remaining(taken) == Some(0)
    }
}

impl From<usize> for MaxResults {
    fn from(limit: usize) -> Self {
        MaxResults::Limit(limit)
    }
}

impl From<Option<usize>> for MaxResults {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(MaxResults::Unbounded, MaxResults::Limit)
    }
}

/// Inclusive publication-year range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: u16,
    pub to: u16,
}

impl YearRange {
    pub fn new(from: u16, to: u16) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }
}

/// An already formatted search string aimed at one source
///
/// The query text is opaque: it is forwarded to the source unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Search string in the source's syntax
    pub text: String,

    /// Source the query is aimed at
    pub source: SourceType,

    /// Maximum number of records to retrieve
    pub max_results: MaxResults,

    /// Optional publication-year restriction
    pub years: Option<YearRange>,
}

impl Query {
    /// Create an unbounded query
    pub fn new(text: impl Into<String>, source: SourceType) -> Self {
        Self {
            text: text.into(),
            source,
            max_results: MaxResults::Unbounded,
            years: None,
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = MaxResults::Limit(max);
        self
    }

    /// Set the result bound directly
    pub fn bound(mut self, max: MaxResults) -> Self {
        self.max_results = max;
        self
    }

    /// Restrict to a publication-year range
    pub fn years(mut self, from: u16, to: u16) -> Self {
        self.years = Some(YearRange::new(from, to));
        self
    }

    /// The same query aimed at another source
    pub fn for_source(&self, source: SourceType) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}
