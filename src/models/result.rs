//! Result collections produced by pulls.

use serde::{Deserialize, Serialize};

use super::{Record, SourceType};
use crate::sources::SourceError;

/// Ordered collection of records, in retrieval order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Drop records duplicating an earlier one by DOI or PMCID
    pub fn deduplicated(self) -> Self {
        Self {
            records: crate::utils::deduplicate_records(self.records),
        }
    }
}

impl From<Vec<Record>> for ResultSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl Extend<Record> for ResultSet {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Outcome of one source's pull
///
/// A pull that fails part-way keeps the records fetched before the failure.
#[derive(Debug, Clone)]
pub struct Pull {
    /// Source that was queried
    pub source: SourceType,

    /// Records retrieved, possibly partial when `error` is set
    pub records: ResultSet,

    /// Error that stopped the pull early
    pub error: Option<SourceError>,
}

impl Pull {
    pub fn complete(source: SourceType, records: ResultSet) -> Self {
        Self {
            source,
            records,
            error: None,
        }
    }

    pub fn failed(source: SourceType, records: ResultSet, error: SourceError) -> Self {
        Self {
            source,
            records,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Discard partial records on failure
    pub fn into_result(self) -> Result<ResultSet, SourceError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.records),
        }
    }
}
