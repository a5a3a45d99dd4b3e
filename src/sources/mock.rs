//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{Pull, Query, Record, RecordBuilder, ResultSet, SourceType};
use crate::sources::{Source, SourceError};

/// A mock source for testing that returns predefined records and/or an error.
#[derive(Debug)]
pub struct MockSource {
    source_type: SourceType,
    records: Mutex<Vec<Record>>,
    error: Mutex<Option<SourceError>>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock standing in for `source_type`.
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            records: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Records to return from every pull.
    pub fn with_records(self, records: Vec<Record>) -> Self {
        if let Ok(mut guard) = self.records.lock() {
            *guard = records;
        }
        self
    }

    /// Error to report after the records.
    pub fn with_error(self, error: SourceError) -> Self {
        if let Ok(mut guard) = self.error.lock() {
            *guard = Some(error);
        }
        self
    }

    /// Number of pulls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn pull(&self, query: &Query) -> Pull {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let records: ResultSet = self
            .records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        let records: ResultSet = match query.max_results.remaining(0) {
            Some(limit) => records.into_iter().take(limit).collect(),
            None => records,
        };

        match self.error.lock().ok().and_then(|e| e.clone()) {
            Some(error) => Pull::failed(self.source_type, records, error),
            None => Pull::complete(self.source_type, records),
        }
    }
}

/// Helper function to create a mock record for testing.
pub fn make_record(title: &str, doi: Option<&str>, pmcid: Option<&str>, source: SourceType) -> Record {
    RecordBuilder::new(source)
        .title(title.to_string())
        .doi(doi.map(str::to_string))
        .pmcid(pmcid.map(str::to_string))
        .build()
}
