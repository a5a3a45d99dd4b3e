//! Multi-source retrieval: run each query against its adapter in turn, merge
//! the records in invocation order and drop cross-database duplicates.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::models::{MaxResults, Query, ResultSet, SourceType};
use crate::sources::{SourceError, SourceRegistry};

/// A source whose pull ended in an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: SourceType,
    #[serde(serialize_with = "serialize_error")]
    pub error: SourceError,
}

fn serialize_error<S: serde::Serializer>(error: &SourceError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pull failed: {}", self.source.name(), self.error)
    }
}

/// Merged outcome of an aggregated pull
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateResult {
    /// Deduplicated records, first occurrence first
    pub records: ResultSet,
    /// One entry per source whose pull failed
    pub failures: Vec<SourceFailure>,
    /// Records seen before deduplication
    pub retrieved: usize,
}

impl AggregateResult {
    /// Whether every source completed without error
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of records removed as duplicates
    pub fn duplicates_removed(&self) -> usize {
        self.retrieved.saturating_sub(self.records.len())
    }
}

/// Sequential multi-source puller
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
}

impl Aggregator {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run every query against the adapter it names, one after another
    ///
    /// A failing source never aborts the others: its partial records are kept
    /// and the error is reported in [`AggregateResult::failures`].
    pub async fn pull(&self, queries: &[Query]) -> AggregateResult {
        let mut merged = ResultSet::new();
        let mut failures = Vec::new();

        for query in queries {
            let source = match self.registry.get_required(query.source) {
                Ok(source) => source,
                Err(error) => {
                    tracing::warn!(source = query.source.id(), "skipping query: {}", error);
                    failures.push(SourceFailure {
                        source: query.source,
                        error,
                    });
                    continue;
                }
            };

            tracing::debug!(source = source.id(), "pulling");
            let pull = source.pull(query).await;
            merged.extend(pull.records);

            if let Some(error) = pull.error {
                failures.push(SourceFailure {
                    source: pull.source,
                    error,
                });
            }
        }

        let retrieved = merged.len();
        let records = merged.deduplicated();
        tracing::info!(
            retrieved,
            kept = records.len(),
            failures = failures.len(),
            "aggregated pull complete"
        );

        AggregateResult {
            records,
            failures,
            retrieved,
        }
    }

    /// Run the same query text against every registered source, in registration order
    pub async fn pull_all(&self, text: &str, max_results: MaxResults, years: Option<(u16, u16)>) -> AggregateResult {
        let queries: Vec<Query> = self
            .registry
            .all()
            .map(|source| {
                let query = Query::new(text, source.source_type()).bound(max_results);
                match years {
                    Some((from, to)) => query.years(from, to),
                    None => query,
                }
            })
            .collect();

        self.pull(&queries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_record;
    use crate::sources::MockSource;

    fn registry(sources: Vec<MockSource>) -> (Arc<SourceRegistry>, Vec<Arc<MockSource>>) {
        let mut registry = SourceRegistry::new();
        let handles: Vec<Arc<MockSource>> = sources.into_iter().map(Arc::new).collect();
        for handle in &handles {
            registry.register(handle.clone());
        }
        (Arc::new(registry), handles)
    }

    #[tokio::test]
    async fn test_concatenates_in_invocation_order_and_dedups() {
        let (registry, _) = registry(vec![
            MockSource::new(SourceType::EuropePmc).with_records(vec![
                make_record("A", Some("10.1/a"), None, SourceType::EuropePmc),
                make_record("B", None, Some("PMC2"), SourceType::EuropePmc),
            ]),
            MockSource::new(SourceType::PubMed).with_records(vec![
                make_record("A again", Some("https://doi.org/10.1/A"), None, SourceType::PubMed),
                make_record("C", None, None, SourceType::PubMed),
            ]),
            MockSource::new(SourceType::Pmc).with_records(vec![make_record(
                "B again",
                None,
                Some("2"),
                SourceType::Pmc,
            )]),
        ]);

        let aggregator = Aggregator::new(registry);
        let result = aggregator
            .pull(&[
                Query::new("q", SourceType::EuropePmc),
                Query::new("q", SourceType::PubMed),
                Query::new("q", SourceType::Pmc),
            ])
            .await;

        let titles: Vec<_> = result.records.iter().map(|r| r.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        assert_eq!(result.retrieved, 5);
        assert_eq!(result.duplicates_removed(), 2);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_partials_kept() {
        let (registry, handles) = registry(vec![
            MockSource::new(SourceType::EuropePmc)
                .with_records(vec![make_record("partial", Some("10.1/p"), None, SourceType::EuropePmc)])
                .with_error(SourceError::upstream(Some(500), "boom")),
            MockSource::new(SourceType::PubMed).with_records(
                (0..5)
                    .map(|i| make_record(&format!("P{}", i), Some(&format!("10.2/{}", i)), None, SourceType::PubMed))
                    .collect(),
            ),
        ]);

        let result = Aggregator::new(registry)
            .pull(&[Query::new("q", SourceType::EuropePmc), Query::new("q", SourceType::PubMed)])
            .await;

        assert_eq!(result.records.len(), 6);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(
            result.failures[0].to_string(),
            "Europe PMC pull failed: Upstream error (HTTP 500): boom"
        );
        assert!(handles.iter().all(|h| h.calls() == 1));
    }

    #[tokio::test]
    async fn test_unregistered_source_is_configuration_failure() {
        let (registry, _) = registry(vec![MockSource::new(SourceType::PubMed)]);

        let result = Aggregator::new(registry)
            .pull(&[Query::new("q", SourceType::Pmc), Query::new("q", SourceType::PubMed)])
            .await;

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].source, SourceType::Pmc);
        assert!(matches!(result.failures[0].error, SourceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_pull_all_applies_bound_to_every_source() {
        let many: Vec<_> = (0..10)
            .map(|i| make_record(&format!("R{}", i), None, None, SourceType::EuropePmc))
            .collect();
        let (registry, handles) = registry(vec![
            MockSource::new(SourceType::EuropePmc).with_records(many.clone()),
            MockSource::new(SourceType::PubMed).with_records(many),
        ]);

        let result = Aggregator::new(registry).pull_all("q", MaxResults::Limit(3), None).await;

        assert_eq!(result.records.len(), 6);
        assert!(handles.iter().all(|h| h.calls() == 1));
    }
}
