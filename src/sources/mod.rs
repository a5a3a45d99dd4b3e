//! Bibliographic source adapters with a shared trait-based architecture.
//!
//! This module defines the [`Source`] trait that every adapter implements.
//! Adapters are registered, in query order, with a [`SourceRegistry`].
//!
//! # Feature Flags
//!
//! Individual sources can be disabled at compile time using Cargo features:
//!
//! - `europe_pmc` - Enable Europe PMC source (default: enabled)
//! - `pubmed` - Enable PubMed source (default: enabled)
//! - `pmc` - Enable PubMed Central source (default: enabled)
//!
//! # Pagination
//!
//! | Source     | Discipline                          | Page/batch size      |
//! |------------|-------------------------------------|----------------------|
//! | Europe PMC | cursor (`cursorMark`, starts `*`)   | up to 1000           |
//! | PubMed     | esearch history + offset `efetch`   | configurable (200)   |
//! | PMC        | esearch history + offset `esummary` | configurable (200)   |

#[cfg(feature = "source-europe_pmc")]
mod europe_pmc;
#[cfg(any(feature = "source-pubmed", feature = "source-pmc"))]
mod eutils;
#[cfg(feature = "source-pmc")]
mod pmc;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;

pub mod mock;

#[cfg(feature = "source-europe_pmc")]
pub use europe_pmc::EuropePmcSource;
#[cfg(any(feature = "source-pubmed", feature = "source-pmc"))]
pub use eutils::{EutilsClient, SearchHistory};
pub use mock::MockSource;
#[cfg(feature = "source-pmc")]
pub use pmc::PmcSource;
#[cfg(feature = "source-pubmed")]
pub use pubmed::PubMedSource;
pub use registry::SourceRegistry;

use crate::models::{Pull, Query, ResultSet, SourceType};
use async_trait::async_trait;
use futures_util::{pin_mut, Stream, StreamExt};

/// The Source trait defines the interface for all bibliographic source adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct holding its configuration and HTTP client
/// 2. Drive a [`crate::utils::Paginator`] in `pull`, mapping raw hits into records
/// 3. Register it with [`SourceRegistry::register`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// The database this adapter talks to
    fn source_type(&self) -> SourceType;

    /// Unique identifier for this source (e.g., "europe_pmc", "pubmed")
    fn id(&self) -> &str {
        self.source_type().id()
    }

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.source_type().name()
    }

    /// Retrieve every record for `query`, up to its bound
    ///
    /// Never fails outright: a pull interrupted by an upstream error returns
    /// the records retrieved so far together with the error.
    async fn pull(&self, query: &Query) -> Pull;

    /// Retrieve records, discarding partial results on failure
    async fn search(&self, query: &Query) -> Result<ResultSet, SourceError> {
        self.pull(query).await.into_result()
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Non-success status, transport failure, timeout or unparseable payload
    #[error("{}", upstream_message(.status, .message))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Missing or invalid configuration, detected before any request
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Upstream error (HTTP {}): {}", status, message),
        None => format!("Upstream error: {}", message),
    }
}

impl SourceError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        SourceError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by an upstream error
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Upstream { status, .. } => *status,
            SourceError::Configuration(_) => None,
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, SourceError::Upstream { .. })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::upstream(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::upstream(None, format!("Malformed JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::upstream(None, format!("Malformed XML: {}", err))
    }
}

/// Drain a stream of raw hits into a [`Pull`], mapping each hit on the way
///
/// Records mapped before an error are kept in the returned pull.
pub(crate) async fn drain_hits<T, S, M>(source: SourceType, hits: S, map: M) -> Pull
where
    S: Stream<Item = Result<T, SourceError>>,
    M: Fn(T) -> crate::models::Record,
{
    pin_mut!(hits);
    let mut records = ResultSet::new();

    while let Some(hit) = hits.next().await {
        match hit {
            Ok(hit) => records.push(map(hit)),
            Err(error) => {
                tracing::warn!(
                    source = source.id(),
                    retrieved = records.len(),
                    "pull aborted: {}",
                    error
                );
                return Pull::failed(source, records, error);
            }
        }
    }

    tracing::info!(source = source.id(), retrieved = records.len(), "pull complete");
    Pull::complete(source, records)
}

/// Lenient decoders for loosely typed JSON fields
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a string, number or boolean as text; anything else is absent
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Accept a number or a numeric string
    pub fn usize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Decode `T`, falling back to its default when the shape is wrong
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_display() {
        let err = SourceError::upstream(Some(500), "boom");
        assert_eq!(err.to_string(), "Upstream error (HTTP 500): boom");
        assert_eq!(err.status(), Some(500));

        let timeout = SourceError::upstream(None, "timed out");
        assert_eq!(timeout.to_string(), "Upstream error: timed out");
        assert!(timeout.is_upstream());
    }

    #[test]
    fn test_lenient_string() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "lenient::string")]
            year: Option<String>,
        }

        let numeric: Probe = serde_json::from_str(r#"{"year": 2021}"#).unwrap();
        assert_eq!(numeric.year.as_deref(), Some("2021"));
        let text: Probe = serde_json::from_str(r#"{"year": "2021"}"#).unwrap();
        assert_eq!(text.year.as_deref(), Some("2021"));
        let odd: Probe = serde_json::from_str(r#"{"year": [1]}"#).unwrap();
        assert_eq!(odd.year, None);
        let missing: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.year, None);
    }
}
