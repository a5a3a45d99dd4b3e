//! Registry for managing source adapters.

use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;
use crate::models::SourceType;
#[cfg(any(feature = "source-pubmed", feature = "source-pmc"))]
use crate::utils::HttpClient;

/// Ordered registry of source adapters
///
/// Registration order is query order: an aggregated pull walks the sources
/// in the order they were registered.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every compiled-in source, configured from `config`
    ///
    /// Fails with [`SourceError::Configuration`] when an E-utilities source is
    /// enabled but the contact email or tool name is missing.
    #[allow(unused_variables)]
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "source-europe_pmc")]
        registry.register(Arc::new(super::EuropePmcSource::new(config)?));
        // PubMed and PMC share one client so NCBI sees a single request rate
        #[cfg(any(feature = "source-pubmed", feature = "source-pmc"))]
        let eutils = super::EutilsClient::new(HttpClient::from_config(&config.http)?, config)?;
        #[cfg(feature = "source-pubmed")]
        registry.register(Arc::new(super::PubMedSource::with_eutils(eutils.clone())));
        #[cfg(feature = "source-pmc")]
        registry.register(Arc::new(super::PmcSource::with_eutils(
            eutils,
            config.eutils.pmc_fetch_mode,
        )));

        Ok(registry)
    }

    /// Register a source, replacing any adapter already registered for the same database
    pub fn register(&mut self, source: Arc<dyn Source>) {
        let kind = source.source_type();
        match self.sources.iter().position(|s| s.source_type() == kind) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by type
    pub fn get(&self, source: SourceType) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.source_type() == source)
    }

    /// Get a source by type, returning an error if not registered
    pub fn get_required(&self, source: SourceType) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(source).ok_or_else(|| {
            SourceError::Configuration(format!("No adapter registered for {}", source.name()))
        })
    }

    /// Get all registered sources, in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs, in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Check if a source is registered
    pub fn has(&self, source: SourceType) -> bool {
        self.get(source).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
