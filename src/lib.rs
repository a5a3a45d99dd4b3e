//! # Research Retriever
//!
//! Paginated, rate-limited retrieval of bibliographic records from Europe PMC,
//! PubMed and PubMed Central, with cross-database deduplication and export to
//! CSV, Excel and RIS.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Record, Query, ResultSet, Pull)
//! - [`sources`]: Source adapters with an extensible trait-based architecture
//! - [`aggregator`]: Sequential multi-source pulls with deduplication
//! - [`export`]: CSV, XLSX and RIS rendering
//! - [`query`]: Boolean search-string construction
//! - [`utils`]: HTTP client, paginator, throttle, deduplication and logging
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use research_retriever::{export, get_config, Aggregator, ExportFormat, MaxResults, SearchStrategy, SourceRegistry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::from_config(&get_config())?;
//! let strategy = SearchStrategy::new()
//!     .concept("surgical site infection", "wound infection")
//!     .years(2015, 2020);
//!
//! let result = Aggregator::new(Arc::new(registry))
//!     .pull(&strategy.queries(MaxResults::Limit(100)))
//!     .await;
//! for failure in &result.failures {
//!     eprintln!("{}", failure);
//! }
//!
//! let payload = export(&result.records, ExportFormat::Ris)?;
//! std::fs::write(payload.file_name("results"), payload.bytes)?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod export;
pub mod models;
pub mod query;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{AggregateResult, Aggregator, SourceFailure};
pub use config::{get_config, load_config, Config};
pub use export::{export, ExportError, ExportFormat, ExportPayload};
pub use models::{MaxResults, OpenAccess, Pull, Query, Record, ResultSet, SourceType};
pub use query::SearchStrategy;
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
