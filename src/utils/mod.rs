//! Utility modules supporting retrieval.
//!
//! - [`Paginator`]: lazy cursor/offset walk over one search endpoint
//! - [`Throttle`]: minimum spacing between requests to one API
//! - [`HttpClient`]: HTTP client with timeout and error mapping
//! - [`deduplicate_records`]: remove records duplicating an earlier DOI or PMCID
//! - [`init_logging`]: install a `tracing` subscriber
//!
//! # Deduplication
//!
//! ```rust
//! use research_retriever::utils::deduplicate_records;
//! use research_retriever::models::Record;
//!
//! # fn example(records: Vec<Record>) {
//! let unique = deduplicate_records(records);
//! # }
//! ```

mod dedup;
mod http;
mod logging;
pub mod paginator;
pub mod text;
mod throttle;

pub use dedup::{deduplicate_records, find_duplicates, normalize_doi, normalize_pmcid};
pub use http::HttpClient;
pub use logging::init_logging;
pub use paginator::{Page, Pagination, Paginator};
pub use throttle::Throttle;
