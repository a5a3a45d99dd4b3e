//! Core data models for bibliographic records and queries.

mod query;
mod record;
mod result;

pub use query::{MaxResults, Query, YearRange};
pub use record::{OpenAccess, Record, RecordBuilder, SourceType};
pub use result::{Pull, ResultSet};
