//! Query engine
//!
//! - [`Predicate`]: conjunction of field comparisons
//! - [`parse_query`]: `SELECT * FROM c WHERE ...` text into a predicate
//! - [`QueryFeed`]: lazy, paged, cost-reporting result sequence

mod feed;
mod parser;
mod predicate;

pub(crate) use feed::QueryContext;
pub use feed::{QueryFeed, QueryOptions, QueryPage, QueryScope, ScanStats};
pub use parser::parse_query;
pub use predicate::{compare_values, CompareOp, Comparison, Predicate};
