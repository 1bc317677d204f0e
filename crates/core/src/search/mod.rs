//! Search primitives: similarity, bounded top-K aggregation, equality
//! filtering and scored result types.

/// Exact-match attribute filters.
pub mod filter;
/// Cosine similarity with decimal rounding.
pub mod similarity;
/// Bounded min-heap keeping the K best candidates.
pub mod topk;
/// Scored records and search options.
pub mod types;

pub use filter::{matches_filter, Filter};
pub use similarity::{cosine_similarity, validate_query};
pub use topk::TopK;
pub use types::{ScoredRecord, SearchOptions};
