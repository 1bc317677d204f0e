//! Scored result and search option types.

use crate::config;
use crate::record::Record;
use crate::search::filter::Filter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A record with its cosine similarity to the query.
///
/// Returned by exact in-memory search and by streaming store search, sorted
/// by descending similarity.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    /// Cosine similarity, rounded to the requested precision.
    pub similarity: f64,
    /// The matched record (shared reference).
    pub record: Arc<Record>,
}

/// Options for exact and streaming search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Records must match this filter to be ranked.
    #[serde(default)]
    pub filter: Filter,
    /// Records pulled per cursor batch (streaming search only).
    pub batch_size: usize,
    /// Decimal digits kept by the similarity score.
    pub precision: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: config::DEFAULT_TOP_K,
            filter: Filter::default(),
            batch_size: config::DEFAULT_BATCH_SIZE,
            precision: config::DEFAULT_PRECISION,
        }
    }
}

impl SearchOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
}
