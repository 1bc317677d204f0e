//! # vecindex-core
//!
//! Embeddable vector similarity search over records carrying an `embedding`
//! attribute: exact top-K cosine search in memory, bounded-memory streaming
//! search over an external object store, and an HNSW-style multi-layer graph
//! index for approximate nearest neighbors.
//!
//! This is a synchronous library crate with no async runtime dependency. The
//! embedding model and the persistent store are collaborators supplied through
//! the [`embed::Embedder`] and [`storage::ObjectStore`] traits.

/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Text embedding trait, options, cache, and context.
pub mod embed;
/// Error type shared by every operation.
pub mod error;
/// HNSW-style graph index: structure, insertion, search, and distance.
pub mod hnsw;
/// Core record types: `Record` and `MetadataValue`.
pub mod record;
/// Search primitives: cosine similarity, bounded top-K, filters, and result types.
pub mod search;
/// Storage layer: in-memory index, object stores, streaming search, and graph persistence.
pub mod storage;

pub use embed::{EmbedOptions, Embedder, EmbeddingCache, EmbeddingContext, Pooling};
pub use error::{Result, SearchError};
pub use hnsw::{HnswConfig, HnswIndex};
pub use record::{MetadataValue, Record};
pub use search::{cosine_similarity, Filter, ScoredRecord, SearchOptions, TopK};
pub use storage::{search_store, EmbeddingIndex, LogStore, MemoryStore, ObjectStore, RecordCursor};
