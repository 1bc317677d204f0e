//! Global configuration constants for vecindex.
//!
//! All tuning parameters, default search options and on-disk format markers are
//! defined here. These are compile-time constants; runtime configuration is
//! carried by [`HnswConfig`](crate::hnsw::HnswConfig),
//! [`SearchOptions`](crate::search::SearchOptions) and
//! [`EmbedOptions`](crate::embed::EmbedOptions).

/// Name of the record attribute that holds the embedding vector.
pub const EMBEDDING_FIELD: &str = "embedding";

/// Default number of results returned by exact and streaming search.
pub const DEFAULT_TOP_K: usize = 3;

/// Default number of decimal digits kept by cosine similarity.
pub const DEFAULT_PRECISION: usize = 6;

/// Default number of records pulled from a store cursor per batch.
///
/// Bounds peak memory while deserializing records during a streaming scan.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Upper bound on a single cursor batch. Larger requests are clamped.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Default number of layers in the graph index.
pub const HNSW_DEFAULT_LAYERS: usize = 5;

/// Level multiplier `mL` for layer assignment.
///
/// A vector is assigned level `floor(-ln(uniform) * mL)`, capped at `layers - 1`.
pub const HNSW_DEFAULT_LEVEL_MULTIPLIER: f64 = 0.62;

/// Default exploration factor used while inserting into the graph index.
///
/// Every inserted node is connected to up to this many neighbors per layer.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 10;

/// Default exploration factor used by graph search.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 1;

/// Magic bytes written before the CRC32 footer of an encoded graph index.
pub const GRAPH_CRC_MAGIC: &[u8; 4] = b"VHG1";

/// File extension of graph index snapshots.
pub const GRAPH_FILE_EXTENSION: &str = "vhg";

/// File extension of append-only record stores.
pub const LOG_STORE_EXTENSION: &str = "vlog";
