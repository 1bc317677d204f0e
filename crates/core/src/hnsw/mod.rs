//! Multi-layer proximity graph (HNSW-style) for approximate nearest neighbor search.
//!
//! The index is a fixed number of layers ordered top to bottom. Every inserted
//! vector has a node in the bottom layer; a vector drawn at level `l` also has
//! nodes in the `l` layers above it, so upper layers are exponentially sparser
//! and act as express lanes for the descent. Each layer is an append-only
//! arena: nodes are addressed by position and linked downward to their copy in
//! the next layer.
//!
//! The graph is append-only. There is no delete or update operation, and none
//! should be bolted on without first defining how edges to a removed node are
//! repaired.

/// Euclidean distance used to order graph candidates.
pub mod distance;
/// Graph structure, configuration and structural validation.
pub mod graph;
/// Insertion with level assignment and bidirectional connections.
pub mod insert;
/// Single-layer beam search and multi-layer descent.
pub mod search;
/// Generation-based visited set for layer traversal.
pub mod visited;

pub use distance::euclidean_distance;
pub use graph::{HnswConfig, HnswIndex, Layer, LayerNode};
pub use search::search_layer;
