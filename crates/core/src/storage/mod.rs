//! Storage layer: in-memory index, external object stores, streaming search,
//! and graph persistence.
//!
//! Records either live in memory in an [`EmbeddingIndex`] or in an
//! [`ObjectStore`] that is scanned batch by batch with [`search_store`].
//! [`LogStore`] is the file-backed store (CRC32 + fsync per batch);
//! [`MemoryStore`] keeps records in process. Graph indexes are saved as
//! checksummed bincode files (atomic temp-file + rename).

/// Exact in-memory index.
pub mod index;
/// Append-only file store with CRC32 framing.
pub mod log_store;
/// Graph index encoding and file save/load.
pub mod persistence;
/// Object store and cursor traits, plus the in-memory store.
pub mod store;
/// Batched similarity search over an object store.
pub mod streaming;

pub use index::EmbeddingIndex;
pub use log_store::LogStore;
pub use persistence::{decode_index, encode_index, load_all_indexes, load_index, save_index};
pub use store::{MemoryStore, ObjectStore, RecordCursor};
pub use streaming::search_store;
