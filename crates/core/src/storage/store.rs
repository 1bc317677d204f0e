//! External object store contract and an in-memory reference store.
//!
//! Search only needs three things from a backing store: atomic appends, a
//! forward-only cursor that yields every stored record exactly once in a stable
//! order, and whole-container deletion. [`ObjectStore`] and [`RecordCursor`]
//! capture exactly that; the on-disk format is left to the implementation.

use crate::error::Result;
use crate::record::Record;
use parking_lot::RwLock;
use std::sync::Arc;

/// Sequential, finite, forward-only read over a store.
///
/// A cursor is not restartable; open a new one to scan again.
pub trait RecordCursor {
    /// Returns up to `max` records. An empty batch means the scan is exhausted.
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>>;

    /// Transaction completion signal, checked once the cursor is exhausted.
    ///
    /// An error here means the scan cannot be trusted and its results must be
    /// discarded.
    fn complete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Append/scan/delete contract consumed by streaming search and index
/// persistence.
pub trait ObjectStore {
    /// Appends a single record.
    fn add(&self, record: Record) -> Result<()> {
        self.add_batch(std::slice::from_ref(&record))
    }

    /// Appends all records as one atomic unit: either every record becomes
    /// visible to later cursors or none does.
    fn add_batch(&self, records: &[Record]) -> Result<()>;

    /// Opens a cursor over every stored record.
    fn cursor(&self) -> Result<Box<dyn RecordCursor + '_>>;

    /// Deletes every record in the container.
    fn delete_all(&self) -> Result<()>;
}

/// Thread-safe in-memory store.
///
/// Cursors iterate a snapshot taken when they are opened, so concurrent
/// appends never show up half-way through a scan.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Arc<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn add_batch(&self, records: &[Record]) -> Result<()> {
        let mut stored = self.records.write();
        stored.extend(records.iter().cloned().map(Arc::new));
        Ok(())
    }

    fn cursor(&self) -> Result<Box<dyn RecordCursor + '_>> {
        Ok(Box::new(MemoryCursor {
            snapshot: self.records.read().clone(),
            position: 0,
        }))
    }

    fn delete_all(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }
}

struct MemoryCursor {
    snapshot: Vec<Arc<Record>>,
    position: usize,
}

impl RecordCursor for MemoryCursor {
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>> {
        let end = (self.position + max.max(1)).min(self.snapshot.len());
        let batch = self.snapshot[self.position..end]
            .iter()
            .map(|r| Record::clone(r))
            .collect();
        self.position = end;
        Ok(batch)
    }
}
