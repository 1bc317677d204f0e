//! Similarity search streamed over an external store.
//!
//! Records are pulled through a cursor in batches and scored one at a time, so
//! memory stays bounded by the batch size plus the `top_k` result heap no
//! matter how large the store is.

use crate::config;
use crate::error::Result;
use crate::record::Record;
use crate::search::{cosine_similarity, validate_query, ScoredRecord, SearchOptions, TopK};
use crate::storage::store::ObjectStore;
use ordered_float::OrderedFloat;
use std::sync::Arc;

/// Top-`k` records from `store` by cosine similarity to `query`.
///
/// Only records matching `options.filter` are scored. Results are ordered by
/// similarity descending; ties come out in no particular order. A query with
/// NaN components is rejected before the store is touched. Any cursor,
/// validation or dimension error aborts the search and discards partial
/// results. An empty store, or a `top_k` of zero, yields an empty result.
pub fn search_store<S>(
    store: &S,
    query: &[f32],
    options: &SearchOptions,
) -> Result<Vec<ScoredRecord>>
where
    S: ObjectStore + ?Sized,
{
    validate_query(query)?;
    let batch_size = options.batch_size.clamp(1, config::MAX_BATCH_SIZE);
    let mut cursor = store.cursor()?;
    let mut top: TopK<Record, OrderedFloat<f64>> = TopK::new(options.top_k);
    let mut scanned = 0usize;
    let mut scored = 0usize;

    loop {
        let batch = cursor.next_batch(batch_size)?;
        if batch.is_empty() {
            break;
        }
        scanned += batch.len();
        for record in batch {
            if !options.filter.matches(&record) {
                continue;
            }
            let embedding = record.validated_embedding()?;
            let similarity = cosine_similarity(query, embedding, options.precision)?;
            scored += 1;
            top.offer(OrderedFloat(similarity), record);
        }
    }
    cursor.complete()?;

    tracing::debug!(
        scanned,
        scored,
        returned = top.len(),
        batch_size,
        "streaming search done"
    );
    Ok(top
        .into_sorted_vec()
        .into_iter()
        .map(|(OrderedFloat(similarity), record)| ScoredRecord {
            similarity,
            record: Arc::new(record),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::record::MetadataValue;
    use crate::search::Filter;
    use crate::storage::store::{MemoryStore, RecordCursor};

    fn store_with(records: Vec<Record>) -> MemoryStore {
        let store = MemoryStore::new();
        store.add_batch(&records).unwrap();
        store
    }

    #[test]
    fn test_top_k_over_many_batches() {
        let records: Vec<Record> = (0..25)
            .map(|i| Record::with_embedding(vec![1.0, i as f32 / 10.0]).with("id", i as i64))
            .collect();
        let store = store_with(records);
        let options = SearchOptions::default().with_top_k(3).with_batch_size(4);
        let results = search_store(&store, &[1.0, 0.0], &options).unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.record.get("id").cloned()).collect();
        assert_eq!(ids, [0, 1, 2].map(|i| Some(MetadataValue::Integer(i))));
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_filter_applied_before_scoring() {
        let store = store_with(vec![
            Record::with_embedding(vec![1.0, 0.0]).with("kind", "a"),
            Record::with_embedding(vec![0.0, 1.0]).with("kind", "b"),
            // Filtered out, so its bad dimension is never compared.
            Record::with_embedding(vec![1.0]).with("kind", "c"),
        ]);
        let options = SearchOptions::default().with_filter(Filter::new().eq("kind", "b"));
        let results = search_store(&store, &[1.0, 0.0], &options).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity, 0.0);
    }

    #[test]
    fn test_empty_store_and_zero_k() {
        let store = MemoryStore::new();
        assert!(search_store(&store, &[1.0], &SearchOptions::default())
            .unwrap()
            .is_empty());

        let store = store_with(vec![Record::with_embedding(vec![1.0])]);
        let options = SearchOptions::default().with_top_k(0);
        assert!(search_store(&store, &[1.0], &options).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_aborts() {
        let store = store_with(vec![Record::with_embedding(vec![1.0, 2.0, 3.0])]);
        let err = search_store(&store, &[1.0, 2.0], &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, SearchError::LengthMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn test_nan_query_rejected() {
        let store = store_with(vec![
            Record::with_embedding(vec![1.0, 0.0]),
            Record::with_embedding(vec![0.0, 1.0]),
        ]);
        let err = search_store(&store, &[f32::NAN, 1.0], &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    /// Yields one good batch, then fails.
    struct BrokenCursor {
        served: bool,
    }

    impl RecordCursor for BrokenCursor {
        fn next_batch(&mut self, _max: usize) -> Result<Vec<Record>> {
            if self.served {
                return Err(SearchError::StorageOperation("cursor read failed".into()));
            }
            self.served = true;
            Ok(vec![Record::with_embedding(vec![1.0, 0.0])])
        }
    }

    struct BrokenStore;

    impl ObjectStore for BrokenStore {
        fn add_batch(&self, _records: &[Record]) -> Result<()> {
            Ok(())
        }

        fn cursor(&self) -> Result<Box<dyn RecordCursor + '_>> {
            Ok(Box::new(BrokenCursor { served: false }))
        }

        fn delete_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cursor_error_mid_scan_discards_results() {
        let err = search_store(&BrokenStore, &[1.0, 0.0], &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, SearchError::StorageOperation(_)), "{err}");
    }

    struct FailingStore;

    struct FailingCursor;

    impl RecordCursor for FailingCursor {
        fn next_batch(&mut self, _max: usize) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }

        fn complete(&mut self) -> Result<()> {
            Err(SearchError::StorageOperation("transaction aborted".into()))
        }
    }

    impl ObjectStore for FailingStore {
        fn add_batch(&self, _records: &[Record]) -> Result<()> {
            Ok(())
        }

        fn cursor(&self) -> Result<Box<dyn RecordCursor + '_>> {
            Ok(Box::new(FailingCursor))
        }

        fn delete_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_transaction_discards_results() {
        let err = search_store(&FailingStore, &[1.0], &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, SearchError::StorageOperation(_)));
    }
}
