//! In-memory record collection with exact cosine search.
//!
//! [`EmbeddingIndex`] keeps records in insertion order and answers queries by
//! scoring every filter-matching record. The first record added fixes two
//! things for the life of the index (until [`clear`](EmbeddingIndex::clear)):
//! the embedding dimension and the schema, i.e. the attribute names every
//! later record must also carry.

use crate::error::{Result, SearchError};
use crate::record::Record;
use crate::search::{cosine_similarity, validate_query, Filter, ScoredRecord, SearchOptions};
use crate::storage::store::ObjectStore;
use std::sync::Arc;

/// Ordered, validated collection of records.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    records: Vec<Arc<Record>>,
    /// Attribute names of the first record.
    schema: Vec<String>,
    dimension: Option<usize>,
}

impl EmbeddingIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from initial records, validating each in order.
    ///
    /// Fails on the first invalid record; nothing is kept in that case.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut index = Self::new();
        for record in records {
            index.add(record)?;
        }
        Ok(index)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimension, fixed by the first record.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Attribute names required on every record.
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    /// Drops every record and forgets the schema and dimension.
    pub fn clear(&mut self) {
        self.records.clear();
        self.schema.clear();
        self.dimension = None;
    }

    /// Validates and appends a record.
    pub fn add(&mut self, record: Record) -> Result<()> {
        let embedding_len = self.validate(&record)?;
        if self.records.is_empty() && self.dimension.is_none() {
            self.schema = record.keys().map(str::to_string).collect();
            self.dimension = Some(embedding_len);
        }
        self.records.push(Arc::new(record));
        Ok(())
    }

    /// Replaces the first record matching `filter`, keeping its position.
    ///
    /// The replacement is validated like an added record. Fails with
    /// [`SearchError::NotFound`] if nothing matches.
    pub fn update(&mut self, filter: &Filter, record: Record) -> Result<()> {
        let position = self.position(filter)?;
        self.validate(&record)?;
        self.records[position] = Arc::new(record);
        Ok(())
    }

    /// Removes and returns the first record matching `filter`.
    pub fn remove(&mut self, filter: &Filter) -> Result<Arc<Record>> {
        let position = self.position(filter)?;
        Ok(self.records.remove(position))
    }

    /// Removes the first match of each filter in turn and returns how many
    /// records were removed.
    ///
    /// Filters matching nothing are skipped without error.
    pub fn remove_batch(&mut self, filters: &[Filter]) -> usize {
        let mut removed = 0;
        for filter in filters {
            if let Some(position) = self.records.iter().position(|r| filter.matches(r)) {
                self.records.remove(position);
                removed += 1;
            }
        }
        tracing::debug!(requested = filters.len(), removed, "batch remove");
        removed
    }

    /// First record matching `filter`.
    pub fn get(&self, filter: &Filter) -> Result<Arc<Record>> {
        self.find(filter).ok_or_else(|| not_found(filter))
    }

    /// First record matching `filter`, or `None`.
    pub fn find(&self, filter: &Filter) -> Option<Arc<Record>> {
        self.records.iter().find(|r| filter.matches(r)).cloned()
    }

    /// Exact top-`k` search by cosine similarity.
    ///
    /// Scores every record matching `options.filter`, sorts by similarity
    /// descending (records with equal similarity keep insertion order) and
    /// keeps the first `top_k`. A query whose length differs from a scored
    /// record's embedding fails with [`SearchError::LengthMismatch`]; one with
    /// NaN components fails with [`SearchError::Validation`].
    pub fn search(&self, query: &[f32], options: &SearchOptions) -> Result<Vec<ScoredRecord>> {
        validate_query(query)?;
        let mut scored = Vec::new();
        for record in self.records.iter().filter(|r| options.filter.matches(r)) {
            let embedding = record.validated_embedding()?;
            scored.push(ScoredRecord {
                similarity: cosine_similarity(query, embedding, options.precision)?,
                record: Arc::clone(record),
            });
        }
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(options.top_k);
        Ok(scored)
    }

    /// Writes every record to `store` as a single batch.
    pub fn save_to_store<S>(&self, store: &S) -> Result<()>
    where
        S: ObjectStore + ?Sized,
    {
        let records: Vec<Record> = self.records.iter().map(|r| Record::clone(r)).collect();
        store.add_batch(&records)?;
        tracing::info!(records = records.len(), "saved index to store");
        Ok(())
    }

    /// Rebuilds an index from every record in `store`, reading `batch_size`
    /// records per cursor step.
    pub fn load_from_store<S>(store: &S, batch_size: usize) -> Result<Self>
    where
        S: ObjectStore + ?Sized,
    {
        let mut cursor = store.cursor()?;
        let mut index = Self::new();
        loop {
            let batch = cursor.next_batch(batch_size.max(1))?;
            if batch.is_empty() {
                break;
            }
            for record in batch {
                index.add(record)?;
            }
        }
        cursor.complete()?;
        tracing::info!(records = index.len(), "loaded index from store");
        Ok(index)
    }

    fn position(&self, filter: &Filter) -> Result<usize> {
        self.records
            .iter()
            .position(|r| filter.matches(r))
            .ok_or_else(|| not_found(filter))
    }

    /// Checks the embedding, dimension and schema. Returns the embedding length.
    fn validate(&self, record: &Record) -> Result<usize> {
        let len = record.validated_embedding()?.len();
        if let Some(dim) = self.dimension {
            if len != dim {
                return Err(SearchError::Validation(format!(
                    "embedding has {len} dimensions, index has {dim}"
                )));
            }
        }
        if let Some(missing) = self.schema.iter().find(|k| !record.contains_key(k)) {
            return Err(SearchError::Validation(format!(
                "record is missing attribute '{missing}'"
            )));
        }
        Ok(len)
    }
}

fn not_found(filter: &Filter) -> SearchError {
    SearchError::NotFound(format!("no record matches {filter:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;
    use crate::record::MetadataValue;

    fn sample() -> EmbeddingIndex {
        EmbeddingIndex::from_records(vec![
            Record::with_embedding(vec![1.0, 2.0, 3.0]).with("id", 1),
            Record::with_embedding(vec![4.0, 5.0, 6.0]).with("id", 2),
            Record::with_embedding(vec![7.0, 8.0, 9.0]).with("id", 3),
        ])
        .unwrap()
    }

    fn id(value: i64) -> Filter {
        Filter::new().eq("id", value)
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let index = sample();
        let results = index
            .search(&[1.0, 2.0, 3.0], &SearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[0].record.get("id"), Some(&1.into()));
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_search_with_filter_and_top_k() {
        let index = sample();
        let options = SearchOptions::default().with_filter(id(2)).with_precision(4);
        let results = index.search(&[1.0, 2.0, 3.0], &options).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity, 0.9746);

        let options = SearchOptions::default().with_top_k(1);
        assert_eq!(index.search(&[1.0, 2.0, 3.0], &options).unwrap().len(), 1);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = EmbeddingIndex::from_records(vec![
            Record::with_embedding(vec![1.0, 0.0]).with("id", 1),
            Record::with_embedding(vec![2.0, 0.0]).with("id", 2),
            Record::with_embedding(vec![3.0, 0.0]).with("id", 3),
        ])
        .unwrap();
        let results = index.search(&[1.0, 0.0], &SearchOptions::default()).unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.record.get("id").cloned()).collect();
        assert_eq!(ids, [1, 2, 3].map(|i| Some(MetadataValue::Integer(i))));
    }

    #[test]
    fn test_search_empty_and_mismatch() {
        let index = EmbeddingIndex::new();
        assert!(index.search(&[1.0], &SearchOptions::default()).unwrap().is_empty());

        let index = sample();
        assert!(matches!(
            index.search(&[1.0, 2.0], &SearchOptions::default()),
            Err(SearchError::LengthMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_search_rejects_nan_query() {
        let index = sample();
        assert!(matches!(
            index.search(&[f32::NAN, 1.0, 1.0], &SearchOptions::default()),
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            EmbeddingIndex::new().search(&[f32::NAN], &SearchOptions::default()),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_add_validates() {
        let mut index = sample();
        assert!(matches!(
            index.add(Record::new().with("id", 4)),
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            index.add(Record::new().with("id", 4).with("embedding", "text")),
            Err(SearchError::Validation(_))
        ));
        // Schema requires "id".
        assert!(matches!(
            index.add(Record::with_embedding(vec![1.0, 1.0, 1.0])),
            Err(SearchError::Validation(_))
        ));
        // Dimension fixed at 3.
        assert!(matches!(
            index.add(Record::with_embedding(vec![1.0]).with("id", 4)),
            Err(SearchError::Validation(_))
        ));
        assert_eq!(index.len(), 3);

        index
            .add(Record::with_embedding(vec![0.0, 0.0, 1.0]).with("id", 4).with("extra", true))
            .unwrap();
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_update_in_place() {
        let mut index = sample();
        index
            .update(&id(2), Record::with_embedding(vec![0.0, 1.0, 0.0]).with("id", 20))
            .unwrap();
        assert_eq!(index.len(), 3);
        let second = index.iter().nth(1).unwrap();
        assert_eq!(second.get("id"), Some(&20.into()));

        assert!(matches!(
            index.update(&id(99), Record::with_embedding(vec![0.0, 0.0, 0.0]).with("id", 1)),
            Err(SearchError::NotFound(_))
        ));
        assert!(matches!(
            index.update(&id(1), Record::with_embedding(vec![0.0]).with("id", 1)),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_remove_and_get() {
        let mut index = sample();
        let removed = index.remove(&id(2)).unwrap();
        assert_eq!(removed.get("id"), Some(&2.into()));
        assert_eq!(index.len(), 2);
        assert!(matches!(index.remove(&id(2)), Err(SearchError::NotFound(_))));
        assert!(matches!(index.get(&id(2)), Err(SearchError::NotFound(_))));
        assert!(index.find(&id(2)).is_none());
        assert_eq!(index.get(&id(3)).unwrap().get("id"), Some(&3.into()));
    }

    #[test]
    fn test_remove_batch_skips_missing() {
        let mut index = sample();
        assert_eq!(index.remove_batch(&[id(1), id(42), id(3)]), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove_batch(&[]), 0);
    }

    #[test]
    fn test_clear_resets_schema() {
        let mut index = sample();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
        index.add(Record::with_embedding(vec![1.0])).unwrap();
        assert_eq!(index.dimension(), Some(1));
    }

    #[test]
    fn test_store_round_trip() {
        let index = sample();
        let store = MemoryStore::new();
        index.save_to_store(&store).unwrap();
        let loaded = EmbeddingIndex::load_from_store(&store, 2).unwrap();
        assert_eq!(loaded.len(), 3);
        let original: Vec<_> = index.iter().map(|r| Record::clone(r)).collect();
        let restored: Vec<_> = loaded.iter().map(|r| Record::clone(r)).collect();
        assert_eq!(original, restored);
    }
}
