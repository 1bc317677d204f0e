//! Text-to-vector embedding behind a pluggable model, with a per-context cache.
//!
//! The model itself is external: implement [`Embedder`] for whatever produces
//! vectors. [`EmbeddingContext`] owns one embedder, the options it is called
//! with and an [`EmbeddingCache`], and is passed explicitly to the code that
//! needs text queries.

use crate::error::{Result, SearchError};
use crate::search::{ScoredRecord, SearchOptions};
use crate::storage::{search_store, EmbeddingIndex, ObjectStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How token vectors are pooled into one text vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Average over all tokens.
    #[default]
    Mean,
    /// First (classification) token only.
    Cls,
}

/// Options forwarded to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedOptions {
    pub pooling: Pooling,
    /// Scale the output to unit L2 norm.
    pub normalize: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            pooling: Pooling::Mean,
            normalize: true,
        }
    }
}

/// A text embedding model.
///
/// Implementations report model failures as [`SearchError::Embedding`].
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>>;
}

/// Scales `vector` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector
        .iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Text → vector map.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.lock().get(text).cloned()
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        self.entries.lock().insert(text.to_string(), vector);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// An embedder, its options and its cache.
pub struct EmbeddingContext {
    embedder: Box<dyn Embedder>,
    options: EmbedOptions,
    cache: EmbeddingCache,
}

impl std::fmt::Debug for EmbeddingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingContext")
            .field("options", &self.options)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl EmbeddingContext {
    /// Creates a context using default options (mean pooling, normalized).
    pub fn new(embedder: impl Embedder + 'static) -> Self {
        Self::with_options(embedder, EmbedOptions::default())
    }

    pub fn with_options(embedder: impl Embedder + 'static, options: EmbedOptions) -> Self {
        Self {
            embedder: Box::new(embedder),
            options,
            cache: EmbeddingCache::new(),
        }
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Vector for `text`, calling the model at most once per distinct text.
    ///
    /// The cache lock is held across the model call, so concurrent requests
    /// for the same text wait for the first one instead of repeating it.
    /// Empty or NaN-bearing model output is rejected and not cached.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut entries = self.cache.entries.lock();
        if let Some(hit) = entries.get(text) {
            tracing::trace!(chars = text.len(), "embedding cache hit");
            return Ok(hit.clone());
        }

        let mut vector = self.embedder.embed(text, &self.options)?;
        if vector.is_empty() {
            return Err(SearchError::Embedding("model returned an empty vector".into()));
        }
        if vector.iter().any(|x| x.is_nan()) {
            return Err(SearchError::Embedding("model returned NaN components".into()));
        }
        if self.options.normalize {
            l2_normalize(&mut vector);
        }

        tracing::debug!(chars = text.len(), dimension = vector.len(), "embedded text");
        entries.insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Exact search of `index` for the embedding of `text`.
    pub fn search_index(
        &self,
        index: &EmbeddingIndex,
        text: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredRecord>> {
        let query = self.embed(text)?;
        index.search(&query, options)
    }

    /// Streaming search of `store` for the embedding of `text`.
    pub fn search_store<S>(
        &self,
        store: &S,
        text: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredRecord>>
    where
        S: ObjectStore + ?Sized,
    {
        let query = self.embed(text)?;
        search_store(store, &query, options)
    }
}
