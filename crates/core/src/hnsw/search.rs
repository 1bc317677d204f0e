//! Graph search: single-layer beam search and top-down descent.
//!
//! [`search_layer`] keeps the `ef` closest nodes seen so far in a bounded
//! [`TopK`] keyed by reversed distance, and explores a min-distance frontier
//! until the closest unexplored candidate is farther than the worst kept
//! result.

use crate::config;
use crate::error::{Result, SearchError};
use crate::hnsw::distance::euclidean_distance;
use crate::hnsw::graph::{HnswIndex, LayerNode};
use crate::hnsw::visited::VisitedSet;
use crate::search::{validate_query, TopK};
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

thread_local! {
    /// Reused across searches on the same thread to avoid a fresh allocation per layer.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new());
}

/// Beam search within one layer starting from `entry`.
///
/// Returns up to `ef` `(distance, position)` pairs, closest first. An `ef` of
/// zero is treated as one. Fails with [`SearchError::InvalidIndex`] if `entry`
/// is not a position in `layer`.
pub fn search_layer(
    layer: &[LayerNode],
    entry: usize,
    query: &[f32],
    ef: usize,
) -> Result<Vec<(f32, usize)>> {
    let entry_node = layer.get(entry).ok_or(SearchError::InvalidIndex {
        index: entry,
        len: layer.len(),
    })?;
    let entry_dist = euclidean_distance(&entry_node.vector, query)?;

    let mut nearest: TopK<usize, Reverse<OrderedFloat<f32>>> = TopK::new(ef.max(1));
    nearest.push(Reverse(OrderedFloat(entry_dist)), entry);
    let mut frontier: BinaryHeap<Reverse<(OrderedFloat<f32>, usize)>> = BinaryHeap::new();
    frontier.push(Reverse((OrderedFloat(entry_dist), entry)));

    SEARCH_VISITED.with(|cell| -> Result<()> {
        let mut visited = cell.borrow_mut();
        visited.begin(layer.len());
        visited.visit(entry);

        while let Some(Reverse((OrderedFloat(dist), current))) = frontier.pop() {
            let worst = nearest.worst_score().map_or(f32::MAX, |Reverse(d)| d.0);
            if dist > worst {
                break;
            }

            for &neighbor in &layer[current].connections {
                let node = layer.get(neighbor).ok_or(SearchError::InvalidIndex {
                    index: neighbor,
                    len: layer.len(),
                })?;
                if !visited.visit(neighbor) {
                    continue;
                }
                let d = euclidean_distance(&node.vector, query)?;
                if nearest.offer(Reverse(OrderedFloat(d)), neighbor) {
                    frontier.push(Reverse((OrderedFloat(d), neighbor)));
                }
            }
        }
        Ok(())
    })?;

    Ok(nearest
        .into_sorted_vec()
        .into_iter()
        .map(|(Reverse(d), pos)| (d.0, pos))
        .collect())
}

impl HnswIndex {
    /// Approximate nearest neighbors of `query`.
    ///
    /// Starts at position 0 of the top layer, runs [`search_layer`] with `ef`
    /// on every layer, and descends through the closest node's down-link. The
    /// bottom layer's result set is returned as `(distance, position)` pairs,
    /// closest first, where position is the insertion ordinal. An empty index
    /// yields an empty result. A query with NaN components fails with
    /// [`SearchError::Validation`].
    pub fn search(&self, query: &[f32], ef: usize) -> Result<Vec<(f32, usize)>> {
        validate_query(query)?;
        let Some(dim) = self.dimension() else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(SearchError::LengthMismatch {
                left: query.len(),
                right: dim,
            });
        }

        let mut entry = 0usize;
        for (n, layer) in self.layers.iter().enumerate() {
            let results = search_layer(layer, entry, query, ef)?;
            let Some(&(_, winner)) = results.first() else {
                return Ok(Vec::new());
            };
            match layer[winner].layer_below {
                Some(below) => entry = below,
                None => {
                    tracing::trace!(layer = n, ef, found = results.len(), "graph search done");
                    return Ok(results);
                }
            }
        }
        Ok(Vec::new())
    }

    /// Search with the default exploration factor.
    pub fn search_default(&self, query: &[f32]) -> Result<Vec<(f32, usize)>> {
        self.search(query, config::HNSW_DEFAULT_EF_SEARCH)
    }

    /// The `k` approximate nearest neighbors, exploring `max(ef, k)` candidates.
    pub fn knn_search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(f32, usize)>> {
        let mut results = self.search(query, ef.max(k))?;
        results.truncate(k);
        Ok(results)
    }
}
