//! Graph insertion.
//!
//! A new vector draws a level, walks the layers top to bottom, greedily routes
//! through the layers above its level and gets a node, bidirectionally
//! connected to up to `ef_construction` neighbors, in every layer at or below
//! its level.

use crate::error::{Result, SearchError};
use crate::hnsw::graph::{HnswIndex, LayerNode};
use crate::hnsw::search::search_layer;

impl HnswIndex {
    /// Insert a vector and return its position in the bottom layer, which is
    /// also its insertion ordinal.
    ///
    /// The first vector fixes the index dimension; later vectors of a
    /// different length fail with [`SearchError::LengthMismatch`] before the
    /// graph is touched. NaN components are rejected as invalid.
    pub fn insert(&mut self, vector: Vec<f32>) -> Result<usize> {
        if let Some(dim) = self.dimension() {
            if vector.len() != dim {
                return Err(SearchError::LengthMismatch {
                    left: vector.len(),
                    right: dim,
                });
            }
        }
        if vector.iter().any(|x| x.is_nan()) {
            return Err(SearchError::Validation("vector contains NaN".into()));
        }

        let level = self.random_level();
        let last = self.layers.len() - 1;
        // Layers at positions >= band_start receive a node for this vector.
        let band_start = last - level;
        let ef_construction = self.config.ef_construction;
        let mut entry = 0usize;

        for n in 0..self.layers.len() {
            let layer_below = (n < last).then(|| self.layers[n + 1].len());

            if self.layers[n].is_empty() {
                self.layers[n].push(LayerNode {
                    vector: vector.clone(),
                    connections: Vec::new(),
                    layer_below,
                });
                continue;
            }

            if n < band_start {
                let nearest = search_layer(&self.layers[n], entry, &vector, 1)?;
                let winner = nearest.first().map_or(entry, |&(_, pos)| pos);
                entry = self.layers[n][winner].layer_below.ok_or_else(|| {
                    SearchError::Corrupted(format!("node {winner} in layer {n} has no down-link"))
                })?;
                continue;
            }

            let candidates = search_layer(&self.layers[n], entry, &vector, ef_construction)?;
            let position = self.layers[n].len();
            let connections: Vec<usize> = candidates.iter().map(|&(_, pos)| pos).collect();
            for &neighbor in &connections {
                self.layers[n][neighbor].connections.push(position);
            }
            let anchor_below = self.layers[n][entry].layer_below;
            self.layers[n].push(LayerNode {
                vector: vector.clone(),
                connections,
                layer_below,
            });
            if let Some(below) = anchor_below {
                entry = below;
            }
        }

        tracing::trace!(level, len = self.len(), "inserted vector into graph");
        Ok(self.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SearchError;
    use crate::hnsw::graph::{HnswConfig, HnswIndex};

    fn grid(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| vec![(i % 10) as f32, (i / 10) as f32, ((i * 7) % 13) as f32])
            .collect()
    }

    #[test]
    fn test_first_insert_populates_every_layer() {
        let mut index = HnswIndex::with_seed(HnswConfig::default(), 3).unwrap();
        assert_eq!(index.insert(vec![1.0, 2.0, 3.0]).unwrap(), 0);
        for (n, layer) in index.layers().iter().enumerate() {
            assert_eq!(layer.len(), 1, "layer {n}");
            assert!(layer[0].connections.is_empty());
        }
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_bottom_layer_holds_every_vector() {
        let mut index = HnswIndex::with_seed(HnswConfig::default(), 11).unwrap();
        for (i, v) in grid(200).into_iter().enumerate() {
            assert_eq!(index.insert(v).unwrap(), i);
        }
        assert_eq!(index.len(), 200);
        assert!(index.validate().is_ok());
        // Upper layers are sparser than the bottom.
        let sizes: Vec<usize> = index.layers().iter().map(Vec::len).collect();
        assert!(sizes[0] < sizes[4], "{sizes:?}");
    }

    #[test]
    fn test_connections_are_bidirectional() {
        let mut index = HnswIndex::with_seed(HnswConfig::default(), 5).unwrap();
        for v in grid(60) {
            index.insert(v).unwrap();
        }
        for layer in index.layers() {
            for (pos, node) in layer.iter().enumerate() {
                for &c in &node.connections {
                    assert!(layer[c].connections.contains(&pos));
                }
            }
        }
    }

    #[test]
    fn test_down_links_point_at_same_vector() {
        let mut index = HnswIndex::with_seed(HnswConfig::default(), 9).unwrap();
        for v in grid(80) {
            index.insert(v).unwrap();
        }
        let layers = index.layers();
        for n in 0..layers.len() - 1 {
            for node in &layers[n] {
                let below = node.layer_below.unwrap();
                assert_eq!(layers[n + 1][below].vector, node.vector);
            }
        }
    }

    #[test]
    fn test_dimension_mismatch_leaves_graph_untouched() {
        let mut index = HnswIndex::with_seed(HnswConfig::default(), 1).unwrap();
        index.insert(vec![1.0, 2.0]).unwrap();
        let err = index.insert(vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            SearchError::LengthMismatch { left: 3, right: 2 }
        ));
        assert_eq!(index.len(), 1);
        assert!(index.layers().iter().all(|l| l.len() == 1));
    }

    #[test]
    fn test_nan_rejected() {
        let mut index = HnswIndex::with_default_config();
        assert!(matches!(
            index.insert(vec![f32::NAN]),
            Err(SearchError::Validation(_))
        ));
        assert!(index.is_empty());
    }
}
