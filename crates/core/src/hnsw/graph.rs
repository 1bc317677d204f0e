//! Graph structure and configuration.
//!
//! [`HnswConfig`] holds the construction parameters (layer count, level
//! multiplier, construction exploration factor). [`HnswIndex`] stores one
//! append-only arena of [`LayerNode`]s per layer, ordered top (sparse) to
//! bottom (every inserted vector).
//!
//! Node identity is the node's position in its layer. Positions are never
//! reused or compacted, so neighbor lists and down-links are plain indices.
//! There is no delete or update: once inserted, a node is permanent.

use crate::config;
use crate::error::{Result, SearchError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Construction parameters for a graph index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of layers `L`. Fixed for the lifetime of the index.
    pub layers: usize,
    /// Level multiplier `mL`; larger values put more vectors in upper layers.
    pub level_multiplier: f64,
    /// Candidates kept (and connected) per layer during insertion.
    pub ef_construction: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            layers: config::HNSW_DEFAULT_LAYERS,
            level_multiplier: config::HNSW_DEFAULT_LEVEL_MULTIPLIER,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
        }
    }
}

impl HnswConfig {
    /// Checks that the parameters describe a usable index.
    pub fn validate(&self) -> Result<()> {
        if self.layers == 0 {
            return Err(SearchError::Validation("layers must be at least 1".into()));
        }
        if !self.level_multiplier.is_finite() || self.level_multiplier < 0.0 {
            return Err(SearchError::Validation(format!(
                "level_multiplier must be finite and non-negative, got {}",
                self.level_multiplier
            )));
        }
        if self.ef_construction == 0 {
            return Err(SearchError::Validation(
                "ef_construction must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A node in one layer of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNode {
    pub vector: Vec<f32>,
    /// Positions of neighbor nodes within the same layer.
    pub connections: Vec<usize>,
    /// Position of the same vector in the layer below; `None` on the bottom layer.
    pub layer_below: Option<usize>,
}

/// Append-only node arena for one layer.
pub type Layer = Vec<LayerNode>;

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Multi-layer proximity graph index.
///
/// Persisted through `storage::persistence`, which writes only the config and
/// layers.
#[derive(Debug, Clone)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) layers: Vec<Layer>,
    pub(crate) rng: StdRng,
}

impl HnswIndex {
    /// Creates an empty index. Fails if the configuration is invalid.
    pub fn new(config: HnswConfig) -> Result<Self> {
        Self::build(config, entropy_rng())
    }

    /// Creates an empty index whose level draws are reproducible.
    pub fn with_seed(config: HnswConfig, seed: u64) -> Result<Self> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    /// Creates an empty index with default configuration (L=5, mL=0.62, efc=10).
    pub fn with_default_config() -> Self {
        let config = HnswConfig::default();
        let layers = vec![Vec::new(); config.layers];
        Self {
            config,
            layers,
            rng: entropy_rng(),
        }
    }

    fn build(config: HnswConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let layers = vec![Vec::new(); config.layers];
        Ok(Self {
            config,
            layers,
            rng,
        })
    }

    /// Reassembles an index from its node/edge structure.
    ///
    /// The structure is validated; a decoded index answers searches exactly
    /// like the one it was taken from.
    pub fn from_parts(config: HnswConfig, layers: Vec<Layer>) -> Result<Self> {
        let index = Self {
            config,
            layers,
            rng: entropy_rng(),
        };
        index.validate()?;
        Ok(index)
    }

    /// Splits the index into its configuration and layers.
    pub fn into_parts(self) -> (HnswConfig, Vec<Layer>) {
        (self.config, self.layers)
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Layers ordered top (sparsest) to bottom.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of inserted vectors (the bottom layer's length).
    pub fn len(&self) -> usize {
        self.layers.last().map_or(0, Vec::len)
    }

    /// Returns `true` if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality fixed by the first insert, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.layers
            .last()
            .and_then(|bottom| bottom.first())
            .map(|node| node.vector.len())
    }

    /// Returns the vector inserted at `position` (insertion order).
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.layers
            .last()
            .and_then(|bottom| bottom.get(position))
            .map(|node| node.vector.as_slice())
    }

    /// Draw an insertion level `min(floor(-ln(U) * mL), L - 1)` with U in (0, 1].
    ///
    /// Levels count up from the bottom layer; level `l` places the vector in
    /// the bottom `l + 1` layers.
    pub fn random_level(&mut self) -> usize {
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.config.level_multiplier).floor();
        (level as usize).min(self.config.layers - 1)
    }

    /// Validate structural invariants, typically after decoding.
    ///
    /// Checks the layer count, that layers are either all empty or all
    /// populated, that every neighbor and down-link is in range, that only the
    /// bottom layer lacks down-links, and that all vectors share a dimension.
    pub fn validate(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| SearchError::Corrupted(e.to_string()))?;

        if self.layers.len() != self.config.layers {
            return Err(SearchError::Corrupted(format!(
                "layer count {} != configured layers {}",
                self.layers.len(),
                self.config.layers
            )));
        }

        let populated = self.layers.iter().filter(|l| !l.is_empty()).count();
        if populated != 0 && populated != self.layers.len() {
            return Err(SearchError::Corrupted(format!(
                "{populated} of {} layers populated",
                self.layers.len()
            )));
        }

        let dimension = self.dimension();
        let last = self.layers.len() - 1;
        for (n, layer) in self.layers.iter().enumerate() {
            let below_len = self.layers.get(n + 1).map(Vec::len);
            for (pos, node) in layer.iter().enumerate() {
                if Some(node.vector.len()) != dimension {
                    return Err(SearchError::Corrupted(format!(
                        "node {pos} in layer {n} has dimension {}, expected {:?}",
                        node.vector.len(),
                        dimension
                    )));
                }
                if let Some(&bad) = node.connections.iter().find(|&&c| c >= layer.len()) {
                    return Err(SearchError::Corrupted(format!(
                        "neighbor {bad} out of bounds (layer len={}) at node {pos} layer {n}",
                        layer.len()
                    )));
                }
                match (node.layer_below, below_len) {
                    (Some(below), Some(len)) if below < len => {}
                    (None, None) => {}
                    (Some(below), _) => {
                        return Err(SearchError::Corrupted(format!(
                            "down-link {below} invalid at node {pos} layer {n} (bottom layer is {last})"
                        )));
                    }
                    (None, Some(_)) => {
                        return Err(SearchError::Corrupted(format!(
                            "missing down-link at node {pos} layer {n}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
