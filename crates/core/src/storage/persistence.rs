//! Binary persistence for graph indexes.
//!
//! An encoded index is `[bincode payload][magic "VHG1"][u32 CRC32 BE]`, where
//! the payload is the configuration plus every layer's nodes, edges and
//! down-links. Decoding verifies the footer, then the graph structure, so a
//! decoded index either answers searches exactly like the original or is
//! rejected as [`SearchError::Corrupted`]. Files are written atomically via a
//! temp file and rename.

use crate::config;
use crate::error::{Result, SearchError};
use crate::hnsw::{HnswConfig, HnswIndex, Layer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct GraphRef<'a> {
    config: &'a HnswConfig,
    layers: &'a [Layer],
}

#[derive(Deserialize)]
struct GraphOwned {
    config: HnswConfig,
    layers: Vec<Layer>,
}

/// Encode an index with its checksum footer.
pub fn encode_index(index: &HnswIndex) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&GraphRef {
        config: index.config(),
        layers: index.layers(),
    })?;
    let crc = crc32fast::hash(&payload);

    let mut output = Vec::with_capacity(payload.len() + 8);
    output.extend_from_slice(&payload);
    output.extend_from_slice(config::GRAPH_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());
    Ok(output)
}

/// Decode and validate an index produced by [`encode_index`].
pub fn decode_index(raw: &[u8]) -> Result<HnswIndex> {
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != config::GRAPH_CRC_MAGIC {
        return Err(SearchError::Corrupted(
            "missing graph checksum footer".into(),
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(SearchError::Corrupted(format!(
            "graph CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
        )));
    }
    tracing::debug!("graph CRC32 verified: {:#010x}", stored_crc);

    let graph: GraphOwned = bincode::deserialize(payload)?;
    HnswIndex::from_parts(graph.config, graph.layers)
}

impl HnswIndex {
    /// Encodes the index; see [`encode_index`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_index(self)
    }

    /// Decodes an index; see [`decode_index`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        decode_index(raw)
    }
}

/// Save an index as `<dir>/<name>.vhg` with an atomic write. Returns the path.
pub fn save_index(index: &HnswIndex, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let bytes = encode_index(index)?;

    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "cannot restrict index directory permissions"
            );
        }
    }
    let path = dir.join(format!("{name}.{}", config::GRAPH_FILE_EXTENSION));
    let tmp_path = dir.join(format!("{name}.{}.tmp", config::GRAPH_FILE_EXTENSION));

    fs::write(&tmp_path, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, &path)?;

    tracing::info!(
        "Saved graph '{}' ({} vectors, {} bytes)",
        name,
        index.len(),
        bytes.len()
    );
    Ok(path)
}

/// Load an index written by [`save_index`].
pub fn load_index(path: impl AsRef<Path>) -> Result<HnswIndex> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| {
        SearchError::StorageUnavailable(format!("cannot read {}: {e}", path.display()))
    })?;
    let index = decode_index(&raw)?;
    tracing::info!("Loaded graph {:?} ({} vectors)", path, index.len());
    Ok(index)
}

/// Load every `.vhg` file in `dir`, keyed by file stem.
///
/// Unreadable or corrupted files are skipped with a warning. A missing
/// directory yields an empty list.
pub fn load_all_indexes(dir: impl AsRef<Path>) -> Result<Vec<(String, HnswIndex)>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut indexes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let file_path = entry?.path();
        if file_path.extension().and_then(|s| s.to_str()) != Some(config::GRAPH_FILE_EXTENSION) {
            continue;
        }
        let Some(name) = file_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_index(&file_path) {
            Ok(index) => indexes.push((name.to_string(), index)),
            Err(e) => tracing::warn!("Failed to load {:?}: {}", file_path, e),
        }
    }
    indexes.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(indexes)
}
