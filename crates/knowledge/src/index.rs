//! Exact nearest-neighbour vector index.
//!
//! Vectors are stored flat in id order. Search is a brute-force cosine scan,
//! which is exact and plenty fast for document collections of this size.
//!
//! On disk (`vectors.bin`):
//! `DOCQAVI1` magic, SHA-256 of the payload, then the bincode payload.
//! `f32` values round-trip bit-identically.

use crate::embeddings::ModelIdentity;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 8] = b"DOCQAVI1";
const CHECKSUM_LEN: usize = 32;
const FORMAT_VERSION: u32 = 1;

/// A search hit: chunk id and cosine distance (0 = identical direction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u64,
    pub distance: f32,
}

impl Neighbor {
    /// Relevance in [-1, 1]; higher is more relevant.
    pub fn score(&self) -> f32 {
        1.0 - self.distance
    }
}

/// In-memory vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimensions: usize,
    ids: Vec<u64>,
    data: Vec<f32>,
    norms: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexPayload {
    version: u32,
    identity: ModelIdentity,
    dimensions: u32,
    ids: Vec<u64>,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build a fresh index from the complete ingested set.
    ///
    /// Rejects mismatched lengths, duplicate ids, and vectors whose
    /// dimensionality differs from `dimensions`.
    pub fn build(
        dimensions: usize,
        ids: Vec<u64>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, StoreError> {
        if ids.len() != vectors.len() {
            return Err(StoreError::InvalidIndexInput(format!(
                "{} ids but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if dimensions == 0 {
            return Err(StoreError::InvalidIndexInput(
                "dimensions must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(StoreError::InvalidIndexInput(format!("duplicate id {}", dup)));
        }

        let mut data = Vec::with_capacity(ids.len() * dimensions);
        for (id, vector) in ids.iter().zip(&vectors) {
            if vector.len() != dimensions {
                return Err(StoreError::InvalidIndexInput(format!(
                    "vector for id {} has {} dimensions, expected {}",
                    id,
                    vector.len(),
                    dimensions
                )));
            }
            data.extend_from_slice(vector);
        }

        Ok(Self::from_parts(dimensions, ids, data))
    }

    fn from_parts(dimensions: usize, ids: Vec<u64>, data: Vec<f32>) -> Self {
        let norms = data.chunks(dimensions).map(norm).collect();
        Self {
            dimensions,
            ids,
            data,
            norms,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Vector stored for `id`.
    pub fn vector(&self, id: u64) -> Option<&[f32]> {
        let pos = self.ids.iter().position(|&i| i == id)?;
        Some(&self.data[pos * self.dimensions..(pos + 1) * self.dimensions])
    }

    /// The `k` nearest vectors by ascending cosine distance, ties by ascending id.
    ///
    /// Returns fewer than `k` hits only when the index holds fewer vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, StoreError> {
        if k == 0 {
            return Err(StoreError::InvalidIndexInput(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(StoreError::InvalidIndexInput(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let query_norm = norm(query);
        let mut hits: Vec<Neighbor> = self
            .data
            .chunks(self.dimensions)
            .zip(&self.ids)
            .zip(&self.norms)
            .map(|((vector, &id), &vector_norm)| Neighbor {
                id,
                distance: cosine_distance(query, query_norm, vector, vector_norm),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index atomically (temp file + rename).
    pub fn save(&self, path: &Path, identity: &ModelIdentity) -> Result<(), StoreError> {
        let payload = IndexPayload {
            version: FORMAT_VERSION,
            identity: identity.clone(),
            dimensions: self.dimensions as u32,
            ids: self.ids.clone(),
            data: self.data.clone(),
        };
        let body = bincode::serialize(&payload)
            .map_err(|e| StoreError::InvalidIndexInput(format!("failed to encode index: {}", e)))?;
        let checksum = Sha256::digest(&body);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(MAGIC)?;
            file.write_all(&checksum)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), vectors = self.len(), "Saved vector index");
        Ok(())
    }

    /// Load an index written by `save`, with the identity it was built with.
    pub fn load(path: &Path) -> Result<(Self, ModelIdentity), StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::IndexNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let header_len = MAGIC.len() + CHECKSUM_LEN;
        if bytes.len() < header_len || &bytes[..MAGIC.len()] != MAGIC {
            return Err(StoreError::corrupt(path, "not a vector index file"));
        }

        let (checksum, body) = bytes[MAGIC.len()..].split_at(CHECKSUM_LEN);
        if Sha256::digest(body).as_slice() != checksum {
            return Err(StoreError::corrupt(path, "checksum mismatch"));
        }

        let payload: IndexPayload = bincode::deserialize(body)
            .map_err(|e| StoreError::corrupt(path, format!("failed to decode: {}", e)))?;

        if payload.version != FORMAT_VERSION {
            return Err(StoreError::corrupt(
                path,
                format!("unsupported format version {}", payload.version),
            ));
        }
        let dimensions = payload.dimensions as usize;
        if dimensions == 0
            || dimensions != payload.identity.dimensions
            || payload.data.len() != payload.ids.len() * dimensions
        {
            return Err(StoreError::corrupt(path, "inconsistent vector data"));
        }

        Ok((
            Self::from_parts(dimensions, payload.ids, payload.data),
            payload.identity,
        ))
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// `1 - cos(a, b)`; a zero vector is treated as orthogonal to everything.
fn cosine_distance(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 - dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity(dimensions: usize) -> ModelIdentity {
        ModelIdentity {
            provider: "test".to_string(),
            model: "unit".to_string(),
            dimensions,
        }
    }

    fn sample() -> FlatIndex {
        FlatIndex::build(
            3,
            vec![10, 11, 12, 13],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.7, 0.7, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_rejects_length_mismatch() {
        let result = FlatIndex::build(2, vec![1, 2], vec![vec![0.0, 1.0]]);
        assert!(matches!(result, Err(StoreError::InvalidIndexInput(_))));
    }

    #[test]
    fn test_build_rejects_wrong_dimensions_and_duplicates() {
        let result = FlatIndex::build(2, vec![1], vec![vec![0.0, 1.0, 2.0]]);
        assert!(matches!(result, Err(StoreError::InvalidIndexInput(_))));

        let result = FlatIndex::build(2, vec![1, 1], vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert!(matches!(result, Err(StoreError::InvalidIndexInput(_))));
    }

    #[test]
    fn test_search_orders_by_relevance() {
        let index = sample();
        let hits = index.search(&[1.0, 0.1, 0.0], 3).unwrap();

        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![10, 12, 11]);
        assert!(hits.windows(2).all(|w| w[0].score() >= w[1].score()));
    }

    #[test]
    fn test_search_k_larger_than_corpus() {
        let index = sample();
        let hits = index.search(&[0.0, 0.0, 1.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].id, 13);
    }

    #[test]
    fn test_search_ties_broken_by_id() {
        let index = FlatIndex::build(
            2,
            vec![5, 2, 9],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        let ids: Vec<u64> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_search_rejects_zero_k_and_bad_query() {
        let index = sample();
        assert!(index.search(&[1.0, 0.0, 0.0], 0).is_err());
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::build(3, vec![], vec![]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index").join("vectors.bin");
        let index = sample();
        index.save(&path, &identity(3)).unwrap();

        let (loaded, loaded_identity) = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded_identity, identity(3));
        assert_eq!(loaded.vector(12), Some(&[0.7f32, 0.7, 0.0][..]));

        for probe in [[1.0, 0.2, 0.0], [0.0, 0.3, 0.9], [0.5, 0.5, 0.5]] {
            assert_eq!(
                index.search(&probe, 4).unwrap(),
                loaded.search(&probe, 4).unwrap()
            );
        }
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = FlatIndex::load(&temp.path().join("vectors.bin"));
        assert!(matches!(result, Err(StoreError::IndexNotFound(_))));
    }

    #[test]
    fn test_load_detects_corruption() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.bin");
        sample().save(&path, &identity(3)).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(StoreError::IndexCorrupt { .. })
        ));

        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(StoreError::IndexCorrupt { .. })
        ));
    }
}
