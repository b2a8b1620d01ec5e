//! Chunk text and source metadata, keyed by the same ids as the vector index.

use crate::chunker::Chunk;
use crate::embeddings::ModelIdentity;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;

/// Persisted form of the store (`chunks.json`).
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    identity: ModelIdentity,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Id-addressable chunk collection.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    identity: ModelIdentity,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
    positions: HashMap<u64, usize>,
}

impl ChunkStore {
    /// Build a store; chunk ids must be unique.
    pub fn new(identity: ModelIdentity, chunks: Vec<Chunk>) -> Result<Self, StoreError> {
        Self::with_created_at(identity, Utc::now(), chunks)
    }

    fn with_created_at(
        identity: ModelIdentity,
        created_at: DateTime<Utc>,
        chunks: Vec<Chunk>,
    ) -> Result<Self, StoreError> {
        let mut positions = HashMap::with_capacity(chunks.len());
        for (pos, chunk) in chunks.iter().enumerate() {
            if positions.insert(chunk.id, pos).is_some() {
                return Err(StoreError::InvalidIndexInput(format!(
                    "duplicate chunk id {}",
                    chunk.id
                )));
            }
        }
        Ok(Self {
            identity,
            created_at,
            chunks,
            positions,
        })
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn get(&self, id: u64) -> Option<&Chunk> {
        self.positions.get(&id).map(|&pos| &self.chunks[pos])
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chunks.iter().map(|c| c.id)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Distinct source documents, sorted.
    pub fn sources(&self) -> BTreeSet<&str> {
        self.chunks.iter().map(|c| c.source.as_str()).collect()
    }

    /// Write the store atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = StoreFile {
            identity: self.identity.clone(),
            created_at: self.created_at,
            chunks: self.chunks.clone(),
        };
        let json = serde_json::to_vec(&file).map_err(|e| {
            StoreError::InvalidIndexInput(format!("failed to encode chunk store: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let mut out = std::fs::File::create(&tmp)?;
            out.write_all(&json)?;
            out.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), chunks = self.len(), "Saved chunk store");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::IndexNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::corrupt(path, format!("invalid chunk store: {}", e)))?;

        Self::with_created_at(file.identity, file.created_at, file.chunks)
            .map_err(|e| StoreError::corrupt(path, e.to_string()))
    }
}
