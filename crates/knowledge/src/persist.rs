//! On-disk layout of the persisted VectorIndex + ChunkStore pair.
//!
//! ```text
//! <data>/CURRENT                      name of the active generation
//! <data>/generations/<id>/index/vectors.bin
//! <data>/generations/<id>/store/chunks.json
//! <data>/generations/<id>/manifest.json
//! ```
//!
//! A generation is written completely before `CURRENT` is switched to it
//! (temp file + rename), so a failed ingestion leaves the previous pair
//! untouched and readers never observe a half-written one.

use crate::embeddings::ModelIdentity;
use crate::error::StoreError;
use crate::index::FlatIndex;
use crate::store::ChunkStore;
use crate::types::IngestionReport;
use chrono::Utc;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

const CURRENT_FILE: &str = "CURRENT";
const GENERATIONS_DIR: &str = "generations";

/// A generation directory.
#[derive(Debug, Clone)]
pub struct Generation {
    pub id: String,
    pub dir: PathBuf,
}

impl Generation {
    pub fn index_path(&self) -> PathBuf {
        self.dir.join("index").join("vectors.bin")
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.join("store").join("chunks.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }
}

/// A fully loaded, immutable index + store pair.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub generation: String,
    pub identity: ModelIdentity,
    pub index: FlatIndex,
    pub store: ChunkStore,
}

/// Resolves and mutates the persisted layout under a data directory.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    root: PathBuf,
}

impl IndexLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    pub fn generation(&self, id: &str) -> Generation {
        Generation {
            id: id.to_string(),
            dir: self.generations_dir().join(id),
        }
    }

    /// Id of the active generation, if any.
    pub fn current(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.current_path()) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
                    return Err(StoreError::corrupt(
                        self.current_path(),
                        format!("invalid generation name {:?}", id),
                    ));
                }
                Ok(Some(id.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an empty directory for a new generation.
    ///
    /// Ids start with a UTC timestamp so lexical order is creation order.
    pub fn stage(&self) -> Result<Generation, StoreError> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), &suffix[..8]);
        let generation = self.generation(&id);
        std::fs::create_dir_all(&generation.dir)?;
        Ok(generation)
    }

    /// Persist an index/store pair and its report into a staged generation.
    pub fn write(
        &self,
        generation: &Generation,
        identity: &ModelIdentity,
        index: &FlatIndex,
        store: &ChunkStore,
        report: &IngestionReport,
    ) -> Result<(), StoreError> {
        index.save(&generation.index_path(), identity)?;
        store.save(&generation.store_path())?;
        let manifest = serde_json::to_vec_pretty(report).map_err(|e| {
            StoreError::InvalidIndexInput(format!("failed to encode manifest: {}", e))
        })?;
        std::fs::write(generation.manifest_path(), manifest)?;
        Ok(())
    }

    /// Make `generation` the active one, then prune old generations.
    ///
    /// The generation that was active before is kept for readers that
    /// resolved it just before the switch.
    pub fn commit(&self, generation: &Generation) -> Result<(), StoreError> {
        let previous = self.current()?;

        let tmp = self.root.join(format!("{}.tmp", CURRENT_FILE));
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(generation.id.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, self.current_path())?;
        tracing::info!(generation = %generation.id, "Committed index generation");

        let mut keep: HashSet<String> = HashSet::new();
        keep.insert(generation.id.clone());
        if let Some(previous) = previous {
            keep.insert(previous);
        }
        if let Err(e) = self.prune(&keep) {
            tracing::warn!("Failed to prune old index generations: {}", e);
        }
        Ok(())
    }

    /// Remove a staged generation that will never be committed.
    pub fn discard(&self, generation: &Generation) {
        if let Err(e) = std::fs::remove_dir_all(&generation.dir) {
            tracing::warn!(generation = %generation.id, "Failed to remove staged generation: {}", e);
        }
    }

    fn prune(&self, keep: &HashSet<String>) -> Result<(), StoreError> {
        let dir = self.generations_dir();
        if !dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !keep.contains(&name) && entry.file_type()?.is_dir() {
                tracing::debug!(generation = %name, "Pruning index generation");
                std::fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(())
    }

    /// Load and cross-check a generation.
    ///
    /// Both artifacts must exist, carry the same model identity, and hold
    /// exactly the same id set. Anything else is corruption.
    pub fn load(&self, id: &str) -> Result<IndexSnapshot, StoreError> {
        let generation = self.generation(id);
        let as_corrupt = |err: StoreError| match err {
            StoreError::IndexNotFound(path) => {
                StoreError::corrupt(path, "artifact missing from the active generation")
            }
            other => other,
        };

        let (index, identity) = FlatIndex::load(&generation.index_path()).map_err(as_corrupt)?;
        let store = ChunkStore::load(&generation.store_path()).map_err(as_corrupt)?;

        if store.identity() != &identity {
            return Err(StoreError::corrupt(
                &generation.dir,
                format!(
                    "index built with {} but chunk store with {}",
                    identity,
                    store.identity()
                ),
            ));
        }

        let index_ids: HashSet<u64> = index.ids().iter().copied().collect();
        let store_ids: HashSet<u64> = store.ids().collect();
        if index_ids != store_ids || store.len() != index.len() {
            return Err(StoreError::corrupt(
                &generation.dir,
                "vector index and chunk store ids differ",
            ));
        }

        tracing::debug!(generation = %id, chunks = store.len(), "Loaded index generation");

        Ok(IndexSnapshot {
            generation: id.to_string(),
            identity,
            index,
            store,
        })
    }

    /// Report of the given generation, when readable.
    pub fn manifest(&self, id: &str) -> Option<IngestionReport> {
        let bytes = std::fs::read(self.generation(id).manifest_path()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Remove everything. `CURRENT` goes first so the index is absent at once.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(self.current_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match std::fs::remove_dir_all(self.generations_dir()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(root = %self.root.display(), "Cleared persisted index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use tempfile::TempDir;

    fn identity() -> ModelIdentity {
        ModelIdentity {
            provider: "test".to_string(),
            model: "unit".to_string(),
            dimensions: 2,
        }
    }

    fn report(generation: &str) -> IngestionReport {
        IngestionReport {
            generation: generation.to_string(),
            documents_dir: PathBuf::from("docs"),
            documents_ingested: 1,
            chunks: 2,
            skipped: vec![],
            identity: identity(),
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    fn chunk(id: u64) -> Chunk {
        Chunk {
            id,
            source: "doc.txt".to_string(),
            char_start: 0,
            char_end: 1,
            text: format!("chunk {}", id),
        }
    }

    fn write_generation(layout: &IndexLayout, ids: &[u64], store_ids: &[u64]) -> Generation {
        let generation = layout.stage().unwrap();
        let index = FlatIndex::build(
            2,
            ids.to_vec(),
            ids.iter().map(|&i| vec![i as f32, 1.0]).collect(),
        )
        .unwrap();
        let store =
            ChunkStore::new(identity(), store_ids.iter().map(|&i| chunk(i)).collect()).unwrap();
        layout
            .write(&generation, &identity(), &index, &store, &report(&generation.id))
            .unwrap();
        generation
    }

    #[test]
    fn test_no_current_means_not_ingested() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        assert_eq!(layout.current().unwrap(), None);
    }

    #[test]
    fn test_commit_and_load() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let generation = write_generation(&layout, &[0, 1], &[0, 1]);

        // Staged but uncommitted data is invisible
        assert_eq!(layout.current().unwrap(), None);

        layout.commit(&generation).unwrap();
        assert_eq!(layout.current().unwrap(), Some(generation.id.clone()));

        let snapshot = layout.load(&generation.id).unwrap();
        assert_eq!(snapshot.index.len(), 2);
        assert_eq!(snapshot.store.get(1).unwrap().text, "chunk 1");
        assert_eq!(layout.manifest(&generation.id).unwrap().chunks, 2);
    }

    #[test]
    fn test_id_mismatch_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let generation = write_generation(&layout, &[0, 1], &[0, 2]);
        layout.commit(&generation).unwrap();

        assert!(matches!(
            layout.load(&generation.id),
            Err(StoreError::IndexCorrupt { .. })
        ));
    }

    #[test]
    fn test_missing_store_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let generation = write_generation(&layout, &[0], &[0]);
        layout.commit(&generation).unwrap();
        std::fs::remove_file(generation.store_path()).unwrap();

        assert!(matches!(
            layout.load(&generation.id),
            Err(StoreError::IndexCorrupt { .. })
        ));
    }

    #[test]
    fn test_prune_keeps_current_and_previous() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());

        let first = write_generation(&layout, &[0], &[0]);
        layout.commit(&first).unwrap();
        let second = write_generation(&layout, &[0], &[0]);
        layout.commit(&second).unwrap();
        let third = write_generation(&layout, &[0], &[0]);
        layout.commit(&third).unwrap();

        assert!(!first.dir.exists());
        assert!(second.dir.exists());
        assert!(third.dir.exists());
    }

    #[test]
    fn test_clear_removes_everything() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let generation = write_generation(&layout, &[0], &[0]);
        layout.commit(&generation).unwrap();

        layout.clear().unwrap();
        assert_eq!(layout.current().unwrap(), None);
        assert!(!generation.dir.exists());

        // Clearing twice is fine
        layout.clear().unwrap();
    }
}
