//! Process-wide cache of the loaded index snapshot.
//!
//! Readers share one immutable `Arc<IndexSnapshot>`. The cache re-reads
//! `CURRENT` on every lookup, so a commit or a clear from this or another
//! process is seen by the next request; `invalidate` additionally drops the
//! in-memory copy right after this process ingests or clears.

use crate::error::StoreError;
use crate::persist::{IndexLayout, IndexSnapshot};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct IndexCache {
    layout: IndexLayout,
    slot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl IndexCache {
    pub fn new(layout: IndexLayout) -> Self {
        Self {
            layout,
            slot: RwLock::new(None),
        }
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    /// Snapshot of the active generation, loading it on first use.
    ///
    /// Fails with `IndexNotFound` when nothing has been ingested.
    pub async fn snapshot(&self) -> Result<Arc<IndexSnapshot>, StoreError> {
        let mut generation = self.resolve_current().await?;

        {
            let slot = self.slot.read().await;
            if let Some(snapshot) = slot.as_ref() {
                if snapshot.generation == generation {
                    return Ok(snapshot.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(snapshot) = slot.as_ref() {
            if snapshot.generation == generation {
                return Ok(snapshot.clone());
            }
        }

        // A generation may be pruned between resolving and loading it when
        // two ingestions commit in quick succession; retry once on the new one.
        let snapshot = match self.load(&generation).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let latest = self.resolve_current().await?;
                if latest == generation {
                    return Err(err);
                }
                generation = latest;
                self.load(&generation).await?
            }
        };

        let snapshot = Arc::new(snapshot);
        *slot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the cached snapshot. In-flight readers keep their own `Arc`.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            tracing::debug!("Invalidated cached index snapshot");
        }
    }

    /// Generation currently held in memory, if any.
    pub async fn cached_generation(&self) -> Option<String> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|snapshot| snapshot.generation.clone())
    }

    async fn resolve_current(&self) -> Result<String, StoreError> {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || {
            layout
                .current()?
                .ok_or_else(|| StoreError::IndexNotFound(layout.root().to_path_buf()))
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?
    }

    async fn load(&self, generation: &str) -> Result<IndexSnapshot, StoreError> {
        let layout = self.layout.clone();
        let generation = generation.to_string();
        tokio::task::spawn_blocking(move || layout.load(&generation))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::embeddings::ModelIdentity;
    use crate::index::FlatIndex;
    use crate::store::ChunkStore;
    use crate::types::IngestionReport;
    use tempfile::TempDir;

    fn commit_one(layout: &IndexLayout, text: &str) -> String {
        let identity = ModelIdentity {
            provider: "test".to_string(),
            model: "unit".to_string(),
            dimensions: 1,
        };
        let generation = layout.stage().unwrap();
        let index = FlatIndex::build(1, vec![0], vec![vec![1.0]]).unwrap();
        let store = ChunkStore::new(
            identity.clone(),
            vec![Chunk {
                id: 0,
                source: "a.txt".to_string(),
                char_start: 0,
                char_end: text.chars().count(),
                text: text.to_string(),
            }],
        )
        .unwrap();
        let report = IngestionReport {
            generation: generation.id.clone(),
            documents_dir: layout.root().to_path_buf(),
            documents_ingested: 1,
            chunks: 1,
            skipped: vec![],
            identity: identity.clone(),
            started_at: chrono::Utc::now(),
            duration_ms: 0,
        };
        layout
            .write(&generation, &identity, &index, &store, &report)
            .unwrap();
        layout.commit(&generation).unwrap();
        generation.id
    }

    #[tokio::test]
    async fn test_not_ingested() {
        let temp = TempDir::new().unwrap();
        let cache = IndexCache::new(IndexLayout::new(temp.path()));
        assert!(matches!(
            cache.snapshot().await,
            Err(StoreError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_reused_until_generation_changes() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let cache = IndexCache::new(layout.clone());

        let first_id = commit_one(&layout, "first");
        let first = cache.snapshot().await.unwrap();
        let again = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.cached_generation().await, Some(first_id));

        commit_one(&layout, "second");
        let second = cache.snapshot().await.unwrap();
        assert_eq!(second.store.get(0).unwrap().text, "second");
        // The old snapshot is still intact for whoever holds it
        assert_eq!(first.store.get(0).unwrap().text, "first");
    }

    #[tokio::test]
    async fn test_clear_is_seen_immediately() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let cache = IndexCache::new(layout.clone());

        commit_one(&layout, "text");
        cache.snapshot().await.unwrap();

        layout.clear().unwrap();
        assert!(matches!(
            cache.snapshot().await,
            Err(StoreError::IndexNotFound(_))
        ));

        cache.invalidate().await;
        assert_eq!(cache.cached_generation().await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_snapshots_on_single_thread() {
        let temp = TempDir::new().unwrap();
        let layout = IndexLayout::new(temp.path());
        let cache = Arc::new(IndexCache::new(layout.clone()));
        commit_one(&layout, "shared");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.snapshot().await })
            })
            .collect();
        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap().unwrap());
        }

        // Every reader ends up on the single cached copy
        let cached = cache.snapshot().await.unwrap();
        assert!(snapshots.iter().all(|s| s.generation == cached.generation));
        assert_eq!(cached.store.get(0).unwrap().text, "shared");
    }
}
