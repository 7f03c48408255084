//! Content-addressed artifact cache
//!
//! Maps source fingerprints to previously fetched artifacts so repeat
//! requests skip the fetch tool entirely. The filesystem is the source of
//! truth: entries are validated lazily on lookup and dropped when their
//! backing file has disappeared. Capacity is enforced synchronously at
//! insertion by evicting the entry with the oldest creation time; creation
//! age, not last access, drives retention.

use crate::types::{CacheEntry, Fingerprint};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// Fingerprint-keyed table of fetched artifacts
pub struct ArtifactCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    capacity: usize,
}

impl ArtifactCache {
    /// Create an empty cache bounded to `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Look up an artifact by fingerprint
    ///
    /// Returns the entry only while its backing file still exists. A stale
    /// entry is removed on sight and reported as a miss; later lookups do
    /// not resurrect it. The table never outranks the filesystem.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        match entries.get(fingerprint) {
            Some(entry) if entry.artifact_path.exists() => Some(entry.clone()),
            Some(_) => {
                debug!(%fingerprint, "dropping cache entry whose artifact is gone");
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Insert an entry, evicting the oldest-created entry when over capacity
    ///
    /// Eviction is synchronous with insertion, so the table size never
    /// exceeds the capacity bound once this returns. Ties on creation time
    /// are broken arbitrarily.
    pub async fn insert(&self, entry: CacheEntry) {
        let mut entries = self.entries.lock().await;
        entries.insert(entry.fingerprint.clone(), entry);

        if entries.len() > self.capacity {
            let oldest = entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| e.fingerprint.clone());
            if let Some(fingerprint) = oldest {
                debug!(%fingerprint, "evicting oldest cache entry over capacity");
                entries.remove(&fingerprint);
            }
        }
    }

    /// Remove any entry whose artifact path matches `path` by file name
    ///
    /// Used by the cleanup sweeper and by post-delivery deletion to keep
    /// the table consistent with storage. File-name matching lets callers
    /// pass paths from a directory scan without caring whether entries
    /// stored them relative or absolute. Returns whether anything was
    /// removed.
    pub async fn remove_by_artifact_path(&self, path: &Path) -> bool {
        let file_name = path.file_name();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| match (entry.artifact_path.file_name(), file_name) {
            (Some(entry_name), Some(name)) => entry_name != name,
            _ => entry.artifact_path != path,
        });
        before != entries.len()
    }

    /// Number of entries currently in the table
    ///
    /// Counts stale entries that no lookup has dropped yet.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the table is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
