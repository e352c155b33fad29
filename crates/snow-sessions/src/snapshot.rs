//! `SnapshotStore` — content-addressed workspace snapshots (§2 point 1,
//! §4.4 step 3/7g).
//!
//! Layout: `<root>/blobs/<hash[0..2]>/<hash>` holds file bytes keyed by their
//! sha256 hex digest (git's object-store idiom); `<root>/<sessionId>/
//! manifest.json` lists, in increasing `messageIndex` order, which files
//! existed at that point and which blob holds each one (P4). `create` only
//! queues a snapshot in memory — the caller commits at well-defined points
//! in the turn (§4.4 step 9), retrying the flush rather than blocking the
//! hot path on every tool result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::error::{Result, SessionError};
use crate::types::SessionId;

const COMMIT_MAX_ATTEMPTS: u32 = 10;
const COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// One file captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFileEntry {
    pub path: String,
    pub content_hash: String,
}

/// One snapshot: the files captured at a given message index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub message_index: usize,
    pub file_count: usize,
    pub files: Vec<SnapshotFileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Manifest {
    entries: Vec<SnapshotEntry>,
}

/// A snapshot queued in memory, not yet flushed to disk.
struct Pending {
    message_index: usize,
    files: Vec<(String, Vec<u8>)>,
}

pub struct SnapshotStore {
    root: PathBuf,
    pending: DashMap<SessionId, Vec<Pending>>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), pending: DashMap::new() }
    }

    /// Queue a new snapshot for `session_id` at `message_index`. Cheap and
    /// synchronous-feeling: no disk I/O happens until `commit`.
    pub fn create(&self, session_id: &SessionId, message_index: usize, files: Vec<(String, Vec<u8>)>) {
        self.pending
            .entry(session_id.clone())
            .or_default()
            .push(Pending { message_index, files });
    }

    /// Flush all snapshots queued for `session_id` to disk. Retries the
    /// whole flush up to `COMMIT_MAX_ATTEMPTS` times (5s timeout per
    /// attempt); if every attempt fails, the pending queue is force-cleared
    /// (the in-flight data is dropped, not retried indefinitely) and an
    /// error is returned so the caller can log the loss (§4.4 step 9).
    pub async fn commit(&self, session_id: &SessionId) -> Result<()> {
        let Some((_, pending)) = self.pending.remove(session_id) else {
            return Ok(());
        };
        if pending.is_empty() {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(COMMIT_TIMEOUT, self.flush(session_id, &pending)).await;
            match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) if attempt >= COMMIT_MAX_ATTEMPTS => {
                    error!(session = %session_id, attempt, error = %e, "snapshot commit exhausted, dropping");
                    return Err(SessionError::CommitExhausted { attempts: attempt, dropped: pending.len() });
                }
                Err(_elapsed) if attempt >= COMMIT_MAX_ATTEMPTS => {
                    error!(session = %session_id, attempt, "snapshot commit timed out repeatedly, dropping");
                    return Err(SessionError::CommitExhausted { attempts: attempt, dropped: pending.len() });
                }
                Ok(Err(e)) => {
                    warn!(session = %session_id, attempt, error = %e, "snapshot commit attempt failed, retrying");
                }
                Err(_elapsed) => {
                    warn!(session = %session_id, attempt, "snapshot commit attempt timed out, retrying");
                }
            }
        }
    }

    /// List committed snapshot entries, oldest (lowest messageIndex) first.
    pub async fn list(&self, session_id: &SessionId) -> Result<Vec<SnapshotEntry>> {
        Ok(self.read_manifest(session_id).await?.entries)
    }

    /// Reconstruct each tracked file's content as of `message_index`: the
    /// most recent snapshot entry with `message_index <= target` wins per
    /// file path.
    pub async fn rollback(&self, session_id: &SessionId, message_index: usize) -> Result<HashMap<String, Vec<u8>>> {
        let manifest = self.read_manifest(session_id).await?;
        let mut latest: HashMap<String, String> = HashMap::new();

        for entry in manifest.entries.iter().filter(|e| e.message_index <= message_index) {
            for file in &entry.files {
                latest.insert(file.path.clone(), file.content_hash.clone());
            }
        }

        let mut out = HashMap::new();
        for (path, hash) in latest {
            let bytes = tokio::fs::read(self.blob_path(&hash)).await?;
            out.insert(path, bytes);
        }
        Ok(out)
    }

    async fn flush(&self, session_id: &SessionId, pending: &[Pending]) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join("blobs")).await?;

        let mut manifest = match self.read_manifest(session_id).await {
            Ok(m) => m,
            Err(SessionError::NoManifest { .. }) => Manifest::default(),
            Err(e) => return Err(e),
        };

        for snap in pending {
            let mut files = Vec::with_capacity(snap.files.len());
            for (path, bytes) in &snap.files {
                let hash = content_hash(bytes);
                self.write_blob(&hash, bytes).await?;
                files.push(SnapshotFileEntry { path: path.clone(), content_hash: hash });
            }
            manifest.entries.push(SnapshotEntry {
                message_index: snap.message_index,
                file_count: files.len(),
                files,
            });
        }
        manifest.entries.sort_by_key(|e| e.message_index);

        self.write_manifest(session_id, &manifest).await
    }

    async fn write_blob(&self, hash: &str, bytes: &[u8]) -> Result<()> {
        let path = self.blob_path(hash);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(()); // content-addressed: identical bytes, nothing to do
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn read_manifest(&self, session_id: &SessionId) -> Result<Manifest> {
        let path = self.manifest_path(session_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionError::NoManifest { id: session_id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_manifest(&self, session_id: &SessionId, manifest: &Manifest) -> Result<()> {
        let dir = self.root.join(session_id.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join("manifest.json");
        let tmp = dir.join("manifest.json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(manifest)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn manifest_path(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str()).join("manifest.json")
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join("blobs").join(&hash[0..2]).join(hash)
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::new()
    }

    #[tokio::test]
    async fn create_then_commit_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let id = sid();

        store.create(&id, 0, vec![("src/main.rs".to_string(), b"fn main() {}".to_vec())]);
        store.commit(&id).await.unwrap();

        let entries = store.list(&id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message_index, 0);
        assert_eq!(entries[0].files[0].path, "src/main.rs");
    }

    #[tokio::test]
    async fn commit_with_nothing_pending_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.commit(&sid()).await.unwrap();
    }

    #[tokio::test]
    async fn rollback_picks_latest_entry_at_or_before_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let id = sid();

        store.create(&id, 0, vec![("a.txt".to_string(), b"v1".to_vec())]);
        store.commit(&id).await.unwrap();
        store.create(&id, 5, vec![("a.txt".to_string(), b"v2".to_vec())]);
        store.commit(&id).await.unwrap();

        let at_2 = store.rollback(&id, 2).await.unwrap();
        assert_eq!(at_2.get("a.txt").unwrap(), b"v1");

        let at_10 = store.rollback(&id, 10).await.unwrap();
        assert_eq!(at_10.get("a.txt").unwrap(), b"v2");
    }

    #[tokio::test]
    async fn identical_content_shares_one_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let id = sid();

        store.create(&id, 0, vec![("a.txt".to_string(), b"same".to_vec())]);
        store.create(&id, 1, vec![("b.txt".to_string(), b"same".to_vec())]);
        store.commit(&id).await.unwrap();

        let entries = store.list(&id).await.unwrap();
        assert_eq!(entries[0].files[0].content_hash, entries[1].files[0].content_hash);
    }
}
