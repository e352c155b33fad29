//! `SessionStore` — the Session Store (§4.5).
//!
//! One JSON file per session under `$SNOW_HOME/sessions/<id>.json`, written
//! atomically (write-to-temp then rename). A per-session lock gives the
//! "single writer, concurrent callers queue" guarantee without a global
//! mutex, generalizing a prior agent runtime's per-resource-map idiom
//! (`TerminalManager`'s `HashMap<SessionId, PtySession>`) from an in-memory
//! map of live handles to a map of file-write locks.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use crate::error::{Result, SessionError};
use crate::types::{Message, Session, SessionId};

/// Lightweight listing entry — avoids deserializing the full message log
/// just to populate a session picker.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub message_count: usize,
}

/// File-backed store for `Session`s.
pub struct SessionStore {
    dir: PathBuf,
    locks: DashMap<SessionId, Arc<AsyncMutex<()>>>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: DashMap::new() }
    }

    /// Create a brand-new session and persist it immediately so a crash
    /// right after creation still leaves a loadable file.
    #[instrument(skip(self))]
    pub async fn create_new_session(&self, ephemeral: bool) -> Result<Session> {
        let session = Session::new(ephemeral);
        self.save_session(&session).await?;
        debug!(id = %session.id, ephemeral, "created session");
        Ok(session)
    }

    pub async fn load_session(&self, id: &SessionId) -> Result<Session> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| SessionError::NotFound { id: id.to_string() })?;
        let session: Session = serde_json::from_slice(&bytes)?;
        Ok(session)
    }

    /// Overwrite the whole session file atomically.
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let lock = self.lock_for(&session.id);
        let _guard = lock.lock().await;
        self.write_atomic(&session.id, session).await
    }

    /// Append one message to a session, durably, under the per-session lock
    /// (§4.5: "a single writer; concurrent callers queue"). Returns the
    /// updated session.
    #[instrument(skip(self, message))]
    pub async fn save_message(&self, id: &SessionId, message: Message) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.read_unlocked(id).await?;
        session.messages.push(message);
        session.updated_at = chrono::Utc::now();
        self.write_atomic(&session.id, &session).await?;
        Ok(session)
    }

    /// Non-ephemeral sessions, newest first (SessionId is UUIDv7, so a plain
    /// string sort would also work, but explicit timestamp sort is clearer).
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let session: Session = match serde_json::from_slice(&bytes) {
                Ok(s) => s,
                Err(_) => continue, // skip unrelated/corrupt files rather than fail the whole listing
            };
            if session.ephemeral {
                continue;
            }
            out.push(SessionSummary {
                id: session.id,
                title: session.title,
                created_at: session.created_at,
                updated_at: session.updated_at,
                message_count: session.messages.len(),
            });
        }

        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionError::NotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_unlocked(&self, id: &SessionId) -> Result<Session> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| SessionError::NotFound { id: id.to_string() })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_atomic(&self, id: &SessionId, session: &Session) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock_for(&self, id: &SessionId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: &str) -> Message {
        Message::user(content)
    }

    #[tokio::test]
    async fn create_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.create_new_session(false).await.unwrap();
        let loaded = store.load_session(&session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn save_message_appends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.create_new_session(false).await.unwrap();

        store.save_message(&session.id, message("hi")).await.unwrap();
        let updated = store.save_message(&session.id, message("again")).await.unwrap();

        assert_eq!(updated.messages.len(), 2);
        let reloaded = store.load_session(&session.id).await.unwrap();
        assert_eq!(reloaded.messages.len(), 2);
        assert!(reloaded.updated_at >= reloaded.created_at);
    }

    #[tokio::test]
    async fn ephemeral_sessions_excluded_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let persistent = store.create_new_session(false).await.unwrap();
        let _ephemeral = store.create_new_session(true).await.unwrap();

        let listing = store.list_sessions().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].id, persistent.id);
    }

    #[tokio::test]
    async fn load_missing_session_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let err = store.load_session(&SessionId::from("nonexistent")).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_appends_preserve_all_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        let session = store.create_new_session(false).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                store.save_message(&id, message(&format!("msg-{i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let reloaded = store.load_session(&session.id).await.unwrap();
        assert_eq!(reloaded.messages.len(), 20);
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = store.create_new_session(false).await.unwrap();
        store.delete_session(&session.id).await.unwrap();
        assert!(matches!(
            store.load_session(&session.id).await.unwrap_err(),
            SessionError::NotFound { .. }
        ));
    }
}
