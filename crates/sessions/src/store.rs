//! Persistent key-value-like store keyed by `session_id`.
//!
//! Grounded on the gateway's JSON-file session store (load on
//! construction, flush-whole-map-on-write, `parking_lot` guarded),
//! generalized from a `session_key -> SessionEntry` map to
//! `Uuid -> Session` and extended with `purge_before`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use sa_domain::{Error, Result, Session};

/// Metadata-only projection returned by `list_sessions`.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistent, thread-safe, JSON-file-backed session store. Storing the
/// whole session object per save is acceptable: sessions are small
/// relative to model latencies.
pub struct SessionStore {
    path: PathBuf,
    sessions: RwLock<HashMap<Uuid, Session>>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };
        tracing::info!(sessions = sessions.len(), path = %path.display(), "session store loaded");
        Ok(Self {
            path,
            sessions: RwLock::new(sessions),
            write_lock: Mutex::new(()),
        })
    }

    /// Upsert a session, replacing any prior version by `session_id`.
    pub fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock();
        {
            let mut sessions = self.sessions.write();
            sessions.insert(session.session_id, session.clone());
        }
        self.flush_locked()
    }

    pub fn load(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let removed = {
            let mut sessions = self.sessions.write();
            sessions.remove(&id).is_some()
        };
        if removed {
            self.flush_locked()?;
        }
        Ok(removed)
    }

    /// Sessions sorted by `updated_at` descending.
    pub fn list_sessions(&self, limit: usize, offset: usize) -> Vec<SessionSummary> {
        let mut all: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .map(|s| SessionSummary {
                session_id: s.session_id,
                created_at: s.created_at,
                updated_at: s.updated_at,
            })
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.into_iter().skip(offset).take(limit).collect()
    }

    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let removed;
        {
            let mut sessions = self.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, s| s.updated_at >= cutoff);
            removed = before - sessions.len();
        }
        self.flush_locked()?;
        Ok(removed)
    }

    fn flush_locked(&self) -> Result<()> {
        let sessions = self.sessions.read();
        let text = serde_json::to_string_pretty(&*sessions)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }
        std::fs::write(&self.path, text).map_err(Error::Io)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json")).unwrap();
        let session = Session::new(4096);
        let id = session.session_id;
        store.save(&session).unwrap();
        let loaded = store.load(id).unwrap();
        assert_eq!(loaded.session_id, id);
    }

    #[test]
    fn delete_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json")).unwrap();
        let session = Session::new(0);
        let id = session.session_id;
        store.save(&session).unwrap();
        assert!(store.delete(id).unwrap());
        assert!(store.load(id).is_none());
        assert!(!store.delete(id).unwrap());
    }

    #[test]
    fn list_sessions_sorted_by_updated_at_desc() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json")).unwrap();
        let mut older = Session::new(0);
        older.updated_at = Utc::now() - chrono::Duration::seconds(60);
        let newer = Session::new(0);
        store.save(&older).unwrap();
        store.save(&newer).unwrap();
        let list = store.list_sessions(10, 0);
        assert_eq!(list[0].session_id, newer.session_id);
        assert_eq!(list[1].session_id, older.session_id);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let session = Session::new(0);
        let id = session.session_id;
        {
            let store = SessionStore::new(&path).unwrap();
            store.save(&session).unwrap();
        }
        let reopened = SessionStore::new(&path).unwrap();
        assert!(reopened.load(id).is_some());
    }
}
