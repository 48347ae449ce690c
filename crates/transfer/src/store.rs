//! On-disk persistence of upload sessions.
//!
//! Each session is one pretty-printed JSON file named `<session-id>.json`,
//! so an upload interrupted by a crash or a killed app can be resumed from
//! its acknowledged chunk set.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::TransferError;
use crate::session::UploadSession;

const EXTENSION: &str = "json";

/// Directory-backed store of [`UploadSession`] records.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a session to disk, replacing any previous record.
    ///
    /// The record is written to a temporary file and renamed into place so a
    /// crash mid-write leaves the previous record intact.
    pub fn save(&self, session: &UploadSession) -> Result<(), TransferError> {
        let path = self.path_for(session.id())?;
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(
            session = %session.id(),
            acknowledged = session.acknowledged_count(),
            status = %session.status(),
            "persisted upload session"
        );
        Ok(())
    }

    /// Loads a session by ID.
    pub fn load(&self, session_id: &str) -> Result<UploadSession, TransferError> {
        let path = self.path_for(session_id)?;
        if !path.exists() {
            return Err(TransferError::SessionNotFound(session_id.to_string()));
        }
        read_session(&path)
    }

    /// Deletes a session record. Returns `false` if there was nothing to delete.
    pub fn remove(&self, session_id: &str) -> Result<bool, TransferError> {
        let path = self.path_for(session_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(session = %session_id, "removed upload session");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns every readable session, oldest first.
    ///
    /// Unreadable or invalid records are skipped with a warning rather than
    /// failing the whole listing.
    pub fn list(&self) -> Result<Vec<UploadSession>, TransferError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match read_session(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
            }
        }
        sessions.sort_by_key(|s| s.created_at());
        Ok(sessions)
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, TransferError> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.{EXTENSION}")))
    }
}

/// Rejects IDs that could escape the store directory.
fn validate_session_id(session_id: &str) -> Result<(), TransferError> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TransferError::InvalidInput(format!(
            "invalid session id: {session_id:?}"
        )))
    }
}

fn read_session(path: &Path) -> Result<UploadSession, TransferError> {
    let data = std::fs::read_to_string(path)?;
    let session: UploadSession = serde_json::from_str(&data)?;
    session.validate()?;
    Ok(session)
}

/// Returns the default session directory (`<config dir>/roost/uploads`).
pub fn default_state_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("roost").join("uploads"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_protocol::UploadStatus;
    use tempfile::TempDir;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("uploads"));

        let mut session = UploadSession::new(10, 4).unwrap();
        session.start().unwrap();
        session.mark_acknowledged(0).unwrap();
        store.save(&session).unwrap();

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.status(), UploadStatus::Uploading);
        assert_eq!(loaded.next_pending_index(), Some(1));
    }

    #[test]
    fn save_overwrites_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        let mut session = UploadSession::new(10, 4).unwrap();
        store.save(&session).unwrap();
        session.mark_acknowledged(2).unwrap();
        store.save(&session).unwrap();

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded.acknowledged_count(), 1);
        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn load_missing_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(matches!(
            store.load("18c2f4a9b10-abc"),
            Err(TransferError::SessionNotFound(_))
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        let session = UploadSession::new(10, 4).unwrap();
        store.save(&session).unwrap();

        assert!(store.remove(session.id()).unwrap());
        assert!(!store.remove(session.id()).unwrap());
        assert!(store.load(session.id()).is_err());
    }

    #[test]
    fn list_sorted_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        let first = UploadSession::new(10, 4).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = UploadSession::new(20, 4).unwrap();
        store.save(&second).unwrap();
        store.save(&first).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("never-created"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn path_traversal_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        for bad in ["", "../etc/passwd", "a/b", "a\\b", "x.json"] {
            assert!(
                matches!(store.load(bad), Err(TransferError::InvalidInput(_))),
                "id {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn default_state_dir_mentions_roost() {
        if let Some(dir) = default_state_dir() {
            assert!(dir.to_string_lossy().contains("roost"));
        }
    }
}
