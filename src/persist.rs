//! Typed persistence adapter for the workflow entries that survive a
//! restart: the session id and the serialized profile. One method per
//! logical key; malformed entries read back as `None` and are reported at
//! debug level only, never to the user.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use crate::api::ProfileResponse;
use crate::paths;

pub trait StateStore: Send + Sync {
    fn session_id(&self) -> Option<String>;
    fn set_session_id(&self, id: Option<&str>);
    fn profile(&self) -> Option<ProfileResponse>;
    fn set_profile(&self, profile: Option<&ProfileResponse>);
}

pub struct FileStateStore {
    session_path: PathBuf,
    profile_path: PathBuf,
}

impl FileStateStore {
    pub fn new(state_root: &std::path::Path) -> anyhow::Result<Self> {
        fs::create_dir_all(state_root)?;
        Ok(Self {
            session_path: paths::session_file(state_root),
            profile_path: paths::profile_file(state_root),
        })
    }
}

impl StateStore for FileStateStore {
    fn session_id(&self) -> Option<String> {
        match fs::read_to_string(&self.session_path) {
            Ok(s) => {
                let id = s.trim().to_string();
                if id.is_empty() { None } else { Some(id) }
            }
            Err(_) => None,
        }
    }

    fn set_session_id(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Err(e) = fs::write(&self.session_path, id) {
                    debug!("failed to persist session id: {}", e);
                }
            }
            None => { let _ = fs::remove_file(&self.session_path); }
        }
    }

    fn profile(&self) -> Option<ProfileResponse> {
        let text = fs::read_to_string(&self.profile_path).ok()?;
        match serde_json::from_str(&text) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("discarding malformed persisted profile: {}", e);
                None
            }
        }
    }

    fn set_profile(&self, profile: Option<&ProfileResponse>) {
        match profile {
            Some(p) => match serde_json::to_string(p) {
                Ok(text) => {
                    if let Err(e) = fs::write(&self.profile_path, text) {
                        debug!("failed to persist profile: {}", e);
                    }
                }
                Err(e) => debug!("failed to serialize profile: {}", e),
            },
            None => { let _ = fs::remove_file(&self.profile_path); }
        }
    }
}

/// In-memory fake mirroring the file store, for container tests.
#[derive(Default)]
pub struct MemoryStateStore {
    session_id: Mutex<Option<String>>,
    /// Stored as the serialized form so corrupt-entry behavior can be
    /// exercised the same way as on disk.
    profile_json: Mutex<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: plant a raw (possibly corrupt) serialized profile.
    pub fn put_raw_profile(&self, raw: &str) {
        *self.profile_json.lock() = Some(raw.to_string());
    }
}

impl StateStore for MemoryStateStore {
    fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn set_session_id(&self, id: Option<&str>) {
        *self.session_id.lock() = id.map(|s| s.to_string());
    }

    fn profile(&self) -> Option<ProfileResponse> {
        let raw = self.profile_json.lock().clone()?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!("discarding malformed persisted profile: {}", e);
                None
            }
        }
    }

    fn set_profile(&self, profile: Option<&ProfileResponse>) {
        *self.profile_json.lock() = profile.and_then(|p| serde_json::to_string(p).ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ColumnStats;

    fn sample_profile() -> ProfileResponse {
        ProfileResponse {
            dataset_id: None,
            filename: Some("orders.csv".to_string()),
            row_count: 120,
            columns: vec![ColumnStats {
                name: "amount".to_string(),
                dtype: "float64".to_string(),
                null_count: 0,
                null_pct: 0.0,
                stats: None,
            }],
            sample_rows: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn session_id_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        store.set_session_id(Some("s1"));

        let reopened = FileStateStore::new(dir.path()).unwrap();
        assert_eq!(reopened.session_id().as_deref(), Some("s1"));
        reopened.set_session_id(None);
        assert!(store.session_id().is_none());
    }

    #[test]
    fn profile_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        let profile = sample_profile();
        store.set_profile(Some(&profile));

        let reopened = FileStateStore::new(dir.path()).unwrap();
        assert_eq!(reopened.profile(), Some(profile));
    }

    #[test]
    fn corrupt_profile_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(paths::profile_file(dir.path()), "{not json").unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        assert!(store.profile().is_none());
    }

    #[test]
    fn memory_store_corrupt_profile_reads_as_none() {
        let store = MemoryStateStore::new();
        store.put_raw_profile("[[[");
        assert!(store.profile().is_none());
        store.set_profile(Some(&sample_profile()));
        assert_eq!(store.profile().unwrap().row_count, 120);
    }
}
