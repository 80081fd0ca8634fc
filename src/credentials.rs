//! Credential storage. Presence of a token means "authenticated"; the
//! backend is the sole authority on validity, so nothing here inspects or
//! expires the token. Writers are last-write-wins with no locking across
//! processes.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use crate::paths;

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn clear(&self);
    fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }
}

/// Durable store: one token file under the state root. Survives restarts and
/// is shared by every client instance pointed at the same root.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(state_root: &std::path::Path) -> anyhow::Result<Self> {
        fs::create_dir_all(state_root)?;
        Ok(Self { path: paths::credential_file(state_root) })
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(s) => {
                let token = s.trim().to_string();
                if token.is_empty() { None } else { Some(token) }
            }
            Err(_) => None,
        }
    }

    fn set(&self, token: &str) {
        if let Err(e) = fs::write(&self.path, token) {
            debug!("failed to persist credential: {}", e);
        }
    }

    fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// In-memory fake for tests and for callers that must not touch disk.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn set(&self, token: &str) {
        *self.token.lock() = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.lock() = None;
    }
}
