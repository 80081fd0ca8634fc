use std::path::{Path, PathBuf};

/// Centralized helpers for the on-disk state root. Keeping every persisted
/// entry behind one function each eliminates string-key drift between the
/// credential and workflow stores.
#[inline]
pub fn credential_file(state_root: &Path) -> PathBuf { state_root.join("token") }

#[inline]
pub fn session_file(state_root: &Path) -> PathBuf { state_root.join("session_id") }

#[inline]
pub fn profile_file(state_root: &Path) -> PathBuf { state_root.join("profile.json") }

/// Resolve the state root: `DATABOTICS_STATE_DIR`, else `.databotics` under
/// the home directory, else under the current directory.
pub fn default_state_root() -> PathBuf {
    if let Ok(dir) = std::env::var("DATABOTICS_STATE_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".databotics")
}

/// Resolve the backend base URL: `DATABOTICS_API_URL`, else the local dev
/// server default.
pub fn default_api_url() -> String {
    std::env::var("DATABOTICS_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}
