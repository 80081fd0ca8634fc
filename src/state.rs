//! Workflow state shared by every screen/command: the uploaded file handle,
//! the server session id, the computed profile and the last validation
//! result. Session id and profile write through to the persistence adapter;
//! the file bytes and the validation result are memory-only and die with the
//! process. Consumers subscribe for coarse change notifications.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::api::{ProfileResponse, ValidateResponse};
use crate::persist::StateStore;

/// Raw uploaded bytes plus the user-facing filename. Never serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Hydrating,
    Ready,
}

pub type Subscriber = Box<dyn Fn() + Send + Sync>;

struct Inner {
    phase: Phase,
    session_id: Option<String>,
    uploaded_file: Option<FileHandle>,
    profile: Option<ProfileResponse>,
    validation: Option<ValidateResponse>,
    generation: u64,
}

pub struct WorkflowState {
    store: Arc<dyn StateStore>,
    inner: RwLock<Inner>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl WorkflowState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            inner: RwLock::new(Inner {
                phase: Phase::Hydrating,
                session_id: None,
                uploaded_file: None,
                profile: None,
                validation: None,
                generation: 0,
            }),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Restore persisted sub-state, then flip HYDRATING -> READY exactly
    /// once. Malformed persisted entries were already discarded by the
    /// adapter; nothing here surfaces an error. Repeat calls are no-ops.
    pub fn hydrate(&self) {
        {
            let mut inner = self.inner.write();
            if inner.phase == Phase::Ready {
                return;
            }
            inner.session_id = self.store.session_id();
            inner.profile = self.store.profile();
            if inner.session_id.is_some() || inner.profile.is_some() {
                debug!(
                    "hydrated workflow state (session: {}, profile: {})",
                    inner.session_id.is_some(),
                    inner.profile.is_some()
                );
            }
            inner.phase = Phase::Ready;
        }
        self.notify();
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().phase == Phase::Ready
    }

    pub fn subscribe(&self, f: Subscriber) {
        self.subscribers.write().push(f);
    }

    fn notify(&self) {
        for f in self.subscribers.read().iter() {
            f();
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    pub fn set_session_id(&self, id: Option<String>) {
        {
            let mut inner = self.inner.write();
            self.store.set_session_id(id.as_deref());
            inner.session_id = id;
        }
        self.notify();
    }

    pub fn profile(&self) -> Option<ProfileResponse> {
        self.inner.read().profile.clone()
    }

    pub fn set_profile(&self, profile: Option<ProfileResponse>) {
        {
            let mut inner = self.inner.write();
            self.store.set_profile(profile.as_ref());
            inner.profile = profile;
        }
        self.notify();
    }

    /// Apply a profile only if the uploaded file has not been replaced since
    /// `generation` was sampled. Returns false when the result was dropped
    /// as stale.
    pub fn set_profile_if_current(&self, generation: u64, profile: ProfileResponse) -> bool {
        {
            let mut inner = self.inner.write();
            if inner.generation != generation {
                debug!("dropping profile for superseded upload (gen {} != {})", generation, inner.generation);
                return false;
            }
            self.store.set_profile(Some(&profile));
            inner.profile = Some(profile);
        }
        self.notify();
        true
    }

    pub fn uploaded_file(&self) -> Option<FileHandle> {
        self.inner.read().uploaded_file.clone()
    }

    /// Replacing the file invalidates everything scoped to the previous one:
    /// session id, profile and validation, in memory and on disk. Bumps the
    /// generation so in-flight results against the old file get dropped.
    pub fn set_uploaded_file(&self, file: Option<FileHandle>) {
        {
            let mut inner = self.inner.write();
            inner.uploaded_file = file;
            inner.session_id = None;
            inner.profile = None;
            inner.validation = None;
            inner.generation += 1;
            self.store.set_session_id(None);
            self.store.set_profile(None);
        }
        self.notify();
    }

    pub fn validation(&self) -> Option<ValidateResponse> {
        self.inner.read().validation.clone()
    }

    pub fn set_validation(&self, validation: Option<ValidateResponse>) {
        {
            let mut inner = self.inner.write();
            inner.validation = validation;
        }
        self.notify();
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}
