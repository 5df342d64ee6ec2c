//! Process-wide record of the member currently using the application.
//!
//! The identity lives in memory for fast reads and is mirrored to durable
//! storage so a restart restores it. Consumers receive a [`SessionHandle`];
//! only this module mutates the identity.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub type SessionHandle = Arc<SessionStore>;

/// Durable backing for the session identity.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn save(&self, identity: &str) -> Result<(), SessionError>;
    fn remove(&self) -> Result<(), SessionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    user_email: String,
}

/// Stores the identity as a small JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        let persisted: PersistedSession =
            serde_json::from_slice(&raw).map_err(|source| SessionError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(persisted.user_email).filter(|identity| !identity.is_empty()))
    }

    fn save(&self, identity: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let body = serde_json::to_vec(&PersistedSession {
            user_email: identity.to_string(),
        })
        .map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(|err| self.io_error(err))
    }

    fn remove(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Volatile storage, useful when nothing should outlive the process.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStorage {
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(identity.into())),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slot.lock().expect("session mutex poisoned").clone())
    }

    fn save(&self, identity: &str) -> Result<(), SessionError> {
        *self.slot.lock().expect("session mutex poisoned") = Some(identity.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), SessionError> {
        self.slot.lock().expect("session mutex poisoned").take();
        Ok(())
    }
}

pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    identity: RwLock<Option<String>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Read the durable identity once. Unreadable storage starts the process
    /// signed out rather than failing boot.
    pub fn restore(storage: impl SessionStorage + 'static) -> SessionHandle {
        let identity = match storage.load() {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "discarding unreadable session");
                None
            }
        };
        debug!(restored = identity.is_some(), "session restored");

        Arc::new(Self {
            storage: Box::new(storage),
            identity: RwLock::new(identity),
        })
    }

    pub fn identity(&self) -> Option<String> {
        self.identity.read().expect("session lock poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.read().expect("session lock poisoned").is_some()
    }

    /// Greeting name: the part of the identity before `@`.
    pub fn display_name(&self) -> Option<String> {
        self.identity().map(|identity| display_name(&identity))
    }

    /// Record a verified identity. The in-memory value is set even when the
    /// durable write fails; the error is returned so callers can log it.
    pub fn set(&self, identity: &str) -> Result<(), SessionError> {
        *self.identity.write().expect("session lock poisoned") = Some(identity.to_string());
        self.storage.save(identity)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.identity.write().expect("session lock poisoned").take();
        self.storage.remove()
    }
}

pub fn display_name(identity: &str) -> String {
    identity
        .split('@')
        .next()
        .unwrap_or(identity)
        .to_string()
}
