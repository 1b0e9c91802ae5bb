// ── Credential store ──
//
// Process-wide bearer token + user name, persisted so a restarted client
// resumes its session. Reads are lock-free (`ArcSwap`); writes go through
// to the backend.
//
// Access is split by type: `CredentialStore` can write and is handed only
// to the auth gate and the session controller; everything else receives a
// read-only `CredentialView`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CoreError;

// ── Credentials ──────────────────────────────────────────────────────

/// Bearer token and display user name. Both are present or both absent.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Option<SecretString>,
    user_name: Option<String>,
}

impl Credentials {
    /// Authenticated credentials.
    pub fn new(token: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            user_name: Some(user_name.into()),
        }
    }

    /// No session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

// ── Backends ─────────────────────────────────────────────────────────

/// Durable medium behind a [`CredentialStore`].
pub trait CredentialBackend: Send + Sync {
    fn load(&self) -> Result<Credentials, CoreError>;
    fn save(&self, credentials: &Credentials) -> Result<(), CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

/// On-disk form: two named entries.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl From<StoredSession> for Credentials {
    fn from(stored: StoredSession) -> Self {
        match stored.token.filter(|t| !t.is_empty()) {
            Some(token) => Credentials::new(token, stored.user.unwrap_or_default()),
            None => Credentials::anonymous(),
        }
    }
}

impl From<&Credentials> for StoredSession {
    fn from(creds: &Credentials) -> Self {
        Self {
            token: creds.token.as_ref().map(|t| t.expose_secret().to_owned()),
            user: creds.user_name.clone(),
        }
    }
}

/// JSON file at a caller-chosen path.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(path: &Path, e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage {
        message: format!("{}: {e}", path.display()),
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Credentials, CoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Credentials::anonymous());
            }
            Err(e) => return Err(storage_error(&self.path, e)),
        };
        let stored: StoredSession =
            serde_json::from_str(&raw).map_err(|e| storage_error(&self.path, e))?;
        Ok(stored.into())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
        }
        let json = serde_json::to_string(&StoredSession::from(credentials))
            .map_err(|e| storage_error(&self.path, e))?;

        // Write-then-rename; readers never see a partial file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| storage_error(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| storage_error(&self.path, e))
    }

    fn clear(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

/// In-memory medium. Clones share the same slot, so a second store opened
/// on a clone sees what the first one persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<(String, String)>>>,
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<Credentials, CoreError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| CoreError::Internal("credential slot poisoned".into()))?;
        Ok(slot
            .as_ref()
            .map_or_else(Credentials::anonymous, |(t, u)| Credentials::new(t.clone(), u.clone())))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| CoreError::Internal("credential slot poisoned".into()))?;
        *slot = credentials.token().map(|t| {
            (
                t.expose_secret().to_owned(),
                credentials.user_name().unwrap_or_default().to_owned(),
            )
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| CoreError::Internal("credential slot poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}

// ── Store & view ─────────────────────────────────────────────────────

/// Read-write handle to the session credentials.
#[derive(Clone)]
pub struct CredentialStore {
    current: Arc<ArcSwap<Credentials>>,
    backend: Arc<dyn CredentialBackend>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.current.load().is_authenticated())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Open a store, restoring whatever the backend persisted.
    pub fn open(backend: impl CredentialBackend + 'static) -> Result<Self, CoreError> {
        let initial = backend.load()?;
        debug!(authenticated = initial.is_authenticated(), "credential store opened");
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            backend: Arc::new(backend),
        })
    }

    /// Ephemeral store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Credentials::anonymous())),
            backend: Arc::new(MemoryBackend::default()),
        }
    }

    pub fn get(&self) -> Credentials {
        Credentials::clone(&self.current.load())
    }

    /// Replace the session. The token must be non-empty.
    ///
    /// The in-memory value is updated even if persisting fails; the
    /// persistence error is still returned.
    pub fn set(&self, credentials: Credentials) -> Result<(), CoreError> {
        match credentials.token() {
            Some(t) if !t.expose_secret().is_empty() => {}
            _ => {
                return Err(CoreError::ValidationFailed {
                    message: "token must be a non-empty string".into(),
                });
            }
        }
        let result = self.backend.save(&credentials);
        self.current.store(Arc::new(credentials));
        if let Err(ref e) = result {
            warn!(error = %e, "failed to persist credentials");
        }
        result
    }

    /// Drop token and user name together.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.current.store(Arc::new(Credentials::anonymous()));
        let result = self.backend.clear();
        if let Err(ref e) = result {
            warn!(error = %e, "failed to clear persisted credentials");
        }
        result
    }

    /// Read-only handle for components that must not mutate the session.
    pub fn view(&self) -> CredentialView {
        CredentialView {
            current: Arc::clone(&self.current),
        }
    }
}

/// Read-only handle to the session credentials.
#[derive(Clone)]
pub struct CredentialView {
    current: Arc<ArcSwap<Credentials>>,
}

impl std::fmt::Debug for CredentialView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialView").finish_non_exhaustive()
    }
}

impl CredentialView {
    pub fn get(&self) -> Credentials {
        Credentials::clone(&self.current.load())
    }

    /// Current token, exposed for header construction.
    pub fn bearer(&self) -> Option<String> {
        self.current
            .load()
            .token()
            .map(|t| t.expose_secret().to_owned())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_authenticated()
    }
}
