//! Process-wide session state: the credential token and its persistence.
//!
//! DESIGN
//! ======
//! The token is owned exclusively by [`SessionStore`] and only ever
//! replaced wholesale — readers get a whole `String` clone, never a view
//! that could observe a torn update mid-attempt. Durable storage sits
//! behind the [`TokenStore`] trait so tests can run with independent
//! in-memory stores; the production impl keeps one file under the user
//! config directory, a single named slot whose absence means logged out.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Durable storage for the credential token.
pub trait TokenStore: Send + Sync {
    /// The persisted token, if any.
    fn load(&self) -> Option<String>;
    /// Persist a freshly issued token, replacing any previous one.
    fn save(&self, token: &str);
    /// Wipe the persisted token.
    fn clear(&self);
}

/// [`TokenStore`] keeping the token in a single file under the user
/// config directory.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store at the default location (`<config dir>/penwatch/access_token`).
    ///
    /// Returns `None` when the platform exposes no config directory.
    #[must_use]
    pub fn new() -> Option<Self> {
        let dir = dirs::config_dir()?;
        Some(Self::at(dir.join("penwatch").join("access_token")))
    }

    /// Store at an explicit path.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        if token.is_empty() {
            return None;
        }
        Some(token.to_owned())
    }

    fn save(&self, token: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(error) = std::fs::create_dir_all(parent) {
                tracing::warn!(%error, "failed to create credential directory");
                return;
            }
        }
        if let Err(error) = std::fs::write(&self.path, token) {
            tracing::warn!(%error, "failed to persist credential token");
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => tracing::warn!(%error, "failed to wipe credential token"),
        }
    }
}

/// In-memory [`TokenStore`] for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &str) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Holder of the current credential token.
///
/// Created once at startup; the network clients each borrow a read-only
/// copy of the token per call or connection attempt. Cloning the store
/// shares the same underlying slot.
#[derive(Clone)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
    storage: Arc<dyn TokenStore>,
}

impl SessionStore {
    /// Build a store over the given durable storage, picking up any
    /// previously persisted token.
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStore>) -> Self {
        let token = storage.load();
        Self {
            token: Arc::new(RwLock::new(token)),
            storage,
        }
    }

    /// Whole-copy read of the current token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Replace the token wholesale and persist it.
    pub fn login(&self, token: String) {
        self.storage.save(&token);
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Clear the token and wipe it from durable storage.
    ///
    /// Called on explicit logout and on any authentication failure
    /// reported by either network client.
    pub fn logout(&self) {
        self.storage.clear();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
