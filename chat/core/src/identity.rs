//! Session State Store
//!
//! The advisory sign-in flag and identity, persisted in a small key-value
//! store. The state is read once when a surface starts and changes only by an
//! explicit [`SessionStore::sign_in`] or [`SessionStore::sign_out`]; nothing
//! here authenticates anyone.
//!
//! # Persisted Keys
//!
//! | Key          | Value                 |
//! |--------------|-----------------------|
//! | `isLoggedIn` | `"true"` or absent    |
//! | `userEmail`  | the identity or absent|
//!
//! There is no locking across processes; the last writer wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Timelike;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key holding the signed-in flag
pub const SIGNED_IN_KEY: &str = "isLoggedIn";
/// Key holding the identity string
pub const IDENTITY_KEY: &str = "userEmail";
/// Name shown when nobody is signed in
pub const GUEST_NAME: &str = "Guest";

const WELCOME_PROMPT: &str = "Can I help you with anything?";
const GUEST_TIP: &str =
    "Tip: Create an account to save your chat history and get personalized recommendations!";

/// Persisted store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// Backing file
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The backing file is not a JSON string map
    #[error("store file is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A tiny async string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// Memory Store
// ============================================================================

/// Ephemeral in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial entries
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// JSON map on disk
///
/// The file is read once on open and rewritten in full on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Session store opened");

        Ok(Self {
            path,
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    /// Default location under the platform data directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("recipe-chat").join("session.json"))
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await.map_err(io_err)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Sign-in state as last loaded or changed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Whether a user is signed in
    pub signed_in: bool,
    /// The signed-in identity (an email address), empty for guests
    pub identity: String,
}

impl SessionState {
    /// A signed-in state
    pub fn signed_in(identity: impl Into<String>) -> Self {
        Self {
            signed_in: true,
            identity: identity.into(),
        }
    }

    /// The guest state
    #[must_use]
    pub fn guest() -> Self {
        Self::default()
    }

    fn has_named_identity(&self) -> bool {
        self.signed_in && !local_part(&self.identity).is_empty()
    }

    /// Name to greet the user by
    ///
    /// The identity's local-part with its first character upper-cased, or
    /// `"Guest"` when signed out or the local-part is empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.has_named_identity() {
            return GUEST_NAME.to_string();
        }

        let local = local_part(&self.identity);
        let mut chars = local.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => GUEST_NAME.to_string(),
        }
    }

    /// Single character for the avatar badge
    #[must_use]
    pub fn avatar_initial(&self) -> char {
        self.display_name().chars().next().unwrap_or('G')
    }

    /// Greeting for a local hour (0-23)
    #[must_use]
    pub fn greeting_at(&self, hour: u32) -> String {
        format!("{}, {}", time_of_day(hour), self.display_name())
    }

    /// Welcome screen shown while the transcript is empty
    #[must_use]
    pub fn welcome_at(&self, hour: u32) -> Welcome {
        Welcome {
            greeting: self.greeting_at(hour),
            prompt: WELCOME_PROMPT.to_string(),
            tip: (!self.signed_in).then(|| GUEST_TIP.to_string()),
        }
    }
}

/// Empty-transcript welcome content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// e.g. "Good evening, Chef.maria"
    pub greeting: String,
    /// The question under the greeting
    pub prompt: String,
    /// Sign-up hint, shown only when signed out
    pub tip: Option<String>,
}

fn local_part(identity: &str) -> &str {
    identity.split('@').next().unwrap_or_default()
}

fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    }
}

fn local_hour() -> u32 {
    chrono::Local::now().hour()
}

// ============================================================================
// Session Store
// ============================================================================

/// Sign-in state backed by a persisted store
pub struct SessionStore<S: KeyValueStore> {
    store: S,
    state: SessionState,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Read the persisted state once
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    pub async fn load(store: S) -> Result<Self, StoreError> {
        let signed_in = store.get(SIGNED_IN_KEY).await?.as_deref() == Some("true");
        let identity = store.get(IDENTITY_KEY).await?.unwrap_or_default();

        tracing::debug!(signed_in, "Session state loaded");

        Ok(Self {
            store,
            state: SessionState {
                signed_in,
                identity,
            },
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a sign-in, then update the in-memory state
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; memory is left unchanged.
    pub async fn sign_in(&mut self, identity: &str) -> Result<(), StoreError> {
        let identity = identity.trim();
        self.store.set(SIGNED_IN_KEY, "true").await?;
        self.store.set(IDENTITY_KEY, identity).await?;
        self.state = SessionState::signed_in(identity);

        tracing::info!(name = %self.state.display_name(), "Signed in");
        Ok(())
    }

    /// Remove the persisted keys and clear the in-memory state
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; memory is left unchanged.
    pub async fn sign_out(&mut self) -> Result<(), StoreError> {
        self.store.remove(SIGNED_IN_KEY).await?;
        self.store.remove(IDENTITY_KEY).await?;
        self.state = SessionState::guest();

        tracing::info!("Signed out");
        Ok(())
    }

    /// Name to greet the user by
    #[must_use]
    pub fn display_name(&self) -> String {
        self.state.display_name()
    }

    /// Single character for the avatar badge
    #[must_use]
    pub fn avatar_initial(&self) -> char {
        self.state.avatar_initial()
    }

    /// Greeting for the current local time
    #[must_use]
    pub fn greeting(&self) -> String {
        self.state.greeting_at(local_hour())
    }

    /// Welcome screen for the current local time
    #[must_use]
    pub fn welcome(&self) -> Welcome {
        self.state.welcome_at(local_hour())
    }
}

impl<S: KeyValueStore> std::fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
