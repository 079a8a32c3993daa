//! Signed-in user context, threaded explicitly into the data-access layer.
//!
//! `SessionHandle` is the in-memory source of truth shared by the HTTP
//! client and every view. `SessionStore` persists it to a JSON file so the
//! CLI can reuse a login. A 401 from the backend clears both.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::Role;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Bearer token — zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub token: BearerToken,
    pub user_id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Role,
}

impl SessionContext {
    pub fn new(token: &str, user_id: &str, username: &str, role: Role) -> Self {
        Self {
            token: BearerToken::new(token),
            user_id: user_id.to_string(),
            username: username.to_string(),
            full_name: None,
            role,
        }
    }

    pub fn with_full_name(mut self, full_name: &str) -> Self {
        self.full_name = Some(full_name.to_string());
        self
    }

    /// Name shown in headers: full name when known, else username.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

/// On-disk shape. Accepts both `userId` and `user_id`.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(alias = "userId")]
    user_id: serde_json::Value,
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session file is malformed: {0}")]
    Malformed(String),
}

// ═══════════════════════════════════════════════════════════
// SessionStore — JSON file persistence
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under the app data directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::session_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<SessionContext>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSession =
            serde_json::from_str(&raw).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let role = Role::from_str(&stored.role).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let user_id = match &stored.user_id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(StoreError::Malformed(format!("user_id: {other}"))),
        };

        Ok(Some(SessionContext {
            token: BearerToken::new(stored.token.clone()),
            user_id,
            username: stored.username.clone(),
            full_name: stored.full_name.clone(),
            role,
        }))
    }

    pub fn save(&self, ctx: &SessionContext) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            token: ctx.token.expose().to_string(),
            user_id: serde_json::Value::String(ctx.user_id.clone()),
            username: ctx.username.clone(),
            full_name: ctx.full_name.clone(),
            role: ctx.role.as_str().to_string(),
        };
        let json =
            serde_json::to_string_pretty(&stored).map_err(|e| StoreError::Malformed(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Remove the file. Already-absent is fine.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SessionHandle — shared in-memory session
// ═══════════════════════════════════════════════════════════

/// Cloneable handle to the current session.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<SessionContext>>>,
    store: Option<SessionStore>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that mirrors logins and clears to `store`.
    pub fn with_store(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            store: Some(store),
        }
    }

    /// Handle seeded from `store`, if it holds a session.
    pub fn restore(store: SessionStore) -> Result<Self, StoreError> {
        let existing = store.load()?;
        let handle = Self::with_store(store);
        if let Some(ctx) = existing {
            handle.set(Some(ctx));
        }
        Ok(handle)
    }

    pub fn login(&self, ctx: SessionContext) -> Result<(), StoreError> {
        if let Some(store) = &self.store {
            store.save(&ctx)?;
        }
        tracing::info!(user = %ctx.username, role = %ctx.role, "Session started");
        self.set(Some(ctx));
        Ok(())
    }

    /// Wipe the session in memory and on disk.
    pub fn clear(&self) {
        self.set(None);
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!(error = %e, "Failed to remove session file");
            }
        }
    }

    pub fn current(&self) -> Option<SessionContext> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                tracing::error!("Session lock poisoned");
                None
            }
        }
    }

    pub fn bearer(&self) -> Option<BearerToken> {
        self.current().map(|ctx| ctx.token)
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    fn set(&self, value: Option<SessionContext>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("active", &self.is_active())
            .field("store", &self.store)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
