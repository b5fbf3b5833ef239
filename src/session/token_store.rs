//! In-memory plus durable holder of the session's bearer token.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

use super::storage::SessionStorage;

/// Durable key holding the raw token string.
pub const TOKEN_KEY: &str = "auth_token";

/// Durable key holding the serialized `{"isAuthenticated": bool}` marker.
pub const AUTH_FLAG_KEY: &str = "auth-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFlag {
  pub is_authenticated: bool,
}

/// Single source of truth for "is a session active".
///
/// The in-memory copy is hydrated from storage once, at construction. Every
/// write goes to storage and memory while holding the same lock, so readers
/// never observe one copy updated without the other.
pub struct TokenStore {
  storage: Arc<dyn SessionStorage>,
  token: Mutex<Option<String>>,
}

impl TokenStore {
  /// Build the store, rehydrating the token from durable storage.
  pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
    let token = match storage.get(TOKEN_KEY) {
      Ok(token) => token.filter(|t| !t.is_empty()),
      Err(e) => {
        error!("Failed to read stored session: {}", e);
        None
      }
    };

    let store = Self {
      storage,
      token: Mutex::new(None),
    };

    // Repair a flag left out of step with the token by an older run
    let flag = store.persisted_flag();
    let mut guard = store.lock();
    if flag.map(|f| f.is_authenticated) != Some(token.is_some()) {
      debug!("Reconciling persisted auth flag");
      store.persist(token.as_deref());
    }
    *guard = token;
    drop(guard);

    store
  }

  /// Current token, if a session is active.
  pub fn get(&self) -> Option<String> {
    self.lock().clone()
  }

  /// Store a new token in storage and memory.
  pub fn set(&self, token: &str) {
    let mut guard = self.lock();
    self.persist(Some(token));
    *guard = Some(token.to_string());
  }

  /// Remove the token from storage and memory.
  pub fn clear(&self) {
    let mut guard = self.lock();
    self.persist(None);
    *guard = None;
  }

  /// Clear the session only if it still holds `token`, where `None` means
  /// the request went out with no session at all.
  ///
  /// Returns true when this call performed the teardown. A login that
  /// happened in between makes this a no-op.
  pub fn clear_if_current(&self, token: Option<&str>) -> bool {
    let mut guard = self.lock();
    if guard.as_deref() != token {
      return false;
    }
    self.persist(None);
    *guard = None;
    true
  }

  pub fn is_authenticated(&self) -> bool {
    self.lock().is_some()
  }

  /// The mirrored marker as currently persisted.
  pub fn persisted_flag(&self) -> Option<AuthFlag> {
    self
      .storage
      .get(AUTH_FLAG_KEY)
      .ok()
      .flatten()
      .and_then(|raw| serde_json::from_str(&raw).ok())
  }

  fn lock(&self) -> MutexGuard<'_, Option<String>> {
    self
      .token
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }

  fn persist(&self, token: Option<&str>) {
    let flag = AuthFlag {
      is_authenticated: token.is_some(),
    };
    let flag = match serde_json::to_string(&flag) {
      Ok(flag) => flag,
      Err(e) => {
        error!("Failed to serialize auth flag: {}", e);
        return;
      }
    };

    if let Err(e) = self
      .storage
      .write_batch(&[(TOKEN_KEY, token), (AUTH_FLAG_KEY, Some(&flag))])
    {
      error!("Failed to persist session: {}", e);
    }
  }
}

impl std::fmt::Debug for TokenStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenStore")
      .field("authenticated", &self.is_authenticated())
      .finish_non_exhaustive()
  }
}
