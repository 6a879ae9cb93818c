//! Credential and identity held by an authenticated session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use zdrink_core::{Credential, storage_keys};

use super::UserIdentity;
use crate::storage::{StorageError, TokenStorage};

/// Shared session state.
///
/// The in-memory credential and the durably stored tokens are kept equal
/// after every successful mutation. Installs and clears are serialized, and
/// an install only updates memory once storage has been written.
///
/// Every logout, explicit or forced, bumps a generation counter so that data
/// cached for the previous session can be recognized as stale.
pub struct SessionState {
    storage: Arc<dyn TokenStorage>,
    credential: RwLock<Option<Credential>>,
    identity: RwLock<Option<UserIdentity>>,
    /// Held across the storage write and the memory update.
    writes: Mutex<()>,
    generation: AtomicU64,
}

impl SessionState {
    /// Create state with no credential, backed by `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            credential: RwLock::new(None),
            identity: RwLock::new(None),
            writes: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Create state from whatever credential `storage` currently holds.
    ///
    /// A refresh token without an access token is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the storage cannot be read.
    pub fn restore(storage: Arc<dyn TokenStorage>) -> Result<Self, StorageError> {
        let access = storage.get(storage_keys::ACCESS_TOKEN)?;
        let refresh = storage.get(storage_keys::REFRESH_TOKEN)?;
        let credential = access
            .filter(|token| !token.is_empty())
            .map(|access| Credential::new(access, refresh.filter(|t| !t.is_empty())));

        if credential.is_some() {
            tracing::debug!("Restored credential from storage");
        }

        Ok(Self {
            storage,
            credential: RwLock::new(credential),
            identity: RwLock::new(None),
            writes: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// The credential currently held, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current user identity, if fetched.
    #[must_use]
    pub fn identity(&self) -> Option<UserIdentity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Incremented by every [`clear`](Self::clear).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Persist `credential` and make it current.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if persisting fails. Memory is left unchanged.
    pub fn install_credential(&self, credential: Credential) -> Result<(), StorageError> {
        use secrecy::ExposeSecret;

        let access = credential.access_token().expose_secret();
        let refresh = credential.refresh_token().map(|t| t.expose_secret());
        let _writes = self.lock_writes();
        self.storage.apply(&[
            (storage_keys::ACCESS_TOKEN, Some(access)),
            (storage_keys::REFRESH_TOKEN, refresh),
        ])?;

        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    /// Replace the identity.
    pub fn set_identity(&self, identity: UserIdentity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    /// Shallow-merge `fields` into the identity. Installs them as the
    /// identity if none is held.
    pub fn merge_identity(&self, fields: UserIdentity) {
        let mut identity = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        match identity.as_mut() {
            Some(current) => current.merge(fields),
            None => *identity = Some(fields),
        }
    }

    /// Drop credential and identity from memory and durable storage.
    ///
    /// Memory is always cleared. A storage failure is logged; the session
    /// is considered logged out regardless.
    pub fn clear(&self) {
        let _writes = self.lock_writes();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;

        if let Err(e) = self.storage.apply(&[
            (storage_keys::ACCESS_TOKEN, None),
            (storage_keys::REFRESH_TOKEN, None),
        ]) {
            tracing::error!(error = %e, "Failed to clear stored credential");
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("authenticated", &self.is_authenticated())
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStorage;

    fn identity(value: serde_json::Value) -> UserIdentity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_restore_reads_both_keys() {
        let storage = Arc::new(MemoryStorage::with_entries([
            ("token", "a1"),
            ("refresh_token", "r1"),
        ]));
        let state = SessionState::restore(storage).unwrap();

        let credential = state.credential().unwrap();
        assert_eq!(credential.access_token().expose_secret(), "a1");
        assert_eq!(
            credential.refresh_token().map(|t| t.expose_secret()),
            Some("r1")
        );
        assert!(state.identity().is_none());
    }

    #[test]
    fn test_restore_without_access_token_is_anonymous() {
        let storage = Arc::new(MemoryStorage::with_entries([("refresh_token", "r1")]));
        let state = SessionState::restore(storage).unwrap();
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_install_then_clear_keeps_storage_in_sync() {
        let storage = Arc::new(MemoryStorage::new());
        let state = SessionState::new(storage.clone());

        state
            .install_credential(Credential::new("a1", Some("r1".to_string())))
            .unwrap();
        assert!(state.is_authenticated());
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("a1"));
        assert_eq!(storage.get("refresh_token").unwrap().as_deref(), Some("r1"));

        state.set_identity(identity(json!({"id": 1, "username": "alice"})));
        state.clear();
        assert!(!state.is_authenticated());
        assert!(state.identity().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_install_without_refresh_removes_stale_refresh() {
        let storage = Arc::new(MemoryStorage::with_entries([("refresh_token", "stale")]));
        let state = SessionState::new(storage.clone());

        state.install_credential(Credential::new("a2", None)).unwrap();
        assert_eq!(storage.get("refresh_token").unwrap(), None);
    }

    #[test]
    fn test_clear_bumps_generation() {
        let state = SessionState::new(Arc::new(MemoryStorage::new()));
        let before = state.generation();

        state.install_credential(Credential::new("a1", None)).unwrap();
        assert_eq!(state.generation(), before);

        state.clear();
        assert_eq!(state.generation(), before + 1);
    }

    #[test]
    fn test_racing_install_and_clear_agree_with_storage() {
        for _ in 0..200 {
            let storage = Arc::new(MemoryStorage::new());
            let state = Arc::new(SessionState::new(storage.clone()));

            let installer = {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    state
                        .install_credential(Credential::new("a1", Some("r1".to_string())))
                        .unwrap();
                })
            };
            let clearer = {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.clear())
            };
            installer.join().unwrap();
            clearer.join().unwrap();

            let stored = storage.get("token").unwrap().is_some();
            assert_eq!(state.is_authenticated(), stored);
        }
    }

    #[test]
    fn test_merge_identity_overwrites_same_named_fields() {
        let state = SessionState::new(Arc::new(MemoryStorage::new()));
        state.set_identity(identity(json!({"id": 1, "username": "alice", "phone": "1"})));
        state.merge_identity(identity(json!({"phone": "2", "avatar": "a.png"})));

        let merged = state.identity().unwrap();
        assert_eq!(merged.username(), Some("alice"));
        assert_eq!(merged.phone(), Some("2"));
        assert_eq!(merged.get("avatar"), Some(&json!("a.png")));
    }
}
