//! auth::session
//!
//! Session-scoped authentication state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::provider::RemoteProtocol;

/// Shared authentication state for one application session.
///
/// Holds the runtime secrets that must not be persisted in cleartext (the
/// SSH passphrase and the password encryption key) and one verified flag
/// per protocol kind. A credential set is considered verified once a
/// transport operation of that kind succeeds; subsequent repositories
/// using the same protocol skip redundant prompts.
///
/// The session is intentionally shared: create one per process and pass it
/// (behind an `Arc`) to every [`crate::sync::SyncManager`]. Interior
/// mutability keeps the sharing safe without any locking discipline on the
/// caller's side.
#[derive(Default)]
pub struct AuthSession {
    ssh_verified: AtomicBool,
    https_verified: AtomicBool,
    ssh_passphrase: Mutex<Option<String>>,
    password_key: Mutex<Option<String>>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("ssh_verified", &self.ssh_verified.load(Ordering::Relaxed))
            .field(
                "https_verified",
                &self.https_verified.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl AuthSession {
    /// Create a fresh session with nothing verified and no secrets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether credentials for `protocol` have proved themselves.
    ///
    /// Always `false` for [`RemoteProtocol::Unknown`].
    pub fn is_verified(&self, protocol: RemoteProtocol) -> bool {
        match protocol {
            RemoteProtocol::Ssh => self.ssh_verified.load(Ordering::Relaxed),
            RemoteProtocol::Https => self.https_verified.load(Ordering::Relaxed),
            RemoteProtocol::Unknown => false,
        }
    }

    /// Record a successful transport operation for `protocol`.
    ///
    /// A no-op for [`RemoteProtocol::Unknown`].
    pub fn mark_verified(&self, protocol: RemoteProtocol) {
        match protocol {
            RemoteProtocol::Ssh => self.ssh_verified.store(true, Ordering::Relaxed),
            RemoteProtocol::Https => self.https_verified.store(true, Ordering::Relaxed),
            RemoteProtocol::Unknown => {}
        }
    }

    /// Store the SSH key passphrase for this session.
    pub fn set_ssh_passphrase(&self, passphrase: Option<String>) {
        *self.ssh_passphrase.lock().unwrap_or_else(|e| e.into_inner()) = passphrase;
    }

    /// The stored SSH key passphrase, if any.
    pub fn ssh_passphrase(&self) -> Option<String> {
        self.ssh_passphrase
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Store the password encryption key for this session.
    pub fn set_password_key(&self, key: Option<String>) {
        *self.password_key.lock().unwrap_or_else(|e| e.into_inner()) = key;
    }

    /// The stored password encryption key, if any.
    pub fn password_key(&self) -> Option<String> {
        self.password_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drop all runtime secrets (verified flags are kept).
    pub fn clear_secrets(&self) {
        self.set_ssh_passphrase(None);
        self.set_password_key(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_verified_initially() {
        let session = AuthSession::new();
        assert!(!session.is_verified(RemoteProtocol::Ssh));
        assert!(!session.is_verified(RemoteProtocol::Https));
        assert!(!session.is_verified(RemoteProtocol::Unknown));
    }

    #[test]
    fn verification_is_per_protocol() {
        let session = AuthSession::new();
        session.mark_verified(RemoteProtocol::Https);

        assert!(session.is_verified(RemoteProtocol::Https));
        assert!(!session.is_verified(RemoteProtocol::Ssh));
    }

    #[test]
    fn unknown_protocol_never_verifies() {
        let session = AuthSession::new();
        session.mark_verified(RemoteProtocol::Unknown);
        assert!(!session.is_verified(RemoteProtocol::Unknown));
    }

    #[test]
    fn secrets_round_trip_and_clear() {
        let session = AuthSession::new();
        session.set_ssh_passphrase(Some("hunter2".into()));
        session.set_password_key(Some("key".into()));

        assert_eq!(session.ssh_passphrase().as_deref(), Some("hunter2"));
        assert_eq!(session.password_key().as_deref(), Some("key"));

        session.clear_secrets();
        assert_eq!(session.ssh_passphrase(), None);
        assert_eq!(session.password_key(), None);
    }

    #[test]
    fn clearing_secrets_keeps_verification() {
        let session = AuthSession::new();
        session.mark_verified(RemoteProtocol::Ssh);
        session.clear_secrets();
        assert!(session.is_verified(RemoteProtocol::Ssh));
    }
}
