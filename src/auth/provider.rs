//! auth::provider
//!
//! Credential resolution for outgoing transport operations.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SyncPreferences;
use crate::secrets::decrypt_secret;

use super::session::AuthSession;

/// Transport protocol of a configured remote.
///
/// Determined once per repository handle from the remote URL and used to
/// pick which verified flag and which runtime secret apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProtocol {
    /// SSH transport (`ssh://` or scp-style `user@host:path`).
    Ssh,
    /// HTTP(S) transport.
    Https,
    /// Anything else (`file://`, local paths, no remote).
    Unknown,
}

impl RemoteProtocol {
    /// Classify a remote URL.
    ///
    /// # Example
    ///
    /// ```
    /// use bibsync::auth::RemoteProtocol;
    ///
    /// assert_eq!(RemoteProtocol::from_url("git@host.org:lib/refs.git"), RemoteProtocol::Ssh);
    /// assert_eq!(RemoteProtocol::from_url("ssh://host.org/refs.git"), RemoteProtocol::Ssh);
    /// assert_eq!(RemoteProtocol::from_url("https://host.org/refs.git"), RemoteProtocol::Https);
    /// assert_eq!(RemoteProtocol::from_url("file:///srv/refs.git"), RemoteProtocol::Unknown);
    /// ```
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("ssh://") {
            return RemoteProtocol::Ssh;
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return RemoteProtocol::Https;
        }
        // scp-style: user@host:path, no scheme separator
        if !url.contains("://") && url.contains('@') && url.contains(':') {
            return RemoteProtocol::Ssh;
        }
        RemoteProtocol::Unknown
    }
}

impl std::fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteProtocol::Ssh => write!(f, "ssh"),
            RemoteProtocol::Https => write!(f, "https"),
            RemoteProtocol::Unknown => write!(f, "unknown"),
        }
    }
}

/// Attaches credentials to outgoing fetch and push operations.
///
/// Construction copies what it needs out of the preferences; the runtime
/// secrets (SSH passphrase, password encryption key) are read from the
/// shared [`AuthSession`] at the moment the transport asks for them, so a
/// prompt that happens between construction and the network call is picked
/// up. Nothing here touches the network itself.
///
/// # Usage
///
/// ```ignore
/// let auth = Authenticator::new(&prefs, session.clone());
/// let mut opts = git2::FetchOptions::new();
/// opts.remote_callbacks(auth.callbacks());
/// remote.fetch(&[] as &[&str], Some(&mut opts), None)?;
/// ```
#[derive(Clone)]
pub struct Authenticator {
    username: String,
    password: Option<String>,
    password_encrypted: bool,
    ssh_key_dir: Option<PathBuf>,
    session: Arc<AuthSession>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ssh_key_dir", &self.ssh_key_dir)
            .finish()
    }
}

impl Authenticator {
    /// Build an authenticator from preferences and the shared session.
    pub fn new(prefs: &SyncPreferences, session: Arc<AuthSession>) -> Self {
        Self {
            username: prefs.username().to_string(),
            password: prefs.password().map(String::from),
            password_encrypted: prefs.password_encrypted(),
            ssh_key_dir: prefs.ssh_key_dir().map(PathBuf::from),
            session,
        }
    }

    /// Remote callbacks carrying the credentials resolver.
    ///
    /// For SSH transports, a private key from the configured key directory
    /// is offered with the session passphrase. For user/password
    /// transports, the stored password is decrypted with the session's
    /// encryption key (falling back to the username when no key was
    /// supplied); decryption failure degrades to an empty secret, so the
    /// operation fails authentication and can be retried after a prompt.
    pub fn callbacks<'a>(&self) -> git2::RemoteCallbacks<'a> {
        let username = self.username.clone();
        let password = self.password.clone();
        let password_encrypted = self.password_encrypted;
        let ssh_key_dir = self.ssh_key_dir.clone();
        let session = Arc::clone(&self.session);

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            if allowed.is_ssh_key() {
                let user = username_from_url.unwrap_or("git");
                if let Some(key) = find_ssh_key(ssh_key_dir.as_deref()) {
                    let passphrase = session.ssh_passphrase();
                    return git2::Cred::ssh_key(user, None, &key, passphrase.as_deref());
                }
                tracing::debug!("no ssh key found in configured directory");
            }

            if allowed.is_user_pass_plaintext() {
                let secret = resolve_password(
                    password.as_deref(),
                    password_encrypted,
                    &username,
                    session.password_key().as_deref(),
                );
                return git2::Cred::userpass_plaintext(&username, &secret);
            }

            git2::Cred::default()
        });

        callbacks
    }
}

/// Decrypt the stored password for use as a transport secret.
///
/// Falls back to the username as encryption key when none was supplied at
/// runtime. On decryption failure the empty string is returned so the
/// transport fails authentication instead of the whole operation aborting
/// before it reaches the network.
fn resolve_password(
    stored: Option<&str>,
    encrypted: bool,
    username: &str,
    runtime_key: Option<&str>,
) -> String {
    let Some(stored) = stored else {
        return String::new();
    };

    if !encrypted {
        return stored.to_string();
    }

    let key_phrase = runtime_key.unwrap_or(username);
    match decrypt_secret(stored, key_phrase) {
        Ok(password) => password,
        Err(_) => {
            tracing::debug!("error while decrypting stored password");
            String::new()
        }
    }
}

/// Locate a usable private key in the configured SSH directory.
///
/// Probes the standard key names in preference order; the first existing
/// file wins.
fn find_ssh_key(dir: Option<&std::path::Path>) -> Option<PathBuf> {
    let dir = dir?;
    for name in ["id_ed25519", "id_ecdsa", "id_rsa"] {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::encrypt_secret;

    mod protocol {
        use super::*;

        #[test]
        fn ssh_urls() {
            assert_eq!(RemoteProtocol::from_url("ssh://host/r.git"), RemoteProtocol::Ssh);
            assert_eq!(
                RemoteProtocol::from_url("git@github.com:owner/repo.git"),
                RemoteProtocol::Ssh
            );
        }

        #[test]
        fn https_urls() {
            assert_eq!(
                RemoteProtocol::from_url("https://github.com/owner/repo.git"),
                RemoteProtocol::Https
            );
            assert_eq!(
                RemoteProtocol::from_url("http://internal/repo.git"),
                RemoteProtocol::Https
            );
        }

        #[test]
        fn everything_else_is_unknown() {
            assert_eq!(
                RemoteProtocol::from_url("file:///srv/repo.git"),
                RemoteProtocol::Unknown
            );
            assert_eq!(RemoteProtocol::from_url("/srv/repo.git"), RemoteProtocol::Unknown);
            assert_eq!(RemoteProtocol::from_url(""), RemoteProtocol::Unknown);
        }

        #[test]
        fn display() {
            assert_eq!(RemoteProtocol::Ssh.to_string(), "ssh");
            assert_eq!(RemoteProtocol::Https.to_string(), "https");
            assert_eq!(RemoteProtocol::Unknown.to_string(), "unknown");
        }
    }

    mod password_resolution {
        use super::*;

        #[test]
        fn missing_password_is_empty() {
            assert_eq!(resolve_password(None, true, "alice", None), "");
        }

        #[test]
        fn plaintext_password_passes_through() {
            assert_eq!(
                resolve_password(Some("hunter2"), false, "alice", None),
                "hunter2"
            );
        }

        #[test]
        fn decrypts_with_runtime_key() {
            let stored = encrypt_secret("hunter2", "runtime-key").unwrap();
            assert_eq!(
                resolve_password(Some(&stored), true, "alice", Some("runtime-key")),
                "hunter2"
            );
        }

        #[test]
        fn falls_back_to_username_as_key() {
            let stored = encrypt_secret("hunter2", "alice").unwrap();
            assert_eq!(resolve_password(Some(&stored), true, "alice", None), "hunter2");
        }

        #[test]
        fn decryption_failure_degrades_to_empty() {
            let stored = encrypt_secret("hunter2", "right-key").unwrap();
            assert_eq!(
                resolve_password(Some(&stored), true, "alice", Some("wrong-key")),
                ""
            );
        }
    }

    mod ssh_keys {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn no_dir_no_key() {
            assert_eq!(find_ssh_key(None), None);
        }

        #[test]
        fn empty_dir_no_key() {
            let temp = TempDir::new().unwrap();
            assert_eq!(find_ssh_key(Some(temp.path())), None);
        }

        #[test]
        fn prefers_ed25519() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("id_rsa"), "rsa").unwrap();
            std::fs::write(temp.path().join("id_ed25519"), "ed").unwrap();

            assert_eq!(
                find_ssh_key(Some(temp.path())),
                Some(temp.path().join("id_ed25519"))
            );
        }

        #[test]
        fn falls_back_to_rsa() {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("id_rsa"), "rsa").unwrap();

            assert_eq!(
                find_ssh_key(Some(temp.path())),
                Some(temp.path().join("id_rsa"))
            );
        }
    }
}
