//! auth
//!
//! Credential resolution and session-scoped verification state.
//!
//! # Design
//!
//! Two pieces cooperate here:
//!
//! - [`AuthSession`] holds runtime secrets (the SSH passphrase and the
//!   password encryption key, both supplied interactively) and the
//!   per-protocol "credentials proved themselves" flags. It is created
//!   once by the embedding application and shared across every repository
//!   it opens, which makes the sharing explicit instead of global.
//! - [`Authenticator`] turns preferences plus a session into
//!   `git2::RemoteCallbacks` for an outgoing fetch or push: it decrypts
//!   the stored password on demand and configures SSH key lookup with a
//!   passphrase supplier backed by the session.
//!
//! Verification flags are set after any transport operation that reaches
//! the network, whether or not the subsequent integration conflicts:
//! reaching the remote at all proves the credentials were accepted.

mod provider;
mod session;

pub use provider::{Authenticator, RemoteProtocol};
pub use session::AuthSession;
