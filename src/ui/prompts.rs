//! ui::prompts
//!
//! Credential prompting.

/// Collaborator interface for interactive secret entry.
///
/// Returns `None` when the user cancels; the caller treats that as "no
/// secret available" and lets the subsequent transport operation fail
/// authentication rather than aborting early.
pub trait CredentialPrompt {
    /// Ask the user for a secret. The input must not be echoed.
    fn request_secret(&self, message: &str) -> Option<String>;
}

/// Terminal-backed prompt using masked input.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Create a terminal prompt.
    pub fn new() -> Self {
        Self
    }
}

impl CredentialPrompt for TerminalPrompt {
    fn request_secret(&self, message: &str) -> Option<String> {
        rpassword::prompt_password(format!("{message}: ")).ok()
    }
}
