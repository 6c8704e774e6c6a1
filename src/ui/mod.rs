//! ui
//!
//! User interaction surfaces.
//!
//! The synchronization core never talks to the user directly; it goes
//! through the [`CredentialPrompt`] trait. Graphical applications supply
//! their own dialog-backed implementation; [`TerminalPrompt`] covers
//! command-line embedding.

mod prompts;

pub use prompts::{CredentialPrompt, TerminalPrompt};
