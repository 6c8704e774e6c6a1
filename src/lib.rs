//! bibsync - Git-backed synchronization for bibliography databases
//!
//! bibsync keeps a single tracked file (a bibliography database) consistent
//! between a local working copy and a remote git repository. It stages
//! exactly the right change set, commits, pulls with a rebase-then-merge
//! fallback that rolls back cleanly on conflict, and pushes, with the whole
//! sequence gated behind user-configured frequency and authentication
//! policy.
//!
//! # Architecture
//!
//! The crate is layered around a single git doorway:
//!
//! - [`git`] - Single interface for all git operations (discovery, status
//!   classification, staging, commits, resets)
//! - [`sync`] - The synchronization core: two-phase pull engine, push
//!   throttle, and the orchestrating [`sync::SyncManager`]
//! - [`auth`] - Credential resolution and session-scoped verification state
//! - [`secrets`] - Authenticated encryption for stored passwords
//! - [`config`] - Persisted preferences (TOML, atomic writes)
//! - [`ui`] - Credential prompt surface
//! - [`monitor`] - Change-notification surface for embedding applications
//!
//! # Correctness Invariants
//!
//! 1. All repository mutations flow through the [`git`] doorway
//! 2. A conflicting pull never leaves the repository mid-rebase or
//!    mid-merge: the engine restores the pre-pull head before reporting
//! 3. File classification is recomputed from live repository state, never
//!    cached across mutating operations
//! 4. Secrets are never logged or included in error messages
//!
//! # Concurrency
//!
//! A [`sync::SyncManager`] performs one blocking unit of work per call and
//! has no internal locking; callers must serialize operations per
//! repository. The one deliberately shared piece of state is
//! [`auth::AuthSession`], which the embedding application creates once and
//! passes to every manager it opens.

pub mod auth;
pub mod config;
pub mod git;
pub mod monitor;
pub mod secrets;
pub mod sync;
pub mod ui;
