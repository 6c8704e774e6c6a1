//! monitor
//!
//! Change-notification surface for embedding applications.
//!
//! A live file-change monitor that watches the tracked database must not
//! observe the transient staged/committed-but-not-pushed states a sync
//! passes through, or it will report them as spurious external changes.
//! The application hands its monitor to
//! [`crate::sync::SyncManager::synchronize_watched`], which pauses it
//! before the sync begins and resumes it after the pending notifications
//! are accepted.

/// Collaborator interface for the application's file-change monitor.
///
/// bibsync never implements this; it only drives it around a sync.
pub trait ChangeMonitor {
    /// Suspend change notifications.
    fn pause(&self);

    /// Resume change notifications.
    fn resume(&self);

    /// Swallow notifications that accumulated while paused, so the sync's
    /// own writes are not reported back to the user.
    fn accept_pending_changes(&self);
}
