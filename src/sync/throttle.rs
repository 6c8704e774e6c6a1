//! sync::throttle
//!
//! The push frequency gate.

use crate::config::SyncPreferences;

/// Counts synchronize requests and decides when to actually contact the
/// remote.
///
/// One throttle per repository. The counter survives denied requests and
/// resets only when a request is allowed through.
#[derive(Debug, Default)]
pub struct PushThrottle {
    count: i32,
}

impl PushThrottle {
    /// Create a throttle with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether this synchronize request should proceed.
    ///
    /// Returns `false` when synchronization is disabled. When frequency
    /// gating is disabled, returns `true` on every call. Otherwise the
    /// call counter is incremented; the request is denied until the
    /// counter reaches the configured frequency, at which point it is
    /// allowed and the counter resets.
    ///
    /// A configured frequency of zero or less is a policy violation: the
    /// request is denied with a warning and the counter is **not** reset,
    /// distinguishing it from the ordinary "not yet due" denial.
    pub fn should_synchronize(&mut self, prefs: &SyncPreferences) -> bool {
        if !prefs.enabled() {
            return false;
        }
        if !prefs.frequency_gating() {
            return true;
        }

        let frequency = prefs.push_frequency();
        self.count = self.count.saturating_add(1);
        tracing::debug!(frequency, count = self.count, "push frequency check");

        if self.count < frequency {
            return false;
        }

        if frequency <= 0 {
            tracing::warn!(
                frequency,
                "invalid push frequency; must be greater than zero"
            );
            return false;
        }

        self.count = 0;
        true
    }

    /// The number of denied requests since the last allowed one.
    pub fn pending(&self) -> i32 {
        self.count
    }
}
