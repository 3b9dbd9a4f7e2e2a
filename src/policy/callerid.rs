//! Caller-ID (+g) notification throttling.
//!
//! Delivery policy lives in the PRIVMSG handler (accept list on the
//! recipient's user record). This module tracks the one-notice-per-minute
//! rule for each (sender, recipient) pair.

use dashmap::DashMap;

/// Seconds between repeated caller-id notices for the same pair.
const NOTIFY_INTERVAL: i64 = 60;

/// Tracks the last caller-id notice per (sender, recipient) pair.
#[derive(Debug, Default)]
pub struct CallerIdNotifier {
    last_notified: DashMap<(String, String), i64>,
}

impl CallerIdNotifier {
    /// True if a notice should be sent for this rejection, recording it.
    pub fn should_notify(&self, sender_uid: &str, target_uid: &str, now: i64) -> bool {
        use dashmap::mapref::entry::Entry;
        let key = (sender_uid.to_string(), target_uid.to_string());
        match self.last_notified.entry(key) {
            Entry::Occupied(mut entry) => {
                if now - *entry.get() >= NOTIFY_INTERVAL {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop state involving a departing user.
    pub fn forget(&self, uid: &str) {
        self.last_notified
            .retain(|(sender, target), _| sender != uid && target != uid);
    }
}
