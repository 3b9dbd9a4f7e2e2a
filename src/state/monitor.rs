//! MONITOR target tracking (IRCv3).
//!
//! Each user may watch up to [`MONITOR_LIMIT`] nicknames. Lookups are
//! indexed both ways: by watcher (for MONITOR L/C) and by folded target
//! nick (for online/offline fan-out).

use std::collections::HashSet;

use dashmap::DashMap;
use lark_proto::irc_to_lower;

use crate::state::user::Uid;

/// Maximum monitor entries per user (ISUPPORT `MONITOR=100`).
pub const MONITOR_LIMIT: usize = 100;

/// Two-way monitor index.
#[derive(Debug, Default)]
pub struct MonitorCenter {
    /// folded nick -> watching uids
    watchers: DashMap<String, HashSet<Uid>>,
    /// uid -> folded nicks watched
    watched_by: DashMap<Uid, HashSet<String>>,
}

impl MonitorCenter {
    /// Add targets for a watcher.
    ///
    /// Returns `(accepted, rejected)`: targets beyond the cap are rejected
    /// wholesale and reported via `ERR_MONLISTFULL`.
    pub fn add(&self, uid: &str, targets: &[String]) -> (Vec<String>, Vec<String>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        let mut watched = self.watched_by.entry(uid.to_string()).or_default();
        for target in targets {
            let folded = irc_to_lower(target);
            if watched.contains(&folded) {
                continue;
            }
            if watched.len() >= MONITOR_LIMIT {
                rejected.push(target.clone());
                continue;
            }
            watched.insert(folded.clone());
            self.watchers
                .entry(folded)
                .or_default()
                .insert(uid.to_string());
            accepted.push(target.clone());
        }
        (accepted, rejected)
    }

    /// Remove targets for a watcher.
    pub fn remove(&self, uid: &str, targets: &[String]) {
        if let Some(mut watched) = self.watched_by.get_mut(uid) {
            for target in targets {
                let folded = irc_to_lower(target);
                watched.remove(&folded);
                self.unindex(&folded, uid);
            }
        }
    }

    /// Clear a watcher's whole list (MONITOR C and disconnect).
    pub fn clear(&self, uid: &str) {
        if let Some((_, watched)) = self.watched_by.remove(uid) {
            for folded in watched {
                self.unindex(&folded, uid);
            }
        }
    }

    /// The watcher's list (folded forms).
    pub fn list(&self, uid: &str) -> Vec<String> {
        self.watched_by
            .get(uid)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Who watches `nick` (for online/offline notification fan-out).
    pub fn watchers_of(&self, nick: &str) -> Vec<Uid> {
        self.watchers
            .get(&irc_to_lower(nick))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn unindex(&self, folded: &str, uid: &str) {
        if let Some(mut set) = self.watchers.get_mut(folded) {
            set.remove(uid);
            if set.is_empty() {
                drop(set);
                self.watchers.remove(folded);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_fan_out() {
        let center = MonitorCenter::default();
        let (accepted, rejected) = center.add("u1", &["Alice".into(), "BOB".into()]);
        assert_eq!(accepted.len(), 2);
        assert!(rejected.is_empty());
        assert_eq!(center.watchers_of("alice"), vec!["u1".to_string()]);
        // Case-insensitive: watching BOB hears about "bob".
        assert_eq!(center.watchers_of("bob"), vec!["u1".to_string()]);
    }

    #[test]
    fn cap_rejects_overflow_with_names() {
        let center = MonitorCenter::default();
        let first: Vec<String> = (0..MONITOR_LIMIT).map(|i| format!("nick{i}")).collect();
        let (accepted, rejected) = center.add("u1", &first);
        assert_eq!(accepted.len(), MONITOR_LIMIT);
        assert!(rejected.is_empty());

        let (accepted, rejected) =
            center.add("u1", &["extra1".to_string(), "extra2".to_string()]);
        assert!(accepted.is_empty());
        assert_eq!(rejected, vec!["extra1".to_string(), "extra2".to_string()]);
        assert_eq!(center.list("u1").len(), MONITOR_LIMIT);
    }

    #[test]
    fn duplicates_do_not_consume_slots() {
        let center = MonitorCenter::default();
        center.add("u1", &["alice".into()]);
        let (accepted, rejected) = center.add("u1", &["ALICE".into()]);
        assert!(accepted.is_empty());
        assert!(rejected.is_empty());
        assert_eq!(center.list("u1").len(), 1);
    }

    #[test]
    fn clear_removes_reverse_index() {
        let center = MonitorCenter::default();
        center.add("u1", &["alice".into()]);
        center.add("u2", &["alice".into()]);
        center.clear("u1");
        assert_eq!(center.watchers_of("alice"), vec!["u2".to_string()]);
        assert!(center.list("u1").is_empty());
    }

    #[test]
    fn remove_specific_targets() {
        let center = MonitorCenter::default();
        center.add("u1", &["alice".into(), "bob".into()]);
        center.remove("u1", &["alice".into()]);
        assert!(center.watchers_of("alice").is_empty());
        assert_eq!(center.list("u1"), vec!["bob".to_string()]);
    }
}
