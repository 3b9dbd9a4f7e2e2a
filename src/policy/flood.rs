//! Channel flood protection (+f).
//!
//! A `+f` setting string enumerates per-action sliding windows:
//! `[*]<type>:<limit>:<window>[,...]` where `type` is one of
//! `m` (message), `j` (join), `c` (CTCP), `k` (kick), `n` (nick change).
//! The `*` prefix upgrades the penalty from kick to ban.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Action classes tracked by the flood limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloodAction {
    Message,
    Join,
    Ctcp,
    Kick,
    NickChange,
}

impl FloodAction {
    fn letter(self) -> char {
        match self {
            FloodAction::Message => 'm',
            FloodAction::Join => 'j',
            FloodAction::Ctcp => 'c',
            FloodAction::Kick => 'k',
            FloodAction::NickChange => 'n',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'm' => Some(FloodAction::Message),
            'j' => Some(FloodAction::Join),
            'c' => Some(FloodAction::Ctcp),
            'k' => Some(FloodAction::Kick),
            'n' => Some(FloodAction::NickChange),
            _ => None,
        }
    }
}

/// What happens to a user who trips the limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloodPenalty {
    Kick,
    Ban,
}

/// One per-action rule: at most `limit` actions per `window` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloodRule {
    pub limit: u32,
    pub window: i64,
    pub penalty: FloodPenalty,
}

/// A parsed `+f` setting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FloodSettings {
    rules: HashMap<FloodAction, FloodRule>,
}

impl FloodSettings {
    /// The rule for an action class, if configured.
    pub fn rule(&self, action: FloodAction) -> Option<FloodRule> {
        self.rules.get(&action).copied()
    }

    /// True if no action class is configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromStr for FloodSettings {
    type Err = ();

    /// Parse `[*]type:limit:window[,...]`. Unknown types or malformed
    /// entries reject the whole setting.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rules = HashMap::new();
        for entry in s.split(',') {
            let (penalty, entry) = match entry.strip_prefix('*') {
                Some(rest) => (FloodPenalty::Ban, rest),
                None => (FloodPenalty::Kick, entry),
            };
            let mut parts = entry.split(':');
            let action = parts
                .next()
                .and_then(|t| t.chars().next())
                .and_then(FloodAction::from_letter)
                .ok_or(())?;
            let limit: u32 = parts.next().ok_or(())?.parse().map_err(|_| ())?;
            let window: i64 = parts.next().ok_or(())?.parse().map_err(|_| ())?;
            if limit == 0 || window <= 0 || parts.next().is_some() {
                return Err(());
            }
            rules.insert(action, FloodRule { limit, window, penalty });
        }
        if rules.is_empty() {
            return Err(());
        }
        Ok(FloodSettings { rules })
    }
}

impl fmt::Display for FloodSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.rules.iter().collect();
        entries.sort_by_key(|(action, _)| action.letter());
        for (i, (action, rule)) in entries.into_iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if rule.penalty == FloodPenalty::Ban {
                f.write_str("*")?;
            }
            write!(f, "{}:{}:{}", action.letter(), rule.limit, rule.window)?;
        }
        Ok(())
    }
}

/// The verdict for one action submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloodVerdict {
    /// Under the limit; the action proceeds.
    Allowed,
    /// Limit met; deny the action and apply the penalty.
    Denied(FloodPenalty),
}

/// Per-channel flood state: sliding windows per `(user, action)`.
///
/// Windows are pruned on every read, so state for quiet users decays to
/// nothing the next time they act.
#[derive(Debug, Default)]
pub struct FloodTracker {
    windows: HashMap<(String, FloodAction), VecDeque<i64>>,
}

impl FloodTracker {
    /// Record an action at `now` and check it against `settings`.
    pub fn check(
        &mut self,
        settings: &FloodSettings,
        uid: &str,
        action: FloodAction,
        now: i64,
    ) -> FloodVerdict {
        let Some(rule) = settings.rule(action) else {
            return FloodVerdict::Allowed;
        };

        let window = self
            .windows
            .entry((uid.to_string(), action))
            .or_default();
        while window.front().is_some_and(|&t| t <= now - rule.window) {
            window.pop_front();
        }

        if window.len() as u32 >= rule.limit {
            FloodVerdict::Denied(rule.penalty)
        } else {
            window.push_back(now);
            FloodVerdict::Allowed
        }
    }

    /// Drop all state for a user (on part/kick/quit).
    pub fn forget(&mut self, uid: &str) {
        self.windows.retain(|(u, _), _| u != uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(s: &str) -> FloodSettings {
        s.parse().unwrap()
    }

    #[test]
    fn parses_setting_string() {
        let f = settings("m:5:10,*j:3:60");
        assert_eq!(
            f.rule(FloodAction::Message),
            Some(FloodRule {
                limit: 5,
                window: 10,
                penalty: FloodPenalty::Kick
            })
        );
        assert_eq!(
            f.rule(FloodAction::Join).unwrap().penalty,
            FloodPenalty::Ban
        );
        assert_eq!(f.rule(FloodAction::Ctcp), None);
    }

    #[test]
    fn rejects_malformed_settings() {
        assert!("".parse::<FloodSettings>().is_err());
        assert!("x:5:10".parse::<FloodSettings>().is_err());
        assert!("m:0:10".parse::<FloodSettings>().is_err());
        assert!("m:5:-1".parse::<FloodSettings>().is_err());
        assert!("m:5".parse::<FloodSettings>().is_err());
    }

    #[test]
    fn setting_round_trips_through_display() {
        for raw in ["m:5:10", "*j:3:60", "c:2:30,m:5:10"] {
            let parsed = settings(raw);
            assert_eq!(parsed, settings(&parsed.to_string()));
        }
    }

    #[test]
    fn denies_limit_plus_one_within_window() {
        let f = settings("m:3:10");
        let mut tracker = FloodTracker::default();
        for _ in 0..3 {
            assert_eq!(
                tracker.check(&f, "u1", FloodAction::Message, 100),
                FloodVerdict::Allowed
            );
        }
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 101),
            FloodVerdict::Denied(FloodPenalty::Kick)
        );
    }

    #[test]
    fn window_slides() {
        let f = settings("m:2:10");
        let mut tracker = FloodTracker::default();
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 100),
            FloodVerdict::Allowed
        );
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 101),
            FloodVerdict::Allowed
        );
        assert!(matches!(
            tracker.check(&f, "u1", FloodAction::Message, 105),
            FloodVerdict::Denied(_)
        ));
        // The first entry ages out at t=110.
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 110),
            FloodVerdict::Allowed
        );
    }

    #[test]
    fn users_and_actions_are_independent() {
        let f = settings("m:1:10,j:1:10");
        let mut tracker = FloodTracker::default();
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 100),
            FloodVerdict::Allowed
        );
        assert_eq!(
            tracker.check(&f, "u2", FloodAction::Message, 100),
            FloodVerdict::Allowed
        );
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Join, 100),
            FloodVerdict::Allowed
        );
        assert!(matches!(
            tracker.check(&f, "u1", FloodAction::Message, 101),
            FloodVerdict::Denied(_)
        ));
    }

    #[test]
    fn forget_clears_state() {
        let f = settings("m:1:10");
        let mut tracker = FloodTracker::default();
        tracker.check(&f, "u1", FloodAction::Message, 100);
        tracker.forget("u1");
        assert_eq!(
            tracker.check(&f, "u1", FloodAction::Message, 101),
            FloodVerdict::Allowed
        );
    }
}
