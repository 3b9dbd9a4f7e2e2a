//! Join throttling (+j).
//!
//! A `+j limit:window` setting bounds how many joins a channel accepts per
//! sliding window, independent of who is joining.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Parsed `+j` setting: at most `limit` joins per `window` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub limit: u32,
    pub window: i64,
}

impl FromStr for ThrottleSettings {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, window) = s.split_once(':').ok_or(())?;
        let limit: u32 = limit.parse().map_err(|_| ())?;
        let window: i64 = window.parse().map_err(|_| ())?;
        if limit == 0 || window <= 0 {
            return Err(());
        }
        Ok(ThrottleSettings { limit, window })
    }
}

impl fmt::Display for ThrottleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.limit, self.window)
    }
}

/// Sliding window of join timestamps for one channel.
#[derive(Debug, Default)]
pub struct JoinWindow {
    joins: VecDeque<i64>,
}

impl JoinWindow {
    /// Record a join attempt at `now`. Returns false when throttled.
    pub fn check(&mut self, settings: ThrottleSettings, now: i64) -> bool {
        while self
            .joins
            .front()
            .is_some_and(|&t| t <= now - settings.window)
        {
            self.joins.pop_front();
        }
        if self.joins.len() as u32 >= settings.limit {
            return false;
        }
        self.joins.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_rejects() {
        assert_eq!(
            "3:60".parse::<ThrottleSettings>(),
            Ok(ThrottleSettings { limit: 3, window: 60 })
        );
        assert!("0:60".parse::<ThrottleSettings>().is_err());
        assert!("3:0".parse::<ThrottleSettings>().is_err());
        assert!("3".parse::<ThrottleSettings>().is_err());
        assert!("a:b".parse::<ThrottleSettings>().is_err());
    }

    #[test]
    fn throttles_after_limit() {
        let settings = ThrottleSettings { limit: 2, window: 10 };
        let mut window = JoinWindow::default();
        assert!(window.check(settings, 100));
        assert!(window.check(settings, 101));
        assert!(!window.check(settings, 102));
        // Slides open again once the oldest join ages out.
        assert!(window.check(settings, 111));
    }
}
