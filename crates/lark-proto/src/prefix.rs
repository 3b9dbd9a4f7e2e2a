//! Message prefix (source) types.
//!
//! A prefix is either a server name or a `nick!user@host` identity. On the
//! server-to-server wire the same position carries a SID or UID; those are
//! carried through as `ServerName` (no `!`/`@`, dotted or not).

use std::fmt;
use std::str::FromStr;

/// The origin of an IRC message.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// Server name, SID, or UID (anything without `!`/`@` separators).
    ServerName(String),
    /// User identity: (nickname, username, hostname).
    Nickname(String, String, String),
}

impl Prefix {
    /// Lenient parse of a prefix string.
    ///
    /// A name containing a dot before any `!`/`@` is treated as a server
    /// name; otherwise the `nick[!user][@host]` form is assumed.
    pub fn new_from_str(s: &str) -> Self {
        let (name, rest) = match s.split_once('!') {
            Some((n, r)) => (n, Some(r)),
            None => (s, None),
        };
        match rest {
            Some(rest) => {
                let (user, host) = match rest.split_once('@') {
                    Some((u, h)) => (u.to_owned(), h.to_owned()),
                    None => (rest.to_owned(), String::new()),
                };
                Prefix::Nickname(name.to_owned(), user, host)
            }
            None => match s.split_once('@') {
                Some((n, h)) => Prefix::Nickname(n.to_owned(), String::new(), h.to_owned()),
                None if s.contains('.') => Prefix::ServerName(s.to_owned()),
                None => Prefix::Nickname(s.to_owned(), String::new(), String::new()),
            },
        }
    }

    /// Build a full user prefix.
    pub fn new(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Prefix::Nickname(nick.into(), user.into(), host.into())
    }

    /// The nickname, if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(n, _, _) if !n.is_empty() => Some(n),
            _ => None,
        }
    }

    /// The raw name component, whatever its kind.
    pub fn name(&self) -> &str {
        match self {
            Prefix::ServerName(n) => n,
            Prefix::Nickname(n, _, _) => n,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Prefix {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Prefix::new_from_str(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_mask() {
        let p = Prefix::new_from_str("alice!a@host.example");
        assert_eq!(
            p,
            Prefix::Nickname("alice".into(), "a".into(), "host.example".into())
        );
        assert_eq!(p.to_string(), "alice!a@host.example");
    }

    #[test]
    fn parses_server_name() {
        let p = Prefix::new_from_str("irc.example.com");
        assert_eq!(p, Prefix::ServerName("irc.example.com".into()));
    }

    #[test]
    fn bare_nick_is_user_prefix() {
        let p = Prefix::new_from_str("alice");
        assert_eq!(p.nick(), Some("alice"));
        assert_eq!(p.to_string(), "alice");
    }

    #[test]
    fn sid_and_uid_round_trip() {
        // S2S sources: a bare SID or UID has no dot, but serializes as-is.
        let p = Prefix::new_from_str("001");
        assert_eq!(p.to_string(), "001");
        let p = Prefix::new_from_str("001AAAAAB");
        assert_eq!(p.to_string(), "001AAAAAB");
    }

    #[test]
    fn nick_at_host_without_user() {
        let p = Prefix::new_from_str("alice@host");
        assert_eq!(
            p,
            Prefix::Nickname("alice".into(), String::new(), "host".into())
        );
        assert_eq!(p.to_string(), "alice@host");
    }
}
