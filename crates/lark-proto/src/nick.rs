//! Nickname validation.
//!
//! The RFC 2812 nickname grammar:
//!
//! ```text
//! nickname = ( letter / special ) *( letter / digit / special / "-" )
//! special  = "[" / "]" / "\" / "`" / "_" / "^" / "{" / "|" / "}"
//! ```

use crate::casemap::irc_to_lower;
use crate::error::NameError;
use std::fmt;

/// Default maximum nickname length when the server does not configure one.
pub const DEFAULT_NICK_MAX_LEN: usize = 30;

#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// Check whether `s` is a valid nickname of at most `max_len` bytes.
pub fn is_valid_nick(s: &str, max_len: usize) -> bool {
    validate_nick(s, max_len).is_ok()
}

fn validate_nick(s: &str, max_len: usize) -> Result<(), NameError> {
    if s.is_empty() {
        return Err(NameError::Empty);
    }
    if s.len() > max_len {
        return Err(NameError::TooLong {
            len: s.len(),
            limit: max_len,
        });
    }
    for (pos, c) in s.char_indices() {
        let ok = if pos == 0 {
            c.is_ascii_alphabetic() || is_special(c)
        } else {
            c.is_ascii_alphanumeric() || is_special(c) || c == '-'
        };
        if !ok {
            return Err(NameError::IllegalChar { ch: c, pos });
        }
    }
    Ok(())
}

/// A validated nickname.
///
/// Construction goes through [`Nickname::parse`]; the inner string is
/// guaranteed to match the RFC grammar and to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nickname(String);

impl Nickname {
    /// Validate `s` and wrap it. Length is checked against `max_len`.
    pub fn parse(s: &str, max_len: usize) -> Result<Self, NameError> {
        validate_nick(s, max_len)?;
        Ok(Self(s.to_owned()))
    }

    /// The nickname as given (case preserved).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The RFC 1459 casefolded form, used as an index key.
    pub fn folded(&self) -> String {
        irc_to_lower(&self.0)
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rfc_nicks() {
        for n in ["alice", "Bob", "[w]rench", "x-2", "`tick", "_und", "a"] {
            assert!(is_valid_nick(n, DEFAULT_NICK_MAX_LEN), "{n}");
        }
    }

    #[test]
    fn rejects_bad_nicks() {
        assert!(!is_valid_nick("", DEFAULT_NICK_MAX_LEN));
        assert!(!is_valid_nick("1abc", DEFAULT_NICK_MAX_LEN)); // leading digit
        assert!(!is_valid_nick("-abc", DEFAULT_NICK_MAX_LEN)); // leading dash
        assert!(!is_valid_nick("a b", DEFAULT_NICK_MAX_LEN)); // space
        assert!(!is_valid_nick("a,b", DEFAULT_NICK_MAX_LEN));
        assert!(!is_valid_nick("née", DEFAULT_NICK_MAX_LEN)); // non-ASCII
    }

    #[test]
    fn enforces_length() {
        let long = "a".repeat(31);
        assert!(!is_valid_nick(&long, 30));
        assert!(is_valid_nick(&long, 31));
    }

    #[test]
    fn folded_is_idempotent() {
        let n = Nickname::parse("Wr[en]ch", 30).unwrap();
        let once = n.folded();
        assert_eq!(once, "wr{en}ch");
        assert_eq!(irc_to_lower(&once), once);
    }

    #[test]
    fn parse_reports_position() {
        match Nickname::parse("ab!cd", 30) {
            Err(NameError::IllegalChar { ch: '!', pos: 2 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
