//! IRCv3 message tag value escaping.

use std::fmt::{Result as FmtResult, Write};

/// Escape a tag value for the wire.
///
/// `;` → `\:`, space → `\s`, `\` → `\\`, CR → `\r`, LF → `\n`.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from the wire.
///
/// Unknown escapes `\x` yield `x`; a lone trailing `\` is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let unescaped = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(other) => other,
                None => break,
            }
        } else {
            c
        };
        out.push(unescaped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_all_sequences() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
        assert_eq!(unescape_tag_value("a\\sb"), "a b");
        assert_eq!(unescape_tag_value("a\\\\b"), "a\\b");
        assert_eq!(unescape_tag_value("a\\rb"), "a\rb");
        assert_eq!(unescape_tag_value("a\\nb"), "a\nb");
    }

    #[test]
    fn unescape_unknown_drops_backslash() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn unescape_trailing_backslash_dropped() {
        assert_eq!(unescape_tag_value("abc\\"), "abc");
    }

    #[test]
    fn escape_round_trips() {
        for original in [
            "plain",
            "has space",
            "semi;colon",
            "back\\slash",
            "cr\rlf\n",
            "all; \\ \r \n of them",
        ] {
            let mut escaped = String::new();
            escape_tag_value(&mut escaped, original).unwrap();
            assert_eq!(unescape_tag_value(&escaped), original, "via {escaped:?}");
        }
    }
}
