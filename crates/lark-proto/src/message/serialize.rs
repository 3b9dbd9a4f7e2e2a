//! `Display` for [`Message`]: the wire form without CRLF.

use std::fmt;

use super::tags::escape_tag_value;
use super::types::{Message, Tag};

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            if !tags.is_empty() {
                f.write_str("@")?;
                for (i, Tag(key, value)) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    f.write_str(key)?;
                    if let Some(value) = value {
                        f.write_str("=")?;
                        escape_tag_value(f, value)?;
                    }
                }
                f.write_str(" ")?;
            }
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        self.command.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::command::Command;
    use crate::message::Message;
    use crate::prefix::Prefix;

    #[test]
    fn serializes_plain() {
        let msg = Message::privmsg("#chan", "hello world");
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hello world");
    }

    #[test]
    fn serializes_with_prefix_and_tags() {
        let msg = Message::privmsg("#chan", "hi")
            .with_tag("msgid", Some("abc".into()))
            .with_tag("time", Some("2024-01-01T00:00:00.000Z".into()))
            .with_prefix(Prefix::new("nick", "user", "host"));
        assert_eq!(
            msg.to_string(),
            "@msgid=abc;time=2024-01-01T00:00:00.000Z :nick!user@host PRIVMSG #chan :hi"
        );
    }

    #[test]
    fn escapes_tag_values() {
        let msg = Message::from(Command::TAGMSG("#c".into()))
            .with_tag("+draft/reply", Some("a b;c".into()));
        assert_eq!(msg.to_string(), "@+draft/reply=a\\sb\\:c TAGMSG #c");
    }

    #[test]
    fn round_trip_equals() {
        let original = Message::privmsg("#test", "Hello, world!")
            .with_tag("time", Some("2024-06-01T12:00:00.000Z".into()))
            .with_prefix(Prefix::new("bot", "b", "example.com"));
        let reparsed: Message = original.to_string().parse().unwrap();
        assert_eq!(original, reparsed);
    }
}
