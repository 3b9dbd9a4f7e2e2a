//! Owned message type and convenience constructors.

use crate::command::Command;
use crate::prefix::Prefix;

/// An owned IRC message: optional tags, optional source, and a command.
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// IRCv3 message tags (`time`, `msgid`, ...).
    pub tags: Option<Vec<Tag>>,
    /// Message source.
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

impl Message {
    /// The nickname of the source, if the source is a user prefix.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// The value of a tag by key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// The labeled-response label, if present.
    pub fn label(&self) -> Option<&str> {
        self.tag_value("label")
    }

    /// The `msgid` tag, if present.
    pub fn msgid(&self) -> Option<&str> {
        self.tag_value("msgid")
    }

    /// Build a PRIVMSG.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// Build a NOTICE.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::NOTICE(target.into(), text.into()).into()
    }

    /// Build a JOIN for a single channel.
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Command::JOIN(channel.into(), None).into()
    }

    /// Build a PING carrying a token.
    #[must_use]
    pub fn ping(token: impl Into<String>) -> Self {
        Command::PING(token.into(), None).into()
    }

    /// Build a PONG echoing a token.
    #[must_use]
    pub fn pong(source: impl Into<String>, token: impl Into<String>) -> Self {
        Command::PONG(source.into(), Some(token.into())).into()
    }

    /// Build an ERROR frame.
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Command::ERROR(reason.into()).into()
    }

    /// Attach a tag, appending to any existing tag list.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        let tag = Tag(key.into(), value);
        match self.tags {
            Some(ref mut tags) => tags.push(tag),
            None => self.tags = Some(vec![tag]),
        }
        self
    }

    /// Set the source of this message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Message {
        Message {
            tags: None,
            prefix: None,
            command,
        }
    }
}

/// An IRCv3 message tag: key and optional value.
#[derive(Clone, PartialEq, Debug)]
pub struct Tag(
    /// Tag key (e.g. `time`, `msgid`).
    pub String,
    /// Optional tag value; `None` for flag tags.
    pub Option<String>,
);

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(key.into(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_lookup() {
        let msg = Message::privmsg("#c", "hi")
            .with_tag("time", Some("2024-01-01T00:00:00.000Z".into()))
            .with_tag("msgid", Some("abc".into()))
            .with_tag("bot", None);
        assert_eq!(msg.tag_value("time"), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(msg.msgid(), Some("abc"));
        assert_eq!(msg.tag_value("bot"), None); // flag tag carries no value
        assert_eq!(msg.tag_value("nope"), None);
    }

    #[test]
    fn source_nickname() {
        let msg = Message::privmsg("#c", "hi").with_prefix(Prefix::new("alice", "a", "h"));
        assert_eq!(msg.source_nickname(), Some("alice"));
        let msg = Message::privmsg("#c", "hi")
            .with_prefix(Prefix::ServerName("irc.example.com".into()));
        assert_eq!(msg.source_nickname(), None);
    }
}
