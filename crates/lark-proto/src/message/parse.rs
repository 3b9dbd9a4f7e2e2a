//! `FromStr` for [`Message`] over the nom parser.

use std::str::FromStr;

use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

fn parse_tags_section(section: &str) -> Vec<Tag> {
    section
        .split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            let value = parts.next().map(unescape_tag_value);
            Tag(key.to_owned(), value)
        })
        .collect()
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let invalid = |cause: MessageParseError| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        };

        // Strip one line terminator: CRLF, or a lone LF or CR.
        let line = s
            .strip_suffix("\r\n")
            .or_else(|| s.strip_suffix('\n'))
            .or_else(|| s.strip_suffix('\r'))
            .unwrap_or(s);

        if line.is_empty() {
            return Err(invalid(MessageParseError::EmptyMessage));
        }

        let parsed = ParsedMessage::parse(line).map_err(invalid)?;

        let tags = parsed.tags.map(parse_tags_section);
        let prefix = parsed.prefix.map(Prefix::new_from_str);
        let command = Command::new(parsed.command, parsed.params.to_vec()).map_err(invalid)?;

        Ok(Message {
            tags,
            prefix,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    #[test]
    fn parses_privmsg_with_prefix() {
        let msg: Message = ":nick!user@host PRIVMSG #channel :Hello, world!\r\n"
            .parse()
            .unwrap();
        assert!(matches!(msg.command, Command::PRIVMSG(..)));
        assert_eq!(msg.source_nickname(), Some("nick"));
    }

    #[test]
    fn parses_ts6_pass() {
        let msg: Message = "PASS hunter2 TS 6 :001\r\n".parse().unwrap();
        match msg.command {
            Command::PassTs6 { password, sid } => {
                assert_eq!(password, "hunter2");
                assert_eq!(sid, "001");
            }
            other => panic!("expected PassTs6, got {other:?}"),
        }
    }

    #[test]
    fn parses_escaped_tags() {
        let msg: Message = "@key=a\\sb\\:c PING :x\r\n".parse().unwrap();
        assert_eq!(msg.tag_value("key"), Some("a b;c"));
    }

    #[test]
    fn parses_numeric() {
        let msg: Message = ":server 001 nick :Welcome\r\n".parse().unwrap();
        match msg.command {
            Command::Response(Response::RPL_WELCOME, params) => {
                assert_eq!(params, vec!["nick", "Welcome"]);
            }
            other => panic!("expected 001, got {other:?}"),
        }
    }

    #[test]
    fn tolerates_lone_lf_and_cr() {
        assert!("PING :x\n".parse::<Message>().is_ok());
        assert!("PING :x\r".parse::<Message>().is_ok());
        assert!("PING :x".parse::<Message>().is_ok());
    }

    #[test]
    fn empty_line_fails() {
        assert!("".parse::<Message>().is_err());
        assert!("\r\n".parse::<Message>().is_err());
    }

    #[test]
    fn unterminated_tags_fail() {
        let err = "@time=now".parse::<Message>().unwrap_err();
        match err {
            ProtocolError::InvalidMessage { cause, .. } => {
                assert_eq!(cause, MessageParseError::UnterminatedTags);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_encap() {
        let msg: Message = ":001 ENCAP * LOGIN 001AAAAAB acct\r\n".parse().unwrap();
        match msg.command {
            Command::ENCAP(target, sub, params) => {
                assert_eq!(target, "*");
                assert_eq!(sub, "LOGIN");
                assert_eq!(params, vec!["001AAAAAB", "acct"]);
            }
            other => panic!("expected ENCAP, got {other:?}"),
        }
    }

    #[test]
    fn flag_tags_parse_without_value() {
        let msg: Message = "@bot;time=x PING :y".parse().unwrap();
        let tags = msg.tags.as_ref().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], Tag("bot".into(), None));
    }
}
