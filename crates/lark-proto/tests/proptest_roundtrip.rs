//! Property-based round-trip tests for the message codec.
//!
//! For any message the codec serializes, parsing the wire form yields an
//! equal message; and the wire form never contains embedded CR/LF or NUL.

use lark_proto::{Command, Message, Prefix, Tag};
use proptest::prelude::*;

fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex")
}

fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#&][a-zA-Z0-9_\\-]{1,49}").expect("valid regex")
}

fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

/// Text that probes colon prefixing, space handling, and empty values.
fn dangerous_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(" ".to_string()),
        Just(":".to_string()),
        Just("::".to_string()),
        Just(": trailing".to_string()),
        Just(":leading".to_string()),
        Just("hello world".to_string()),
        Just("multiple   spaces   here".to_string()),
        Just("semi;colons;everywhere".to_string()),
        Just("back\\slash".to_string()),
        Just("x".repeat(400)),
    ]
}

fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?[a-zA-Z][a-zA-Z0-9\\-]{0,20}(/[a-zA-Z][a-zA-Z0-9\\-]{0,10})?")
        .expect("valid regex")
}

/// Tag values including every character the escaper has to handle.
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9._\\- ;\\\\]{0,60}").expect("valid regex")
}

fn tag_strategy() -> impl Strategy<Value = Tag> {
    (tag_key_strategy(), prop::option::of(tag_value_strategy()))
        .prop_map(|(key, value)| Tag(key, value))
}

fn prefix_strategy() -> impl Strategy<Value = Prefix> {
    prop_oneof![
        prop::string::string_regex("[a-z]+\\.[a-z]+\\.[a-z]+")
            .expect("valid regex")
            .prop_map(Prefix::ServerName),
        (nickname_strategy(), username_strategy(), hostname_strategy())
            .prop_map(|(nick, user, host)| Prefix::Nickname(nick, user, host)),
    ]
}

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (channel_strategy(), message_text_strategy())
            .prop_map(|(t, x)| Command::PRIVMSG(t, x)),
        (channel_strategy(), message_text_strategy())
            .prop_map(|(t, x)| Command::NOTICE(t, x)),
        nickname_strategy().prop_map(Command::NICK),
        channel_strategy().prop_map(|c| Command::JOIN(c, None)),
        (channel_strategy(), prop::option::of(message_text_strategy()))
            .prop_map(|(c, r)| Command::PART(c, r)),
        hostname_strategy().prop_map(|t| Command::PING(t, None)),
        prop::option::of(message_text_strategy()).prop_map(Command::QUIT),
        prop::option::of(message_text_strategy()).prop_map(Command::AWAY),
        (channel_strategy(), prop::option::of(message_text_strategy()))
            .prop_map(|(c, t)| Command::TOPIC(c, t)),
        (
            channel_strategy(),
            nickname_strategy(),
            prop::option::of(message_text_strategy())
        )
            .prop_map(|(c, n, r)| Command::KICK(c, n, r)),
        (nickname_strategy(), channel_strategy())
            .prop_map(|(n, c)| Command::INVITE(n, c)),
        prop::option::of(channel_strategy()).prop_map(|m| Command::WHO(m, None)),
        nickname_strategy().prop_map(|n| Command::WHOIS(n, None)),
    ]
}

fn dangerous_command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (channel_strategy(), dangerous_text_strategy())
            .prop_map(|(t, x)| Command::PRIVMSG(t, x)),
        (channel_strategy(), prop::option::of(dangerous_text_strategy()))
            .prop_map(|(c, r)| Command::PART(c, r)),
        prop::option::of(dangerous_text_strategy()).prop_map(Command::QUIT),
        (channel_strategy(), prop::option::of(dangerous_text_strategy()))
            .prop_map(|(c, t)| Command::TOPIC(c, t)),
    ]
}

fn message_strategy() -> impl Strategy<Value = Message> {
    (
        prop::option::of(prop::collection::vec(tag_strategy(), 0..5)),
        prop::option::of(prefix_strategy()),
        command_strategy(),
    )
        .prop_map(|(tags, prefix, command)| Message {
            tags: tags.filter(|t| !t.is_empty()),
            prefix,
            command,
        })
}

proptest! {
    /// parse(serialize(m)) == m
    #[test]
    fn message_roundtrip(msg in message_strategy()) {
        let serialized = msg.to_string();
        let parsed: Message = serialized
            .parse()
            .expect("serialized message should be parseable");
        prop_assert_eq!(&msg, &parsed, "round-trip failed for: {}", serialized);
    }

    /// serialize(parse(serialize(m))) == serialize(m) — the wire form is a
    /// fixpoint, whichever trailing variant the serializer picked.
    #[test]
    fn serialization_is_stable(msg in message_strategy()) {
        let first = msg.to_string();
        let reparsed: Message = first.parse().unwrap();
        prop_assert_eq!(first, reparsed.to_string());
    }

    #[test]
    fn prefix_roundtrip(prefix in prefix_strategy()) {
        let serialized = prefix.to_string();
        prop_assert_eq!(&prefix, &Prefix::new_from_str(&serialized));
    }

    #[test]
    fn tag_values_survive_escaping(
        key in tag_key_strategy(),
        value in prop::option::of(tag_value_strategy())
    ) {
        let msg = Message::ping("x").with_tag(key.clone(), value.clone());
        let parsed: Message = msg.to_string().parse().expect("tagged message parses");
        let tags = parsed.tags.expect("tags survive");
        prop_assert_eq!(&tags[0].0, &key);
        prop_assert_eq!(&tags[0].1, &value);
    }

    #[test]
    fn dangerous_content_roundtrip(
        tags in prop::option::of(prop::collection::vec(tag_strategy(), 1..4)),
        prefix in prop::option::of(prefix_strategy()),
        command in dangerous_command_strategy()
    ) {
        let msg = Message { tags, prefix, command };
        let serialized = msg.to_string();

        prop_assert!(
            !serialized.contains('\r') && !serialized.contains('\n'),
            "embedded CR/LF in {:?}",
            serialized
        );
        prop_assert!(!serialized.contains('\0'), "NUL in {:?}", serialized);

        let parsed: Message = serialized
            .parse()
            .expect("dangerous message should be parseable");
        prop_assert_eq!(&msg, &parsed, "round-trip failed for: {:?}", serialized);
    }

    /// Parsing arbitrary short byte soup must never panic.
    #[test]
    fn parse_never_panics(input in "[ -~]{0,64}") {
        let _ = input.parse::<Message>();
    }
}
