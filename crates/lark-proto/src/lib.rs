//! # lark-proto
//!
//! IRC protocol library: message parsing and serialization with IRCv3 tag
//! support, RFC 1459 casemapping, nickname/channel validation, mode
//! tokenization, numeric responses, capability and ISUPPORT vocabularies,
//! SASL primitives, and (behind the `tokio` feature) a framed line codec.
//!
//! ## Parsing and building messages
//!
//! ```rust
//! use lark_proto::Message;
//!
//! let msg: Message = "@time=2024-01-01T00:00:00.000Z :nick!u@h PRIVMSG #chan :Hi!"
//!     .parse()
//!     .expect("valid IRC message");
//! assert_eq!(msg.source_nickname(), Some("nick"));
//!
//! let reply = Message::privmsg("#chan", "Hello!").with_tag("msgid", Some("x".into()));
//! assert_eq!(reply.to_string(), "@msgid=x PRIVMSG #chan :Hello!");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod caps;
pub mod casemap;
pub mod chan;
pub mod command;
pub mod error;
pub mod ircv3;
pub mod isupport;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod mode;
pub mod nick;
pub mod prefix;
pub mod response;
pub mod sasl;
pub mod util;

pub use self::caps::{Capability, SUPPORTED_CAPS};
pub use self::chan::{ChannelExt, DEFAULT_CHANNEL_MAX_LEN};
pub use self::command::{CapSubCommand, Command, UidParams};
pub use self::error::{MessageParseError, ProtocolError};
pub use self::ircv3::{
    format_server_time, generate_batch_ref, generate_msgid, parse_server_time, server_time_now,
};
pub use self::isupport::IsupportBuilder;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::{Message, Tag, MAX_LINE_LEN, MAX_TAGS_LEN};
pub use self::mode::{ModeAction, ModeChange, ParamClass};
pub use self::nick::{is_valid_nick, Nickname, DEFAULT_NICK_MAX_LEN};
pub use self::prefix::Prefix;
pub use self::response::Response;
pub use self::sasl::SaslMechanism;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::util::{matches_hostmask, matches_userhost, wildcard_match};
