//! Error types for the IRC protocol library.

use thiserror::Error;

/// Convenience alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 bytes in a received line.
    #[error("invalid UTF-8 in message at byte {byte_pos}")]
    InvalidUtf8 {
        /// Byte position where UTF-8 validation failed.
        byte_pos: usize,
    },

    /// Message exceeded the maximum allowed length.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Actual message length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Tag section exceeded the maximum allowed length.
    #[error("tags too long: {actual} bytes (limit: {limit})")]
    TagsTooLong {
        /// Actual tag section length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

/// Errors that can occur while parsing an IRC message.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The line was empty (or whitespace only).
    #[error("empty message")]
    EmptyMessage,

    /// The line had tags or a prefix but no command.
    #[error("missing command")]
    MissingCommand,

    /// A tag block was present but never terminated by a space.
    #[error("unterminated tag block")]
    UnterminatedTags,

    /// The command token was not `1*letter` or `3digit`.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The prefix could not be parsed.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    /// More than 15 parameters before the trailing parameter.
    #[error("too many parameters")]
    TooManyParams,

    /// A typed command was given an argument it cannot represent.
    #[error("invalid argument for {command}: {argument}")]
    InvalidArgument {
        /// The command being constructed.
        command: String,
        /// The offending argument.
        argument: String,
    },
}

/// Errors from nickname or channel-name validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// The name was empty.
    #[error("name is empty")]
    Empty,

    /// The name exceeded the allowed length.
    #[error("name too long: {len} (limit: {limit})")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// The name contained a character the grammar forbids.
    #[error("illegal character {ch:?} at position {pos}")]
    IllegalChar {
        /// The offending character.
        ch: char,
        /// Its byte position.
        pos: usize,
    },
}
