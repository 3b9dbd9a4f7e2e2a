//! IRC message types, parsing, and serialization.

mod nom_parser;
mod parse;
mod serialize;
mod tags;
mod types;

pub use tags::{escape_tag_value, unescape_tag_value};
pub use types::{Message, Tag};

/// Maximum length of the non-tag portion of a message, including CRLF.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum length of the tag section, including the leading `@` and the
/// trailing space.
pub const MAX_TAGS_LEN: usize = 4096;
