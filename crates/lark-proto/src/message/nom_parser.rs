//! Nom-based IRC line parser.
//!
//! Produces a borrowed [`ParsedMessage`]; conversion to the owned
//! [`Message`](super::Message) happens in `parse.rs`.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::char,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::MessageParseError;

/// RFC 2812 parameter ceiling.
const MAX_PARAMS: usize = 15;

fn tags_section(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn prefix_section(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

fn command_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

fn skip_spaces(mut input: &str) -> &str {
    while input.as_bytes().first() == Some(&b' ') {
        input = &input[1..];
    }
    input
}

/// A parsed IRC message borrowing from the input line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    /// Raw tag section without the leading `@`.
    pub tags: Option<&'a str>,
    /// Raw prefix without the leading `:`.
    pub prefix: Option<&'a str>,
    /// The command verb.
    pub command: &'a str,
    /// Parameters, trailing included as the final entry.
    pub params: SmallVec<[&'a str; MAX_PARAMS]>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse a single line (CRLF already stripped).
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.trim_matches(' ').is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        // Tag section. `take_until(" ")` failing on a present `@` means the
        // tag block was never terminated by a space.
        let (rest, tags) = if input.starts_with('@') {
            match tags_section(input) {
                Ok((rest, tags)) => (rest, Some(tags)),
                Err(_) => return Err(MessageParseError::UnterminatedTags),
            }
        } else {
            (input, None)
        };
        let rest = skip_spaces(rest);

        let (rest, prefix) = if rest.starts_with(':') {
            match prefix_section(rest) {
                Ok((rest, prefix)) => (rest, Some(prefix)),
                Err(_) => return Err(MessageParseError::MissingCommand),
            }
        } else {
            (rest, None)
        };
        let rest = skip_spaces(rest);

        let (rest, command) = command_token(rest).map_err(
            |_: nom::Err<nom::error::Error<&str>>| MessageParseError::MissingCommand,
        )?;

        // RFC 2812: command = 1*letter / 3digit.
        let all_letters = command.chars().all(|c| c.is_ascii_alphabetic());
        let three_digits = command.len() == 3 && command.chars().all(|c| c.is_ascii_digit());
        if !all_letters && !three_digits {
            return Err(MessageParseError::InvalidCommand(command.to_owned()));
        }

        let params = parse_params(rest)?;

        Ok(ParsedMessage {
            tags,
            prefix,
            command,
            params,
        })
    }
}

fn parse_params(input: &str) -> Result<SmallVec<[&str; MAX_PARAMS]>, MessageParseError> {
    let mut params: SmallVec<[&str; MAX_PARAMS]> = SmallVec::new();
    let mut rest = input;

    while rest.as_bytes().first() == Some(&b' ') {
        rest = skip_spaces(rest);
        if rest.is_empty() {
            break;
        }

        if params.len() >= MAX_PARAMS {
            return Err(MessageParseError::TooManyParams);
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            // Trailing: the remainder of the line, spaces and all.
            params.push(stripped);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    Ok(params)
}
