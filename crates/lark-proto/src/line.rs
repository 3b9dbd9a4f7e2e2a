//! Tokio codec for framed IRC lines.
//!
//! Splits the byte stream on LF (tolerating bare CR endings inside a
//! buffered chunk is left to the parser, which strips either terminator),
//! enforces the size limits, and parses each line into a [`Message`].

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::message::{Message, MAX_LINE_LEN, MAX_TAGS_LEN};

/// Framed IRC line codec.
///
/// Decoded items are parsed [`Message`]s; encoding appends CRLF.
#[derive(Debug, Default)]
pub struct LineCodec {
    // Scan position into the buffer, so repeated decode calls do not
    // re-scan bytes already known not to contain a newline.
    scanned: usize,
}

impl LineCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_limits(line: &str) -> Result<(), ProtocolError> {
        if let Some(rest) = line.strip_prefix('@') {
            let (tags, payload) = match rest.split_once(' ') {
                Some((tags, payload)) => (tags, payload),
                None => (rest, ""),
            };
            // '@' + tags + ' '
            let tag_section = tags.len() + 2;
            if tag_section > MAX_TAGS_LEN {
                return Err(ProtocolError::TagsTooLong {
                    actual: tag_section,
                    limit: MAX_TAGS_LEN,
                });
            }
            // payload + CRLF
            if payload.len() + 2 > MAX_LINE_LEN {
                return Err(ProtocolError::MessageTooLong {
                    actual: payload.len() + 2,
                    limit: MAX_LINE_LEN,
                });
            }
        } else if line.len() + 2 > MAX_LINE_LEN {
            return Err(ProtocolError::MessageTooLong {
                actual: line.len() + 2,
                limit: MAX_LINE_LEN,
            });
        }
        Ok(())
    }
}

impl Decoder for LineCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        let newline = src[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| pos + self.scanned);

        let Some(newline) = newline else {
            self.scanned = src.len();
            // A line that can never fit is rejected without waiting for LF.
            if src.len() > MAX_TAGS_LEN + MAX_LINE_LEN {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: MAX_TAGS_LEN + MAX_LINE_LEN,
                });
            }
            return Ok(None);
        };

        let mut frame = src.split_to(newline + 1);
        self.scanned = 0;

        // Drop LF and an optional preceding CR.
        frame.truncate(frame.len() - 1);
        if frame.last() == Some(&b'\r') {
            frame.truncate(frame.len() - 1);
        }

        if frame.is_empty() {
            // Empty line between messages: skip and try the next frame.
            return self.decode(src);
        }

        let line = std::str::from_utf8(&frame).map_err(|e| ProtocolError::InvalidUtf8 {
            byte_pos: e.valid_up_to(),
        })?;

        Self::check_limits(line)?;
        line.parse().map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        if src.is_empty() {
            return Ok(None);
        }
        // Terminate a final unterminated line at EOF.
        src.put_u8(b'\n');
        self.decode(src)
    }
}

impl Encoder<Message> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = msg.to_string();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn decode_all(input: &[u8]) -> Vec<Message> {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(msg) = codec.decode(&mut buf).unwrap() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn splits_crlf_and_lf() {
        let msgs = decode_all(b"PING :a\r\nPING :b\nPING :c\r\n");
        assert_eq!(msgs.len(), 3);
    }

    #[test]
    fn waits_for_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #c :par"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"tial\r\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, Command::PRIVMSG("#c".into(), "partial".into()));
    }

    #[test]
    fn rejects_oversize_payload() {
        let mut codec = LineCodec::new();
        let line = format!("PRIVMSG #c :{}\r\n", "x".repeat(600));
        let mut buf = BytesMut::from(line.as_bytes());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn tags_extend_the_budget() {
        let mut codec = LineCodec::new();
        let line = format!("@a={} PING :x\r\n", "y".repeat(1000));
        let mut buf = BytesMut::from(line.as_bytes());
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn rejects_oversize_tags() {
        let mut codec = LineCodec::new();
        let line = format!("@a={} PING :x\r\n", "y".repeat(4200));
        let mut buf = BytesMut::from(line.as_bytes());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::TagsTooLong { .. })
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :\xff\xfe\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::privmsg("#c", "hi"), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PRIVMSG #c :hi\r\n");
    }

    #[test]
    fn eof_flushes_final_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :tail"[..]);
        let msg = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, Command::PING("tail".into(), None));
    }
}
