//! IRCv3 utilities: `server-time` formatting, msgid and batch tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;

/// Format a timestamp for the `time` tag (millisecond precision, UTC).
pub fn format_server_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The current time in `server-time` format.
pub fn server_time_now() -> String {
    format_server_time(Utc::now())
}

/// Parse a `time` tag value.
pub fn parse_server_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Generate a message ID: 16 random bytes, URL-safe base64.
///
/// Unique per server for the lifetime of the process; used for stable
/// ordering in chathistory.
pub fn generate_msgid() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a short batch reference token.
pub fn generate_batch_ref() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn server_time_format() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap();
        assert_eq!(format_server_time(ts), "2024-06-01T12:30:45.000Z");
    }

    #[test]
    fn server_time_round_trips() {
        let now = Utc::now();
        let parsed = parse_server_time(&format_server_time(now)).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn msgids_are_distinct() {
        let a = generate_msgid();
        let b = generate_msgid();
        assert_ne!(a, b);
        assert_eq!(a.len(), 22);
        assert!(!a.contains(' '));
    }

    #[test]
    fn batch_refs_are_short_tokens() {
        let r = generate_batch_ref();
        assert_eq!(r.len(), 8);
    }
}
