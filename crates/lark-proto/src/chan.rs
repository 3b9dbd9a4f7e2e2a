//! Channel name validation.

/// Default maximum channel name length.
pub const DEFAULT_CHANNEL_MAX_LEN: usize = 64;

/// Extension trait for strings that may name a channel.
pub trait ChannelExt {
    /// True if this string starts with a channel sigil (`#` or `&`).
    fn is_channel_name(&self) -> bool;

    /// Full validation: sigil, no forbidden characters, length cap.
    fn is_valid_channel_name(&self, max_len: usize) -> bool;
}

impl<T: AsRef<str>> ChannelExt for T {
    fn is_channel_name(&self) -> bool {
        let s = self.as_ref();
        s.starts_with('#') || s.starts_with('&')
    }

    fn is_valid_channel_name(&self, max_len: usize) -> bool {
        let s = self.as_ref();
        if !s.is_channel_name() || s.len() < 2 || s.len() > max_len {
            return false;
        }
        s.chars()
            .all(|c| !matches!(c, ' ' | ',' | ':' | '\x00'..='\x1f' | '\x7f'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigils() {
        assert!("#rust".is_channel_name());
        assert!("&local".is_channel_name());
        assert!(!"rust".is_channel_name());
        assert!(!"+x".is_channel_name());
    }

    #[test]
    fn validation() {
        assert!("#rust".is_valid_channel_name(64));
        assert!("&ops".is_valid_channel_name(64));
        assert!(!"#".is_valid_channel_name(64)); // sigil alone
        assert!(!"#a b".is_valid_channel_name(64));
        assert!(!"#a,b".is_valid_channel_name(64));
        assert!(!"#a:b".is_valid_channel_name(64));
        assert!(!"#a\x07b".is_valid_channel_name(64));
        assert!(!format!("#{}", "x".repeat(64)).is_valid_channel_name(64));
    }
}
