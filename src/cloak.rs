//! Hostname cloaking.
//!
//! Displayed hostnames are derived from the real host with a keyed HMAC so
//! they are stable per host but not reversible. Cipher details beyond this
//! are not part of the protocol surface.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cloak a hostname or IP string into a displayed host.
pub fn cloak_host(host: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(host.as_bytes());
    let digest = mac.finalize().into_bytes();
    let token: String = digest[..5].iter().map(|b| format!("{b:02x}")).collect();

    // Keep the domain tail visible for hostnames (user.<tail>), hide IPs
    // entirely.
    match host.rsplit_once('.') {
        Some((_, tail)) if tail.chars().any(|c| c.is_ascii_alphabetic()) => {
            format!("lark-{token}.{tail}")
        }
        _ => format!("lark-{token}.ip"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloak_is_stable_and_keyed() {
        let a = cloak_host("host.example.com", "k1");
        assert_eq!(a, cloak_host("host.example.com", "k1"));
        assert_ne!(a, cloak_host("host.example.com", "k2"));
        assert_ne!(a, cloak_host("other.example.com", "k1"));
    }

    #[test]
    fn keeps_domain_tail_for_hostnames() {
        let cloaked = cloak_host("dsl.customer.example.net", "k");
        assert!(cloaked.starts_with("lark-"));
        assert!(cloaked.ends_with(".net"));
    }

    #[test]
    fn hides_ips() {
        assert!(cloak_host("203.0.113.7", "k").ends_with(".ip"));
        assert!(cloak_host("2001:db8::1", "k").ends_with(".ip"));
    }
}
