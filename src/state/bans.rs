//! Server bans: K-lines, G-lines, Z-lines, and jupes.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use ipnet::IpNet;
use lark_proto::{matches_userhost, wildcard_match};
use parking_lot::RwLock;

/// Ban categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanType {
    /// Local user@host ban.
    KLine,
    /// Network-wide user@host ban.
    GLine,
    /// IP ban (wildcard or CIDR).
    ZLine,
    /// Server-name ban.
    Jupe,
}

impl BanType {
    /// STATS letter for this type.
    pub fn letter(self) -> char {
        match self {
            BanType::KLine => 'K',
            BanType::GLine => 'G',
            BanType::ZLine => 'Z',
            BanType::Jupe => 'J',
        }
    }
}

/// A server ban record.
#[derive(Debug, Clone)]
pub struct ServerBan {
    pub id: u64,
    pub ban_type: BanType,
    pub pattern: String,
    pub reason: String,
    pub setter: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    /// Pre-parsed network for CIDR Z-lines.
    network: Option<IpNet>,
}

/// Parse an IP or CIDR string; plain addresses become host networks.
fn parse_ip_or_cidr(pattern: &str) -> Option<IpNet> {
    pattern.parse().ok().or_else(|| {
        pattern.parse::<IpAddr>().ok().map(|addr| match addr {
            IpAddr::V4(v4) => {
                IpNet::V4(ipnet::Ipv4Net::new(v4, 32).expect("/32 is a valid prefix"))
            }
            IpAddr::V6(v6) => {
                IpNet::V6(ipnet::Ipv6Net::new(v6, 128).expect("/128 is a valid prefix"))
            }
        })
    })
}

impl ServerBan {
    /// True once the expiry has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Match a connecting user against this ban.
    pub fn matches(&self, user: &str, host: &str, ip: &str) -> bool {
        match self.ban_type {
            BanType::KLine | BanType::GLine => {
                matches_userhost(&self.pattern, user, host)
                    || matches_userhost(&self.pattern, user, ip)
            }
            BanType::ZLine => match (&self.network, ip.parse::<IpAddr>()) {
                (Some(net), Ok(addr)) => net.contains(&addr),
                _ => wildcard_match(&self.pattern, ip),
            },
            BanType::Jupe => false,
        }
    }

    /// Match a server name against a jupe.
    pub fn matches_server(&self, name: &str) -> bool {
        self.ban_type == BanType::Jupe && wildcard_match(&self.pattern, name)
    }
}

/// The live ban set.
#[derive(Debug, Default)]
pub struct BanList {
    next_id: AtomicU64,
    bans: RwLock<Vec<ServerBan>>,
}

impl BanList {
    /// Add a ban; returns its id.
    pub fn add(
        &self,
        ban_type: BanType,
        pattern: &str,
        reason: &str,
        setter: &str,
        created_at: i64,
        expires_at: Option<i64>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let network = match ban_type {
            BanType::ZLine => parse_ip_or_cidr(pattern),
            _ => None,
        };
        self.bans.write().push(ServerBan {
            id,
            ban_type,
            pattern: pattern.to_string(),
            reason: reason.to_string(),
            setter: setter.to_string(),
            created_at,
            expires_at,
            network,
        });
        id
    }

    /// Remove bans of a type matching `pattern` exactly. Returns the count.
    pub fn remove(&self, ban_type: BanType, pattern: &str) -> usize {
        let mut bans = self.bans.write();
        let before = bans.len();
        bans.retain(|b| !(b.ban_type == ban_type && b.pattern == pattern));
        before - bans.len()
    }

    /// First live ban matching a connecting user.
    pub fn find_matching(&self, user: &str, host: &str, ip: &str, now: i64) -> Option<ServerBan> {
        self.bans
            .read()
            .iter()
            .find(|b| !b.is_expired(now) && b.matches(user, host, ip))
            .cloned()
    }

    /// First live jupe matching a server name.
    pub fn find_jupe(&self, name: &str, now: i64) -> Option<ServerBan> {
        self.bans
            .read()
            .iter()
            .find(|b| !b.is_expired(now) && b.matches_server(name))
            .cloned()
    }

    /// Drop expired entries.
    pub fn purge_expired(&self, now: i64) {
        self.bans.write().retain(|b| !b.is_expired(now));
    }

    /// Snapshot of live bans (STATS, burst).
    pub fn snapshot(&self, now: i64) -> Vec<ServerBan> {
        self.bans
            .read()
            .iter()
            .filter(|b| !b.is_expired(now))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kline_matches_userhost_wildcards() {
        let bans = BanList::default();
        bans.add(BanType::KLine, "*@*.bad.net", "spam", "oper", 100, None);
        assert!(bans.find_matching("joe", "gw.bad.net", "203.0.113.5", 200).is_some());
        assert!(bans.find_matching("joe", "good.net", "203.0.113.5", 200).is_none());
    }

    #[test]
    fn zline_cidr_matches_network() {
        let bans = BanList::default();
        bans.add(BanType::ZLine, "203.0.113.0/24", "abuse", "oper", 100, None);
        assert!(bans.find_matching("u", "h", "203.0.113.77", 200).is_some());
        assert!(bans.find_matching("u", "h", "203.0.114.1", 200).is_none());
    }

    #[test]
    fn zline_plain_ip_is_host_network() {
        let bans = BanList::default();
        bans.add(BanType::ZLine, "198.51.100.9", "abuse", "oper", 100, None);
        assert!(bans.find_matching("u", "h", "198.51.100.9", 200).is_some());
        assert!(bans.find_matching("u", "h", "198.51.100.10", 200).is_none());
    }

    #[test]
    fn zline_wildcard_fallback() {
        let bans = BanList::default();
        bans.add(BanType::ZLine, "203.0.*", "abuse", "oper", 100, None);
        assert!(bans.find_matching("u", "h", "203.0.113.5", 200).is_some());
    }

    #[test]
    fn expiry_and_purge() {
        let bans = BanList::default();
        bans.add(BanType::KLine, "*@x", "r", "oper", 100, Some(150));
        assert!(bans.find_matching("u", "x", "ip", 149).is_some());
        assert!(bans.find_matching("u", "x", "ip", 150).is_none());
        bans.purge_expired(200);
        assert!(bans.snapshot(100).is_empty());
    }

    #[test]
    fn jupe_matches_server_names_only() {
        let bans = BanList::default();
        bans.add(BanType::Jupe, "evil.*", "rogue", "oper", 100, None);
        assert!(bans.find_jupe("evil.example.net", 200).is_some());
        assert!(bans.find_jupe("good.example.net", 200).is_none());
        assert!(bans.find_matching("u", "evil.example.net", "ip", 200).is_none());
    }

    #[test]
    fn remove_by_pattern() {
        let bans = BanList::default();
        bans.add(BanType::KLine, "*@a", "r", "o", 100, None);
        bans.add(BanType::KLine, "*@b", "r", "o", 100, None);
        assert_eq!(bans.remove(BanType::KLine, "*@a"), 1);
        assert_eq!(bans.remove(BanType::KLine, "*@a"), 0);
        assert_eq!(bans.snapshot(100).len(), 1);
    }
}
