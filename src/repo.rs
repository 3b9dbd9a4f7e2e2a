//! Collaborator contracts: repositories and the connection surface.
//!
//! The core depends only on these traits. In-memory implementations back
//! the default runtime and the test harness; durable stores live outside
//! this crate.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use lark_proto::irc_to_lower;
use parking_lot::Mutex;

/// Account lookups for SASL and NickServ-style identification.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Verify an account password (SASL PLAIN).
    async fn verify(&self, account: &str, password: &str) -> bool;

    /// Fetch the stored password for challenge mechanisms (SCRAM).
    async fn password(&self, account: &str) -> Option<String>;

    /// Resolve a TLS certificate fingerprint to an account (EXTERNAL).
    async fn account_for_certfp(&self, fingerprint: &str) -> Option<String>;
}

/// Registered-channel lookups: registered channels survive emptiness.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// True if this (folded) channel name has a registration record.
    async fn is_registered(&self, channel: &str) -> bool;
}

/// A message retained for chathistory.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Server-assigned message id.
    pub msgid: String,
    /// Folded target: a channel name or a nick pair key.
    pub target: String,
    /// Full `nick!user@host` of the sender.
    pub source: String,
    /// Sender's account, if identified.
    pub account: Option<String>,
    /// Milliseconds since the epoch.
    pub ts_millis: i64,
    /// `PRIVMSG` or `NOTICE`.
    pub command: String,
    pub text: String,
}

/// Range selector for history queries.
#[derive(Debug, Clone)]
pub enum HistorySelector {
    /// Most recent messages.
    Latest,
    /// Strictly before the anchor.
    Before(HistoryAnchor),
    /// Strictly after the anchor.
    After(HistoryAnchor),
    /// Centered on the anchor.
    Around(HistoryAnchor),
    /// Between the two anchors, exclusive.
    Between(HistoryAnchor, HistoryAnchor),
}

/// A point in a history timeline.
#[derive(Debug, Clone)]
pub enum HistoryAnchor {
    Timestamp(i64),
    Msgid(String),
}

/// Message history persistence.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Retain a delivered message.
    async fn append(&self, message: StoredMessage);

    /// Query up to `limit` messages for `target`, oldest first.
    async fn query(
        &self,
        target: &str,
        selector: HistorySelector,
        limit: usize,
    ) -> Vec<StoredMessage>;
}

/// Out-of-band notification of user lifecycle events.
#[async_trait]
pub trait UserEventNotifier: Send + Sync {
    async fn user_registered(&self, uid: &str, nick: &str) {
        let _ = (uid, nick);
    }
    async fn user_disconnected(&self, uid: &str, nick: &str, reason: &str) {
        let _ = (uid, nick, reason);
    }
}

/// The repository set handed to the core.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: std::sync::Arc<dyn AccountRepository>,
    pub channels: std::sync::Arc<dyn ChannelRegistry>,
    pub history: std::sync::Arc<dyn HistoryStore>,
    pub notifier: std::sync::Arc<dyn UserEventNotifier>,
}

impl Repositories {
    /// All-in-memory repositories (default runtime and tests).
    pub fn in_memory() -> Self {
        Self {
            accounts: std::sync::Arc::new(MemoryAccounts::default()),
            channels: std::sync::Arc::new(MemoryChannelRegistry::default()),
            history: std::sync::Arc::new(MemoryHistory::default()),
            notifier: std::sync::Arc::new(NullNotifier),
        }
    }
}

// --- In-memory implementations ---

/// Accounts held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    passwords: DashMap<String, String>,
    certfps: DashMap<String, String>,
}

impl MemoryAccounts {
    /// Seed an account.
    pub fn insert(&self, account: &str, password: &str) {
        self.passwords
            .insert(irc_to_lower(account), password.to_string());
    }

    /// Bind a certificate fingerprint to an account.
    pub fn bind_certfp(&self, fingerprint: &str, account: &str) {
        self.certfps
            .insert(fingerprint.to_ascii_lowercase(), account.to_string());
    }
}

#[async_trait]
impl AccountRepository for MemoryAccounts {
    async fn verify(&self, account: &str, password: &str) -> bool {
        use subtle::ConstantTimeEq;
        self.passwords
            .get(&irc_to_lower(account))
            .map(|stored| {
                stored.as_bytes().ct_eq(password.as_bytes()).unwrap_u8() == 1
            })
            .unwrap_or(false)
    }

    async fn password(&self, account: &str) -> Option<String> {
        self.passwords.get(&irc_to_lower(account)).map(|p| p.clone())
    }

    async fn account_for_certfp(&self, fingerprint: &str) -> Option<String> {
        self.certfps
            .get(&fingerprint.to_ascii_lowercase())
            .map(|a| a.clone())
    }
}

/// Registered channels held in memory.
#[derive(Debug, Default)]
pub struct MemoryChannelRegistry {
    registered: DashMap<String, ()>,
}

impl MemoryChannelRegistry {
    /// Mark a channel registered.
    pub fn register(&self, channel: &str) {
        self.registered.insert(irc_to_lower(channel), ());
    }
}

#[async_trait]
impl ChannelRegistry for MemoryChannelRegistry {
    async fn is_registered(&self, channel: &str) -> bool {
        self.registered.contains_key(&irc_to_lower(channel))
    }
}

/// History ring buffers per target.
#[derive(Debug)]
pub struct MemoryHistory {
    per_target: DashMap<String, Mutex<VecDeque<StoredMessage>>>,
    cap: usize,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self {
            per_target: DashMap::new(),
            cap: 1024,
        }
    }
}

impl MemoryHistory {
    fn position(&self, buffer: &VecDeque<StoredMessage>, anchor: &HistoryAnchor) -> Option<usize> {
        match anchor {
            HistoryAnchor::Msgid(id) => buffer.iter().position(|m| &m.msgid == id),
            HistoryAnchor::Timestamp(ts) => {
                Some(buffer.iter().take_while(|m| m.ts_millis < *ts).count())
            }
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, message: StoredMessage) {
        let entry = self
            .per_target
            .entry(message.target.clone())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut buffer = entry.lock();
        if buffer.len() >= self.cap {
            buffer.pop_front();
        }
        buffer.push_back(message);
    }

    async fn query(
        &self,
        target: &str,
        selector: HistorySelector,
        limit: usize,
    ) -> Vec<StoredMessage> {
        let Some(entry) = self.per_target.get(target) else {
            return Vec::new();
        };
        let buffer = entry.lock();
        let len = buffer.len();
        let slice: Vec<StoredMessage> = match selector {
            HistorySelector::Latest => {
                buffer.iter().skip(len.saturating_sub(limit)).cloned().collect()
            }
            HistorySelector::Before(anchor) => {
                let end = match self.position(&buffer, &anchor) {
                    Some(pos) => pos,
                    None => len,
                };
                buffer
                    .iter()
                    .take(end)
                    .skip(end.saturating_sub(limit))
                    .cloned()
                    .collect()
            }
            HistorySelector::After(anchor) => {
                let start = match self.position(&buffer, &anchor) {
                    Some(pos) => match anchor {
                        HistoryAnchor::Msgid(_) => pos + 1,
                        HistoryAnchor::Timestamp(_) => pos,
                    },
                    None => len,
                };
                buffer.iter().skip(start).take(limit).cloned().collect()
            }
            HistorySelector::Around(anchor) => {
                let center = self.position(&buffer, &anchor).unwrap_or(len);
                let half = limit / 2;
                let start = center.saturating_sub(half);
                buffer.iter().skip(start).take(limit).cloned().collect()
            }
            HistorySelector::Between(from, to) => {
                let start = match self.position(&buffer, &from) {
                    Some(pos) => match from {
                        HistoryAnchor::Msgid(_) => pos + 1,
                        HistoryAnchor::Timestamp(_) => pos,
                    },
                    None => len,
                };
                let end = self.position(&buffer, &to).unwrap_or(len);
                buffer
                    .iter()
                    .skip(start)
                    .take(end.saturating_sub(start).min(limit))
                    .cloned()
                    .collect()
            }
        };
        slice
    }
}

/// A notifier that drops every event.
pub struct NullNotifier;

#[async_trait]
impl UserEventNotifier for NullNotifier {}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(n: u32) -> StoredMessage {
        StoredMessage {
            msgid: format!("id{n}"),
            target: "#c".into(),
            source: "a!a@h".into(),
            account: None,
            ts_millis: 1000 + n as i64,
            command: "PRIVMSG".into(),
            text: format!("m{n}"),
        }
    }

    #[tokio::test]
    async fn accounts_verify() {
        let accounts = MemoryAccounts::default();
        accounts.insert("Alice", "pw");
        assert!(accounts.verify("alice", "pw").await);
        assert!(!accounts.verify("alice", "bad").await);
        assert!(!accounts.verify("nobody", "pw").await);
        assert_eq!(accounts.password("ALICE").await.as_deref(), Some("pw"));
    }

    #[tokio::test]
    async fn history_latest_and_before() {
        let history = MemoryHistory::default();
        for n in 0..10 {
            history.append(stored(n)).await;
        }
        let latest = history.query("#c", HistorySelector::Latest, 3).await;
        assert_eq!(
            latest.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["m7", "m8", "m9"]
        );

        let before = history
            .query(
                "#c",
                HistorySelector::Before(HistoryAnchor::Msgid("id5".into())),
                2,
            )
            .await;
        assert_eq!(
            before.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["m3", "m4"]
        );
    }

    #[tokio::test]
    async fn history_after_and_between() {
        let history = MemoryHistory::default();
        for n in 0..10 {
            history.append(stored(n)).await;
        }
        let after = history
            .query(
                "#c",
                HistorySelector::After(HistoryAnchor::Msgid("id7".into())),
                5,
            )
            .await;
        assert_eq!(
            after.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["m8", "m9"]
        );

        let between = history
            .query(
                "#c",
                HistorySelector::Between(
                    HistoryAnchor::Msgid("id2".into()),
                    HistoryAnchor::Msgid("id6".into()),
                ),
                10,
            )
            .await;
        assert_eq!(
            between.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["m3", "m4", "m5"]
        );
    }

    #[tokio::test]
    async fn history_timestamp_anchor() {
        let history = MemoryHistory::default();
        for n in 0..5 {
            history.append(stored(n)).await;
        }
        let after = history
            .query(
                "#c",
                HistorySelector::After(HistoryAnchor::Timestamp(1003)),
                10,
            )
            .await;
        assert_eq!(
            after.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
            vec!["m3", "m4"]
        );
    }
}
