//! The Nexus: central shared state for the daemon.
//!
//! # Lock order (deadlock prevention)
//!
//! When acquiring multiple locks, always follow this order:
//!
//! 1. DashMap shard lock (during `.get()` / `.iter()`)
//! 2. Nick index entry
//! 3. User `RwLock`
//! 4. Channel `RwLock`
//!
//! Never acquire in reverse, and never hold any of these across an
//! `.await`. The safe patterns used throughout: collect-then-mutate
//! (gather keys, drop the iteration, then lock each entry) and
//! lock-copy-release (copy what you need out of the guard before the next
//! acquisition).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use lark_proto::{irc_to_lower, Command, Message, Prefix};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::broker::{Priority, SendQueue, Target};
use crate::config::{Config, LimitsConfig, LinkBlock, OperBlock, SecurityConfig, TimeoutsConfig};
use crate::hooks::{Event, HookRegistry};
use crate::policy::callerid::CallerIdNotifier;
use crate::repo::Repositories;
use crate::s2s::link::LinkHandle;
use crate::s2s::topology::Topology;
use crate::state::bans::BanList;
use crate::state::channel::Channel;
use crate::state::monitor::MonitorCenter;
use crate::state::uid::UidGenerator;
use crate::state::user::{Uid, User, WhowasEntry};
use crate::replies;

/// This server's identity.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub sid: String,
    pub network: String,
    pub description: String,
    /// Unix seconds at startup.
    pub created_at: i64,
}

/// Configuration swappable by REHASH.
#[derive(Debug, Clone)]
pub struct HotConfig {
    pub description: String,
    pub motd_lines: Vec<String>,
    pub opers: Vec<OperBlock>,
    pub admin_location: Option<String>,
    pub admin_email: Option<String>,
}

impl HotConfig {
    /// Extract the hot subset from a full config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            description: config.server.description.clone(),
            motd_lines: config.motd.load_lines(),
            opers: config.oper.clone(),
            admin_location: config.server.admin_location.clone(),
            admin_email: config.server.admin_email.clone(),
        }
    }
}

/// Central shared state.
pub struct Nexus {
    /// uid -> user record.
    pub users: DashMap<Uid, Arc<RwLock<User>>>,
    /// folded nick -> uid.
    pub nicks: DashMap<String, Uid>,
    /// folded channel name -> channel.
    pub channels: DashMap<String, Arc<RwLock<Channel>>>,
    /// uid -> outbound queue.
    pub queues: DashMap<Uid, Arc<SendQueue>>,

    pub uid_gen: UidGenerator,
    pub bans: BanList,
    pub monitors: MonitorCenter,
    pub callerid: CallerIdNotifier,
    whowas: Mutex<HashMap<String, VecDeque<WhowasEntry>>>,

    pub hooks: HookRegistry,
    pub repos: Repositories,

    /// Direct S2S neighbours by SID.
    pub links: DashMap<String, Arc<LinkHandle>>,
    pub topology: Topology,
    pub link_blocks: Vec<LinkBlock>,

    pub info: ServerInfo,
    pub limits: LimitsConfig,
    pub security: SecurityConfig,
    pub timeouts: TimeoutsConfig,
    pub hot: RwLock<HotConfig>,
    pub client_password: Option<String>,
    pub cloak_secret: String,
    /// Path REHASH reloads from.
    pub config_path: RwLock<Option<String>>,

    disconnect_tx: mpsc::Sender<(Uid, String)>,
    started: Instant,
    max_local: AtomicUsize,
    max_global: AtomicUsize,
}

impl Nexus {
    /// Build the Nexus. The returned receiver feeds the disconnect worker.
    pub fn new(
        config: &Config,
        repos: Repositories,
    ) -> (Arc<Self>, mpsc::Receiver<(Uid, String)>) {
        let (disconnect_tx, disconnect_rx) = mpsc::channel(256);
        let nexus = Arc::new(Self {
            users: DashMap::new(),
            nicks: DashMap::new(),
            channels: DashMap::new(),
            queues: DashMap::new(),
            uid_gen: UidGenerator::new(config.server.sid.clone()),
            bans: BanList::default(),
            monitors: MonitorCenter::default(),
            callerid: CallerIdNotifier::default(),
            whowas: Mutex::new(HashMap::new()),
            hooks: HookRegistry::default(),
            repos,
            links: DashMap::new(),
            topology: Topology::default(),
            link_blocks: config.link.clone(),
            info: ServerInfo {
                name: config.server.name.clone(),
                sid: config.server.sid.clone(),
                network: config.server.network.clone(),
                description: config.server.description.clone(),
                created_at: chrono::Utc::now().timestamp(),
            },
            limits: config.limits.clone(),
            security: config.security.clone(),
            timeouts: config.timeouts.clone(),
            hot: RwLock::new(HotConfig::from_config(config)),
            client_password: config.server.password.clone(),
            cloak_secret: config.server.cloak_secret.clone(),
            config_path: RwLock::new(None),
            disconnect_tx,
            started: Instant::now(),
            max_local: AtomicUsize::new(0),
            max_global: AtomicUsize::new(0),
        });
        (nexus, disconnect_rx)
    }

    // --- Lookups ---

    /// Resolve a nickname to a uid.
    pub fn uid_for_nick(&self, nick: &str) -> Option<Uid> {
        self.nicks.get(&irc_to_lower(nick)).map(|e| e.value().clone())
    }

    /// A user record by uid.
    pub fn user(&self, uid: &str) -> Option<Arc<RwLock<User>>> {
        self.users.get(uid).map(|e| e.value().clone())
    }

    /// A channel by (any-case) name.
    pub fn channel(&self, name: &str) -> Option<Arc<RwLock<Channel>>> {
        self.channels.get(&irc_to_lower(name)).map(|e| e.value().clone())
    }

    /// A user's current nick, falling back to `*` pre-registration.
    pub fn nick_of(&self, uid: &str) -> String {
        self.user(uid)
            .map(|u| u.read().nick.clone())
            .unwrap_or_else(|| "*".to_string())
    }

    /// True when the uid belongs to this server.
    pub fn is_local_uid(&self, uid: &str) -> bool {
        uid.starts_with(&self.info.sid)
    }

    // --- Connection plumbing ---

    /// Create and register the outbound queue for a connection.
    pub fn attach_queue(&self, uid: &str) -> Arc<SendQueue> {
        let queue = Arc::new(SendQueue::new(self.security.sendq));
        self.queues.insert(uid.to_string(), queue.clone());
        queue
    }

    /// Close and drop a connection's queue.
    pub fn detach_queue(&self, uid: &str) {
        if let Some((_, queue)) = self.queues.remove(uid) {
            queue.close();
        }
    }

    /// Ask the disconnect worker to tear a session down. Non-blocking; safe
    /// from any context.
    pub fn request_disconnect(&self, uid: &str, reason: &str) {
        let _ = self
            .disconnect_tx
            .try_send((uid.to_string(), reason.to_string()));
    }

    // --- Nick index ---

    /// Claim a nickname for a uid. Fails when the folded form is taken by
    /// another uid.
    pub fn claim_nick(&self, nick: &str, uid: &str) -> bool {
        let folded = irc_to_lower(nick);
        match self.nicks.entry(folded) {
            dashmap::mapref::entry::Entry::Occupied(e) => e.get() == uid,
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(uid.to_string());
                true
            }
        }
    }

    /// Release a nickname held by `uid`.
    pub fn release_nick(&self, nick: &str, uid: &str) {
        let folded = irc_to_lower(nick);
        if let Some(entry) = self.nicks.get(&folded) {
            if entry.value() != uid {
                return;
            }
        }
        self.nicks.remove(&folded);
    }

    /// Change a user's nickname, swapping the index entry and the user
    /// record together. The index entry for the new nick is claimed before
    /// the old one is dropped, so there is no window where neither maps.
    pub fn rename_user(&self, uid: &str, new_nick: &str) -> Result<String, ()> {
        if !self.claim_nick(new_nick, uid) {
            return Err(());
        }
        let Some(user) = self.user(uid) else {
            self.release_nick(new_nick, uid);
            return Err(());
        };
        let old = {
            let mut user = user.write();
            let old = std::mem::replace(&mut user.nick, new_nick.to_string());
            old
        };
        if !lark_proto::irc_eq(&old, new_nick) {
            self.release_nick(&old, uid);
        }
        Ok(old)
    }

    // --- Registration and teardown ---

    /// Insert a fully-built user record. The nick must already be claimed.
    pub fn insert_user(&self, user: User) -> Arc<RwLock<User>> {
        let uid = user.uid.clone();
        let local = user.is_local_to(&self.info.sid);
        let record = Arc::new(RwLock::new(user));
        self.users.insert(uid, record.clone());

        let global = self.users.len();
        self.max_global.fetch_max(global, Ordering::Relaxed);
        if local {
            self.max_local.fetch_max(self.local_user_count(), Ordering::Relaxed);
        }
        record
    }

    /// Tear a user down: broadcast QUIT, leave channels, destroy empties,
    /// clean indexes, announce to peers.
    ///
    /// `from_link` suppresses the S2S echo toward the neighbour that told
    /// us (split horizon); `announce` false skips the QUIT fan-out (KILL
    /// emits its own notice).
    pub async fn quit_user(
        self: &Arc<Self>,
        uid: &str,
        reason: &str,
        announce: bool,
        from_link: Option<&str>,
    ) -> Vec<String> {
        let Some(user_arc) = self.user(uid) else {
            return Vec::new();
        };

        let (nick, prefix, channels) = {
            let user = user_arc.read();
            (
                user.nick.clone(),
                user.prefix(),
                user.channels.iter().cloned().collect::<Vec<String>>(),
            )
        };

        if announce {
            let quit = Message {
                tags: None,
                prefix: Some(prefix.clone()),
                command: Command::QUIT(Some(reason.to_string())),
            };
            self.route(
                &Target::ChannelMates(uid.to_string()),
                &quit,
                Some(uid),
                Priority::Interactive,
            );
        }

        for name in &channels {
            self.leave_channel(uid, name);
        }

        // WHOWAS before the record goes away.
        {
            let user = user_arc.read();
            self.record_whowas(&user.nick, &user.user, &user.visible_host, &user.realname);
        }

        self.notify_monitors_offline(&nick);
        self.monitors.clear(uid);
        self.callerid.forget(uid);

        self.release_nick(&nick, uid);
        self.users.remove(uid);
        self.detach_queue(uid);

        // Tell the rest of the network.
        let s2s_quit = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.to_string())),
            command: Command::QUIT(Some(reason.to_string())),
        };
        self.broadcast_links(&s2s_quit, from_link);

        self.hooks
            .emit(Event::UserDisconnect {
                uid: uid.to_string(),
                reason: reason.to_string(),
            })
            .await;
        self.repos.notifier.user_disconnected(uid, &nick, reason).await;

        channels
    }

    /// Remove a membership both ways and destroy the channel if emptied.
    pub fn leave_channel(&self, uid: &str, folded: &str) {
        if let Some(user) = self.user(uid) {
            user.write().channels.remove(folded);
        }
        let destroy = match self.channels.get(folded) {
            Some(chan) => {
                let mut chan = chan.write();
                chan.remove_member(uid);
                chan.should_destroy()
            }
            None => false,
        };
        if destroy {
            self.channels.remove(folded);
        }
    }

    // --- WHOWAS ---

    /// Record a WHOWAS entry, trimming to the configured depth.
    pub fn record_whowas(&self, nick: &str, user: &str, host: &str, realname: &str) {
        let mut whowas = self.whowas.lock();
        let entries = whowas.entry(irc_to_lower(nick)).or_default();
        entries.push_front(WhowasEntry {
            nick: nick.to_string(),
            user: user.to_string(),
            host: host.to_string(),
            realname: realname.to_string(),
            logout_at: chrono::Utc::now().timestamp(),
        });
        entries.truncate(self.limits.whowas_depth);
    }

    /// WHOWAS history for a nick, newest first.
    pub fn whowas_of(&self, nick: &str) -> Vec<WhowasEntry> {
        self.whowas
            .lock()
            .get(&irc_to_lower(nick))
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    // --- MONITOR fan-out ---

    /// Tell watchers a nick came online.
    pub fn notify_monitors_online(&self, nick: &str, mask: &str) {
        for watcher in self.monitors.watchers_of(nick) {
            let watcher_nick = self.nick_of(&watcher);
            let msg = replies::mononline(&self.info.name, &watcher_nick, mask);
            self.deliver(&watcher, &msg, Priority::Background);
        }
    }

    /// Tell watchers a nick went offline.
    pub fn notify_monitors_offline(&self, nick: &str) {
        for watcher in self.monitors.watchers_of(nick) {
            let watcher_nick = self.nick_of(&watcher);
            let msg = replies::monoffline(&self.info.name, &watcher_nick, nick);
            self.deliver(&watcher, &msg, Priority::Background);
        }
    }

    // --- Counters ---

    /// Locally-connected registered users.
    pub fn local_user_count(&self) -> usize {
        let sid = &self.info.sid;
        self.users
            .iter()
            .filter(|e| e.value().read().is_local_to(sid))
            .count()
    }

    /// All registered users, network-wide.
    pub fn global_user_count(&self) -> usize {
        self.users.len()
    }

    /// Visible (non-invisible) user count, for LUSERS.
    pub fn visible_user_count(&self) -> usize {
        self.users
            .iter()
            .filter(|e| !e.value().read().modes.invisible)
            .count()
    }

    pub fn oper_count(&self) -> usize {
        self.users
            .iter()
            .filter(|e| e.value().read().modes.oper)
            .count()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn max_local_seen(&self) -> usize {
        self.max_local.load(Ordering::Relaxed)
    }

    pub fn max_global_seen(&self) -> usize {
        self.max_global.load(Ordering::Relaxed)
    }

    /// Seconds since startup.
    pub fn uptime_secs(&self) -> i64 {
        self.started.elapsed().as_secs() as i64
    }

    // --- S2S plumbing ---

    /// Send to every directly-linked neighbour except `except` (split
    /// horizon).
    pub fn broadcast_links(&self, msg: &Message, except: Option<&str>) {
        for entry in self.links.iter() {
            if except == Some(entry.key().as_str()) {
                continue;
            }
            entry.value().send(msg);
        }
    }

    /// Forward toward the owning server of `sid` along the spanning tree.
    pub fn send_toward_sid(&self, sid: &str, msg: &Message) {
        if sid == self.info.sid {
            return;
        }
        let Some(via) = self.topology.next_hop(sid) else {
            tracing::debug!(sid = %sid, "no route to server");
            return;
        };
        if let Some(link) = self.links.get(&via) {
            link.send(msg);
        }
    }

    /// Channels shared between two users (KICK visibility, WHOIS).
    pub fn shared_channels(&self, a: &str, b: &str) -> Vec<String> {
        let Some(user_a) = self.user(a) else {
            return Vec::new();
        };
        let channels_a: HashSet<String> = user_a.read().channels.clone();
        let Some(user_b) = self.user(b) else {
            return Vec::new();
        };
        let user_b = user_b.read();
        channels_a
            .intersection(&user_b.channels)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::channel::MemberModes;
    use uuid::Uuid;

    fn test_config() -> Config {
        toml::from_str(
            r#"
[server]
name = "irc.lark.test"
sid = "001"
network = "LarkNet"

[listen]
addr = "127.0.0.1:0"
"#,
        )
        .unwrap()
    }

    fn test_nexus() -> Arc<Nexus> {
        let (nexus, _rx) = Nexus::new(&test_config(), Repositories::in_memory());
        nexus
    }

    fn seed_user(nexus: &Arc<Nexus>, nick: &str) -> Uid {
        let uid = nexus.uid_gen.next_uid();
        assert!(nexus.claim_nick(nick, &uid));
        nexus.attach_queue(&uid);
        nexus.insert_user(User {
            uid: uid.clone(),
            nick: nick.to_string(),
            user: "u".into(),
            realname: "Real".into(),
            host: "host".into(),
            ip: "127.0.0.1".into(),
            visible_host: "cloak".into(),
            server: "001".into(),
            session_id: Uuid::new_v4(),
            channels: HashSet::new(),
            modes: Default::default(),
            account: None,
            away: None,
            caps: HashSet::new(),
            accept_list: HashSet::new(),
            connected_at: 100,
            last_activity: 100,
        });
        uid
    }

    #[test]
    fn nick_claims_are_casemapped() {
        let nexus = test_nexus();
        let uid = seed_user(&nexus, "Wrench[1]");
        assert_eq!(nexus.uid_for_nick("wrench{1}"), Some(uid.clone()));
        let other = nexus.uid_gen.next_uid();
        assert!(!nexus.claim_nick("WRENCH{1}", &other));
        // Re-claiming your own nick is fine.
        assert!(nexus.claim_nick("wrench[1]", &uid));
    }

    #[test]
    fn rename_swaps_index_atomically() {
        let nexus = test_nexus();
        let uid = seed_user(&nexus, "alice");
        let old = nexus.rename_user(&uid, "alicia").unwrap();
        assert_eq!(old, "alice");
        assert_eq!(nexus.uid_for_nick("alicia"), Some(uid.clone()));
        assert_eq!(nexus.uid_for_nick("alice"), None);
        assert_eq!(nexus.user(&uid).unwrap().read().nick, "alicia");
    }

    #[test]
    fn rename_to_taken_nick_fails_cleanly() {
        let nexus = test_nexus();
        let alice = seed_user(&nexus, "alice");
        let _bob = seed_user(&nexus, "bob");
        assert!(nexus.rename_user(&alice, "BOB").is_err());
        assert_eq!(nexus.uid_for_nick("alice"), Some(alice));
    }

    #[test]
    fn case_only_rename_keeps_index() {
        let nexus = test_nexus();
        let uid = seed_user(&nexus, "alice");
        nexus.rename_user(&uid, "Alice").unwrap();
        assert_eq!(nexus.uid_for_nick("ALICE"), Some(uid));
    }

    #[tokio::test]
    async fn quit_destroys_empty_unregistered_channels() {
        let nexus = test_nexus();
        let uid = seed_user(&nexus, "alice");

        let chan = Arc::new(RwLock::new(Channel::new("#solo", 100)));
        chan.write().add_member(&uid, MemberModes::op());
        nexus.channels.insert("#solo".into(), chan);
        nexus.user(&uid).unwrap().write().channels.insert("#solo".into());

        let channels = nexus.quit_user(&uid, "bye", true, None).await;
        assert_eq!(channels, vec!["#solo".to_string()]);
        assert!(nexus.channel("#solo").is_none());
        assert!(nexus.user(&uid).is_none());
        assert_eq!(nexus.uid_for_nick("alice"), None);
        assert!(!nexus.whowas_of("alice").is_empty());
    }

    #[tokio::test]
    async fn quit_spares_registered_channels() {
        let nexus = test_nexus();
        let uid = seed_user(&nexus, "alice");

        let chan = Arc::new(RwLock::new(Channel::new("#kept", 100)));
        chan.write().registered = true;
        chan.write().add_member(&uid, MemberModes::op());
        nexus.channels.insert("#kept".into(), chan);
        nexus.user(&uid).unwrap().write().channels.insert("#kept".into());

        nexus.quit_user(&uid, "bye", true, None).await;
        let kept = nexus.channel("#kept").expect("registered channel kept");
        assert!(kept.read().members.is_empty());
    }

    #[test]
    fn whowas_depth_is_bounded() {
        let nexus = test_nexus();
        for i in 0..20 {
            nexus.record_whowas("ghost", &format!("u{i}"), "h", "r");
        }
        let entries = nexus.whowas_of("ghost");
        assert_eq!(entries.len(), nexus.limits.whowas_depth);
        // Newest first.
        assert_eq!(entries[0].user, "u19");
    }
}
