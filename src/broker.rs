//! Outbound message broker.
//!
//! Every connection owns a bounded [`SendQueue`] drained by its writer
//! task. The broker resolves logical targets to deduplicated connection
//! sets, filters IRCv3 tags per recipient capability, runs the outgoing
//! message hook chain, and applies the backpressure policy: background
//! traffic drops oldest, interactive traffic that cannot keep up costs the
//! session its connection.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lark_proto::{Message, Tag};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::state::nexus::Nexus;
use crate::state::user::Uid;

/// Delivery priority for backpressure decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Command replies and chat traffic.
    Interactive,
    /// Server notices, history replay; droppable under pressure.
    Background,
}

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the oldest frame was discarded to make room.
    DroppedOldest,
    /// Queue was full and the frame was interactive: disconnect the session.
    Overflow,
    /// Queue already closed.
    Closed,
}

/// A bounded outbound queue with priority-aware overflow.
#[derive(Debug)]
pub struct SendQueue {
    capacity: usize,
    frames: Mutex<VecDeque<Arc<Message>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SendQueue {
    /// Create a queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a frame under the backpressure policy.
    pub fn push(&self, msg: Arc<Message>, priority: Priority) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }
        let outcome = {
            let mut frames = self.frames.lock();
            if frames.len() >= self.capacity {
                match priority {
                    Priority::Background => {
                        frames.pop_front();
                        frames.push_back(msg);
                        PushOutcome::DroppedOldest
                    }
                    Priority::Interactive => PushOutcome::Overflow,
                }
            } else {
                frames.push_back(msg);
                PushOutcome::Queued
            }
        };
        if outcome != PushOutcome::Overflow {
            self.notify.notify_one();
        }
        outcome
    }

    /// Dequeue the next frame; `None` once closed and drained.
    pub async fn pop(&self) -> Option<Arc<Message>> {
        loop {
            if let Some(msg) = self.frames.lock().pop_front() {
                return Some(msg);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Close the queue; the writer drains what remains and exits.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// A logical delivery target.
#[derive(Debug, Clone)]
pub enum Target {
    /// One connection.
    User(Uid),
    /// An explicit set of connections.
    Users(Vec<Uid>),
    /// All members of a channel (folded name).
    Channel(String),
    /// All members of several channels, deduplicated.
    Channels(Vec<String>),
    /// Every user that shares at least one channel with `uid`.
    ChannelMates(Uid),
    /// All local operators.
    Operators,
    /// Every local connection.
    Broadcast,
}

/// Strip tags the recipient has not negotiated.
fn filter_tags(msg: &Message, caps: &HashSet<String>) -> Message {
    let Some(tags) = &msg.tags else {
        return msg.clone();
    };
    let kept: Vec<Tag> = tags
        .iter()
        .filter(|Tag(key, _)| match key.as_str() {
            "time" => caps.contains("server-time"),
            "msgid" => caps.contains("message-tags") || caps.contains("draft/chathistory"),
            "account" => caps.contains("account-tag"),
            "batch" => caps.contains("batch"),
            "label" => true,
            _ => caps.contains("message-tags"),
        })
        .cloned()
        .collect();
    Message {
        tags: if kept.is_empty() { None } else { Some(kept) },
        prefix: msg.prefix.clone(),
        command: msg.command.clone(),
    }
}

impl Nexus {
    /// Resolve a target to a deduplicated uid set.
    pub fn resolve_target(&self, target: &Target) -> Vec<Uid> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut push = |uid: &Uid| {
            if seen.insert(uid.clone()) {
                out.push(uid.clone());
            }
        };
        match target {
            Target::User(uid) => push(uid),
            Target::Users(uids) => uids.iter().for_each(&mut push),
            Target::Channel(name) => {
                if let Some(chan) = self.channels.get(name) {
                    chan.read().members.keys().for_each(&mut push);
                }
            }
            Target::Channels(names) => {
                for name in names {
                    if let Some(chan) = self.channels.get(name) {
                        chan.read().members.keys().for_each(&mut push);
                    }
                }
            }
            Target::ChannelMates(uid) => {
                let channels: Vec<String> = match self.users.get(uid) {
                    Some(user) => user.read().channels.iter().cloned().collect(),
                    None => return out,
                };
                for name in channels {
                    if let Some(chan) = self.channels.get(&name) {
                        chan.read().members.keys().for_each(&mut push);
                    }
                }
            }
            Target::Operators => {
                for entry in self.users.iter() {
                    if entry.value().read().modes.oper {
                        push(entry.key());
                    }
                }
            }
            Target::Broadcast => {
                for entry in self.queues.iter() {
                    push(entry.key());
                }
            }
        }
        out
    }

    /// Deliver one frame to one connection, tag-filtered for its caps.
    pub fn deliver(&self, uid: &str, msg: &Message, priority: Priority) {
        // Outgoing message hooks may rewrite or suppress the frame.
        let mut msg = msg.clone();
        if !self.hooks.filter_outgoing(uid, &mut msg) {
            return;
        }

        let msg = match self.users.get(uid) {
            Some(user) => filter_tags(&msg, &user.read().caps),
            None => msg,
        };

        let Some(queue) = self.queues.get(uid).map(|q| q.value().clone()) else {
            return;
        };
        match queue.push(Arc::new(msg), priority) {
            PushOutcome::Overflow => {
                tracing::warn!(uid = %uid, "send queue overflow, disconnecting");
                self.request_disconnect(uid, "Max SendQ exceeded");
            }
            PushOutcome::DroppedOldest => {
                tracing::debug!(uid = %uid, "send queue full, dropped oldest background frame");
            }
            _ => {}
        }
    }

    /// Fan a frame out to a logical target.
    pub fn route(&self, target: &Target, msg: &Message, except: Option<&str>, priority: Priority) {
        for uid in self.resolve_target(target) {
            if except == Some(uid.as_str()) {
                continue;
            }
            self.deliver(&uid, msg, priority);
        }
    }

    /// Fan out to channel members that negotiated `cap` (away-notify and
    /// friends).
    pub fn route_with_cap(
        &self,
        target: &Target,
        msg: &Message,
        except: Option<&str>,
        cap: &str,
    ) {
        for uid in self.resolve_target(target) {
            if except == Some(uid.as_str()) {
                continue;
            }
            let has_cap = self
                .users
                .get(&uid)
                .map(|u| u.read().caps.contains(cap))
                .unwrap_or(false);
            if has_cap {
                self.deliver(&uid, msg, Priority::Interactive);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: u32) -> Arc<Message> {
        Arc::new(Message::privmsg("#c", format!("m{n}")))
    }

    #[tokio::test]
    async fn queue_preserves_order() {
        let q = SendQueue::new(8);
        for i in 0..3 {
            assert_eq!(q.push(msg(i), Priority::Interactive), PushOutcome::Queued);
        }
        for i in 0..3 {
            let m = q.pop().await.unwrap();
            assert_eq!(m.to_string(), format!("PRIVMSG #c :m{i}"));
        }
    }

    #[tokio::test]
    async fn background_overflow_drops_oldest() {
        let q = SendQueue::new(2);
        q.push(msg(0), Priority::Background);
        q.push(msg(1), Priority::Background);
        assert_eq!(q.push(msg(2), Priority::Background), PushOutcome::DroppedOldest);
        assert_eq!(q.pop().await.unwrap().to_string(), "PRIVMSG #c :m1");
        assert_eq!(q.pop().await.unwrap().to_string(), "PRIVMSG #c :m2");
    }

    #[tokio::test]
    async fn interactive_overflow_reports() {
        let q = SendQueue::new(1);
        q.push(msg(0), Priority::Interactive);
        assert_eq!(q.push(msg(1), Priority::Interactive), PushOutcome::Overflow);
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let q = SendQueue::new(4);
        q.push(msg(0), Priority::Interactive);
        q.close();
        assert!(q.pop().await.is_some());
        assert!(q.pop().await.is_none());
        assert_eq!(q.push(msg(1), Priority::Interactive), PushOutcome::Closed);
    }

    #[test]
    fn tag_filter_respects_caps() {
        let msg = Message::privmsg("#c", "hi")
            .with_tag("time", Some("t".into()))
            .with_tag("msgid", Some("m".into()))
            .with_tag("account", Some("a".into()));

        let mut caps = HashSet::new();
        caps.insert("server-time".to_string());
        let filtered = filter_tags(&msg, &caps);
        let tags = filtered.tags.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].0, "time");

        let filtered = filter_tags(&msg, &HashSet::new());
        assert!(filtered.tags.is_none());
    }
}
