//! The hook contract.
//!
//! Hooks observe and steer the command pipeline: pre-command hooks can
//! claim or deny a command before its handler runs, post-command hooks see
//! the outcome, event hooks observe lifecycle transitions, and outgoing
//! message hooks may rewrite or suppress any frame before it is queued.
//! All chains run in ascending priority order.

use async_trait::async_trait;
use lark_proto::Message;
use parking_lot::RwLock;
use std::sync::Arc;

/// Result of a pre-command hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Run the remaining hooks and the default handler.
    Continue,
    /// The hook handled the command; skip the default handler.
    Handled,
    /// Refuse the command; the dispatcher surfaces `reason` to the client.
    Deny(String),
}

/// Lifecycle events observable by hooks.
#[derive(Debug, Clone)]
pub enum Event {
    UserConnect { uid: String },
    UserRegister { uid: String },
    UserDisconnect { uid: String, reason: String },
    NickChange { uid: String, old: String, new: String },
    ChannelJoin { uid: String, channel: String },
    ChannelPart { uid: String, channel: String },
    ChannelKick { uid: String, channel: String, by: String },
    TopicChange { channel: String, by: String },
    UserModeChange { uid: String },
    ChannelModeChange { channel: String, by: String },
    ChannelMessage { uid: String, channel: String },
    PrivateMessage { from: String, to: String },
    ServerStart,
    ServerStop,
    ConfigReload,
}

/// A hook registration.
///
/// Command and event callbacks are async (they may consult repositories);
/// the outgoing-message filter is synchronous because it runs on the
/// enqueue path.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Ordering key; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect a command before its handler.
    async fn pre_command(&self, _uid: &str, _msg: &Message) -> HookOutcome {
        HookOutcome::Continue
    }

    /// Observe a command after its handler ran.
    async fn post_command(&self, _uid: &str, _msg: &Message) {}

    /// Observe a lifecycle event.
    async fn on_event(&self, _event: &Event) {}

    /// Rewrite or suppress an outgoing frame. Return false to suppress.
    fn on_outgoing(&self, _target_uid: &str, _msg: &mut Message) -> bool {
        true
    }
}

/// Registered hooks, kept sorted by priority.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    /// Register a hook.
    pub fn register(&self, hook: Arc<dyn Hook>) {
        let mut hooks = self.hooks.write();
        hooks.push(hook);
        hooks.sort_by_key(|h| h.priority());
    }

    fn snapshot(&self) -> Vec<Arc<dyn Hook>> {
        self.hooks.read().clone()
    }

    /// Run the pre-command chain. `Handled`/`Deny` short-circuit.
    pub async fn run_pre_command(&self, uid: &str, msg: &Message) -> HookOutcome {
        for hook in self.snapshot() {
            match hook.pre_command(uid, msg).await {
                HookOutcome::Continue => continue,
                other => return other,
            }
        }
        HookOutcome::Continue
    }

    /// Run the post-command chain.
    pub async fn run_post_command(&self, uid: &str, msg: &Message) {
        for hook in self.snapshot() {
            hook.post_command(uid, msg).await;
        }
    }

    /// Emit a lifecycle event.
    pub async fn emit(&self, event: Event) {
        for hook in self.snapshot() {
            hook.on_event(&event).await;
        }
    }

    /// Run the outgoing filter chain; false means suppress the frame.
    pub fn filter_outgoing(&self, target_uid: &str, msg: &mut Message) -> bool {
        for hook in self.snapshot() {
            if !hook.on_outgoing(target_uid, msg) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        priority: i32,
        order: Arc<std::sync::Mutex<Vec<i32>>>,
        outcome: HookOutcome,
    }

    #[async_trait]
    impl Hook for Recorder {
        fn priority(&self) -> i32 {
            self.priority
        }

        async fn pre_command(&self, _uid: &str, _msg: &Message) -> HookOutcome {
            self.order.lock().unwrap().push(self.priority);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn runs_in_priority_order() {
        let registry = HookRegistry::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for priority in [30, 10, 20] {
            registry.register(Arc::new(Recorder {
                priority,
                order: order.clone(),
                outcome: HookOutcome::Continue,
            }));
        }
        let outcome = registry
            .run_pre_command("u", &Message::ping("x"))
            .await;
        assert_eq!(outcome, HookOutcome::Continue);
        assert_eq!(*order.lock().unwrap(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn handled_short_circuits() {
        let registry = HookRegistry::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        registry.register(Arc::new(Recorder {
            priority: 1,
            order: order.clone(),
            outcome: HookOutcome::Handled,
        }));
        registry.register(Arc::new(Recorder {
            priority: 2,
            order: order.clone(),
            outcome: HookOutcome::Continue,
        }));
        let outcome = registry
            .run_pre_command("u", &Message::ping("x"))
            .await;
        assert_eq!(outcome, HookOutcome::Handled);
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    struct Suppressor;

    #[async_trait]
    impl Hook for Suppressor {
        fn on_outgoing(&self, _uid: &str, msg: &mut Message) -> bool {
            !msg.to_string().contains("secret")
        }
    }

    struct Tagger(Arc<AtomicUsize>);

    #[async_trait]
    impl Hook for Tagger {
        fn on_outgoing(&self, _uid: &str, msg: &mut Message) -> bool {
            self.0.fetch_add(1, Ordering::Relaxed);
            *msg = msg.clone().with_tag("seen", None);
            true
        }
    }

    #[test]
    fn outgoing_filter_mutates_and_suppresses() {
        let registry = HookRegistry::default();
        let count = Arc::new(AtomicUsize::new(0));
        registry.register(Arc::new(Suppressor));
        registry.register(Arc::new(Tagger(count.clone())));

        let mut ok = Message::privmsg("#c", "hello");
        assert!(registry.filter_outgoing("u", &mut ok));
        assert!(ok.tags.is_some());
        assert_eq!(count.load(Ordering::Relaxed), 1);

        let mut bad = Message::privmsg("#c", "the secret");
        assert!(!registry.filter_outgoing("u", &mut bad));
        // Suppressor ran first; the tagger never saw the frame.
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
