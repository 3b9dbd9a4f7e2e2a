//! Command handlers.
//!
//! One handler per verb, registered in a [`Registry`] that performs the
//! declarative gating (parameter count, registration, operator privilege)
//! before the handler runs, and routes unknown verbs to
//! `ERR_UNKNOWNCOMMAND` (silently dropped pre-registration). Pre- and
//! post-command hooks bracket every dispatch.

mod cap;
mod channel;
mod chathistory;
mod connection;
pub(crate) mod helpers;
mod messaging;
mod mode;
mod monitor;
mod oper;
mod registration;
mod server_query;
mod user_query;
mod user_status;

pub use helpers::batch_ref;
pub use registration::try_complete_registration;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lark_proto::sasl::{SaslMechanism, ScramServer};
use lark_proto::{Message, Response};

use crate::broker::Priority;
use crate::error::{HandlerError, HandlerResult};
use crate::hooks::HookOutcome;
use crate::replies;
use crate::state::user::Uid;
use crate::state::Nexus;

/// Per-connection session state owned by the connection task.
pub struct Session {
    pub uid: Uid,
    pub remote_addr: SocketAddr,
    /// Real IP as a string.
    pub ip: String,
    /// Resolved hostname (the IP string when unresolved).
    pub host: String,
    pub is_tls: bool,
    /// TLS client certificate fingerprint, when presented.
    pub certfp: Option<String>,

    pub registered: bool,
    pub nick: Option<String>,
    pub user: Option<String>,
    pub realname: Option<String>,
    pub pass: Option<String>,

    pub cap_negotiating: bool,
    pub cap_version: u32,
    pub caps: HashSet<String>,

    pub sasl: SaslSession,
    pub account: Option<String>,

    /// Label tag of the command being handled (labeled-response).
    pub label: Option<String>,
    /// Set when the current command already produced a labeled reply.
    pub label_used: bool,
}

impl Session {
    /// Fresh session for a new connection.
    pub fn new(uid: Uid, remote_addr: SocketAddr, is_tls: bool) -> Self {
        let ip = remote_addr.ip().to_string();
        Self {
            uid,
            remote_addr,
            host: ip.clone(),
            ip,
            is_tls,
            certfp: None,
            registered: false,
            nick: None,
            user: None,
            realname: None,
            pass: None,
            cap_negotiating: false,
            cap_version: 301,
            caps: HashSet::new(),
            sasl: SaslSession::default(),
            account: None,
            label: None,
            label_used: false,
        }
    }

    /// Registration is possible once NICK and USER arrived and CAP closed.
    pub fn can_register(&self) -> bool {
        !self.registered
            && self.nick.is_some()
            && self.user.is_some()
            && !self.cap_negotiating
    }

    /// True when the client negotiated `cap`.
    pub fn has_cap(&self, cap: &str) -> bool {
        self.caps.contains(cap)
    }
}

/// In-flight SASL exchange state.
#[derive(Default)]
pub struct SaslSession {
    pub mechanism: Option<SaslMechanism>,
    pub scram: Option<ScramServer>,
    /// Username from the SCRAM client-first message.
    pub scram_user: Option<String>,
    /// Accumulates chunked AUTHENTICATE payloads.
    pub buffer: String,
    /// Set after a successful authentication.
    pub complete: bool,
}

impl SaslSession {
    /// Reset to idle (abort or completion).
    pub fn reset(&mut self) {
        self.mechanism = None;
        self.scram = None;
        self.scram_user = None;
        self.buffer.clear();
    }
}

/// Context handed to every handler invocation.
pub struct Context<'a> {
    pub nexus: &'a Arc<Nexus>,
    pub session: &'a mut Session,
    /// The dispatching registry (STATS m usage counters).
    pub registry: &'a Arc<Registry>,
}

impl Context<'_> {
    pub fn uid(&self) -> &str {
        &self.session.uid
    }

    pub fn server_name(&self) -> &str {
        &self.nexus.info.name
    }

    /// The session's nick, `*` before one is set.
    pub fn nick(&self) -> String {
        self.session
            .nick
            .clone()
            .unwrap_or_else(|| "*".to_string())
    }

    /// True when the registered user holds +o.
    pub fn is_oper(&self) -> bool {
        self.nexus
            .user(self.uid())
            .map(|u| u.read().modes.oper)
            .unwrap_or(false)
    }

    /// Queue a frame to this connection, attaching the command's label to
    /// its first reply.
    pub fn send(&mut self, msg: Message) {
        let msg = if !self.session.label_used && self.session.has_cap("labeled-response") {
            match self.session.label.clone() {
                Some(label) => {
                    self.session.label_used = true;
                    msg.with_tag("label", Some(label))
                }
                None => msg,
            }
        } else {
            msg
        };
        self.nexus
            .deliver(self.uid(), &msg, Priority::Interactive);
    }

    /// Build and queue a numeric reply.
    pub fn send_reply(&mut self, response: Response, params: Vec<String>) {
        let mut full = vec![self.nick()];
        full.extend(params);
        let msg = replies::reply(self.server_name(), response, full);
        self.send(msg);
    }
}

/// Gating declared per command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub min_params: usize,
    pub requires_registration: bool,
    pub requires_oper: bool,
}

impl CommandSpec {
    const fn pre_reg(min_params: usize) -> Self {
        Self {
            min_params,
            requires_registration: false,
            requires_oper: false,
        }
    }

    const fn registered(min_params: usize) -> Self {
        Self {
            min_params,
            requires_registration: true,
            requires_oper: false,
        }
    }

    const fn oper(min_params: usize) -> Self {
        Self {
            min_params,
            requires_registration: true,
            requires_oper: true,
        }
    }
}

/// Trait implemented by all command handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Registry of command handlers plus their gating and usage counters.
pub struct Registry {
    handlers: HashMap<&'static str, (Box<dyn Handler>, CommandSpec)>,
    command_counts: HashMap<&'static str, AtomicU64>,
}

impl Registry {
    /// Create a registry with every handler registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, (Box<dyn Handler>, CommandSpec)> =
            HashMap::new();

        let mut add = |name: &'static str, handler: Box<dyn Handler>, spec: CommandSpec| {
            handlers.insert(name, (handler, spec));
        };

        // Registration / connection
        add("CAP", Box::new(cap::CapHandler), CommandSpec::pre_reg(1));
        add(
            "AUTHENTICATE",
            Box::new(cap::AuthenticateHandler),
            CommandSpec::pre_reg(1),
        );
        add("PASS", Box::new(connection::PassHandler), CommandSpec::pre_reg(1));
        add("NICK", Box::new(connection::NickHandler), CommandSpec::pre_reg(1));
        add("USER", Box::new(connection::UserHandler), CommandSpec::pre_reg(4));
        add("PING", Box::new(connection::PingHandler), CommandSpec::pre_reg(1));
        add("PONG", Box::new(connection::PongHandler), CommandSpec::pre_reg(0));
        add("QUIT", Box::new(connection::QuitHandler), CommandSpec::pre_reg(0));

        // Channel
        add("JOIN", Box::new(channel::JoinHandler), CommandSpec::registered(1));
        add("PART", Box::new(channel::PartHandler), CommandSpec::registered(1));
        add("KICK", Box::new(channel::KickHandler), CommandSpec::registered(2));
        add("TOPIC", Box::new(channel::TopicHandler), CommandSpec::registered(1));
        add("NAMES", Box::new(channel::NamesHandler), CommandSpec::registered(0));
        add("INVITE", Box::new(channel::InviteHandler), CommandSpec::registered(2));
        add("LIST", Box::new(channel::ListHandler), CommandSpec::registered(0));

        // Messaging
        add(
            "PRIVMSG",
            Box::new(messaging::PrivmsgHandler),
            CommandSpec::registered(2),
        );
        add(
            "NOTICE",
            Box::new(messaging::NoticeHandler),
            CommandSpec::registered(2),
        );
        add(
            "TAGMSG",
            Box::new(messaging::TagmsgHandler),
            CommandSpec::registered(1),
        );

        // Modes
        add("MODE", Box::new(mode::ModeHandler), CommandSpec::registered(1));

        // Queries
        add("WHO", Box::new(user_query::WhoHandler), CommandSpec::registered(0));
        add("WHOIS", Box::new(user_query::WhoisHandler), CommandSpec::registered(1));
        add(
            "WHOWAS",
            Box::new(user_query::WhowasHandler),
            CommandSpec::registered(1),
        );
        add("ISON", Box::new(user_query::IsonHandler), CommandSpec::registered(1));
        add(
            "USERHOST",
            Box::new(user_query::UserhostHandler),
            CommandSpec::registered(1),
        );
        add(
            "MONITOR",
            Box::new(monitor::MonitorHandler),
            CommandSpec::registered(1),
        );
        add(
            "CHATHISTORY",
            Box::new(chathistory::ChatHistoryHandler),
            CommandSpec::registered(2),
        );

        // Server queries
        add("MOTD", Box::new(server_query::MotdHandler), CommandSpec::registered(0));
        add(
            "LUSERS",
            Box::new(server_query::LusersHandler),
            CommandSpec::registered(0),
        );
        add(
            "VERSION",
            Box::new(server_query::VersionHandler),
            CommandSpec::registered(0),
        );
        add("STATS", Box::new(server_query::StatsHandler), CommandSpec::registered(0));
        add("LINKS", Box::new(server_query::LinksHandler), CommandSpec::registered(0));
        add("TIME", Box::new(server_query::TimeHandler), CommandSpec::registered(0));
        add("TRACE", Box::new(server_query::TraceHandler), CommandSpec::registered(0));
        add("ADMIN", Box::new(server_query::AdminHandler), CommandSpec::registered(0));
        add("INFO", Box::new(server_query::InfoHandler), CommandSpec::registered(0));

        // User status
        add("AWAY", Box::new(user_status::AwayHandler), CommandSpec::registered(0));
        add(
            "SETNAME",
            Box::new(user_status::SetnameHandler),
            CommandSpec::registered(1),
        );
        add(
            "ACCEPT",
            Box::new(user_status::AcceptHandler),
            CommandSpec::registered(0),
        );

        // Operator
        add("OPER", Box::new(oper::OperHandler), CommandSpec::registered(2));
        add("KILL", Box::new(oper::KillHandler), CommandSpec::oper(2));
        add("WALLOPS", Box::new(oper::WallopsHandler), CommandSpec::oper(1));
        add("REHASH", Box::new(oper::RehashHandler), CommandSpec::oper(0));
        add("CHGHOST", Box::new(oper::ChghostHandler), CommandSpec::oper(2));
        add("SQUIT", Box::new(oper::SquitHandler), CommandSpec::oper(1));
        add(
            "KLINE",
            Box::new(oper::XlineHandler::kline()),
            CommandSpec::oper(2),
        );
        add(
            "GLINE",
            Box::new(oper::XlineHandler::gline()),
            CommandSpec::oper(2),
        );
        add(
            "ZLINE",
            Box::new(oper::XlineHandler::zline()),
            CommandSpec::oper(2),
        );
        add(
            "UNKLINE",
            Box::new(oper::UnxlineHandler::unkline()),
            CommandSpec::oper(1),
        );
        add(
            "UNGLINE",
            Box::new(oper::UnxlineHandler::ungline()),
            CommandSpec::oper(1),
        );
        add(
            "UNZLINE",
            Box::new(oper::UnxlineHandler::unzline()),
            CommandSpec::oper(1),
        );
        add(
            "JUPE",
            Box::new(oper::XlineHandler::jupe()),
            CommandSpec::oper(2),
        );
        add(
            "UNJUPE",
            Box::new(oper::UnxlineHandler::unjupe()),
            CommandSpec::oper(1),
        );

        let mut command_counts = HashMap::new();
        for &name in handlers.keys() {
            command_counts.insert(name, AtomicU64::new(0));
        }

        Self {
            handlers,
            command_counts,
        }
    }

    /// Usage counters for STATS m, most used first.
    pub fn command_stats(&self) -> Vec<(&'static str, u64)> {
        let mut stats: Vec<_> = self
            .command_counts
            .iter()
            .map(|(name, count)| (*name, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1));
        stats
    }

    /// Dispatch one message through gating, hooks, and its handler.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.command.name().to_ascii_uppercase();

        ctx.session.label = msg.label().map(str::to_owned);
        ctx.session.label_used = false;

        let Some((handler, spec)) = self.handlers.get(name.as_str()) else {
            if ctx.session.registered {
                let nick = ctx.nick();
                let reply = replies::unknowncommand(ctx.server_name(), &nick, &name);
                ctx.send(reply);
            }
            return Ok(());
        };

        if spec.requires_registration && !ctx.session.registered {
            let nick = ctx.nick();
            let reply = replies::notregistered(ctx.server_name(), &nick);
            ctx.send(reply);
            return Ok(());
        }
        if msg.command.param_count() < spec.min_params {
            let nick = ctx.nick();
            let reply = replies::needmoreparams(ctx.server_name(), &nick, &name);
            ctx.send(reply);
            return Ok(());
        }
        if spec.requires_oper && !ctx.is_oper() {
            let nick = ctx.nick();
            let reply = replies::noprivileges(ctx.server_name(), &nick);
            ctx.send(reply);
            return Ok(());
        }

        if let Some(count) = self.command_counts.get(name.as_str()) {
            count.fetch_add(1, Ordering::Relaxed);
        }

        match ctx.nexus.hooks.run_pre_command(ctx.uid(), msg).await {
            HookOutcome::Continue => {}
            HookOutcome::Handled => return Ok(()),
            HookOutcome::Deny(reason) => {
                let reply = replies::fail(
                    ctx.server_name(),
                    &name,
                    "FORBIDDEN",
                    &[],
                    &reason,
                );
                ctx.send(reply);
                return Ok(());
            }
        }

        let result = handler.handle(ctx, msg).await;

        if let Err(HandlerError::Internal(ref detail)) = result {
            // Internal faults never kill the session; log and move on.
            tracing::error!(uid = %ctx.uid(), command = %name, error = %detail, "handler fault");
            ctx.nexus.hooks.run_post_command(ctx.uid(), msg).await;
            return Ok(());
        }

        ctx.nexus.hooks.run_post_command(ctx.uid(), msg).await;
        result
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
