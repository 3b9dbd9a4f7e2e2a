//! Operator commands: OPER, KILL, WALLOPS, REHASH, CHGHOST, SQUIT, and the
//! X-line family.

use async_trait::async_trait;
use lark_proto::{matches_hostmask, Command, Message, Prefix};
use subtle::ConstantTimeEq;

use crate::broker::{Priority, Target};
use crate::error::HandlerResult;
use crate::handlers::helpers::{now, prefix_of};
use crate::handlers::{Context, Handler};
use crate::hooks::Event;
use crate::replies;
use crate::state::BanType;

pub struct OperHandler;

#[async_trait]
impl Handler for OperHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::OPER(ref name, ref password) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();

        let Some(user_arc) = ctx.nexus.user(&uid) else {
            return Ok(());
        };
        let (user_nick, user_ident, user_host) = {
            let user = user_arc.read();
            (user.nick.clone(), user.user.clone(), user.host.clone())
        };

        let blocks = ctx.nexus.hot.read().opers.clone();
        let matched = blocks.iter().find(|block| {
            let name_ok = block.name == *name;
            let pass_ok = block
                .password
                .as_bytes()
                .ct_eq(password.as_bytes())
                .unwrap_u8()
                == 1;
            let host_ok = block
                .hostmask
                .as_deref()
                .map(|mask| matches_hostmask(mask, &user_nick, &user_ident, &user_host))
                .unwrap_or(true);
            name_ok && pass_ok && host_ok
        });

        if matched.is_none() {
            ctx.send(replies::nooperhost(&server, &nick));
            return Ok(());
        }

        user_arc.write().modes.oper = true;
        ctx.send(replies::youreoper(&server, &nick));

        let mode = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, &uid),
            command: Command::UserMODE(nick.clone(), vec!["+o".to_string()]),
        };
        ctx.send(mode);

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: Command::UserMODE(uid.clone(), vec!["+o".to_string()]),
        };
        ctx.nexus.broadcast_links(&s2s, None);

        ctx.nexus.hooks.emit(Event::UserModeChange { uid }).await;
        Ok(())
    }
}

pub struct KillHandler;

#[async_trait]
impl Handler for KillHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::KILL(ref target, ref reason) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        if target.contains('.') {
            ctx.send(replies::cantkillserver(&server, &nick));
            return Ok(());
        }
        let Some(target_uid) = ctx.nexus.uid_for_nick(target) else {
            ctx.send(replies::nosuchnick(&server, &nick, target));
            return Ok(());
        };

        let quit_reason = format!("Killed ({nick} ({reason}))");

        // The victim sees who did it before the connection drops.
        let notice = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, ctx.uid()),
            command: Command::KILL(target.clone(), reason.clone()),
        };
        ctx.nexus
            .deliver(&target_uid, &notice, Priority::Interactive);

        ctx.nexus
            .quit_user(&target_uid, &quit_reason, true, None)
            .await;

        // Onward KILL so remote servers drop the UID too.
        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(ctx.uid().to_string())),
            command: Command::KILL(target_uid, quit_reason),
        };
        ctx.nexus.broadcast_links(&s2s, None);
        Ok(())
    }
}

pub struct WallopsHandler;

#[async_trait]
impl Handler for WallopsHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::WALLOPS(ref text) = msg.command else {
            return Ok(());
        };
        let uid = ctx.uid().to_string();

        let wallops = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, &uid),
            command: Command::WALLOPS(text.clone()),
        };
        let recipients: Vec<String> = ctx
            .nexus
            .users
            .iter()
            .filter(|e| e.value().read().modes.wallops)
            .map(|e| e.key().clone())
            .collect();
        ctx.nexus.route(
            &Target::Users(recipients),
            &wallops,
            None,
            Priority::Background,
        );

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid)),
            command: Command::WALLOPS(text.clone()),
        };
        ctx.nexus.broadcast_links(&s2s, None);
        Ok(())
    }
}

pub struct RehashHandler;

#[async_trait]
impl Handler for RehashHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let path = ctx.nexus.config_path.read().clone();
        let Some(path) = path else {
            ctx.send(replies::fail(
                &server,
                "REHASH",
                "CANNOT_REHASH",
                &[],
                "No config file path recorded",
            ));
            return Ok(());
        };

        ctx.send(replies::rehashing(&server, &nick, &path));
        match crate::config::Config::load(&path) {
            Ok(config) => {
                *ctx.nexus.hot.write() = crate::state::HotConfig::from_config(&config);
                ctx.nexus.hooks.emit(Event::ConfigReload).await;
                tracing::info!(path = %path, "configuration rehashed");
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "rehash failed");
                ctx.send(replies::fail(
                    &server,
                    "REHASH",
                    "CANNOT_REHASH",
                    &[],
                    "Config reload failed; kept the running configuration",
                ));
            }
        }
        Ok(())
    }
}

pub struct ChghostHandler;

#[async_trait]
impl Handler for ChghostHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::CHGHOST(ref target, ref new_host) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let Some(target_uid) = ctx.nexus.uid_for_nick(target) else {
            ctx.send(replies::nosuchnick(&server, &nick, target));
            return Ok(());
        };
        let Some(user_arc) = ctx.nexus.user(&target_uid) else {
            return Ok(());
        };

        let (old_prefix, ident) = {
            let user = user_arc.read();
            (user.prefix(), user.user.clone())
        };
        user_arc.write().visible_host = new_host.clone();

        // chghost-aware clients get the rename in place.
        let notice = Message {
            tags: None,
            prefix: Some(old_prefix),
            command: Command::CHGHOST(ident, new_host.clone()),
        };
        ctx.nexus.route_with_cap(
            &Target::ChannelMates(target_uid.clone()),
            &notice,
            None,
            "chghost",
        );

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
            command: Command::ENCAP(
                "*".to_string(),
                "CHGHOST".to_string(),
                vec![target_uid, new_host.clone()],
            ),
        };
        ctx.nexus.broadcast_links(&s2s, None);
        Ok(())
    }
}

pub struct SquitHandler;

#[async_trait]
impl Handler for SquitHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::SQUIT(ref server_name, ref comment) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let Some(linked) = ctx.nexus.topology.find_by_name(server_name) else {
            ctx.send(replies::nosuchserver(&server, &nick, server_name));
            return Ok(());
        };
        let reason = comment.clone().unwrap_or_else(|| nick.clone());
        crate::s2s::handle_link_loss(ctx.nexus, &linked.via, &reason).await;
        Ok(())
    }
}

/// Shared implementation for KLINE, GLINE, and ZLINE.
pub struct XlineHandler {
    ban_type: BanType,
    verb: &'static str,
}

impl XlineHandler {
    pub fn kline() -> Self {
        Self {
            ban_type: BanType::KLine,
            verb: "KLINE",
        }
    }

    pub fn gline() -> Self {
        Self {
            ban_type: BanType::GLine,
            verb: "GLINE",
        }
    }

    pub fn zline() -> Self {
        Self {
            ban_type: BanType::ZLine,
            verb: "ZLINE",
        }
    }

    pub fn jupe() -> Self {
        Self {
            ban_type: BanType::Jupe,
            verb: "JUPE",
        }
    }
}

#[async_trait]
impl Handler for XlineHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::Raw(_, ref params) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        // `<verb> [duration-minutes] <mask> :<reason>`
        let (duration, rest) = match params.first().and_then(|p| p.parse::<i64>().ok()) {
            Some(minutes) => (Some(minutes * 60), &params[1..]),
            None => (None, &params[..]),
        };
        let Some(pattern) = rest.first().cloned() else {
            ctx.send(replies::needmoreparams(&server, &nick, self.verb));
            return Ok(());
        };
        let reason = rest
            .get(1..)
            .map(|r| r.join(" "))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "No reason given".to_string());

        let expires_at = duration.map(|d| now() + d);
        ctx.nexus.bans.add(
            self.ban_type,
            &pattern,
            &reason,
            &nick,
            now(),
            expires_at,
        );

        // Enforce against connected local users immediately.
        let victims: Vec<String> = ctx
            .nexus
            .users
            .iter()
            .filter(|e| {
                let user = e.value().read();
                user.is_local_to(&ctx.nexus.info.sid)
                    && !user.modes.oper
                    && ctx
                        .nexus
                        .bans
                        .find_matching(&user.user, &user.host, &user.ip, now())
                        .is_some()
            })
            .map(|e| e.key().clone())
            .collect();
        for victim in victims {
            ctx.nexus
                .request_disconnect(&victim, &format!("Banned: {reason}"));
        }

        // G-lines and Z-lines are network-wide.
        if matches!(self.ban_type, BanType::GLine | BanType::ZLine) {
            let s2s = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
                command: Command::ENCAP(
                    "*".to_string(),
                    "AKILL".to_string(),
                    vec![
                        self.verb.to_string(),
                        pattern.clone(),
                        expires_at.unwrap_or(0).to_string(),
                        reason.clone(),
                    ],
                ),
            };
            ctx.nexus.broadcast_links(&s2s, None);
        }

        let note = replies::note(
            &server,
            self.verb,
            "BAN_ADDED",
            &[pattern.as_str()],
            &format!("Ban added by {nick}"),
        );
        ctx.send(note);
        Ok(())
    }
}

/// Shared implementation for UNKLINE, UNGLINE, UNZLINE.
pub struct UnxlineHandler {
    ban_type: BanType,
    verb: &'static str,
}

impl UnxlineHandler {
    pub fn unkline() -> Self {
        Self {
            ban_type: BanType::KLine,
            verb: "UNKLINE",
        }
    }

    pub fn ungline() -> Self {
        Self {
            ban_type: BanType::GLine,
            verb: "UNGLINE",
        }
    }

    pub fn unzline() -> Self {
        Self {
            ban_type: BanType::ZLine,
            verb: "UNZLINE",
        }
    }

    pub fn unjupe() -> Self {
        Self {
            ban_type: BanType::Jupe,
            verb: "UNJUPE",
        }
    }
}

#[async_trait]
impl Handler for UnxlineHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::Raw(_, ref params) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let Some(pattern) = params.first() else {
            ctx.send(replies::needmoreparams(&server, &nick, self.verb));
            return Ok(());
        };
        let removed = ctx.nexus.bans.remove(self.ban_type, pattern);
        let note = replies::note(
            &server,
            self.verb,
            "BAN_REMOVED",
            &[pattern.as_str()],
            &format!("{removed} ban(s) removed"),
        );
        ctx.send(note);
        Ok(())
    }
}
