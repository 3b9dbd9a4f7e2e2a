//! Connection lifecycle handlers: PASS, NICK, USER, PING, PONG, QUIT.

use async_trait::async_trait;
use lark_proto::{is_valid_nick, Command, Message, Prefix};

use crate::broker::{Priority, Target};
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::helpers::{now, reveal_hidden};
use crate::handlers::registration::try_complete_registration;
use crate::handlers::{Context, Handler};
use crate::hooks::Event;
use crate::policy::flood::{FloodAction, FloodVerdict};
use crate::replies;

pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if ctx.session.registered {
            let nick = ctx.nick();
            ctx.send(replies::alreadyregistered(ctx.server_name(), &nick));
            return Ok(());
        }
        if let Command::PASS(ref password) = msg.command {
            ctx.session.pass = Some(password.clone());
        }
        Ok(())
    }
}

pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::NICK(ref wanted) = msg.command else {
            return Ok(());
        };
        let wanted = wanted.clone();
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        if !is_valid_nick(&wanted, ctx.nexus.limits.nick_len) {
            ctx.send(replies::erroneusnickname(&server, &nick, &wanted));
            return Ok(());
        }

        // Same-server collision check.
        if let Some(holder) = ctx.nexus.uid_for_nick(&wanted) {
            if holder != ctx.session.uid {
                ctx.send(replies::nicknameinuse(&server, &nick, &wanted));
                return Ok(());
            }
        }

        if !ctx.session.registered {
            if !ctx.nexus.claim_nick(&wanted, &ctx.session.uid) {
                ctx.send(replies::nicknameinuse(&server, &nick, &wanted));
                return Ok(());
            }
            let previous = ctx.session.nick.replace(wanted.clone());
            if let Some(previous) = previous {
                if !lark_proto::irc_eq(&previous, &wanted) {
                    ctx.nexus.release_nick(&previous, &ctx.session.uid);
                }
            }
            return try_complete_registration(ctx).await;
        }

        change_nick(ctx, &wanted).await
    }
}

/// Post-registration nick change: rename, broadcast to channel-mates
/// (deduplicated) plus self, reveal +D membership, propagate to peers.
async fn change_nick(ctx: &mut Context<'_>, wanted: &str) -> HandlerResult {
    let uid = ctx.session.uid.clone();
    let server = ctx.server_name().to_string();

    let Some(user_arc) = ctx.nexus.user(&uid) else {
        return Ok(());
    };
    let (old_prefix, old_nick, channels) = {
        let user = user_arc.read();
        (
            user.prefix(),
            user.nick.clone(),
            user.channels.iter().cloned().collect::<Vec<String>>(),
        )
    };

    // Per-channel nick-change flood windows.
    for folded in &channels {
        if let Some(chan) = ctx.nexus.channel(folded) {
            let mut chan = chan.write();
            let settings = chan.modes.flood.clone();
            if let Some(settings) = settings {
                if let FloodVerdict::Denied(_) =
                    chan.flood.check(&settings, &uid, FloodAction::NickChange, now())
                {
                    drop(chan);
                    ctx.send(replies::fail(
                        &server,
                        "NICK",
                        "RATE_LIMITED",
                        &[],
                        "Changing nickname too quickly",
                    ));
                    return Ok(());
                }
            }
        }
    }

    if ctx.nexus.rename_user(&uid, wanted).is_err() {
        let nick = ctx.nick();
        ctx.send(replies::nicknameinuse(&server, &nick, wanted));
        return Ok(());
    }
    ctx.session.nick = Some(wanted.to_string());

    let notice = Message {
        tags: None,
        prefix: Some(old_prefix),
        command: Command::NICK(wanted.to_string()),
    };
    // Channel-mates (deduplicated) plus the user themself.
    ctx.nexus.route(
        &Target::ChannelMates(uid.clone()),
        &notice,
        Some(&uid),
        Priority::Interactive,
    );
    ctx.nexus.deliver(&uid, &notice, Priority::Interactive);

    // A nick change reveals +D-hidden membership.
    for folded in &channels {
        reveal_hidden(ctx.nexus, folded, &uid);
    }

    ctx.nexus.notify_monitors_offline(&old_nick);
    let mask = ctx
        .nexus
        .user(&uid)
        .map(|u| u.read().mask())
        .unwrap_or_default();
    ctx.nexus.notify_monitors_online(wanted, &mask);

    // Propagate with the user's new TS.
    let s2s = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(uid.clone())),
        command: Command::NICK(wanted.to_string()),
    };
    ctx.nexus.broadcast_links(&s2s, None);

    ctx.nexus
        .hooks
        .emit(Event::NickChange {
            uid,
            old: old_nick,
            new: wanted.to_string(),
        })
        .await;
    Ok(())
}

pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if ctx.session.registered {
            let nick = ctx.nick();
            ctx.send(replies::alreadyregistered(ctx.server_name(), &nick));
            return Ok(());
        }
        let Command::USER(ref user, _, ref realname) = msg.command else {
            return Ok(());
        };
        // USER cannot downgrade earlier values.
        if ctx.session.user.is_none() {
            ctx.session.user = Some(user.clone());
            ctx.session.realname = Some(realname.clone());
        }
        try_complete_registration(ctx).await
    }
}

pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::PING(ref token, _) = msg.command else {
            return Ok(());
        };
        let server = ctx.server_name().to_string();
        let pong = Message::pong(server.clone(), token.clone())
            .with_prefix(Prefix::ServerName(server));
        ctx.send(pong);
        Ok(())
    }
}

pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        // Liveness bookkeeping happens in the connection loop.
        Ok(())
    }
}

pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let reason = match msg.command {
            Command::QUIT(ref reason) => reason.clone(),
            _ => None,
        };
        Err(HandlerError::Quit(reason))
    }
}
