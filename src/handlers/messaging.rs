//! PRIVMSG, NOTICE, and TAGMSG.

use async_trait::async_trait;
use lark_proto::{generate_msgid, irc_to_lower, server_time_now, Command, Message, Prefix};

use crate::broker::Priority;
use crate::error::HandlerResult;
use crate::handlers::helpers::{now, prefix_of, reveal_hidden, split_statusmsg};
use crate::handlers::{Context, Handler};
use crate::hooks::Event;
use crate::policy::flood::{FloodAction, FloodPenalty, FloodVerdict};
use crate::repo::StoredMessage;
use crate::replies;
use crate::state::channel::ListEntry;
use crate::state::uid_sid;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Privmsg,
    Notice,
    Tagmsg,
}

impl Kind {
    fn verb(self) -> &'static str {
        match self {
            Kind::Privmsg => "PRIVMSG",
            Kind::Notice => "NOTICE",
            Kind::Tagmsg => "TAGMSG",
        }
    }

    /// NOTICE must never trigger automatic replies.
    fn replies_allowed(self) -> bool {
        !matches!(self, Kind::Notice)
    }
}

pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::PRIVMSG(ref targets, ref text) = msg.command else {
            return Ok(());
        };
        relay(ctx, Kind::Privmsg, targets, Some(text.clone()), msg).await
    }
}

pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::NOTICE(ref targets, ref text) = msg.command else {
            return Ok(());
        };
        relay(ctx, Kind::Notice, targets, Some(text.clone()), msg).await
    }
}

pub struct TagmsgHandler;

#[async_trait]
impl Handler for TagmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::TAGMSG(ref targets) = msg.command else {
            return Ok(());
        };
        relay(ctx, Kind::Tagmsg, targets, None, msg).await
    }
}

async fn relay(
    ctx: &mut Context<'_>,
    kind: Kind,
    targets: &str,
    text: Option<String>,
    incoming: &Message,
) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();

    if let Some(text) = text.as_deref() {
        if text.is_empty() && kind.replies_allowed() {
            ctx.send(replies::notexttosend(&server, &nick));
            return Ok(());
        }
    }

    let list: Vec<&str> = targets.split(',').filter(|t| !t.is_empty()).collect();
    if list.is_empty() {
        if kind.replies_allowed() {
            ctx.send(replies::norecipient(&server, &nick, kind.verb()));
        }
        return Ok(());
    }
    if list.len() > ctx.nexus.limits.max_targets {
        if kind.replies_allowed() {
            ctx.send(replies::toomanytargets(&server, &nick, targets));
        }
        return Ok(());
    }

    for target in list {
        let (min_rank, bare) = split_statusmsg(target);
        if bare.starts_with('#') || bare.starts_with('&') {
            to_channel(ctx, kind, min_rank, bare, text.as_deref(), incoming).await?;
        } else {
            to_user(ctx, kind, bare, text.as_deref(), incoming).await?;
        }
    }
    Ok(())
}

/// True for CTCP payloads other than ACTION.
fn is_non_action_ctcp(text: &str) -> bool {
    text.starts_with('\u{1}') && !text[1..].starts_with("ACTION")
}

fn contains_formatting(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{2}' | '\u{3}' | '\u{1d}' | '\u{1f}' | '\u{16}'))
}

/// Copy client-only tags (`+`-prefixed) from the incoming message.
fn client_tags(incoming: &Message) -> Vec<lark_proto::Tag> {
    incoming
        .tags
        .iter()
        .flatten()
        .filter(|tag| tag.0.starts_with('+'))
        .cloned()
        .collect()
}

async fn to_channel(
    ctx: &mut Context<'_>,
    kind: Kind,
    min_rank: Option<char>,
    channel: &str,
    text: Option<&str>,
    incoming: &Message,
) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();
    let folded = irc_to_lower(channel);

    let Some(chan_arc) = ctx.nexus.channel(&folded) else {
        if kind.replies_allowed() {
            ctx.send(replies::nosuchnick(&server, &nick, channel));
        }
        return Ok(());
    };

    let (display, member_modes, banned) = {
        let chan = chan_arc.read();
        let sender = ctx.nexus.user(&uid);
        let banned = sender
            .map(|s| {
                let s = s.read();
                chan.is_banned(&s.nick, &s.user, &s.visible_host)
            })
            .unwrap_or(false);
        (chan.name.clone(), chan.member(&uid), banned)
    };

    let reject = |ctx: &mut Context<'_>| {
        if kind.replies_allowed() {
            let reply = replies::cannotsendtochan(&server, &nick, &display);
            ctx.send(reply);
        }
    };

    let modes_snapshot = chan_arc.read().modes.clone();
    if member_modes.is_none() && modes_snapshot.no_external {
        reject(ctx);
        return Ok(());
    }
    if modes_snapshot.moderated
        && !member_modes.map(|m| m.can_speak_when_moderated()).unwrap_or(false)
    {
        reject(ctx);
        return Ok(());
    }
    if banned && member_modes.is_some() {
        reject(ctx);
        return Ok(());
    }
    if let Some(text) = text {
        if modes_snapshot.no_color && contains_formatting(text) {
            reject(ctx);
            return Ok(());
        }
        if modes_snapshot.no_ctcp && is_non_action_ctcp(text) {
            reject(ctx);
            return Ok(());
        }
    }

    // Channel flood windows (messages and CTCPs).
    if kind != Kind::Tagmsg {
        let action = match text {
            Some(text) if text.starts_with('\u{1}') => FloodAction::Ctcp,
            _ => FloodAction::Message,
        };
        let verdict = {
            let mut chan = chan_arc.write();
            let settings = chan.modes.flood.clone();
            settings.map(|s| chan.flood.check(&s, &uid, action, now()))
        };
        if let Some(FloodVerdict::Denied(penalty)) = verdict {
            flood_eject(ctx, &folded, &display, &uid, penalty).await;
            return Ok(());
        }
    }

    // Speaking reveals +D-hidden membership.
    reveal_hidden(ctx.nexus, &folded, &uid);

    let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
        return Ok(());
    };
    let msgid = generate_msgid();
    let account = ctx
        .nexus
        .user(&uid)
        .and_then(|u| u.read().account.clone());

    let command = match (kind, text) {
        (Kind::Tagmsg, _) => Command::TAGMSG(display.clone()),
        (Kind::Privmsg, Some(text)) => Command::PRIVMSG(display.clone(), text.to_string()),
        (_, Some(text)) => Command::NOTICE(display.clone(), text.to_string()),
        _ => return Ok(()),
    };
    let mut out = Message {
        tags: Some(client_tags(incoming)),
        prefix: Some(prefix),
        command,
    }
    .with_tag("time", Some(server_time_now()))
    .with_tag("msgid", Some(msgid.clone()));
    if let Some(ref account) = account {
        out = out.with_tag("account", Some(account.clone()));
    }

    // Fan out to members, honoring STATUSMSG rank floors and echo-message.
    let recipients: Vec<(String, bool)> = {
        let chan = chan_arc.read();
        chan.members
            .iter()
            .map(|(member, modes)| {
                let meets_rank = match min_rank {
                    None => true,
                    Some('~') => modes.owner,
                    Some('&') => modes.admin || modes.owner,
                    Some('@') => modes.is_op(),
                    Some('%') => modes.is_privileged(),
                    Some('+') => modes.can_speak_when_moderated(),
                    Some(_) => true,
                };
                (member.clone(), meets_rank)
            })
            .collect()
    };
    let echo = ctx.session.has_cap("echo-message");
    for (member, meets_rank) in recipients {
        if !meets_rank {
            continue;
        }
        if member == uid {
            if echo {
                ctx.nexus.deliver(&member, &out, Priority::Interactive);
            }
            continue;
        }
        ctx.nexus.deliver(&member, &out, Priority::Interactive);
    }

    if kind != Kind::Tagmsg {
        if let Some(text) = text {
            ctx.nexus
                .repos
                .history
                .append(StoredMessage {
                    msgid,
                    target: folded.clone(),
                    source: ctx
                        .nexus
                        .user(&uid)
                        .map(|u| u.read().mask())
                        .unwrap_or_default(),
                    account,
                    ts_millis: chrono::Utc::now().timestamp_millis(),
                    command: kind.verb().to_string(),
                    text: text.to_string(),
                })
                .await;
        }
    }

    // Relay to every neighbour (local origin, no split horizon needed).
    if let Some(text) = text {
        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: match kind {
                Kind::Notice => Command::NOTICE(display, text.to_string()),
                _ => Command::PRIVMSG(display, text.to_string()),
            },
        };
        ctx.nexus.broadcast_links(&s2s, None);
    }

    ctx.nexus
        .hooks
        .emit(Event::ChannelMessage {
            uid,
            channel: folded,
        })
        .await;
    Ok(())
}

/// Kick (or ban) a user who tripped the channel flood limiter.
async fn flood_eject(
    ctx: &mut Context<'_>,
    folded: &str,
    display: &str,
    uid: &str,
    penalty: FloodPenalty,
) {
    let server = ctx.server_name().to_string();
    let target_nick = ctx.nexus.nick_of(uid);

    if penalty == FloodPenalty::Ban {
        if let Some(chan) = ctx.nexus.channel(folded) {
            let mask = ctx
                .nexus
                .user(uid)
                .map(|u| format!("*!*@{}", u.read().visible_host))
                .unwrap_or_else(|| format!("{target_nick}!*@*"));
            chan.write().bans.push(ListEntry {
                mask,
                setter: server.clone(),
                set_at: now(),
            });
        }
    }

    let kick = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server.clone())),
        command: Command::KICK(
            display.to_string(),
            target_nick,
            Some("Flood limit exceeded".to_string()),
        ),
    };
    ctx.nexus.route(
        &crate::broker::Target::Channel(folded.to_string()),
        &kick,
        None,
        Priority::Interactive,
    );
    ctx.nexus.leave_channel(uid, folded);

    let s2s = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
        command: Command::KICK(
            display.to_string(),
            uid.to_string(),
            Some("Flood limit exceeded".to_string()),
        ),
    };
    ctx.nexus.broadcast_links(&s2s, None);
}

async fn to_user(
    ctx: &mut Context<'_>,
    kind: Kind,
    target_nick: &str,
    text: Option<&str>,
    incoming: &Message,
) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();

    let Some(target_uid) = ctx.nexus.uid_for_nick(target_nick) else {
        if kind.replies_allowed() {
            ctx.send(replies::nosuchnick(&server, &nick, target_nick));
        }
        return Ok(());
    };

    // Caller-id: +g recipients only hear accepted senders and opers.
    if let Some(target) = ctx.nexus.user(&target_uid) {
        let (gated, target_display) = {
            let target = target.read();
            let accepted = target.accept_list.contains(&irc_to_lower(&nick));
            (
                target.modes.callerid && !accepted && !ctx.is_oper(),
                target.nick.clone(),
            )
        };
        if gated && kind != Kind::Notice {
            if ctx.nexus.callerid.should_notify(&uid, &target_uid, now()) {
                ctx.send(replies::targumodeg(&server, &nick, &target_display));
                ctx.send(replies::targnotify(&server, &nick, &target_display));
                let sender_mask = ctx
                    .nexus
                    .user(&uid)
                    .map(|u| u.read().mask())
                    .unwrap_or_default();
                let target_note =
                    replies::umodegmsg(&server, &target_display, &nick, &sender_mask);
                ctx.nexus
                    .deliver(&target_uid, &target_note, Priority::Background);
            }
            return Ok(());
        }
    }

    let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
        return Ok(());
    };
    let msgid = generate_msgid();
    let account = ctx
        .nexus
        .user(&uid)
        .and_then(|u| u.read().account.clone());

    let command = match (kind, text) {
        (Kind::Tagmsg, _) => Command::TAGMSG(target_nick.to_string()),
        (Kind::Privmsg, Some(text)) => {
            Command::PRIVMSG(target_nick.to_string(), text.to_string())
        }
        (_, Some(text)) => Command::NOTICE(target_nick.to_string(), text.to_string()),
        _ => return Ok(()),
    };
    let mut out = Message {
        tags: Some(client_tags(incoming)),
        prefix: Some(prefix),
        command,
    }
    .with_tag("time", Some(server_time_now()))
    .with_tag("msgid", Some(msgid.clone()));
    if let Some(ref account) = account {
        out = out.with_tag("account", Some(account.clone()));
    }

    if ctx.nexus.is_local_uid(&target_uid) {
        ctx.nexus.deliver(&target_uid, &out, Priority::Interactive);
    } else if let Some(text) = text {
        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: match kind {
                Kind::Notice => Command::NOTICE(target_uid.clone(), text.to_string()),
                _ => Command::PRIVMSG(target_uid.clone(), text.to_string()),
            },
        };
        ctx.nexus.send_toward_sid(uid_sid(&target_uid), &s2s);
    }

    if ctx.session.has_cap("echo-message") {
        ctx.nexus.deliver(&uid, &out, Priority::Interactive);
    }

    // Away auto-reply (PRIVMSG only).
    if kind == Kind::Privmsg {
        if let Some(target) = ctx.nexus.user(&target_uid) {
            let away = target.read().away.clone();
            if let Some(away) = away {
                ctx.send(replies::away(&server, &nick, target_nick, &away));
            }
        }
    }

    if kind != Kind::Tagmsg {
        if let Some(text) = text {
            let mut pair = [irc_to_lower(&nick), irc_to_lower(target_nick)];
            pair.sort();
            ctx.nexus
                .repos
                .history
                .append(StoredMessage {
                    msgid,
                    target: pair.join(","),
                    source: ctx
                        .nexus
                        .user(&uid)
                        .map(|u| u.read().mask())
                        .unwrap_or_default(),
                    account,
                    ts_millis: chrono::Utc::now().timestamp_millis(),
                    command: kind.verb().to_string(),
                    text: text.to_string(),
                })
                .await;
        }
    }

    ctx.nexus
        .hooks
        .emit(Event::PrivateMessage {
            from: uid,
            to: target_uid,
        })
        .await;
    Ok(())
}
