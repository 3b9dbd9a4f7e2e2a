//! Channel membership handlers: JOIN, PART, KICK, TOPIC, NAMES, INVITE,
//! LIST.

use std::sync::Arc;

use async_trait::async_trait;
use lark_proto::{irc_to_lower, wildcard_match, ChannelExt, Command, Message, Prefix};
use parking_lot::RwLock;

use crate::broker::{Priority, Target};
use crate::error::HandlerResult;
use crate::handlers::helpers::{
    broadcast_join, now, prefix_of, send_names, send_topic_numerics, split_channel_list,
    truncate_chars,
};
use crate::handlers::{Context, Handler};
use crate::hooks::Event;
use crate::policy::flood::{FloodAction, FloodPenalty, FloodVerdict};
use crate::replies;
use crate::state::channel::{Channel, JoinDenial, ListEntry, MemberModes};

/// One redirect hop at most: a forward target's own forward is not taken.
const MAX_REDIRECT_HOPS: u8 = 1;

pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::JOIN(ref channels, ref keys) = msg.command else {
            return Ok(());
        };

        if channels.as_str() == "0" {
            return leave_all(ctx).await;
        }

        let keys: Vec<Option<String>> = {
            let supplied: Vec<&str> = keys
                .as_deref()
                .map(|k| k.split(',').collect())
                .unwrap_or_default();
            (0..channels.split(',').count())
                .map(|i| supplied.get(i).map(|s| (*s).to_string()))
                .collect()
        };

        for (i, (display, folded)) in split_channel_list(channels).into_iter().enumerate() {
            join_one(
                ctx,
                &display,
                &folded,
                keys.get(i).cloned().flatten().as_deref(),
                0,
            )
            .await?;
        }
        Ok(())
    }
}

async fn leave_all(ctx: &mut Context<'_>) -> HandlerResult {
    let uid = ctx.uid().to_string();
    let channels: Vec<String> = ctx
        .nexus
        .user(&uid)
        .map(|u| u.read().channels.iter().cloned().collect())
        .unwrap_or_default();
    for folded in channels {
        part_one(ctx, &folded, Some("Leaving all channels".to_string())).await?;
    }
    Ok(())
}

async fn join_one(
    ctx: &mut Context<'_>,
    display: &str,
    folded: &str,
    key: Option<&str>,
    hop: u8,
) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();

    if !display.is_valid_channel_name(ctx.nexus.limits.channel_len) {
        ctx.send(replies::badchanmask(&server, &nick, display));
        return Ok(());
    }

    let Some(user_arc) = ctx.nexus.user(&uid) else {
        return Ok(());
    };
    let (user_nick, user_ident, user_host, identified, joined_count, already_in) = {
        let user = user_arc.read();
        (
            user.nick.clone(),
            user.user.clone(),
            user.visible_host.clone(),
            user.account.is_some(),
            user.channels.len(),
            user.channels.contains(folded),
        )
    };

    if already_in {
        return Ok(());
    }
    if joined_count >= ctx.nexus.limits.chan_limit {
        ctx.send(replies::toomanychannels(&server, &nick, display));
        return Ok(());
    }

    // Create on first join; registration records make a channel permanent.
    let created = !ctx.nexus.channels.contains_key(folded);
    let registered = ctx.nexus.repos.channels.is_registered(folded).await;
    let chan_arc = ctx
        .nexus
        .channels
        .entry(folded.to_string())
        .or_insert_with(|| {
            let mut chan = Channel::new(display, now());
            chan.registered = registered;
            Arc::new(RwLock::new(chan))
        })
        .clone();

    // Membership checks under the channel lock.
    let verdict = {
        let mut chan = chan_arc.write();
        let denial = chan.check_join(
            &uid,
            &user_nick,
            &user_ident,
            &user_host,
            key,
            identified,
            now(),
        );
        match denial {
            Ok(()) => {
                // Per-user join flood (+f j).
                let settings = chan.modes.flood.clone();
                match settings.map(|s| {
                    let verdict = chan.flood.check(&s, &uid, FloodAction::Join, now());
                    verdict
                }) {
                    Some(FloodVerdict::Denied(penalty)) => Err((JoinDenial::Throttled, Some(penalty))),
                    _ => Ok(()),
                }
            }
            Err(denial) => Err((denial, None)),
        }
    };

    if let Err((denial, flood_penalty)) = verdict {
        if let Some(FloodPenalty::Ban) = flood_penalty {
            let mut chan = chan_arc.write();
            chan.bans.push(ListEntry {
                mask: format!("*!*@{user_host}"),
                setter: server.clone(),
                set_at: now(),
            });
        }

        // Forwards: +F on ban/invite/key failure, +L on a full channel.
        let redirect = {
            let chan = chan_arc.read();
            match denial {
                JoinDenial::Banned | JoinDenial::InviteOnly | JoinDenial::BadKey => {
                    chan.modes.forward.clone()
                }
                JoinDenial::Full => chan.modes.redirect.clone(),
                _ => None,
            }
        };
        if let (Some(target), true) = (redirect, hop < MAX_REDIRECT_HOPS) {
            ctx.send(replies::linkchannel(&server, &nick, display, &target));
            let target_folded = irc_to_lower(&target);
            return Box::pin(join_one(ctx, &target, &target_folded, None, hop + 1)).await;
        }

        let reply = match denial {
            JoinDenial::Banned => replies::bannedfromchan(&server, &nick, display),
            JoinDenial::InviteOnly => replies::inviteonlychan(&server, &nick, display),
            JoinDenial::BadKey => replies::badchannelkey(&server, &nick, display),
            JoinDenial::Full => replies::channelisfull(&server, &nick, display),
            JoinDenial::NeedRegged => replies::needreggednick(&server, &nick, display),
            JoinDenial::Throttled => replies::fail(
                &server,
                "JOIN",
                "CHANNEL_RATE_LIMITED",
                &[display],
                "This channel is temporarily rate limited",
            ),
        };
        ctx.send(reply);
        if created && chan_arc.read().should_destroy() {
            ctx.nexus.channels.remove(folded);
        }
        return Ok(());
    }

    // Commit the membership on both sides of the graph.
    let modes = if created && !registered {
        MemberModes::op()
    } else {
        MemberModes::default()
    };
    let (chan_ts, hidden) = {
        let mut chan = chan_arc.write();
        chan.add_member(&uid, modes);
        (chan.created_at, chan.hidden.contains(&uid))
    };
    user_arc.write().channels.insert(folded.to_string());

    // Announce: a +D-hidden joiner is only shown their own JOIN.
    if hidden {
        broadcast_join(ctx.nexus, folded, &uid, Some(&uid));
    } else {
        broadcast_join(ctx.nexus, folded, &uid, None);
    }

    send_topic_numerics(ctx, &chan_arc);
    send_names(ctx, &chan_arc);

    // Introduce to peers with the channel's TS.
    let sjoin = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
        command: Command::SJOIN(
            chan_ts,
            display.to_string(),
            "+".to_string(),
            vec![],
            vec![(modes.prefix_string(), uid.clone())],
        ),
    };
    ctx.nexus.broadcast_links(&sjoin, None);

    ctx.nexus
        .hooks
        .emit(Event::ChannelJoin {
            uid,
            channel: folded.to_string(),
        })
        .await;
    Ok(())
}

pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::PART(ref channels, ref reason) = msg.command else {
            return Ok(());
        };
        let reason = reason.clone();
        for (_, folded) in split_channel_list(channels) {
            part_one(ctx, &folded, reason.clone()).await?;
        }
        Ok(())
    }
}

async fn part_one(ctx: &mut Context<'_>, folded: &str, reason: Option<String>) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();

    let Some(chan_arc) = ctx.nexus.channel(folded) else {
        ctx.send(replies::nosuchchannel(&server, &nick, folded));
        return Ok(());
    };
    let display = chan_arc.read().name.clone();
    if chan_arc.read().member(&uid).is_none() {
        ctx.send(replies::notonchannel(&server, &nick, &display));
        return Ok(());
    }

    let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
        return Ok(());
    };
    let part = Message {
        tags: None,
        prefix: Some(prefix),
        command: Command::PART(display.clone(), reason.clone()),
    };
    // Everyone in the channel sees the PART, including the leaver; a
    // +D-hidden leaver only tells themself.
    if chan_arc.read().hidden.contains(&uid) {
        ctx.nexus.deliver(&uid, &part, Priority::Interactive);
    } else {
        ctx.nexus.route(
            &Target::Channel(folded.to_string()),
            &part,
            None,
            Priority::Interactive,
        );
    }

    ctx.nexus.leave_channel(&uid, folded);

    let s2s = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(uid.clone())),
        command: Command::PART(display, reason),
    };
    ctx.nexus.broadcast_links(&s2s, None);

    ctx.nexus
        .hooks
        .emit(Event::ChannelPart {
            uid,
            channel: folded.to_string(),
        })
        .await;
    Ok(())
}

pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::KICK(ref channel, ref target_nick, ref reason) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();
        let folded = irc_to_lower(channel);

        let Some(chan_arc) = ctx.nexus.channel(&folded) else {
            ctx.send(replies::nosuchchannel(&server, &nick, channel));
            return Ok(());
        };
        let display = chan_arc.read().name.clone();

        let Some(kicker_modes) = chan_arc.read().member(&uid) else {
            ctx.send(replies::notonchannel(&server, &nick, &display));
            return Ok(());
        };
        if !kicker_modes.is_privileged() {
            ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
            return Ok(());
        }

        let Some(target_uid) = ctx.nexus.uid_for_nick(target_nick) else {
            ctx.send(replies::usernotinchannel(&server, &nick, target_nick, &display));
            return Ok(());
        };
        let Some(target_modes) = chan_arc.read().member(&target_uid) else {
            ctx.send(replies::usernotinchannel(&server, &nick, target_nick, &display));
            return Ok(());
        };
        // A halfop cannot remove an op or higher.
        if target_modes.is_op() && !kicker_modes.is_op() {
            ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
            return Ok(());
        }

        // Kick flood (+f k) throttles serial kickers.
        {
            let mut chan = chan_arc.write();
            let settings = chan.modes.flood.clone();
            if let Some(settings) = settings {
                if let FloodVerdict::Denied(_) =
                    chan.flood.check(&settings, &uid, FloodAction::Kick, now())
                {
                    drop(chan);
                    ctx.send(replies::fail(
                        &server,
                        "KICK",
                        "RATE_LIMITED",
                        &[display.as_str()],
                        "Kicking too quickly",
                    ));
                    return Ok(());
                }
            }
        }

        let mut reason = reason.clone().unwrap_or_else(|| nick.clone());
        truncate_chars(&mut reason, ctx.nexus.limits.kick_len);

        let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
            return Ok(());
        };
        let kick = Message {
            tags: None,
            prefix: Some(prefix),
            command: Command::KICK(display.clone(), target_nick.clone(), Some(reason.clone())),
        };
        ctx.nexus.route(
            &Target::Channel(folded.clone()),
            &kick,
            None,
            Priority::Interactive,
        );

        ctx.nexus.leave_channel(&target_uid, &folded);

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: Command::KICK(display, target_uid.clone(), Some(reason)),
        };
        ctx.nexus.broadcast_links(&s2s, None);

        ctx.nexus
            .hooks
            .emit(Event::ChannelKick {
                uid: target_uid,
                channel: folded,
                by: uid,
            })
            .await;
        Ok(())
    }
}

pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::TOPIC(ref channel, ref new_topic) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();
        let folded = irc_to_lower(channel);

        let Some(chan_arc) = ctx.nexus.channel(&folded) else {
            ctx.send(replies::nosuchchannel(&server, &nick, channel));
            return Ok(());
        };
        let display = chan_arc.read().name.clone();

        let Some(member_modes) = chan_arc.read().member(&uid) else {
            ctx.send(replies::notonchannel(&server, &nick, &display));
            return Ok(());
        };

        let Some(new_topic) = new_topic.clone() else {
            send_topic_numerics(ctx, &chan_arc);
            return Ok(());
        };

        if chan_arc.read().modes.topic_lock && !member_modes.is_privileged() {
            ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
            return Ok(());
        }

        let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
            return Ok(());
        };
        let mut text = new_topic;
        truncate_chars(&mut text, ctx.nexus.limits.topic_len);

        {
            let mut chan = chan_arc.write();
            chan.topic = if text.is_empty() {
                None
            } else {
                Some(crate::state::channel::Topic {
                    text: text.clone(),
                    set_by: prefix.to_string(),
                    set_at: now(),
                })
            };
        }

        let topic_msg = Message {
            tags: None,
            prefix: Some(prefix),
            command: Command::TOPIC(display.clone(), Some(text.clone())),
        };
        ctx.nexus.route(
            &Target::Channel(folded.clone()),
            &topic_msg,
            None,
            Priority::Interactive,
        );

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: Command::TOPIC(display, Some(text)),
        };
        ctx.nexus.broadcast_links(&s2s, None);

        ctx.nexus
            .hooks
            .emit(Event::TopicChange {
                channel: folded,
                by: uid,
            })
            .await;
        Ok(())
    }
}

pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::NAMES(ref channels) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        match channels {
            Some(list) => {
                for (display, folded) in split_channel_list(list) {
                    match ctx.nexus.channel(&folded) {
                        Some(chan) => send_names(ctx, &chan),
                        None => ctx.send(replies::endofnames(&server, &nick, &display)),
                    }
                }
            }
            None => {
                let joined: Vec<String> = ctx
                    .nexus
                    .user(ctx.uid())
                    .map(|u| u.read().channels.iter().cloned().collect())
                    .unwrap_or_default();
                for folded in joined {
                    if let Some(chan) = ctx.nexus.channel(&folded) {
                        send_names(ctx, &chan);
                    }
                }
                ctx.send(replies::endofnames(&server, &nick, "*"));
            }
        }
        Ok(())
    }
}

pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::INVITE(ref target_nick, ref channel) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();
        let folded = irc_to_lower(channel);

        let Some(chan_arc) = ctx.nexus.channel(&folded) else {
            ctx.send(replies::nosuchchannel(&server, &nick, channel));
            return Ok(());
        };
        let display = chan_arc.read().name.clone();

        let Some(inviter_modes) = chan_arc.read().member(&uid) else {
            ctx.send(replies::notonchannel(&server, &nick, &display));
            return Ok(());
        };
        if chan_arc.read().modes.invite_only && !inviter_modes.is_privileged() {
            ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
            return Ok(());
        }

        let Some(target_uid) = ctx.nexus.uid_for_nick(target_nick) else {
            ctx.send(replies::nosuchnick(&server, &nick, target_nick));
            return Ok(());
        };
        if chan_arc.read().member(&target_uid).is_some() {
            ctx.send(replies::useronchannel(&server, &nick, target_nick, &display));
            return Ok(());
        }

        chan_arc.write().invited.insert(target_uid.clone());
        ctx.send(replies::inviting(&server, &nick, target_nick, &display));

        let Some(prefix) = prefix_of(ctx.nexus, &uid) else {
            return Ok(());
        };
        let invite = Message {
            tags: None,
            prefix: Some(prefix),
            command: Command::INVITE(target_nick.clone(), display.clone()),
        };
        if ctx.nexus.is_local_uid(&target_uid) {
            ctx.nexus.deliver(&target_uid, &invite, Priority::Interactive);
        } else {
            let s2s = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(uid.clone())),
                command: Command::INVITE(target_uid.clone(), display.clone()),
            };
            ctx.nexus
                .send_toward_sid(crate::state::uid_sid(&target_uid), &s2s);
        }

        // invite-notify goes to privileged members holding the cap.
        let notify = {
            let prefix = prefix_of(ctx.nexus, &uid);
            Message {
                tags: None,
                prefix,
                command: Command::INVITE(target_nick.clone(), display),
            }
        };
        ctx.nexus.route_with_cap(
            &Target::Channel(folded),
            &notify,
            Some(&uid),
            "invite-notify",
        );
        Ok(())
    }
}

pub struct ListHandler;

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::LIST(ref channels, ref elist) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();

        let mask_filter = channels.clone().filter(|c| c.contains('*') || c.contains('?'));
        let explicit: Option<Vec<String>> = channels
            .as_ref()
            .filter(|c| mask_filter.is_none() && !c.is_empty())
            .map(|c| c.split(',').map(irc_to_lower).collect());

        // ELIST U filter: ">N" or "<N" member-count bounds.
        let (min_users, max_users) = match elist.as_deref() {
            Some(filter) if filter.starts_with('>') => {
                (filter[1..].parse::<usize>().ok(), None)
            }
            Some(filter) if filter.starts_with('<') => {
                (None, filter[1..].parse::<usize>().ok())
            }
            _ => (None, None),
        };

        ctx.send(replies::liststart(&server, &nick));

        let entries: Vec<(String, usize, String, bool, bool)> = ctx
            .nexus
            .channels
            .iter()
            .map(|entry| {
                let chan = entry.value().read();
                (
                    chan.name.clone(),
                    chan.members.len() - chan.hidden.len(),
                    chan.topic.as_ref().map(|t| t.text.clone()).unwrap_or_default(),
                    chan.modes.secret || chan.modes.private,
                    chan.members.contains_key(&uid),
                )
            })
            .collect();

        for (name, visible, topic, concealed, is_member) in entries {
            if concealed && !is_member {
                continue;
            }
            let folded = irc_to_lower(&name);
            if let Some(ref list) = explicit {
                if !list.contains(&folded) {
                    continue;
                }
            }
            if let Some(ref mask) = mask_filter {
                if !wildcard_match(mask, &name) {
                    continue;
                }
            }
            if min_users.is_some_and(|min| visible <= min) {
                continue;
            }
            if max_users.is_some_and(|max| visible >= max) {
                continue;
            }
            ctx.send(replies::list_entry(&server, &nick, &name, visible, &topic));
        }

        ctx.send(replies::listend(&server, &nick));
        Ok(())
    }
}
