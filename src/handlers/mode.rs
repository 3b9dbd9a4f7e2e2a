//! MODE: user modes and channel modes, including the list modes and the
//! policy modes (+f, +j, +F, +L, +D).

use async_trait::async_trait;
use lark_proto::mode::{parse_channel_modes, parse_user_modes, ModeAction, ModeChange};
use lark_proto::{irc_to_lower, ChannelExt, Command, Message, Prefix};

use crate::broker::{Priority, Target};
use crate::error::HandlerResult;
use crate::handlers::helpers::{now, prefix_of, reveal_hidden};
use crate::handlers::{Context, Handler};
use crate::hooks::Event;
use crate::policy::flood::FloodSettings;
use crate::policy::throttle::ThrottleSettings;
use crate::replies;
use crate::state::channel::ListEntry;

pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        match msg.command {
            Command::UserMODE(ref target, ref changes) => {
                user_mode(ctx, target, changes).await
            }
            Command::ChannelMODE(ref target, ref changes) => {
                channel_mode(ctx, target, changes).await
            }
            _ => Ok(()),
        }
    }
}

async fn user_mode(ctx: &mut Context<'_>, target: &str, changes: &[String]) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();

    if !lark_proto::irc_eq(target, &nick) {
        ctx.send(replies::usersdontmatch(&server, &nick));
        return Ok(());
    }
    let Some(user_arc) = ctx.nexus.user(&uid) else {
        return Ok(());
    };

    let Some(word) = changes.first() else {
        let modes = user_arc.read().modes.as_mode_string();
        ctx.send(replies::umodeis(&server, &nick, &modes));
        return Ok(());
    };

    let (parsed, unknown) = parse_user_modes(word);
    if !unknown.is_empty() {
        ctx.send(replies::umodeunknownflag(&server, &nick));
    }

    let mut applied = String::new();
    let mut current_action = None;
    {
        let mut user = user_arc.write();
        for (action, mode) in parsed {
            // +o comes only from OPER; +r/+Z only from the server. The away
            // flag follows AWAY, not MODE.
            if matches!(mode, 'o' | 'r' | 'Z') && action == ModeAction::Add {
                continue;
            }
            if mode == 'a' {
                continue;
            }
            if user.modes.get(mode) == (action == ModeAction::Add) {
                continue;
            }
            user.modes.apply(action, mode);
            if current_action != Some(action) {
                applied.push(match action {
                    ModeAction::Add => '+',
                    ModeAction::Remove => '-',
                });
                current_action = Some(action);
            }
            applied.push(mode);
        }
    }

    if !applied.is_empty() {
        let echo = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, &uid),
            command: Command::UserMODE(nick.clone(), vec![applied.clone()]),
        };
        ctx.send(echo);

        let s2s = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(uid.clone())),
            command: Command::UserMODE(uid.clone(), vec![applied]),
        };
        ctx.nexus.broadcast_links(&s2s, None);

        ctx.nexus.hooks.emit(Event::UserModeChange { uid }).await;
    }
    Ok(())
}

async fn channel_mode(
    ctx: &mut Context<'_>,
    target: &str,
    changes: &[String],
) -> HandlerResult {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let uid = ctx.uid().to_string();
    let folded = irc_to_lower(target);

    let Some(chan_arc) = ctx.nexus.channel(&folded) else {
        ctx.send(replies::nosuchchannel(&server, &nick, target));
        return Ok(());
    };
    let display = chan_arc.read().name.clone();
    let member_modes = chan_arc.read().member(&uid);

    // Bare MODE #chan: current modes + creation time.
    if changes.is_empty() {
        let (summary, created_at) = {
            let chan = chan_arc.read();
            (chan.modes.summary(member_modes.is_some()), chan.created_at)
        };
        ctx.send(replies::channelmodeis(&server, &nick, &display, summary));
        ctx.send(replies::creationtime(&server, &nick, &display, created_at));
        return Ok(());
    }

    let (parsed, unknown) =
        parse_channel_modes(changes, ctx.nexus.limits.modes_per_line);
    for mode in unknown {
        ctx.send(replies::unknownmode(&server, &nick, mode));
    }

    // Pure list queries (+b/+e/+I with no mask) are open to members.
    let queries: Vec<char> = parsed
        .iter()
        .filter(|c| {
            matches!(c.mode, 'b' | 'e' | 'I')
                && c.param.is_none()
                && c.action == ModeAction::Add
        })
        .map(|c| c.mode)
        .collect();
    let mutations: Vec<ModeChange> = parsed
        .into_iter()
        .filter(|c| {
            !(matches!(c.mode, 'b' | 'e' | 'I')
                && c.param.is_none()
                && c.action == ModeAction::Add)
        })
        .collect();

    for mode in queries {
        send_list(ctx, &chan_arc, &display, mode);
    }
    if mutations.is_empty() {
        return Ok(());
    }

    let Some(member_modes) = member_modes else {
        ctx.send(replies::notonchannel(&server, &nick, &display));
        return Ok(());
    };
    if !member_modes.is_privileged() {
        ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
        return Ok(());
    }

    let setter_mask = ctx
        .nexus
        .user(&uid)
        .map(|u| u.read().mask())
        .unwrap_or_else(|| server.clone());

    let mut applied_word = String::new();
    let mut applied_params: Vec<String> = Vec::new();
    let mut current_action = None;
    let mut granted_voice_or_better: Vec<String> = Vec::new();
    let mut cleared_delay = false;

    for change in mutations {
        let adding = change.action == ModeAction::Add;
        let applied_param: Option<String> = match change.mode {
            'b' | 'e' | 'I' => {
                let Some(mask) = change.param.clone() else {
                    continue;
                };
                let mut chan = chan_arc.write();
                let list = match change.mode {
                    'b' => &mut chan.bans,
                    'e' => &mut chan.excepts,
                    _ => &mut chan.invites,
                };
                if adding {
                    if list.len() >= ctx.nexus.limits.list_mode_len {
                        drop(chan);
                        ctx.send(replies::banlistfull(&server, &nick, &display, &mask));
                        continue;
                    }
                    if list.iter().any(|e| e.mask == mask) {
                        continue;
                    }
                    list.push(ListEntry {
                        mask: mask.clone(),
                        setter: setter_mask.clone(),
                        set_at: now(),
                    });
                } else {
                    let before = list.len();
                    list.retain(|e| e.mask != mask);
                    if list.len() == before {
                        continue;
                    }
                }
                Some(mask)
            }
            'q' | 'a' | 'o' | 'h' | 'v' => {
                // Owner/admin grants take op or better.
                if matches!(change.mode, 'q' | 'a') && !member_modes.is_op() {
                    ctx.send(replies::chanoprivsneeded(&server, &nick, &display));
                    continue;
                }
                let Some(target_nick) = change.param.clone() else {
                    continue;
                };
                let Some(target_uid) = ctx.nexus.uid_for_nick(&target_nick) else {
                    ctx.send(replies::nosuchnick(&server, &nick, &target_nick));
                    continue;
                };
                let updated = {
                    let mut chan = chan_arc.write();
                    match chan.members.get_mut(&target_uid) {
                        Some(modes) => {
                            modes.set(change.mode, adding);
                            true
                        }
                        None => false,
                    }
                };
                if !updated {
                    ctx.send(replies::usernotinchannel(
                        &server,
                        &nick,
                        &target_nick,
                        &display,
                    ));
                    continue;
                }
                if adding {
                    granted_voice_or_better.push(target_uid);
                }
                Some(target_nick)
            }
            'k' => {
                let mut chan = chan_arc.write();
                if adding {
                    let Some(key) = change.param.clone() else {
                        continue;
                    };
                    chan.modes.key = Some(key.clone());
                    Some(key)
                } else {
                    if chan.modes.key.take().is_none() {
                        continue;
                    }
                    None
                }
            }
            'l' => {
                let mut chan = chan_arc.write();
                if adding {
                    let Some(limit) = change.param.as_deref().and_then(|p| p.parse().ok())
                    else {
                        continue;
                    };
                    chan.modes.limit = Some(limit);
                    Some(limit.to_string())
                } else {
                    if chan.modes.limit.take().is_none() {
                        continue;
                    }
                    None
                }
            }
            'f' => {
                if adding {
                    let Some(settings) = change
                        .param
                        .as_deref()
                        .and_then(|p| p.parse::<FloodSettings>().ok())
                    else {
                        ctx.send(replies::fail(
                            &server,
                            "MODE",
                            "INVALID_PARAM",
                            &[display.as_str(), "+f"],
                            "Expected [*]type:limit:seconds[,...]",
                        ));
                        continue;
                    };
                    chan_arc.write().modes.flood = Some(settings);
                    change.param.clone()
                } else {
                    if chan_arc.write().modes.flood.take().is_none() {
                        continue;
                    }
                    None
                }
            }
            'j' => {
                if adding {
                    let Some(settings) = change
                        .param
                        .as_deref()
                        .and_then(|p| p.parse::<ThrottleSettings>().ok())
                    else {
                        ctx.send(replies::fail(
                            &server,
                            "MODE",
                            "INVALID_PARAM",
                            &[display.as_str(), "+j"],
                            "Expected joins:seconds",
                        ));
                        continue;
                    };
                    chan_arc.write().modes.throttle = Some(settings);
                    change.param.clone()
                } else {
                    if chan_arc.write().modes.throttle.take().is_none() {
                        continue;
                    }
                    None
                }
            }
            'F' | 'L' => {
                if adding {
                    let Some(target_chan) = change.param.clone() else {
                        continue;
                    };
                    if !target_chan.is_valid_channel_name(ctx.nexus.limits.channel_len) {
                        ctx.send(replies::badchanmask(&server, &nick, &target_chan));
                        continue;
                    }
                    let mut chan = chan_arc.write();
                    if change.mode == 'F' {
                        chan.modes.forward = Some(target_chan.clone());
                    } else {
                        chan.modes.redirect = Some(target_chan.clone());
                    }
                    Some(target_chan)
                } else {
                    let mut chan = chan_arc.write();
                    let cleared = if change.mode == 'F' {
                        chan.modes.forward.take().is_some()
                    } else {
                        chan.modes.redirect.take().is_some()
                    };
                    if !cleared {
                        continue;
                    }
                    None
                }
            }
            flag => {
                let mut chan = chan_arc.write();
                if chan.modes.get_flag(flag) == adding {
                    continue;
                }
                chan.modes.set_flag(flag, adding);
                if flag == 'D' && !adding {
                    cleared_delay = true;
                }
                None
            }
        };

        if current_action != Some(change.action) {
            applied_word.push(if adding { '+' } else { '-' });
            current_action = Some(change.action);
        }
        applied_word.push(change.mode);
        if let Some(param) = applied_param {
            applied_params.push(param);
        }
    }

    if applied_word.is_empty() {
        return Ok(());
    }

    chan_arc.write().mode_set_by = Some((setter_mask, now()));

    // Granting voice or better reveals +D-hidden members, as does clearing
    // +D itself.
    for target in granted_voice_or_better {
        reveal_hidden(ctx.nexus, &folded, &target);
    }
    if cleared_delay {
        let hidden: Vec<String> = chan_arc.read().hidden.iter().cloned().collect();
        for target in hidden {
            reveal_hidden(ctx.nexus, &folded, &target);
        }
    }

    let mut args = vec![applied_word.clone()];
    args.extend(applied_params.clone());
    let echo = Message {
        tags: None,
        prefix: prefix_of(ctx.nexus, &uid),
        command: Command::ChannelMODE(display.clone(), args),
    };
    ctx.nexus.route(
        &Target::Channel(folded.clone()),
        &echo,
        None,
        Priority::Interactive,
    );

    let ts = chan_arc.read().created_at;
    let s2s = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(uid.clone())),
        command: Command::TMODE(ts, display, applied_word, applied_params),
    };
    ctx.nexus.broadcast_links(&s2s, None);

    ctx.nexus
        .hooks
        .emit(Event::ChannelModeChange {
            channel: folded,
            by: uid,
        })
        .await;
    Ok(())
}

fn send_list(
    ctx: &mut Context<'_>,
    chan_arc: &std::sync::Arc<parking_lot::RwLock<crate::state::channel::Channel>>,
    display: &str,
    mode: char,
) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let entries: Vec<ListEntry> = {
        let chan = chan_arc.read();
        match mode {
            'b' => chan.bans.clone(),
            'e' => chan.excepts.clone(),
            _ => chan.invites.clone(),
        }
    };
    for entry in &entries {
        let reply = match mode {
            'b' => replies::banlist(&server, &nick, display, &entry.mask, &entry.setter, entry.set_at),
            'e' => replies::exceptlist(&server, &nick, display, &entry.mask, &entry.setter, entry.set_at),
            _ => replies::invitelist(&server, &nick, display, &entry.mask, &entry.setter, entry.set_at),
        };
        ctx.send(reply);
    }
    let end = match mode {
        'b' => replies::endofbanlist(&server, &nick, display),
        'e' => replies::endofexceptlist(&server, &nick, display),
        _ => replies::endofinvitelist(&server, &nick, display),
    };
    ctx.send(end);
}
