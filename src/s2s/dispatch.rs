//! S2S message dispatch.
//!
//! Handles every verb arriving on an established link. Propagation is
//! split-horizon: nothing is echoed back to the neighbour that delivered
//! it. UID-addressed traffic is forwarded along the spanning tree; channel
//! traffic and `ENCAP *` are rebroadcast to every other neighbour.

use std::collections::HashSet;
use std::sync::Arc;

use lark_proto::{
    generate_msgid, irc_to_lower, server_time_now, Command, Message, Prefix, UidParams,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::{Priority, Target};
use crate::error::LinkError;
use crate::handlers::helpers::now;
use crate::s2s::collide::{merge_sjoin, resolve_collision, Collision};
use crate::state::channel::Channel;
use crate::state::uid_sid;
use crate::state::user::{User, UserModes};
use crate::state::{BanType, Nexus};

/// Process one message from an established link.
pub async fn handle_link_message(
    nexus: &Arc<Nexus>,
    from_sid: &str,
    msg: Message,
) -> Result<(), LinkError> {
    let prefix = msg.prefix.clone();
    let source = prefix
        .as_ref()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| from_sid.to_string());

    match msg.command.clone() {
        Command::PING(origin, _) => {
            if let Some(link) = nexus.links.get(from_sid) {
                let pong = Message {
                    tags: None,
                    prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
                    command: Command::PONG(nexus.info.sid.clone(), Some(origin)),
                };
                link.send(&pong);
            }
        }
        Command::PONG(..) => {
            if let Some(link) = nexus.links.get(from_sid) {
                *link.last_pong.lock() = std::time::Instant::now();
            }
        }
        Command::ERROR(reason) => {
            warn!(sid = %from_sid, reason = %reason, "link error from peer");
            return Err(LinkError::Remote(reason));
        }
        Command::EOB => {
            info!(sid = %from_sid, "end of burst");
        }
        Command::SID(name, hopcount, sid, description) => {
            if nexus.bans.find_jupe(&name, now()).is_some() {
                return Err(LinkError::Handshake(format!("server {name} is juped")));
            }
            if sid == nexus.info.sid
                || !nexus.topology.add_remote(
                    &sid,
                    &name,
                    &description,
                    hopcount,
                    &source,
                    from_sid,
                )
            {
                return Err(LinkError::Handshake(format!(
                    "routing loop: {name} ({sid}) already known"
                )));
            }
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::SID(name, hopcount + 1, sid, description),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::UID(params) => {
            handle_uid(nexus, from_sid, params).await;
        }
        Command::NICK(new_nick) => {
            handle_remote_nick(nexus, from_sid, &source, &new_nick).await;
        }
        Command::QUIT(reason) => {
            let reason = reason.unwrap_or_else(|| "Quit".to_string());
            nexus.quit_user(&source, &reason, true, Some(from_sid)).await;
        }
        Command::KILL(target_uid, reason) => {
            nexus
                .quit_user(&target_uid, &reason, true, Some(from_sid))
                .await;
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::KILL(target_uid, reason),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::SJOIN(ts, name, mode_word, mode_args, members) => {
            handle_sjoin(nexus, from_sid, ts, &name, &mode_word, &mode_args, &members);
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::SJOIN(ts, name, mode_word, mode_args, members),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::PART(channels, reason) => {
            for name in channels.split(',').filter(|n| !n.is_empty()) {
                let folded = irc_to_lower(name);
                if let Some(user) = nexus.user(&source) {
                    let part = Message {
                        tags: None,
                        prefix: Some(user.read().prefix()),
                        command: Command::PART(name.to_string(), reason.clone()),
                    };
                    nexus.route(
                        &Target::Channel(folded.clone()),
                        &part,
                        Some(&source),
                        Priority::Interactive,
                    );
                }
                nexus.leave_channel(&source, &folded);
            }
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::PART(channels, reason),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::KICK(channel, target_uid, reason) => {
            let folded = irc_to_lower(&channel);
            let target_nick = nexus.nick_of(&target_uid);
            let kicker_prefix = nexus
                .user(&source)
                .map(|u| u.read().prefix())
                .unwrap_or_else(|| Prefix::ServerName(source.clone()));
            let kick = Message {
                tags: None,
                prefix: Some(kicker_prefix),
                command: Command::KICK(channel.clone(), target_nick, reason.clone()),
            };
            nexus.route(
                &Target::Channel(folded.clone()),
                &kick,
                None,
                Priority::Interactive,
            );
            nexus.leave_channel(&target_uid, &folded);
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::KICK(channel, target_uid, reason),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::TMODE(ts, channel, mode_word, mode_args) => {
            let folded = irc_to_lower(&channel);
            if let Some(chan_arc) = nexus.channel(&folded) {
                let applies = ts <= chan_arc.read().created_at;
                if applies {
                    crate::s2s::collide::apply_mode_image(
                        &mut chan_arc.write(),
                        &mode_word,
                        &mode_args,
                    );
                    let setter = nexus
                        .user(&source)
                        .map(|u| u.read().prefix())
                        .unwrap_or_else(|| Prefix::ServerName(nexus.info.name.clone()));
                    let mut args = vec![mode_word.clone()];
                    args.extend(mode_args.iter().cloned());
                    let visible = Message {
                        tags: None,
                        prefix: Some(setter),
                        command: Command::ChannelMODE(channel.clone(), args),
                    };
                    nexus.route(
                        &Target::Channel(folded),
                        &visible,
                        None,
                        Priority::Interactive,
                    );
                    let onward = Message {
                        tags: None,
                        prefix: Some(Prefix::ServerName(source)),
                        command: Command::TMODE(ts, channel, mode_word, mode_args),
                    };
                    nexus.broadcast_links(&onward, Some(from_sid));
                }
                // Newer-TS mode changes lost the merge: drop them.
            }
        }
        Command::TOPIC(channel, text) => {
            let folded = irc_to_lower(&channel);
            if let Some(chan_arc) = nexus.channel(&folded) {
                let setter = nexus
                    .user(&source)
                    .map(|u| u.read().prefix())
                    .unwrap_or_else(|| Prefix::ServerName(source.clone()));
                chan_arc.write().topic = text.clone().filter(|t| !t.is_empty()).map(|t| {
                    crate::state::channel::Topic {
                        text: t,
                        set_by: setter.to_string(),
                        set_at: now(),
                    }
                });
                let visible = Message {
                    tags: None,
                    prefix: Some(setter),
                    command: Command::TOPIC(channel.clone(), text.clone()),
                };
                nexus.route(
                    &Target::Channel(folded),
                    &visible,
                    None,
                    Priority::Interactive,
                );
            }
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::TOPIC(channel, text),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::PRIVMSG(target, text) => {
            relay_remote_message(nexus, from_sid, &source, &target, &text, false).await;
        }
        Command::NOTICE(target, text) => {
            relay_remote_message(nexus, from_sid, &source, &target, &text, true).await;
        }
        Command::UserMODE(target_uid, changes) => {
            if let Some(user) = nexus.user(&target_uid) {
                if let Some(word) = changes.first() {
                    let (parsed, _) = lark_proto::mode::parse_user_modes(word);
                    let mut user = user.write();
                    for (action, mode) in parsed {
                        user.modes.apply(action, mode);
                    }
                }
            }
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::UserMODE(target_uid, changes),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::AWAY(message) => {
            if let Some(user) = nexus.user(&source) {
                let mut user = user.write();
                user.away = message.clone().filter(|m| !m.is_empty());
                user.modes.away = user.away.is_some();
            }
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::AWAY(message),
            };
            nexus.broadcast_links(&onward, Some(from_sid));
        }
        Command::SQUIT(target, comment) => {
            let reason = comment.unwrap_or_else(|| "SQUIT".to_string());
            let linked = nexus
                .topology
                .get(&target)
                .or_else(|| nexus.topology.find_by_name(&target));
            if let Some(linked) = linked {
                if linked.via == *from_sid && nexus.links.contains_key(&linked.sid) {
                    // Our own neighbour is being dropped remotely.
                    crate::s2s::handle_link_loss(nexus, &linked.sid, &reason).await;
                } else {
                    crate::s2s::remove_subtree_and_purge(nexus, &linked.sid, Some(from_sid))
                        .await;
                    let onward = Message {
                        tags: None,
                        prefix: Some(Prefix::ServerName(source)),
                        command: Command::SQUIT(target, Some(reason)),
                    };
                    nexus.broadcast_links(&onward, Some(from_sid));
                }
            }
        }
        Command::ENCAP(target, sub, params) => {
            handle_encap(nexus, &sub, &params).await;
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source)),
                command: Command::ENCAP(target.clone(), sub, params),
            };
            if target == "*" {
                nexus.broadcast_links(&onward, Some(from_sid));
            } else if target != nexus.info.sid {
                nexus.send_toward_sid(&target, &onward);
            }
        }
        other => {
            debug!(sid = %from_sid, command = %other.name(), "ignoring S2S command");
        }
    }
    Ok(())
}

/// An incoming UID introduction, with collision resolution.
async fn handle_uid(nexus: &Arc<Nexus>, from_sid: &str, params: UidParams) {
    let UidParams {
        nick,
        hopcount,
        ts,
        user,
        host,
        uid,
        svcstamp,
        umodes,
        vhost,
        realname,
    } = params.clone();

    if let Some(existing_uid) = nexus.uid_for_nick(&nick) {
        let existing_ts = nexus
            .user(&existing_uid)
            .map(|u| u.read().connected_at)
            .unwrap_or(0);
        match resolve_collision(existing_ts, &existing_uid, ts, &uid) {
            Collision::ExistingWins => {
                info!(nick = %nick, loser = %uid, "nick collision: rejecting incomer");
                broadcast_kill(nexus, &uid, None);
                return;
            }
            Collision::IncomingWins => {
                info!(nick = %nick, loser = %existing_uid, "nick collision: killing local");
                broadcast_kill(nexus, &existing_uid, None);
                nexus
                    .quit_user(&existing_uid, "Nickname collision", true, None)
                    .await;
            }
            Collision::BothDie => {
                info!(nick = %nick, "nick collision: exact tie, killing both");
                broadcast_kill(nexus, &uid, None);
                broadcast_kill(nexus, &existing_uid, None);
                nexus
                    .quit_user(&existing_uid, "Nickname collision", true, None)
                    .await;
                return;
            }
        }
    }

    if !nexus.claim_nick(&nick, &uid) {
        // Lost a race with a local registration; treat as collision loss.
        broadcast_kill(nexus, &uid, None);
        return;
    }
    let server = uid_sid(&uid).to_string();
    nexus.insert_user(User {
        uid: uid.clone(),
        nick: nick.clone(),
        user,
        realname,
        host,
        ip: "0.0.0.0".to_string(),
        visible_host: vhost,
        server,
        session_id: Uuid::nil(),
        channels: HashSet::new(),
        modes: UserModes::from_mode_string(&umodes),
        account: (svcstamp != "0" && !svcstamp.is_empty()).then_some(svcstamp),
        away: None,
        caps: HashSet::new(),
        accept_list: HashSet::new(),
        connected_at: ts,
        last_activity: ts,
    });
    let mask = nexus
        .user(&uid)
        .map(|u| u.read().mask())
        .unwrap_or_default();
    nexus.notify_monitors_online(&nick, &mask);

    // Relay onward, hop incremented.
    let onward = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
        command: Command::UID(UidParams {
            hopcount: hopcount + 1,
            ..params
        }),
    };
    nexus.broadcast_links(&onward, Some(from_sid));
}

/// A KILL for a collision loser, visible to every neighbour.
fn broadcast_kill(nexus: &Nexus, loser_uid: &str, except: Option<&str>) {
    let kill = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
        command: Command::KILL(loser_uid.to_string(), "Nickname collision".to_string()),
    };
    nexus.broadcast_links(&kill, except);
}

/// Remote nick change; collisions use the two users' connect timestamps.
async fn handle_remote_nick(nexus: &Arc<Nexus>, from_sid: &str, uid: &str, new_nick: &str) {
    let Some(user_arc) = nexus.user(uid) else {
        return;
    };
    let (changer_ts, old_prefix, old_nick) = {
        let user = user_arc.read();
        (user.connected_at, user.prefix(), user.nick.clone())
    };

    if let Some(holder_uid) = nexus.uid_for_nick(new_nick) {
        if holder_uid != uid {
            let holder_ts = nexus
                .user(&holder_uid)
                .map(|u| u.read().connected_at)
                .unwrap_or(0);
            match resolve_collision(holder_ts, &holder_uid, changer_ts, uid) {
                Collision::ExistingWins => {
                    broadcast_kill(nexus, uid, None);
                    nexus.quit_user(uid, "Nickname collision", true, None).await;
                    return;
                }
                Collision::IncomingWins => {
                    broadcast_kill(nexus, &holder_uid, None);
                    nexus
                        .quit_user(&holder_uid, "Nickname collision", true, None)
                        .await;
                }
                Collision::BothDie => {
                    broadcast_kill(nexus, uid, None);
                    broadcast_kill(nexus, &holder_uid, None);
                    nexus.quit_user(uid, "Nickname collision", true, None).await;
                    nexus
                        .quit_user(&holder_uid, "Nickname collision", true, None)
                        .await;
                    return;
                }
            }
        }
    }

    if nexus.rename_user(uid, new_nick).is_err() {
        return;
    }
    let notice = Message {
        tags: None,
        prefix: Some(old_prefix),
        command: Command::NICK(new_nick.to_string()),
    };
    nexus.route(
        &Target::ChannelMates(uid.to_string()),
        &notice,
        Some(uid),
        Priority::Interactive,
    );

    nexus.notify_monitors_offline(&old_nick);
    let mask = nexus.user(uid).map(|u| u.read().mask()).unwrap_or_default();
    nexus.notify_monitors_online(new_nick, &mask);

    let onward = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(uid.to_string())),
        command: Command::NICK(new_nick.to_string()),
    };
    nexus.broadcast_links(&onward, Some(from_sid));
}

/// An incoming SJOIN: create or merge, then announce joins locally.
fn handle_sjoin(
    nexus: &Arc<Nexus>,
    _from_sid: &str,
    ts: i64,
    name: &str,
    mode_word: &str,
    mode_args: &[String],
    members: &[(String, String)],
) {
    let folded = irc_to_lower(name);
    let chan_arc = nexus
        .channels
        .entry(folded.clone())
        .or_insert_with(|| Arc::new(RwLock::new(Channel::new(name, ts))))
        .clone();

    let outcome = merge_sjoin(&mut chan_arc.write(), ts, mode_word, mode_args, members);

    for (uid, modes) in &outcome.added {
        if let Some(user) = nexus.user(uid) {
            user.write().channels.insert(folded.clone());
            crate::handlers::helpers::broadcast_join(nexus, &folded, uid, None);
            // Surface retained prefixes as a server MODE.
            let mut word = String::from("+");
            let mut params = Vec::new();
            for (flag, held) in [
                ('q', modes.owner),
                ('a', modes.admin),
                ('o', modes.op),
                ('h', modes.halfop),
                ('v', modes.voice),
            ] {
                if held {
                    word.push(flag);
                    params.push(nexus.nick_of(uid));
                }
            }
            if word.len() > 1 {
                let mut args = vec![word];
                args.extend(params);
                let mode = Message {
                    tags: None,
                    prefix: Some(Prefix::ServerName(nexus.info.name.clone())),
                    command: Command::ChannelMODE(name.to_string(), args),
                };
                nexus.route(
                    &Target::Channel(folded.clone()),
                    &mode,
                    None,
                    Priority::Interactive,
                );
            }
        }
    }
}

/// Deliver a remote PRIVMSG/NOTICE and route it onward.
async fn relay_remote_message(
    nexus: &Arc<Nexus>,
    from_sid: &str,
    source_uid: &str,
    target: &str,
    text: &str,
    is_notice: bool,
) {
    let sender_prefix = nexus
        .user(source_uid)
        .map(|u| u.read().prefix())
        .unwrap_or_else(|| Prefix::ServerName(source_uid.to_string()));

    if target.starts_with('#') || target.starts_with('&') {
        let folded = irc_to_lower(target);
        let command = if is_notice {
            Command::NOTICE(target.to_string(), text.to_string())
        } else {
            Command::PRIVMSG(target.to_string(), text.to_string())
        };
        let visible = Message {
            tags: None,
            prefix: Some(sender_prefix),
            command,
        }
        .with_tag("time", Some(server_time_now()))
        .with_tag("msgid", Some(generate_msgid()));
        nexus.route(
            &Target::Channel(folded),
            &visible,
            Some(source_uid),
            Priority::Interactive,
        );
        let onward = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(source_uid.to_string())),
            command: if is_notice {
                Command::NOTICE(target.to_string(), text.to_string())
            } else {
                Command::PRIVMSG(target.to_string(), text.to_string())
            },
        };
        nexus.broadcast_links(&onward, Some(from_sid));
    } else {
        // UID-addressed: ours or forwarded along the tree.
        let target_sid = uid_sid(target);
        if target_sid == nexus.info.sid {
            let target_nick = nexus.nick_of(target);
            let command = if is_notice {
                Command::NOTICE(target_nick, text.to_string())
            } else {
                Command::PRIVMSG(target_nick, text.to_string())
            };
            let visible = Message {
                tags: None,
                prefix: Some(sender_prefix),
                command,
            }
            .with_tag("time", Some(server_time_now()))
            .with_tag("msgid", Some(generate_msgid()));
            nexus.deliver(target, &visible, Priority::Interactive);
        } else {
            let onward = Message {
                tags: None,
                prefix: Some(Prefix::ServerName(source_uid.to_string())),
                command: if is_notice {
                    Command::NOTICE(target.to_string(), text.to_string())
                } else {
                    Command::PRIVMSG(target.to_string(), text.to_string())
                },
            };
            nexus.send_toward_sid(target_sid, &onward);
        }
    }
}

/// ENCAP subcommands we act on locally.
async fn handle_encap(nexus: &Arc<Nexus>, sub: &str, params: &[String]) {
    match sub.to_ascii_uppercase().as_str() {
        "LOGIN" => {
            if let [uid, account] = params {
                if let Some(user) = nexus.user(uid) {
                    let mut user = user.write();
                    user.account = Some(account.clone());
                    user.modes.registered = true;
                }
            }
        }
        "LOGOUT" => {
            if let Some(uid) = params.first() {
                if let Some(user) = nexus.user(uid) {
                    let mut user = user.write();
                    user.account = None;
                    user.modes.registered = false;
                }
            }
        }
        "CHGHOST" => {
            if let [uid, host] = params {
                if let Some(user) = nexus.user(uid) {
                    user.write().visible_host = host.clone();
                }
            }
        }
        "AKILL" | "KLINE" => {
            if let [kind, pattern, expires, reason] = params {
                let ban_type = match kind.as_str() {
                    "ZLINE" => BanType::ZLine,
                    _ => BanType::GLine,
                };
                let expires_at = expires.parse::<i64>().ok().filter(|&e| e > 0);
                nexus
                    .bans
                    .add(ban_type, pattern, reason, "network", now(), expires_at);
            }
        }
        "CERTFP" | "SASL" => {
            // Accepted for interop; nothing to update locally.
        }
        other => {
            debug!(sub = %other, "ignoring ENCAP subcommand");
        }
    }
}
