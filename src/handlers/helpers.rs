//! Shared handler utilities.

use std::sync::Arc;

use lark_proto::{irc_to_lower, Message, Prefix};
use parking_lot::RwLock;

use crate::handlers::Context;
use crate::replies;
use crate::state::channel::Channel;
use crate::state::Nexus;

/// Unix seconds now.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Generate a batch reference token.
pub fn batch_ref() -> String {
    lark_proto::generate_batch_ref()
}

/// The full `nick!user@host` prefix of a user, if connected.
pub fn prefix_of(nexus: &Nexus, uid: &str) -> Option<Prefix> {
    nexus.user(uid).map(|u| u.read().prefix())
}

/// Truncate a string to at most `max` bytes without splitting a character.
/// Returns true when the string was shortened.
pub fn truncate_chars(s: &mut String, max: usize) -> bool {
    if s.len() <= max {
        return false;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    true
}

/// Split a STATUSMSG-prefixed target (`@#chan`) into its minimum-rank
/// sigil and the bare channel name.
pub fn split_statusmsg(target: &str) -> (Option<char>, &str) {
    match target.chars().next() {
        Some(sigil @ ('~' | '&' | '@' | '%' | '+')) => {
            let rest = &target[sigil.len_utf8()..];
            // `&` alone is also a channel sigil; only treat it as STATUSMSG
            // when a channel name follows.
            if rest.starts_with('#') || rest.starts_with('&') {
                (Some(sigil), rest)
            } else {
                (None, target)
            }
        }
        _ => (None, target),
    }
}

/// Send RPL_TOPIC/RPL_TOPICWHOTIME (or RPL_NOTOPIC) for a channel.
pub fn send_topic_numerics(ctx: &mut Context<'_>, chan: &Arc<RwLock<Channel>>) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let (name, topic) = {
        let chan = chan.read();
        (chan.name.clone(), chan.topic.clone())
    };
    match topic {
        Some(topic) => {
            ctx.send(replies::topic(&server, &nick, &name, &topic.text));
            ctx.send(replies::topicwhotime(
                &server, &nick, &name, &topic.set_by, topic.set_at,
            ));
        }
        None => ctx.send(replies::notopic(&server, &nick, &name)),
    }
}

/// Send the RPL_NAMREPLY burst plus RPL_ENDOFNAMES for a channel.
///
/// Honors multi-prefix and userhost-in-names, and conceals +D-hidden
/// members (they are only listed to themselves).
pub fn send_names(ctx: &mut Context<'_>, chan: &Arc<RwLock<Channel>>) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let multi_prefix = ctx.session.has_cap("multi-prefix");
    let userhost = ctx.session.has_cap("userhost-in-names");
    let viewer = ctx.uid().to_string();

    let (name, entries) = {
        let chan = chan.read();
        let mut entries: Vec<(String, String)> = Vec::new();
        for (uid, modes) in chan.members.iter() {
            if chan.hidden.contains(uid) && *uid != viewer {
                continue;
            }
            let prefixes = if multi_prefix {
                modes.prefix_string()
            } else {
                modes.highest_prefix().map(String::from).unwrap_or_default()
            };
            entries.push((prefixes, uid.clone()));
        }
        (chan.name.clone(), entries)
    };

    let mut names: Vec<String> = Vec::new();
    for (prefixes, uid) in entries {
        if let Some(user) = ctx.nexus.user(&uid) {
            let user = user.read();
            let shown = if userhost {
                user.mask()
            } else {
                user.nick.clone()
            };
            names.push(format!("{prefixes}{shown}"));
        }
    }

    // 512-byte frames: chunk conservatively.
    for chunk in names.chunks(12) {
        ctx.send(replies::namreply(&server, &nick, &name, &chunk.join(" ")));
    }
    ctx.send(replies::endofnames(&server, &nick, &name));
}

/// Fetch (nick, mask, account) for the extended-join payload.
pub fn join_identity(nexus: &Nexus, uid: &str) -> Option<(Prefix, String, String)> {
    let user = nexus.user(uid)?;
    let user = user.read();
    Some((
        user.prefix(),
        user.account.clone().unwrap_or_else(|| "*".to_string()),
        user.realname.clone(),
    ))
}

/// Announce a JOIN to channel members, splitting on extended-join.
///
/// `only_to` restricts delivery to a single member (used when revealing
/// +D-hidden users or replaying to the joiner).
pub fn broadcast_join(
    nexus: &Nexus,
    chan_folded: &str,
    joiner: &str,
    only_to: Option<&str>,
) {
    let Some((prefix, account, realname)) = join_identity(nexus, joiner) else {
        return;
    };
    let Some(chan) = nexus.channel(chan_folded) else {
        return;
    };
    let (display_name, recipients): (String, Vec<String>) = {
        let chan = chan.read();
        let recipients = match only_to {
            Some(uid) => vec![uid.to_string()],
            None => chan.members.keys().cloned().collect(),
        };
        (chan.name.clone(), recipients)
    };

    let plain = Message {
        tags: None,
        prefix: Some(prefix.clone()),
        command: lark_proto::Command::JOIN(display_name.clone(), None),
    };
    let extended = Message {
        tags: None,
        prefix: Some(prefix),
        command: lark_proto::Command::Raw(
            "JOIN".to_string(),
            vec![display_name, account, realname],
        ),
    };

    for uid in recipients {
        let wants_extended = nexus
            .user(&uid)
            .map(|u| u.read().has_cap("extended-join"))
            .unwrap_or(false);
        let msg = if wants_extended { &extended } else { &plain };
        nexus.deliver(&uid, msg, crate::broker::Priority::Interactive);
    }
}

/// Reveal a +D-hidden member to the channel, replaying their JOIN.
pub fn reveal_hidden(nexus: &Nexus, chan_folded: &str, uid: &str) {
    let Some(chan) = nexus.channel(chan_folded) else {
        return;
    };
    let was_hidden = chan.write().reveal(uid);
    if !was_hidden {
        return;
    }
    let members: Vec<String> = chan
        .read()
        .members
        .keys()
        .filter(|m| m.as_str() != uid)
        .cloned()
        .collect();
    for member in members {
        broadcast_join(nexus, chan_folded, uid, Some(&member));
    }
}

/// Resolve comma-separated channel names to their folded forms.
pub fn split_channel_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter(|name| !name.is_empty())
        .map(|name| (name.to_string(), irc_to_lower(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statusmsg_split() {
        assert_eq!(split_statusmsg("@#chan"), (Some('@'), "#chan"));
        assert_eq!(split_statusmsg("+#chan"), (Some('+'), "#chan"));
        assert_eq!(split_statusmsg("#chan"), (None, "#chan"));
        // A bare &-channel is a channel, not a STATUSMSG target.
        assert_eq!(split_statusmsg("&ops"), (None, "&ops"));
        // ...but &#chan addresses admins of #chan.
        assert_eq!(split_statusmsg("&#chan"), (Some('&'), "#chan"));
        assert_eq!(split_statusmsg("alice"), (None, "alice"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut s = "abcdef".to_string();
        assert!(!truncate_chars(&mut s, 10));
        assert_eq!(s, "abcdef");
        assert!(truncate_chars(&mut s, 4));
        assert_eq!(s, "abcd");

        // 'é' is two bytes; cutting inside it backs off to the boundary.
        let mut s = "ab\u{e9}cd".to_string();
        assert!(truncate_chars(&mut s, 3));
        assert_eq!(s, "ab");
    }

    #[test]
    fn channel_list_folds() {
        let list = split_channel_list("#One,#two,,#Three");
        assert_eq!(
            list,
            vec![
                ("#One".to_string(), "#one".to_string()),
                ("#two".to_string(), "#two".to_string()),
                ("#Three".to_string(), "#three".to_string()),
            ]
        );
    }
}
