//! Burst generation.
//!
//! After the handshake, each side describes its view of the network in
//! order: network-wide bans, every other known server, every user, every
//! non-empty channel (with topic), then the end-of-burst marker. Ordering
//! matters: servers precede their users, users precede the channels that
//! reference them.

use lark_proto::{Command, Message, Prefix, UidParams};

use crate::handlers::helpers::now;
use crate::state::{BanType, Nexus};

/// Build the complete burst for a new peer.
pub fn generate_burst(nexus: &Nexus) -> Vec<Message> {
    let local_sid = nexus.info.sid.clone();
    let from_server = |command: Command| Message {
        tags: None,
        prefix: Some(Prefix::ServerName(local_sid.clone())),
        command,
    };
    let mut burst = Vec::new();

    // 0. Network-wide bans, before any user can race them.
    for ban in nexus.bans.snapshot(now()) {
        if matches!(ban.ban_type, BanType::GLine | BanType::ZLine) {
            burst.push(from_server(Command::ENCAP(
                "*".to_string(),
                "AKILL".to_string(),
                vec![
                    if ban.ban_type == BanType::GLine { "GLINE" } else { "ZLINE" }.to_string(),
                    ban.pattern.clone(),
                    ban.expires_at.unwrap_or(0).to_string(),
                    ban.reason.clone(),
                ],
            )));
        }
    }

    // 1. Every other server we know, hop incremented.
    for server in nexus.topology.snapshot() {
        burst.push(from_server(Command::SID(
            server.name.clone(),
            server.hopcount + 1,
            server.sid.clone(),
            server.description.clone(),
        )));
    }

    // 2. Every user. Locals at hop 1; remote users relay at their hop + 1.
    for entry in nexus.users.iter() {
        let user = entry.value().read();
        let local = user.is_local_to(&nexus.info.sid);
        let hopcount = if local {
            1
        } else {
            nexus
                .topology
                .get(&user.server)
                .map(|s| s.hopcount + 1)
                .unwrap_or(2)
        };
        burst.push(from_server(Command::UID(UidParams {
            nick: user.nick.clone(),
            hopcount,
            ts: user.connected_at,
            user: user.user.clone(),
            host: user.host.clone(),
            uid: user.uid.clone(),
            svcstamp: "0".to_string(),
            umodes: user.modes.as_mode_string(),
            vhost: user.visible_host.clone(),
            realname: user.realname.clone(),
        })));
        if let Some(ref account) = user.account {
            burst.push(from_server(Command::ENCAP(
                "*".to_string(),
                "LOGIN".to_string(),
                vec![user.uid.clone(), account.clone()],
            )));
        }
    }

    // 3. Every non-empty channel, then its topic.
    for entry in nexus.channels.iter() {
        let chan = entry.value().read();
        if chan.members.is_empty() {
            continue;
        }
        let summary = chan.modes.summary(true);
        let (mode_word, mode_args) = summary.split_first().expect("summary has a mode word");
        let members: Vec<(String, String)> = chan
            .members
            .iter()
            .map(|(uid, modes)| (modes.prefix_string(), uid.clone()))
            .collect();
        burst.push(from_server(Command::SJOIN(
            chan.created_at,
            chan.name.clone(),
            mode_word.clone(),
            mode_args.to_vec(),
            members,
        )));
        if let Some(ref topic) = chan.topic {
            burst.push(Message {
                tags: None,
                prefix: Some(Prefix::ServerName(local_sid.clone())),
                command: Command::TOPIC(chan.name.clone(), Some(topic.text.clone())),
            });
        }
    }

    // 4. Done.
    burst.push(from_server(Command::EOB));
    burst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::repo::Repositories;
    use crate::state::channel::{Channel, MemberModes};
    use crate::state::user::{User, UserModes};
    use parking_lot::RwLock;
    use std::collections::HashSet;
    use std::sync::Arc;
    use uuid::Uuid;

    fn nexus_with_state() -> Arc<Nexus> {
        let config: Config = toml::from_str(
            r#"
[server]
name = "irc.lark.test"
sid = "001"
network = "LarkNet"

[listen]
addr = "127.0.0.1:0"
"#,
        )
        .unwrap();
        let (nexus, _rx) = Nexus::new(&config, Repositories::in_memory());

        let uid = "001AAAAAA".to_string();
        nexus.claim_nick("alice", &uid);
        nexus.insert_user(User {
            uid: uid.clone(),
            nick: "alice".into(),
            user: "a".into(),
            realname: "Alice".into(),
            host: "h".into(),
            ip: "127.0.0.1".into(),
            visible_host: "vh".into(),
            server: "001".into(),
            session_id: Uuid::new_v4(),
            channels: HashSet::from(["#room".to_string()]),
            modes: UserModes {
                invisible: true,
                ..Default::default()
            },
            account: None,
            away: None,
            caps: HashSet::new(),
            accept_list: HashSet::new(),
            connected_at: 1234,
            last_activity: 1234,
        });

        let mut chan = Channel::new("#room", 1000);
        chan.modes.no_external = true;
        chan.modes.topic_lock = true;
        chan.add_member(&uid, MemberModes::op());
        chan.topic = Some(crate::state::channel::Topic {
            text: "hello".into(),
            set_by: "alice".into(),
            set_at: 1001,
        });
        nexus.channels.insert("#room".into(), Arc::new(RwLock::new(chan)));
        nexus
    }

    #[test]
    fn burst_order_uid_then_sjoin_then_eob() {
        let nexus = nexus_with_state();
        let burst = generate_burst(&nexus);

        let uid_pos = burst
            .iter()
            .position(|m| matches!(m.command, Command::UID(_)))
            .expect("UID in burst");
        let sjoin_pos = burst
            .iter()
            .position(|m| matches!(m.command, Command::SJOIN(..)))
            .expect("SJOIN in burst");
        let topic_pos = burst
            .iter()
            .position(|m| matches!(m.command, Command::TOPIC(..)))
            .expect("TOPIC in burst");
        assert!(uid_pos < sjoin_pos);
        assert!(sjoin_pos < topic_pos);
        assert!(matches!(
            burst.last().map(|m| &m.command),
            Some(Command::EOB)
        ));
    }

    #[test]
    fn burst_uid_carries_ts_and_modes() {
        let nexus = nexus_with_state();
        let burst = generate_burst(&nexus);
        let uid = burst
            .iter()
            .find_map(|m| match &m.command {
                Command::UID(p) => Some(p.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(uid.ts, 1234);
        assert_eq!(uid.uid, "001AAAAAA");
        assert_eq!(uid.umodes, "+i");
        assert_eq!(uid.hopcount, 1);
    }

    #[test]
    fn burst_sjoin_carries_prefixes_and_modes() {
        let nexus = nexus_with_state();
        let burst = generate_burst(&nexus);
        let (ts, name, word, _args, members) = burst
            .iter()
            .find_map(|m| match &m.command {
                Command::SJOIN(ts, n, w, a, mem) => {
                    Some((*ts, n.clone(), w.clone(), a.clone(), mem.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(ts, 1000);
        assert_eq!(name, "#room");
        assert!(word.contains('n') && word.contains('t'));
        assert_eq!(members, vec![("@".to_string(), "001AAAAAA".to_string())]);
    }
}
