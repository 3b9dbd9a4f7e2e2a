//! User status: AWAY, SETNAME, ACCEPT (caller-id list).

use async_trait::async_trait;
use lark_proto::{irc_to_lower, Command, Message};

use crate::broker::Target;
use crate::error::HandlerResult;
use crate::handlers::helpers::prefix_of;
use crate::handlers::{Context, Handler};
use crate::replies;

pub struct AwayHandler;

#[async_trait]
impl Handler for AwayHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::AWAY(ref message) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();

        let mut message = message.clone().filter(|m| !m.is_empty());
        if let Some(ref mut m) = message {
            // Over-length messages are kept, shortened, with a soft warning.
            if crate::handlers::helpers::truncate_chars(m, ctx.nexus.limits.away_len) {
                ctx.send(replies::warn(
                    &server,
                    "AWAY",
                    "MESSAGE_TRUNCATED",
                    &[],
                    "Away message truncated to the server limit",
                ));
            }
        }

        let Some(user_arc) = ctx.nexus.user(&uid) else {
            return Ok(());
        };
        {
            // The +a flag and the away message move together.
            let mut user = user_arc.write();
            user.away = message.clone();
            user.modes.away = message.is_some();
        }

        match message.clone() {
            Some(_) => ctx.send(replies::nowaway(&server, &nick)),
            None => ctx.send(replies::unaway(&server, &nick)),
        }

        // away-notify fan-out to channel-mates holding the cap.
        let notice = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, &uid),
            command: Command::AWAY(message),
        };
        ctx.nexus.route_with_cap(
            &Target::ChannelMates(uid.clone()),
            &notice,
            Some(&uid),
            "away-notify",
        );

        // Peers track away state for WHOIS.
        let s2s = Message {
            tags: None,
            prefix: Some(lark_proto::Prefix::ServerName(uid)),
            command: notice.command.clone(),
        };
        ctx.nexus.broadcast_links(&s2s, None);
        Ok(())
    }
}

pub struct SetnameHandler;

#[async_trait]
impl Handler for SetnameHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::SETNAME(ref realname) = msg.command else {
            return Ok(());
        };
        let uid = ctx.uid().to_string();
        let realname = realname.clone();

        let Some(user_arc) = ctx.nexus.user(&uid) else {
            return Ok(());
        };
        user_arc.write().realname = realname.clone();

        let notice = Message {
            tags: None,
            prefix: prefix_of(ctx.nexus, &uid),
            command: Command::SETNAME(realname),
        };
        // Channel-mates with the cap, plus the requester as acknowledgment.
        ctx.nexus.route_with_cap(
            &Target::ChannelMates(uid.clone()),
            &notice,
            Some(&uid),
            "setname",
        );
        ctx.send(notice);
        Ok(())
    }
}

pub struct AcceptHandler;

#[async_trait]
impl Handler for AcceptHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::ACCEPT(ref arg) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();

        let Some(user_arc) = ctx.nexus.user(&uid) else {
            return Ok(());
        };

        let Some(arg) = arg.clone().filter(|a| a != "*") else {
            // Bare ACCEPT (or ACCEPT *) lists the current entries.
            let entries: Vec<String> = {
                let user = user_arc.read();
                user.accept_list.iter().cloned().collect()
            };
            for entry in entries {
                ctx.send(replies::acceptlist_entry(&server, &nick, &entry));
            }
            ctx.send(replies::endofaccept(&server, &nick));
            return Ok(());
        };

        for token in arg.split(',').filter(|t| !t.is_empty()) {
            match token.strip_prefix('-') {
                Some(removal) => {
                    user_arc.write().accept_list.remove(&irc_to_lower(removal));
                }
                None => {
                    if ctx.nexus.uid_for_nick(token).is_none() {
                        ctx.send(replies::nosuchnick(&server, &nick, token));
                        continue;
                    }
                    user_arc.write().accept_list.insert(irc_to_lower(token));
                }
            }
        }
        Ok(())
    }
}
