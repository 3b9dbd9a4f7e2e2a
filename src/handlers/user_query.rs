//! User queries: WHO, WHOIS, WHOWAS, ISON, USERHOST.

use async_trait::async_trait;
use lark_proto::{irc_eq, wildcard_match, Command, Message};

use crate::error::HandlerResult;
use crate::handlers::helpers::now;
use crate::handlers::{Context, Handler};
use crate::replies;

pub struct WhoHandler;

struct WhoRow {
    channel: String,
    user: String,
    visible_host: String,
    ip: String,
    server: String,
    nick: String,
    away: bool,
    oper: bool,
    prefixes: String,
    realname: String,
    account: Option<String>,
}

#[async_trait]
impl Handler for WhoHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::WHO(ref mask, ref fields) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let mask = mask.clone().unwrap_or_else(|| "*".to_string());

        // WHOX: `%fields[,token]`.
        let whox = fields.as_deref().and_then(|f| f.strip_prefix('%')).map(|f| {
            match f.split_once(',') {
                Some((fields, token)) => (fields.to_string(), Some(token.to_string())),
                None => (f.to_string(), None),
            }
        });

        let rows = collect_rows(ctx, &mask);
        for row in rows {
            match whox {
                Some((ref fields, ref token)) => {
                    let out = whox_fields(&row, fields, token.as_deref());
                    ctx.send(replies::whospcrpl(&server, &nick, out));
                }
                None => {
                    let mut flags = String::from(if row.away { "G" } else { "H" });
                    if row.oper {
                        flags.push('*');
                    }
                    flags.push_str(&row.prefixes);
                    ctx.send(replies::whoreply(
                        &server,
                        &nick,
                        &row.channel,
                        &row.user,
                        &row.visible_host,
                        &row.server,
                        &row.nick,
                        &flags,
                        0,
                        &row.realname,
                    ));
                }
            }
        }
        ctx.send(replies::endofwho(&server, &nick, &mask));
        Ok(())
    }
}

fn collect_rows(ctx: &Context<'_>, mask: &str) -> Vec<WhoRow> {
    let nexus = ctx.nexus;
    let mut rows = Vec::new();

    if mask.starts_with('#') || mask.starts_with('&') {
        let Some(chan_arc) = nexus.channel(mask) else {
            return rows;
        };
        let chan = chan_arc.read();
        let viewer = ctx.uid();
        for (uid, modes) in chan.members.iter() {
            if chan.hidden.contains(uid) && uid != viewer {
                continue;
            }
            if let Some(user) = nexus.user(uid) {
                let user = user.read();
                rows.push(WhoRow {
                    channel: chan.name.clone(),
                    user: user.user.clone(),
                    visible_host: user.visible_host.clone(),
                    ip: user.ip.clone(),
                    server: nexus.info.name.clone(),
                    nick: user.nick.clone(),
                    away: user.away.is_some(),
                    oper: user.modes.oper,
                    prefixes: modes.prefix_string(),
                    realname: user.realname.clone(),
                    account: user.account.clone(),
                });
            }
        }
    } else {
        for entry in nexus.users.iter() {
            let user = entry.value().read();
            // Invisible users only match themselves unless the mask is exact.
            if user.modes.invisible
                && entry.key() != ctx.uid()
                && !irc_eq(mask, &user.nick)
            {
                continue;
            }
            let matched = wildcard_match(mask, &user.nick)
                || wildcard_match(mask, &user.visible_host)
                || wildcard_match(mask, &user.realname);
            if !matched {
                continue;
            }
            rows.push(WhoRow {
                channel: "*".to_string(),
                user: user.user.clone(),
                visible_host: user.visible_host.clone(),
                ip: user.ip.clone(),
                server: nexus.info.name.clone(),
                nick: user.nick.clone(),
                away: user.away.is_some(),
                oper: user.modes.oper,
                prefixes: String::new(),
                realname: user.realname.clone(),
                account: user.account.clone(),
            });
        }
    }
    rows
}

/// Assemble WHOX output columns in canonical field order (`tcuihsnfdlaor`).
fn whox_fields(row: &WhoRow, fields: &str, token: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    for field in "tcuihsnfdlaor".chars() {
        if !fields.contains(field) {
            continue;
        }
        match field {
            't' => out.push(token.unwrap_or("0").to_string()),
            'c' => out.push(row.channel.clone()),
            'u' => out.push(row.user.clone()),
            'i' => out.push(row.ip.clone()),
            'h' => out.push(row.visible_host.clone()),
            's' => out.push(row.server.clone()),
            'n' => out.push(row.nick.clone()),
            'f' => {
                let mut flags = String::from(if row.away { "G" } else { "H" });
                if row.oper {
                    flags.push('*');
                }
                flags.push_str(&row.prefixes);
                out.push(flags);
            }
            'd' => out.push("0".to_string()),
            'l' => out.push("0".to_string()),
            'a' => out.push(row.account.clone().unwrap_or_else(|| "0".to_string())),
            'o' => out.push(
                row.prefixes
                    .chars()
                    .next()
                    .map(String::from)
                    .unwrap_or_else(|| "n/a".to_string()),
            ),
            'r' => out.push(row.realname.clone()),
            _ => {}
        }
    }
    out
}

pub struct WhoisHandler;

#[async_trait]
impl Handler for WhoisHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::WHOIS(ref first, ref second) = msg.command else {
            return Ok(());
        };
        // `WHOIS server mask` addresses a remote server; we answer locally.
        let mask = second.clone().unwrap_or_else(|| first.clone());
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let Some(target_uid) = ctx.nexus.uid_for_nick(&mask) else {
            ctx.send(replies::nosuchnick(&server, &nick, &mask));
            ctx.send(replies::endofwhois(&server, &nick, &mask));
            return Ok(());
        };
        let Some(user_arc) = ctx.nexus.user(&target_uid) else {
            ctx.send(replies::nosuchnick(&server, &nick, &mask));
            ctx.send(replies::endofwhois(&server, &nick, &mask));
            return Ok(());
        };

        let user = user_arc.read();
        let target = user.nick.clone();
        ctx.send(replies::whoisuser(
            &server,
            &nick,
            &target,
            &user.user,
            &user.visible_host,
            &user.realname,
        ));

        // Channel list, concealing secret channels from outsiders.
        let mut channel_entries: Vec<String> = Vec::new();
        for folded in &user.channels {
            if let Some(chan) = ctx.nexus.channel(folded) {
                let chan = chan.read();
                let viewer_in = chan.members.contains_key(ctx.uid());
                if (chan.modes.secret || chan.modes.private) && !viewer_in {
                    continue;
                }
                if chan.hidden.contains(&target_uid) {
                    continue;
                }
                let prefix = chan
                    .member(&target_uid)
                    .and_then(|m| m.highest_prefix())
                    .map(String::from)
                    .unwrap_or_default();
                channel_entries.push(format!("{prefix}{}", chan.name));
            }
        }
        if !channel_entries.is_empty() {
            ctx.send(replies::whoischannels(
                &server,
                &nick,
                &target,
                &channel_entries.join(" "),
            ));
        }

        let description = ctx.nexus.hot.read().description.clone();
        ctx.send(replies::whoisserver(&server, &nick, &target, &server, &description));

        if user.modes.oper {
            ctx.send(replies::whoisoperator(&server, &nick, &target));
        }
        if user.modes.secure {
            ctx.send(replies::whoissecure(&server, &nick, &target));
        }
        if let Some(ref account) = user.account {
            ctx.send(replies::whoisaccount(&server, &nick, &target, account));
        }
        if let Some(ref away) = user.away {
            ctx.send(replies::away(&server, &nick, &target, away));
        }
        // Operators see through the cloak.
        if ctx.is_oper() {
            ctx.send(replies::whoishost(&server, &nick, &target, &user.host, &user.ip));
            ctx.send(replies::whoisactually(&server, &nick, &target, &user.ip));
        }
        let idle = (now() - user.last_activity).max(0);
        if ctx.nexus.is_local_uid(&target_uid) {
            ctx.send(replies::whoisidle(&server, &nick, &target, idle, user.connected_at));
        }
        drop(user);

        ctx.send(replies::endofwhois(&server, &nick, &mask));
        Ok(())
    }
}

pub struct WhowasHandler;

#[async_trait]
impl Handler for WhowasHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::WHOWAS(ref target, ref count) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let limit = count
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(usize::MAX);

        let entries = ctx.nexus.whowas_of(target);
        if entries.is_empty() {
            ctx.send(replies::wasnosuchnick(&server, &nick, target));
        } else {
            for entry in entries.iter().take(limit) {
                ctx.send(replies::whowasuser(
                    &server,
                    &nick,
                    &entry.nick,
                    &entry.user,
                    &entry.host,
                    &entry.realname,
                ));
            }
        }
        ctx.send(replies::endofwhowas(&server, &nick, target));
        Ok(())
    }
}

pub struct IsonHandler;

#[async_trait]
impl Handler for IsonHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::ISON(ref nicks) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let online: Vec<String> = nicks
            .iter()
            .flat_map(|n| n.split_whitespace())
            .filter_map(|n| {
                let uid = ctx.nexus.uid_for_nick(n)?;
                ctx.nexus.user(&uid).map(|u| u.read().nick.clone())
            })
            .collect();
        ctx.send(replies::ison_reply(&server, &nick, &online.join(" ")));
        Ok(())
    }
}

pub struct UserhostHandler;

#[async_trait]
impl Handler for UserhostHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::USERHOST(ref nicks) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        let entries: Vec<String> = nicks
            .iter()
            .take(5)
            .filter_map(|n| {
                let uid = ctx.nexus.uid_for_nick(n)?;
                let user = ctx.nexus.user(&uid)?;
                let user = user.read();
                let oper = if user.modes.oper { "*" } else { "" };
                let away = if user.away.is_some() { "-" } else { "+" };
                Some(format!(
                    "{}{}={}{}@{}",
                    user.nick, oper, away, user.user, user.visible_host
                ))
            })
            .collect();
        ctx.send(replies::userhost_reply(&server, &nick, &entries.join(" ")));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whox_field_order_is_canonical() {
        let row = WhoRow {
            channel: "#c".into(),
            user: "u".into(),
            visible_host: "vh".into(),
            ip: "127.0.0.1".into(),
            server: "srv".into(),
            nick: "n".into(),
            away: false,
            oper: true,
            prefixes: "@".into(),
            realname: "Real Name".into(),
            account: None,
        };
        // Request out of order; output follows canonical order with the
        // token first.
        let fields = whox_fields(&row, "nurct", Some("42"));
        assert_eq!(fields, vec!["42", "#c", "u", "n", "Real Name"]);
    }
}
