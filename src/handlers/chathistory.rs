//! CHATHISTORY (draft): batched replay from the history store.

use async_trait::async_trait;
use lark_proto::{irc_to_lower, parse_server_time, Command, Message, Prefix};

use crate::broker::Priority;
use crate::error::HandlerResult;
use crate::handlers::helpers::batch_ref;
use crate::handlers::{Context, Handler};
use crate::repo::{HistoryAnchor, HistorySelector, StoredMessage};
use crate::replies;

/// Upper bound on messages per CHATHISTORY response.
const MAX_HISTORY_LIMIT: usize = 100;

pub struct ChatHistoryHandler;

#[async_trait]
impl Handler for ChatHistoryHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::CHATHISTORY(ref sub, ref params) = msg.command else {
            return Ok(());
        };
        let server = ctx.server_name().to_string();
        let sub = sub.to_ascii_uppercase();

        let Some(target) = params.first().cloned() else {
            let reply = replies::fail(
                &server,
                "CHATHISTORY",
                "NEED_MORE_PARAMS",
                &[sub.as_str()],
                "Missing target",
            );
            ctx.send(reply);
            return Ok(());
        };

        // Channels key on their folded name; direct conversations on the
        // sorted nick pair.
        let nick = ctx.nick();
        let key = if target.starts_with('#') || target.starts_with('&') {
            irc_to_lower(&target)
        } else {
            let mut pair = [irc_to_lower(&nick), irc_to_lower(&target)];
            pair.sort();
            pair.join(",")
        };

        let limit = params
            .last()
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(50)
            .min(MAX_HISTORY_LIMIT);

        let selector = match sub.as_str() {
            "LATEST" => Some(HistorySelector::Latest),
            "BEFORE" => parse_anchor(params.get(1)).map(HistorySelector::Before),
            "AFTER" => parse_anchor(params.get(1)).map(HistorySelector::After),
            "AROUND" => parse_anchor(params.get(1)).map(HistorySelector::Around),
            "BETWEEN" => match (parse_anchor(params.get(1)), parse_anchor(params.get(2))) {
                (Some(from), Some(to)) => Some(HistorySelector::Between(from, to)),
                _ => None,
            },
            _ => {
                let reply = replies::fail(
                    &server,
                    "CHATHISTORY",
                    "INVALID_PARAMS",
                    &[sub.as_str()],
                    "Unknown subcommand",
                );
                ctx.send(reply);
                return Ok(());
            }
        };
        let Some(selector) = selector else {
            let reply = replies::fail(
                &server,
                "CHATHISTORY",
                "INVALID_PARAMS",
                &[sub.as_str()],
                "Bad or missing selector",
            );
            ctx.send(reply);
            return Ok(());
        };

        let messages = ctx.nexus.repos.history.query(&key, selector, limit).await;
        send_batch(ctx, &target, &messages);
        Ok(())
    }
}

/// `timestamp=...` or `msgid=...` selector arguments; `*` for LATEST-style
/// open bounds.
fn parse_anchor(param: Option<&String>) -> Option<HistoryAnchor> {
    let param = param?;
    if let Some(ts) = param.strip_prefix("timestamp=") {
        return parse_server_time(ts).map(|dt| HistoryAnchor::Timestamp(dt.timestamp_millis()));
    }
    if let Some(id) = param.strip_prefix("msgid=") {
        return Some(HistoryAnchor::Msgid(id.to_string()));
    }
    None
}

fn send_batch(ctx: &mut Context<'_>, target: &str, messages: &[StoredMessage]) {
    let server = ctx.server_name().to_string();
    let reference = batch_ref();
    let batching = ctx.session.has_cap("batch");

    if batching {
        let open = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(server.clone())),
            command: Command::BATCH(
                format!("+{reference}"),
                vec!["chathistory".to_string(), target.to_string()],
            ),
        };
        ctx.send(open);
    }

    let uid = ctx.uid().to_string();
    for stored in messages {
        let time = chrono::DateTime::from_timestamp_millis(stored.ts_millis)
            .map(lark_proto::format_server_time)
            .unwrap_or_else(lark_proto::server_time_now);
        let command = match stored.command.as_str() {
            "NOTICE" => Command::NOTICE(target.to_string(), stored.text.clone()),
            _ => Command::PRIVMSG(target.to_string(), stored.text.clone()),
        };
        let mut replay = Message {
            tags: None,
            prefix: Some(Prefix::new_from_str(&stored.source)),
            command,
        }
        .with_tag("time", Some(time))
        .with_tag("msgid", Some(stored.msgid.clone()));
        if batching {
            replay = replay.with_tag("batch", Some(reference.clone()));
        }
        if let Some(ref account) = stored.account {
            replay = replay.with_tag("account", Some(account.clone()));
        }
        // Replay is droppable under pressure.
        ctx.nexus.deliver(&uid, &replay, Priority::Background);
    }

    if batching {
        let close = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(server)),
            command: Command::BATCH(format!("-{reference}"), vec![]),
        };
        ctx.send(close);
    }
}
