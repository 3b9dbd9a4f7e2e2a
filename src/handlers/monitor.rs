//! MONITOR (IRCv3): watch nicknames for online/offline transitions.

use async_trait::async_trait;
use lark_proto::{Command, Message};

use crate::error::HandlerResult;
use crate::handlers::{Context, Handler};
use crate::replies;
use crate::state::monitor::MONITOR_LIMIT;

pub struct MonitorHandler;

#[async_trait]
impl Handler for MonitorHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::MONITOR(ref sub, ref targets) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let uid = ctx.uid().to_string();

        let target_list = |targets: &Option<String>| -> Vec<String> {
            targets
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        };

        match sub.to_ascii_uppercase().as_str() {
            "+" => {
                let wanted = target_list(targets);
                let (accepted, rejected) = ctx.nexus.monitors.add(&uid, &wanted);

                // Immediate status for newly-added targets.
                let mut online = Vec::new();
                let mut offline = Vec::new();
                for target in &accepted {
                    match ctx.nexus.uid_for_nick(target) {
                        Some(target_uid) => {
                            if let Some(user) = ctx.nexus.user(&target_uid) {
                                online.push(user.read().mask());
                            }
                        }
                        None => offline.push(target.clone()),
                    }
                }
                if !online.is_empty() {
                    ctx.send(replies::mononline(&server, &nick, &online.join(",")));
                }
                if !offline.is_empty() {
                    ctx.send(replies::monoffline(&server, &nick, &offline.join(",")));
                }
                if !rejected.is_empty() {
                    ctx.send(replies::monlistfull(
                        &server,
                        &nick,
                        MONITOR_LIMIT,
                        &rejected.join(","),
                    ));
                }
            }
            "-" => {
                ctx.nexus.monitors.remove(&uid, &target_list(targets));
            }
            "C" => {
                ctx.nexus.monitors.clear(&uid);
            }
            "L" => {
                let list = ctx.nexus.monitors.list(&uid);
                for chunk in list.chunks(20) {
                    ctx.send(replies::monlist(&server, &nick, &chunk.join(",")));
                }
                ctx.send(replies::endofmonlist(&server, &nick));
            }
            "S" => {
                let mut online = Vec::new();
                let mut offline = Vec::new();
                for target in ctx.nexus.monitors.list(&uid) {
                    match ctx.nexus.uid_for_nick(&target) {
                        Some(target_uid) => {
                            if let Some(user) = ctx.nexus.user(&target_uid) {
                                online.push(user.read().mask());
                            }
                        }
                        None => offline.push(target),
                    }
                }
                if !online.is_empty() {
                    ctx.send(replies::mononline(&server, &nick, &online.join(",")));
                }
                if !offline.is_empty() {
                    ctx.send(replies::monoffline(&server, &nick, &offline.join(",")));
                }
            }
            other => {
                let reply = replies::fail(
                    &server,
                    "MONITOR",
                    "INVALID_SUBCOMMAND",
                    &[other],
                    "Expected +, -, C, L, or S",
                );
                ctx.send(reply);
            }
        }
        Ok(())
    }
}
