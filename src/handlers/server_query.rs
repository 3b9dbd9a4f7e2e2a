//! Server queries: MOTD, LUSERS, VERSION, STATS, LINKS, TIME, TRACE,
//! ADMIN, INFO.

use async_trait::async_trait;
use lark_proto::{Command, Message};

use crate::error::HandlerResult;
use crate::handlers::helpers::now;
use crate::handlers::{Context, Handler};
use crate::replies;
use crate::state::BanType;
use crate::VERSION;

/// MOTD burst, shared with registration.
pub fn send_motd(ctx: &mut Context<'_>) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let lines = ctx.nexus.hot.read().motd_lines.clone();
    if lines.is_empty() {
        ctx.send(replies::nomotd(&server, &nick));
        return;
    }
    ctx.send(replies::motdstart(&server, &nick));
    for line in lines {
        ctx.send(replies::motd_line(&server, &nick, &line));
    }
    ctx.send(replies::endofmotd(&server, &nick));
}

/// LUSERS burst, shared with registration.
pub fn send_lusers(ctx: &mut Context<'_>) {
    let nick = ctx.nick();
    let server = ctx.server_name().to_string();
    let nexus = ctx.nexus;

    let visible = nexus.visible_user_count();
    let global = nexus.global_user_count();
    let invisible = global - visible;
    let local = nexus.local_user_count();
    let servers = nexus.topology.snapshot().len() + 1;
    let opers = nexus.oper_count();
    let channels = nexus.channel_count();

    ctx.send(replies::luserclient(&server, &nick, visible, invisible, servers));
    ctx.send(replies::luserop(&server, &nick, opers));
    ctx.send(replies::luserunknown(&server, &nick, 0));
    ctx.send(replies::luserchannels(&server, &nick, channels));
    ctx.send(replies::luserme(&server, &nick, local, nexus.links.len()));
    ctx.send(replies::localusers(
        &server,
        &nick,
        local,
        nexus.max_local_seen(),
    ));
    ctx.send(replies::globalusers(
        &server,
        &nick,
        global,
        nexus.max_global_seen(),
    ));
}

pub struct MotdHandler;

#[async_trait]
impl Handler for MotdHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_motd(ctx);
        Ok(())
    }
}

pub struct LusersHandler;

#[async_trait]
impl Handler for LusersHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_lusers(ctx);
        Ok(())
    }
}

pub struct VersionHandler;

#[async_trait]
impl Handler for VersionHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let network = ctx.nexus.info.network.clone();
        ctx.send(replies::version(&server, &nick, VERSION, &network));
        Ok(())
    }
}

pub struct StatsHandler;

#[async_trait]
impl Handler for StatsHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Command::STATS(ref query) = msg.command else {
            return Ok(());
        };
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let query = query.clone().unwrap_or_default();
        let letter = query.chars().next().unwrap_or(' ');

        match letter {
            'u' => {
                let uptime = ctx.nexus.uptime_secs();
                ctx.send(replies::statsuptime(&server, &nick, uptime));
            }
            'o' => {
                let opers = ctx.nexus.hot.read().opers.clone();
                for oper in opers {
                    let hostmask = oper.hostmask.clone().unwrap_or_else(|| "*@*".to_string());
                    ctx.send(replies::statsoline(&server, &nick, &hostmask, &oper.name));
                }
            }
            'k' => {
                if ctx.is_oper() {
                    for ban in ctx.nexus.bans.snapshot(now()) {
                        if matches!(ban.ban_type, BanType::KLine | BanType::GLine) {
                            ctx.send(replies::statskline(
                                &server,
                                &nick,
                                &ban.pattern,
                                &ban.reason,
                            ));
                        }
                    }
                }
            }
            'm' => {
                for (command, count) in ctx.registry.command_stats() {
                    ctx.send(replies::statscommands(&server, &nick, command, count));
                }
            }
            _ => {}
        }
        ctx.send(replies::endofstats(&server, &nick, &letter.to_string()));
        Ok(())
    }
}

pub struct LinksHandler;

#[async_trait]
impl Handler for LinksHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let description = ctx.nexus.hot.read().description.clone();

        ctx.send(replies::links_entry(&server, &nick, &server, 0, &description));
        for linked in ctx.nexus.topology.snapshot() {
            ctx.send(replies::links_entry(
                &server,
                &nick,
                &linked.name,
                linked.hopcount,
                &linked.description,
            ));
        }
        ctx.send(replies::endoflinks(&server, &nick));
        Ok(())
    }
}

pub struct TimeHandler;

#[async_trait]
impl Handler for TimeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let human = chrono::Utc::now()
            .format("%A %B %d %Y -- %H:%M:%S UTC")
            .to_string();
        ctx.send(replies::time(&server, &nick, &human));
        Ok(())
    }
}

pub struct TraceHandler;

#[async_trait]
impl Handler for TraceHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();

        if ctx.is_oper() {
            let masks: Vec<String> = ctx
                .nexus
                .users
                .iter()
                .filter(|e| {
                    let user = e.value().read();
                    user.is_local_to(&ctx.nexus.info.sid)
                })
                .map(|e| e.value().read().mask())
                .collect();
            for mask in masks {
                ctx.send(replies::traceuser(&server, &nick, "users", &mask));
            }
            let links: Vec<String> =
                ctx.nexus.links.iter().map(|l| l.value().name.clone()).collect();
            for name in links {
                ctx.send(replies::traceserver(&server, &nick, &name));
            }
        }
        ctx.send(replies::traceend(&server, &nick));
        Ok(())
    }
}

pub struct AdminHandler;

#[async_trait]
impl Handler for AdminHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let (location, email) = {
            let hot = ctx.nexus.hot.read();
            (hot.admin_location.clone(), hot.admin_email.clone())
        };

        ctx.send(replies::adminme(&server, &nick));
        ctx.send(replies::adminloc1(
            &server,
            &nick,
            location.as_deref().unwrap_or("Unspecified location"),
        ));
        ctx.send(replies::adminloc2(&server, &nick, &ctx.nexus.info.network.clone()));
        ctx.send(replies::adminemail(
            &server,
            &nick,
            email.as_deref().unwrap_or("admin not configured"),
        ));
        Ok(())
    }
}

pub struct InfoHandler;

#[async_trait]
impl Handler for InfoHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let nick = ctx.nick();
        let server = ctx.server_name().to_string();
        let description = ctx.nexus.hot.read().description.clone();

        for line in [
            format!("{VERSION} -- {description}"),
            format!("Network: {}", ctx.nexus.info.network),
            format!(
                "Online since {}",
                chrono::DateTime::from_timestamp(ctx.nexus.info.created_at, 0)
                    .map(|dt| dt.to_rfc2822())
                    .unwrap_or_default()
            ),
        ] {
            ctx.send(replies::info_line(&server, &nick, &line));
        }
        ctx.send(replies::endofinfo(&server, &nick));
        Ok(())
    }
}
