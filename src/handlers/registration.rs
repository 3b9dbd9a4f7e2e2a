//! Registration completion: the welcome burst and network introduction.

use std::collections::HashSet;

use lark_proto::{Command, IsupportBuilder, Message, Prefix, UidParams};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::cloak::cloak_host;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::helpers::now;
use crate::handlers::{server_query, Context};
use crate::hooks::Event;
use crate::replies;
use crate::state::monitor::MONITOR_LIMIT;
use crate::state::user::{User, UserModes};
use crate::VERSION;

/// Attempt to complete registration; a no-op until NICK + USER are in and
/// CAP is closed.
///
/// On success: the server password is checked, server bans are enforced,
/// the UID becomes live in the state graph, the welcome burst is sent, the
/// `UserRegister` event fires, and the user is introduced to S2S peers.
pub async fn try_complete_registration(ctx: &mut Context<'_>) -> HandlerResult {
    if !ctx.session.can_register() {
        return Ok(());
    }

    // PASS comparison happens here, not at PASS time.
    if let Some(expected) = ctx.nexus.client_password.clone() {
        let supplied = ctx.session.pass.clone().unwrap_or_default();
        let matches = supplied.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1;
        if !matches {
            let nick = ctx.nick();
            ctx.send(replies::passwdmismatch(ctx.server_name(), &nick));
            ctx.send(Message::error("Access denied: bad password"));
            return Err(HandlerError::AccessDenied);
        }
    }

    let nick = ctx.session.nick.clone().expect("checked by can_register");
    let username = ctx.session.user.clone().expect("checked by can_register");
    let realname = ctx.session.realname.clone().unwrap_or_default();

    // Server bans (K/G/Z-lines).
    if let Some(ban) =
        ctx.nexus
            .bans
            .find_matching(&username, &ctx.session.host, &ctx.session.ip, now())
    {
        ctx.send(replies::yourebanned(ctx.server_name(), &nick, &ban.reason));
        ctx.send(Message::error(format!("Banned: {}", ban.reason)));
        return Err(HandlerError::AccessDenied);
    }

    let uid = ctx.session.uid.clone();
    let connected_at = now();
    let visible_host = cloak_host(&ctx.session.host, &ctx.nexus.cloak_secret);

    let modes = UserModes {
        secure: ctx.session.is_tls,
        registered: ctx.session.account.is_some(),
        ..Default::default()
    };

    let user = User {
        uid: uid.clone(),
        nick: nick.clone(),
        user: username.clone(),
        realname: realname.clone(),
        host: ctx.session.host.clone(),
        ip: ctx.session.ip.clone(),
        visible_host: visible_host.clone(),
        server: ctx.nexus.info.sid.clone(),
        session_id: Uuid::new_v4(),
        channels: HashSet::new(),
        modes,
        account: ctx.session.account.clone(),
        away: None,
        caps: ctx.session.caps.clone(),
        accept_list: HashSet::new(),
        connected_at,
        last_activity: connected_at,
    };
    let mask = user.mask();
    ctx.nexus.insert_user(user);
    ctx.session.registered = true;

    send_welcome_burst(ctx, &nick, &mask);

    ctx.nexus
        .hooks
        .emit(Event::UserRegister { uid: uid.clone() })
        .await;
    ctx.nexus.repos.notifier.user_registered(&uid, &nick).await;
    ctx.nexus.notify_monitors_online(&nick, &mask);

    // Introduce the user to the network.
    let intro = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
        command: Command::UID(UidParams {
            nick: nick.clone(),
            hopcount: 1,
            ts: connected_at,
            user: username,
            host: ctx.session.host.clone(),
            uid: uid.clone(),
            svcstamp: "0".to_string(),
            umodes: ctx
                .nexus
                .user(&uid)
                .map(|u| u.read().modes.as_mode_string())
                .unwrap_or_else(|| "+".to_string()),
            vhost: visible_host,
            realname,
        }),
    };
    ctx.nexus.broadcast_links(&intro, None);

    if let Some(account) = ctx.session.account.clone() {
        let login = Message {
            tags: None,
            prefix: Some(Prefix::ServerName(ctx.nexus.info.sid.clone())),
            command: Command::ENCAP("*".to_string(), "LOGIN".to_string(), vec![uid, account]),
        };
        ctx.nexus.broadcast_links(&login, None);
    }

    Ok(())
}

fn send_welcome_burst(ctx: &mut Context<'_>, nick: &str, mask: &str) {
    let server = ctx.server_name().to_string();
    let network = ctx.nexus.info.network.clone();
    let created = chrono::DateTime::from_timestamp(ctx.nexus.info.created_at, 0)
        .map(|dt| dt.format("%a %b %d %Y at %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "a moment ago".to_string());

    ctx.send(replies::welcome(&server, nick, &network, mask));
    ctx.send(replies::yourhost(&server, nick, VERSION));
    ctx.send(replies::created(&server, nick, &created));
    ctx.send(replies::myinfo(&server, nick, VERSION));

    for tokens in isupport_tokens(ctx).lines() {
        ctx.send(replies::isupport(&server, nick, tokens));
    }

    server_query::send_lusers(ctx);
    server_query::send_motd(ctx);
}

fn isupport_tokens(ctx: &Context<'_>) -> IsupportBuilder {
    let limits = &ctx.nexus.limits;
    IsupportBuilder::new()
        .value("NETWORK", &ctx.nexus.info.network)
        .value("CASEMAPPING", "ascii")
        .value("NICKLEN", limits.nick_len)
        .value("CHANNELLEN", limits.channel_len)
        .value("TOPICLEN", limits.topic_len)
        .value("KICKLEN", limits.kick_len)
        .value("AWAYLEN", limits.away_len)
        .value("CHANLIMIT", format!("#:{}", limits.chan_limit))
        .value("MAXTARGETS", limits.max_targets)
        .value("CHANTYPES", "#&")
        .value("PREFIX", "(qaohv)~&@%+")
        .value("CHANMODES", "beI,k,l,cCimnpRsSt")
        .value("MODES", limits.modes_per_line)
        .value("STATUSMSG", "~&@%+")
        .flag("SAFELIST")
        .value("ELIST", "CMNTU")
        .value("EXCEPTS", "e")
        .value("INVEX", "I")
        .value("EXTBAN", "$,arz")
        .flag("WHOX")
        .value("MONITOR", MONITOR_LIMIT)
        .flag("UTF8ONLY")
}
