//! Numeric reply construction.
//!
//! One function per numeric. Every reply is framed with the local server
//! name as source and the destination nick as first parameter. This module
//! is the single place user-visible reply strings live.

use lark_proto::{Command, Message, Prefix, Response};

/// Frame a numeric reply from this server.
pub fn reply(server: &str, response: Response, params: Vec<String>) -> Message {
    Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server.to_string())),
        command: Command::Response(response, params),
    }
}

fn s(text: &str) -> String {
    text.to_string()
}

// === Registration burst (001-005) ===

pub fn welcome(server: &str, nick: &str, network: &str, mask: &str) -> Message {
    reply(
        server,
        Response::RPL_WELCOME,
        vec![s(nick), format!("Welcome to the {network} Network, {mask}")],
    )
}

pub fn yourhost(server: &str, nick: &str, version: &str) -> Message {
    reply(
        server,
        Response::RPL_YOURHOST,
        vec![
            s(nick),
            format!("Your host is {server}, running version {version}"),
        ],
    )
}

pub fn created(server: &str, nick: &str, date: &str) -> Message {
    reply(
        server,
        Response::RPL_CREATED,
        vec![s(nick), format!("This server was created {date}")],
    )
}

pub fn myinfo(server: &str, nick: &str, version: &str) -> Message {
    reply(
        server,
        Response::RPL_MYINFO,
        vec![
            s(nick),
            s(server),
            s(version),
            s("iworZaBg"),
            s("beIiklmnopstvRMDfjFLcCsS"),
            s("beIklovfjFL"),
        ],
    )
}

pub fn isupport(server: &str, nick: &str, tokens: Vec<String>) -> Message {
    let mut params = vec![s(nick)];
    params.extend(tokens);
    params.push(s("are supported by this server"));
    reply(server, Response::RPL_ISUPPORT, params)
}

// === LUSERS (251-266) ===

pub fn luserclient(server: &str, nick: &str, users: usize, services: usize, servers: usize) -> Message {
    reply(
        server,
        Response::RPL_LUSERCLIENT,
        vec![
            s(nick),
            format!("There are {users} users and {services} services on {servers} servers"),
        ],
    )
}

pub fn luserop(server: &str, nick: &str, opers: usize) -> Message {
    reply(
        server,
        Response::RPL_LUSEROP,
        vec![s(nick), opers.to_string(), s("operator(s) online")],
    )
}

pub fn luserunknown(server: &str, nick: &str, unknown: usize) -> Message {
    reply(
        server,
        Response::RPL_LUSERUNKNOWN,
        vec![s(nick), unknown.to_string(), s("unknown connection(s)")],
    )
}

pub fn luserchannels(server: &str, nick: &str, channels: usize) -> Message {
    reply(
        server,
        Response::RPL_LUSERCHANNELS,
        vec![s(nick), channels.to_string(), s("channels formed")],
    )
}

pub fn luserme(server: &str, nick: &str, clients: usize, servers: usize) -> Message {
    reply(
        server,
        Response::RPL_LUSERME,
        vec![
            s(nick),
            format!("I have {clients} clients and {servers} servers"),
        ],
    )
}

pub fn localusers(server: &str, nick: &str, current: usize, max: usize) -> Message {
    reply(
        server,
        Response::RPL_LOCALUSERS,
        vec![
            s(nick),
            current.to_string(),
            max.to_string(),
            format!("Current local users {current}, max {max}"),
        ],
    )
}

pub fn globalusers(server: &str, nick: &str, current: usize, max: usize) -> Message {
    reply(
        server,
        Response::RPL_GLOBALUSERS,
        vec![
            s(nick),
            current.to_string(),
            max.to_string(),
            format!("Current global users {current}, max {max}"),
        ],
    )
}

// === MOTD (372/375/376/422) ===

pub fn motdstart(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_MOTDSTART,
        vec![s(nick), format!("- {server} Message of the Day -")],
    )
}

pub fn motd_line(server: &str, nick: &str, line: &str) -> Message {
    reply(server, Response::RPL_MOTD, vec![s(nick), format!("- {line}")])
}

pub fn endofmotd(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFMOTD,
        vec![s(nick), s("End of /MOTD command.")],
    )
}

pub fn nomotd(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOMOTD,
        vec![s(nick), s("MOTD File is missing")],
    )
}

// === AWAY (301/305/306) ===

pub fn away(server: &str, nick: &str, target: &str, message: &str) -> Message {
    reply(
        server,
        Response::RPL_AWAY,
        vec![s(nick), s(target), s(message)],
    )
}

pub fn unaway(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_UNAWAY,
        vec![s(nick), s("You are no longer marked as being away")],
    )
}

pub fn nowaway(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_NOWAWAY,
        vec![s(nick), s("You have been marked as being away")],
    )
}

// === WHOIS / WHOWAS / WHO ===

pub fn whoisuser(
    server: &str,
    nick: &str,
    target: &str,
    user: &str,
    host: &str,
    realname: &str,
) -> Message {
    reply(
        server,
        Response::RPL_WHOISUSER,
        vec![s(nick), s(target), s(user), s(host), s("*"), s(realname)],
    )
}

pub fn whoisserver(server: &str, nick: &str, target: &str, on_server: &str, info: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISSERVER,
        vec![s(nick), s(target), s(on_server), s(info)],
    )
}

pub fn whoisoperator(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISOPERATOR,
        vec![s(nick), s(target), s("is an IRC operator")],
    )
}

pub fn whoisidle(server: &str, nick: &str, target: &str, idle: i64, signon: i64) -> Message {
    reply(
        server,
        Response::RPL_WHOISIDLE,
        vec![
            s(nick),
            s(target),
            idle.to_string(),
            signon.to_string(),
            s("seconds idle, signon time"),
        ],
    )
}

pub fn endofwhois(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFWHOIS,
        vec![s(nick), s(target), s("End of /WHOIS list")],
    )
}

pub fn whoischannels(server: &str, nick: &str, target: &str, channels: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISCHANNELS,
        vec![s(nick), s(target), s(channels)],
    )
}

pub fn whoisaccount(server: &str, nick: &str, target: &str, account: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISACCOUNT,
        vec![s(nick), s(target), s(account), s("is logged in as")],
    )
}

pub fn whoisactually(server: &str, nick: &str, target: &str, ip: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISACTUALLY,
        vec![s(nick), s(target), s(ip), s("is actually using host")],
    )
}

pub fn whoishost(server: &str, nick: &str, target: &str, host: &str, ip: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISHOST,
        vec![
            s(nick),
            s(target),
            format!("is connecting from *@{host} {ip}"),
        ],
    )
}

pub fn whoissecure(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_WHOISSECURE,
        vec![s(nick), s(target), s("is using a secure connection")],
    )
}

pub fn whowasuser(
    server: &str,
    nick: &str,
    target: &str,
    user: &str,
    host: &str,
    realname: &str,
) -> Message {
    reply(
        server,
        Response::RPL_WHOWASUSER,
        vec![s(nick), s(target), s(user), s(host), s("*"), s(realname)],
    )
}

pub fn endofwhowas(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFWHOWAS,
        vec![s(nick), s(target), s("End of WHOWAS")],
    )
}

pub fn wasnosuchnick(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::ERR_WASNOSUCHNICK,
        vec![s(nick), s(target), s("There was no such nickname")],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn whoreply(
    server: &str,
    nick: &str,
    channel: &str,
    user: &str,
    host: &str,
    on_server: &str,
    target: &str,
    flags: &str,
    hops: u32,
    realname: &str,
) -> Message {
    reply(
        server,
        Response::RPL_WHOREPLY,
        vec![
            s(nick),
            s(channel),
            s(user),
            s(host),
            s(on_server),
            s(target),
            s(flags),
            format!("{hops} {realname}"),
        ],
    )
}

/// WHOX reply; `fields` are pre-assembled in request order.
pub fn whospcrpl(server: &str, nick: &str, fields: Vec<String>) -> Message {
    let mut params = vec![s(nick)];
    params.extend(fields);
    reply(server, Response::RPL_WHOSPCRPL, params)
}

pub fn endofwho(server: &str, nick: &str, mask: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFWHO,
        vec![s(nick), s(mask), s("End of WHO list")],
    )
}

// === LIST (321-323) ===

pub fn liststart(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_LISTSTART,
        vec![s(nick), s("Channel"), s("Users  Name")],
    )
}

pub fn list_entry(server: &str, nick: &str, channel: &str, visible: usize, topic: &str) -> Message {
    reply(
        server,
        Response::RPL_LIST,
        vec![s(nick), s(channel), visible.to_string(), s(topic)],
    )
}

pub fn listend(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_LISTEND,
        vec![s(nick), s("End of /LIST")],
    )
}

// === Channel state (324/329/331/332/333/341/353/366, list modes) ===

pub fn channelmodeis(server: &str, nick: &str, channel: &str, modes: Vec<String>) -> Message {
    let mut params = vec![s(nick), s(channel)];
    params.extend(modes);
    reply(server, Response::RPL_CHANNELMODEIS, params)
}

pub fn creationtime(server: &str, nick: &str, channel: &str, ts: i64) -> Message {
    reply(
        server,
        Response::RPL_CREATIONTIME,
        vec![s(nick), s(channel), ts.to_string()],
    )
}

pub fn notopic(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_NOTOPIC,
        vec![s(nick), s(channel), s("No topic is set")],
    )
}

pub fn topic(server: &str, nick: &str, channel: &str, text: &str) -> Message {
    reply(
        server,
        Response::RPL_TOPIC,
        vec![s(nick), s(channel), s(text)],
    )
}

pub fn topicwhotime(server: &str, nick: &str, channel: &str, setter: &str, ts: i64) -> Message {
    reply(
        server,
        Response::RPL_TOPICWHOTIME,
        vec![s(nick), s(channel), s(setter), ts.to_string()],
    )
}

pub fn inviting(server: &str, nick: &str, target: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_INVITING,
        vec![s(nick), s(target), s(channel)],
    )
}

pub fn namreply(server: &str, nick: &str, channel: &str, names: &str) -> Message {
    reply(
        server,
        Response::RPL_NAMREPLY,
        vec![s(nick), s("="), s(channel), s(names)],
    )
}

pub fn endofnames(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFNAMES,
        vec![s(nick), s(channel), s("End of /NAMES list")],
    )
}

pub fn banlist(server: &str, nick: &str, channel: &str, mask: &str, setter: &str, ts: i64) -> Message {
    reply(
        server,
        Response::RPL_BANLIST,
        vec![s(nick), s(channel), s(mask), s(setter), ts.to_string()],
    )
}

pub fn endofbanlist(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFBANLIST,
        vec![s(nick), s(channel), s("End of channel ban list")],
    )
}

pub fn exceptlist(server: &str, nick: &str, channel: &str, mask: &str, setter: &str, ts: i64) -> Message {
    reply(
        server,
        Response::RPL_EXCEPTLIST,
        vec![s(nick), s(channel), s(mask), s(setter), ts.to_string()],
    )
}

pub fn endofexceptlist(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFEXCEPTLIST,
        vec![s(nick), s(channel), s("End of channel exception list")],
    )
}

pub fn invitelist(server: &str, nick: &str, channel: &str, mask: &str, setter: &str, ts: i64) -> Message {
    reply(
        server,
        Response::RPL_INVITELIST,
        vec![s(nick), s(channel), s(mask), s(setter), ts.to_string()],
    )
}

pub fn endofinvitelist(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFINVITELIST,
        vec![s(nick), s(channel), s("End of channel invite list")],
    )
}

// === Server queries ===

pub fn umodeis(server: &str, nick: &str, modes: &str) -> Message {
    reply(server, Response::RPL_UMODEIS, vec![s(nick), s(modes)])
}

pub fn version(server: &str, nick: &str, ver: &str, comments: &str) -> Message {
    reply(
        server,
        Response::RPL_VERSION,
        vec![s(nick), s(ver), s(server), s(comments)],
    )
}

pub fn links_entry(server: &str, nick: &str, mask: &str, hops: u32, info: &str) -> Message {
    reply(
        server,
        Response::RPL_LINKS,
        vec![s(nick), s(mask), s(server), format!("{hops} {info}")],
    )
}

pub fn endoflinks(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFLINKS,
        vec![s(nick), s("*"), s("End of /LINKS list")],
    )
}

pub fn info_line(server: &str, nick: &str, line: &str) -> Message {
    reply(server, Response::RPL_INFO, vec![s(nick), s(line)])
}

pub fn endofinfo(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFINFO,
        vec![s(nick), s("End of INFO list")],
    )
}

pub fn time(server: &str, nick: &str, human: &str) -> Message {
    reply(server, Response::RPL_TIME, vec![s(nick), s(server), s(human)])
}

pub fn adminme(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ADMINME,
        vec![s(nick), s(server), s("Administrative info")],
    )
}

pub fn adminloc1(server: &str, nick: &str, line: &str) -> Message {
    reply(server, Response::RPL_ADMINLOC1, vec![s(nick), s(line)])
}

pub fn adminloc2(server: &str, nick: &str, line: &str) -> Message {
    reply(server, Response::RPL_ADMINLOC2, vec![s(nick), s(line)])
}

pub fn adminemail(server: &str, nick: &str, email: &str) -> Message {
    reply(server, Response::RPL_ADMINEMAIL, vec![s(nick), s(email)])
}

pub fn youreoper(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_YOUREOPER,
        vec![s(nick), s("You are now an IRC operator")],
    )
}

pub fn rehashing(server: &str, nick: &str, file: &str) -> Message {
    reply(
        server,
        Response::RPL_REHASHING,
        vec![s(nick), s(file), s("Rehashing")],
    )
}

pub fn statsuptime(server: &str, nick: &str, uptime_secs: i64) -> Message {
    let days = uptime_secs / 86_400;
    let hours = (uptime_secs % 86_400) / 3_600;
    let minutes = (uptime_secs % 3_600) / 60;
    let seconds = uptime_secs % 60;
    reply(
        server,
        Response::RPL_STATSUPTIME,
        vec![
            s(nick),
            format!("Server Up {days} days {hours}:{minutes:02}:{seconds:02}"),
        ],
    )
}

pub fn statsoline(server: &str, nick: &str, hostmask: &str, name: &str) -> Message {
    reply(
        server,
        Response::RPL_STATSOLINE,
        vec![s(nick), s("O"), s(hostmask), s("*"), s(name)],
    )
}

pub fn statskline(server: &str, nick: &str, mask: &str, reason: &str) -> Message {
    reply(
        server,
        Response::RPL_STATSKLINE,
        vec![s(nick), s("K"), s(mask), s("*"), s(reason)],
    )
}

pub fn statscommands(server: &str, nick: &str, command: &str, count: u64) -> Message {
    reply(
        server,
        Response::RPL_STATSCOMMANDS,
        vec![s(nick), s(command), count.to_string()],
    )
}

pub fn endofstats(server: &str, nick: &str, query: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFSTATS,
        vec![s(nick), s(query), s("End of /STATS report")],
    )
}

pub fn traceuser(server: &str, nick: &str, class: &str, mask: &str) -> Message {
    reply(
        server,
        Response::RPL_TRACEUSER,
        vec![s(nick), s("User"), s(class), s(mask)],
    )
}

pub fn traceserver(server: &str, nick: &str, name: &str) -> Message {
    reply(
        server,
        Response::RPL_TRACESERVER,
        vec![s(nick), s("Serv"), s("*"), s("*"), s(name)],
    )
}

pub fn traceend(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_TRACEEND,
        vec![s(nick), s(server), s("End of TRACE")],
    )
}

pub fn userhost_reply(server: &str, nick: &str, entries: &str) -> Message {
    reply(server, Response::RPL_USERHOST, vec![s(nick), s(entries)])
}

pub fn ison_reply(server: &str, nick: &str, nicks: &str) -> Message {
    reply(server, Response::RPL_ISON, vec![s(nick), s(nicks)])
}

// === Caller-ID (281/282, 716-718) ===

pub fn acceptlist_entry(server: &str, nick: &str, entry: &str) -> Message {
    reply(server, Response::RPL_ACCEPTLIST, vec![s(nick), s(entry)])
}

pub fn endofaccept(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFACCEPT,
        vec![s(nick), s("End of /ACCEPT list")],
    )
}

pub fn targumodeg(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_TARGUMODEG,
        vec![
            s(nick),
            s(target),
            s("is in +g mode (server-side ignore)"),
        ],
    )
}

pub fn targnotify(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::RPL_TARGNOTIFY,
        vec![s(nick), s(target), s("has been informed that you messaged them")],
    )
}

pub fn umodegmsg(server: &str, nick: &str, source: &str, mask: &str) -> Message {
    reply(
        server,
        Response::RPL_UMODEGMSG,
        vec![
            s(nick),
            s(source),
            s(mask),
            s("is messaging you, and you have umode +g"),
        ],
    )
}

// === MONITOR (730-734) ===

pub fn mononline(server: &str, nick: &str, masks: &str) -> Message {
    reply(server, Response::RPL_MONONLINE, vec![s(nick), s(masks)])
}

pub fn monoffline(server: &str, nick: &str, nicks: &str) -> Message {
    reply(server, Response::RPL_MONOFFLINE, vec![s(nick), s(nicks)])
}

pub fn monlist(server: &str, nick: &str, nicks: &str) -> Message {
    reply(server, Response::RPL_MONLIST, vec![s(nick), s(nicks)])
}

pub fn endofmonlist(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_ENDOFMONLIST,
        vec![s(nick), s("End of MONITOR list")],
    )
}

pub fn monlistfull(server: &str, nick: &str, limit: usize, rejected: &str) -> Message {
    reply(
        server,
        Response::ERR_MONLISTFULL,
        vec![
            s(nick),
            limit.to_string(),
            s(rejected),
            s("Monitor list is full."),
        ],
    )
}

// === SASL (900-908) ===

pub fn loggedin(server: &str, nick: &str, mask: &str, account: &str) -> Message {
    reply(
        server,
        Response::RPL_LOGGEDIN,
        vec![
            s(nick),
            s(mask),
            s(account),
            format!("You are now logged in as {account}"),
        ],
    )
}

pub fn loggedout(server: &str, nick: &str, mask: &str) -> Message {
    reply(
        server,
        Response::RPL_LOGGEDOUT,
        vec![s(nick), s(mask), s("You are now logged out")],
    )
}

pub fn saslsuccess(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::RPL_SASLSUCCESS,
        vec![s(nick), s("SASL authentication successful")],
    )
}

pub fn saslfail(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_SASLFAIL,
        vec![s(nick), s("SASL authentication failed")],
    )
}

pub fn sasltoolong(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_SASLTOOLONG,
        vec![s(nick), s("SASL message too long")],
    )
}

pub fn saslaborted(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_SASLABORTED,
        vec![s(nick), s("SASL authentication aborted")],
    )
}

pub fn saslalready(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_SASLALREADY,
        vec![s(nick), s("You have already authenticated")],
    )
}

pub fn saslmechs(server: &str, nick: &str, mechs: &str) -> Message {
    reply(
        server,
        Response::RPL_SASLMECHS,
        vec![s(nick), s(mechs), s("are available SASL mechanisms")],
    )
}

// === Error replies (4xx/5xx) ===

pub fn nosuchnick(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::ERR_NOSUCHNICK,
        vec![s(nick), s(target), s("No such nick/channel")],
    )
}

pub fn nosuchserver(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::ERR_NOSUCHSERVER,
        vec![s(nick), s(target), s("No such server")],
    )
}

pub fn nosuchchannel(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_NOSUCHCHANNEL,
        vec![s(nick), s(channel), s("No such channel")],
    )
}

pub fn cannotsendtochan(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_CANNOTSENDTOCHAN,
        vec![s(nick), s(channel), s("Cannot send to channel")],
    )
}

pub fn toomanychannels(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_TOOMANYCHANNELS,
        vec![s(nick), s(channel), s("You have joined too many channels")],
    )
}

pub fn toomanytargets(server: &str, nick: &str, target: &str) -> Message {
    reply(
        server,
        Response::ERR_TOOMANYTARGETS,
        vec![s(nick), s(target), s("Too many targets")],
    )
}

pub fn noorigin(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOORIGIN,
        vec![s(nick), s("No origin specified")],
    )
}

pub fn invalidcapcmd(server: &str, nick: &str, subcommand: &str) -> Message {
    reply(
        server,
        Response::ERR_INVALIDCAPCMD,
        vec![s(nick), s(subcommand), s("Invalid CAP command")],
    )
}

pub fn norecipient(server: &str, nick: &str, command: &str) -> Message {
    reply(
        server,
        Response::ERR_NORECIPIENT,
        vec![s(nick), format!("No recipient given ({command})")],
    )
}

pub fn notexttosend(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOTEXTTOSEND,
        vec![s(nick), s("No text to send")],
    )
}

pub fn inputtoolong(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_INPUTTOOLONG,
        vec![s(nick), s("Input line was too long")],
    )
}

pub fn unknowncommand(server: &str, nick: &str, command: &str) -> Message {
    reply(
        server,
        Response::ERR_UNKNOWNCOMMAND,
        vec![s(nick), s(command), s("Unknown command")],
    )
}

pub fn erroneusnickname(server: &str, nick: &str, bad: &str) -> Message {
    reply(
        server,
        Response::ERR_ERRONEUSNICKNAME,
        vec![s(nick), s(bad), s("Erroneous nickname")],
    )
}

pub fn nicknameinuse(server: &str, nick: &str, wanted: &str) -> Message {
    reply(
        server,
        Response::ERR_NICKNAMEINUSE,
        vec![s(nick), s(wanted), s("Nickname is already in use")],
    )
}

pub fn nickcollision(server: &str, nick: &str, wanted: &str) -> Message {
    reply(
        server,
        Response::ERR_NICKCOLLISION,
        vec![s(nick), s(wanted), s("Nickname collision KILL")],
    )
}

pub fn usernotinchannel(server: &str, nick: &str, target: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_USERNOTINCHANNEL,
        vec![s(nick), s(target), s(channel), s("They aren't on that channel")],
    )
}

pub fn notonchannel(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_NOTONCHANNEL,
        vec![s(nick), s(channel), s("You're not on that channel")],
    )
}

pub fn useronchannel(server: &str, nick: &str, target: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_USERONCHANNEL,
        vec![s(nick), s(target), s(channel), s("is already on channel")],
    )
}

pub fn notregistered(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOTREGISTERED,
        vec![s(nick), s("You have not registered")],
    )
}

pub fn needmoreparams(server: &str, nick: &str, command: &str) -> Message {
    reply(
        server,
        Response::ERR_NEEDMOREPARAMS,
        vec![s(nick), s(command), s("Not enough parameters")],
    )
}

pub fn alreadyregistered(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_ALREADYREGISTERED,
        vec![s(nick), s("You may not reregister")],
    )
}

pub fn passwdmismatch(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_PASSWDMISMATCH,
        vec![s(nick), s("Password incorrect")],
    )
}

pub fn yourebanned(server: &str, nick: &str, reason: &str) -> Message {
    reply(
        server,
        Response::ERR_YOUREBANNEDCREEP,
        vec![s(nick), format!("You are banned from this server: {reason}")],
    )
}

pub fn linkchannel(server: &str, nick: &str, from: &str, to: &str) -> Message {
    reply(
        server,
        Response::ERR_LINKCHANNEL,
        vec![s(nick), s(from), s(to), s("Forwarding to another channel")],
    )
}

pub fn channelisfull(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_CHANNELISFULL,
        vec![s(nick), s(channel), s("Cannot join channel (+l)")],
    )
}

pub fn unknownmode(server: &str, nick: &str, mode: char) -> Message {
    reply(
        server,
        Response::ERR_UNKNOWNMODE,
        vec![
            s(nick),
            mode.to_string(),
            s("is unknown mode char to me"),
        ],
    )
}

pub fn inviteonlychan(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_INVITEONLYCHAN,
        vec![s(nick), s(channel), s("Cannot join channel (+i)")],
    )
}

pub fn bannedfromchan(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_BANNEDFROMCHAN,
        vec![s(nick), s(channel), s("Cannot join channel (+b)")],
    )
}

pub fn badchannelkey(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_BADCHANNELKEY,
        vec![s(nick), s(channel), s("Cannot join channel (+k)")],
    )
}

pub fn badchanmask(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_BADCHANMASK,
        vec![s(nick), s(channel), s("Bad Channel Mask")],
    )
}

pub fn needreggednick(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_NEEDREGGEDNICK,
        vec![
            s(nick),
            s(channel),
            s("Cannot join channel (+R): you must be identified to services"),
        ],
    )
}

pub fn banlistfull(server: &str, nick: &str, channel: &str, mask: &str) -> Message {
    reply(
        server,
        Response::ERR_BANLISTFULL,
        vec![s(nick), s(channel), s(mask), s("Channel ban list is full")],
    )
}

pub fn noprivileges(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOPRIVILEGES,
        vec![
            s(nick),
            s("Permission Denied - You're not an IRC operator"),
        ],
    )
}

pub fn chanoprivsneeded(server: &str, nick: &str, channel: &str) -> Message {
    reply(
        server,
        Response::ERR_CHANOPRIVSNEEDED,
        vec![s(nick), s(channel), s("You're not channel operator")],
    )
}

pub fn cantkillserver(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_CANTKILLSERVER,
        vec![s(nick), s("You can't kill a server!")],
    )
}

pub fn nooperhost(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_NOOPERHOST,
        vec![s(nick), s("No O-lines for your host")],
    )
}

pub fn umodeunknownflag(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_UMODEUNKNOWNFLAG,
        vec![s(nick), s("Unknown MODE flag")],
    )
}

pub fn usersdontmatch(server: &str, nick: &str) -> Message {
    reply(
        server,
        Response::ERR_USERSDONTMATCH,
        vec![s(nick), s("Cannot change mode for other users")],
    )
}

// === Standard replies (FAIL/WARN/NOTE) ===

/// `FAIL <command> <code> [context...] :<description>`
pub fn fail(server: &str, command: &str, code: &str, context: &[&str], description: &str) -> Message {
    let mut params = vec![s(command), s(code)];
    params.extend(context.iter().map(|c| s(c)));
    params.push(s(description));
    Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server.to_string())),
        command: Command::Raw(s("FAIL"), params),
    }
}

/// `WARN <command> <code> [context...] :<description>`
pub fn warn(server: &str, command: &str, code: &str, context: &[&str], description: &str) -> Message {
    let mut params = vec![s(command), s(code)];
    params.extend(context.iter().map(|c| s(c)));
    params.push(s(description));
    Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server.to_string())),
        command: Command::Raw(s("WARN"), params),
    }
}

/// `NOTE <command> <code> [context...] :<description>`
pub fn note(server: &str, command: &str, code: &str, context: &[&str], description: &str) -> Message {
    let mut params = vec![s(command), s(code)];
    params.extend(context.iter().map(|c| s(c)));
    params.push(s(description));
    Message {
        tags: None,
        prefix: Some(Prefix::ServerName(server.to_string())),
        command: Command::Raw(s("NOTE"), params),
    }
}
