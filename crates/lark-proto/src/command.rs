//! Typed IRC commands.
//!
//! [`Command`] canonicalizes a parsed `(verb, params)` pair into a typed
//! variant. Verbs with no typed form land in [`Command::Raw`], and numeric
//! verbs in [`Command::Response`]. The server-to-server (TS6) verbs share
//! the enum: the wire grammar is identical, only the vocabulary differs.

use std::fmt;

use crate::error::MessageParseError;
use crate::response::Response;

/// CAP negotiation subcommands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapSubCommand {
    /// List capabilities the server supports.
    LS,
    /// List capabilities currently enabled.
    LIST,
    /// Request capabilities.
    REQ,
    /// Acknowledge a request.
    ACK,
    /// Reject a request.
    NAK,
    /// Finish negotiation.
    END,
    /// Server advertises new capabilities (cap-notify).
    NEW,
    /// Server withdraws capabilities (cap-notify).
    DEL,
}

impl CapSubCommand {
    /// The wire token for this subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapSubCommand::LS => "LS",
            CapSubCommand::LIST => "LIST",
            CapSubCommand::REQ => "REQ",
            CapSubCommand::ACK => "ACK",
            CapSubCommand::NAK => "NAK",
            CapSubCommand::END => "END",
            CapSubCommand::NEW => "NEW",
            CapSubCommand::DEL => "DEL",
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LS" => Some(CapSubCommand::LS),
            "LIST" => Some(CapSubCommand::LIST),
            "REQ" => Some(CapSubCommand::REQ),
            "ACK" => Some(CapSubCommand::ACK),
            "NAK" => Some(CapSubCommand::NAK),
            "END" => Some(CapSubCommand::END),
            "NEW" => Some(CapSubCommand::NEW),
            "DEL" => Some(CapSubCommand::DEL),
            _ => None,
        }
    }
}

/// Parameters of a TS6 `UID` user introduction.
///
/// Wire layout: `UID nick hops ts user host uid svcstamp umodes vhost :realname`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UidParams {
    /// Current nickname.
    pub nick: String,
    /// Hop count from the introducing server.
    pub hopcount: u32,
    /// Connect timestamp (unix seconds); the collision tiebreaker.
    pub ts: i64,
    /// Ident/username.
    pub user: String,
    /// Real hostname.
    pub host: String,
    /// The 9-character UID (SID + 6).
    pub uid: String,
    /// Services stamp (`0` when unused).
    pub svcstamp: String,
    /// User mode string (`+iw` form).
    pub umodes: String,
    /// Displayed (cloaked) hostname.
    pub vhost: String,
    /// Realname / GECOS.
    pub realname: String,
}

/// An IRC command with typed parameters.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    // === Connection registration ===
    /// `PASS <password>`
    PASS(String),
    /// `NICK <nickname>`
    NICK(String),
    /// `USER <user> <mode> <unused> :<realname>` (mode/unused collapsed)
    USER(String, String, String),
    /// `OPER <name> <password>`
    OPER(String, String),
    /// `QUIT [:<reason>]`
    QUIT(Option<String>),
    /// `CAP <subcommand> [params...]`
    CAP(CapSubCommand, Vec<String>),
    /// `AUTHENTICATE <payload>`
    AUTHENTICATE(String),

    // === Channel operations ===
    /// `JOIN <channels> [<keys>]` (comma lists unexpanded)
    JOIN(String, Option<String>),
    /// `PART <channels> [:<reason>]`
    PART(String, Option<String>),
    /// `TOPIC <channel> [:<topic>]`
    TOPIC(String, Option<String>),
    /// `NAMES [<channels>]`
    NAMES(Option<String>),
    /// `LIST [<channels>] [<elist-filters>]`
    LIST(Option<String>, Option<String>),
    /// `INVITE <nick> <channel>`
    INVITE(String, String),
    /// `KICK <channel> <nick> [:<reason>]`
    KICK(String, String, Option<String>),

    // === Messaging ===
    /// `PRIVMSG <target> :<text>`
    PRIVMSG(String, String),
    /// `NOTICE <target> :<text>`
    NOTICE(String, String),
    /// `TAGMSG <target>`
    TAGMSG(String),

    // === Modes ===
    /// `MODE <nick> [changes...]`
    UserMODE(String, Vec<String>),
    /// `MODE <channel> [changes...]`
    ChannelMODE(String, Vec<String>),

    // === Queries ===
    /// `MOTD [<target>]`
    MOTD(Option<String>),
    /// `LUSERS`
    LUSERS,
    /// `VERSION [<target>]`
    VERSION(Option<String>),
    /// `STATS [<query>]`
    STATS(Option<String>),
    /// `LINKS`
    LINKS,
    /// `TIME [<target>]`
    TIME(Option<String>),
    /// `TRACE [<target>]`
    TRACE(Option<String>),
    /// `ADMIN [<target>]`
    ADMIN(Option<String>),
    /// `INFO [<target>]`
    INFO(Option<String>),
    /// `WHO [<mask>] [<whox-fields>]`
    WHO(Option<String>, Option<String>),
    /// `WHOIS <mask>` or `WHOIS <target> <mask>`
    WHOIS(String, Option<String>),
    /// `WHOWAS <nick> [<count>]`
    WHOWAS(String, Option<String>),
    /// `ISON <nicks...>`
    ISON(Vec<String>),
    /// `USERHOST <nicks...>`
    USERHOST(Vec<String>),
    /// `MONITOR <subcommand> [<targets>]`
    MONITOR(String, Option<String>),
    /// `ACCEPT [<nick> | -<nick> | *>]`
    ACCEPT(Option<String>),
    /// `AWAY [:<message>]`
    AWAY(Option<String>),
    /// `SETNAME :<realname>`
    SETNAME(String),
    /// `PING <token> [<target>]`
    PING(String, Option<String>),
    /// `PONG <source> [<token>]`
    PONG(String, Option<String>),
    /// `CHATHISTORY <subcommand> <params...>`
    CHATHISTORY(String, Vec<String>),
    /// `BATCH <+/-reference> [type params...]`
    BATCH(String, Vec<String>),

    // === Operator ===
    /// `KILL <target> :<reason>`
    KILL(String, String),
    /// `WALLOPS :<text>`
    WALLOPS(String),
    /// `REHASH`
    REHASH,
    /// `CHGHOST <user> <host>`
    CHGHOST(String, String),
    /// `SQUIT <server> [:<comment>]`
    SQUIT(String, Option<String>),

    // === Server-to-server (TS6) ===
    /// `PASS <password> TS 6 <sid>`
    PassTs6 {
        /// Link password.
        password: String,
        /// Introducing server's SID.
        sid: String,
    },
    /// `CAPAB :<tokens>`
    CAPAB(Vec<String>),
    /// `SERVER <name> <hopcount> [<sid>] :<description>`
    SERVER(String, u32, Option<String>, String),
    /// `SID <name> <hopcount> <sid> :<description>` (remote introduction)
    SID(String, u32, String, String),
    /// TS6 user introduction.
    UID(UidParams),
    /// `SJOIN <ts> <channel> <modes> [args...] :<prefixed-uids>`
    SJOIN(i64, String, String, Vec<String>, Vec<(String, String)>),
    /// `TMODE <ts> <channel> <modes> [args...]`
    TMODE(i64, String, String, Vec<String>),
    /// End of burst marker.
    EOB,
    /// `ENCAP <target> <subcommand> [params...]`
    ENCAP(String, String, Vec<String>),
    /// `ERROR :<message>`
    ERROR(String),

    // === Fallbacks ===
    /// A numeric reply: `<code> <params...>`
    Response(Response, Vec<String>),
    /// Any verb without a typed representation.
    Raw(String, Vec<String>),
}

/// Membership prefix sigils, highest rank first.
const MEMBER_PREFIXES: &[char] = &['~', '&', '@', '%', '+'];

fn own(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

fn split_member_token(token: &str) -> (String, String) {
    let split = token
        .char_indices()
        .find(|(_, c)| !MEMBER_PREFIXES.contains(c))
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    (token[..split].to_string(), token[split..].to_string())
}

impl Command {
    /// Canonicalize a raw `(verb, params)` pair.
    ///
    /// Verbs with too few parameters for their typed form fall back to
    /// [`Command::Raw`] so the dispatcher can reply `ERR_NEEDMOREPARAMS`
    /// from its gating table rather than this layer guessing.
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        let verb = cmd.to_ascii_uppercase();

        if verb.len() == 3 && verb.chars().all(|c| c.is_ascii_digit()) {
            let code: u16 = verb.parse().map_err(|_| {
                MessageParseError::InvalidCommand(cmd.to_owned())
            })?;
            return Ok(match Response::from_code(code) {
                Some(resp) => Command::Response(resp, own(&args)),
                None => Command::Raw(verb, own(&args)),
            });
        }

        let raw = || Command::Raw(verb.clone(), own(&args));

        Ok(match (verb.as_str(), args.as_slice()) {
            ("PASS", [pw, ts, ver, sid]) if ts.eq_ignore_ascii_case("TS") && *ver == "6" => {
                Command::PassTs6 {
                    password: (*pw).to_string(),
                    sid: (*sid).to_string(),
                }
            }
            ("PASS", [pw, ..]) => Command::PASS((*pw).to_string()),
            ("NICK", [nick, ..]) => Command::NICK((*nick).to_string()),
            ("USER", [user, mode, _unused, realname]) => Command::USER(
                (*user).to_string(),
                (*mode).to_string(),
                (*realname).to_string(),
            ),
            ("OPER", [name, pw, ..]) => {
                Command::OPER((*name).to_string(), (*pw).to_string())
            }
            ("QUIT", []) => Command::QUIT(None),
            ("QUIT", [reason, ..]) => Command::QUIT(Some((*reason).to_string())),
            ("CAP", [sub, rest @ ..]) => match CapSubCommand::from_token(sub) {
                Some(sub) => Command::CAP(sub, own(rest)),
                None => raw(),
            },
            ("AUTHENTICATE", [payload, ..]) => {
                Command::AUTHENTICATE((*payload).to_string())
            }

            ("JOIN", [chans]) => Command::JOIN((*chans).to_string(), None),
            ("JOIN", [chans, keys, ..]) => {
                Command::JOIN((*chans).to_string(), Some((*keys).to_string()))
            }
            ("PART", [chans]) => Command::PART((*chans).to_string(), None),
            ("PART", [chans, reason, ..]) => {
                Command::PART((*chans).to_string(), Some((*reason).to_string()))
            }
            ("TOPIC", [chan]) => Command::TOPIC((*chan).to_string(), None),
            ("TOPIC", [chan, topic, ..]) => {
                Command::TOPIC((*chan).to_string(), Some((*topic).to_string()))
            }
            ("NAMES", []) => Command::NAMES(None),
            ("NAMES", [chans, ..]) => Command::NAMES(Some((*chans).to_string())),
            ("LIST", []) => Command::LIST(None, None),
            ("LIST", [chans]) => Command::LIST(Some((*chans).to_string()), None),
            ("LIST", [chans, elist, ..]) => Command::LIST(
                Some((*chans).to_string()),
                Some((*elist).to_string()),
            ),
            ("INVITE", [nick, chan, ..]) => {
                Command::INVITE((*nick).to_string(), (*chan).to_string())
            }
            ("KICK", [chan, nick]) => {
                Command::KICK((*chan).to_string(), (*nick).to_string(), None)
            }
            ("KICK", [chan, nick, reason, ..]) => Command::KICK(
                (*chan).to_string(),
                (*nick).to_string(),
                Some((*reason).to_string()),
            ),

            ("PRIVMSG", [target, text, ..]) => {
                Command::PRIVMSG((*target).to_string(), (*text).to_string())
            }
            ("NOTICE", [target, text, ..]) => {
                Command::NOTICE((*target).to_string(), (*text).to_string())
            }
            ("TAGMSG", [target, ..]) => Command::TAGMSG((*target).to_string()),

            ("MODE", [target, rest @ ..]) => {
                if target.starts_with('#') || target.starts_with('&') {
                    Command::ChannelMODE((*target).to_string(), own(rest))
                } else {
                    Command::UserMODE((*target).to_string(), own(rest))
                }
            }

            ("MOTD", []) => Command::MOTD(None),
            ("MOTD", [target, ..]) => Command::MOTD(Some((*target).to_string())),
            ("LUSERS", ..) => Command::LUSERS,
            ("VERSION", []) => Command::VERSION(None),
            ("VERSION", [target, ..]) => Command::VERSION(Some((*target).to_string())),
            ("STATS", []) => Command::STATS(None),
            ("STATS", [query, ..]) => Command::STATS(Some((*query).to_string())),
            ("LINKS", ..) => Command::LINKS,
            ("TIME", []) => Command::TIME(None),
            ("TIME", [target, ..]) => Command::TIME(Some((*target).to_string())),
            ("TRACE", []) => Command::TRACE(None),
            ("TRACE", [target, ..]) => Command::TRACE(Some((*target).to_string())),
            ("ADMIN", []) => Command::ADMIN(None),
            ("ADMIN", [target, ..]) => Command::ADMIN(Some((*target).to_string())),
            ("INFO", []) => Command::INFO(None),
            ("INFO", [target, ..]) => Command::INFO(Some((*target).to_string())),
            ("WHO", []) => Command::WHO(None, None),
            ("WHO", [mask]) => Command::WHO(Some((*mask).to_string()), None),
            ("WHO", [mask, fields, ..]) => Command::WHO(
                Some((*mask).to_string()),
                Some((*fields).to_string()),
            ),
            ("WHOIS", [mask]) => Command::WHOIS((*mask).to_string(), None),
            ("WHOIS", [target, mask, ..]) => {
                Command::WHOIS((*target).to_string(), Some((*mask).to_string()))
            }
            ("WHOWAS", [nick]) => Command::WHOWAS((*nick).to_string(), None),
            ("WHOWAS", [nick, count, ..]) => {
                Command::WHOWAS((*nick).to_string(), Some((*count).to_string()))
            }
            ("ISON", rest) if !rest.is_empty() => Command::ISON(own(rest)),
            ("USERHOST", rest) if !rest.is_empty() => Command::USERHOST(own(rest)),
            ("MONITOR", [sub]) => Command::MONITOR((*sub).to_string(), None),
            ("MONITOR", [sub, targets, ..]) => {
                Command::MONITOR((*sub).to_string(), Some((*targets).to_string()))
            }
            ("ACCEPT", []) => Command::ACCEPT(None),
            ("ACCEPT", [arg, ..]) => Command::ACCEPT(Some((*arg).to_string())),
            ("AWAY", []) => Command::AWAY(None),
            ("AWAY", [msg, ..]) => Command::AWAY(Some((*msg).to_string())),
            ("SETNAME", [name, ..]) => Command::SETNAME((*name).to_string()),
            ("PING", [token]) => Command::PING((*token).to_string(), None),
            ("PING", [origin, target, ..]) => {
                Command::PING((*origin).to_string(), Some((*target).to_string()))
            }
            ("PONG", [source]) => Command::PONG((*source).to_string(), None),
            ("PONG", [source, token, ..]) => {
                Command::PONG((*source).to_string(), Some((*token).to_string()))
            }
            ("CHATHISTORY", [sub, rest @ ..]) => {
                Command::CHATHISTORY((*sub).to_string(), own(rest))
            }
            ("BATCH", [reference, rest @ ..]) => {
                Command::BATCH((*reference).to_string(), own(rest))
            }

            ("KILL", [target, reason, ..]) => {
                Command::KILL((*target).to_string(), (*reason).to_string())
            }
            ("WALLOPS", [text, ..]) => Command::WALLOPS((*text).to_string()),
            ("REHASH", ..) => Command::REHASH,
            ("CHGHOST", [user, host, ..]) => {
                Command::CHGHOST((*user).to_string(), (*host).to_string())
            }
            ("SQUIT", [server]) => Command::SQUIT((*server).to_string(), None),
            ("SQUIT", [server, comment, ..]) => {
                Command::SQUIT((*server).to_string(), Some((*comment).to_string()))
            }

            ("CAPAB", rest) => Command::CAPAB(
                rest.iter()
                    .flat_map(|p| p.split_whitespace())
                    .map(|t| t.to_string())
                    .collect(),
            ),
            ("SERVER", [name, hop, desc]) => match hop.parse() {
                Ok(hop) => {
                    Command::SERVER((*name).to_string(), hop, None, (*desc).to_string())
                }
                Err(_) => raw(),
            },
            ("SERVER", [name, hop, sid, desc]) => match hop.parse() {
                Ok(hop) => Command::SERVER(
                    (*name).to_string(),
                    hop,
                    Some((*sid).to_string()),
                    (*desc).to_string(),
                ),
                Err(_) => raw(),
            },
            ("SID", [name, hop, sid, desc]) => match hop.parse() {
                Ok(hop) => Command::SID(
                    (*name).to_string(),
                    hop,
                    (*sid).to_string(),
                    (*desc).to_string(),
                ),
                Err(_) => raw(),
            },
            (
                "UID",
                [nick, hopcount, ts, user, host, uid, svcstamp, umodes, vhost, realname],
            ) => match (hopcount.parse(), ts.parse()) {
                (Ok(hopcount), Ok(ts)) => Command::UID(UidParams {
                    nick: (*nick).to_string(),
                    hopcount,
                    ts,
                    user: (*user).to_string(),
                    host: (*host).to_string(),
                    uid: (*uid).to_string(),
                    svcstamp: (*svcstamp).to_string(),
                    umodes: (*umodes).to_string(),
                    vhost: (*vhost).to_string(),
                    realname: (*realname).to_string(),
                }),
                _ => raw(),
            },
            ("SJOIN", [ts, chan, modes, rest @ .., members]) => match ts.parse() {
                Ok(ts) => Command::SJOIN(
                    ts,
                    (*chan).to_string(),
                    (*modes).to_string(),
                    own(rest),
                    members
                        .split_whitespace()
                        .map(split_member_token)
                        .collect(),
                ),
                Err(_) => raw(),
            },
            ("TMODE", [ts, chan, modes, rest @ ..]) => match ts.parse() {
                Ok(ts) => Command::TMODE(
                    ts,
                    (*chan).to_string(),
                    (*modes).to_string(),
                    own(rest),
                ),
                Err(_) => raw(),
            },
            ("EOB", ..) => Command::EOB,
            ("ENCAP", [target, sub, rest @ ..]) => Command::ENCAP(
                (*target).to_string(),
                (*sub).to_string(),
                own(rest),
            ),
            ("ERROR", [msg, ..]) => Command::ERROR((*msg).to_string()),

            _ => raw(),
        })
    }

    /// The canonical (uppercase) verb for dispatch.
    pub fn name(&self) -> &str {
        match self {
            Command::PASS(..) | Command::PassTs6 { .. } => "PASS",
            Command::NICK(..) => "NICK",
            Command::USER(..) => "USER",
            Command::OPER(..) => "OPER",
            Command::QUIT(..) => "QUIT",
            Command::CAP(..) => "CAP",
            Command::AUTHENTICATE(..) => "AUTHENTICATE",
            Command::JOIN(..) => "JOIN",
            Command::PART(..) => "PART",
            Command::TOPIC(..) => "TOPIC",
            Command::NAMES(..) => "NAMES",
            Command::LIST(..) => "LIST",
            Command::INVITE(..) => "INVITE",
            Command::KICK(..) => "KICK",
            Command::PRIVMSG(..) => "PRIVMSG",
            Command::NOTICE(..) => "NOTICE",
            Command::TAGMSG(..) => "TAGMSG",
            Command::UserMODE(..) | Command::ChannelMODE(..) => "MODE",
            Command::MOTD(..) => "MOTD",
            Command::LUSERS => "LUSERS",
            Command::VERSION(..) => "VERSION",
            Command::STATS(..) => "STATS",
            Command::LINKS => "LINKS",
            Command::TIME(..) => "TIME",
            Command::TRACE(..) => "TRACE",
            Command::ADMIN(..) => "ADMIN",
            Command::INFO(..) => "INFO",
            Command::WHO(..) => "WHO",
            Command::WHOIS(..) => "WHOIS",
            Command::WHOWAS(..) => "WHOWAS",
            Command::ISON(..) => "ISON",
            Command::USERHOST(..) => "USERHOST",
            Command::MONITOR(..) => "MONITOR",
            Command::ACCEPT(..) => "ACCEPT",
            Command::AWAY(..) => "AWAY",
            Command::SETNAME(..) => "SETNAME",
            Command::PING(..) => "PING",
            Command::PONG(..) => "PONG",
            Command::CHATHISTORY(..) => "CHATHISTORY",
            Command::BATCH(..) => "BATCH",
            Command::KILL(..) => "KILL",
            Command::WALLOPS(..) => "WALLOPS",
            Command::REHASH => "REHASH",
            Command::CHGHOST(..) => "CHGHOST",
            Command::SQUIT(..) => "SQUIT",
            Command::CAPAB(..) => "CAPAB",
            Command::SERVER(..) => "SERVER",
            Command::SID(..) => "SID",
            Command::UID(..) => "UID",
            Command::SJOIN(..) => "SJOIN",
            Command::TMODE(..) => "TMODE",
            Command::EOB => "EOB",
            Command::ENCAP(..) => "ENCAP",
            Command::ERROR(..) => "ERROR",
            Command::Response(..) => "RESPONSE",
            Command::Raw(name, ..) => name,
        }
    }

    /// Number of parameters this command carries on the wire.
    pub fn param_count(&self) -> usize {
        let (_, middles, trailing) = self.to_parts();
        middles.len() + usize::from(trailing.is_some())
    }

    /// Decompose into `(verb, middle params, trailing param)`.
    ///
    /// The trailing slot is used for parameters that conventionally carry
    /// free text; the serializer emits it with a `:` marker.
    pub(crate) fn to_parts(&self) -> (String, Vec<String>, Option<String>) {
        fn m(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }

        match self {
            Command::PASS(pw) => ("PASS".into(), m(&[pw]), None),
            Command::NICK(n) => ("NICK".into(), m(&[n]), None),
            Command::USER(u, mode, real) => {
                ("USER".into(), m(&[u, mode, "*"]), Some(real.clone()))
            }
            Command::OPER(n, pw) => ("OPER".into(), m(&[n, pw]), None),
            Command::QUIT(reason) => ("QUIT".into(), vec![], reason.clone()),
            Command::CAP(sub, params) => {
                let mut middles = vec![sub.as_str().to_string()];
                let mut trailing = None;
                if let Some((last, init)) = params.split_last() {
                    middles.extend(init.iter().cloned());
                    trailing = Some(last.clone());
                }
                ("CAP".into(), middles, trailing)
            }
            Command::AUTHENTICATE(payload) => {
                ("AUTHENTICATE".into(), m(&[payload]), None)
            }
            Command::JOIN(chans, keys) => {
                let mut middles = m(&[chans]);
                if let Some(k) = keys {
                    middles.push(k.clone());
                }
                ("JOIN".into(), middles, None)
            }
            Command::PART(chans, reason) => ("PART".into(), m(&[chans]), reason.clone()),
            Command::TOPIC(chan, topic) => ("TOPIC".into(), m(&[chan]), topic.clone()),
            Command::NAMES(chans) => (
                "NAMES".into(),
                chans.iter().cloned().collect(),
                None,
            ),
            Command::LIST(chans, elist) => {
                let mut middles: Vec<String> = chans.iter().cloned().collect();
                middles.extend(elist.iter().cloned());
                ("LIST".into(), middles, None)
            }
            Command::INVITE(nick, chan) => ("INVITE".into(), m(&[nick, chan]), None),
            Command::KICK(chan, nick, reason) => {
                ("KICK".into(), m(&[chan, nick]), reason.clone())
            }
            Command::PRIVMSG(target, text) => {
                ("PRIVMSG".into(), m(&[target]), Some(text.clone()))
            }
            Command::NOTICE(target, text) => {
                ("NOTICE".into(), m(&[target]), Some(text.clone()))
            }
            Command::TAGMSG(target) => ("TAGMSG".into(), m(&[target]), None),
            Command::UserMODE(target, changes) | Command::ChannelMODE(target, changes) => {
                let mut middles = m(&[target]);
                middles.extend(changes.iter().cloned());
                ("MODE".into(), middles, None)
            }
            Command::MOTD(t) => ("MOTD".into(), t.iter().cloned().collect(), None),
            Command::LUSERS => ("LUSERS".into(), vec![], None),
            Command::VERSION(t) => ("VERSION".into(), t.iter().cloned().collect(), None),
            Command::STATS(q) => ("STATS".into(), q.iter().cloned().collect(), None),
            Command::LINKS => ("LINKS".into(), vec![], None),
            Command::TIME(t) => ("TIME".into(), t.iter().cloned().collect(), None),
            Command::TRACE(t) => ("TRACE".into(), t.iter().cloned().collect(), None),
            Command::ADMIN(t) => ("ADMIN".into(), t.iter().cloned().collect(), None),
            Command::INFO(t) => ("INFO".into(), t.iter().cloned().collect(), None),
            Command::WHO(mask, fields) => {
                let mut middles: Vec<String> = mask.iter().cloned().collect();
                middles.extend(fields.iter().cloned());
                ("WHO".into(), middles, None)
            }
            Command::WHOIS(a, b) => {
                let mut middles = m(&[a]);
                middles.extend(b.iter().cloned());
                ("WHOIS".into(), middles, None)
            }
            Command::WHOWAS(nick, count) => {
                let mut middles = m(&[nick]);
                middles.extend(count.iter().cloned());
                ("WHOWAS".into(), middles, None)
            }
            Command::ISON(nicks) => ("ISON".into(), nicks.clone(), None),
            Command::USERHOST(nicks) => ("USERHOST".into(), nicks.clone(), None),
            Command::MONITOR(sub, targets) => {
                let mut middles = m(&[sub]);
                middles.extend(targets.iter().cloned());
                ("MONITOR".into(), middles, None)
            }
            Command::ACCEPT(arg) => ("ACCEPT".into(), arg.iter().cloned().collect(), None),
            Command::AWAY(msg) => ("AWAY".into(), vec![], msg.clone()),
            Command::SETNAME(name) => ("SETNAME".into(), vec![], Some(name.clone())),
            Command::PING(a, b) => {
                let middles: Vec<String> = b.iter().cloned().collect();
                if middles.is_empty() {
                    ("PING".into(), vec![], Some(a.clone()))
                } else {
                    let mut all = m(&[a]);
                    all.extend(middles);
                    ("PING".into(), all, None)
                }
            }
            Command::PONG(a, b) => match b {
                Some(token) => ("PONG".into(), m(&[a]), Some(token.clone())),
                None => ("PONG".into(), vec![], Some(a.clone())),
            },
            Command::CHATHISTORY(sub, params) => {
                let mut middles = m(&[sub]);
                middles.extend(params.iter().cloned());
                ("CHATHISTORY".into(), middles, None)
            }
            Command::BATCH(reference, params) => {
                let mut middles = m(&[reference]);
                middles.extend(params.iter().cloned());
                ("BATCH".into(), middles, None)
            }
            Command::KILL(target, reason) => {
                ("KILL".into(), m(&[target]), Some(reason.clone()))
            }
            Command::WALLOPS(text) => ("WALLOPS".into(), vec![], Some(text.clone())),
            Command::REHASH => ("REHASH".into(), vec![], None),
            Command::CHGHOST(user, host) => ("CHGHOST".into(), m(&[user, host]), None),
            Command::SQUIT(server, comment) => {
                ("SQUIT".into(), m(&[server]), comment.clone())
            }
            Command::PassTs6 { password, sid } => {
                ("PASS".into(), m(&[password, "TS", "6", sid]), None)
            }
            Command::CAPAB(tokens) => ("CAPAB".into(), vec![], Some(tokens.join(" "))),
            Command::SERVER(name, hop, sid, desc) => {
                let mut middles = vec![name.clone(), hop.to_string()];
                middles.extend(sid.iter().cloned());
                ("SERVER".into(), middles, Some(desc.clone()))
            }
            Command::SID(name, hop, sid, desc) => (
                "SID".into(),
                vec![name.clone(), hop.to_string(), sid.clone()],
                Some(desc.clone()),
            ),
            Command::UID(p) => (
                "UID".into(),
                vec![
                    p.nick.clone(),
                    p.hopcount.to_string(),
                    p.ts.to_string(),
                    p.user.clone(),
                    p.host.clone(),
                    p.uid.clone(),
                    p.svcstamp.clone(),
                    p.umodes.clone(),
                    p.vhost.clone(),
                ],
                Some(p.realname.clone()),
            ),
            Command::SJOIN(ts, chan, modes, args, members) => {
                let mut middles = vec![ts.to_string(), chan.clone(), modes.clone()];
                middles.extend(args.iter().cloned());
                let list = members
                    .iter()
                    .map(|(prefixes, uid)| format!("{prefixes}{uid}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                ("SJOIN".into(), middles, Some(list))
            }
            Command::TMODE(ts, chan, modes, args) => {
                let mut middles = vec![ts.to_string(), chan.clone(), modes.clone()];
                middles.extend(args.iter().cloned());
                ("TMODE".into(), middles, None)
            }
            Command::EOB => ("EOB".into(), vec![], None),
            Command::ENCAP(target, sub, params) => {
                let mut middles = m(&[target, sub]);
                middles.extend(params.iter().cloned());
                ("ENCAP".into(), middles, None)
            }
            Command::ERROR(msg) => ("ERROR".into(), vec![], Some(msg.clone())),
            Command::Response(resp, params) => {
                let mut middles = params.clone();
                let trailing = middles.pop();
                (resp.to_string(), middles, trailing)
            }
            Command::Raw(name, params) => {
                let mut middles = params.clone();
                let trailing = match middles.last() {
                    Some(last)
                        if last.is_empty() || last.contains(' ') || last.starts_with(':') =>
                    {
                        middles.pop()
                    }
                    _ => None,
                };
                (name.clone(), middles, trailing)
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, middles, trailing) = self.to_parts();
        f.write_str(&verb)?;
        for param in &middles {
            write!(f, " {param}")?;
        }
        if let Some(trailing) = trailing {
            write!(f, " :{trailing}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(verb: &str, args: &[&str]) -> Command {
        Command::new(verb, args.to_vec()).unwrap()
    }

    #[test]
    fn pass_client_vs_ts6() {
        assert_eq!(parse("PASS", &["hunter2"]), Command::PASS("hunter2".into()));
        assert_eq!(
            parse("PASS", &["hunter2", "TS", "6", "001"]),
            Command::PassTs6 {
                password: "hunter2".into(),
                sid: "001".into(),
            }
        );
    }

    #[test]
    fn mode_splits_on_target() {
        assert!(matches!(
            parse("MODE", &["#chan", "+o", "nick"]),
            Command::ChannelMODE(..)
        ));
        assert!(matches!(parse("MODE", &["nick", "+i"]), Command::UserMODE(..)));
    }

    #[test]
    fn short_commands_fall_back_to_raw() {
        assert!(matches!(parse("PRIVMSG", &["#chan"]), Command::Raw(..)));
        assert!(matches!(parse("KICK", &["#chan"]), Command::Raw(..)));
        assert!(matches!(parse("NICK", &[]), Command::Raw(..)));
    }

    #[test]
    fn uid_parses_all_fields() {
        let cmd = parse(
            "UID",
            &[
                "alice", "1", "50", "u", "h", "002AAAAAA", "0", "+i", "vh", "Al",
            ],
        );
        match cmd {
            Command::UID(p) => {
                assert_eq!(p.nick, "alice");
                assert_eq!(p.ts, 50);
                assert_eq!(p.uid, "002AAAAAA");
                assert_eq!(p.vhost, "vh");
                assert_eq!(p.realname, "Al");
            }
            other => panic!("expected UID, got {other:?}"),
        }
    }

    #[test]
    fn sjoin_member_prefixes() {
        let cmd = parse("SJOIN", &["150", "#c", "+ntk", "secret", "@002AAAAAA 002AAAAAB"]);
        match cmd {
            Command::SJOIN(ts, chan, modes, args, members) => {
                assert_eq!(ts, 150);
                assert_eq!(chan, "#c");
                assert_eq!(modes, "+ntk");
                assert_eq!(args, vec!["secret"]);
                assert_eq!(
                    members,
                    vec![
                        ("@".to_string(), "002AAAAAA".to_string()),
                        (String::new(), "002AAAAAB".to_string()),
                    ]
                );
            }
            other => panic!("expected SJOIN, got {other:?}"),
        }
    }

    #[test]
    fn sjoin_serializes_member_list_as_trailing() {
        let cmd = Command::SJOIN(
            150,
            "#c".into(),
            "+nt".into(),
            vec![],
            vec![("@".into(), "001AAAAAA".into()), ("".into(), "001AAAAAB".into())],
        );
        assert_eq!(cmd.to_string(), "SJOIN 150 #c +nt :@001AAAAAA 001AAAAAB");
    }

    #[test]
    fn numeric_becomes_response() {
        let cmd = parse("433", &["*", "bob", "Nickname is already in use"]);
        match cmd {
            Command::Response(Response::ERR_NICKNAMEINUSE, params) => {
                assert_eq!(params[1], "bob");
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn ping_pong_forms() {
        assert_eq!(
            parse("PING", &["token"]).to_string(),
            "PING :token"
        );
        assert_eq!(
            parse("PONG", &["srv", "token"]).to_string(),
            "PONG srv :token"
        );
    }

    #[test]
    fn privmsg_display() {
        let cmd = Command::PRIVMSG("#room".into(), "hi there".into());
        assert_eq!(cmd.to_string(), "PRIVMSG #room :hi there");
    }

    #[test]
    fn name_covers_mode_merge() {
        assert_eq!(parse("MODE", &["#c", "+m"]).name(), "MODE");
        assert_eq!(parse("MODE", &["nick"]).name(), "MODE");
        assert_eq!(parse("FROBNICATE", &["x"]).name(), "FROBNICATE");
    }
}
