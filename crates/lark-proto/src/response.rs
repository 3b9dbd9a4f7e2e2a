//! IRC numeric response codes.
//!
//! Numerics are three-digit codes sent by servers. This enum covers the set
//! the daemon emits: RFC 1459/2812 replies plus the IRCv3 MONITOR, SASL, and
//! caller-id ranges.

#![allow(non_camel_case_types)]

/// IRC server response code.
///
/// - 001-099: connection/registration
/// - 200-399: command replies
/// - 400-599: error replies
/// - 600-999: extended/modern numerics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
#[non_exhaustive]
pub enum Response {
    // === Connection registration ===
    /// 001 - Welcome to the network
    RPL_WELCOME = 1,
    /// 002 - Your host
    RPL_YOURHOST = 2,
    /// 003 - Server creation date
    RPL_CREATED = 3,
    /// 004 - Server info
    RPL_MYINFO = 4,
    /// 005 - ISUPPORT tokens
    RPL_ISUPPORT = 5,
    /// 042 - Your unique ID
    RPL_YOURID = 42,

    // === Command replies ===
    /// 200 - Trace link
    RPL_TRACELINK = 200,
    /// 205 - Trace user
    RPL_TRACEUSER = 205,
    /// 206 - Trace server
    RPL_TRACESERVER = 206,
    /// 212 - Stats command usage
    RPL_STATSCOMMANDS = 212,
    /// 216 - Stats K-line entry
    RPL_STATSKLINE = 216,
    /// 219 - End of stats
    RPL_ENDOFSTATS = 219,
    /// 221 - User mode string
    RPL_UMODEIS = 221,
    /// 242 - Server uptime
    RPL_STATSUPTIME = 242,
    /// 243 - Stats O-line entry
    RPL_STATSOLINE = 243,
    /// 251 - Luser client count
    RPL_LUSERCLIENT = 251,
    /// 252 - Luser operator count
    RPL_LUSEROP = 252,
    /// 253 - Luser unknown connections
    RPL_LUSERUNKNOWN = 253,
    /// 254 - Luser channel count
    RPL_LUSERCHANNELS = 254,
    /// 255 - Luser local summary
    RPL_LUSERME = 255,
    /// 256 - Admin info start
    RPL_ADMINME = 256,
    /// 257 - Admin location 1
    RPL_ADMINLOC1 = 257,
    /// 258 - Admin location 2
    RPL_ADMINLOC2 = 258,
    /// 259 - Admin email
    RPL_ADMINEMAIL = 259,
    /// 262 - Trace end
    RPL_TRACEEND = 262,
    /// 263 - Try again later
    RPL_TRYAGAIN = 263,
    /// 265 - Local user count
    RPL_LOCALUSERS = 265,
    /// 266 - Global user count
    RPL_GLOBALUSERS = 266,
    /// 276 - WHOIS certificate fingerprint
    RPL_WHOISCERTFP = 276,
    /// 281 - Accept list entry
    RPL_ACCEPTLIST = 281,
    /// 282 - End of accept list
    RPL_ENDOFACCEPT = 282,
    /// 301 - Away message
    RPL_AWAY = 301,
    /// 302 - Userhost reply
    RPL_USERHOST = 302,
    /// 303 - Ison reply
    RPL_ISON = 303,
    /// 305 - No longer away
    RPL_UNAWAY = 305,
    /// 306 - Now away
    RPL_NOWAWAY = 306,
    /// 311 - Whois user
    RPL_WHOISUSER = 311,
    /// 312 - Whois server
    RPL_WHOISSERVER = 312,
    /// 313 - Whois operator
    RPL_WHOISOPERATOR = 313,
    /// 314 - Whowas user
    RPL_WHOWASUSER = 314,
    /// 315 - End of WHO
    RPL_ENDOFWHO = 315,
    /// 317 - Whois idle time
    RPL_WHOISIDLE = 317,
    /// 318 - End of WHOIS
    RPL_ENDOFWHOIS = 318,
    /// 319 - Whois channels
    RPL_WHOISCHANNELS = 319,
    /// 321 - List start
    RPL_LISTSTART = 321,
    /// 322 - List entry
    RPL_LIST = 322,
    /// 323 - List end
    RPL_LISTEND = 323,
    /// 324 - Channel mode is
    RPL_CHANNELMODEIS = 324,
    /// 329 - Channel creation time
    RPL_CREATIONTIME = 329,
    /// 330 - Whois logged in as
    RPL_WHOISACCOUNT = 330,
    /// 331 - No topic set
    RPL_NOTOPIC = 331,
    /// 332 - Topic
    RPL_TOPIC = 332,
    /// 333 - Topic setter and time
    RPL_TOPICWHOTIME = 333,
    /// 338 - Whois actual host
    RPL_WHOISACTUALLY = 338,
    /// 341 - Inviting
    RPL_INVITING = 341,
    /// 346 - Invite list entry
    RPL_INVITELIST = 346,
    /// 347 - End of invite list
    RPL_ENDOFINVITELIST = 347,
    /// 348 - Except list entry
    RPL_EXCEPTLIST = 348,
    /// 349 - End of except list
    RPL_ENDOFEXCEPTLIST = 349,
    /// 351 - Version reply
    RPL_VERSION = 351,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - Names reply
    RPL_NAMREPLY = 353,
    /// 354 - WHOX reply
    RPL_WHOSPCRPL = 354,
    /// 364 - Links entry
    RPL_LINKS = 364,
    /// 365 - End of links
    RPL_ENDOFLINKS = 365,
    /// 366 - End of names
    RPL_ENDOFNAMES = 366,
    /// 367 - Ban list entry
    RPL_BANLIST = 367,
    /// 368 - End of ban list
    RPL_ENDOFBANLIST = 368,
    /// 369 - End of WHOWAS
    RPL_ENDOFWHOWAS = 369,
    /// 371 - Info line
    RPL_INFO = 371,
    /// 372 - MOTD line
    RPL_MOTD = 372,
    /// 374 - End of info
    RPL_ENDOFINFO = 374,
    /// 375 - MOTD start
    RPL_MOTDSTART = 375,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 378 - Whois connecting from
    RPL_WHOISHOST = 378,
    /// 381 - You are now an operator
    RPL_YOUREOPER = 381,
    /// 382 - Rehashing
    RPL_REHASHING = 382,
    /// 391 - Server time
    RPL_TIME = 391,

    // === Error replies ===
    /// 401 - No such nick/channel
    ERR_NOSUCHNICK = 401,
    /// 402 - No such server
    ERR_NOSUCHSERVER = 402,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - Cannot send to channel
    ERR_CANNOTSENDTOCHAN = 404,
    /// 405 - Too many channels
    ERR_TOOMANYCHANNELS = 405,
    /// 406 - Was no such nick
    ERR_WASNOSUCHNICK = 406,
    /// 407 - Too many targets
    ERR_TOOMANYTARGETS = 407,
    /// 409 - No origin specified
    ERR_NOORIGIN = 409,
    /// 410 - Invalid CAP subcommand
    ERR_INVALIDCAPCMD = 410,
    /// 411 - No recipient
    ERR_NORECIPIENT = 411,
    /// 412 - No text to send
    ERR_NOTEXTTOSEND = 412,
    /// 417 - Input line too long
    ERR_INPUTTOOLONG = 417,
    /// 421 - Unknown command
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - No MOTD
    ERR_NOMOTD = 422,
    /// 432 - Erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - Nickname in use
    ERR_NICKNAMEINUSE = 433,
    /// 436 - Nickname collision (KILL)
    ERR_NICKCOLLISION = 436,
    /// 441 - They aren't on that channel
    ERR_USERNOTINCHANNEL = 441,
    /// 442 - You're not on that channel
    ERR_NOTONCHANNEL = 442,
    /// 443 - Already on channel
    ERR_USERONCHANNEL = 443,
    /// 451 - Not registered
    ERR_NOTREGISTERED = 451,
    /// 461 - Not enough parameters
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - Already registered
    ERR_ALREADYREGISTERED = 462,
    /// 464 - Password mismatch
    ERR_PASSWDMISMATCH = 464,
    /// 465 - Banned from server
    ERR_YOUREBANNEDCREEP = 465,
    /// 470 - Forwarding to another channel
    ERR_LINKCHANNEL = 470,
    /// 471 - Channel is full
    ERR_CHANNELISFULL = 471,
    /// 472 - Unknown mode character
    ERR_UNKNOWNMODE = 472,
    /// 473 - Invite-only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key
    ERR_BADCHANNELKEY = 475,
    /// 476 - Bad channel mask
    ERR_BADCHANMASK = 476,
    /// 477 - Registered nickname required
    ERR_NEEDREGGEDNICK = 477,
    /// 478 - Ban list is full
    ERR_BANLISTFULL = 478,
    /// 481 - No privileges
    ERR_NOPRIVILEGES = 481,
    /// 482 - Channel operator privileges needed
    ERR_CHANOPRIVSNEEDED = 482,
    /// 483 - Cannot KILL a server
    ERR_CANTKILLSERVER = 483,
    /// 491 - No O-lines for your host
    ERR_NOOPERHOST = 491,
    /// 501 - Unknown user mode flag
    ERR_UMODEUNKNOWNFLAG = 501,
    /// 502 - Cannot change mode for other users
    ERR_USERSDONTMATCH = 502,

    // === Extended / modern ===
    /// 671 - Whois secure connection
    RPL_WHOISSECURE = 671,
    /// 716 - Target has caller-id enabled
    RPL_TARGUMODEG = 716,
    /// 717 - Target has been notified
    RPL_TARGNOTIFY = 717,
    /// 718 - A user is messaging you (caller-id)
    RPL_UMODEGMSG = 718,
    /// 730 - Monitored nick online
    RPL_MONONLINE = 730,
    /// 731 - Monitored nick offline
    RPL_MONOFFLINE = 731,
    /// 732 - Monitor list entry
    RPL_MONLIST = 732,
    /// 733 - End of monitor list
    RPL_ENDOFMONLIST = 733,
    /// 734 - Monitor list full
    ERR_MONLISTFULL = 734,
    /// 900 - Logged in
    RPL_LOGGEDIN = 900,
    /// 901 - Logged out
    RPL_LOGGEDOUT = 901,
    /// 902 - Nick locked
    ERR_NICKLOCKED = 902,
    /// 903 - SASL successful
    RPL_SASLSUCCESS = 903,
    /// 904 - SASL failed
    ERR_SASLFAIL = 904,
    /// 905 - SASL message too long
    ERR_SASLTOOLONG = 905,
    /// 906 - SASL aborted
    ERR_SASLABORTED = 906,
    /// 907 - SASL already authenticated
    ERR_SASLALREADY = 907,
    /// 908 - Available SASL mechanisms
    RPL_SASLMECHS = 908,
}

impl Response {
    /// The numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// True for codes in the 400-599 error range.
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }

    /// Look up a response by numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        ALL.iter().copied().find(|r| r.code() == code)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

const ALL: &[Response] = &[
    Response::RPL_WELCOME,
    Response::RPL_YOURHOST,
    Response::RPL_CREATED,
    Response::RPL_MYINFO,
    Response::RPL_ISUPPORT,
    Response::RPL_YOURID,
    Response::RPL_TRACELINK,
    Response::RPL_TRACEUSER,
    Response::RPL_TRACESERVER,
    Response::RPL_STATSCOMMANDS,
    Response::RPL_STATSKLINE,
    Response::RPL_ENDOFSTATS,
    Response::RPL_UMODEIS,
    Response::RPL_STATSUPTIME,
    Response::RPL_STATSOLINE,
    Response::RPL_LUSERCLIENT,
    Response::RPL_LUSEROP,
    Response::RPL_LUSERUNKNOWN,
    Response::RPL_LUSERCHANNELS,
    Response::RPL_LUSERME,
    Response::RPL_ADMINME,
    Response::RPL_ADMINLOC1,
    Response::RPL_ADMINLOC2,
    Response::RPL_ADMINEMAIL,
    Response::RPL_TRACEEND,
    Response::RPL_TRYAGAIN,
    Response::RPL_LOCALUSERS,
    Response::RPL_GLOBALUSERS,
    Response::RPL_WHOISCERTFP,
    Response::RPL_ACCEPTLIST,
    Response::RPL_ENDOFACCEPT,
    Response::RPL_AWAY,
    Response::RPL_USERHOST,
    Response::RPL_ISON,
    Response::RPL_UNAWAY,
    Response::RPL_NOWAWAY,
    Response::RPL_WHOISUSER,
    Response::RPL_WHOISSERVER,
    Response::RPL_WHOISOPERATOR,
    Response::RPL_WHOWASUSER,
    Response::RPL_ENDOFWHO,
    Response::RPL_WHOISIDLE,
    Response::RPL_ENDOFWHOIS,
    Response::RPL_WHOISCHANNELS,
    Response::RPL_LISTSTART,
    Response::RPL_LIST,
    Response::RPL_LISTEND,
    Response::RPL_CHANNELMODEIS,
    Response::RPL_CREATIONTIME,
    Response::RPL_WHOISACCOUNT,
    Response::RPL_NOTOPIC,
    Response::RPL_TOPIC,
    Response::RPL_TOPICWHOTIME,
    Response::RPL_WHOISACTUALLY,
    Response::RPL_INVITING,
    Response::RPL_INVITELIST,
    Response::RPL_ENDOFINVITELIST,
    Response::RPL_EXCEPTLIST,
    Response::RPL_ENDOFEXCEPTLIST,
    Response::RPL_VERSION,
    Response::RPL_WHOREPLY,
    Response::RPL_NAMREPLY,
    Response::RPL_WHOSPCRPL,
    Response::RPL_LINKS,
    Response::RPL_ENDOFLINKS,
    Response::RPL_ENDOFNAMES,
    Response::RPL_BANLIST,
    Response::RPL_ENDOFBANLIST,
    Response::RPL_ENDOFWHOWAS,
    Response::RPL_INFO,
    Response::RPL_MOTD,
    Response::RPL_ENDOFINFO,
    Response::RPL_MOTDSTART,
    Response::RPL_ENDOFMOTD,
    Response::RPL_WHOISHOST,
    Response::RPL_YOUREOPER,
    Response::RPL_REHASHING,
    Response::RPL_TIME,
    Response::ERR_NOSUCHNICK,
    Response::ERR_NOSUCHSERVER,
    Response::ERR_NOSUCHCHANNEL,
    Response::ERR_CANNOTSENDTOCHAN,
    Response::ERR_TOOMANYCHANNELS,
    Response::ERR_WASNOSUCHNICK,
    Response::ERR_TOOMANYTARGETS,
    Response::ERR_NOORIGIN,
    Response::ERR_INVALIDCAPCMD,
    Response::ERR_NORECIPIENT,
    Response::ERR_NOTEXTTOSEND,
    Response::ERR_INPUTTOOLONG,
    Response::ERR_UNKNOWNCOMMAND,
    Response::ERR_NOMOTD,
    Response::ERR_ERRONEUSNICKNAME,
    Response::ERR_NICKNAMEINUSE,
    Response::ERR_NICKCOLLISION,
    Response::ERR_USERNOTINCHANNEL,
    Response::ERR_NOTONCHANNEL,
    Response::ERR_USERONCHANNEL,
    Response::ERR_NOTREGISTERED,
    Response::ERR_NEEDMOREPARAMS,
    Response::ERR_ALREADYREGISTERED,
    Response::ERR_PASSWDMISMATCH,
    Response::ERR_YOUREBANNEDCREEP,
    Response::ERR_LINKCHANNEL,
    Response::ERR_CHANNELISFULL,
    Response::ERR_UNKNOWNMODE,
    Response::ERR_INVITEONLYCHAN,
    Response::ERR_BANNEDFROMCHAN,
    Response::ERR_BADCHANNELKEY,
    Response::ERR_BADCHANMASK,
    Response::ERR_NEEDREGGEDNICK,
    Response::ERR_BANLISTFULL,
    Response::ERR_NOPRIVILEGES,
    Response::ERR_CHANOPRIVSNEEDED,
    Response::ERR_CANTKILLSERVER,
    Response::ERR_NOOPERHOST,
    Response::ERR_UMODEUNKNOWNFLAG,
    Response::ERR_USERSDONTMATCH,
    Response::RPL_WHOISSECURE,
    Response::RPL_TARGUMODEG,
    Response::RPL_TARGNOTIFY,
    Response::RPL_UMODEGMSG,
    Response::RPL_MONONLINE,
    Response::RPL_MONOFFLINE,
    Response::RPL_MONLIST,
    Response::RPL_ENDOFMONLIST,
    Response::ERR_MONLISTFULL,
    Response::RPL_LOGGEDIN,
    Response::RPL_LOGGEDOUT,
    Response::ERR_NICKLOCKED,
    Response::RPL_SASLSUCCESS,
    Response::ERR_SASLFAIL,
    Response::ERR_SASLTOOLONG,
    Response::ERR_SASLABORTED,
    Response::ERR_SASLALREADY,
    Response::RPL_SASLMECHS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_zero_padded() {
        assert_eq!(Response::RPL_WELCOME.to_string(), "001");
        assert_eq!(Response::RPL_UMODEIS.to_string(), "221");
        assert_eq!(Response::ERR_NICKNAMEINUSE.to_string(), "433");
    }

    #[test]
    fn from_code_round_trips() {
        for &r in ALL {
            assert_eq!(Response::from_code(r.code()), Some(r));
        }
        assert_eq!(Response::from_code(999), None);
    }

    #[test]
    fn error_range() {
        assert!(Response::ERR_NEEDMOREPARAMS.is_error());
        assert!(!Response::RPL_TOPIC.is_error());
        assert!(!Response::RPL_MONONLINE.is_error());
    }
}
