//! User session state.

use std::collections::HashSet;

use lark_proto::mode::{ModeAction, USER_MODES};
use lark_proto::Prefix;
use uuid::Uuid;

/// A user's UID. The first three characters are the owning server's SID.
pub type Uid = String;

/// A connected (or remotely-introduced) user.
#[derive(Debug)]
pub struct User {
    pub uid: Uid,
    /// Current nickname (case preserved).
    pub nick: String,
    /// Ident/username.
    pub user: String,
    pub realname: String,
    /// Real hostname.
    pub host: String,
    /// Real IP address.
    pub ip: String,
    /// Displayed (cloaked) hostname.
    pub visible_host: String,
    /// Owning server's SID.
    pub server: String,
    /// Guards against stale session writes after reconnects.
    pub session_id: Uuid,
    /// Channels this user is in (folded names).
    pub channels: HashSet<String>,
    pub modes: UserModes,
    /// Account name when identified.
    pub account: Option<String>,
    /// Away message; present iff `modes.away` is set.
    pub away: Option<String>,
    /// Negotiated IRCv3 capabilities.
    pub caps: HashSet<String>,
    /// Caller-id accept list (folded nicks).
    pub accept_list: HashSet<String>,
    /// Connect time, unix seconds. The S2S collision tiebreaker.
    pub connected_at: i64,
    /// Last command time, unix seconds (WHOIS idle).
    pub last_activity: i64,
}

impl User {
    /// The `nick!user@visible-host` form used as a message source.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.user, self.visible_host)
    }

    /// The user's identity as a message prefix.
    pub fn prefix(&self) -> Prefix {
        Prefix::new(self.nick.clone(), self.user.clone(), self.visible_host.clone())
    }

    /// True when this capability was negotiated.
    pub fn has_cap(&self, cap: &str) -> bool {
        self.caps.contains(cap)
    }

    /// True when this user is owned by the server with `sid`.
    pub fn is_local_to(&self, sid: &str) -> bool {
        self.server == sid
    }
}

/// User mode flags.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserModes {
    pub invisible: bool,  // +i
    pub wallops: bool,    // +w
    pub oper: bool,       // +o
    pub registered: bool, // +r
    pub secure: bool,     // +Z
    pub away: bool,       // +a, synced with the away message
    pub bot: bool,        // +B
    pub callerid: bool,   // +g
}

impl UserModes {
    /// Render as `+iw` form; a bare `+` when nothing is set.
    pub fn as_mode_string(&self) -> String {
        let mut out = String::from("+");
        for &mode in USER_MODES {
            if self.get(mode) {
                out.push(mode);
            }
        }
        out
    }

    /// Read one flag.
    pub fn get(&self, mode: char) -> bool {
        match mode {
            'i' => self.invisible,
            'w' => self.wallops,
            'o' => self.oper,
            'r' => self.registered,
            'Z' => self.secure,
            'a' => self.away,
            'B' => self.bot,
            'g' => self.callerid,
            _ => false,
        }
    }

    /// Write one flag. Returns false for unknown modes.
    pub fn set(&mut self, mode: char, value: bool) -> bool {
        match mode {
            'i' => self.invisible = value,
            'w' => self.wallops = value,
            'o' => self.oper = value,
            'r' => self.registered = value,
            'Z' => self.secure = value,
            'a' => self.away = value,
            'B' => self.bot = value,
            'g' => self.callerid = value,
            _ => return false,
        }
        true
    }

    /// Apply a tokenized change.
    pub fn apply(&mut self, action: ModeAction, mode: char) -> bool {
        self.set(mode, action == ModeAction::Add)
    }

    /// Parse a `+iw`-style string (S2S UID introductions).
    pub fn from_mode_string(s: &str) -> Self {
        let mut modes = UserModes::default();
        for c in s.chars() {
            if c != '+' {
                modes.set(c, true);
            }
        }
        modes
    }
}

/// A WHOWAS history entry.
#[derive(Debug, Clone)]
pub struct WhowasEntry {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub realname: String,
    /// Unix seconds at disconnect.
    pub logout_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_string_default_is_bare_plus() {
        assert_eq!(UserModes::default().as_mode_string(), "+");
    }

    #[test]
    fn mode_string_orders_by_registry() {
        let modes = UserModes {
            invisible: true,
            oper: true,
            secure: true,
            ..Default::default()
        };
        assert_eq!(modes.as_mode_string(), "+ioZ");
    }

    #[test]
    fn mode_string_round_trips() {
        let modes = UserModes {
            invisible: true,
            wallops: true,
            bot: true,
            callerid: true,
            ..Default::default()
        };
        assert_eq!(UserModes::from_mode_string(&modes.as_mode_string()), modes);
    }

    #[test]
    fn set_rejects_unknown() {
        let mut modes = UserModes::default();
        assert!(!modes.set('x', true));
        assert!(modes.set('i', true));
        assert!(modes.get('i'));
    }
}
