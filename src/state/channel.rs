//! Channel state.

use std::collections::{HashMap, HashSet};

use lark_proto::matches_hostmask;

use crate::policy::flood::{FloodSettings, FloodTracker};
use crate::policy::throttle::{JoinWindow, ThrottleSettings};
use crate::state::user::Uid;

/// Membership prefix modes, highest rank first: `~q &a @o %h +v`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberModes {
    pub owner: bool,
    pub admin: bool,
    pub op: bool,
    pub halfop: bool,
    pub voice: bool,
}

impl MemberModes {
    /// Membership with operator status (channel creator).
    pub fn op() -> Self {
        MemberModes {
            op: true,
            ..Default::default()
        }
    }

    /// All prefix sigils, highest to lowest (multi-prefix output).
    pub fn prefix_string(&self) -> String {
        let mut out = String::new();
        if self.owner {
            out.push('~');
        }
        if self.admin {
            out.push('&');
        }
        if self.op {
            out.push('@');
        }
        if self.halfop {
            out.push('%');
        }
        if self.voice {
            out.push('+');
        }
        out
    }

    /// The single highest sigil (classic NAMES output).
    pub fn highest_prefix(&self) -> Option<char> {
        self.prefix_string().chars().next()
    }

    /// Voice or any higher rank.
    pub fn can_speak_when_moderated(&self) -> bool {
        self.voice || self.halfop || self.op || self.admin || self.owner
    }

    /// Halfop or higher.
    pub fn is_privileged(&self) -> bool {
        self.halfop || self.op || self.admin || self.owner
    }

    /// Op or higher.
    pub fn is_op(&self) -> bool {
        self.op || self.admin || self.owner
    }

    /// Read a flag by membership mode letter (`qaohv`).
    pub fn get(&self, mode: char) -> bool {
        match mode {
            'q' => self.owner,
            'a' => self.admin,
            'o' => self.op,
            'h' => self.halfop,
            'v' => self.voice,
            _ => false,
        }
    }

    /// Write a flag by letter. Returns false for unknown letters.
    pub fn set(&mut self, mode: char, value: bool) -> bool {
        match mode {
            'q' => self.owner = value,
            'a' => self.admin = value,
            'o' => self.op = value,
            'h' => self.halfop = value,
            'v' => self.voice = value,
            _ => return false,
        }
        true
    }

    /// Build from an SJOIN prefix run (`@+`, `~`, ...).
    pub fn from_prefixes(prefixes: &str) -> Self {
        let mut modes = MemberModes::default();
        for c in prefixes.chars() {
            match c {
                '~' => modes.owner = true,
                '&' => modes.admin = true,
                '@' => modes.op = true,
                '%' => modes.halfop = true,
                '+' => modes.voice = true,
                _ => {}
            }
        }
        modes
    }

    /// True when no prefix is held.
    pub fn is_none(&self) -> bool {
        *self == MemberModes::default()
    }
}

/// A channel topic with provenance.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// One entry in a ban/except/invite list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub mask: String,
    pub setter: String,
    pub set_at: i64,
}

/// Channel mode flags and parameters.
#[derive(Debug, Default, Clone)]
pub struct ChannelModes {
    pub invite_only: bool,     // +i
    pub moderated: bool,       // +m
    pub no_external: bool,     // +n
    pub private: bool,         // +p
    pub secret: bool,          // +s
    pub topic_lock: bool,      // +t
    pub registered_only: bool, // +R
    pub no_color: bool,        // +c
    pub no_ctcp: bool,         // +C
    pub tls_only: bool,        // +S
    pub delayed_join: bool,    // +D
    pub key: Option<String>,               // +k
    pub limit: Option<u32>,                // +l
    pub flood: Option<FloodSettings>,      // +f
    pub throttle: Option<ThrottleSettings>, // +j
    pub forward: Option<String>,           // +F (on ban/invite/key failure)
    pub redirect: Option<String>,          // +L (on limit failure)
}

impl ChannelModes {
    /// Read a flag-class mode.
    pub fn get_flag(&self, mode: char) -> bool {
        match mode {
            'i' => self.invite_only,
            'm' => self.moderated,
            'n' => self.no_external,
            'p' => self.private,
            's' => self.secret,
            't' => self.topic_lock,
            'R' => self.registered_only,
            'c' => self.no_color,
            'C' => self.no_ctcp,
            'S' => self.tls_only,
            'D' => self.delayed_join,
            _ => false,
        }
    }

    /// Write a flag-class mode. Returns false for unknown letters.
    pub fn set_flag(&mut self, mode: char, value: bool) -> bool {
        match mode {
            'i' => self.invite_only = value,
            'm' => self.moderated = value,
            'n' => self.no_external = value,
            'p' => self.private = value,
            's' => self.secret = value,
            't' => self.topic_lock = value,
            'R' => self.registered_only = value,
            'c' => self.no_color = value,
            'C' => self.no_ctcp = value,
            'S' => self.tls_only = value,
            'D' => self.delayed_join = value,
            _ => return false,
        }
        true
    }

    /// Render as `["+ntk", "secret", ...]`.
    ///
    /// The key value is replaced with `*` unless `show_key` (members see the
    /// real key, outsiders do not).
    pub fn summary(&self, show_key: bool) -> Vec<String> {
        let mut word = String::from("+");
        let mut params: Vec<String> = Vec::new();
        for flag in ['c', 'C', 'D', 'i', 'm', 'n', 'p', 'R', 's', 'S', 't'] {
            if self.get_flag(flag) {
                word.push(flag);
            }
        }
        if let Some(ref f) = self.flood {
            word.push('f');
            params.push(f.to_string());
        }
        if let Some(ref j) = self.throttle {
            word.push('j');
            params.push(j.to_string());
        }
        if let Some(ref key) = self.key {
            word.push('k');
            params.push(if show_key { key.clone() } else { "*".to_string() });
        }
        if let Some(limit) = self.limit {
            word.push('l');
            params.push(limit.to_string());
        }
        if let Some(ref target) = self.forward {
            word.push('F');
            params.push(target.clone());
        }
        if let Some(ref target) = self.redirect {
            word.push('L');
            params.push(target.clone());
        }
        let mut out = vec![word];
        out.extend(params);
        out
    }

    /// Replace everything with a parsed S2S mode image (SJOIN adopt).
    pub fn clear(&mut self) {
        *self = ChannelModes::default();
    }
}

/// Why a JOIN was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDenial {
    Banned,
    InviteOnly,
    BadKey,
    Full,
    Throttled,
    NeedRegged,
}

/// A channel and its members.
#[derive(Debug)]
pub struct Channel {
    /// Display name (case preserved).
    pub name: String,
    /// Creation timestamp, unix seconds. The S2S merge key.
    pub created_at: i64,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    pub bans: Vec<ListEntry>,
    pub excepts: Vec<ListEntry>,
    pub invites: Vec<ListEntry>,
    /// Members and their prefix modes.
    pub members: HashMap<Uid, MemberModes>,
    /// Users granted INVITE (cleared on join).
    pub invited: HashSet<Uid>,
    /// Members still concealed by +D.
    pub hidden: HashSet<Uid>,
    /// +j sliding window.
    pub join_window: JoinWindow,
    /// +f per-user windows.
    pub flood: FloodTracker,
    /// Setter mask and time of the most recent mode change.
    pub mode_set_by: Option<(String, i64)>,
    /// True when backed by a registration record (survives emptiness).
    pub registered: bool,
}

impl Channel {
    /// Create a channel at `now`.
    pub fn new(name: impl Into<String>, now: i64) -> Self {
        Channel {
            name: name.into(),
            created_at: now,
            topic: None,
            modes: ChannelModes::default(),
            bans: Vec::new(),
            excepts: Vec::new(),
            invites: Vec::new(),
            members: HashMap::new(),
            invited: HashSet::new(),
            hidden: HashSet::new(),
            join_window: JoinWindow::default(),
            flood: FloodTracker::default(),
            mode_set_by: None,
            registered: false,
        }
    }

    /// A member's modes, if present.
    pub fn member(&self, uid: &str) -> Option<MemberModes> {
        self.members.get(uid).copied()
    }

    /// Add a member. First joiner of an unregistered channel gets ops.
    pub fn add_member(&mut self, uid: &Uid, modes: MemberModes) {
        self.members.insert(uid.clone(), modes);
        self.invited.remove(uid);
        if self.modes.delayed_join && modes.is_none() {
            self.hidden.insert(uid.clone());
        }
    }

    /// Remove a member; returns true when the channel is now empty.
    pub fn remove_member(&mut self, uid: &str) -> bool {
        self.members.remove(uid);
        self.hidden.remove(uid);
        self.flood.forget(uid);
        self.members.is_empty()
    }

    /// True when the channel should be destroyed.
    pub fn should_destroy(&self) -> bool {
        self.members.is_empty() && !self.registered
    }

    /// Match a user against the ban list, honoring exceptions.
    pub fn is_banned(&self, nick: &str, user: &str, host: &str) -> bool {
        let hit = |list: &[ListEntry]| {
            list.iter()
                .any(|entry| matches_hostmask(&entry.mask, nick, user, host))
        };
        hit(&self.bans) && !hit(&self.excepts)
    }

    /// Match a user against the invite-exception list (+I).
    pub fn matches_invex(&self, nick: &str, user: &str, host: &str) -> bool {
        self.invites
            .iter()
            .any(|entry| matches_hostmask(&entry.mask, nick, user, host))
    }

    /// Evaluate every join precondition except forwards/redirects, which
    /// the JOIN handler resolves from the returned denial.
    #[allow(clippy::too_many_arguments)]
    pub fn check_join(
        &mut self,
        uid: &str,
        nick: &str,
        user: &str,
        host: &str,
        key: Option<&str>,
        identified: bool,
        now: i64,
    ) -> Result<(), JoinDenial> {
        if self.is_banned(nick, user, host) {
            return Err(JoinDenial::Banned);
        }
        if self.modes.invite_only
            && !self.invited.contains(uid)
            && !self.matches_invex(nick, user, host)
        {
            return Err(JoinDenial::InviteOnly);
        }
        if let Some(ref required) = self.modes.key {
            if key != Some(required.as_str()) {
                return Err(JoinDenial::BadKey);
            }
        }
        if self.modes.registered_only && !identified {
            return Err(JoinDenial::NeedRegged);
        }
        if let Some(limit) = self.modes.limit {
            if self.members.len() as u32 >= limit {
                return Err(JoinDenial::Full);
            }
        }
        if let Some(throttle) = self.modes.throttle {
            if !self.join_window.check(throttle, now) {
                return Err(JoinDenial::Throttled);
            }
        }
        Ok(())
    }

    /// Members visible in NAMES: everyone except +D-hidden users. Hidden
    /// members are only ever listed to themselves.
    pub fn visible_members(&self) -> Vec<(&Uid, &MemberModes)> {
        self.members
            .iter()
            .filter(|(uid, _)| !self.hidden.contains(*uid))
            .collect()
    }

    /// Reveal a +D-hidden member. Returns true when they were hidden.
    pub fn reveal(&mut self, uid: &str) -> bool {
        self.hidden.remove(uid)
    }
}
