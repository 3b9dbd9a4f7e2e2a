//! Timestamp-based conflict resolution.
//!
//! Nick collisions: the strictly older connect timestamp survives; on
//! equal timestamps the lexicographically smaller UID survives; when both
//! are equal, both sides are killed. The outcome is a pure function of the
//! two (ts, uid) pairs, so both servers reach the same verdict whatever
//! order the introductions arrive in.
//!
//! Channel merges: the older creation timestamp owns the channel's modes;
//! the younger side's membership joins without prefixes. Equal timestamps
//! union both.

use lark_proto::mode::{parse_channel_modes, ModeAction};

use crate::state::channel::{Channel, MemberModes};
use crate::state::user::Uid;

/// Verdict for a nickname collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// The existing (local) user survives; reject the incomer.
    ExistingWins,
    /// The incoming user survives; kill the existing one.
    IncomingWins,
    /// Exact tie: kill both sides.
    BothDie,
}

/// Resolve a collision between an existing user and an incoming
/// introduction.
pub fn resolve_collision(
    existing_ts: i64,
    existing_uid: &str,
    incoming_ts: i64,
    incoming_uid: &str,
) -> Collision {
    match existing_ts.cmp(&incoming_ts) {
        std::cmp::Ordering::Less => Collision::ExistingWins,
        std::cmp::Ordering::Greater => Collision::IncomingWins,
        std::cmp::Ordering::Equal => match existing_uid.cmp(incoming_uid) {
            std::cmp::Ordering::Less => Collision::ExistingWins,
            std::cmp::Ordering::Greater => Collision::IncomingWins,
            std::cmp::Ordering::Equal => Collision::BothDie,
        },
    }
}

/// What an SJOIN merge did to the local channel.
#[derive(Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Remote was older: local modes were replaced and local prefixes
    /// stripped.
    pub adopted_remote: bool,
    /// Members added by the merge, with the prefixes they ended up with.
    pub added: Vec<(Uid, MemberModes)>,
}

/// Apply an incoming SJOIN to an existing channel.
pub fn merge_sjoin(
    chan: &mut Channel,
    remote_ts: i64,
    mode_word: &str,
    mode_args: &[String],
    members: &[(String, String)],
) -> MergeOutcome {
    let adopted_remote = remote_ts < chan.created_at;
    let equal = remote_ts == chan.created_at;

    if adopted_remote {
        // Remote owns the channel: adopt its modes wholesale and demote
        // every local member.
        chan.created_at = remote_ts;
        chan.modes.clear();
        apply_mode_image(chan, mode_word, mode_args);
        for modes in chan.members.values_mut() {
            *modes = MemberModes::default();
        }
    } else if equal {
        apply_mode_image(chan, mode_word, mode_args);
    }
    // remote_ts > chan.created_at: keep local modes untouched.

    let keep_prefixes = adopted_remote || equal;
    let mut added = Vec::new();
    for (prefixes, uid) in members {
        let modes = if keep_prefixes {
            MemberModes::from_prefixes(prefixes)
        } else {
            MemberModes::default()
        };
        chan.add_member(uid, modes);
        added.push((uid.clone(), modes));
    }

    MergeOutcome {
        adopted_remote,
        added,
    }
}

/// Apply a `+ntk key`-style mode image onto a channel.
pub fn apply_mode_image(chan: &mut Channel, mode_word: &str, mode_args: &[String]) {
    let mut args = vec![mode_word.to_string()];
    args.extend(mode_args.iter().cloned());
    let (changes, _unknown) = parse_channel_modes(&args, usize::MAX);
    for change in changes {
        let adding = change.action == ModeAction::Add;
        match change.mode {
            'k' => {
                chan.modes.key = if adding { change.param.clone() } else { None };
            }
            'l' => {
                chan.modes.limit = if adding {
                    change.param.as_deref().and_then(|p| p.parse().ok())
                } else {
                    None
                };
            }
            'f' => {
                chan.modes.flood = if adding {
                    change.param.as_deref().and_then(|p| p.parse().ok())
                } else {
                    None
                };
            }
            'j' => {
                chan.modes.throttle = if adding {
                    change.param.as_deref().and_then(|p| p.parse().ok())
                } else {
                    None
                };
            }
            'F' => {
                chan.modes.forward = if adding { change.param.clone() } else { None };
            }
            'L' => {
                chan.modes.redirect = if adding { change.param.clone() } else { None };
            }
            'b' | 'e' | 'I' | 'q' | 'a' | 'o' | 'h' | 'v' => {}
            flag => {
                chan.modes.set_flag(flag, adding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Collision determinism (spec-critical) ---

    #[test]
    fn older_timestamp_wins() {
        assert_eq!(
            resolve_collision(100, "001AAAAAA", 50, "002AAAAAA"),
            Collision::IncomingWins
        );
        assert_eq!(
            resolve_collision(50, "001AAAAAA", 100, "002AAAAAA"),
            Collision::ExistingWins
        );
    }

    #[test]
    fn equal_ts_lower_uid_wins() {
        assert_eq!(
            resolve_collision(100, "001AAAAAA", 100, "002AAAAAA"),
            Collision::ExistingWins
        );
        assert_eq!(
            resolve_collision(100, "002AAAAAA", 100, "001AAAAAA"),
            Collision::IncomingWins
        );
    }

    #[test]
    fn exact_tie_kills_both() {
        assert_eq!(
            resolve_collision(100, "001AAAAAA", 100, "001AAAAAA"),
            Collision::BothDie
        );
    }

    /// The verdict must be identical whichever side evaluates it.
    #[test]
    fn order_independent() {
        let cases = [
            (100, "001AAAAAA", 50, "002AAAAAA"),
            (100, "001AAAAAA", 100, "002AAAAAA"),
            (77, "003ZZZZZZ", 77, "003ZZZZZZ"),
            (1, "001AAAAAB", 2, "001AAAAAC"),
        ];
        for (ts_a, uid_a, ts_b, uid_b) in cases {
            let forward = resolve_collision(ts_a, uid_a, ts_b, uid_b);
            let reverse = resolve_collision(ts_b, uid_b, ts_a, uid_a);
            let consistent = matches!(
                (forward, reverse),
                (Collision::ExistingWins, Collision::IncomingWins)
                    | (Collision::IncomingWins, Collision::ExistingWins)
                    | (Collision::BothDie, Collision::BothDie)
            );
            assert!(consistent, "{forward:?} vs {reverse:?} for {uid_a}/{uid_b}");
        }
    }

    // --- SJOIN merge semantics ---

    fn existing_channel() -> Channel {
        let mut chan = Channel::new("#c", 200);
        chan.modes.no_external = true;
        chan.modes.topic_lock = true;
        chan.add_member(&"001AAAAAA".to_string(), MemberModes::op());
        chan
    }

    #[test]
    fn remote_older_adopts_modes_and_strips_local_prefixes() {
        let mut chan = existing_channel();
        let outcome = merge_sjoin(
            &mut chan,
            150,
            "+ntk",
            &["secret".to_string()],
            &[
                ("@".to_string(), "002AAAAAA".to_string()),
                (String::new(), "002AAAAAB".to_string()),
            ],
        );

        assert!(outcome.adopted_remote);
        assert_eq!(chan.created_at, 150);
        assert_eq!(chan.modes.key.as_deref(), Some("secret"));
        assert!(chan.modes.no_external && chan.modes.topic_lock);
        // Local member kept, but demoted.
        assert!(chan.member("001AAAAAA").unwrap().is_none());
        // Remote op retained.
        assert!(chan.member("002AAAAAA").unwrap().op);
        assert!(chan.member("002AAAAAB").unwrap().is_none());
        assert_eq!(chan.members.len(), 3);
    }

    #[test]
    fn remote_newer_keeps_local_modes_and_strips_remote_prefixes() {
        let mut chan = existing_channel();
        let outcome = merge_sjoin(
            &mut chan,
            300,
            "+ik",
            &["other".to_string()],
            &[("@".to_string(), "002AAAAAA".to_string())],
        );

        assert!(!outcome.adopted_remote);
        assert_eq!(chan.created_at, 200);
        assert!(chan.modes.key.is_none());
        assert!(!chan.modes.invite_only);
        assert!(chan.member("001AAAAAA").unwrap().op);
        assert!(chan.member("002AAAAAA").unwrap().is_none());
    }

    #[test]
    fn equal_ts_unions_modes_and_prefixes() {
        let mut chan = existing_channel();
        merge_sjoin(
            &mut chan,
            200,
            "+m",
            &[],
            &[("+".to_string(), "002AAAAAA".to_string())],
        );

        assert_eq!(chan.created_at, 200);
        assert!(chan.modes.moderated);
        assert!(chan.modes.no_external); // local mode retained
        assert!(chan.member("001AAAAAA").unwrap().op);
        assert!(chan.member("002AAAAAA").unwrap().voice);
    }
}
