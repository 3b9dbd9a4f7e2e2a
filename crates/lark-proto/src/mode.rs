//! Channel and user mode tokenization.
//!
//! `MODE` arguments arrive as a mode word (`+ov-k`) followed by positional
//! parameters. The tokenizer pairs each mode character with its parameter
//! according to its class, honoring a per-line change budget (ISUPPORT
//! `MODES`). Semantics live in the daemon; this layer only pairs tokens.

/// Direction of a mode change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeAction {
    /// `+`
    Add,
    /// `-`
    Remove,
}

/// A single tokenized mode change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// Direction.
    pub action: ModeAction,
    /// The mode character.
    pub mode: char,
    /// Its parameter, when the class takes one and one was supplied.
    pub param: Option<String>,
}

/// How a channel mode consumes parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamClass {
    /// `b`, `e`, `I` — mask collections; parameter on change, none on query.
    List,
    /// `q a o h v` — membership prefixes; always take a parameter.
    Member,
    /// Parameter required when setting, optional when clearing (`k`, `f`,
    /// `j`, `F`, `L`).
    SetParam,
    /// `l` — parameter when setting, none when clearing.
    Limit,
    /// Plain flag.
    Flag,
    /// Not a recognized channel mode.
    Unknown,
}

/// Classify a channel mode character.
///
/// Mirrors `CHANMODES=beI,k,l,cCimnpRsSt` plus the policy modes `f j F L D`
/// and the membership prefixes.
pub fn channel_param_class(mode: char) -> ParamClass {
    match mode {
        'b' | 'e' | 'I' => ParamClass::List,
        'q' | 'a' | 'o' | 'h' | 'v' => ParamClass::Member,
        'k' | 'f' | 'j' | 'F' | 'L' => ParamClass::SetParam,
        'l' => ParamClass::Limit,
        'c' | 'C' | 'i' | 'm' | 'n' | 'p' | 'R' | 's' | 'S' | 't' | 'D' => ParamClass::Flag,
        _ => ParamClass::Unknown,
    }
}

/// Recognized user mode characters.
pub const USER_MODES: &[char] = &['i', 'w', 'o', 'r', 'Z', 'a', 'B', 'g'];

/// Tokenize channel mode arguments.
///
/// Returns the accepted changes (at most `budget`) and any unknown mode
/// characters encountered. A `Member`-class mode without a parameter is
/// dropped; a `List`-class mode without a parameter is kept (it is a list
/// query). Changes beyond the budget are discarded.
pub fn parse_channel_modes(args: &[String], budget: usize) -> (Vec<ModeChange>, Vec<char>) {
    let mut changes = Vec::new();
    let mut unknown = Vec::new();
    let mut action = ModeAction::Add;

    let mut params = args.iter().skip(1);
    let Some(word) = args.first() else {
        return (changes, unknown);
    };

    for mode in word.chars() {
        match mode {
            '+' => action = ModeAction::Add,
            '-' => action = ModeAction::Remove,
            mode => {
                let class = channel_param_class(mode);
                let param = match (class, action) {
                    (ParamClass::Unknown, _) => {
                        unknown.push(mode);
                        continue;
                    }
                    (ParamClass::Member, _) => match params.next() {
                        Some(p) => Some(p.clone()),
                        None => continue,
                    },
                    (ParamClass::List, _) => params.next().cloned(),
                    (ParamClass::SetParam, ModeAction::Add) => match params.next() {
                        Some(p) => Some(p.clone()),
                        None => continue,
                    },
                    (ParamClass::SetParam, ModeAction::Remove) => None,
                    (ParamClass::Limit, ModeAction::Add) => match params.next() {
                        Some(p) => Some(p.clone()),
                        None => continue,
                    },
                    (ParamClass::Limit, ModeAction::Remove) => None,
                    (ParamClass::Flag, _) => None,
                };

                if changes.len() < budget {
                    changes.push(ModeChange {
                        action,
                        mode,
                        param,
                    });
                }
            }
        }
    }

    (changes, unknown)
}

/// Tokenize a user mode word (`+iw-o`).
///
/// Returns accepted `(action, mode)` pairs and unknown characters.
pub fn parse_user_modes(word: &str) -> (Vec<(ModeAction, char)>, Vec<char>) {
    let mut changes = Vec::new();
    let mut unknown = Vec::new();
    let mut action = ModeAction::Add;
    for c in word.chars() {
        match c {
            '+' => action = ModeAction::Add,
            '-' => action = ModeAction::Remove,
            c if USER_MODES.contains(&c) => changes.push((action, c)),
            c => unknown.push(c),
        }
    }
    (changes, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn pairs_member_modes_with_params() {
        let (changes, unknown) = parse_channel_modes(&args(&["+ov", "alice", "bob"]), 4);
        assert!(unknown.is_empty());
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].mode, 'o');
        assert_eq!(changes[0].param.as_deref(), Some("alice"));
        assert_eq!(changes[1].mode, 'v');
        assert_eq!(changes[1].param.as_deref(), Some("bob"));
    }

    #[test]
    fn mixed_directions() {
        let (changes, _) = parse_channel_modes(&args(&["+m-k+l", "42"]), 4);
        assert_eq!(
            changes,
            vec![
                ModeChange {
                    action: ModeAction::Add,
                    mode: 'm',
                    param: None
                },
                ModeChange {
                    action: ModeAction::Remove,
                    mode: 'k',
                    param: None
                },
                ModeChange {
                    action: ModeAction::Add,
                    mode: 'l',
                    param: Some("42".into())
                },
            ]
        );
    }

    #[test]
    fn list_mode_without_param_is_query() {
        let (changes, _) = parse_channel_modes(&args(&["+b"]), 4);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].mode, 'b');
        assert!(changes[0].param.is_none());
    }

    #[test]
    fn member_mode_without_param_dropped() {
        let (changes, _) = parse_channel_modes(&args(&["+o"]), 4);
        assert!(changes.is_empty());
    }

    #[test]
    fn key_requires_param_on_set_only() {
        let (changes, _) = parse_channel_modes(&args(&["+k", "sekrit"]), 4);
        assert_eq!(changes[0].param.as_deref(), Some("sekrit"));
        let (changes, _) = parse_channel_modes(&args(&["-k"]), 4);
        assert_eq!(changes[0].param, None);
    }

    #[test]
    fn budget_caps_changes() {
        let (changes, _) =
            parse_channel_modes(&args(&["+ooooo", "a", "b", "c", "d", "e"]), 4);
        assert_eq!(changes.len(), 4);
    }

    #[test]
    fn unknown_modes_reported() {
        let (changes, unknown) = parse_channel_modes(&args(&["+mx"]), 4);
        assert_eq!(changes.len(), 1);
        assert_eq!(unknown, vec!['x']);
    }

    #[test]
    fn user_mode_word() {
        let (changes, unknown) = parse_user_modes("+iw-o+x");
        assert_eq!(
            changes,
            vec![
                (ModeAction::Add, 'i'),
                (ModeAction::Add, 'w'),
                (ModeAction::Remove, 'o'),
            ]
        );
        assert_eq!(unknown, vec!['x']);
    }
}
