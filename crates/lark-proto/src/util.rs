//! Wildcard and hostmask matching.

use crate::casemap::irc_lower_char;

/// Match `text` against `pattern` with IRC wildcards.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one character. Comparison is case-insensitive under the RFC 1459 casemap.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().map(irc_lower_char).collect();
    let txt: Vec<char> = text.chars().map(irc_lower_char).collect();

    // Iterative glob match with single-star backtracking.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_t = 0usize;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

/// Match a `nick!user@host` identity against a ban-style mask.
///
/// A mask without `!` or `@` is matched against the nick alone.
pub fn matches_hostmask(mask: &str, nick: &str, user: &str, host: &str) -> bool {
    let (mask_nick, rest) = match mask.split_once('!') {
        Some((n, r)) => (n, r),
        None => {
            // `*@host` form or bare nick.
            return match mask.split_once('@') {
                Some((n, h)) => {
                    wildcard_match(if n.is_empty() { "*" } else { n }, nick)
                        && wildcard_match(h, host)
                }
                None => wildcard_match(mask, nick),
            };
        }
    };
    let (mask_user, mask_host) = match rest.split_once('@') {
        Some((u, h)) => (u, h),
        None => (rest, "*"),
    };
    wildcard_match(mask_nick, nick)
        && wildcard_match(mask_user, user)
        && wildcard_match(mask_host, host)
}

/// Match a `user@host` pattern (K-line style, no nick component).
pub fn matches_userhost(mask: &str, user: &str, host: &str) -> bool {
    match mask.split_once('@') {
        Some((u, h)) => wildcard_match(u, user) && wildcard_match(h, host),
        None => wildcard_match(mask, host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_basics() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*c", "abc"));
        assert!(wildcard_match("a*c", "ac"));
        assert!(wildcard_match("a?c", "abc"));
        assert!(!wildcard_match("a?c", "ac"));
        assert!(wildcard_match("*.example.com", "irc.example.com"));
        assert!(!wildcard_match("*.example.com", "example.com"));
    }

    #[test]
    fn wildcard_uses_casemap() {
        assert!(wildcard_match("NICK[1]*", "nick{1}zzz"));
        assert!(wildcard_match("a|b", "A\\B"));
    }

    #[test]
    fn wildcard_multiple_stars() {
        assert!(wildcard_match("*!*@*.bad.net", "x!y@gw.bad.net"));
        assert!(wildcard_match("**a**", "bab"));
        assert!(!wildcard_match("*a*b", "ba"));
    }

    #[test]
    fn hostmask_full() {
        assert!(matches_hostmask("*!*@bad.host", "joe", "u", "bad.host"));
        assert!(matches_hostmask("joe!*@*", "joe", "u", "host"));
        assert!(!matches_hostmask("joe!*@*", "jim", "u", "host"));
        assert!(matches_hostmask("j?e!us*@h*t", "joe", "user", "host"));
    }

    #[test]
    fn hostmask_partial_forms() {
        assert!(matches_hostmask("joe", "joe", "u", "h"));
        assert!(matches_hostmask("*@bad.host", "joe", "u", "bad.host"));
        assert!(!matches_hostmask("*@good.host", "joe", "u", "bad.host"));
    }

    #[test]
    fn userhost_form() {
        assert!(matches_userhost("*@*.edu", "abc", "cs.mit.edu"));
        assert!(!matches_userhost("root@*", "abc", "h"));
    }
}
