//! IRCv3 capability registry.
//!
//! The supported set is compile-time fixed. A capability may advertise a
//! value in CAP LS 302 listings (`sasl=PLAIN,...`).

/// A capability the server supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capability {
    /// Capability name as negotiated.
    pub name: &'static str,
    /// CAP LS 302 value, if any.
    pub value: Option<&'static str>,
}

/// Every capability this server advertises.
pub const SUPPORTED_CAPS: &[Capability] = &[
    Capability { name: "multi-prefix", value: None },
    Capability { name: "sasl", value: Some("PLAIN,EXTERNAL,SCRAM-SHA-256") },
    Capability { name: "away-notify", value: None },
    Capability { name: "extended-join", value: None },
    Capability { name: "account-notify", value: None },
    Capability { name: "account-tag", value: None },
    Capability { name: "cap-notify", value: None },
    Capability { name: "chghost", value: None },
    Capability { name: "echo-message", value: None },
    Capability { name: "invite-notify", value: None },
    Capability { name: "labeled-response", value: None },
    Capability { name: "message-tags", value: None },
    Capability { name: "msgid", value: None },
    Capability { name: "server-time", value: None },
    Capability { name: "userhost-in-names", value: None },
    Capability { name: "batch", value: None },
    Capability { name: "setname", value: None },
    Capability { name: "standard-replies", value: None },
    Capability { name: "draft/chathistory", value: None },
    Capability { name: "draft/event-playback", value: None },
    Capability { name: "draft/read-marker", value: None },
    Capability { name: "sts", value: None },
    Capability { name: "bot", value: None },
];

/// True if `name` is a capability this server offers.
pub fn is_supported(name: &str) -> bool {
    SUPPORTED_CAPS.iter().any(|c| c.name == name)
}

/// The CAP LS listing, with values when the 302 form is requested.
pub fn ls_tokens(version_302: bool) -> Vec<String> {
    SUPPORTED_CAPS
        .iter()
        .map(|c| match (version_302, c.value) {
            (true, Some(v)) => format!("{}={}", c.name, v),
            _ => c.name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sasl_advertises_mechanisms_in_302() {
        let ls = ls_tokens(true);
        assert!(ls.iter().any(|t| t == "sasl=PLAIN,EXTERNAL,SCRAM-SHA-256"));
        let ls = ls_tokens(false);
        assert!(ls.iter().any(|t| t == "sasl"));
    }

    #[test]
    fn supported_lookup() {
        assert!(is_supported("echo-message"));
        assert!(is_supported("draft/chathistory"));
        assert!(!is_supported("draft/no-such-cap"));
    }
}
