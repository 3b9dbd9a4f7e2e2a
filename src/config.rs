//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Plaintext listener.
    pub listen: ListenConfig,
    /// Optional TLS listener.
    pub tls: Option<TlsConfig>,
    /// Operator blocks.
    #[serde(default)]
    pub oper: Vec<OperBlock>,
    /// Server link blocks (S2S peers).
    #[serde(default)]
    pub link: Vec<LinkBlock>,
    /// Protocol limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Idle/ping timeout tuning.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Anti-flood tuning.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Message of the Day.
    #[serde(default)]
    pub motd: MotdConfig,
}

/// Server identity block.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (dotted hostname form).
    pub name: String,
    /// Three-character server ID: digit + two alphanumerics.
    pub sid: String,
    /// Network name advertised in ISUPPORT.
    pub network: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Optional connection password (client PASS).
    pub password: Option<String>,
    /// Secret for hostname cloaking.
    #[serde(default = "default_cloak_secret")]
    pub cloak_secret: String,
    /// Admin contact lines (ADMIN command).
    pub admin_location: Option<String>,
    pub admin_email: Option<String>,
}

fn default_cloak_secret() -> String {
    "change-me".to_string()
}

/// Plaintext listener block.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Socket address, e.g. `0.0.0.0:6667`.
    pub addr: SocketAddr,
}

/// TLS listener block.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// Socket address, e.g. `0.0.0.0:6697`.
    pub addr: SocketAddr,
    /// PEM certificate chain path.
    pub cert: String,
    /// PEM private key path.
    pub key: String,
}

/// Operator credentials block.
#[derive(Debug, Clone, Deserialize)]
pub struct OperBlock {
    /// OPER login name.
    pub name: String,
    /// OPER password.
    pub password: String,
    /// Hostmask the oper must connect from (`*!*@*` when absent).
    pub hostmask: Option<String>,
}

/// A configured S2S peer.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkBlock {
    /// Remote server name.
    pub name: String,
    /// Remote SID.
    pub sid: String,
    /// Link password (both directions).
    pub password: String,
    /// Remote address to connect to; absent for accept-only links.
    pub addr: Option<SocketAddr>,
    /// Whether this side initiates the connection.
    #[serde(default)]
    pub autoconnect: bool,
}

/// Protocol limits, mirrored into ISUPPORT.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_nick_len")]
    pub nick_len: usize,
    #[serde(default = "default_channel_len")]
    pub channel_len: usize,
    #[serde(default = "default_topic_len")]
    pub topic_len: usize,
    #[serde(default = "default_kick_len")]
    pub kick_len: usize,
    #[serde(default = "default_away_len")]
    pub away_len: usize,
    /// Channels a single user may join.
    #[serde(default = "default_chan_limit")]
    pub chan_limit: usize,
    /// Maximum PRIVMSG targets per command.
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,
    /// Mode changes accepted per MODE line.
    #[serde(default = "default_modes_per_line")]
    pub modes_per_line: usize,
    /// Entries per channel list mode (+b/+e/+I).
    #[serde(default = "default_list_mode_len")]
    pub list_mode_len: usize,
    /// WHOWAS history depth per nick.
    #[serde(default = "default_whowas_depth")]
    pub whowas_depth: usize,
}

fn default_nick_len() -> usize {
    30
}
fn default_channel_len() -> usize {
    64
}
fn default_topic_len() -> usize {
    390
}
fn default_kick_len() -> usize {
    255
}
fn default_away_len() -> usize {
    200
}
fn default_chan_limit() -> usize {
    20
}
fn default_max_targets() -> usize {
    4
}
fn default_modes_per_line() -> usize {
    4
}
fn default_list_mode_len() -> usize {
    100
}
fn default_whowas_depth() -> usize {
    10
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            nick_len: default_nick_len(),
            channel_len: default_channel_len(),
            topic_len: default_topic_len(),
            kick_len: default_kick_len(),
            away_len: default_away_len(),
            chan_limit: default_chan_limit(),
            max_targets: default_max_targets(),
            modes_per_line: default_modes_per_line(),
            list_mode_len: default_list_mode_len(),
            whowas_depth: default_whowas_depth(),
        }
    }
}

/// Ping/idle timeout tuning, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Idle window before the server sends PING.
    #[serde(default = "default_client_idle")]
    pub client_idle: u64,
    /// Grace window after PING before disconnect.
    #[serde(default = "default_client_grace")]
    pub client_grace: u64,
    /// Idle window for S2S links.
    #[serde(default = "default_link_idle")]
    pub link_idle: u64,
    /// Grace window for S2S links.
    #[serde(default = "default_link_grace")]
    pub link_grace: u64,
}

fn default_client_idle() -> u64 {
    90
}
fn default_client_grace() -> u64 {
    30
}
fn default_link_idle() -> u64 {
    180
}
fn default_link_grace() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            client_idle: default_client_idle(),
            client_grace: default_client_grace(),
            link_idle: default_link_idle(),
            link_grace: default_link_grace(),
        }
    }
}

/// Anti-flood tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Token bucket refill rate (commands per second).
    #[serde(default = "default_command_rate")]
    pub command_rate: f32,
    /// Token bucket burst capacity.
    #[serde(default = "default_command_burst")]
    pub command_burst: f32,
    /// Silently dropped commands tolerated before disconnect.
    #[serde(default = "default_flood_strikes")]
    pub flood_strikes: u32,
    /// Outbound queue depth per connection.
    #[serde(default = "default_sendq")]
    pub sendq: usize,
}

fn default_command_rate() -> f32 {
    10.0
}
fn default_command_burst() -> f32 {
    20.0
}
fn default_flood_strikes() -> u32 {
    30
}
fn default_sendq() -> usize {
    512
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            command_rate: default_command_rate(),
            command_burst: default_command_burst(),
            flood_strikes: default_flood_strikes(),
            sendq: default_sendq(),
        }
    }
}

/// Message of the Day.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MotdConfig {
    /// Path to an MOTD file (one reply line per file line).
    pub file: Option<String>,
    /// Inline MOTD lines, used when `file` is unset.
    #[serde(default)]
    pub lines: Vec<String>,
}

impl MotdConfig {
    /// Load MOTD lines from file or inline config.
    pub fn load_lines(&self) -> Vec<String> {
        if let Some(ref path) = self.file {
            match std::fs::read_to_string(path) {
                Ok(content) => return content.lines().map(str::to_owned).collect(),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to read MOTD file");
                }
            }
        }
        self.lines.clone()
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !valid_sid(&self.server.sid) {
            return Err(ConfigError::Invalid(format!(
                "server.sid {:?} must be a digit followed by two alphanumerics",
                self.server.sid
            )));
        }
        if !self.server.name.contains('.') {
            return Err(ConfigError::Invalid(
                "server.name must be a dotted hostname".to_string(),
            ));
        }
        for link in &self.link {
            if !valid_sid(&link.sid) {
                return Err(ConfigError::Invalid(format!(
                    "link {:?} has invalid sid {:?}",
                    link.name, link.sid
                )));
            }
        }
        Ok(())
    }
}

/// SID grammar: exactly 3 chars, first a digit, rest alphanumeric uppercase.
pub fn valid_sid(sid: &str) -> bool {
    let bytes = sid.as_bytes();
    bytes.len() == 3
        && bytes[0].is_ascii_digit()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[server]
name = "irc.lark.test"
sid = "001"
network = "LarkNet"

[listen]
addr = "127.0.0.1:6667"
"#;

    #[test]
    fn parses_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.name, "irc.lark.test");
        assert_eq!(config.server.sid, "001");
        assert_eq!(config.limits.nick_len, 30);
        assert_eq!(config.timeouts.client_idle, 90);
    }

    #[test]
    fn rejects_bad_sid() {
        let bad = MINIMAL.replace("\"001\"", "\"A01\"");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bad.as_bytes()).unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn sid_grammar() {
        assert!(valid_sid("001"));
        assert!(valid_sid("1AB"));
        assert!(valid_sid("9Z0"));
        assert!(!valid_sid("A01"));
        assert!(!valid_sid("01"));
        assert!(!valid_sid("0011"));
        assert!(!valid_sid("0a1"));
    }

    #[test]
    fn motd_inline_lines() {
        let motd = MotdConfig {
            file: None,
            lines: vec!["one".into(), "two".into()],
        };
        assert_eq!(motd.load_lines(), vec!["one", "two"]);
    }
}
