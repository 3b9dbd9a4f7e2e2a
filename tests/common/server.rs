//! In-process test server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use larkd::config::Config;
use larkd::repo::{MemoryAccounts, MemoryChannelRegistry, MemoryHistory, NullNotifier, Repositories};
use larkd::state::Nexus;

/// A running in-process server plus handles to its repositories.
pub struct TestServer {
    pub nexus: Arc<Nexus>,
    pub addr: SocketAddr,
    pub accounts: Arc<MemoryAccounts>,
    pub channels: Arc<MemoryChannelRegistry>,
}

const BASE_CONFIG: &str = r#"
[server]
name = "test.lark.server"
sid = "001"
network = "TestNet"
description = "Test IRC Server"
cloak_secret = "test-secret"

[listen]
addr = "127.0.0.1:0"

[motd]
lines = ["Test Server"]

[[oper]]
name = "testop"
password = "testpass"
"#;

impl TestServer {
    /// Spawn with the default test configuration.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn after letting the caller tweak the parsed config.
    pub async fn spawn_with(tweak: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(BASE_CONFIG)?;
        tweak(&mut config);

        let accounts = Arc::new(MemoryAccounts::default());
        let channels = Arc::new(MemoryChannelRegistry::default());
        let repos = Repositories {
            accounts: accounts.clone(),
            channels: channels.clone(),
            history: Arc::new(MemoryHistory::default()),
            notifier: Arc::new(NullNotifier),
        };

        let instance = larkd::start(config, None, repos).await?;
        Ok(Self {
            nexus: instance.nexus,
            addr: instance.local_addr,
            accounts,
            channels,
        })
    }
}
