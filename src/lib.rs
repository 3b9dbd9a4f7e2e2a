//! larkd - the Lark IRC daemon.
//!
//! An RFC 1459/2812 + IRCv3 server with TS6-style server federation. The
//! protocol codec lives in the `lark-proto` crate; this crate is the state
//! graph, command handlers, session machinery, and S2S engine.

pub mod broker;
pub mod cloak;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod network;
pub mod policy;
pub mod replies;
pub mod repo;
pub mod s2s;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::handlers::Registry;
use crate::repo::Repositories;
use crate::state::Nexus;

/// Version string advertised in the welcome burst and VERSION.
pub const VERSION: &str = concat!("larkd-", env!("CARGO_PKG_VERSION"));

/// A running server.
pub struct ServerInstance {
    pub nexus: Arc<Nexus>,
    /// Bound address of the plaintext listener.
    pub local_addr: SocketAddr,
}

/// Bind listeners and spawn every server task. Returns once the plaintext
/// listener is accepting; the tasks run until the process exits.
pub async fn start(
    config: Config,
    config_path: Option<String>,
    repos: Repositories,
) -> anyhow::Result<ServerInstance> {
    let (nexus, mut disconnect_rx) = Nexus::new(&config, repos);
    *nexus.config_path.write() = config_path;
    let registry = Arc::new(Registry::new());

    // Disconnect worker: the one place sessions are torn down from outside
    // their own task (KILL, sendq overflow, X-line enforcement).
    {
        let nexus = nexus.clone();
        tokio::spawn(async move {
            while let Some((uid, reason)) = disconnect_rx.recv().await {
                nexus.quit_user(&uid, &reason, true, None).await;
            }
        });
    }

    // Expired-ban sweeper.
    {
        let nexus = nexus.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(60));
            loop {
                timer.tick().await;
                nexus.bans.purge_expired(chrono::Utc::now().timestamp());
            }
        });
    }

    let listener = TcpListener::bind(config.listen.addr).await?;
    let local_addr = listener.local_addr()?;
    {
        let nexus = nexus.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = network::listener::run_plain(listener, nexus, registry).await {
                error!(error = %e, "plaintext listener failed");
            }
        });
    }

    if let Some(tls) = config.tls.clone() {
        let tls_listener = TcpListener::bind(tls.addr).await?;
        let nexus = nexus.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) =
                network::listener::run_tls(tls_listener, tls, nexus, registry).await
            {
                error!(error = %e, "TLS listener failed");
            }
        });
    }

    s2s::connect_links(&nexus);
    nexus.hooks.emit(hooks::Event::ServerStart).await;
    info!(server = %nexus.info.name, sid = %nexus.info.sid, addr = %local_addr, "server started");

    Ok(ServerInstance { nexus, local_addr })
}
