//! larkd entry point.

use tracing_subscriber::EnvFilter;

use larkd::config::Config;
use larkd::repo::Repositories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "larkd.toml".to_string());
    let config = Config::load(&config_path)?;

    let instance = larkd::start(config, Some(config_path), Repositories::in_memory()).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    instance.nexus.hooks.emit(larkd::hooks::Event::ServerStop).await;
    Ok(())
}
