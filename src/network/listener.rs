//! TCP and TLS accept loops.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::{rustls, TlsAcceptor};
use tracing::{error, info, warn};

use crate::config::TlsConfig;
use crate::handlers::Registry;
use crate::network::connection::run_client;
use crate::state::Nexus;

/// Accept plaintext clients (and inbound server links) forever.
pub async fn run_plain(
    listener: TcpListener,
    nexus: Arc<Nexus>,
    registry: Arc<Registry>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "listening (plaintext)");
    loop {
        let (stream, addr) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let uid = nexus.uid_gen.next_uid();
        let nexus = nexus.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            run_client(stream, uid, addr, false, nexus, registry).await;
        });
    }
}

/// Accept TLS clients forever.
pub async fn run_tls(
    listener: TcpListener,
    config: TlsConfig,
    nexus: Arc<Nexus>,
    registry: Arc<Registry>,
) -> anyhow::Result<()> {
    let acceptor = build_acceptor(&config)?;
    info!(addr = %listener.local_addr()?, "listening (TLS)");
    loop {
        let (stream, addr) = listener.accept().await?;
        stream.set_nodelay(true).ok();
        let acceptor = acceptor.clone();
        let uid = nexus.uid_gen.next_uid();
        let nexus = nexus.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls) => run_client(tls, uid, addr, true, nexus, registry).await,
                Err(e) => {
                    warn!(addr = %addr, error = %e, "TLS handshake failed");
                }
            }
        });
    }
}

fn build_acceptor(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(
        &mut std::io::BufReader::new(std::fs::File::open(&config.cert)?),
    )
    .collect::<Result<_, _>>()?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(
        &mut std::io::BufReader::new(std::fs::File::open(&config.key)?),
    )?
    .ok_or_else(|| anyhow::anyhow!("no private key in {}", config.key))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| {
            error!(error = %e, "invalid TLS certificate/key");
            anyhow::anyhow!("invalid TLS configuration: {e}")
        })?;
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
