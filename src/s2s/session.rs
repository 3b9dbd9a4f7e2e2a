//! S2S link sessions: handshake, burst exchange, and the link loop.
//!
//! Handshake, both directions: `PASS <pw> TS 6 <sid>`, `CAPAB :<tokens>`,
//! `SERVER <name> 1 <sid> :<desc>`. The link is READY once both sides have
//! sent and verified all three; each side then bursts its state and enters
//! the select loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use lark_proto::{Command, LineCodec, Message, Prefix};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{info, instrument, warn};

use crate::broker::{Priority, SendQueue};
use crate::config::LinkBlock;
use crate::error::LinkError;
use crate::s2s::burst::generate_burst;
use crate::s2s::dispatch::handle_link_message;
use crate::s2s::link::LinkHandle;
use crate::state::Nexus;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens we advertise in CAPAB.
const CAPAB_TOKENS: &[&str] = &["TS6", "EOB", "ENCAP", "QS"];

async fn read_frame<S>(
    framed: &mut Framed<S, LineCodec>,
) -> Result<Message, LinkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
        Ok(Some(Ok(msg))) => Ok(msg),
        Ok(Some(Err(e))) => Err(e.into()),
        Ok(None) => Err(LinkError::Closed),
        Err(_) => Err(LinkError::Handshake("handshake timeout".into())),
    }
}

async fn send_error_and_close<S>(framed: &mut Framed<S, LineCodec>, reason: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    warn!(reason = %reason, "closing link");
    let _ = framed.send(Message::error(reason.to_string())).await;
}

fn ident_frames(nexus: &Nexus, password: &str) -> Vec<Message> {
    vec![
        Message::from(Command::PassTs6 {
            password: password.to_string(),
            sid: nexus.info.sid.clone(),
        }),
        Message::from(Command::CAPAB(
            CAPAB_TOKENS.iter().map(|t| (*t).to_string()).collect(),
        )),
        Message::from(Command::SERVER(
            nexus.info.name.clone(),
            1,
            Some(nexus.info.sid.clone()),
            nexus.hot.read().description.clone(),
        )),
    ]
}

/// Accept a link whose TS6 PASS already arrived on a client listener.
pub async fn run_inbound<S>(
    mut framed: Framed<S, LineCodec>,
    nexus: Arc<Nexus>,
    password: String,
    their_sid: String,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Some(block) = nexus
        .link_blocks
        .iter()
        .find(|b| b.sid == their_sid)
        .cloned()
    else {
        send_error_and_close(&mut framed, "Unknown server (no link block)").await;
        return;
    };
    let authorized = block
        .password
        .as_bytes()
        .ct_eq(password.as_bytes())
        .unwrap_u8()
        == 1;
    if !authorized {
        send_error_and_close(&mut framed, "Bad link password").await;
        return;
    }

    // Expect CAPAB, then SERVER.
    let capab = match read_frame(&mut framed).await {
        Ok(msg) => msg,
        Err(e) => {
            send_error_and_close(&mut framed, &e.to_string()).await;
            return;
        }
    };
    if !matches!(capab.command, Command::CAPAB(_)) {
        send_error_and_close(&mut framed, "Expected CAPAB").await;
        return;
    }
    let (their_name, their_desc) = match read_frame(&mut framed).await {
        Ok(Message {
            command: Command::SERVER(name, _hop, _sid, desc),
            ..
        }) => (name, desc),
        Ok(_) | Err(_) => {
            send_error_and_close(&mut framed, "Expected SERVER").await;
            return;
        }
    };
    if their_name != block.name {
        send_error_and_close(&mut framed, "Server name does not match link block").await;
        return;
    }
    if nexus
        .bans
        .find_jupe(&their_name, chrono::Utc::now().timestamp())
        .is_some()
    {
        send_error_and_close(&mut framed, "Server is juped").await;
        return;
    }

    // Reply symmetrically, then the link is READY.
    for msg in ident_frames(&nexus, &block.password) {
        if framed.send(msg).await.is_err() {
            return;
        }
    }

    establish(framed, nexus, their_sid, their_name, their_desc).await;
}

/// Connect out to a configured peer.
#[instrument(skip(nexus, block), fields(peer = %block.name))]
pub async fn run_outbound(nexus: Arc<Nexus>, block: LinkBlock) {
    let Some(addr) = block.addr else {
        return;
    };
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(addr = %addr, error = %e, "link connect failed");
            return;
        }
    };
    stream.set_nodelay(true).ok();
    let mut framed = Framed::new(stream, LineCodec::new());

    for msg in ident_frames(&nexus, &block.password) {
        if framed.send(msg).await.is_err() {
            return;
        }
    }

    // Expect their PASS, CAPAB, SERVER.
    let (their_sid, their_pass) = match read_frame(&mut framed).await {
        Ok(Message {
            command: Command::PassTs6 { password, sid },
            ..
        }) => (sid, password),
        Ok(_) | Err(_) => {
            send_error_and_close(&mut framed, "Expected PASS ... TS 6").await;
            return;
        }
    };
    let authorized = their_sid == block.sid
        && block
            .password
            .as_bytes()
            .ct_eq(their_pass.as_bytes())
            .unwrap_u8()
            == 1;
    if !authorized {
        send_error_and_close(&mut framed, "Bad link credentials").await;
        return;
    }
    match read_frame(&mut framed).await {
        Ok(Message {
            command: Command::CAPAB(_),
            ..
        }) => {}
        _ => {
            send_error_and_close(&mut framed, "Expected CAPAB").await;
            return;
        }
    }
    let (their_name, their_desc) = match read_frame(&mut framed).await {
        Ok(Message {
            command: Command::SERVER(name, _hop, _sid, desc),
            ..
        }) => (name, desc),
        _ => {
            send_error_and_close(&mut framed, "Expected SERVER").await;
            return;
        }
    };
    if their_name != block.name {
        send_error_and_close(&mut framed, "Server name does not match link block").await;
        return;
    }

    establish(framed, nexus, their_sid, their_name, their_desc).await;
}

/// READY: register the link, announce it, burst, and run the loop.
async fn establish<S>(
    mut framed: Framed<S, LineCodec>,
    nexus: Arc<Nexus>,
    sid: String,
    name: String,
    description: String,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if nexus.links.contains_key(&sid) || nexus.topology.contains(&sid) {
        send_error_and_close(&mut framed, "Loop detected: SID already linked").await;
        return;
    }

    info!(sid = %sid, name = %name, "server link established");
    let queue = Arc::new(SendQueue::new(nexus.security.sendq));
    let handle = Arc::new(LinkHandle::new(&sid, &name, queue.clone()));
    nexus.links.insert(sid.clone(), handle.clone());
    nexus.topology.add_neighbor(&sid, &name, &description);

    // Tell the rest of the network about the new server.
    let intro = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
        command: Command::SID(name.clone(), 2, sid.clone(), description),
    };
    nexus.broadcast_links(&intro, Some(&sid));

    // Burst our view of the world.
    if handle.mark_bursted() {
        for msg in generate_burst(&nexus) {
            queue.push(Arc::new(msg), Priority::Interactive);
        }
    }

    let reason = link_loop(framed, &nexus, &sid, &queue).await;
    crate::s2s::handle_link_loss(&nexus, &sid, &reason).await;
}

async fn link_loop<S>(
    framed: Framed<S, LineCodec>,
    nexus: &Arc<Nexus>,
    sid: &str,
    queue: &Arc<SendQueue>,
) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = framed.split();
    let idle = Duration::from_secs(nexus.timeouts.link_idle);
    let grace = Duration::from_secs(nexus.timeouts.link_grace);
    let mut last_read = Instant::now();
    let mut ping_sent: Option<Instant> = None;
    let mut timer = tokio::time::interval(Duration::from_secs(15));
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        last_read = Instant::now();
                        ping_sent = None;
                        if let Err(e) = handle_link_message(nexus, sid, msg).await {
                            break e.to_string();
                        }
                    }
                    Some(Err(e)) => {
                        warn!(sid = %sid, error = %e, "link read error");
                        break "protocol error".to_string();
                    }
                    None => break "connection closed".to_string(),
                }
            }

            outbound = queue.pop() => {
                match outbound {
                    Some(msg) => {
                        if sink.send((*msg).clone()).await.is_err() {
                            break "write error".to_string();
                        }
                    }
                    None => break "link shut down".to_string(),
                }
            }

            _ = timer.tick() => {
                if let Some(sent) = ping_sent {
                    if sent.elapsed() >= grace {
                        break format!("Ping timeout: {} seconds", grace.as_secs());
                    }
                } else if last_read.elapsed() >= idle {
                    let ping = Message {
                        tags: None,
                        prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
                        command: Command::PING(nexus.info.sid.clone(), None),
                    };
                    if sink.send(ping).await.is_err() {
                        break "write error".to_string();
                    }
                    ping_sent = Some(Instant::now());
                }
            }
        }
    }
}
