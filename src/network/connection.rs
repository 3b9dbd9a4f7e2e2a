//! Client connection task.
//!
//! Two phases, mirroring the session state machine:
//!
//! 1. **Handshake**: the framed stream is read sequentially; queued
//!    replies are drained after each command. A `PASS ... TS 6 ...` here
//!    means the peer is a server, and the stream is handed to the S2S
//!    layer instead.
//! 2. **Registered loop**: a `select!` over the reader, the outbound
//!    queue, and the ping timer. Commands are processed strictly in
//!    arrival order; replies for command N precede any effect of N+1.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use lark_proto::{Command, LineCodec, Message, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument};

use crate::error::HandlerError;
use crate::handlers::{Context, Registry, Session};
use crate::network::limit::RateLimiter;
use crate::replies;
use crate::state::Nexus;

/// Why the connection loop ended.
enum Exit {
    Quit(Option<String>),
    PingTimeout(u64),
    Error(String),
    Eof,
}

/// Drive one client connection to completion.
#[instrument(skip_all, fields(uid = %uid, addr = %addr))]
pub async fn run_client<S>(
    stream: S,
    uid: String,
    addr: SocketAddr,
    is_tls: bool,
    nexus: Arc<Nexus>,
    registry: Arc<Registry>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!("client connected");
    let mut framed = Framed::new(stream, LineCodec::new());
    let mut session = Session::new(uid.clone(), addr, is_tls);
    let queue = nexus.attach_queue(&uid);

    let mut limiter = RateLimiter::new(
        nexus.security.command_rate,
        nexus.security.command_burst,
    );
    let mut strikes: u32 = 0;
    let idle = Duration::from_secs(nexus.timeouts.client_idle);

    // Phase 1: handshake. Sequential read-dispatch-drain; servers are
    // detected by their TS6 PASS and handed off whole.
    let exit = loop {
        let frame = tokio::time::timeout(idle, framed.next()).await;
        let result = match frame {
            Ok(Some(result)) => result,
            Ok(None) => break Some(Exit::Eof),
            Err(_) => break Some(Exit::PingTimeout(nexus.timeouts.client_idle)),
        };

        match result {
            Ok(msg) => {
                if let Command::PassTs6 { password, sid } = msg.command.clone() {
                    // A peer server: this connection leaves the client path.
                    nexus.detach_queue(&uid);
                    crate::s2s::session::run_inbound(framed, nexus, password, sid).await;
                    return;
                }

                let mut ctx = Context {
                    nexus: &nexus,
                    session: &mut session,
                    registry: &registry,
                };
                let outcome = registry.dispatch(&mut ctx, &msg).await;

                // Drain queued replies synchronously during handshake.
                while let Some(reply) = try_pop(&queue) {
                    if framed.send((*reply).clone()).await.is_err() {
                        break;
                    }
                }

                match outcome {
                    Ok(()) => {}
                    Err(HandlerError::Quit(reason)) => break Some(Exit::Quit(reason)),
                    Err(HandlerError::AccessDenied) => {
                        break Some(Exit::Error("access denied".into()))
                    }
                    Err(HandlerError::Internal(_)) => {}
                }

                if session.registered {
                    break None;
                }
            }
            Err(e) => match classify(&e) {
                FrameFault::Oversize => {
                    let _ = framed
                        .send(replies::inputtoolong(&nexus.info.name, "*"))
                        .await;
                    break Some(Exit::Error("input line too long".into()));
                }
                FrameFault::Malformed => {
                    // Unparseable bytes from an unregistered session count
                    // toward the disconnect threshold.
                    strikes += 1;
                    if strikes > nexus.security.flood_strikes {
                        break Some(Exit::Error("excess flood".into()));
                    }
                }
                FrameFault::Io => break Some(Exit::Eof),
            },
        }
    };

    if let Some(exit) = exit {
        finish(&nexus, &uid, &mut session, &mut framed, exit).await;
        return;
    }

    // Phase 2: the registered select loop. The stream and sink halves are
    // split so the reader future and the writer bodies can coexist.
    let (mut sink, mut stream) = framed.split();
    let mut last_read = Instant::now();
    let mut ping_sent: Option<Instant> = None;
    let grace = Duration::from_secs(nexus.timeouts.client_grace);
    let tick = nexus
        .timeouts
        .client_idle
        .min(nexus.timeouts.client_grace)
        .clamp(1, 5);
    let mut timer = tokio::time::interval(Duration::from_secs(tick));
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        last_read = Instant::now();
                        ping_sent = None;

                        if !limiter.check() {
                            // Silent drop; repeated offenses disconnect.
                            strikes += 1;
                            if strikes > nexus.security.flood_strikes {
                                break Exit::Error("excess flood".into());
                            }
                            continue;
                        }

                        if let Some(user) = nexus.user(&uid) {
                            user.write().last_activity = chrono::Utc::now().timestamp();
                        }

                        let mut ctx = Context {
                            nexus: &nexus,
                            session: &mut session,
                            registry: &registry,
                        };
                        match registry.dispatch(&mut ctx, &msg).await {
                            Ok(()) => {}
                            Err(HandlerError::Quit(reason)) => break Exit::Quit(reason),
                            Err(HandlerError::AccessDenied) => {
                                break Exit::Error("access denied".into())
                            }
                            Err(HandlerError::Internal(_)) => {}
                        }
                    }
                    Some(Err(e)) => match classify(&e) {
                        FrameFault::Oversize => {
                            let nick = nexus.nick_of(&uid);
                            let _ = sink
                                .send(replies::inputtoolong(&nexus.info.name, &nick))
                                .await;
                            break Exit::Error("input line too long".into());
                        }
                        FrameFault::Malformed => {
                            debug!(error = %e, "dropping malformed line");
                        }
                        FrameFault::Io => break Exit::Eof,
                    },
                    None => break Exit::Eof,
                }
            }

            outbound = queue.pop() => {
                match outbound {
                    Some(msg) => {
                        if sink.send((*msg).clone()).await.is_err() {
                            break Exit::Eof;
                        }
                    }
                    // Queue closed: KILL or the disconnect worker got here first.
                    None => break Exit::Eof,
                }
            }

            _ = timer.tick() => {
                if let Some(sent) = ping_sent {
                    if sent.elapsed() >= grace {
                        break Exit::PingTimeout(nexus.timeouts.client_grace);
                    }
                } else if last_read.elapsed() >= idle {
                    let token = format!("{:08x}", rand::random::<u32>());
                    if sink.send(Message::ping(token)).await.is_err() {
                        break Exit::Eof;
                    }
                    ping_sent = Some(Instant::now());
                }
            }
        }
    };

    finish(&nexus, &uid, &mut session, &mut sink, exit).await;
}

enum FrameFault {
    Oversize,
    Malformed,
    Io,
}

fn classify(error: &ProtocolError) -> FrameFault {
    match error {
        ProtocolError::MessageTooLong { .. } | ProtocolError::TagsTooLong { .. } => {
            FrameFault::Oversize
        }
        ProtocolError::InvalidMessage { .. } | ProtocolError::InvalidUtf8 { .. } => {
            FrameFault::Malformed
        }
        ProtocolError::Io(_) => FrameFault::Io,
        _ => FrameFault::Malformed,
    }
}

fn try_pop(queue: &crate::broker::SendQueue) -> Option<Arc<Message>> {
    // The handshake drain must not block; `pop()` would wait for frames.
    futures_util::FutureExt::now_or_never(queue.pop()).flatten()
}

async fn finish<W>(
    nexus: &Arc<Nexus>,
    uid: &str,
    session: &mut Session,
    sink: &mut W,
    exit: Exit,
) where
    W: futures_util::Sink<Message, Error = ProtocolError> + Unpin,
{
    let reason = match &exit {
        Exit::Quit(Some(reason)) => format!("Quit: {reason}"),
        Exit::Quit(None) => "Client Quit".to_string(),
        Exit::PingTimeout(secs) => format!("Ping timeout: {secs} seconds"),
        Exit::Error(reason) => reason.clone(),
        Exit::Eof => "Connection closed".to_string(),
    };

    // Flush whatever the teardown produced, then say goodbye.
    if let Some(queue) = nexus.queues.get(uid).map(|q| q.value().clone()) {
        while let Some(msg) = try_pop(&queue) {
            let _ = sink.send((*msg).clone()).await;
        }
    }
    let _ = sink
        .send(Message::error(format!("Closing Link: {reason}")))
        .await;

    if session.registered {
        nexus.quit_user(uid, &reason, true, None).await;
    } else {
        if let Some(nick) = &session.nick {
            nexus.release_nick(nick, uid);
        }
        nexus.detach_queue(uid);
    }
    info!(reason = %reason, "client disconnected");
}
