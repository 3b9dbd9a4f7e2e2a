//! Line-level test client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lark_proto::{Command, LineCodec, Message, Response};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// A raw IRC client for driving the server in tests.
pub struct TestClient {
    framed: Framed<TcpStream, LineCodec>,
    pub nick: String,
}

impl TestClient {
    /// Connect a socket; no registration yet.
    pub async fn connect(addr: SocketAddr, nick: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LineCodec::new()),
            nick: nick.to_string(),
        })
    }

    /// Send a raw line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        let msg: Message = line.parse()?;
        self.framed.send(msg).await?;
        Ok(())
    }

    /// Receive one message within `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<Message> {
        match tokio::time::timeout(timeout, self.framed.next()).await {
            Ok(Some(Ok(msg))) => Ok(msg),
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(anyhow::anyhow!("connection closed")),
            Err(_) => Err(anyhow::anyhow!("timed out waiting for a message")),
        }
    }

    /// Read until `pred` matches, returning everything read (matching
    /// message last). Fails after five seconds.
    pub async fn recv_until(
        &mut self,
        mut pred: impl FnMut(&Message) -> bool,
    ) -> anyhow::Result<Vec<Message>> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| anyhow::anyhow!("timed out; saw: {:?}", summarize(&seen)))?;
            let msg = self.recv_timeout(remaining).await?;
            let done = pred(&msg);
            seen.push(msg);
            if done {
                return Ok(seen);
            }
        }
    }

    /// Read until a specific numeric arrives.
    pub async fn recv_until_numeric(
        &mut self,
        response: Response,
    ) -> anyhow::Result<Vec<Message>> {
        self.recv_until(|m| matches!(m.command, Command::Response(r, _) if r == response))
            .await
    }

    /// NICK + USER and consume the welcome burst through end-of-MOTD.
    pub async fn register(&mut self) -> anyhow::Result<Vec<Message>> {
        let nick = self.nick.clone();
        self.send_raw(&format!("NICK {nick}")).await?;
        self.send_raw(&format!("USER {nick} 0 * :{nick} real"))
            .await?;
        self.recv_until(|m| {
            matches!(
                m.command,
                Command::Response(Response::RPL_ENDOFMOTD, _)
                    | Command::Response(Response::ERR_NOMOTD, _)
            )
        })
        .await
    }

    /// JOIN and consume through RPL_ENDOFNAMES.
    pub async fn join(&mut self, channel: &str) -> anyhow::Result<Vec<Message>> {
        self.send_raw(&format!("JOIN {channel}")).await?;
        self.recv_until_numeric(Response::RPL_ENDOFNAMES).await
    }

    pub async fn privmsg(&mut self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("PRIVMSG {target} :{text}")).await
    }

    pub async fn quit(&mut self) -> anyhow::Result<()> {
        self.send_raw("QUIT :done").await
    }

    /// Drain anything already queued for up to `window`.
    pub async fn drain(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while tokio::time::Instant::now() < deadline {
            if self.recv_timeout(Duration::from_millis(25)).await.is_err() {
                break;
            }
        }
    }

    /// True if nothing arrives within `window` (no-echo assertions).
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        self.recv_timeout(window).await.is_err()
    }
}

fn summarize(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.to_string()).collect()
}
