//! Connection lifecycle: ping timeout and oversize input.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};
use lark_proto::{Command, Response};

#[tokio::test]
async fn idle_session_is_pinged_then_dropped() {
    let server = TestServer::spawn_with(|c| {
        c.timeouts.client_idle = 1;
        c.timeouts.client_grace = 1;
    })
    .await
    .unwrap();

    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();
    let mut bob = TestClient::connect(server.addr, "bob").await.unwrap();
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    alice.join("#idle").await.unwrap();
    bob.join("#idle").await.unwrap();
    alice.drain(Duration::from_millis(200)).await;

    // Alice goes silent. The server PINGs at the idle mark...
    let seen = alice
        .recv_until(|m| matches!(&m.command, Command::PING(..)))
        .await
        .expect("server should PING an idle client");
    assert!(!seen.is_empty());

    // ...and with no PONG inside the grace window, closes with the
    // canonical reason, which bob sees as alice's QUIT.
    // Bob keeps himself alive by answering his own PINGs.
    let quit = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let msg = bob.recv_timeout(Duration::from_secs(3)).await.unwrap();
            match &msg.command {
                Command::PING(token, _) => {
                    bob.send_raw(&format!("PONG :{token}")).await.unwrap();
                }
                Command::QUIT(Some(reason)) => break reason.clone(),
                _ => {}
            }
        }
    })
    .await
    .expect("bob should see alice's quit");
    assert_eq!(quit, "Ping timeout: 1 seconds");
}

#[tokio::test]
async fn pong_keeps_the_session_alive() {
    let server = TestServer::spawn_with(|c| {
        c.timeouts.client_idle = 1;
        c.timeouts.client_grace = 2;
    })
    .await
    .unwrap();

    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();
    alice.register().await.unwrap();

    // Survive several idle windows by answering PINGs.
    for _ in 0..3 {
        let seen = alice
            .recv_until(|m| matches!(&m.command, Command::PING(..)))
            .await
            .unwrap();
        if let Command::PING(token, _) = &seen.last().unwrap().command {
            alice.send_raw(&format!("PONG :{token}")).await.unwrap();
        }
    }
    // Still registered and responsive.
    alice.send_raw("TIME").await.unwrap();
    alice.recv_until_numeric(Response::RPL_TIME).await.unwrap();
}

#[tokio::test]
async fn oversize_line_is_fatal() {
    let server = TestServer::spawn().await.unwrap();
    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();
    alice.register().await.unwrap();

    // 600 bytes of payload blows the 512-byte frame budget.
    let oversize = format!("PRIVMSG #x :{}", "y".repeat(600));
    alice.send_raw(&oversize).await.unwrap();

    let seen = alice
        .recv_until(|m| matches!(&m.command, Command::ERROR(_)))
        .await
        .expect("oversize input should close the session");
    assert!(seen.iter().any(|m| matches!(
        m.command,
        Command::Response(Response::ERR_INPUTTOOLONG, _)
    )));
}
