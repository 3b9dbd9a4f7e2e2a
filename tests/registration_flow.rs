//! Registration: the welcome burst, CAP gating, and nick collisions.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};
use lark_proto::{Command, Response};

fn numerics(messages: &[lark_proto::Message]) -> Vec<u16> {
    messages
        .iter()
        .filter_map(|m| match m.command {
            Command::Response(r, _) => Some(r.code()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn welcome_burst_has_the_expected_shape() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();

    let burst = alice.register().await.expect("registration");
    let codes = numerics(&burst);

    for expected in [1, 2, 3, 4, 5, 251, 252, 253, 254, 255, 265, 266, 375, 372, 376] {
        assert!(
            codes.contains(&expected),
            "missing numeric {expected} in {codes:?}"
        );
    }
    // 001 leads the burst.
    assert_eq!(codes.first(), Some(&1));

    // ISUPPORT advertises the fixed vocabulary, 13 tokens per line max.
    for msg in &burst {
        if let Command::Response(Response::RPL_ISUPPORT, params) = &msg.command {
            // nick + tokens + trailing text
            assert!(params.len() <= 15, "too many 005 params: {params:?}");
        }
    }
    let isupport: Vec<String> = burst
        .iter()
        .filter_map(|m| match &m.command {
            Command::Response(Response::RPL_ISUPPORT, params) => Some(params.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    let all = isupport.join(" ");
    for token in [
        "CASEMAPPING=ascii",
        "PREFIX=(qaohv)~&@%+",
        "CHANMODES=beI,k,l,cCimnpRsSt",
        "MONITOR=100",
        "UTF8ONLY",
    ] {
        assert!(all.contains(token), "missing ISUPPORT token {token}: {all}");
    }
}

#[tokio::test]
async fn full_session_join_and_message_without_echo() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();

    alice.register().await.unwrap();
    let joined = alice.join("#room").await.unwrap();

    // JOIN echo, then topic state, then names.
    assert!(joined.iter().any(|m| matches!(
        &m.command,
        Command::JOIN(chan, _) if chan == "#room"
    )));
    let codes = numerics(&joined);
    assert!(
        codes.contains(&331) || codes.contains(&332),
        "expected 331 or 332 in {codes:?}"
    );
    assert!(codes.contains(&353) && codes.contains(&366));

    // No echo of own PRIVMSG without echo-message.
    alice.privmsg("#room", "hi").await.unwrap();
    assert!(alice.silent_for(Duration::from_millis(300)).await);
}

#[tokio::test]
async fn cap_negotiation_defers_registration_until_end() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();

    alice.send_raw("CAP LS 302").await.unwrap();
    let ls = alice
        .recv_until(|m| matches!(&m.command, Command::Raw(name, _) if name == "CAP"))
        .await
        .unwrap();
    let cap_line = ls.last().unwrap().to_string();
    assert!(cap_line.contains("sasl=PLAIN,EXTERNAL,SCRAM-SHA-256"), "{cap_line}");
    assert!(cap_line.contains("echo-message"));

    alice.send_raw("NICK alice").await.unwrap();
    alice.send_raw("USER a 0 * :Alice").await.unwrap();
    // CAP is still open: no welcome yet.
    assert!(alice.silent_for(Duration::from_millis(300)).await);

    alice.send_raw("CAP REQ :echo-message server-time").await.unwrap();
    alice
        .recv_until(|m| m.to_string().contains("ACK"))
        .await
        .unwrap();

    alice.send_raw("CAP END").await.unwrap();
    let burst = alice
        .recv_until(|m| matches!(m.command, Command::Response(Response::RPL_WELCOME, _)))
        .await
        .unwrap();
    assert!(!burst.is_empty());
}

#[tokio::test]
async fn nickname_in_use_leaves_session_unregistered() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut bob = TestClient::connect(server.addr, "bob").await.unwrap();
    bob.register().await.unwrap();

    let mut imposter = TestClient::connect(server.addr, "bob").await.unwrap();
    imposter.send_raw("NICK bob").await.unwrap();
    let rejected = imposter
        .recv_until_numeric(Response::ERR_NICKNAMEINUSE)
        .await
        .unwrap();
    let last = rejected.last().unwrap().to_string();
    assert!(
        last.contains("433 * bob"),
        "unexpected collision reply: {last}"
    );

    // Still pre-registration: USER alone completes nothing.
    imposter.send_raw("USER i 0 * :Imposter").await.unwrap();
    assert!(imposter.silent_for(Duration::from_millis(300)).await);

    // A fresh nick completes registration normally.
    imposter.send_raw("NICK robert").await.unwrap();
    imposter
        .recv_until(|m| matches!(m.command, Command::Response(Response::RPL_WELCOME, _)))
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_commands_silent_before_registration() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();

    alice.send_raw("FROBNICATE x").await.unwrap();
    assert!(alice.silent_for(Duration::from_millis(300)).await);

    alice.register().await.unwrap();
    alice.send_raw("FROBNICATE x").await.unwrap();
    let replies = alice
        .recv_until_numeric(Response::ERR_UNKNOWNCOMMAND)
        .await
        .unwrap();
    assert!(replies.last().unwrap().to_string().contains("FROBNICATE"));
}

#[tokio::test]
async fn pass_mismatch_is_fatal() {
    let server = TestServer::spawn_with(|c| {
        c.server.password = Some("sekrit".into());
    })
    .await
    .expect("spawn server");

    let mut alice = TestClient::connect(server.addr, "alice").await.unwrap();
    alice.send_raw("PASS wrong").await.unwrap();
    alice.send_raw("NICK alice").await.unwrap();
    alice.send_raw("USER a 0 * :Alice").await.unwrap();
    let messages = alice
        .recv_until(|m| matches!(m.command, Command::ERROR(_)))
        .await
        .unwrap();
    assert!(numerics(&messages).contains(&464));

    // The right password registers fine.
    let mut bob = TestClient::connect(server.addr, "bob").await.unwrap();
    bob.send_raw("PASS sekrit").await.unwrap();
    bob.register().await.unwrap();
}
