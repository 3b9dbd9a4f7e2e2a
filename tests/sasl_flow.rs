//! SASL authentication during registration.

mod common;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::{TestClient, TestServer};
use lark_proto::{Command, Response};

fn plain_payload(account: &str, password: &str) -> String {
    BASE64.encode(format!("\0{account}\0{password}"))
}

#[tokio::test]
async fn sasl_plain_success_sets_the_account() {
    let server = TestServer::spawn().await.unwrap();
    server.accounts.insert("alice", "hunter2");

    let mut client = TestClient::connect(server.addr, "alice").await.unwrap();
    client.send_raw("CAP LS 302").await.unwrap();
    client
        .recv_until(|m| matches!(&m.command, Command::Raw(name, _) if name == "CAP"))
        .await
        .unwrap();
    client.send_raw("CAP REQ :sasl").await.unwrap();
    client
        .recv_until(|m| m.to_string().contains("ACK"))
        .await
        .unwrap();

    client.send_raw("AUTHENTICATE PLAIN").await.unwrap();
    client
        .recv_until(|m| matches!(&m.command, Command::AUTHENTICATE(p) if p == "+"))
        .await
        .unwrap();

    client
        .send_raw(&format!("AUTHENTICATE {}", plain_payload("alice", "hunter2")))
        .await
        .unwrap();
    let outcome = client
        .recv_until_numeric(Response::RPL_SASLSUCCESS)
        .await
        .unwrap();
    assert!(outcome.iter().any(|m| matches!(
        m.command,
        Command::Response(Response::RPL_LOGGEDIN, _)
    )));

    client.send_raw("NICK alice").await.unwrap();
    client.send_raw("USER a 0 * :Alice").await.unwrap();
    client.send_raw("CAP END").await.unwrap();
    client
        .recv_until(|m| matches!(m.command, Command::Response(Response::RPL_WELCOME, _)))
        .await
        .unwrap();

    let uid = server.nexus.uid_for_nick("alice").unwrap();
    let user = server.nexus.user(&uid).unwrap();
    assert_eq!(user.read().account.as_deref(), Some("alice"));
    assert!(user.read().modes.registered);
}

#[tokio::test]
async fn sasl_plain_bad_password_fails() {
    let server = TestServer::spawn().await.unwrap();
    server.accounts.insert("alice", "hunter2");

    let mut client = TestClient::connect(server.addr, "sneak").await.unwrap();
    client.send_raw("CAP LS 302").await.unwrap();
    client.drain(std::time::Duration::from_millis(100)).await;
    client.send_raw("CAP REQ :sasl").await.unwrap();
    client.drain(std::time::Duration::from_millis(100)).await;

    client.send_raw("AUTHENTICATE PLAIN").await.unwrap();
    client
        .recv_until(|m| matches!(&m.command, Command::AUTHENTICATE(p) if p == "+"))
        .await
        .unwrap();
    client
        .send_raw(&format!("AUTHENTICATE {}", plain_payload("alice", "wrong")))
        .await
        .unwrap();
    client
        .recv_until_numeric(Response::ERR_SASLFAIL)
        .await
        .unwrap();
}

#[tokio::test]
async fn sasl_abort_reports_aborted() {
    let server = TestServer::spawn().await.unwrap();
    let mut client = TestClient::connect(server.addr, "quitter").await.unwrap();

    client.send_raw("AUTHENTICATE PLAIN").await.unwrap();
    client
        .recv_until(|m| matches!(&m.command, Command::AUTHENTICATE(p) if p == "+"))
        .await
        .unwrap();
    client.send_raw("AUTHENTICATE *").await.unwrap();
    client
        .recv_until_numeric(Response::ERR_SASLABORTED)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_mechanism_lists_the_supported_set() {
    let server = TestServer::spawn().await.unwrap();
    let mut client = TestClient::connect(server.addr, "curious").await.unwrap();

    client.send_raw("AUTHENTICATE CRAM-MD5").await.unwrap();
    let seen = client
        .recv_until_numeric(Response::ERR_SASLFAIL)
        .await
        .unwrap();
    let mechs = seen
        .iter()
        .find(|m| matches!(m.command, Command::Response(Response::RPL_SASLMECHS, _)))
        .expect("908 should list mechanisms")
        .to_string();
    assert!(mechs.contains("PLAIN,EXTERNAL,SCRAM-SHA-256"), "{mechs}");
}
