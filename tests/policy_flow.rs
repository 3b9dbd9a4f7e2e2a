//! Channel policy: flood windows, join throttle, caller-id, delayed join,
//! monitor.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};
use lark_proto::{Command, Response};

async fn registered(server: &TestServer, nick: &str) -> TestClient {
    let mut client = TestClient::connect(server.addr, nick).await.unwrap();
    client.register().await.unwrap();
    client
}

#[tokio::test]
async fn flood_limit_kicks_the_sender() {
    let server = TestServer::spawn().await.unwrap();
    let mut alice = registered(&server, "alice").await;
    let mut bob = registered(&server, "bob").await;

    alice.join("#busy").await.unwrap();
    alice.send_raw("MODE #busy +f m:2:10").await.unwrap();
    bob.join("#busy").await.unwrap();
    alice.drain(Duration::from_millis(200)).await;
    bob.drain(Duration::from_millis(100)).await;

    // Two messages pass, the third within the window trips the limiter.
    bob.privmsg("#busy", "one").await.unwrap();
    bob.privmsg("#busy", "two").await.unwrap();
    bob.privmsg("#busy", "three").await.unwrap();

    let seen = bob
        .recv_until(|m| matches!(
            &m.command,
            Command::KICK(chan, target, _) if chan == "#busy" && target == "bob"
        ))
        .await
        .unwrap();
    assert!(seen.last().unwrap().to_string().contains("Flood"));

    // Exactly the two allowed messages were delivered to alice.
    let delivered = alice
        .recv_until(|m| matches!(&m.command, Command::KICK(..)))
        .await
        .unwrap();
    let count = delivered
        .iter()
        .filter(|m| matches!(&m.command, Command::PRIVMSG(..)))
        .count();
    assert_eq!(count, 2, "no more than the window limit may be delivered");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let chan = server.nexus.channel("#busy").unwrap();
    assert_eq!(chan.read().members.len(), 1);
}

#[tokio::test]
async fn join_throttle_rejects_beyond_the_window() {
    let server = TestServer::spawn().await.unwrap();
    let mut alice = registered(&server, "alice").await;
    alice.join("#gate").await.unwrap();
    alice.send_raw("MODE #gate +j 1:60").await.unwrap();
    alice.drain(Duration::from_millis(200)).await;

    // First joiner within the window passes...
    let mut bob = registered(&server, "bob").await;
    bob.join("#gate").await.unwrap();

    // ...the second is throttled with a standard reply.
    let mut carol = registered(&server, "carol").await;
    carol.send_raw("JOIN #gate").await.unwrap();
    let seen = carol
        .recv_until(|m| matches!(&m.command, Command::Raw(name, _) if name == "FAIL"))
        .await
        .unwrap();
    let fail = seen.last().unwrap().to_string();
    assert!(fail.contains("JOIN") && fail.contains("RATE_LIMITED"), "{fail}");

    let chan = server.nexus.channel("#gate").unwrap();
    assert_eq!(chan.read().members.len(), 2);
}

#[tokio::test]
async fn callerid_blocks_until_accepted() {
    let server = TestServer::spawn().await.unwrap();
    let mut carol = registered(&server, "carol").await;
    let mut dave = registered(&server, "dave").await;

    carol.send_raw("MODE carol +g").await.unwrap();
    carol.drain(Duration::from_millis(100)).await;

    dave.privmsg("carol", "hey").await.unwrap();
    let rejection = dave
        .recv_until_numeric(Response::RPL_TARGNOTIFY)
        .await
        .unwrap();
    assert!(rejection.iter().any(|m| matches!(
        m.command,
        Command::Response(Response::RPL_TARGUMODEG, _)
    )));

    // Carol hears the one-shot 718, not the message.
    let carol_side = carol
        .recv_until_numeric(Response::RPL_UMODEGMSG)
        .await
        .unwrap();
    assert!(!carol_side
        .iter()
        .any(|m| matches!(&m.command, Command::PRIVMSG(..))));

    // A repeat within the minute is silent for carol.
    dave.privmsg("carol", "hey again").await.unwrap();
    assert!(carol.silent_for(Duration::from_millis(300)).await);

    // ACCEPT opens the path.
    carol.send_raw("ACCEPT dave").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    dave.privmsg("carol", "third time").await.unwrap();
    carol
        .recv_until(|m| matches!(
            &m.command,
            Command::PRIVMSG(_, text) if text == "third time"
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn delayed_join_hides_until_first_message() {
    let server = TestServer::spawn().await.unwrap();
    let mut alice = registered(&server, "alice").await;
    let mut bob = registered(&server, "bob").await;

    alice.join("#quiet").await.unwrap();
    alice.send_raw("MODE #quiet +D").await.unwrap();
    alice.drain(Duration::from_millis(200)).await;

    // Bob's join is announced to nobody.
    bob.join("#quiet").await.unwrap();
    assert!(alice.silent_for(Duration::from_millis(300)).await);

    // Hidden members are absent from NAMES.
    alice.send_raw("NAMES #quiet").await.unwrap();
    let names = alice
        .recv_until_numeric(Response::RPL_ENDOFNAMES)
        .await
        .unwrap();
    let listed = names
        .iter()
        .filter_map(|m| match &m.command {
            Command::Response(Response::RPL_NAMREPLY, params) => params.last().cloned(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ");
    assert!(!listed.contains("bob"), "hidden member listed: {listed}");

    // Speaking reveals: alice sees JOIN then the message.
    bob.privmsg("#quiet", "surprise").await.unwrap();
    let seen = alice
        .recv_until(|m| matches!(
            &m.command,
            Command::PRIVMSG(_, text) if text == "surprise"
        ))
        .await
        .unwrap();
    let join_pos = seen
        .iter()
        .position(|m| matches!(&m.command, Command::JOIN(chan, _) if chan == "#quiet"))
        .expect("reveal JOIN before the message");
    let msg_pos = seen.len() - 1;
    assert!(join_pos < msg_pos);
}

#[tokio::test]
async fn overlong_away_message_truncates_with_a_warning() {
    let server = TestServer::spawn_with(|c| c.limits.away_len = 10).await.unwrap();
    let mut alice = registered(&server, "alice").await;

    alice
        .send_raw(&format!("AWAY :{}", "x".repeat(40)))
        .await
        .unwrap();
    let seen = alice
        .recv_until_numeric(Response::RPL_NOWAWAY)
        .await
        .unwrap();
    let warning = seen
        .iter()
        .find(|m| matches!(&m.command, Command::Raw(name, _) if name == "WARN"))
        .expect("truncation should emit a WARN standard reply")
        .to_string();
    assert!(warning.contains("AWAY") && warning.contains("MESSAGE_TRUNCATED"), "{warning}");

    // The stored message is the shortened form.
    let uid = server.nexus.uid_for_nick("alice").unwrap();
    let user = server.nexus.user(&uid).unwrap();
    assert_eq!(user.read().away.as_deref(), Some("xxxxxxxxxx"));
}

#[tokio::test]
async fn monitor_notifies_and_bounds_the_list() {
    let server = TestServer::spawn().await.unwrap();
    let mut watcher = registered(&server, "watcher").await;

    watcher.send_raw("MONITOR + target").await.unwrap();
    watcher
        .recv_until_numeric(Response::RPL_MONOFFLINE)
        .await
        .unwrap();

    // Target signs on: 730 with the full mask.
    let mut target = TestClient::connect(server.addr, "target").await.unwrap();
    target.register().await.unwrap();
    let online = watcher
        .recv_until_numeric(Response::RPL_MONONLINE)
        .await
        .unwrap();
    assert!(online.last().unwrap().to_string().contains("target!"));

    // And off again: 731.
    target.quit().await.unwrap();
    watcher
        .recv_until_numeric(Response::RPL_MONOFFLINE)
        .await
        .unwrap();

    // The 100-entry cap reports the rejected names.
    let bulk: Vec<String> = (0..100).map(|i| format!("bulk{i}")).collect();
    for chunk in bulk.chunks(25) {
        watcher
            .send_raw(&format!("MONITOR + {}", chunk.join(",")))
            .await
            .unwrap();
    }
    watcher.drain(Duration::from_millis(300)).await;
    watcher.send_raw("MONITOR + straw").await.unwrap();
    let full = watcher
        .recv_until_numeric(Response::ERR_MONLISTFULL)
        .await
        .unwrap();
    let line = full.last().unwrap().to_string();
    assert!(line.contains("straw"), "{line}");
}
