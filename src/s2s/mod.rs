//! Server-to-server federation: handshake, burst, routing, and netsplit
//! cleanup.

pub mod burst;
pub mod collide;
pub mod dispatch;
pub mod link;
pub mod session;
pub mod topology;

use std::sync::Arc;

use lark_proto::{Command, Message, Prefix};
use tracing::info;

use crate::state::Nexus;

/// A direct neighbour's link dropped (or was SQUIT): remove its whole
/// subtree, purge the affected users with netsplit QUIT reasons, and tell
/// the remaining neighbours. Safe to call more than once for the same SID.
pub async fn handle_link_loss(nexus: &Arc<Nexus>, sid: &str, reason: &str) {
    if let Some((_, handle)) = nexus.links.remove(sid) {
        handle.queue.close();
        info!(sid = %sid, name = %handle.name, reason = %reason, "server link lost");
    }
    remove_subtree_and_purge(nexus, sid, Some(sid)).await;

    let squit = Message {
        tags: None,
        prefix: Some(Prefix::ServerName(nexus.info.sid.clone())),
        command: Command::SQUIT(sid.to_string(), Some(reason.to_string())),
    };
    nexus.broadcast_links(&squit, Some(sid));
}

/// Remove `sid` and everything learned through it from the topology, then
/// purge every user those servers owned. Idempotent: a second call finds
/// nothing to remove.
pub async fn remove_subtree_and_purge(
    nexus: &Arc<Nexus>,
    sid: &str,
    from_link: Option<&str>,
) {
    let removed = nexus.topology.remove_subtree(sid);
    if removed.is_empty() {
        return;
    }
    let local_name = nexus.info.name.clone();

    for server in &removed {
        // Netsplit reason: `<lost.server> <local.server>`.
        let reason = format!("{} {}", server.name, local_name);
        let victims: Vec<String> = nexus
            .users
            .iter()
            .filter(|e| e.value().read().server == server.sid)
            .map(|e| e.key().clone())
            .collect();
        info!(
            sid = %server.sid,
            name = %server.name,
            users = victims.len(),
            "purging split server"
        );
        for uid in victims {
            nexus.quit_user(&uid, &reason, true, from_link).await;
        }
    }
}

/// Spawn outbound connections for every autoconnect link block.
pub fn connect_links(nexus: &Arc<Nexus>) {
    for block in nexus.link_blocks.iter().filter(|b| b.autoconnect) {
        let nexus = nexus.clone();
        let block = block.clone();
        tokio::spawn(async move {
            session::run_outbound(nexus, block).await;
        });
    }
}
