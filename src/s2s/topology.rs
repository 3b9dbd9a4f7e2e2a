//! The server spanning tree.
//!
//! The local server is the root. Every known server records the direct
//! neighbour (`via`) through which it is reached and the server that
//! introduced it (`learned_from`). Routing a UID-addressed message walks
//! `via`; a neighbour link dropping removes its whole subtree.

use dashmap::DashMap;

/// A server known to the network.
#[derive(Debug, Clone)]
pub struct LinkedServer {
    /// 3-character server id.
    pub sid: String,
    /// Dotted server name.
    pub name: String,
    pub description: String,
    /// Hops from the local server.
    pub hopcount: u32,
    /// SID of the server that introduced this one; `None` for direct
    /// neighbours.
    pub learned_from: Option<String>,
    /// SID of the direct neighbour this server is reached through (its own
    /// SID for direct neighbours).
    pub via: String,
}

/// The spanning tree of known servers, excluding the local one.
#[derive(Debug, Default)]
pub struct Topology {
    servers: DashMap<String, LinkedServer>,
}

impl Topology {
    /// Record a direct neighbour.
    pub fn add_neighbor(&self, sid: &str, name: &str, description: &str) {
        self.servers.insert(
            sid.to_string(),
            LinkedServer {
                sid: sid.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                hopcount: 1,
                learned_from: None,
                via: sid.to_string(),
            },
        );
    }

    /// Record a server introduced over an existing link.
    ///
    /// Fails (returns false) when the SID is already known, which the
    /// caller treats as a routing loop.
    pub fn add_remote(
        &self,
        sid: &str,
        name: &str,
        description: &str,
        hopcount: u32,
        learned_from: &str,
        via: &str,
    ) -> bool {
        if self.servers.contains_key(sid) {
            return false;
        }
        self.servers.insert(
            sid.to_string(),
            LinkedServer {
                sid: sid.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                hopcount,
                learned_from: Some(learned_from.to_string()),
                via: via.to_string(),
            },
        );
        true
    }

    /// True if the SID is known.
    pub fn contains(&self, sid: &str) -> bool {
        self.servers.contains_key(sid)
    }

    /// Look up a server.
    pub fn get(&self, sid: &str) -> Option<LinkedServer> {
        self.servers.get(sid).map(|s| s.clone())
    }

    /// Find a server by name.
    pub fn find_by_name(&self, name: &str) -> Option<LinkedServer> {
        self.servers
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone())
    }

    /// The direct neighbour to forward through for `sid`.
    pub fn next_hop(&self, sid: &str) -> Option<String> {
        self.servers.get(sid).map(|s| s.via.clone())
    }

    /// Remove a direct neighbour and everything learned through it.
    ///
    /// Returns the removed servers, the dropped neighbour first.
    pub fn remove_subtree(&self, neighbor_sid: &str) -> Vec<LinkedServer> {
        let doomed: Vec<String> = self
            .servers
            .iter()
            .filter(|entry| entry.value().via == neighbor_sid)
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = Vec::new();
        for sid in doomed {
            if let Some((_, server)) = self.servers.remove(&sid) {
                removed.push(server);
            }
        }
        removed.sort_by_key(|s| s.hopcount);
        removed
    }

    /// Snapshot of all known servers (LINKS, burst).
    pub fn snapshot(&self) -> Vec<LinkedServer> {
        let mut servers: Vec<LinkedServer> =
            self.servers.iter().map(|e| e.value().clone()).collect();
        servers.sort_by(|a, b| a.hopcount.cmp(&b.hopcount).then(a.sid.cmp(&b.sid)));
        servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Topology {
        let topo = Topology::default();
        topo.add_neighbor("002", "two.lark.test", "peer two");
        topo.add_neighbor("003", "three.lark.test", "peer three");
        assert!(topo.add_remote("004", "four.lark.test", "behind two", 2, "002", "002"));
        assert!(topo.add_remote("005", "five.lark.test", "behind four", 3, "004", "002"));
        topo
    }

    #[test]
    fn routes_via_direct_neighbor() {
        let topo = sample();
        assert_eq!(topo.next_hop("002").as_deref(), Some("002"));
        assert_eq!(topo.next_hop("004").as_deref(), Some("002"));
        assert_eq!(topo.next_hop("005").as_deref(), Some("002"));
        assert_eq!(topo.next_hop("003").as_deref(), Some("003"));
        assert_eq!(topo.next_hop("009"), None);
    }

    #[test]
    fn duplicate_sid_is_a_loop() {
        let topo = sample();
        assert!(!topo.add_remote("004", "imposter.lark.test", "x", 2, "003", "003"));
    }

    #[test]
    fn subtree_removal_is_recursive() {
        let topo = sample();
        let removed = topo.remove_subtree("002");
        let sids: Vec<&str> = removed.iter().map(|s| s.sid.as_str()).collect();
        assert_eq!(sids, vec!["002", "004", "005"]);
        assert!(topo.contains("003"));
        assert!(!topo.contains("004"));
        // A second removal finds nothing: cleanup is idempotent.
        assert!(topo.remove_subtree("002").is_empty());
    }

    #[test]
    fn snapshot_orders_by_hopcount() {
        let topo = sample();
        let hops: Vec<u32> = topo.snapshot().iter().map(|s| s.hopcount).collect();
        assert_eq!(hops, vec![1, 1, 2, 3]);
    }
}
