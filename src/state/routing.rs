//! Routing table: channel → subscribed neighbor servers, the per-channel
//! federated sub-tree projected onto this server (spec.md §3 "RoutingEntry",
//! §4.3).

use std::collections::HashMap;

/// The set of neighbors this server forwards `channel`'s traffic to/from.
#[derive(Debug, Clone, Default)]
pub struct RoutingEntry {
    pub channel: String,
    /// Neighbor keys, insertion order.
    pub neighbors: Vec<String>,
}

impl RoutingEntry {
    /// spec.md §3: "a leaf in that channel's sub-tree" when the routing
    /// list has fewer than two members.
    pub fn is_leaf_routing(&self) -> bool {
        self.neighbors.len() < 2
    }
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: HashMap<String, RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &str) -> Option<&RoutingEntry> {
        self.entries.get(channel)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// Register `channel` as routed, pre-populated with `neighbors`
    /// (spec.md §4.2 JOIN: "register the channel in the routing table
    /// (prepopulated with every neighbor)").
    pub fn register_with(&mut self, channel: &str, neighbors: impl IntoIterator<Item = String>) {
        self.entries.entry(channel.to_string()).or_insert_with(|| RoutingEntry {
            channel: channel.to_string(),
            neighbors: neighbors.into_iter().collect(),
        });
    }

    /// Append `neighbor_key` to `channel`'s subscriber list if not already
    /// present, creating the routing entry if needed. Returns `true` if the
    /// entry was newly created (the channel wasn't routed before).
    pub fn add_subscriber(&mut self, channel: &str, neighbor_key: &str) -> bool {
        let created = !self.entries.contains_key(channel);
        let entry = self.entries.entry(channel.to_string()).or_insert_with(|| RoutingEntry {
            channel: channel.to_string(),
            neighbors: Vec::new(),
        });
        if !entry.neighbors.iter().any(|n| n == neighbor_key) {
            entry.neighbors.push(neighbor_key.to_string());
        }
        created
    }

    pub fn remove_subscriber(&mut self, channel: &str, neighbor_key: &str) {
        if let Some(entry) = self.entries.get_mut(channel) {
            entry.neighbors.retain(|n| n != neighbor_key);
        }
    }

    pub fn remove_channel(&mut self, channel: &str) {
        self.entries.remove(channel);
    }

    /// Scrub a departed neighbor from every routing entry. Returns the
    /// channels whose entry changed, so callers can re-run leaf evaluation.
    pub fn scrub_neighbor(&mut self, neighbor_key: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for (channel, entry) in self.entries.iter_mut() {
            let before = entry.neighbors.len();
            entry.neighbors.retain(|n| n != neighbor_key);
            if entry.neighbors.len() != before {
                touched.push(channel.clone());
            }
        }
        touched
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_with_is_idempotent() {
        let mut t = RoutingTable::new();
        t.register_with("dev", ["a".to_string(), "b".to_string()]);
        t.register_with("dev", ["c".to_string()]);
        assert_eq!(t.get("dev").unwrap().neighbors, vec!["a", "b"]);
    }

    #[test]
    fn add_subscriber_dedupes_and_reports_creation() {
        let mut t = RoutingTable::new();
        assert!(t.add_subscriber("dev", "a"));
        assert!(!t.add_subscriber("dev", "a"));
        assert!(!t.add_subscriber("dev", "b"));
        assert_eq!(t.get("dev").unwrap().neighbors, vec!["a", "b"]);
    }

    #[test]
    fn scrub_neighbor_reports_touched_channels() {
        let mut t = RoutingTable::new();
        t.register_with("dev", ["a".to_string()]);
        t.register_with("ops", ["b".to_string()]);
        let touched = t.scrub_neighbor("a");
        assert_eq!(touched, vec!["dev".to_string()]);
        assert!(t.get("dev").unwrap().neighbors.is_empty());
    }

    #[test]
    fn leaf_routing_threshold() {
        let mut entry = RoutingEntry { channel: "dev".into(), neighbors: vec![] };
        assert!(entry.is_leaf_routing());
        entry.neighbors.push("a".into());
        assert!(entry.is_leaf_routing());
        entry.neighbors.push("b".into());
        assert!(!entry.is_leaf_routing());
    }
}
