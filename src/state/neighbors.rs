//! Neighbor table: configured adjacent servers (spec.md §3 "Neighbor").

use std::collections::HashMap;
use std::net::SocketAddr;

/// An adjacent server, as configured at startup.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub addr: SocketAddr,
    pub key: String,
    /// Wall-clock minute (0..60) of the last S2S packet from this neighbor,
    /// including keep-alives.
    pub last_minute: u32,
}

/// All configured adjacent servers. The topology is static (spec.md §1
/// Non-goals: "No dynamic discovery of neighbors") — entries are created
/// once from the CLI and only ever removed by the inactivity sweep.
#[derive(Debug, Default)]
pub struct NeighborTable {
    neighbors: HashMap<String, Neighbor>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: SocketAddr, now_minute: u32) {
        let key = addr.to_string();
        self.neighbors
            .entry(key.clone())
            .or_insert(Neighbor { addr, key, last_minute: now_minute });
    }

    pub fn get(&self, key: &str) -> Option<&Neighbor> {
        self.neighbors.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.neighbors.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Neighbor> {
        self.neighbors.remove(key)
    }

    pub fn touch(&mut self, key: &str, now_minute: u32) {
        if let Some(n) = self.neighbors.get_mut(key) {
            n.last_minute = now_minute;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }

    /// Every configured neighbor except the one whose key is `except`.
    pub fn all_except<'a>(&'a self, except: &'a str) -> impl Iterator<Item = &'a Neighbor> {
        self.neighbors.values().filter(move |n| n.key != except)
    }

    pub fn stale_keys(&self, now_minute: u32, horizon: u32) -> Vec<String> {
        self.neighbors
            .values()
            .filter(|n| crate::timer::minute_diff(now_minute, n.last_minute) > horizon)
            .map(|n| n.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_all_except_excludes_the_sender() {
        let mut t = NeighborTable::new();
        let a: SocketAddr = "127.0.0.1:4001".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:4002".parse().unwrap();
        t.insert(a, 0);
        t.insert(b, 0);
        let remaining: Vec<_> = t.all_except(&a.to_string()).map(|n| n.key.clone()).collect();
        assert_eq!(remaining, vec![b.to_string()]);
    }
}
