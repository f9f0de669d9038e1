//! Logged-in client table, keyed by `"host:port"` (spec.md §3 "User").

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::limits::MAX_CHANNELS;

/// A logged-in client.
#[derive(Debug, Clone)]
pub struct User {
    pub addr: SocketAddr,
    /// Canonical `"host:port"` form — also the key in [`UserTable`].
    pub key: String,
    pub username: String,
    /// Channels this user has joined, insertion order, capped at `MAX_CHANNELS`.
    pub channels: Vec<String>,
    /// Wall-clock minute (0..60) this user was last heard from.
    pub last_minute: u32,
}

impl User {
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

/// All logged-in clients on this server.
#[derive(Debug, Default)]
pub struct UserTable {
    users: HashMap<String, User>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&User> {
        self.users.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut User> {
        self.users.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.users.contains_key(key)
    }

    /// Returns `true` if `username` is already taken by some other user.
    pub fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    /// Create a user keyed by `addr`. If the key already exists, this is a
    /// no-op (spec.md §4.2: "the request is effectively a no-op from the
    /// handler's perspective").
    pub fn login(&mut self, addr: SocketAddr, username: String, now_minute: u32) {
        let key = addr.to_string();
        self.users.entry(key.clone()).or_insert_with(|| User {
            addr,
            key,
            username,
            channels: Vec::new(),
            last_minute: now_minute,
        });
    }

    pub fn remove(&mut self, key: &str) -> Option<User> {
        self.users.remove(key)
    }

    pub fn touch(&mut self, key: &str, now_minute: u32) {
        if let Some(u) = self.users.get_mut(key) {
            u.last_minute = now_minute;
        }
    }

    /// Add `channel` to the user's subscription set. Returns `false` (and
    /// does nothing) if the user is already at `MAX_CHANNELS` or already
    /// subscribed.
    pub fn subscribe(&mut self, key: &str, channel: &str) -> bool {
        match self.users.get_mut(key) {
            Some(u) if u.has_channel(channel) => true,
            Some(u) if u.channels.len() >= MAX_CHANNELS => false,
            Some(u) => {
                u.channels.push(channel.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe(&mut self, key: &str, channel: &str) {
        if let Some(u) = self.users.get_mut(key) {
            u.channels.retain(|c| c != channel);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Keys of users idle for more than `horizon` minutes, per the
    /// wraparound rule in spec.md §4.6.
    pub fn stale_keys(&self, now_minute: u32, horizon: u32) -> Vec<String> {
        self.users
            .values()
            .filter(|u| crate::timer::minute_diff(now_minute, u.last_minute) > horizon)
            .map(|u| u.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn login_is_idempotent_for_same_key() {
        let mut t = UserTable::new();
        t.login(addr(1), "a".into(), 0);
        t.login(addr(1), "b".into(), 5);
        assert_eq!(t.get(&addr(1).to_string()).unwrap().username, "a");
    }

    #[test]
    fn subscribe_respects_max_channels() {
        let mut t = UserTable::new();
        let key = addr(1).to_string();
        t.login(addr(1), "a".into(), 0);
        for i in 0..MAX_CHANNELS {
            assert!(t.subscribe(&key, &format!("c{i}")));
        }
        assert!(!t.subscribe(&key, "one-too-many"));
        assert_eq!(t.get(&key).unwrap().channels.len(), MAX_CHANNELS);
    }

    #[test]
    fn subscribe_to_same_channel_twice_is_a_no_op() {
        let mut t = UserTable::new();
        let key = addr(1).to_string();
        t.login(addr(1), "a".into(), 0);
        assert!(t.subscribe(&key, "dev"));
        assert!(t.subscribe(&key, "dev"));
        assert_eq!(t.get(&key).unwrap().channels.len(), 1);
    }
}
