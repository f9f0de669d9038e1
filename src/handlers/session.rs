//! Client-facing request handlers (spec.md §4.2).

use std::collections::BTreeSet;
use std::net::SocketAddr;

use crate::error::DuckChatError;
use crate::limits::MAX_CHANNELS;
use crate::proto::Packet;
use crate::server::{Outbox, ServerContext};
use crate::timer;

use super::traversal;

pub fn handle_verify(ctx: &mut ServerContext, from: SocketAddr, username: String, out: &mut Outbox) {
    if ctx.users.username_taken(&username) {
        out.push((from, Packet::TxtVerify { valid: false }));
        return;
    }
    if ctx.neighbors.is_empty() {
        out.push((from, Packet::TxtVerify { valid: true }));
        return;
    }
    traversal::start_verify(ctx, from, username, out);
}

/// Truncate rather than reject an oversized username (v2's reject-on-
/// overflow behavior risks buffer overruns downstream; truncating matches
/// v1). The wire codec already bounds every decoded username to
/// `USERNAME_MAX - 1` bytes, so this is a no-op in practice; it exists so
/// the truncation policy is visible at the one call site that creates users.
pub fn handle_login(ctx: &mut ServerContext, from: SocketAddr, username: String, _out: &mut Outbox) {
    let now = timer::wall_clock_minute();
    ctx.users.login(from, username, now);
}

pub fn handle_logout(ctx: &mut ServerContext, from: SocketAddr, out: &mut Outbox) {
    force_logout(ctx, &from.to_string(), out);
}

/// Shared by `REQ_LOGOUT` and the inactivity sweep (spec.md §4.2 LOGOUT,
/// §4.6): remove the user, scrub it from every channel it was in, and
/// re-evaluate this server's leaf status for each.
pub fn force_logout(ctx: &mut ServerContext, key: &str, out: &mut Outbox) {
    let Some(user) = ctx.users.remove(key) else { return };
    for channel in user.channels {
        ctx.channels.remove_member(&channel, key);
        if ctx.channels.get(&channel).is_some_and(|c| c.is_empty()) {
            ctx.channels.drop_if_not_common(&channel);
        }
        super::s2s::reevaluate_leaf(ctx, &channel, out);
    }
}

pub fn handle_join(ctx: &mut ServerContext, from: SocketAddr, channel: String, out: &mut Outbox) {
    let key = from.to_string();
    if !ctx.users.contains_key(&key) {
        return;
    }
    if !ctx.users.subscribe(&key, &channel) {
        let message = DuckChatError::ChannelLimitExceeded(MAX_CHANNELS).client_message();
        out.push((from, Packet::TxtError { message }));
        return;
    }
    if !ctx.routing.contains(&channel) && !ctx.neighbors.is_empty() {
        let all_neighbors: Vec<String> = ctx.neighbors.iter().map(|n| n.key.clone()).collect();
        ctx.routing.register_with(&channel, all_neighbors);
        super::s2s::flood_s2s_join(ctx, &channel, None, out);
    }
    ctx.channels.add_member(&channel, &key);
}

pub fn handle_leave(ctx: &mut ServerContext, from: SocketAddr, channel: String, out: &mut Outbox) {
    let key = from.to_string();
    ctx.users.unsubscribe(&key, &channel);
    ctx.channels.remove_member(&channel, &key);
    if ctx.channels.get(&channel).is_some_and(|c| c.is_empty()) {
        ctx.channels.drop_if_not_common(&channel);
    }
    super::s2s::reevaluate_leaf(ctx, &channel, out);
}

pub fn handle_say(ctx: &mut ServerContext, from: SocketAddr, channel: String, text: String, out: &mut Outbox) {
    let key = from.to_string();
    let Some(user) = ctx.users.get(&key) else {
        let message = DuckChatError::NotLoggedIn.client_message();
        out.push((from, Packet::TxtError { message }));
        return;
    };
    let username = user.username.clone();

    deliver_txt_say(ctx, &channel, &username, &text, out);

    let neighbors: Vec<String> = ctx
        .routing
        .get(&channel)
        .map(|e| e.neighbors.clone())
        .unwrap_or_default();
    if !neighbors.is_empty() {
        let id = super::random_id();
        // "The originating server adds its own id to the suppression cache
        // before forwarding" (spec.md §4.2 SAY).
        ctx.msg_cache.insert(id);
        for key in neighbors {
            if let Some(n) = ctx.neighbors.get(&key) {
                out.push((
                    n.addr,
                    Packet::S2sSay { id, channel: channel.clone(), username: username.clone(), text: text.clone() },
                ));
            }
        }
    }
}

/// Unicast `TXT_SAY` to every local subscriber of `channel`. Shared with
/// the S2S delivery step (spec.md §4.4 step 3).
pub(crate) fn deliver_txt_say(ctx: &ServerContext, channel: &str, username: &str, text: &str, out: &mut Outbox) {
    let Some(c) = ctx.channels.get(channel) else { return };
    for member_key in &c.members {
        if let Some(user) = ctx.users.get(member_key) {
            out.push((
                user.addr,
                Packet::TxtSay { channel: channel.to_string(), username: username.to_string(), text: text.to_string() },
            ));
        }
    }
}

pub fn handle_list(ctx: &mut ServerContext, from: SocketAddr, out: &mut Outbox) {
    if ctx.neighbors.is_empty() {
        out.push((from, Packet::TxtList { channels: local_channel_names(ctx) }));
    } else {
        traversal::start_list(ctx, from, out);
    }
}

pub fn handle_who(ctx: &mut ServerContext, from: SocketAddr, channel: String, out: &mut Outbox) {
    if ctx.neighbors.is_empty() {
        let usernames = local_who(ctx, &channel);
        out.push((from, Packet::TxtWho { channel, usernames }));
    } else {
        traversal::start_who(ctx, from, channel, out);
    }
}

pub fn handle_keep_alive(ctx: &mut ServerContext, from: SocketAddr) {
    let now = timer::wall_clock_minute();
    ctx.users.touch(&from.to_string(), now);
}

pub(crate) fn local_channel_names(ctx: &ServerContext) -> Vec<String> {
    let set: BTreeSet<String> = ctx.channels.names().map(String::from).collect();
    set.into_iter().collect()
}

pub(crate) fn local_who(ctx: &ServerContext, channel: &str) -> Vec<String> {
    let Some(c) = ctx.channels.get(channel) else { return Vec::new() };
    c.members.iter().filter_map(|key| ctx.users.get(key)).map(|u| u.username.clone()).collect()
}
