//! Federated traversal for `LIST`, `WHO`, and `VERIFY` (spec.md §4.5).
//!
//! Unlike `SAY`/`JOIN` flooding, these queries follow an explicit route:
//! each hop carries the full unvisited-neighbor list and pops its own
//! address off before forwarding, so the path through the mesh is fully
//! determined by the first server's neighbor ordering.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use crate::proto::Packet;
use crate::server::{Outbox, ServerContext};

use super::session::{local_channel_names, local_who};

fn append_unique(unvisited: &mut Vec<SocketAddr>, candidates: impl Iterator<Item = SocketAddr>, exclude: SocketAddr) {
    for addr in candidates {
        if addr != exclude && !unvisited.contains(&addr) {
            unvisited.push(addr);
        }
    }
}

// ---- LIST -----------------------------------------------------------------

pub fn start_list(ctx: &ServerContext, client_addr: SocketAddr, out: &mut Outbox) {
    let channels = local_channel_names(ctx);
    let unvisited: Vec<SocketAddr> = ctx.neighbors.iter().map(|n| n.addr).collect();
    let id = super::random_id();
    continue_list(id, client_addr, channels, unvisited, out);
}

pub fn handle_s2s_list(
    ctx: &mut ServerContext,
    from: SocketAddr,
    id: u64,
    client_addr: SocketAddr,
    channels: Vec<String>,
    unvisited: Vec<SocketAddr>,
    out: &mut Outbox,
) {
    if ctx.msg_cache.contains(id) {
        continue_list(id, client_addr, channels, unvisited, out);
        return;
    }
    ctx.msg_cache.insert(id);

    let mut merged: BTreeSet<String> = channels.into_iter().collect();
    merged.extend(local_channel_names(ctx));

    let mut unvisited = unvisited;
    append_unique(&mut unvisited, ctx.neighbors.iter().map(|n| n.addr), from);

    continue_list(id, client_addr, merged.into_iter().collect(), unvisited, out);
}

fn continue_list(id: u64, client_addr: SocketAddr, channels: Vec<String>, mut unvisited: Vec<SocketAddr>, out: &mut Outbox) {
    if unvisited.is_empty() {
        out.push((client_addr, Packet::TxtList { channels }));
    } else {
        let next = unvisited.remove(0);
        out.push((next, Packet::S2sList { id, client_addr, channels, unvisited }));
    }
}

// ---- WHO --------------------------------------------------------------

pub fn start_who(ctx: &ServerContext, client_addr: SocketAddr, channel: String, out: &mut Outbox) {
    let usernames = local_who(ctx, &channel);
    let unvisited: Vec<SocketAddr> = ctx.neighbors.iter().map(|n| n.addr).collect();
    let id = super::random_id();
    continue_who(id, client_addr, channel, usernames, unvisited, out);
}

pub fn handle_s2s_who(
    ctx: &mut ServerContext,
    from: SocketAddr,
    id: u64,
    client_addr: SocketAddr,
    channel: String,
    usernames: Vec<String>,
    unvisited: Vec<SocketAddr>,
    out: &mut Outbox,
) {
    if ctx.msg_cache.contains(id) {
        continue_who(id, client_addr, channel, usernames, unvisited, out);
        return;
    }
    ctx.msg_cache.insert(id);

    let mut merged: BTreeSet<String> = usernames.into_iter().collect();
    merged.extend(local_who(ctx, &channel));

    let mut unvisited = unvisited;
    append_unique(&mut unvisited, ctx.neighbors.iter().map(|n| n.addr), from);

    continue_who(id, client_addr, channel, merged.into_iter().collect(), unvisited, out);
}

fn continue_who(
    id: u64,
    client_addr: SocketAddr,
    channel: String,
    usernames: Vec<String>,
    mut unvisited: Vec<SocketAddr>,
    out: &mut Outbox,
) {
    if unvisited.is_empty() {
        out.push((client_addr, Packet::TxtWho { channel, usernames }));
    } else {
        let next = unvisited.remove(0);
        out.push((next, Packet::S2sWho { id, client_addr, channel, usernames, unvisited }));
    }
}

// ---- VERIFY -------------------------------------------------------------

pub fn start_verify(ctx: &ServerContext, client_addr: SocketAddr, username: String, out: &mut Outbox) {
    // Caller already confirmed no local collision and that neighbors exist.
    let unvisited: Vec<SocketAddr> = ctx.neighbors.iter().map(|n| n.addr).collect();
    let id = super::random_id();
    continue_verify(id, client_addr, username, unvisited, out);
}

pub fn handle_s2s_verify(
    ctx: &mut ServerContext,
    from: SocketAddr,
    id: u64,
    client_addr: SocketAddr,
    username: String,
    unvisited: Vec<SocketAddr>,
    out: &mut Outbox,
) {
    if ctx.msg_cache.contains(id) {
        continue_verify(id, client_addr, username, unvisited, out);
        return;
    }
    ctx.msg_cache.insert(id);

    if ctx.users.username_taken(&username) {
        // spec.md §4.5: "if the local check already finds a collision,
        // short-circuit — reply negatively to the client immediately."
        out.push((client_addr, Packet::TxtVerify { valid: false }));
        return;
    }

    let mut unvisited = unvisited;
    append_unique(&mut unvisited, ctx.neighbors.iter().map(|n| n.addr), from);

    continue_verify(id, client_addr, username, unvisited, out);
}

fn continue_verify(id: u64, client_addr: SocketAddr, username: String, mut unvisited: Vec<SocketAddr>, out: &mut Outbox) {
    if unvisited.is_empty() {
        out.push((client_addr, Packet::TxtVerify { valid: true }));
    } else {
        let next = unvisited.remove(0);
        out.push((next, Packet::S2sVerify { id, client_addr, username, unvisited }));
    }
}
