//! Server-to-server handlers: soft-state subscription tree maintenance
//! (spec.md §4.3) and loop-suppressed SAY forwarding (spec.md §4.4).

use std::net::SocketAddr;

use crate::proto::Packet;
use crate::server::{Outbox, ServerContext};

use super::session::deliver_txt_say;

/// Flood `S2S_JOIN{channel}` to every neighbor except `exclude` (a neighbor
/// key, or `None` when nothing should be excluded — e.g. a local `JOIN`
/// has no neighbor sender to exclude).
pub(crate) fn flood_s2s_join(ctx: &ServerContext, channel: &str, exclude: Option<&str>, out: &mut Outbox) {
    match exclude {
        Some(key) => {
            for n in ctx.neighbors.all_except(key) {
                out.push((n.addr, Packet::S2sJoin { channel: channel.to_string() }));
            }
        }
        None => {
            for n in ctx.neighbors.iter() {
                out.push((n.addr, Packet::S2sJoin { channel: channel.to_string() }));
            }
        }
    }
}

/// spec.md §4.3 "Join propagation": a channel not yet in the routing table
/// is registered with just the sender as subscriber, then flooded onward
/// to every other neighbor. Each neighbor flooded to also becomes a tree
/// edge on this server's own routing entry — both the direction the join
/// request arrived from and the directions it was relayed to must be in
/// the sub-tree, or this server could never forward a `SAY` back out
/// toward them. A channel already present just gets the sender appended —
/// "the branch is pruned here".
pub fn handle_s2s_join(ctx: &mut ServerContext, from: SocketAddr, channel: String, out: &mut Outbox) {
    let sender_key = from.to_string();
    if ctx.routing.contains(&channel) {
        ctx.routing.add_subscriber(&channel, &sender_key);
        return;
    }

    ctx.routing.register_with(&channel, [sender_key.clone()]);
    let relay_targets: Vec<(String, SocketAddr)> =
        ctx.neighbors.all_except(&sender_key).map(|n| (n.key.clone(), n.addr)).collect();
    for (key, addr) in relay_targets {
        ctx.routing.add_subscriber(&channel, &key);
        out.push((addr, Packet::S2sJoin { channel: channel.clone() }));
    }
}

/// spec.md §4.3 "Leave propagation": the sender is simply scrubbed from
/// the channel's routing list, then leaf status is re-evaluated.
pub fn handle_s2s_leave(ctx: &mut ServerContext, from: SocketAddr, channel: String, out: &mut Outbox) {
    let sender_key = from.to_string();
    ctx.routing.remove_subscriber(&channel, &sender_key);
    reevaluate_leaf(ctx, &channel, out);
}

/// spec.md §4.3 "Leaf probing": forwarded to every routing neighbor for
/// `channel` except the prober; a server that is already a leaf, or that
/// has seen `id` before (loop), replies `S2S_LEAVE` directly to the prober
/// instead of forwarding further.
pub fn handle_s2s_leaf(ctx: &mut ServerContext, from: SocketAddr, channel: String, id: u64, out: &mut Outbox) {
    if ctx.msg_cache.contains(id) {
        out.push((from, Packet::S2sLeave { channel }));
        return;
    }
    ctx.msg_cache.insert(id);

    let local_empty = ctx.channels.get(&channel).is_none_or(|c| c.is_empty());
    let is_leaf = ctx.routing.get(&channel).is_none_or(|e| e.is_leaf_routing());

    if local_empty && is_leaf {
        self_prune(ctx, &channel, out);
        return;
    }

    let sender_key = from.to_string();
    let neighbors: Vec<String> = ctx.routing.get(&channel).map(|e| e.neighbors.clone()).unwrap_or_default();
    for key in neighbors {
        if key == sender_key {
            continue;
        }
        if let Some(n) = ctx.neighbors.get(&key) {
            out.push((n.addr, Packet::S2sLeaf { channel: channel.clone(), id }));
        }
    }
}

pub fn handle_s2s_keep_alive(_ctx: &mut ServerContext, _from: SocketAddr) {
    // Liveness is already recorded generically in `ServerContext::dispatch`
    // for every packet from a configured neighbor; this packet carries no
    // other payload.
}

/// spec.md §4.4 SAY forwarding & loop suppression.
pub fn handle_s2s_say(
    ctx: &mut ServerContext,
    from: SocketAddr,
    id: u64,
    channel: String,
    username: String,
    text: String,
    out: &mut Outbox,
) {
    if ctx.msg_cache.contains(id) {
        out.push((from, Packet::S2sLeave { channel }));
        return;
    }
    ctx.msg_cache.insert(id);

    deliver_txt_say(ctx, &channel, &username, &text, out);

    let local_empty = ctx.channels.get(&channel).is_none_or(|c| c.is_empty());
    if local_empty && ctx.routing.get(&channel).is_some_and(|e| e.is_leaf_routing()) {
        self_prune(ctx, &channel, out);
        return;
    }

    let sender_key = from.to_string();
    let neighbors: Vec<String> = ctx.routing.get(&channel).map(|e| e.neighbors.clone()).unwrap_or_default();
    for key in neighbors {
        if key == sender_key {
            continue;
        }
        if let Some(n) = ctx.neighbors.get(&key) {
            out.push((
                n.addr,
                Packet::S2sSay { id, channel: channel.clone(), username: username.clone(), text: text.clone() },
            ));
        }
    }
}

/// Send `S2S_LEAVE{channel}` to this channel's lone remaining routing
/// neighbor (if any) and drop the channel from the routing table. Called
/// whenever this server provably becomes a leaf with no local subscribers.
fn self_prune(ctx: &mut ServerContext, channel: &str, out: &mut Outbox) {
    if let Some(entry) = ctx.routing.get(channel) {
        if let Some(key) = entry.neighbors.first() {
            if let Some(n) = ctx.neighbors.get(key) {
                out.push((n.addr, Packet::S2sLeave { channel: channel.to_string() }));
            }
        }
    }
    ctx.routing.remove_channel(channel);
}

/// Re-evaluate whether this server should prune itself from `channel`'s
/// sub-tree, or probe an ambiguous case, after a local departure (spec.md
/// §4.2 LEAVE/LOGOUT, §4.6 inactivity sweep).
pub fn reevaluate_leaf(ctx: &mut ServerContext, channel: &str, out: &mut Outbox) {
    if !ctx.routing.contains(channel) {
        return;
    }
    let local_empty = ctx.channels.get(channel).is_none_or(|c| c.is_empty());
    if !local_empty {
        return;
    }
    let is_leaf = ctx.routing.get(channel).is_some_and(|e| e.is_leaf_routing());
    if is_leaf {
        self_prune(ctx, channel, out);
        return;
    }
    // No local subscribers but more than one routing neighbor: ambiguous,
    // probe to force convergence (spec.md §4.3 "Leaf probing").
    let id = super::random_id();
    ctx.msg_cache.insert(id);
    let neighbors: Vec<String> = ctx.routing.get(channel).map(|e| e.neighbors.clone()).unwrap_or_default();
    for key in neighbors {
        if let Some(n) = ctx.neighbors.get(&key) {
            out.push((n.addr, Packet::S2sLeaf { channel: channel.to_string(), id }));
        }
    }
}
