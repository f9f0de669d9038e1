//! Server context and main event loop.
//!
//! Per spec.md §9 ("Prefer an explicit server context value passed to every
//! handler... makes multi-instance testing tractable") the five tables live
//! in one plain struct, not behind `Arc<Mutex<_>>` — spec.md §5 is explicit
//! that there is no concurrent mutation to guard against, so adding a lock
//! here would misrepresent the concurrency model rather than simplify it.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::net::Transport;
use crate::proto::Packet;
use crate::state::{ChannelTable, MsgCache, NeighborTable, RoutingTable, UserTable};
use crate::timer;

/// Datagrams queued for delivery after a handler runs. Kept as data rather
/// than sent immediately inside handlers so that handlers stay pure
/// functions of `(&mut ServerContext, input) -> outbox`, which is what
/// lets tests wire two or three `ServerContext`s together without real
/// sockets (spec.md §8, §9).
pub type Outbox = Vec<(SocketAddr, Packet)>;

pub struct ServerContext {
    pub self_addr: SocketAddr,
    pub users: UserTable,
    pub channels: ChannelTable,
    pub neighbors: NeighborTable,
    pub routing: RoutingTable,
    pub msg_cache: MsgCache,
    /// Ticks (60s each) since the last inactivity sweep; rolls over every
    /// `REFRESH_RATE` ticks (spec.md §4.6).
    pub minute_counter: u32,
}

impl ServerContext {
    pub fn new(self_addr: SocketAddr, neighbor_addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        let mut neighbors = NeighborTable::new();
        let now = timer::wall_clock_minute();
        for addr in neighbor_addrs {
            neighbors.insert(addr, now);
        }
        Self {
            self_addr,
            users: UserTable::new(),
            channels: ChannelTable::new(),
            neighbors,
            routing: RoutingTable::new(),
            msg_cache: MsgCache::new(),
            minute_counter: 0,
        }
    }

    /// Dispatch one decoded packet from `from`, appending any resulting
    /// sends to `out`. This is the single demultiplexing point referenced
    /// by spec.md §2 ("demultiplexing incoming datagrams by a leading type
    /// field").
    pub fn dispatch(&mut self, from: SocketAddr, pkt: Packet, out: &mut Outbox) {
        use crate::handlers::{s2s, session, traversal};

        debug!(self_addr = %self.self_addr, peer = %from, direction = "in", verb = pkt.verb(), "recv");

        // Any packet from a configured neighbor counts as a liveness signal,
        // not just S2S_KEEP_ALIVE (spec.md §3 Neighbor: "destroyed on
        // inactivity sweep... without any S2S packet, including keep-alives").
        let sender_key = from.to_string();
        if self.neighbors.contains_key(&sender_key) {
            self.neighbors.touch(&sender_key, timer::wall_clock_minute());
        }

        match pkt {
            Packet::Verify { username } => session::handle_verify(self, from, username, out),
            Packet::Login { username } => session::handle_login(self, from, username, out),
            Packet::Logout => session::handle_logout(self, from, out),
            Packet::Join { channel } => session::handle_join(self, from, channel, out),
            Packet::Leave { channel } => session::handle_leave(self, from, channel, out),
            Packet::Say { channel, text } => session::handle_say(self, from, channel, text, out),
            Packet::List => session::handle_list(self, from, out),
            Packet::Who { channel } => session::handle_who(self, from, channel, out),
            Packet::KeepAlive => session::handle_keep_alive(self, from),

            Packet::S2sJoin { channel } => s2s::handle_s2s_join(self, from, channel, out),
            Packet::S2sLeave { channel } => s2s::handle_s2s_leave(self, from, channel, out),
            Packet::S2sSay { id, channel, username, text } => {
                s2s::handle_s2s_say(self, from, id, channel, username, text, out)
            }
            Packet::S2sLeaf { channel, id } => s2s::handle_s2s_leaf(self, from, channel, id, out),
            Packet::S2sKeepAlive => s2s::handle_s2s_keep_alive(self, from),

            Packet::S2sList { id, client_addr, channels, unvisited } => {
                traversal::handle_s2s_list(self, from, id, client_addr, channels, unvisited, out)
            }
            Packet::S2sWho { id, client_addr, channel, usernames, unvisited } => {
                traversal::handle_s2s_who(self, from, id, client_addr, channel, usernames, unvisited, out)
            }
            Packet::S2sVerify { id, client_addr, username, unvisited } => {
                traversal::handle_s2s_verify(self, from, id, client_addr, username, unvisited, out)
            }

            // TXT_* are server -> client only; a server never receives one.
            Packet::TxtSay { .. }
            | Packet::TxtList { .. }
            | Packet::TxtWho { .. }
            | Packet::TxtError { .. }
            | Packet::TxtVerify { .. } => {
                warn!(peer = %from, verb = pkt.verb(), "dropping client-reply packet received as input");
            }
        }
    }
}

/// Send every queued packet and log each one, per spec.md §6's logging
/// line shape. A send failure is transient I/O (spec.md §4.7/§7): logged
/// and skipped, never fatal.
async fn flush_outbox(transport: &Transport, self_addr: SocketAddr, out: Outbox) {
    for (addr, pkt) in out {
        debug!(self_addr = %self_addr, peer = %addr, direction = "out", verb = pkt.verb(), "send");
        if let Err(e) = transport.send(addr, &pkt.encode()).await {
            warn!(peer = %addr, error = %e, "send failed, continuing");
        }
    }
}

/// The main event loop: one suspension point (a 60-second receive
/// timeout), demultiplex-then-dispatch, no spawned handler tasks
/// (spec.md §5).
pub async fn run(ctx: &mut ServerContext, transport: &Transport) -> Result<()> {
    loop {
        let mut out = Outbox::new();

        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
                return Ok(());
            }

            recv_result = tokio::time::timeout(
                std::time::Duration::from_secs(60),
                transport.recv(),
            ) => {
                match recv_result {
                    Ok(Ok((bytes, from))) => match Packet::decode(&bytes) {
                        Ok(pkt) => ctx.dispatch(from, pkt, &mut out),
                        Err(e) => debug!(peer = %from, error = %e, "dropping unparseable datagram"),
                    },
                    Ok(Err(e)) => {
                        warn!(error = %e, "recvfrom failed, continuing");
                    }
                    Err(_elapsed) => {
                        timer::on_timeout(ctx, &mut out);
                    }
                }
            }
        }

        flush_outbox(transport, ctx.self_addr, out).await;
    }
}

/// Bind the socket and run until shutdown. Bind failure is a startup
/// error (spec.md §7): reported to the caller, which exits non-zero.
pub async fn bootstrap(ctx: &mut ServerContext) -> Result<()> {
    let transport = Transport::bind(ctx.self_addr)
        .await
        .with_context(|| format!("failed to bind UDP socket on {}", ctx.self_addr))?;
    tracing::info!(addr = %transport.local_addr()?, "duckchat server listening");
    run(ctx, &transport).await
}
