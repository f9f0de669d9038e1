//! Timer engine: keep-alive emission, soft-state join refresh, and the
//! inactivity sweep (spec.md §4.6).
//!
//! Driven by the main loop's 60-second receive timeout — see
//! [`crate::server::ServerContext::run`]. There is no background thread;
//! `on_timeout` is called synchronously from the same loop that dispatches
//! packets, matching the single-suspension-point model in spec.md §5.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::limits::REFRESH_RATE;
use crate::proto::Packet;
use crate::server::{Outbox, ServerContext};

/// Current wall-clock minute, 0..60 (spec.md §4.6: "`tm_min` modulo 60").
pub fn wall_clock_minute() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    ((secs / 60) % 60) as u32
}

/// Minutes elapsed from `last` to `now`, both in 0..60, accounting for the
/// hour wraparound exactly as spec.md §4.6 specifies:
/// `diff = (now >= last) ? now - last : (60 - last) + now`.
pub fn minute_diff(now: u32, last: u32) -> u32 {
    if now >= last {
        now - last
    } else {
        (60 - last) + now
    }
}

/// Runs on every 60-second socket-read timeout. Emits keep-alives and
/// re-floods joins every tick; runs the inactivity sweep once every
/// `REFRESH_RATE` ticks.
pub fn on_timeout(ctx: &mut ServerContext, out: &mut Outbox) {
    send_keep_alives(ctx, out);
    reflood_joins(ctx, out);

    ctx.minute_counter += 1;
    if ctx.minute_counter >= REFRESH_RATE {
        sweep_inactive(ctx, out);
        ctx.minute_counter = 0;
    }
}

fn send_keep_alives(ctx: &ServerContext, out: &mut Outbox) {
    for neighbor in ctx.neighbors.iter() {
        out.push((neighbor.addr, Packet::S2sKeepAlive));
    }
}

/// Soft-state refresh: re-flood `S2S_JOIN` for every routed channel to
/// every neighbor (spec.md §4.3 "Refresh").
fn reflood_joins(ctx: &ServerContext, out: &mut Outbox) {
    for channel in ctx.routing.channels() {
        for neighbor in ctx.neighbors.iter() {
            out.push((neighbor.addr, Packet::S2sJoin { channel: channel.to_string() }));
        }
    }
}

/// spec.md §4.6 inactivity sweep: log out stale users, drop stale
/// neighbors (scrubbing them from routing and re-evaluating leaf status).
fn sweep_inactive(ctx: &mut ServerContext, out: &mut Outbox) {
    let now = wall_clock_minute();

    for key in ctx.users.stale_keys(now, REFRESH_RATE) {
        tracing::info!(user = %key, "inactivity sweep: logging out stale user");
        crate::handlers::session::force_logout(ctx, &key, out);
    }

    for key in ctx.neighbors.stale_keys(now, REFRESH_RATE) {
        tracing::info!(neighbor = %key, "inactivity sweep: dropping stale neighbor");
        ctx.neighbors.remove(&key);
        let touched = ctx.routing.scrub_neighbor(&key);
        for channel in touched {
            crate::handlers::s2s::reevaluate_leaf(ctx, &channel, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_diff_without_wraparound() {
        assert_eq!(minute_diff(10, 5), 5);
        assert_eq!(minute_diff(5, 5), 0);
    }

    #[test]
    fn minute_diff_wraps_around_the_hour() {
        // last=58, now=2 -> (60-58)+2 = 4
        assert_eq!(minute_diff(2, 58), 4);
    }
}
