//! Wire and table size constants shared by the protocol codec and state tables.

/// Max bytes for a username, including the trailing NUL.
pub const USERNAME_MAX: usize = 32;
/// Max bytes for a channel name, including the trailing NUL.
pub const CHANNEL_MAX: usize = 32;
/// Max bytes for a SAY/ERROR text field, including the trailing NUL.
pub const SAY_MAX: usize = 64;
/// Max bytes for a dotted-quad `host:port` string field.
pub const IP_MAX: usize = 24;
/// Max channels a single user may be subscribed to at once.
pub const MAX_CHANNELS: usize = 10;
/// Capacity of the per-server duplicate-suppression ring.
pub const MSGQ_SIZE: usize = 48;
/// Minutes of silence before a user or neighbor is considered dead.
pub const REFRESH_RATE: u32 = 2;
/// The permanent channel created at server start.
pub const DEFAULT_CHANNEL: &str = "Common";

/// Defensive cap on inline array entries accepted from the wire, independent
/// of `MAX_CHANNELS`/`MSGQ_SIZE` — protects decode from a hostile or garbled
/// count field turning into an unbounded allocation.
pub const MAX_WIRE_ENTRIES: usize = 256;
