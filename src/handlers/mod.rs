//! Request handlers: one per packet family (spec.md §4.2–§4.5).
//!
//! Every handler is a plain function over `&mut ServerContext` plus the
//! packet's fields, appending `(addr, Packet)` pairs to an [`Outbox`] rather
//! than sending directly — see [`crate::server`] for why.

pub mod s2s;
pub mod session;
pub mod traversal;

/// A 64-bit id with enough entropy to keep collisions rare across the
/// suppression cache's window (spec.md §6, §9 "ID randomness").
pub(crate) fn random_id() -> u64 {
    rand::random()
}
