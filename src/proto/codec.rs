//! Byte-level helpers for the wire codec.
//!
//! Every multi-byte integer is written in the sender's host byte order —
//! spec.md §4.1 and §6 call this out explicitly as a wire-compatibility
//! requirement with an existing client population, not a design choice we
//! get to revisit. Every deployment target for this service is
//! little-endian, so "host order" and `to_le_bytes`/`from_le_bytes` are the
//! same thing in practice.

use std::net::SocketAddr;

use thiserror::Error;

use crate::limits::{IP_MAX, MAX_WIRE_ENTRIES};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown packet type tag {0}")]
    UnknownType(u32),
    #[error("fixed field is not valid UTF-8")]
    BadString,
    #[error("fixed field {len} bytes does not fit in a {width}-byte slot")]
    StringTooLong { len: usize, width: usize },
    #[error("inline array count {0} exceeds the accepted maximum")]
    ArrayTooLong(usize),
    #[error("address string {0:?} is not a valid host:port")]
    BadAddress(String),
}

pub(super) fn need(buf: &[u8], n: usize) -> Result<(), CodecError> {
    if buf.len() < n {
        Err(CodecError::Truncated { need: n, have: buf.len() })
    } else {
        Ok(())
    }
}

/// Write `s` into a fixed-width, NUL-padded slot.
pub(super) fn write_fixed(out: &mut Vec<u8>, s: &str, width: usize) -> Result<(), CodecError> {
    let bytes = s.as_bytes();
    if bytes.len() >= width {
        return Err(CodecError::StringTooLong { len: bytes.len(), width });
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + (width - bytes.len()), 0);
    Ok(())
}

/// Read a fixed-width, NUL-padded slot back into a `String`, truncating at
/// the first NUL — or, if the sender filled the whole slot with no NUL at
/// all, at `width - 1`, so a decoded field can never round-trip back out
/// through `write_fixed` (which rejects anything `>= width`). Matches v1's
/// `malloc_user` truncation to `USERNAME_MAX - 1` rather than rejecting the
/// oversized input outright.
pub(super) fn read_fixed(buf: &[u8], width: usize) -> Result<String, CodecError> {
    need(buf, width)?;
    let field = &buf[..width];
    let len = field.iter().position(|&b| b == 0).unwrap_or(width).min(width - 1);
    std::str::from_utf8(&field[..len])
        .map(|s| s.to_string())
        .map_err(|_| CodecError::BadString)
}

pub(super) fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(super) fn read_u32(buf: &[u8]) -> Result<u32, CodecError> {
    need(buf, 4)?;
    Ok(u32::from_le_bytes(buf[..4].try_into().unwrap()))
}

pub(super) fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(super) fn read_u64(buf: &[u8]) -> Result<u64, CodecError> {
    need(buf, 8)?;
    Ok(u64::from_le_bytes(buf[..8].try_into().unwrap()))
}

/// Encode a socket address as a fixed-width `"host:port"` string field.
pub(super) fn write_addr(out: &mut Vec<u8>, addr: SocketAddr) {
    // Infallible: callers only ever construct IPv4 addresses (config
    // resolution rejects IPv6 up front), and "ip:port" for IPv4 is well
    // under IP_MAX.
    let s = addr.to_string();
    write_fixed(out, &s, IP_MAX).expect("formatted socket address fits IP_MAX");
}

pub(super) fn read_addr(buf: &[u8]) -> Result<SocketAddr, CodecError> {
    let s = read_fixed(buf, IP_MAX)?;
    s.parse::<SocketAddr>().map_err(|_| CodecError::BadAddress(s))
}

/// Read a `u32` count prefix, bounds-checked against both the declared
/// per-entry size and a defensive absolute cap so a garbled count can't
/// turn into an unbounded allocation.
pub(super) fn read_count(buf: &[u8], entry_width: usize, remaining: usize) -> Result<usize, CodecError> {
    let count = read_u32(buf)? as usize;
    if count > MAX_WIRE_ENTRIES {
        return Err(CodecError::ArrayTooLong(count));
    }
    if count.saturating_mul(entry_width) > remaining {
        return Err(CodecError::Truncated { need: count * entry_width, have: remaining });
    }
    Ok(count)
}
