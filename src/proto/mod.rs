//! Wire protocol: the 22 packet shapes exchanged between clients and
//! servers, and between servers, per spec.md §4.1.
//!
//! Every datagram starts with a 4-byte little-endian type tag, followed by
//! a body whose shape is fixed for client-facing request/reply packets and
//! "fixed header + inline array" for the federation/traversal packets
//! (`LIST`, `WHO`, `S2S_LIST`, `S2S_WHO`, `S2S_VERIFY`). Unknown type tags
//! or bodies that fail to parse are reported as [`CodecError`] and the
//! caller drops the datagram — spec.md §4.7: "Unrecognized type tags are
//! silently dropped."

mod codec;

use std::net::SocketAddr;

pub use codec::CodecError;
use codec::{
    need, read_addr, read_count, read_fixed, read_u32, read_u64, write_addr, write_fixed,
    write_u32, write_u64,
};

use crate::limits::{CHANNEL_MAX, IP_MAX, SAY_MAX, USERNAME_MAX};

/// Dense enumeration of wire type tags. Values are this server's own
/// assignment; a companion client must share them to interoperate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    ReqVerify = 0,
    ReqLogin = 1,
    ReqLogout = 2,
    ReqJoin = 3,
    ReqLeave = 4,
    ReqSay = 5,
    ReqList = 6,
    ReqWho = 7,
    ReqKeepAlive = 8,
    TxtSay = 9,
    TxtList = 10,
    TxtWho = 11,
    TxtError = 12,
    TxtVerify = 13,
    ReqS2sJoin = 14,
    ReqS2sLeave = 15,
    ReqS2sSay = 16,
    ReqS2sList = 17,
    ReqS2sWho = 18,
    ReqS2sVerify = 19,
    ReqS2sLeaf = 20,
    ReqS2sKeepAlive = 21,
}

impl TryFrom<u32> for PacketType {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use PacketType::*;
        Ok(match value {
            0 => ReqVerify,
            1 => ReqLogin,
            2 => ReqLogout,
            3 => ReqJoin,
            4 => ReqLeave,
            5 => ReqSay,
            6 => ReqList,
            7 => ReqWho,
            8 => ReqKeepAlive,
            9 => TxtSay,
            10 => TxtList,
            11 => TxtWho,
            12 => TxtError,
            13 => TxtVerify,
            14 => ReqS2sJoin,
            15 => ReqS2sLeave,
            16 => ReqS2sSay,
            17 => ReqS2sList,
            18 => ReqS2sWho,
            19 => ReqS2sVerify,
            20 => ReqS2sLeaf,
            21 => ReqS2sKeepAlive,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

/// A decoded datagram, in Rust-native form (fixed-width wire fields become
/// owned `String`s with trailing NULs stripped).
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Verify { username: String },
    Login { username: String },
    Logout,
    Join { channel: String },
    Leave { channel: String },
    Say { channel: String, text: String },
    List,
    Who { channel: String },
    KeepAlive,

    TxtSay { channel: String, username: String, text: String },
    TxtList { channels: Vec<String> },
    TxtWho { channel: String, usernames: Vec<String> },
    TxtError { message: String },
    TxtVerify { valid: bool },

    S2sJoin { channel: String },
    S2sLeave { channel: String },
    S2sSay { id: u64, channel: String, username: String, text: String },
    S2sList { id: u64, client_addr: SocketAddr, channels: Vec<String>, unvisited: Vec<SocketAddr> },
    S2sWho { id: u64, client_addr: SocketAddr, channel: String, usernames: Vec<String>, unvisited: Vec<SocketAddr> },
    S2sVerify { id: u64, client_addr: SocketAddr, username: String, unvisited: Vec<SocketAddr> },
    S2sLeaf { channel: String, id: u64 },
    S2sKeepAlive,
}

fn write_string_array(out: &mut Vec<u8>, items: &[String], width: usize) -> Result<(), CodecError> {
    write_u32(out, items.len() as u32);
    for item in items {
        write_fixed(out, item, width)?;
    }
    Ok(())
}

fn read_string_array(buf: &[u8], width: usize) -> Result<(Vec<String>, usize), CodecError> {
    let count = read_count(buf, width, buf.len().saturating_sub(4))?;
    let mut items = Vec::with_capacity(count);
    let mut offset = 4;
    for _ in 0..count {
        items.push(read_fixed(&buf[offset..], width)?);
        offset += width;
    }
    Ok((items, offset))
}

fn write_addr_array(out: &mut Vec<u8>, items: &[SocketAddr]) {
    write_u32(out, items.len() as u32);
    for addr in items {
        write_addr(out, *addr);
    }
}

fn read_addr_array(buf: &[u8]) -> Result<(Vec<SocketAddr>, usize), CodecError> {
    let count = read_count(buf, IP_MAX, buf.len().saturating_sub(4))?;
    let mut items = Vec::with_capacity(count);
    let mut offset = 4;
    for _ in 0..count {
        items.push(read_addr(&buf[offset..])?);
        offset += IP_MAX;
    }
    Ok((items, offset))
}

impl Packet {
    /// Serialize to a UDP datagram payload: 4-byte type tag followed by
    /// the packet's body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        let (tag, _) = self.wire_shape();
        write_u32(&mut out, tag as u32);
        match self {
            Packet::Verify { username } | Packet::Login { username } => {
                write_fixed(&mut out, username, USERNAME_MAX).expect("caller-validated username");
            }
            Packet::Logout | Packet::List | Packet::KeepAlive | Packet::S2sKeepAlive => {}
            Packet::Join { channel } | Packet::Leave { channel } | Packet::S2sJoin { channel } | Packet::S2sLeave { channel } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
            }
            Packet::Say { channel, text } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_fixed(&mut out, text, SAY_MAX).expect("caller-validated text");
            }
            Packet::Who { channel } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
            }
            Packet::TxtSay { channel, username, text } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_fixed(&mut out, username, USERNAME_MAX).expect("caller-validated username");
                write_fixed(&mut out, text, SAY_MAX).expect("caller-validated text");
            }
            Packet::TxtList { channels } => {
                write_string_array(&mut out, channels, CHANNEL_MAX).expect("caller-validated channel list");
            }
            Packet::TxtWho { channel, usernames } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_string_array(&mut out, usernames, USERNAME_MAX).expect("caller-validated username list");
            }
            Packet::TxtError { message } => {
                write_fixed(&mut out, message, SAY_MAX).expect("caller-validated message");
            }
            Packet::TxtVerify { valid } => {
                write_u32(&mut out, if *valid { 1 } else { 0 });
            }
            Packet::S2sSay { id, channel, username, text } => {
                write_u64(&mut out, *id);
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_fixed(&mut out, username, USERNAME_MAX).expect("caller-validated username");
                write_fixed(&mut out, text, SAY_MAX).expect("caller-validated text");
            }
            Packet::S2sList { id, client_addr, channels, unvisited } => {
                write_u64(&mut out, *id);
                write_addr(&mut out, *client_addr);
                write_string_array(&mut out, channels, CHANNEL_MAX).expect("caller-validated channel list");
                write_addr_array(&mut out, unvisited);
            }
            Packet::S2sWho { id, client_addr, channel, usernames, unvisited } => {
                write_u64(&mut out, *id);
                write_addr(&mut out, *client_addr);
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_string_array(&mut out, usernames, USERNAME_MAX).expect("caller-validated username list");
                write_addr_array(&mut out, unvisited);
            }
            Packet::S2sVerify { id, client_addr, username, unvisited } => {
                write_u64(&mut out, *id);
                write_addr(&mut out, *client_addr);
                write_fixed(&mut out, username, USERNAME_MAX).expect("caller-validated username");
                write_addr_array(&mut out, unvisited);
            }
            Packet::S2sLeaf { channel, id } => {
                write_fixed(&mut out, channel, CHANNEL_MAX).expect("caller-validated channel");
                write_u64(&mut out, *id);
            }
        }
        out
    }

    /// Parse a received UDP datagram payload.
    pub fn decode(buf: &[u8]) -> Result<Packet, CodecError> {
        need(buf, 4)?;
        let tag = PacketType::try_from(read_u32(buf)?)?;
        let body = &buf[4..];
        Ok(match tag {
            PacketType::ReqVerify => Packet::Verify { username: read_fixed(body, USERNAME_MAX)? },
            PacketType::ReqLogin => Packet::Login { username: read_fixed(body, USERNAME_MAX)? },
            PacketType::ReqLogout => Packet::Logout,
            PacketType::ReqJoin => Packet::Join { channel: read_fixed(body, CHANNEL_MAX)? },
            PacketType::ReqLeave => Packet::Leave { channel: read_fixed(body, CHANNEL_MAX)? },
            PacketType::ReqSay => {
                let channel = read_fixed(body, CHANNEL_MAX)?;
                let text = read_fixed(&body[CHANNEL_MAX..], SAY_MAX)?;
                Packet::Say { channel, text }
            }
            PacketType::ReqList => Packet::List,
            PacketType::ReqWho => Packet::Who { channel: read_fixed(body, CHANNEL_MAX)? },
            PacketType::ReqKeepAlive => Packet::KeepAlive,
            PacketType::TxtSay => {
                let channel = read_fixed(body, CHANNEL_MAX)?;
                let username = read_fixed(&body[CHANNEL_MAX..], USERNAME_MAX)?;
                let text = read_fixed(&body[CHANNEL_MAX + USERNAME_MAX..], SAY_MAX)?;
                Packet::TxtSay { channel, username, text }
            }
            PacketType::TxtList => {
                let (channels, _) = read_string_array(body, CHANNEL_MAX)?;
                Packet::TxtList { channels }
            }
            PacketType::TxtWho => {
                let channel = read_fixed(body, CHANNEL_MAX)?;
                let (usernames, _) = read_string_array(&body[CHANNEL_MAX..], USERNAME_MAX)?;
                Packet::TxtWho { channel, usernames }
            }
            PacketType::TxtError => Packet::TxtError { message: read_fixed(body, SAY_MAX)? },
            PacketType::TxtVerify => Packet::TxtVerify { valid: read_u32(body)? != 0 },
            PacketType::ReqS2sJoin => Packet::S2sJoin { channel: read_fixed(body, CHANNEL_MAX)? },
            PacketType::ReqS2sLeave => Packet::S2sLeave { channel: read_fixed(body, CHANNEL_MAX)? },
            PacketType::ReqS2sSay => {
                let id = read_u64(body)?;
                let rest = &body[8..];
                let channel = read_fixed(rest, CHANNEL_MAX)?;
                let username = read_fixed(&rest[CHANNEL_MAX..], USERNAME_MAX)?;
                let text = read_fixed(&rest[CHANNEL_MAX + USERNAME_MAX..], SAY_MAX)?;
                Packet::S2sSay { id, channel, username, text }
            }
            PacketType::ReqS2sList => {
                let id = read_u64(body)?;
                let mut offset = 8;
                let client_addr = read_addr(&body[offset..])?;
                offset += IP_MAX;
                let (channels, used) = read_string_array(&body[offset..], CHANNEL_MAX)?;
                offset += used;
                let (unvisited, _) = read_addr_array(&body[offset..])?;
                Packet::S2sList { id, client_addr, channels, unvisited }
            }
            PacketType::ReqS2sWho => {
                let id = read_u64(body)?;
                let mut offset = 8;
                let client_addr = read_addr(&body[offset..])?;
                offset += IP_MAX;
                let channel = read_fixed(&body[offset..], CHANNEL_MAX)?;
                offset += CHANNEL_MAX;
                let (usernames, used) = read_string_array(&body[offset..], USERNAME_MAX)?;
                offset += used;
                let (unvisited, _) = read_addr_array(&body[offset..])?;
                Packet::S2sWho { id, client_addr, channel, usernames, unvisited }
            }
            PacketType::ReqS2sVerify => {
                let id = read_u64(body)?;
                let mut offset = 8;
                let client_addr = read_addr(&body[offset..])?;
                offset += IP_MAX;
                let username = read_fixed(&body[offset..], USERNAME_MAX)?;
                offset += USERNAME_MAX;
                let (unvisited, _) = read_addr_array(&body[offset..])?;
                Packet::S2sVerify { id, client_addr, username, unvisited }
            }
            PacketType::ReqS2sLeaf => {
                let channel = read_fixed(body, CHANNEL_MAX)?;
                let id = read_u64(&body[CHANNEL_MAX..])?;
                Packet::S2sLeaf { channel, id }
            }
            PacketType::ReqS2sKeepAlive => Packet::S2sKeepAlive,
        })
    }

    /// The type tag this packet encodes as, and a short verb name for logging.
    fn wire_shape(&self) -> (PacketType, &'static str) {
        match self {
            Packet::Verify { .. } => (PacketType::ReqVerify, "VERIFY"),
            Packet::Login { .. } => (PacketType::ReqLogin, "LOGIN"),
            Packet::Logout => (PacketType::ReqLogout, "LOGOUT"),
            Packet::Join { .. } => (PacketType::ReqJoin, "JOIN"),
            Packet::Leave { .. } => (PacketType::ReqLeave, "LEAVE"),
            Packet::Say { .. } => (PacketType::ReqSay, "SAY"),
            Packet::List => (PacketType::ReqList, "LIST"),
            Packet::Who { .. } => (PacketType::ReqWho, "WHO"),
            Packet::KeepAlive => (PacketType::ReqKeepAlive, "KEEP_ALIVE"),
            Packet::TxtSay { .. } => (PacketType::TxtSay, "TXT_SAY"),
            Packet::TxtList { .. } => (PacketType::TxtList, "TXT_LIST"),
            Packet::TxtWho { .. } => (PacketType::TxtWho, "TXT_WHO"),
            Packet::TxtError { .. } => (PacketType::TxtError, "TXT_ERROR"),
            Packet::TxtVerify { .. } => (PacketType::TxtVerify, "TXT_VERIFY"),
            Packet::S2sJoin { .. } => (PacketType::ReqS2sJoin, "S2S_JOIN"),
            Packet::S2sLeave { .. } => (PacketType::ReqS2sLeave, "S2S_LEAVE"),
            Packet::S2sSay { .. } => (PacketType::ReqS2sSay, "S2S_SAY"),
            Packet::S2sList { .. } => (PacketType::ReqS2sList, "S2S_LIST"),
            Packet::S2sWho { .. } => (PacketType::ReqS2sWho, "S2S_WHO"),
            Packet::S2sVerify { .. } => (PacketType::ReqS2sVerify, "S2S_VERIFY"),
            Packet::S2sLeaf { .. } => (PacketType::ReqS2sLeaf, "S2S_LEAF"),
            Packet::S2sKeepAlive => (PacketType::ReqS2sKeepAlive, "S2S_KEEP_ALIVE"),
        }
    }

    /// Short verb name, used in structured log lines (spec.md §6 logging format).
    pub fn verb(&self) -> &'static str {
        self.wire_shape().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(pkt: Packet) {
        let bytes = pkt.encode();
        let decoded = Packet::decode(&bytes).expect("decode");
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn roundtrips_fixed_shape_packets() {
        roundtrip(Packet::Verify { username: "alice".into() });
        roundtrip(Packet::Login { username: "alice".into() });
        roundtrip(Packet::Logout);
        roundtrip(Packet::Join { channel: "dev".into() });
        roundtrip(Packet::Leave { channel: "dev".into() });
        roundtrip(Packet::Say { channel: "dev".into(), text: "hi".into() });
        roundtrip(Packet::List);
        roundtrip(Packet::Who { channel: "dev".into() });
        roundtrip(Packet::KeepAlive);
        roundtrip(Packet::TxtSay { channel: "dev".into(), username: "a".into(), text: "hi".into() });
        roundtrip(Packet::TxtError { message: "boom".into() });
        roundtrip(Packet::TxtVerify { valid: true });
        roundtrip(Packet::TxtVerify { valid: false });
        roundtrip(Packet::S2sJoin { channel: "dev".into() });
        roundtrip(Packet::S2sLeave { channel: "dev".into() });
        roundtrip(Packet::S2sSay { id: 42, channel: "dev".into(), username: "a".into(), text: "hi".into() });
        roundtrip(Packet::S2sLeaf { channel: "dev".into(), id: 7 });
        roundtrip(Packet::S2sKeepAlive);
    }

    #[test]
    fn roundtrips_inline_array_packets() {
        roundtrip(Packet::TxtList { channels: vec!["Common".into(), "dev".into()] });
        roundtrip(Packet::TxtWho { channel: "dev".into(), usernames: vec!["a".into(), "b".into()] });

        let addr1: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let addr2: SocketAddr = "127.0.0.1:5002".parse().unwrap();
        roundtrip(Packet::S2sList {
            id: 1,
            client_addr: addr1,
            channels: vec!["Common".into()],
            unvisited: vec![addr2],
        });
        roundtrip(Packet::S2sWho {
            id: 2,
            client_addr: addr1,
            channel: "dev".into(),
            usernames: vec!["a".into()],
            unvisited: vec![addr2],
        });
        roundtrip(Packet::S2sVerify {
            id: 3,
            client_addr: addr1,
            username: "a".into(),
            unvisited: vec![addr2, addr1],
        });
    }

    #[test]
    fn rejects_oversized_fixed_field() {
        let too_long = "x".repeat(USERNAME_MAX);
        let mut out = Vec::new();
        let err = write_fixed(&mut out, &too_long, USERNAME_MAX).unwrap_err();
        assert!(matches!(err, CodecError::StringTooLong { .. }));
    }

    #[test]
    fn unknown_type_tag_is_reported_not_panicked() {
        let mut bytes = Vec::new();
        write_u32(&mut bytes, 9999);
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(9999)));
    }

    #[test]
    fn truncated_buffer_is_reported() {
        let err = Packet::decode(&[0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
