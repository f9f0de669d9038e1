//! Command-line configuration (spec.md §6 External Interfaces).
//!
//! `server <host> <port> [<neighbor_host> <neighbor_port>]…` — a listen
//! address followed by zero or more neighbor address pairs, the static
//! mesh topology configured at startup (spec.md §1 Non-goals: "No dynamic
//! discovery of neighbors").

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "duckchat-server", about = "Federated UDP chat server")]
pub struct Args {
    /// Host to bind the UDP socket to.
    pub host: String,

    /// Port to bind the UDP socket to.
    pub port: u16,

    /// Neighbor addresses, given as alternating host/port pairs.
    pub neighbors: Vec<String>,

    /// Emit structured JSON logs instead of human-readable lines.
    #[arg(long, env = "DUCKCHAT_LOG_JSON")]
    pub log_json: bool,
}

pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub neighbor_addrs: Vec<SocketAddr>,
    pub log_json: bool,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let listen_addr = resolve_one(&args.host, args.port)
            .with_context(|| format!("failed to resolve listen address {}:{}", args.host, args.port))?;

        if args.neighbors.len() % 2 != 0 {
            bail!("neighbor addresses must be given in host/port pairs, got {} entries", args.neighbors.len());
        }

        let mut neighbor_addrs = Vec::with_capacity(args.neighbors.len() / 2);
        for pair in args.neighbors.chunks(2) {
            let [host, port_str] = pair else { unreachable!("chunks(2) on an even-length slice") };
            let port: u16 = port_str
                .parse()
                .with_context(|| format!("invalid neighbor port {port_str:?}"))?;
            neighbor_addrs.push(
                resolve_one(host, port)
                    .with_context(|| format!("failed to resolve neighbor address {host}:{port}"))?,
            );
        }

        Ok(Self { listen_addr, neighbor_addrs, log_json: args.log_json })
    }
}

/// Resolve `host:port` to a single socket address, rejecting anything but
/// IPv4 — the wire protocol's `host:port` traversal field is a fixed-width
/// dotted-quad slot (spec.md's client population is IPv4-only), so an IPv6
/// result here would never fit on the wire later.
fn resolve_one(host: &str, port: u16) -> Result<SocketAddr> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .with_context(|| format!("no addresses found for {host}:{port}"))?;
    if !addr.is_ipv4() {
        bail!("{host}:{port} resolved to {addr}, but only IPv4 addresses are supported");
    }
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Args {
        let mut v = vec!["duckchat-server".to_string()];
        v.extend(parts.iter().map(|s| s.to_string()));
        Args::try_parse_from(v).expect("valid args")
    }

    #[test]
    fn parses_listen_address_with_no_neighbors() {
        let cfg = ServerConfig::from_args(args(&["127.0.0.1", "4001"])).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:4001".parse().unwrap());
        assert!(cfg.neighbor_addrs.is_empty());
    }

    #[test]
    fn parses_neighbor_pairs() {
        let cfg = ServerConfig::from_args(args(&["127.0.0.1", "4001", "127.0.0.1", "4002", "127.0.0.1", "4003"])).unwrap();
        assert_eq!(cfg.neighbor_addrs.len(), 2);
    }

    #[test]
    fn rejects_odd_neighbor_argument_count() {
        let err = ServerConfig::from_args(args(&["127.0.0.1", "4001", "127.0.0.1"]));
        assert!(err.is_err());
    }
}
