//! End-to-end mesh scenarios, driven through `ServerContext::dispatch`
//! directly rather than real sockets — the testing seam spec.md §9
//! recommends ("an explicit server context value passed to every
//! handler... makes multi-instance testing tractable").

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use duckchat_server::proto::Packet;
use duckchat_server::server::{Outbox, ServerContext};

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// A mesh of in-process servers, wired together without any I/O. Ports
/// 4000-4999 are reserved for servers; everything else is a "client".
struct Mesh {
    servers: HashMap<SocketAddr, ServerContext>,
}

impl Mesh {
    fn new() -> Self {
        Self { servers: HashMap::new() }
    }

    fn add_server(&mut self, self_addr: SocketAddr, neighbors: &[SocketAddr]) {
        self.servers.insert(self_addr, ServerContext::new(self_addr, neighbors.iter().copied()));
    }

    /// Send `pkt` from `from` to the server at `to`, then keep routing any
    /// packets it emits that are addressed to another modeled server,
    /// until the mesh quiesces. Returns every packet addressed to a
    /// non-server (client) address along the way.
    fn roundtrip(&mut self, from: SocketAddr, to: SocketAddr, pkt: Packet) -> Vec<(SocketAddr, Packet)> {
        let mut queue: VecDeque<(SocketAddr, SocketAddr, Packet)> = VecDeque::new();
        queue.push_back((from, to, pkt));
        let mut client_replies = Vec::new();
        let mut budget = 10_000;

        while let Some((from, to, pkt)) = queue.pop_front() {
            budget -= 1;
            assert!(budget > 0, "mesh did not converge within the iteration budget");

            let Some(ctx) = self.servers.get_mut(&to) else {
                panic!("sent to unmodeled server address {to}");
            };
            let mut out = Outbox::new();
            ctx.dispatch(from, pkt, &mut out);
            for (dest, reply) in out {
                if self.servers.contains_key(&dest) {
                    queue.push_back((to, dest, reply));
                } else {
                    client_replies.push((dest, reply));
                }
            }
        }
        client_replies
    }
}

fn login_and_join(mesh: &mut Mesh, client: SocketAddr, server: SocketAddr, username: &str, channel: &str) {
    mesh.roundtrip(client, server, Packet::Login { username: username.to_string() });
    mesh.roundtrip(client, server, Packet::Join { channel: channel.to_string() });
}

#[test]
fn single_server_say() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    mesh.add_server(s1, &[]);

    let a = addr(5001);
    let b = addr(5002);
    login_and_join(&mut mesh, a, s1, "a", "dev");
    login_and_join(&mut mesh, b, s1, "b", "dev");

    let replies = mesh.roundtrip(a, s1, Packet::Say { channel: "dev".into(), text: "hi".into() });

    let want = Packet::TxtSay { channel: "dev".into(), username: "a".into(), text: "hi".into() };
    assert!(replies.contains(&(a, want.clone())));
    assert!(replies.contains(&(b, want)));
    assert_eq!(replies.len(), 2);
}

#[test]
fn cross_server_say() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    mesh.add_server(s1, &[s2]);
    mesh.add_server(s2, &[s1]);

    let a = addr(5001);
    let b = addr(5002);
    login_and_join(&mut mesh, a, s1, "a", "dev");
    login_and_join(&mut mesh, b, s2, "b", "dev");

    let replies = mesh.roundtrip(a, s1, Packet::Say { channel: "dev".into(), text: "hello".into() });

    let say_to_b: Vec<_> = replies.iter().filter(|(addr, _)| *addr == b).collect();
    assert_eq!(say_to_b.len(), 1, "B should receive exactly one TXT_SAY, got {say_to_b:?}");
    assert_eq!(
        say_to_b[0].1,
        Packet::TxtSay { channel: "dev".into(), username: "a".into(), text: "hello".into() }
    );
}

#[test]
fn loop_break_triangle() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    let s3 = addr(4003);
    mesh.add_server(s1, &[s2, s3]);
    mesh.add_server(s2, &[s1, s3]);
    mesh.add_server(s3, &[s1, s2]);

    let a = addr(5001);
    let b = addr(5002);
    let c = addr(5003);
    login_and_join(&mut mesh, a, s1, "a", "dev");
    login_and_join(&mut mesh, b, s2, "b", "dev");
    login_and_join(&mut mesh, c, s3, "c", "dev");

    let replies = mesh.roundtrip(a, s1, Packet::Say { channel: "dev".into(), text: "x".into() });

    for who in [a, b, c] {
        let count = replies.iter().filter(|(addr, _)| *addr == who).count();
        assert_eq!(count, 1, "{who} should receive exactly one TXT_SAY, replies: {replies:?}");
    }
}

#[test]
fn list_federation() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    mesh.add_server(s1, &[s2]);
    mesh.add_server(s2, &[s1]);

    let a = addr(5001);
    let b = addr(5002);
    login_and_join(&mut mesh, a, s1, "a", "dev");
    login_and_join(&mut mesh, b, s2, "b", "ops");

    let replies = mesh.roundtrip(a, s1, Packet::List);

    assert_eq!(replies.len(), 1);
    let Packet::TxtList { channels } = &replies[0].1 else { panic!("expected TXT_LIST, got {replies:?}") };
    let mut sorted = channels.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["Common".to_string(), "dev".to_string(), "ops".to_string()]);
}

#[test]
fn leaf_pruning_line() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    let s3 = addr(4003);
    mesh.add_server(s1, &[s2]);
    mesh.add_server(s2, &[s1, s3]);
    mesh.add_server(s3, &[s2]);

    let c = addr(5003);
    login_and_join(&mut mesh, c, s3, "c", "dev");

    assert!(mesh.servers[&s1].routing.contains("dev"));
    assert!(mesh.servers[&s2].routing.contains("dev"));
    assert!(mesh.servers[&s3].routing.contains("dev"));

    mesh.roundtrip(c, s3, Packet::Leave { channel: "dev".into() });

    assert!(!mesh.servers[&s3].routing.contains("dev"), "s3 should have dropped dev entirely");
    assert!(!mesh.servers[&s2].routing.contains("dev"), "s2 should have pruned through to s1");
    assert!(!mesh.servers[&s1].routing.contains("dev"), "s1 should have dropped dev after s2's prune");
}

#[test]
fn verify_finds_remote_collision() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    mesh.add_server(s1, &[s2]);
    mesh.add_server(s2, &[s1]);

    let a = addr(5001);
    mesh.roundtrip(a, s2, Packet::Login { username: "taken".into() });

    let client = addr(5002);
    let replies = mesh.roundtrip(client, s1, Packet::Verify { username: "taken".into() });

    assert_eq!(replies, vec![(client, Packet::TxtVerify { valid: false })]);
}

#[test]
fn verify_is_positive_when_name_is_free_everywhere() {
    let mut mesh = Mesh::new();
    let s1 = addr(4001);
    let s2 = addr(4002);
    mesh.add_server(s1, &[s2]);
    mesh.add_server(s2, &[s1]);

    let client = addr(5002);
    let replies = mesh.roundtrip(client, s1, Packet::Verify { username: "fresh".into() });

    assert_eq!(replies, vec![(client, Packet::TxtVerify { valid: true })]);
}
