//! End-to-end scenarios driving two in-process `RoadStack`s over real
//! loopback UDP sockets: bootstrap join, allow, message delivery,
//! broadcast, stale nacking, and crash recovery.

use std::net::{SocketAddr, UdpSocket};
use std::thread::sleep;
use std::time::Duration;

use raet_crypto::{KeyPairBundle, NaclLikeCrypto};
use raet_estate::Acceptance;
use raet_packet::{
    BodyKind, CoatKind, FootKind, HeadKind, PacketHeader, PacketKind, TransactionKind,
    TxPacketBuilder,
};
use raet_stack::{Delivery, RoadStack, StackConfig};
use tempfile::tempdir;

fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn pump(stacks: &mut [&mut RoadStack], rounds: usize) {
    for _ in 0..rounds {
        for stack in stacks.iter_mut() {
            stack.service().unwrap();
        }
        sleep(Duration::from_millis(5));
    }
}

#[test]
fn bootstrap_join_assigns_eid_and_accepts_both_sides() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let b_port = free_port();
    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();

    let a_config = StackConfig::new("a", "127.0.0.1", a_port)
        .main(true)
        .eid(1)
        .dirpath(root.path().join("a"))
        .auto_accept(true);
    let (mut a, _a_inbox) = RoadStack::new(a_config).unwrap();

    let b_config = StackConfig::new("b", "127.0.0.1", b_port)
        .dirpath(root.path().join("b"))
        .auto_accept(true);
    let (mut b, _b_inbox) = RoadStack::new(b_config).unwrap();

    b.join(Some(a_addr)).unwrap();
    pump(&mut [&mut a, &mut b], 20);

    assert_eq!(b.local().eid, 2);
    let a_sees_b = a.remotes().find(|r| r.eid == 2).expect("a knows b");
    assert_eq!(a_sees_b.acceptance, Acceptance::Accepted);
    let b_sees_a = b.remotes().find(|r| r.eid == 1).expect("b knows a");
    assert_eq!(b_sees_a.acceptance, Acceptance::Accepted);
}

#[test]
fn allow_after_join_refreshes_remote_session_ids() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let b_port = free_port();
    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();

    let (mut a, _a_inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path().join("a"))
            .auto_accept(true),
    )
    .unwrap();
    let (mut b, _b_inbox) = RoadStack::new(
        StackConfig::new("b", "127.0.0.1", b_port)
            .dirpath(root.path().join("b"))
            .auto_accept(true),
    )
    .unwrap();

    b.join(Some(a_addr)).unwrap();
    pump(&mut [&mut a, &mut b], 20);

    b.allow(None).unwrap();
    pump(&mut [&mut a, &mut b], 20);

    // Each side's `rsid` reflects the *other* estate's own session id.
    let a_local_sid = a.local().sid;
    let b_local_sid = b.local().sid;
    let a_sees_b = a.remotes().find(|r| r.eid == 2).unwrap();
    let b_sees_a = b.remotes().find(|r| r.eid == 1).unwrap();
    assert_eq!(a_sees_b.rsid, b_local_sid);
    assert_eq!(b_sees_a.rsid, a_local_sid);
}

#[test]
fn message_with_ack_is_delivered_and_messenger_completes() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let b_port = free_port();
    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();

    let (mut a, mut a_inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path().join("a"))
            .auto_accept(true),
    )
    .unwrap();
    let (mut b, _b_inbox) = RoadStack::new(
        StackConfig::new("b", "127.0.0.1", b_port)
            .dirpath(root.path().join("b"))
            .auto_accept(true),
    )
    .unwrap();

    b.join(Some(a_addr)).unwrap();
    pump(&mut [&mut a, &mut b], 20);
    b.allow(None).unwrap();
    pump(&mut [&mut a, &mut b], 20);

    b.transmit(serde_json::json!({"hello": 1}), 1);
    pump(&mut [&mut a, &mut b], 20);

    let deliveries = a_inbox.drain();
    assert!(deliveries.iter().any(|d| matches!(
        d,
        Delivery::Message { from: 2, body } if *body == serde_json::json!({"hello": 1})
    )));
}

#[test]
fn broadcast_message_gets_no_ack_and_completes_on_first_send() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let b_port = free_port();
    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();

    let (mut a, mut a_inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path().join("a"))
            .auto_accept(true),
    )
    .unwrap();
    let (mut b, _b_inbox) = RoadStack::new(
        StackConfig::new("b", "127.0.0.1", b_port)
            .dirpath(root.path().join("b"))
            .auto_accept(true),
    )
    .unwrap();

    b.join(Some(a_addr)).unwrap();
    pump(&mut [&mut a, &mut b], 20);

    // Broadcast (deid = 0) to every known remote; wf is irrelevant since
    // bf always wins per the Message state machine.
    b.transmit(serde_json::json!({"all": true}), 0);
    pump(&mut [&mut a, &mut b], 20);

    let deliveries = a_inbox.drain();
    assert!(deliveries
        .iter()
        .any(|d| matches!(d, Delivery::Message { from: 2, .. })));
}

#[test]
fn stale_packet_with_correspondent_flag_gets_exactly_one_nack() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let (mut a, _a_inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path().join("a"))
            .auto_accept(true),
    )
    .unwrap();

    let injector = UdpSocket::bind("127.0.0.1:0").unwrap();
    injector.set_nonblocking(true).unwrap();

    let header = PacketHeader {
        tk: TransactionKind::Message,
        pk: PacketKind::Message,
        se: 99,
        de: 1,
        si: 999,
        ti: 999,
        cf: true,
        bf: false,
        wf: false,
        hk: HeadKind::Raet,
        bk: BodyKind::Json,
        fk: FootKind::Nul,
        ck: CoatKind::Nul,
        sh: String::new(),
        sp: 0,
        dh: String::new(),
        dp: 0,
    };
    let dummy_crypto = NaclLikeCrypto::new(KeyPairBundle::generate());
    let bytes = TxPacketBuilder::new(header, serde_json::Value::Null)
        .pack(&dummy_crypto, None, None)
        .unwrap();

    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();
    injector.send_to(&bytes, a_addr).unwrap();

    pump(&mut [&mut a], 10);

    let mut buf = [0u8; 65_507];
    let (n, _) = injector.recv_from(&mut buf).expect("exactly one nack");
    let rx = raet_packet::RxPacket::parse_outer(&buf[..n]).unwrap();
    assert_eq!(rx.header.pk, PacketKind::Nack);
    assert_eq!(rx.header.si, 999);
    assert_eq!(rx.header.ti, 999);
    assert_eq!(rx.header.tk, TransactionKind::Message);

    // No second nack follows -- the stale responder never enters the table.
    assert!(matches!(
        injector.recv_from(&mut buf),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock
    ));
}

#[test]
fn crash_recovery_restores_identity_and_peer_without_rejoining() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let b_port = free_port();
    let a_addr: SocketAddr = format!("127.0.0.1:{a_port}").parse().unwrap();
    let b_dir = root.path().join("b");

    let (mut a, mut a_inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path().join("a"))
            .auto_accept(true),
    )
    .unwrap();
    {
        let (mut b, _b_inbox) = RoadStack::new(
            StackConfig::new("b", "127.0.0.1", b_port)
                .dirpath(b_dir.clone())
                .auto_accept(true),
        )
        .unwrap();

        b.join(Some(a_addr)).unwrap();
        pump(&mut [&mut a, &mut b], 20);
        assert_eq!(b.local().eid, 2);
        // `b` is dropped here -- simulates a crash after a completed Join.
    }

    let b_port2 = free_port();
    let (mut b2, _b2_inbox) = RoadStack::new(
        StackConfig::new("b", "127.0.0.1", b_port2)
            .dirpath(b_dir)
            .auto_accept(true),
    )
    .unwrap();

    assert_eq!(b2.local().eid, 2, "restored eid from the keep store");
    assert!(b2.remotes().any(|r| r.eid == 1), "restored peer record");

    b2.transmit(serde_json::json!({"after_restart": true}), 1);
    pump(&mut [&mut a, &mut b2], 20);

    let deliveries = a_inbox.drain();
    assert!(deliveries
        .iter()
        .any(|d| matches!(d, Delivery::Message { from: 2, .. })));
}

#[test]
fn transmit_to_unknown_remote_is_not_a_construction_error() {
    let root = tempdir().unwrap();
    let a_port = free_port();
    let (mut a, _inbox) = RoadStack::new(
        StackConfig::new("a", "127.0.0.1", a_port)
            .main(true)
            .eid(1)
            .dirpath(root.path())
            .auto_accept(true),
    )
    .unwrap();

    // Queuing is infallible; a Messenger that can't find its remote just
    // logs and drops the send rather than failing the whole tick.
    a.transmit(serde_json::json!({"x": 1}), 42);
    a.service().unwrap();
}
