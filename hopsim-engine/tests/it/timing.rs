use std::{collections::HashMap, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

use hopsim_engine::{
    Connection, Hop, MemoryPeer, Message, Protocol, Route, SessionError, SessionOptions,
    Simulator, StatusStep,
};
use hopsim_wire::Packet;

const TOLERANCE_MS: u64 = 10;

fn options() -> SessionOptions {
    SessionOptions::default().chatter(None).status_cycle(None)
}

fn hop(source: &str, target: &str, ms: u64) -> Hop {
    Hop::new(source, target, Protocol::ZigBee, Duration::from_millis(ms))
}

fn two_hop_route() -> Route {
    Route::new(1u64, vec![hop("A", "B", 1000), hop("B", "C", 1000)])
        .with_ttl_ms(Some(5000))
        .with_hop_overlap(Duration::ZERO)
        .with_injection_interval(Duration::from_millis(2000))
}

fn connect(
    routes: Vec<Route>,
    options: SessionOptions,
) -> (JoinHandle<Result<(), SessionError>>, MemoryPeer) {
    let sim = Simulator::new(routes, options);
    let (conn, peer) = Connection::in_memory("/packets");
    (tokio::spawn(async move { sim.serve(conn).await }), peer)
}

/// Collects packet messages with their arrival time, in ms since `start`, until `until_ms`.
async fn collect_packets(
    peer: &mut MemoryPeer,
    start: Instant,
    until_ms: u64,
) -> Vec<(u64, Packet)> {
    let deadline = start + Duration::from_millis(until_ms);
    let mut packets = Vec::new();

    while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, peer.recv()).await {
        if let Message::Packet { packet } = msg {
            let at = u64::try_from(start.elapsed().as_millis()).unwrap();
            packets.push((at, packet));
        }
    }

    packets
}

fn assert_near(actual: u64, expected: u64) {
    assert!(
        actual.abs_diff(expected) <= TOLERANCE_MS,
        "expected t~{expected}ms, got t={actual}ms"
    );
}

#[tokio::test(start_paused = true)]
async fn end_to_end_two_hop_route() {
    let _ = tracing_subscriber::fmt::try_init();

    let start = Instant::now();
    let (session, mut peer) = connect(vec![two_hop_route()], options());

    let packets = collect_packets(&mut peer, start, 2500).await;

    // Packet 1: both hops, packet 2: first hop.
    assert_eq!(packets.len(), 3, "{packets:?}");

    let (t0, first) = &packets[0];
    assert_near(*t0, 0);
    assert_eq!((first.source_device_id.as_str(), first.target_device_id.as_str()), ("A", "B"));
    assert_eq!(first.ttl_ms, Some(5000));

    let (t1, second) = &packets[1];
    assert_near(*t1, 1000);
    assert_eq!(second.packet_id, first.packet_id);
    assert_eq!((second.source_device_id.as_str(), second.target_device_id.as_str()), ("B", "C"));
    assert_eq!(second.ttl_ms, None);

    let (t2, next) = &packets[2];
    assert_near(*t2, 2000);
    assert_ne!(next.packet_id, first.packet_id);
    assert_eq!(next.ttl_ms, Some(5000));

    peer.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn ttl_only_on_first_hop() {
    let route = Route::new(1u64, vec![hop("a", "b", 300), hop("b", "c", 300), hop("c", "d", 300)])
        .with_ttl_ms(Some(9000))
        .with_injection_interval(Duration::from_millis(500));

    let start = Instant::now();
    let (session, mut peer) = connect(vec![route], options());
    let packets = collect_packets(&mut peer, start, 5000).await;

    let mut by_packet: HashMap<String, Vec<Option<u64>>> = HashMap::new();
    for (_, packet) in packets {
        by_packet.entry(packet.packet_id).or_default().push(packet.ttl_ms);
    }

    assert!(by_packet.len() >= 5);
    for ttls in by_packet.values() {
        assert_eq!(ttls[0], Some(9000));
        assert!(ttls[1..].iter().all(Option::is_none), "{ttls:?}");
    }

    peer.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn overrides_and_missing_route_ttl() {
    let route = Route::new(
        "cam",
        vec![hop("cam", "hub", 200), hop("hub", "router", 200).with_ttl_override(6500)],
    )
    .with_ttl_ms(None)
    .with_injection_interval(Duration::from_millis(1000));

    let start = Instant::now();
    let (session, mut peer) = connect(vec![route], options());
    let packets = collect_packets(&mut peer, start, 3500).await;

    assert!(!packets.is_empty());
    for (_, packet) in &packets {
        match packet.source_device_id.as_str() {
            "cam" => assert_eq!(packet.ttl_ms, None),
            "hub" => assert_eq!(packet.ttl_ms, Some(6500)),
            other => panic!("unexpected hop source {other}"),
        }
    }

    peer.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_cap() {
    // Traversals take 2000ms while injections are attempted every 500ms.
    let route = Route::new(1u64, vec![hop("a", "b", 1000), hop("b", "c", 1000)])
        .with_hop_overlap(Duration::ZERO)
        .with_injection_interval(Duration::from_millis(500));

    let start = Instant::now();
    let (session, mut peer) = connect(vec![route], options().max_in_flight(1));
    let packets = collect_packets(&mut peer, start, 10_000).await;

    // A packet is in flight from its first hop until 2000ms later.
    let mut first_seen: Vec<(String, u64)> = Vec::new();
    for (at, packet) in &packets {
        if !first_seen.iter().any(|(id, _)| *id == packet.packet_id) {
            first_seen.push((packet.packet_id.clone(), *at));
        }
    }

    assert!(first_seen.len() >= 3);
    for pair in first_seen.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= 2000, "{first_seen:?}");
    }

    peer.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn status_is_fixed_per_packet() {
    let route = two_hop_route()
        .with_injection_interval(Duration::from_secs(60))
        .with_status_steps(vec![StatusStep::new("status"), StatusStep::new("alarm")]);

    let start = Instant::now();
    let (session, mut peer) = connect(vec![route], options());

    // Change the status while the first packet is between its hops.
    tokio::time::sleep(Duration::from_millis(500)).await;
    peer.send(r#"{"type":"setRouteStatus","routeId":1,"status":"alarm"}"#);

    let packets = collect_packets(&mut peer, start, 1500).await;
    assert_eq!(packets.len(), 2);

    for (_, packet) in &packets {
        let payload = packet.payload.as_ref().unwrap();
        assert_eq!(payload.status, "status");
        assert_eq!((payload.status_index, payload.status_total), (0, 2));
    }

    peer.disconnect();
    session.await.unwrap().unwrap();
}
