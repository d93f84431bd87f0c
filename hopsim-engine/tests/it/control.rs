use std::time::Duration;

use hopsim_engine::{
    Connection, Hop, MemoryPeer, Message, Protocol, Route, RouteId, SessionOptions, Simulator,
    StatusStep,
};
use hopsim_wire::Level;

fn options() -> SessionOptions {
    SessionOptions::default().chatter(None).status_cycle(None)
}

fn preset() -> Route {
    Route::new(
        1u64,
        vec![Hop::new("sensor", "hub", Protocol::ZigBee, Duration::from_millis(1600))],
    )
    .with_status_steps(vec![StatusStep::new("sensor.status"), StatusStep::new("sensor.alarm")])
}

/// Returns the next message that is not a packet hop.
async fn next_notice(peer: &mut MemoryPeer) -> Option<Message> {
    loop {
        match peer.recv().await? {
            Message::Packet { .. } => continue,
            msg => return Some(msg),
        }
    }
}

async fn next_log(peer: &mut MemoryPeer) -> (Level, String) {
    match next_notice(peer).await {
        Some(Message::Log { level, text }) => (level, text),
        other => panic!("expected a log message, got {other:?}"),
    }
}

/// Connects and consumes the greeting, config and preset start confirmations.
async fn connect(sim: &Simulator) -> (tokio::task::JoinHandle<()>, MemoryPeer) {
    let (conn, mut peer) = Connection::in_memory("/packets");
    let session = tokio::spawn({
        let sim = sim.clone();
        async move { sim.serve(conn).await.unwrap() }
    });

    assert_eq!(next_log(&mut peer).await, (Level::Success, "UI connected on /packets.".to_owned()));
    assert!(matches!(next_notice(&mut peer).await, Some(Message::Config { .. })));

    for route in sim.routes() {
        let (level, text) = next_log(&mut peer).await;
        assert_eq!(level, Level::Success);
        assert_eq!(text, format!("Starting route sender {}.", route.id()));
    }

    (session, peer)
}

#[tokio::test(start_paused = true)]
async fn list_start_and_stop() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Simulator::new(vec![preset()], options());
    let (session, mut peer) = connect(&sim).await;

    peer.send(r#"{"type":"startRoute","route":{"routeId":"cam","hops":[{"src":"camera","dst":"hub","protocol":"WLAN","durationMs":3000}]}}"#);
    assert_eq!(
        next_log(&mut peer).await,
        (Level::Success, "Starting route sender cam.".to_owned())
    );

    peer.send(r#"{"type":"listRoutes"}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Info, "Active routes: 1, cam.".to_owned()));

    peer.send(r#"{"type":"stopRoute","routeId":1}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Success, "Route 1 stopped.".to_owned()));

    peer.send(r#"{"type":"listRoutes"}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Info, "Active routes: cam.".to_owned()));

    peer.disconnect();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_twice_only_reports_failure() {
    let sim = Simulator::new(vec![preset()], options());
    let (session, mut peer) = connect(&sim).await;

    peer.send(r#"{"type":"stopRoute","routeId":1}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Success, "Route 1 stopped.".to_owned()));

    // Let any hop of the stopped route that is already queued drain.
    tokio::time::sleep(Duration::from_millis(10)).await;
    while peer.try_recv().is_some() {}

    peer.send(r#"{"type":"stopRoute","routeId":1}"#);
    peer.send(r#"{"type":"stopRoute","routeId":"never"}"#);

    assert_eq!(peer.recv().await, Some(Message::warn("Route 1 is not active.")));
    assert_eq!(peer.recv().await, Some(Message::warn("Route never is not active.")));

    // The stopped route stays silent.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(peer.try_recv(), None);

    peer.disconnect();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_route_is_rejected_with_warning() {
    let sim = Simulator::new(vec![], options());
    let (session, mut peer) = connect(&sim).await;

    peer.send(r#"{"type":"startRoute","route":{"routeId":7,"hops":[]}}"#);
    assert_eq!(
        next_log(&mut peer).await,
        (Level::Warn, "Route 7 has no hops, no packets will be sent.".to_owned())
    );

    peer.send(r#"{"type":"listRoutes"}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Info, "No active routes.".to_owned()));

    peer.disconnect();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn malformed_and_unknown_frames() {
    let sim = Simulator::new(vec![], options());
    let (session, mut peer) = connect(&sim).await;

    // Unknown types are ignored without a reply.
    peer.send(r#"{"type":"hello"}"#);
    peer.send("not json");
    let (level, text) = next_log(&mut peer).await;
    assert_eq!(level, Level::Error);
    assert!(text.starts_with("Malformed control message"), "{text}");

    peer.send(r#"{"type":"startRoute","route":{"hops":[{"source":"a","target":"b","protocol":"Telepathy"}]}}"#);
    let (level, text) = next_log(&mut peer).await;
    assert_eq!(level, Level::Error);
    assert!(text.contains("Telepathy"), "{text}");

    // The session is still usable.
    peer.send(r#"{"type":"listRoutes"}"#);
    assert_eq!(next_log(&mut peer).await, (Level::Info, "No active routes.".to_owned()));

    peer.disconnect();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn set_route_status() {
    let sim = Simulator::new(vec![preset()], options());
    let (session, mut peer) = connect(&sim).await;

    peer.send(r#"{"type":"setRouteStatus","routeId":1,"status":"sensor.alarm"}"#);
    match next_notice(&mut peer).await {
        Some(Message::RouteStatus { route_id, status, .. }) => {
            assert_eq!(route_id, RouteId::from(1u64));
            assert_eq!(status, "sensor.alarm");
        }
        other => panic!("expected a status change, got {other:?}"),
    }

    peer.send(r#"{"type":"setRouteStatus","routeId":1,"status":"SENSOR.ALARM"}"#);
    assert_eq!(
        next_log(&mut peer).await,
        (Level::Warn, r#"Route 1 has no status "SENSOR.ALARM"."#.to_owned())
    );

    // The next packet carries the new status.
    let packet = loop {
        if let Some(Message::Packet { packet }) = peer.recv().await {
            break packet;
        }
    };
    assert_eq!(packet.payload.unwrap().status, "sensor.alarm");

    peer.disconnect();
    session.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disconnect_stops_every_route() {
    let sim = Simulator::new(vec![preset()], options());
    let (session, peer) = connect(&sim).await;
    assert_eq!(sim.stats().active_sessions(), 1);

    tokio::time::sleep(Duration::from_millis(5000)).await;
    peer.disconnect();
    session.await.unwrap();

    let sent = sim.stats().hop_messages();
    assert!(sent > 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sim.stats().hop_messages(), sent);
    assert_eq!(sim.stats().active_sessions(), 0);
}
