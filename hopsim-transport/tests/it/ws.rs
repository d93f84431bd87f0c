use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use hopsim_engine::{Hop, Message, Protocol, Route, SessionOptions, Simulator};
use hopsim_transport::{Transport, Ws, WsOptions, CLOSE_POLICY_VIOLATION};
use hopsim_wire::Level;

async fn start_server() -> SocketAddr {
    let route = Route::new(
        4u64,
        vec![
            Hop::new("hama_camera", "wifi_hub", Protocol::Wlan, Duration::from_millis(300))
                .with_ttl_override(6500),
            Hop::new("wifi_hub", "fritzbox", Protocol::Ethernet, Duration::from_millis(300)),
        ],
    )
    .with_injection_interval(Duration::from_millis(500));

    let options = SessionOptions::default().chatter(None).status_cycle(None);
    let sim = Simulator::new(vec![route], options);

    let mut ws = Ws::new(WsOptions::default());
    ws.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = ws.local_addr().unwrap();

    tokio::spawn(async move { ws.serve(sim).await });

    addr
}

async fn next_message<S>(client: &mut S) -> Message
where
    S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match client.next().await.unwrap().unwrap() {
            WsMessage::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            WsMessage::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn session_over_websocket() {
    let _ = tracing_subscriber::fmt::try_init();

    let addr = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/packets")).await.unwrap();

    assert_eq!(
        next_message(&mut client).await,
        Message::log(Level::Success, "UI connected on /packets.")
    );
    assert_eq!(next_message(&mut client).await, Message::config(300));
    assert_eq!(next_message(&mut client).await, Message::success("Starting route sender 4."));

    let first = next_message(&mut client).await;
    let packet = first.as_packet().unwrap();
    assert_eq!(packet.source_device_id, "hama_camera");
    assert_eq!(packet.ttl_ms, Some(6500));

    client
        .send(WsMessage::Text(r#"{"type":"stopRoute","routeId":4}"#.into()))
        .await
        .unwrap();

    loop {
        match next_message(&mut client).await {
            Message::Packet { .. } => {}
            msg => {
                assert_eq!(msg, Message::success("Route 4 stopped."));
                break;
            }
        }
    }

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn unsupported_path_is_closed_with_policy_violation() {
    let addr = start_server().await;
    let (mut client, _) = connect_async(format!("ws://{addr}/admin")).await.unwrap();

    let frame = loop {
        match client.next().await.unwrap().unwrap() {
            WsMessage::Close(frame) => break frame.unwrap(),
            WsMessage::Text(text) => panic!("unexpected text frame: {text}"),
            _ => {}
        }
    };

    assert_eq!(u16::from(frame.code), CLOSE_POLICY_VIOLATION);
    assert_eq!(frame.reason.as_str(), "Unsupported path /admin, use /packets");
}
