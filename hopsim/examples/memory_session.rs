use std::time::Duration;

use hopsim::{config::Config, Connection, Message};

/// Runs the demo topology against an in-memory client and prints ten seconds of traffic.
#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let sim = Config::demo().unwrap().simulator().unwrap();
    let (conn, mut peer) = Connection::in_memory("/packets");

    let session = tokio::spawn(async move { sim.serve(conn).await });

    peer.send(r#"{"type":"listRoutes"}"#);

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = peer.recv() => match msg {
                Some(Message::Packet { packet }) => println!(
                    "{} {} -> {} over {} ({}ms)",
                    packet.packet_id,
                    packet.source,
                    packet.target,
                    packet.protocol,
                    packet.duration_ms
                ),
                Some(msg) => println!("{msg:?}"),
                None => break,
            },
            _ = &mut deadline => break,
        }
    }

    peer.disconnect();
    session.await.unwrap().unwrap();
}
