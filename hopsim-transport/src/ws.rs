use std::{future, net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::Uri,
    response::Response,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, warn};

use hopsim_engine::{Connection, Message, SessionError, Simulator};

use crate::{encode, Transport, TransportError};

/// The close code sent to peers connecting on a path outside the allow-list.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// The path clients are told to use.
pub const DEFAULT_PATH: &str = "/packets";

#[derive(Debug, Clone)]
pub struct WsOptions {
    /// Paths on which sessions are served. Upgrades on any other path are accepted and then
    /// closed with [`CLOSE_POLICY_VIOLATION`].
    paths: Vec<String>,
}

impl Default for WsOptions {
    fn default() -> Self {
        Self { paths: vec![DEFAULT_PATH.to_owned(), "/".to_owned()] }
    }
}

impl WsOptions {
    pub fn paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    pub fn allows(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// JSON text frames over WebSocket, served with axum.
#[derive(Debug, Default)]
pub struct Ws {
    options: WsOptions,
    listener: Option<TcpListener>,
}

#[derive(Debug, Clone)]
struct WsState {
    sim: Simulator,
    options: Arc<WsOptions>,
}

impl Ws {
    pub fn new(options: WsOptions) -> Self {
        Self { options, listener: None }
    }

    /// Builds the router serving `sim`. Every path upgrades, the path check happens after.
    pub fn router(&self, sim: Simulator) -> Router {
        Router::new()
            .fallback(upgrade)
            .with_state(WsState { sim, options: Arc::new(self.options.clone()) })
    }
}

#[async_trait::async_trait]
impl Transport for Ws {
    async fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let listener = TcpListener::bind(addr).await?;
        debug!("Listening on ws://{}{}", listener.local_addr()?, DEFAULT_PATH);

        self.listener = Some(listener);

        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    async fn serve(&mut self, sim: Simulator) -> Result<(), TransportError> {
        let listener = self.listener.take().ok_or(TransportError::NotBound)?;
        let app = self.router(sim);

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

        Ok(())
    }
}

async fn upgrade(
    State(state): State<WsState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    let path = uri.path().to_owned();
    debug!(%addr, %path, "Upgrading connection");

    ws.on_upgrade(move |socket| handle(socket, addr, path, state))
}

async fn handle(mut socket: WebSocket, addr: SocketAddr, path: String, state: WsState) {
    if !state.options.allows(&path) {
        warn!(%addr, %path, "Rejecting connection on unsupported path");

        let frame = CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: format!("Unsupported path {path}, use {DEFAULT_PATH}").into(),
        };
        if let Err(e) = socket.send(WsMessage::Close(Some(frame))).await {
            debug!(%addr, "Failed to send close frame: {e}");
        }

        return;
    }

    if let Err(e) = state.sim.serve(connection(socket, addr, path)).await {
        debug!(%addr, "Session ended: {e}");
    }
}

/// Adapts an upgraded socket into a session connection. Binary frames are read as UTF-8 text,
/// control frames are skipped.
fn connection(socket: WebSocket, addr: SocketAddr, path: String) -> Connection {
    let (sink, stream) = socket.split();

    let sink = sink
        .sink_map_err(SessionError::transport)
        .with(|msg: Message| future::ready(encode(&msg).map(|text| WsMessage::Text(text.into()))));

    let stream = stream.filter_map(|frame| {
        future::ready(match frame {
            Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
            Ok(WsMessage::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok().map(Ok),
            Ok(_) => None,
            Err(e) => Some(Err(SessionError::transport(e))),
        })
    });

    Connection::new(addr.to_string(), path, Box::pin(sink), Box::pin(stream))
}
