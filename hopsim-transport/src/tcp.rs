use std::{future, net::SocketAddr};

use futures::{SinkExt, StreamExt, TryStreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_util::codec::Framed;
use tracing::{debug, error, trace};

use hopsim_engine::{Connection, Message, SessionError, Simulator};
use hopsim_wire::json;

use crate::{Transport, TransportError};

#[derive(Debug, Clone)]
pub struct TcpOptions {
    /// The maximum length of an inbound line. Longer lines end the session.
    max_line_length: usize,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self { max_line_length: json::DEFAULT_MAX_LINE_LENGTH }
    }
}

impl TcpOptions {
    pub fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }
}

/// Newline-delimited JSON over plain TCP. Every connection is served as if on path `/`.
#[derive(Debug, Default)]
pub struct Tcp {
    options: TcpOptions,
    listener: Option<TcpListener>,
}

impl Tcp {
    pub fn new(options: TcpOptions) -> Self {
        Self { options, listener: None }
    }

    /// Wraps an accepted stream into a session connection.
    pub fn connection(&self, stream: TcpStream, peer: SocketAddr) -> Connection {
        let codec = json::Codec::with_max_length(self.options.max_line_length);
        let framed = Framed::new(stream, codec);
        let (sink, stream) = framed.split();

        let sink = sink.sink_map_err(SessionError::from).with(|msg: Message| {
            trace!(direction = "sim->ui", ?msg);
            future::ready(Ok::<_, SessionError>(msg))
        });

        let stream = stream.map_err(SessionError::from);
        Connection::new(peer.to_string(), "/", Box::pin(sink), Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl Transport for Tcp {
    async fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let listener = TcpListener::bind(addr).await?;
        debug!("Listening on tcp://{}", listener.local_addr()?);

        self.listener = Some(listener);

        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    async fn serve(&mut self, sim: Simulator) -> Result<(), TransportError> {
        let listener = self.listener.as_ref().ok_or(TransportError::NotBound)?;
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Error accepting connection: {:?}", e);
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%addr, "Failed to set TCP_NODELAY: {e}");
                    }

                    debug!("Accepted connection from {}", addr);

                    let conn = self.connection(stream, addr);
                    let sim = sim.clone();
                    sessions.spawn(async move {
                        if let Err(e) = sim.serve(conn).await {
                            debug!(%addr, "Session ended: {e}");
                        }
                    });
                }
                Some(_) = sessions.join_next() => {}
            }
        }
    }
}
