use std::{fmt, pin::Pin};

use futures::{channel::mpsc, Sink, SinkExt, Stream, StreamExt};

use crate::{Message, SessionError};

pub type BoxSink = Pin<Box<dyn Sink<Message, Error = SessionError> + Send>>;
pub type BoxStream = Pin<Box<dyn Stream<Item = Result<String, SessionError>> + Send>>;

/// One accepted peer connection, as handed to [`Simulator::serve`](crate::Simulator::serve).
///
/// Transports adapt their framing into a sink of outbound [`Message`]s and a stream of inbound
/// text frames.
pub struct Connection {
    pub(crate) peer: String,
    pub(crate) path: String,
    pub(crate) sink: BoxSink,
    pub(crate) stream: BoxStream,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        peer: impl Into<String>,
        path: impl Into<String>,
        sink: BoxSink,
        stream: BoxStream,
    ) -> Self {
        Self { peer: peer.into(), path: path.into(), sink, stream }
    }

    /// Creates a connection backed by in-process channels, and the peer end driving it.
    pub fn in_memory(path: impl Into<String>) -> (Self, MemoryPeer) {
        let (to_peer, from_sim) = mpsc::unbounded::<Message>();
        let (to_sim, from_peer) = mpsc::unbounded::<String>();

        let conn = Self::new(
            "memory",
            path,
            Box::pin(to_peer.sink_map_err(SessionError::transport)),
            Box::pin(from_peer.map(Ok)),
        );

        (conn, MemoryPeer { to_sim, from_sim })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The peer end of [`Connection::in_memory`].
#[derive(Debug)]
pub struct MemoryPeer {
    to_sim: mpsc::UnboundedSender<String>,
    from_sim: mpsc::UnboundedReceiver<Message>,
}

impl MemoryPeer {
    /// Sends a raw inbound text frame. Returns false if the session is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_sim.unbounded_send(text.into()).is_ok()
    }

    /// Receives the next outbound message, or `None` once the session closed its sink.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_sim.next().await
    }

    /// Returns an already-sent message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.from_sim.try_recv().ok()
    }

    /// Ends the inbound stream, which the session observes as a disconnect.
    pub fn disconnect(&self) {
        self.to_sim.close_channel();
    }
}
