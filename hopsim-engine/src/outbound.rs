use std::{fmt, sync::Arc};

use futures::SinkExt;
use tokio::sync::Mutex;

use crate::{BoxSink, Message, SessionError};

/// The single write path to a peer, shared by every task of a session.
///
/// Each message is written while holding the lock, so frames from concurrent traversals never
/// interleave. The lock is released between messages.
#[derive(Clone)]
pub struct Outbound {
    sink: Arc<Mutex<BoxSink>>,
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound").finish_non_exhaustive()
    }
}

impl Outbound {
    pub fn new(sink: BoxSink) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    /// Writes one message and flushes it.
    pub async fn send(&self, msg: Message) -> Result<(), SessionError> {
        let mut sink = self.sink.lock().await;
        sink.send(msg).await
    }

    /// Closes the underlying sink.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}
