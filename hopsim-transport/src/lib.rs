use std::{io, net::SocketAddr};

use thiserror::Error;
use tracing::trace;

use hopsim_engine::{Message, SessionError, Simulator};

mod tcp;
pub use tcp::*;

mod ws;
pub use ws::*;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Transport is not bound")]
    NotBound,
}

/// A listener that turns accepted peers into simulator sessions.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Binds to the given address.
    async fn bind(&mut self, addr: SocketAddr) -> Result<(), TransportError>;

    /// Returns the bound address, if bound.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Accepts peers until the listener fails, serving each one on its own task.
    async fn serve(&mut self, sim: Simulator) -> Result<(), TransportError>;
}

/// Encodes an outbound message as a text frame.
pub(crate) fn encode(msg: &Message) -> Result<String, SessionError> {
    let text = msg.to_json()?;
    trace!(direction = "sim->ui", "{text}");
    Ok(text)
}
