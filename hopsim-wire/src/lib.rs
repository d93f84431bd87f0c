//! Wire formats for the packet transit simulator.
//!
//! Everything in this crate is part of the compatibility contract with the visualization
//! client: field names are serialized verbatim and must not change.
//!
//! - [`Message`]: outbound messages (simulator -> client).
//! - [`Control`]: inbound control requests (client -> simulator).
//! - [`RouteSpec`]: the route request shape, shared by `startRoute` and config files.
//! - [`json::Codec`]: newline-delimited JSON framing for byte-stream transports.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

mod control;
pub use control::Control;

pub mod json;

mod message;
pub use message::{Alert, Level, Message, Packet, RouteAnnotation, MESSAGE_TYPE};

mod route_id;
pub use route_id::RouteId;

mod spec;
pub use spec::{HopSpec, RouteSpec, StepSpec};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Line exceeds maximum frame length")]
    LineTooLong,
}

impl From<LinesCodecError> for Error {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => Self::LineTooLong,
            LinesCodecError::Io(e) => Self::Io(e),
        }
    }
}
