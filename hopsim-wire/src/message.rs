use hopsim_common::iso_now;
use serde::{Deserialize, Serialize};

use crate::{Error, RouteId};

/// The `messageType` tag stamped on every packet. The client keys its packet parser on it.
pub const MESSAGE_TYPE: &str = "transfer_ws_server";

/// Severity of a [`Message::Log`] line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Success,
    Error,
}

/// An outbound message, serialized as a JSON object tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// An informational line for the client's log panel.
    Log { level: Level, text: String },
    /// Baseline cadence hint, sent once per connection.
    #[serde(rename_all = "camelCase")]
    Config { update_rate_ms: u64 },
    /// Live status-change notification for a route.
    #[serde(rename_all = "camelCase")]
    RouteStatus { route_id: RouteId, status: String, timestamp: String },
    /// One hop of one simulated packet.
    Packet { packet: Packet },
}

impl Message {
    pub fn log(level: Level, text: impl Into<String>) -> Self {
        Self::Log { level, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::log(Level::Info, text)
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self::log(Level::Warn, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::log(Level::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::log(Level::Error, text)
    }

    pub const fn config(update_rate_ms: u64) -> Self {
        Self::Config { update_rate_ms }
    }

    /// Creates a status-change notification stamped with the current time.
    pub fn route_status(route_id: RouteId, status: impl Into<String>) -> Self {
        Self::RouteStatus { route_id, status: status.into(), timestamp: iso_now() }
    }

    /// Encodes the message as a single JSON text frame.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the packet if this is a packet message.
    pub const fn as_packet(&self) -> Option<&Packet> {
        match self {
            Self::Packet { packet } => Some(packet),
            _ => None,
        }
    }
}

/// A single hop message of a simulated packet.
///
/// `packet_id` is the join key the client uses to correlate successive hops of one packet.
/// `ttl_ms` is only present on hops that (re)start the packet's lifetime; the client keeps
/// decrementing the remaining TTL locally for hops that omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    pub timestamp: String,
    pub source_device_id: String,
    pub target_device_id: String,
    /// Same as `source_device_id`, for older client parsers.
    pub source: String,
    /// Same as `target_device_id`, for older client parsers.
    pub target: String,
    pub protocol: String,
    pub edge_travel_ms: u64,
    /// Same as `edge_travel_ms`.
    pub duration_ms: u64,
    pub packet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<RouteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<RouteAnnotation>,
}

/// Route and status context attached to every packet hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnnotation {
    pub route_id: RouteId,
    pub route_name: String,
    pub status: String,
    pub status_index: usize,
    pub status_total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Structured alert attached to a status step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default = "Alert::default_kind")]
    pub kind: String,
    #[serde(default = "Alert::default_severity")]
    pub severity: String,
    pub code: String,
    pub message: String,
}

impl Alert {
    /// Creates an alarm alert with `warn` severity.
    pub fn alarm(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Self::default_kind(),
            severity: Self::default_severity(),
            code: code.into(),
            message: message.into(),
        }
    }

    fn default_kind() -> String {
        "alarm".to_owned()
    }

    fn default_severity() -> String {
        "warn".to_owned()
    }
}
