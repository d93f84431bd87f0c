use serde::Deserialize;
use serde_json::Value;

use crate::{Error, RouteId, RouteSpec};

/// An inbound control request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Control {
    /// Start injecting packets on a client-supplied route.
    StartRoute { route: RouteSpec },
    /// Stop a running route and abandon its in-flight packets.
    #[serde(rename_all = "camelCase")]
    StopRoute { route_id: RouteId },
    /// List the active route ids.
    ListRoutes,
    /// Move a route to the status step with the given label.
    #[serde(rename_all = "camelCase")]
    SetRouteStatus { route_id: RouteId, status: String },
}

impl Control {
    const KINDS: [&'static str; 4] = ["startRoute", "stopRoute", "listRoutes", "setRouteStatus"];

    /// Decodes one inbound text frame.
    ///
    /// Returns `Ok(None)` for frames without a known `type`, which callers ignore.
    /// A known `type` with a malformed body is an error.
    pub fn decode(text: &str) -> Result<Option<Self>, Error> {
        let value: Value = serde_json::from_str(text)?;

        match value.get("type").and_then(Value::as_str) {
            Some(kind) if Self::KINDS.contains(&kind) => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }
}
