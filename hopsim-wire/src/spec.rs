use serde::{Deserialize, Deserializer};

use crate::{Alert, RouteId};

/// A route as requested by a client (`startRoute`) or listed in a config file.
///
/// Every field except `hops` is optional; missing fields are filled with defaults when the
/// route is built. Field names accept the spellings used by existing topology exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, alias = "id")]
    pub route_id: Option<RouteId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hops: Vec<HopSpec>,
    #[serde(default)]
    pub injection_interval_ms: Option<u64>,
    #[serde(default)]
    pub extra_gap_ms: Option<u64>,
    /// Missing means "use the default TTL", an explicit `null` means "never stamp a TTL".
    #[serde(default, deserialize_with = "nullable")]
    pub route_ttl_ms: Option<Option<u64>>,
    #[serde(default)]
    pub hop_overlap_ms: Option<u64>,
    #[serde(default)]
    pub start_delay_ms: Option<u64>,
    #[serde(default)]
    pub interval_jitter_ms: Option<u64>,
    #[serde(default, alias = "steps")]
    pub status_steps: Vec<StepSpec>,
}

/// One hop of a [`RouteSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopSpec {
    #[serde(default, alias = "src", alias = "sourceDeviceId")]
    pub source: Option<String>,
    #[serde(default, alias = "dst", alias = "destination", alias = "targetDeviceId")]
    pub target: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default, alias = "durationMs", alias = "nominalDurationMs")]
    pub edge_travel_ms: Option<u64>,
    #[serde(default, alias = "ttlOverrideMs")]
    pub ttl_ms: Option<u64>,
}

/// A status step, either a bare label or a label with an alert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StepSpec {
    Label(String),
    Detailed {
        #[serde(alias = "status")]
        label: String,
        #[serde(default)]
        alert: Option<Alert>,
    },
}

impl StepSpec {
    pub fn label(&self) -> &str {
        match self {
            Self::Label(label) | Self::Detailed { label, .. } => label,
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
