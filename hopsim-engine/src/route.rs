use std::{fmt, str::FromStr, time::Duration};

use rand::Rng;
use thiserror::Error;

use hopsim_wire::{Alert, HopSpec, RouteId, RouteSpec, StepSpec};

/// The default nominal duration of a hop.
pub const DEFAULT_EDGE_TRAVEL: Duration = Duration::from_millis(1600);
/// The default amount subtracted from every hop delay.
pub const DEFAULT_HOP_OVERLAP: Duration = Duration::from_millis(120);
/// The default TTL stamped on the first hop of every packet, in milliseconds.
pub const DEFAULT_ROUTE_TTL_MS: u64 = 9000;
/// The default time between packet injections.
pub const DEFAULT_INJECTION_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Route {0} has no hops, no packets will be sent.")]
    NoHops(RouteId),
    #[error("Hop {hop} is missing {field}.")]
    MissingField { hop: usize, field: &'static str },
    #[error("Hop {hop}: {source}")]
    UnknownProtocol {
        hop: usize,
        #[source]
        source: UnknownProtocol,
    },
    #[error("Invalid {field}: {reason}.")]
    InvalidField { field: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown protocol {0:?}")]
pub struct UnknownProtocol(pub String);

/// The closed set of link protocols the client knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Wlan,
    ZigBee,
    HomematicProprietary,
    BluetoothLowEnergy,
    Dect,
    Ethernet,
}

impl Protocol {
    pub const ALL: [Self; 6] = [
        Self::Wlan,
        Self::ZigBee,
        Self::HomematicProprietary,
        Self::BluetoothLowEnergy,
        Self::Dect,
        Self::Ethernet,
    ];

    /// The wire tag of this protocol.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wlan => "WLAN",
            Self::ZigBee => "ZigBee",
            Self::HomematicProprietary => "Homematic Proprietary (ZigBee)",
            Self::BluetoothLowEnergy => "Bluetooth Low Energy",
            Self::Dect => "DECT",
            Self::Ethernet => "Ethernet",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| UnknownProtocol(s.to_owned()))
    }
}

/// One directed edge of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    source: String,
    target: String,
    protocol: Protocol,
    duration: Duration,
    ttl_override_ms: Option<u64>,
}

impl Hop {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        protocol: Protocol,
        duration: Duration,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            protocol,
            duration,
            ttl_override_ms: None,
        }
    }

    /// Makes this hop always stamp `ttl_ms`, regardless of its position in the route.
    pub fn with_ttl_override(mut self, ttl_ms: u64) -> Self {
        self.ttl_override_ms = Some(ttl_ms);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The time the packet is modeled to spend on this hop.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn ttl_override_ms(&self) -> Option<u64> {
        self.ttl_override_ms
    }

    fn from_spec(hop: usize, spec: HopSpec, defaults: &RouteDefaults) -> Result<Self, RouteError> {
        let source =
            required(spec.source).ok_or(RouteError::MissingField { hop, field: "source" })?;
        let target =
            required(spec.target).ok_or(RouteError::MissingField { hop, field: "target" })?;
        let protocol = required(spec.protocol)
            .ok_or(RouteError::MissingField { hop, field: "protocol" })?
            .parse()
            .map_err(|source| RouteError::UnknownProtocol { hop, source })?;

        let duration =
            spec.edge_travel_ms.map(Duration::from_millis).unwrap_or(defaults.edge_travel);
        let mut built = Self::new(source, target, protocol, duration);

        match spec.ttl_ms {
            Some(0) => {
                return Err(RouteError::InvalidField { field: "ttlMs", reason: "must be positive" })
            }
            Some(ttl_ms) => built = built.with_ttl_override(ttl_ms),
            None => {}
        }

        Ok(built)
    }
}

/// A named status label, optionally carrying an alert that is attached to every packet sent
/// while the step is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusStep {
    label: String,
    alert: Option<Alert>,
}

impl StatusStep {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into().trim().to_owned(), alert: None }
    }

    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(alert);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }
}

impl From<StepSpec> for StatusStep {
    fn from(spec: StepSpec) -> Self {
        match spec {
            StepSpec::Label(label) => Self::new(label),
            StepSpec::Detailed { label, alert } => Self { alert, ..Self::new(label) },
        }
    }
}

/// Values used for route fields a request leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefaults {
    injection_interval: Duration,
    extra_gap: Duration,
    edge_travel: Duration,
    hop_overlap: Duration,
    route_ttl_ms: Option<u64>,
    start_delay: Duration,
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            injection_interval: DEFAULT_INJECTION_INTERVAL,
            extra_gap: Duration::ZERO,
            edge_travel: DEFAULT_EDGE_TRAVEL,
            hop_overlap: DEFAULT_HOP_OVERLAP,
            route_ttl_ms: Some(DEFAULT_ROUTE_TTL_MS),
            start_delay: Duration::ZERO,
        }
    }
}

impl RouteDefaults {
    pub fn injection_interval(mut self, interval: Duration) -> Self {
        self.injection_interval = interval;
        self
    }

    pub fn extra_gap(mut self, gap: Duration) -> Self {
        self.extra_gap = gap;
        self
    }

    pub fn edge_travel(mut self, duration: Duration) -> Self {
        self.edge_travel = duration;
        self
    }

    pub fn hop_overlap(mut self, overlap: Duration) -> Self {
        self.hop_overlap = overlap;
        self
    }

    /// Sets the default route TTL. `None` means packets carry no TTL unless a hop overrides it.
    pub fn route_ttl_ms(mut self, ttl_ms: Option<u64>) -> Self {
        self.route_ttl_ms = ttl_ms;
        self
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}

/// An ordered, immutable sequence of hops with its injection timing and status steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    id: RouteId,
    name: String,
    hops: Vec<Hop>,
    injection_interval: Duration,
    extra_gap: Duration,
    ttl_ms: Option<u64>,
    hop_overlap: Duration,
    start_delay: Duration,
    status_steps: Vec<StatusStep>,
}

impl Route {
    /// Creates a route with default timing. The name defaults to the id.
    pub fn new(id: impl Into<RouteId>, hops: Vec<Hop>) -> Self {
        let id = id.into();
        let defaults = RouteDefaults::default();

        Self {
            name: id.to_string(),
            id,
            hops,
            injection_interval: defaults.injection_interval,
            extra_gap: defaults.extra_gap,
            ttl_ms: defaults.route_ttl_ms,
            hop_overlap: defaults.hop_overlap,
            start_delay: defaults.start_delay,
            status_steps: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the time between injections. Zero is raised to one millisecond.
    pub fn with_injection_interval(mut self, interval: Duration) -> Self {
        self.injection_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_extra_gap(mut self, gap: Duration) -> Self {
        self.extra_gap = gap;
        self
    }

    /// Sets the TTL stamped on the first hop. `None` stamps no TTL unless a hop overrides it.
    pub fn with_ttl_ms(mut self, ttl_ms: Option<u64>) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_hop_overlap(mut self, overlap: Duration) -> Self {
        self.hop_overlap = overlap;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_status_steps(mut self, steps: Vec<StatusStep>) -> Self {
        self.status_steps = steps;
        self
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn ttl_ms(&self) -> Option<u64> {
        self.ttl_ms
    }

    pub fn hop_overlap(&self) -> Duration {
        self.hop_overlap
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn status_steps(&self) -> &[StatusStep] {
        &self.status_steps
    }

    /// The time between two consecutive injection ticks.
    pub fn period(&self) -> Duration {
        self.injection_interval + self.extra_gap
    }

    /// The time a traversal waits after emitting `hop` before moving on, never negative.
    pub fn hop_delay(&self, hop: &Hop) -> Duration {
        hop.duration.saturating_sub(self.hop_overlap)
    }

    /// Validates a route request and fills its unset fields from `defaults`.
    ///
    /// `fallback_id` is called when the request carries no id. Interval jitter, if requested, is
    /// drawn once from `rng`.
    pub fn from_spec<R: Rng>(
        spec: RouteSpec,
        defaults: &RouteDefaults,
        fallback_id: impl FnOnce() -> RouteId,
        rng: &mut R,
    ) -> Result<Self, RouteError> {
        let id = spec.route_id.unwrap_or_else(fallback_id);

        if spec.hops.is_empty() {
            return Err(RouteError::NoHops(id));
        }

        let hops = spec
            .hops
            .into_iter()
            .enumerate()
            .map(|(hop, hop_spec)| Hop::from_spec(hop, hop_spec, defaults))
            .collect::<Result<Vec<_>, _>>()?;

        let mut interval = spec
            .injection_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.injection_interval);
        if interval.is_zero() {
            return Err(RouteError::InvalidField {
                field: "injectionIntervalMs",
                reason: "must be positive",
            });
        }

        if let Some(jitter) = spec.interval_jitter_ms.filter(|j| *j > 0) {
            interval += Duration::from_millis(rng.gen_range(0..=jitter));
        }

        let ttl_ms = spec.route_ttl_ms.unwrap_or(defaults.route_ttl_ms);
        if ttl_ms == Some(0) {
            return Err(RouteError::InvalidField {
                field: "routeTtlMs",
                reason: "must be positive",
            });
        }

        let name = required(spec.name).unwrap_or_else(|| id.to_string());

        Ok(Self {
            id,
            name,
            hops,
            injection_interval: interval,
            extra_gap: spec.extra_gap_ms.map(Duration::from_millis).unwrap_or(defaults.extra_gap),
            ttl_ms,
            hop_overlap: spec
                .hop_overlap_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.hop_overlap),
            start_delay: spec
                .start_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.start_delay),
            status_steps: spec.status_steps.into_iter().map(StatusStep::from).collect(),
        })
    }
}

/// Trims the value and treats blank strings as missing.
fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}
