use std::time::Duration;

use thiserror::Error;

mod chatter;
pub use chatter::{ChatterOptions, DEFAULT_CHATTER_PERIOD};

mod connection;
pub use connection::{BoxSink, BoxStream, Connection, MemoryPeer};

mod cycler;

mod injector;

mod outbound;
pub use outbound::Outbound;

mod packet;
pub use packet::PacketEnvelope;

mod registry;
pub use registry::RouteRegistry;

mod route;
pub use route::{
    Hop, Protocol, Route, RouteDefaults, RouteError, StatusStep, UnknownProtocol,
    DEFAULT_EDGE_TRAVEL, DEFAULT_HOP_OVERLAP, DEFAULT_INJECTION_INTERVAL, DEFAULT_ROUTE_TTL_MS,
};

mod runtime;
pub use runtime::{RouteRuntime, StatusSnapshot};

mod session;
pub use session::Simulator;

mod stats;
pub use stats::SimStats;

pub use hopsim_wire::{Message, RouteId};

/// The default number of packets a single route may have traversing at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// The default period of the demo status cycler.
pub const DEFAULT_STATUS_CYCLE: Duration = Duration::from_millis(2000);

/// The `updateRateMs` hint sent when no preset route supplies one.
pub const DEFAULT_UPDATE_RATE_MS: u64 = 120;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Wire protocol error: {0}")]
    Wire(#[from] hopsim_wire::Error),
    #[error("Connection closed")]
    Closed,
}

impl SessionError {
    /// Wraps a transport-specific error.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}

/// Errors returned by route control operations. These are reported to the peer as `warn` log
/// lines and never end a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Route {0} is already active.")]
    AlreadyActive(RouteId),
    #[error("Route {0} is not active.")]
    NotActive(RouteId),
    #[error("Route {0} has no hops, no packets will be sent.")]
    NoHops(RouteId),
    #[error("Unknown route {0}.")]
    UnknownRoute(RouteId),
    #[error("Route {0} has no status steps.")]
    NoStatusSteps(RouteId),
    #[error("Route {route_id} has no status {status:?}.")]
    UnknownStatus { route_id: RouteId, status: String },
}

/// Per-session simulation options, shared by every connection of a [`Simulator`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The maximum number of packets of one route traversing at the same time. Ticks that find
    /// the route at this limit are skipped.
    max_in_flight: usize,
    /// Defaults applied to client routes that leave fields unset.
    route_defaults: RouteDefaults,
    /// Periodic narrative log lines. `None` disables them.
    chatter: Option<ChatterOptions>,
    /// The period at which the status steps of active routes are advanced. `None` disables
    /// the cycler, statuses then only change on `setRouteStatus`.
    status_cycle: Option<Duration>,
    /// Seed for the per-session random number generator (interval jitter).
    seed: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            route_defaults: RouteDefaults::default(),
            chatter: Some(ChatterOptions::default()),
            status_cycle: Some(DEFAULT_STATUS_CYCLE),
            seed: 0,
        }
    }
}

impl SessionOptions {
    /// Sets the in-flight packet limit per route. Values below 1 are raised to 1.
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn route_defaults(mut self, defaults: RouteDefaults) -> Self {
        self.route_defaults = defaults;
        self
    }

    pub fn chatter(mut self, chatter: Option<ChatterOptions>) -> Self {
        self.chatter = chatter;
        self
    }

    pub fn status_cycle(mut self, period: Option<Duration>) -> Self {
        self.status_cycle = period.filter(|p| !p.is_zero());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn defaults(&self) -> &RouteDefaults {
        &self.route_defaults
    }
}
