//! Simulator configuration files.
//!
//! A config is a YAML or JSON document (JSON when the file ends in `.json`). Every field is
//! optional; a missing `routes` list starts sessions without presets.

use std::{
    fmt,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rand::{rngs::StdRng, SeedableRng};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use hopsim_engine::{
    ChatterOptions, Route, RouteDefaults, RouteError, RouteId, SessionOptions, Simulator,
    DEFAULT_MAX_IN_FLIGHT, DEFAULT_STATUS_CYCLE,
};
use hopsim_wire::RouteSpec;

/// The bundled smart-home demo topology.
pub const DEMO: &str = include_str!("../config/demo.yaml");

/// The address listened on when neither the config nor the command line names one.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8765";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid route #{index}: {source}")]
    Route { index: usize, source: RouteError },
    #[error("Route id {0} is used more than once")]
    DuplicateRoute(RouteId),
}

/// How sessions reach the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON text frames over WebSocket.
    #[default]
    Ws,
    /// Newline-delimited JSON over TCP.
    Tcp,
}

impl TransportKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Ok(Self::Ws),
            "tcp" => Ok(Self::Tcp),
            other => Err(format!("unknown transport {other:?}, expected ws or tcp")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub transport: TransportKind,
    /// WebSocket paths that are served. Ignored by the TCP transport.
    #[serde(default = "default_paths")]
    pub paths: Vec<String>,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Seeds per-session randomness. Sessions of one process draw the same jitter.
    #[serde(default)]
    pub seed: u64,
    /// Period of the automatic status cycle. `null` disables it.
    #[serde(default = "default_status_cycle_ms")]
    pub status_cycle_ms: Option<u64>,
    /// Periodic filler log lines. `null` disables them.
    #[serde(default = "default_chatter")]
    pub chatter: Option<ChatterConfig>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatterConfig {
    #[serde(default)]
    pub period_ms: Option<u64>,
    #[serde(default)]
    pub lines: Option<Vec<String>>,
}

/// Values applied to routes that leave the matching field unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub injection_interval_ms: Option<u64>,
    #[serde(default)]
    pub extra_gap_ms: Option<u64>,
    #[serde(default)]
    pub edge_travel_ms: Option<u64>,
    #[serde(default)]
    pub hop_overlap_ms: Option<u64>,
    /// Missing keeps the built-in TTL, `null` stamps no TTL at all.
    #[serde(default, deserialize_with = "nullable")]
    pub route_ttl_ms: Option<Option<u64>>,
    #[serde(default)]
    pub start_delay_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            transport: TransportKind::default(),
            paths: default_paths(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            seed: 0,
            status_cycle_ms: default_status_cycle_ms(),
            chatter: default_chatter(),
            defaults: DefaultsConfig::default(),
            routes: Vec::new(),
        }
    }
}

impl Config {
    /// Loads a config file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&raw)
        } else {
            Self::from_yaml(&raw)
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The bundled demo topology.
    pub fn demo() -> Result<Self, ConfigError> {
        Self::from_yaml(DEMO)
    }

    pub fn route_defaults(&self) -> RouteDefaults {
        self.defaults.to_route_defaults()
    }

    pub fn session_options(&self) -> SessionOptions {
        let chatter = self.chatter.as_ref().map(ChatterConfig::to_options);

        SessionOptions::default()
            .max_in_flight(self.max_in_flight)
            .route_defaults(self.route_defaults())
            .chatter(chatter)
            .status_cycle(self.status_cycle_ms.map(Duration::from_millis))
            .seed(self.seed)
    }

    /// Builds the preset routes. Routes without an id are numbered by their position, starting
    /// at 1.
    pub fn routes(&self) -> Result<Vec<Route>, ConfigError> {
        let defaults = self.route_defaults();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut seen = FxHashSet::default();

        let mut routes = Vec::with_capacity(self.routes.len());
        for (index, spec) in self.routes.iter().enumerate() {
            let route = Route::from_spec(
                spec.clone(),
                &defaults,
                || RouteId::from(index as u64 + 1),
                &mut rng,
            )
            .map_err(|source| ConfigError::Route { index, source })?;

            if !seen.insert(route.id().clone()) {
                return Err(ConfigError::DuplicateRoute(route.id().clone()));
            }

            routes.push(route);
        }

        Ok(routes)
    }

    pub fn simulator(&self) -> Result<Simulator, ConfigError> {
        Ok(Simulator::new(self.routes()?, self.session_options()))
    }
}

impl ChatterConfig {
    fn to_options(&self) -> ChatterOptions {
        let mut options = ChatterOptions::default();
        if let Some(period) = self.period_ms {
            options = options.period(Duration::from_millis(period));
        }
        if let Some(lines) = &self.lines {
            options = options.lines(lines.clone());
        }
        options
    }
}

impl DefaultsConfig {
    fn to_route_defaults(&self) -> RouteDefaults {
        let mut defaults = RouteDefaults::default();

        if let Some(ms) = self.injection_interval_ms {
            defaults = defaults.injection_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.extra_gap_ms {
            defaults = defaults.extra_gap(Duration::from_millis(ms));
        }
        if let Some(ms) = self.edge_travel_ms {
            defaults = defaults.edge_travel(Duration::from_millis(ms));
        }
        if let Some(ms) = self.hop_overlap_ms {
            defaults = defaults.hop_overlap(Duration::from_millis(ms));
        }
        if let Some(ttl) = self.route_ttl_ms {
            defaults = defaults.route_ttl_ms(ttl);
        }
        if let Some(ms) = self.start_delay_ms {
            defaults = defaults.start_delay(Duration::from_millis(ms));
        }

        defaults
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8765))
}

fn default_paths() -> Vec<String> {
    vec!["/packets".to_owned(), "/".to_owned()]
}

const fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_status_cycle_ms() -> Option<u64> {
    Some(DEFAULT_STATUS_CYCLE.as_millis() as u64)
}

fn default_chatter() -> Option<ChatterConfig> {
    Some(ChatterConfig::default())
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
