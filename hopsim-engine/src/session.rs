use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use rand::{rngs::StdRng, SeedableRng};
use tokio::task::JoinSet;
use tracing::{debug, info_span, trace, warn, Instrument};

use hopsim_wire::{Control, RouteSpec};

use crate::{
    cycler::StatusCycler, Connection, Message, Outbound, Route, RouteError, RouteId, RouteRegistry,
    SessionError, SessionOptions, SimStats, DEFAULT_UPDATE_RATE_MS,
};

/// How long a session waits for its sink to close after the peer went away.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The simulator: preset routes and options shared by every connected peer.
///
/// Each connection served by [`Simulator::serve`] gets its own [`RouteRegistry`] started with
/// all preset routes. Nothing is shared between sessions except the preset list, the options
/// and the stats.
#[derive(Debug, Clone)]
pub struct Simulator {
    routes: Arc<Vec<Route>>,
    options: Arc<SessionOptions>,
    stats: Arc<SimStats>,
}

impl Simulator {
    pub fn new(routes: Vec<Route>, options: SessionOptions) -> Self {
        Self { routes: Arc::new(routes), options: Arc::new(options), stats: Arc::default() }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// The `updateRateMs` hint: the nominal duration of the first hop of the first preset.
    pub fn update_rate_ms(&self) -> u64 {
        self.routes
            .first()
            .and_then(|r| r.hops().first())
            .map(|h| u64::try_from(h.duration().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(DEFAULT_UPDATE_RATE_MS)
    }

    /// Runs one session on `conn` until the peer disconnects.
    ///
    /// Every route started on the session is stopped before this returns. Errors are returned
    /// when a write to the peer fails, a peer that simply goes away ends the session with `Ok`.
    pub async fn serve(&self, conn: Connection) -> Result<(), SessionError> {
        let span = info_span!("session", peer = %conn.peer, path = %conn.path);

        Session::new(self.clone()).run(conn).instrument(span).await
    }
}

struct Session {
    sim: Simulator,
    /// Draws interval jitter for client routes.
    rng: StdRng,
    /// Counter for generated client route ids.
    client_seq: u64,
}

impl Session {
    fn new(sim: Simulator) -> Self {
        let rng = StdRng::seed_from_u64(sim.options.seed);
        sim.stats.increment_active_sessions();
        Self { sim, rng, client_seq: 0 }
    }

    async fn run(mut self, conn: Connection) -> Result<(), SessionError> {
        let Connection { path, sink, mut stream, .. } = conn;
        debug!("Peer connected");

        let outbound = Outbound::new(sink);
        outbound.send(Message::success(format!("UI connected on {path}."))).await?;
        outbound.send(Message::config(self.sim.update_rate_ms())).await?;

        let registry = RouteRegistry::new(
            outbound.clone(),
            Arc::clone(&self.sim.stats),
            self.sim.options.max_in_flight,
        );

        let mut background = JoinSet::new();
        let result = self.drive(&registry, &outbound, &mut stream, &mut background).await;

        registry.shutdown();
        background.shutdown().await;

        if tokio::time::timeout(CLOSE_TIMEOUT, outbound.close()).await.is_err() {
            debug!("Timed out closing the connection");
        }

        debug!("Session closed");
        result
    }

    async fn drive(
        &mut self,
        registry: &RouteRegistry,
        outbound: &Outbound,
        stream: &mut crate::BoxStream,
        background: &mut JoinSet<Result<(), SessionError>>,
    ) -> Result<(), SessionError> {
        let presets = Arc::clone(&self.sim.routes);
        for route in presets.iter() {
            start_route(registry, outbound, route.clone()).await?;
        }

        if let Some(chatter) = self.sim.options.chatter.clone() {
            background.spawn(chatter.run(outbound.clone()));
        }

        if let Some(period) = self.sim.options.status_cycle {
            let presets = self.sim.routes.iter().map(|r| r.id().clone()).collect();
            let cycler = StatusCycler::new(period, presets);
            background.spawn(cycler.run(registry.clone(), outbound.clone()));
        }

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(text)) => {
                        trace!(direction = "ui->sim", "{text}");
                        self.on_frame(registry, outbound, &text).await?;
                    }
                    Some(Err(e)) => {
                        debug!("Peer connection error: {e}");
                        return Ok(());
                    }
                    None => {
                        debug!("Peer disconnected");
                        return Ok(());
                    }
                },
                Some(done) = background.join_next() => {
                    if let Ok(Err(e)) = done {
                        debug!("Background task ended: {e}");
                    }
                }
            }
        }
    }

    async fn on_frame(
        &mut self,
        registry: &RouteRegistry,
        outbound: &Outbound,
        text: &str,
    ) -> Result<(), SessionError> {
        let control = match Control::decode(text) {
            Ok(Some(control)) => control,
            Ok(None) => {
                trace!("Ignoring frame without a known type");
                return Ok(());
            }
            Err(e) => {
                warn!("Malformed control message: {e}");
                let text = format!("Malformed control message: {e}");
                return outbound.send(Message::error(text)).await;
            }
        };

        match control {
            Control::StartRoute { route } => self.on_start_route(registry, outbound, route).await,
            Control::StopRoute { route_id } => match registry.stop(&route_id) {
                Ok(()) => {
                    outbound.send(Message::success(format!("Route {route_id} stopped."))).await
                }
                Err(e) => outbound.send(Message::warn(e.to_string())).await,
            },
            Control::ListRoutes => {
                let ids = registry.list();
                let text = if ids.is_empty() {
                    "No active routes.".to_owned()
                } else {
                    let ids: Vec<String> = ids.iter().map(RouteId::to_string).collect();
                    format!("Active routes: {}.", ids.join(", "))
                };

                outbound.send(Message::info(text)).await
            }
            Control::SetRouteStatus { route_id, status } => {
                match registry.set_status(&route_id, &status) {
                    Ok(snapshot) => {
                        outbound.send(Message::route_status(route_id, snapshot.label)).await
                    }
                    Err(e) => outbound.send(Message::warn(e.to_string())).await,
                }
            }
        }
    }

    async fn on_start_route(
        &mut self,
        registry: &RouteRegistry,
        outbound: &Outbound,
        spec: RouteSpec,
    ) -> Result<(), SessionError> {
        let client_seq = &mut self.client_seq;
        let fallback_id = || {
            *client_seq += 1;
            RouteId::new(format!("client-{client_seq}"))
        };

        match Route::from_spec(spec, self.sim.options.defaults(), fallback_id, &mut self.rng) {
            Ok(route) => start_route(registry, outbound, route).await,
            Err(e @ RouteError::NoHops(_)) => {
                warn!("Route rejected: {e}");
                outbound.send(Message::warn(e.to_string())).await
            }
            Err(e) => {
                warn!("Route rejected: {e}");
                outbound.send(Message::error(format!("Invalid route: {e}"))).await
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sim.stats.decrement_active_sessions();
    }
}

async fn start_route(
    registry: &RouteRegistry,
    outbound: &Outbound,
    route: Route,
) -> Result<(), SessionError> {
    let id = route.id().clone();

    match registry.start(route) {
        Ok(()) => outbound.send(Message::success(format!("Starting route sender {id}."))).await,
        Err(e) => {
            debug!(route_id = %id, "Route not started: {e}");
            outbound.send(Message::warn(e.to_string())).await
        }
    }
}
