use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::{
    injector::RouteInjector, ControlError, Outbound, Route, RouteId, RouteRuntime, SimStats,
    StatusSnapshot,
};

/// The set of routes currently injecting on one session.
///
/// Every active route owns an injector task. Stopping a route, or dropping the last handle to
/// the registry, cancels that task together with every packet it still has in flight.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    routes: Mutex<FxHashMap<RouteId, ActiveRoute>>,
    outbound: Outbound,
    stats: Arc<SimStats>,
    max_in_flight: usize,
}

#[derive(Debug)]
struct ActiveRoute {
    runtime: Arc<RouteRuntime>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveRoute {
    fn shutdown(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl RouteRegistry {
    pub fn new(outbound: Outbound, stats: Arc<SimStats>, max_in_flight: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                routes: Mutex::new(FxHashMap::default()),
                outbound,
                stats,
                max_in_flight: max_in_flight.max(1),
            }),
        }
    }

    /// Starts injecting packets on `route`. The first packet is injected after the route's
    /// start delay.
    pub fn start(&self, route: Route) -> Result<(), ControlError> {
        let mut routes = self.inner.routes.lock();

        if routes.contains_key(route.id()) {
            return Err(ControlError::AlreadyActive(route.id().clone()));
        }

        if route.hops().is_empty() {
            return Err(ControlError::NoHops(route.id().clone()));
        }

        let id = route.id().clone();
        let runtime = Arc::new(RouteRuntime::new(route));
        let cancel = CancellationToken::new();

        let injector = RouteInjector::new(
            Arc::clone(&runtime),
            self.inner.outbound.clone(),
            Arc::clone(&self.inner.stats),
            self.inner.max_in_flight,
            cancel.clone(),
        );

        let task = tokio::spawn(injector.instrument(info_span!("injector", route_id = %id)));

        info!(route_id = %id, hops = runtime.route().hops().len(), "Route started");
        routes.insert(id, ActiveRoute { runtime, cancel, task });

        Ok(())
    }

    /// Stops the route, abandoning its in-flight packets.
    pub fn stop(&self, id: &RouteId) -> Result<(), ControlError> {
        let active =
            self.inner.routes.lock().remove(id).ok_or_else(|| ControlError::NotActive(id.clone()))?;

        active.shutdown();
        info!(route_id = %id, "Route stopped");

        Ok(())
    }

    /// Returns the ids of all active routes, in ascending order.
    pub fn list(&self) -> Vec<RouteId> {
        let mut ids: Vec<RouteId> = self.inner.routes.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_active(&self, id: &RouteId) -> bool {
        self.inner.routes.lock().contains_key(id)
    }

    /// Returns the definition of an active route.
    pub fn route(&self, id: &RouteId) -> Option<Arc<Route>> {
        self.inner.routes.lock().get(id).map(|r| Arc::clone(r.runtime.route()))
    }

    /// Returns the current status of an active route.
    pub fn status(&self, id: &RouteId) -> Option<StatusSnapshot> {
        self.inner.routes.lock().get(id).map(|r| r.runtime.snapshot())
    }

    /// Moves an active route to the status step labelled `label`. Packets injected from now
    /// on carry the new status, packets already in flight keep theirs.
    pub fn set_status(&self, id: &RouteId, label: &str) -> Result<StatusSnapshot, ControlError> {
        let routes = self.inner.routes.lock();
        let active = routes.get(id).ok_or_else(|| ControlError::UnknownRoute(id.clone()))?;

        active.runtime.set_status(label)
    }

    /// Stops every active route.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.inner.routes.lock().drain().collect();
        if !drained.is_empty() {
            debug!(routes = drained.len(), "Stopping all routes");
        }

        for (_, active) in drained {
            active.shutdown();
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for (_, active) in self.routes.get_mut().drain() {
            active.shutdown();
        }
    }
}
