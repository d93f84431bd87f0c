use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::{Message, Outbound, RouteId, RouteRegistry, SessionError};

/// Walks the preset routes through their status steps, one step per period.
///
/// Routes started by the peer are left alone: their status only changes on `setRouteStatus`.
#[derive(Debug)]
pub(crate) struct StatusCycler {
    period: Duration,
    /// Routes this cycler may advance.
    presets: Vec<RouteId>,
    /// Next step index per route.
    cursors: FxHashMap<RouteId, usize>,
}

impl StatusCycler {
    pub(crate) fn new(period: Duration, presets: Vec<RouteId>) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            presets,
            cursors: FxHashMap::default(),
        }
    }

    pub(crate) async fn run(
        mut self,
        registry: RouteRegistry,
        outbound: Outbound,
    ) -> Result<(), SessionError> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let mut active = registry.list();
            active.retain(|id| self.presets.contains(id));
            self.cursors.retain(|id, _| active.contains(id));

            for route_id in active {
                let Some(label) = self.advance(&registry, &route_id) else { continue };

                match registry.set_status(&route_id, &label) {
                    Ok(snapshot) => {
                        outbound.send(Message::route_status(route_id, snapshot.label)).await?;
                    }
                    // The route was stopped in between.
                    Err(e) => trace!(%route_id, "Skipping status step: {e}"),
                }
            }
        }
    }

    /// Returns the label of the route's next step and moves its cursor forward.
    fn advance(&mut self, registry: &RouteRegistry, route_id: &RouteId) -> Option<String> {
        let route = registry.route(route_id)?;
        let steps = route.status_steps();
        if steps.is_empty() {
            return None;
        }

        let cursor = self.cursors.entry(route_id.clone()).or_default();
        let label = steps[*cursor % steps.len()].label().to_owned();
        *cursor = (*cursor + 1) % steps.len();

        Some(label)
    }
}
