use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    task::JoinError,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, error, trace, warn};

use hopsim_common::JoinMap;

use crate::{Outbound, PacketEnvelope, Route, RouteRuntime, SessionError, SimStats, StatusSnapshot};

type Traversal = Result<(), SessionError>;

/// Drives packet injection for one active route.
///
/// On every tick a new packet is spawned as an independent traversal task, unless the route
/// already has `max_in_flight` packets traversing, in which case the tick is skipped. Ticks are
/// never queued. The injector resolves once its cancellation token fires, aborting every
/// traversal still in flight.
pub(crate) struct RouteInjector {
    runtime: Arc<RouteRuntime>,
    outbound: Outbound,
    stats: Arc<SimStats>,
    max_in_flight: usize,
    /// Resolves when the route is stopped.
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    ticker: Interval,
    /// In-flight traversals, keyed by packet id.
    in_flight: JoinMap<String, Traversal>,
    /// Sequence number of the last injected packet.
    seq: u64,
}

impl RouteInjector {
    pub(crate) fn new(
        runtime: Arc<RouteRuntime>,
        outbound: Outbound,
        stats: Arc<SimStats>,
        max_in_flight: usize,
        cancel: CancellationToken,
    ) -> Self {
        let route = runtime.route();
        let period = route.period().max(Duration::from_millis(1));

        let mut ticker = tokio::time::interval_at(Instant::now() + route.start_delay(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            runtime,
            outbound,
            stats,
            max_in_flight: max_in_flight.max(1),
            cancelled: Box::pin(cancel.cancelled_owned()),
            ticker,
            in_flight: JoinMap::new(),
            seq: 0,
        }
    }

    fn on_tick(&mut self) {
        if self.in_flight.len() >= self.max_in_flight {
            trace!(in_flight = self.in_flight.len(), "In-flight limit reached, skipping tick");
            self.stats.increment_skipped_ticks();
            return;
        }

        self.seq += 1;

        let route = Arc::clone(self.runtime.route());
        let packet = PacketEnvelope::new(&route, self.seq);
        let status = self.runtime.snapshot();
        let packet_id = packet.id().to_owned();

        debug!(%packet_id, status = %status.label, "Injecting packet");

        let outbound = self.outbound.clone();
        let stats = Arc::clone(&self.stats);
        let spawned = self.in_flight.spawn(packet_id.clone(), {
            let packet_id = packet_id.clone();
            async move {
                let result = traverse(route, packet, status, outbound, stats).await;
                (packet_id, result)
            }
        });

        if spawned {
            self.stats.increment_packets_injected();
        } else {
            warn!(%packet_id, "Packet id already in flight, skipping injection");
        }
    }

    fn on_traversal_done(&self, result: Result<(String, Traversal), JoinError>) {
        match result {
            Ok((packet_id, Ok(()))) => trace!(%packet_id, "Packet reached the end of the route"),
            Ok((packet_id, Err(e))) => {
                self.stats.increment_failed_traversals();
                warn!(%packet_id, "Packet traversal aborted: {e}");
            }
            Err(e) if e.is_cancelled() => trace!("Packet traversal cancelled"),
            Err(e) => {
                self.stats.increment_failed_traversals();
                error!("Packet traversal panicked: {:?}", e);
            }
        }
    }
}

impl Future for RouteInjector {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if this.cancelled.as_mut().poll(cx).is_ready() {
                let in_flight = this.in_flight.len();
                debug!(in_flight, "Route stopped, abandoning in-flight packets");
                this.in_flight.abort_all();
                return Poll::Ready(());
            }

            if let Poll::Ready(Some(result)) = this.in_flight.poll_join_next(cx) {
                this.on_traversal_done(result);
                continue;
            }

            if this.ticker.poll_tick(cx).is_ready() {
                this.on_tick();
                continue;
            }

            return Poll::Pending;
        }
    }
}

/// Emits one message per hop, waiting the overlap-adjusted hop duration after each.
async fn traverse(
    route: Arc<Route>,
    packet: PacketEnvelope,
    status: StatusSnapshot,
    outbound: Outbound,
    stats: Arc<SimStats>,
) -> Result<(), SessionError> {
    for (index, hop) in route.hops().iter().enumerate() {
        outbound.send(packet.hop_message(&route, index, &status)).await?;
        stats.increment_hop_messages();

        tokio::time::sleep(route.hop_delay(hop)).await;
    }

    Ok(())
}
