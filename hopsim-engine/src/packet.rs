use hopsim_common::{iso_now, unix_millis};
use hopsim_wire::{Message, Packet, RouteAnnotation, RouteId, MESSAGE_TYPE};

use crate::{Hop, Route, StatusSnapshot};

/// Identity and TTL state of one simulated packet, fixed at injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEnvelope {
    packet_id: String,
    route_id: RouteId,
    ttl_ms: Option<u64>,
}

impl PacketEnvelope {
    /// Creates the envelope of the `seq`-th packet of `route`.
    pub fn new(route: &Route, seq: u64) -> Self {
        Self {
            packet_id: format!("sim-r{}-{}-{seq}", route.id(), unix_millis()),
            route_id: route.id().clone(),
            ttl_ms: route.ttl_ms(),
        }
    }

    pub fn id(&self) -> &str {
        &self.packet_id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    /// The TTL stamped on the hop at `index`.
    ///
    /// A hop override always wins. Otherwise only the first hop carries the route TTL, later
    /// hops carry none and the client keeps counting down what it was last given.
    pub fn ttl_for_hop(&self, index: usize, hop: &Hop) -> Option<u64> {
        hop.ttl_override_ms().or(if index == 0 { self.ttl_ms } else { None })
    }

    /// Builds the message announcing the hop at `index` of `route`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for the route's hops.
    pub fn hop_message(&self, route: &Route, index: usize, status: &StatusSnapshot) -> Message {
        let hop = &route.hops()[index];
        let duration_ms = u64::try_from(hop.duration().as_millis()).unwrap_or(u64::MAX);

        Message::Packet {
            packet: Packet {
                timestamp: iso_now(),
                source_device_id: hop.source().to_owned(),
                target_device_id: hop.target().to_owned(),
                source: hop.source().to_owned(),
                target: hop.target().to_owned(),
                protocol: hop.protocol().to_string(),
                edge_travel_ms: duration_ms,
                duration_ms,
                packet_id: self.packet_id.clone(),
                route_id: Some(self.route_id.clone()),
                ttl_ms: self.ttl_for_hop(index, hop),
                message_type: MESSAGE_TYPE.to_owned(),
                payload: Some(RouteAnnotation {
                    route_id: self.route_id.clone(),
                    route_name: route.name().to_owned(),
                    status: status.label.clone(),
                    status_index: status.index,
                    status_total: status.total,
                    alert: status.alert.clone(),
                }),
            },
        }
    }
}
