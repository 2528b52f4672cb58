//! Hand-off of serviced vehicles

use std::sync::Arc;

use crossway_core::{NodeId, ShutdownSignal, SimClock, SimTime, Vehicle};
use crossway_wire::{EventLogEntry, Message, VehicleTransfer};

use crate::{HubLink, Outlet};

/// Sends exits and transfers through the hub link.
///
/// Road travel runs in its own task so the signal moves straight on to the
/// next vehicle.
#[derive(Debug)]
pub struct Forwarder {
    link: Arc<HubLink>,
    clock: Arc<SimClock>,
    /// Base road travel time, simulated seconds
    road_time: f64,
    shutdown: Arc<ShutdownSignal>,
}

impl Forwarder {
    pub fn new(link: Arc<HubLink>, clock: Arc<SimClock>, road_time: f64, shutdown: Arc<ShutdownSignal>) -> Self {
        Forwarder {
            link,
            clock,
            road_time,
            shutdown,
        }
    }
}

/// EVENT_LOG for a vehicle leaving the network at `node`
pub fn exit_entry(mut vehicle: Vehicle, node: NodeId, at: SimTime) -> EventLogEntry {
    vehicle.left_at = Some(at);
    EventLogEntry::new("VEHICLE_EXIT", at, node)
        .vehicle(vehicle.id.clone())
        .details(format!("dwellingTime={:.2}", vehicle.dwelling_time()))
}

impl Outlet for Forwarder {
    fn report(&self, entry: EventLogEntry) {
        self.link.report(entry);
    }

    fn forward(&self, vehicle: Vehicle, at: SimTime) {
        let crossing = self.link.crossing().clone();
        let travel = self.road_time * vehicle.vehicle_type.factor();

        let Some(transfer) = VehicleTransfer::handoff(&vehicle, crossing.clone(), at + travel) else {
            self.link.report(exit_entry(vehicle, crossing, at));
            return;
        };

        let link = Arc::clone(&self.link);
        let delay = self.clock.to_real(travel);
        let shutdown = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait() => return,
            }
            tracing::debug!(vehicle = %transfer.vehicle_id, to = %transfer.to, "vehicle transfer");
            if let Err(e) = link.send(&Message::VehicleTransfer(transfer)) {
                tracing::warn!(error = %e, "vehicle transfer lost");
            }
        });
    }
}
