//! Seams between the signal cycles and the rest of the process

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crossway_core::{
    CrosswayError, CrosswayResult, Direction, NodeId, ShutdownSignal, SimClock, SimTime, Vehicle,
};
use crossway_wire::EventLogEntry;

use crate::{PolicyCell, SignalBoard};

/// Right-of-way for one intersection
pub trait PhaseControl: Send + Sync + 'static {
    /// Resolve once `direction` holds right-of-way. `Interrupted` on shutdown.
    fn request_green(&self, direction: Direction) -> impl Future<Output = CrosswayResult<()>> + Send;

    fn release_green(&self, direction: Direction) -> impl Future<Output = CrosswayResult<()>> + Send;
}

/// Where cycle events and serviced vehicles go
pub trait Outlet: Send + Sync + 'static {
    fn report(&self, entry: EventLogEntry);

    /// Hand a vehicle that just cleared the junction at `at` onwards
    fn forward(&self, vehicle: Vehicle, at: SimTime);
}

/// State shared by every cycle of one intersection
pub struct CycleContext<P, O> {
    pub crossing: NodeId,
    pub control: Arc<P>,
    pub outlet: Arc<O>,
    pub clock: Arc<SimClock>,
    pub board: Arc<SignalBoard>,
    pub policy: PolicyCell,
    pub shutdown: Arc<ShutdownSignal>,
    pub policy_poll: Duration,
}

impl<P, O> Clone for CycleContext<P, O> {
    fn clone(&self) -> Self {
        CycleContext {
            crossing: self.crossing.clone(),
            control: Arc::clone(&self.control),
            outlet: Arc::clone(&self.outlet),
            clock: Arc::clone(&self.clock),
            board: Arc::clone(&self.board),
            policy: self.policy.clone(),
            shutdown: Arc::clone(&self.shutdown),
            policy_poll: self.policy_poll,
        }
    }
}

impl<P: PhaseControl, O: Outlet> CycleContext<P, O> {
    /// Spend `secs` of simulated time, scaled to real time
    pub async fn pause(&self, secs: f64) -> CrosswayResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(self.clock.to_real(secs)) => {}
            _ = self.shutdown.wait() => return Err(CrosswayError::Interrupted),
        }
        self.clock.advance(secs);
        Ok(())
    }

    /// Real-time sleep that yields to shutdown
    pub async fn idle(&self, period: Duration) -> CrosswayResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(period) => Ok(()),
            _ = self.shutdown.wait() => Err(CrosswayError::Interrupted),
        }
    }

    pub fn report(&self, kind: &str, details: String) {
        self.outlet.report(
            EventLogEntry::new(kind, self.clock.now(), self.crossing.clone()).details(details),
        );
    }
}
