//! Per-direction signal cycle
//!
//! WaitVehicle -> RequestPhase -> MinGreen -> Extension -> Yellow ->
//! Clearance -> ReleasePhase, strictly in that order, one vehicle at a time.

use std::sync::Arc;

use crossway_core::{CrosswayError, CrosswayResult, Direction, LightColor, Policy, Vehicle};

use crate::{CycleContext, Outlet, PhaseControl, VehicleQueue};

/// What one green phase achieved
#[derive(Clone, Debug, PartialEq)]
pub struct GreenSummary {
    pub serviced: u32,
    pub extensions: u32,
    /// Simulated seconds from grant to the end of servicing
    pub duration: f64,
}

pub struct SignalCycle<P, O> {
    ctx: CycleContext<P, O>,
    direction: Direction,
    queue: Arc<VehicleQueue>,
    /// Base service time per vehicle, simulated seconds
    service_time: f64,
}

impl<P: PhaseControl, O: Outlet> SignalCycle<P, O> {
    pub fn new(
        ctx: CycleContext<P, O>,
        direction: Direction,
        queue: Arc<VehicleQueue>,
        service_time: f64,
    ) -> Self {
        SignalCycle {
            ctx,
            direction,
            queue,
            service_time,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Run cycles until shutdown or a lost hub link
    pub async fn run(self) {
        tracing::debug!(crossing = %self.ctx.crossing, direction = %self.direction, "signal cycle started");
        loop {
            match self.run_once().await {
                Ok(summary) => tracing::trace!(direction = %self.direction, ?summary, "green phase done"),
                Err(e) if e.is_interrupted() => break,
                Err(e) => {
                    tracing::error!(crossing = %self.ctx.crossing, direction = %self.direction, error = %e, "signal cycle stopped");
                    break;
                }
            }
        }
        self.ctx.board.set_active(self.direction, false);
        self.ctx.board.set_light(self.direction, LightColor::Red);
    }

    /// One full cycle, starting from an idle approach
    pub async fn run_once(&self) -> CrosswayResult<GreenSummary> {
        let ctx = &self.ctx;

        // Vehicles stay queued until the phase is granted
        let waiting = tokio::select! {
            ready = self.queue.ready() => ready,
            _ = ctx.shutdown.wait() => false,
        };
        if !waiting {
            return Err(CrosswayError::Interrupted);
        }

        let policy = ctx
            .policy
            .wait_ready(ctx.policy_poll, &ctx.shutdown)
            .await
            .ok_or(CrosswayError::Interrupted)?;

        ctx.control.request_green(self.direction).await?;
        // This cycle is the queue's only consumer
        let Some(first) = self.queue.try_poll() else {
            ctx.control.release_green(self.direction).await?;
            return Err(CrosswayError::Interrupted);
        };
        ctx.board.set_active(self.direction, true);
        ctx.board.set_light(self.direction, LightColor::Green);
        let green_start = ctx.clock.now();
        ctx.report("GREEN_START", format!("direction={}", self.direction));

        let summary = self.serve(first, &policy, green_start).await?;

        ctx.board.set_light(self.direction, LightColor::Yellow);
        ctx.report("YELLOW", format!("direction={}", self.direction));
        ctx.pause(f64::from(policy.yellow)).await?;

        ctx.board.set_light(self.direction, LightColor::Red);
        ctx.report("CLEARANCE", format!("direction={}", self.direction));
        ctx.pause(f64::from(policy.clearance)).await?;

        ctx.control.release_green(self.direction).await?;
        ctx.board.set_active(self.direction, false);
        ctx.report(
            "GREEN_END",
            format!("direction={}, duration={:.2}", self.direction, summary.duration),
        );

        Ok(summary)
    }

    /// MinGreen then Extension
    async fn serve(
        &self,
        first: Vehicle,
        policy: &Policy,
        green_start: crossway_core::SimTime,
    ) -> CrosswayResult<GreenSummary> {
        let clock = &self.ctx.clock;
        let elapsed = || clock.now() - green_start;

        self.service(first).await?;
        let mut serviced = 1;

        while elapsed() < f64::from(policy.min_green) {
            let Some(vehicle) = self.queue.try_poll() else { break };
            self.service(vehicle).await?;
            serviced += 1;
        }

        let mut extensions = 0;
        while self.queue.len() >= policy.queue_threshold as usize
            && extensions < policy.max_extensions
            && elapsed() < f64::from(policy.max_green)
        {
            let Some(vehicle) = self.queue.try_poll() else { break };
            self.service(vehicle).await?;
            extensions += 1;
        }

        Ok(GreenSummary {
            serviced: serviced + extensions,
            extensions,
            duration: elapsed(),
        })
    }

    async fn service(&self, vehicle: Vehicle) -> CrosswayResult<()> {
        self.ctx
            .pause(self.service_time * vehicle.vehicle_type.factor())
            .await?;
        self.ctx.outlet.forward(vehicle, self.ctx.clock.now());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{PolicyCell, SignalBoard};
    use crossway_core::{NodeId, ShutdownSignal, SimClock, SimTime, VehicleType};
    use crossway_wire::EventLogEntry;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Grants immediately and records every call
    #[derive(Default)]
    pub(crate) struct RecordingControl {
        pub calls: Mutex<Vec<(&'static str, Direction)>>,
    }

    impl PhaseControl for RecordingControl {
        async fn request_green(&self, direction: Direction) -> CrosswayResult<()> {
            self.calls.lock().push(("request", direction));
            Ok(())
        }

        async fn release_green(&self, direction: Direction) -> CrosswayResult<()> {
            self.calls.lock().push(("release", direction));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingOutlet {
        pub events: Mutex<Vec<EventLogEntry>>,
        pub forwarded: Mutex<Vec<(Vehicle, SimTime)>>,
    }

    impl RecordingOutlet {
        pub fn kinds(&self) -> Vec<String> {
            self.events.lock().iter().map(|e| e.kind.clone()).collect()
        }
    }

    impl Outlet for RecordingOutlet {
        fn report(&self, entry: EventLogEntry) {
            self.events.lock().push(entry);
        }

        fn forward(&self, vehicle: Vehicle, at: SimTime) {
            self.forwarded.lock().push((vehicle, at));
        }
    }

    pub(crate) fn context(policy: Option<Policy>) -> CycleContext<RecordingControl, RecordingOutlet> {
        let cell = PolicyCell::new();
        if let Some(policy) = policy {
            cell.set(policy);
        }
        CycleContext {
            crossing: NodeId::from("Cr1"),
            control: Arc::default(),
            outlet: Arc::default(),
            // Fast enough for tests: 1 simulated second = 1 real ms
            clock: Arc::new(SimClock::new(0.001)),
            board: Arc::default(),
            policy: cell,
            shutdown: Arc::new(ShutdownSignal::new()),
            policy_poll: Duration::from_millis(5),
        }
    }

    fn car(id: usize) -> Vehicle {
        Vehicle::new(format!("V{id}"), VehicleType::Car, vec![NodeId::from("Cr1"), NodeId::from("S")])
    }

    fn queue_of(n: usize) -> Arc<VehicleQueue> {
        let queue = Arc::new(VehicleQueue::new());
        for i in 0..n {
            queue.enqueue(car(i));
        }
        queue
    }

    #[tokio::test]
    async fn test_min_green_services_until_elapsed() {
        let policy = Policy {
            min_green: 5,
            queue_threshold: 100,
            ..Policy::hybrid()
        };
        let ctx = context(Some(policy));
        let queue = queue_of(10);
        let cycle = SignalCycle::new(ctx.clone(), Direction::North, Arc::clone(&queue), 2.0);

        let summary = timeout(Duration::from_secs(2), cycle.run_once()).await.unwrap().unwrap();

        // 2 + 2 + 2 >= 5: three vehicles before yellow
        assert_eq!(summary.serviced, 3);
        assert_eq!(summary.extensions, 0);
        assert_eq!(queue.len(), 7);
        assert_eq!(ctx.outlet.forwarded.lock().len(), 3);
        assert_eq!(ctx.outlet.kinds(), ["GREEN_START", "YELLOW", "CLEARANCE", "GREEN_END"]);
        assert_eq!(
            *ctx.control.calls.lock(),
            [("request", Direction::North), ("release", Direction::North)]
        );
        assert!(!ctx.board.any_green());
    }

    #[tokio::test]
    async fn test_extensions_follow_queue_pressure() {
        let policy = Policy {
            min_green: 1,
            max_green: 100,
            queue_threshold: 3,
            max_extensions: 4,
            ..Policy::hybrid()
        };
        let ctx = context(Some(policy));
        let queue = queue_of(6);
        let cycle = SignalCycle::new(ctx.clone(), Direction::East, Arc::clone(&queue), 1.5);

        let summary = timeout(Duration::from_secs(2), cycle.run_once()).await.unwrap().unwrap();

        // first vehicle covers min green; then 5, 4, 3 waiting allow three extensions
        assert_eq!(summary.extensions, 3);
        assert_eq!(summary.serviced, 4);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_extensions_capped_by_max_green() {
        let policy = Policy {
            min_green: 0,
            max_green: 3,
            queue_threshold: 1,
            max_extensions: 50,
            ..Policy::hybrid()
        };
        let ctx = context(Some(policy));
        let queue = queue_of(20);
        let cycle = SignalCycle::new(ctx, Direction::South, queue, 1.0);

        let summary = timeout(Duration::from_secs(2), cycle.run_once()).await.unwrap().unwrap();
        assert_eq!(summary.serviced, 3);
        assert!(summary.duration >= 3.0);
    }

    #[tokio::test]
    async fn test_parks_without_policy() {
        let ctx = context(None);
        let queue = queue_of(1);
        let cycle = Arc::new(SignalCycle::new(ctx.clone(), Direction::West, queue, 1.0));

        let running = {
            let cycle = Arc::clone(&cycle);
            tokio::spawn(async move { cycle.run_once().await })
        };
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!running.is_finished());
        assert!(ctx.control.calls.lock().is_empty());
        assert_eq!(cycle.queue.len(), 1);

        ctx.policy.set(Policy::hybrid());
        let summary = timeout(Duration::from_secs(2), running).await.unwrap().unwrap().unwrap();
        assert_eq!(summary.serviced, 1);
    }

    #[tokio::test]
    async fn test_shutdown_while_parked_keeps_vehicle() {
        let ctx = context(None);
        let queue = queue_of(2);
        let cycle = SignalCycle::new(ctx.clone(), Direction::North, Arc::clone(&queue), 1.0);

        let running = tokio::spawn(cycle.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.len(), 2);

        ctx.shutdown.trigger();
        timeout(Duration::from_secs(1), running).await.unwrap().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().dequeued, 0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_idle_cycle() {
        let ctx = context(Some(Policy::hybrid()));
        let cycle = SignalCycle::new(ctx.clone(), Direction::North, Arc::new(VehicleQueue::new()), 1.0);

        let running = tokio::spawn(cycle.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.shutdown.trigger();
        timeout(Duration::from_secs(1), running).await.unwrap().unwrap();
    }
}
