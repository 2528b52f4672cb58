//! Intersection process
//!
//! Tasks per process:
//! - one signal cycle per configured direction
//! - a pedestrian cycle where configured
//! - the hub reader (POLICY, STOP, VehicleArrival, phase grants)
//! - an inbound listener for direct VehicleArrival connections
//! - the telemetry emitter

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crossway_core::{
    CrosswayResult, Direction, NodeId, ShutdownSignal, SimClock,
};
use crossway_transport::{split, LineReader};
use crossway_wire::{AckStatus, EventLogEntry, Message, TelemetryPayload, VehicleTransfer};

use crate::{
    CrossingConfig, CycleContext, Forwarder, HubLink, Outlet, PedestrianCycle, PolicyCell,
    SignalBoard, SignalCycle, VehicleQueue,
};

pub struct Crossing {
    config: CrossingConfig,
    queues: Vec<(Direction, Arc<VehicleQueue>)>,
    board: Arc<SignalBoard>,
    policy: PolicyCell,
    clock: Arc<SimClock>,
    shutdown: Arc<ShutdownSignal>,
}

impl Crossing {
    pub fn new(config: CrossingConfig) -> Arc<Self> {
        let queues = config
            .directions
            .iter()
            .filter(|d| d.index().is_some())
            .map(|d| (*d, Arc::new(VehicleQueue::new())))
            .collect();

        Arc::new(Crossing {
            clock: Arc::new(SimClock::new(config.time_scale)),
            config,
            queues,
            board: Arc::new(SignalBoard::new()),
            policy: PolicyCell::new(),
            shutdown: Arc::new(ShutdownSignal::new()),
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.config.id
    }

    pub fn config(&self) -> &CrossingConfig {
        &self.config
    }

    pub fn queue(&self, direction: Direction) -> Option<&Arc<VehicleQueue>> {
        self.queues.iter().find(|(d, _)| *d == direction).map(|(_, q)| q)
    }

    pub fn board(&self) -> &SignalBoard {
        &self.board
    }

    pub fn policy(&self) -> &PolicyCell {
        &self.policy
    }

    pub fn shutdown_signal(&self) -> &Arc<ShutdownSignal> {
        &self.shutdown
    }

    /// Queue an arriving vehicle on its approach. None if no queue can take
    /// it or its path index is out of range.
    pub fn admit<O: Outlet>(&self, transfer: VehicleTransfer, outlet: &O) -> Option<Direction> {
        if transfer.index >= transfer.path.len() {
            tracing::warn!(
                crossing = %self.config.id,
                vehicle = %transfer.vehicle_id,
                index = transfer.index,
                "arrival index outside its path, dropped"
            );
            return None;
        }
        let from = transfer.from.clone();
        let (mut direction, mapped) = self.config.approaches.resolve(&from);
        if !mapped {
            tracing::warn!(crossing = %self.config.id, %from, fallback = %direction, "unmapped approach");
        }
        if self.queue(direction).is_none() {
            direction = self.queues.first()?.0;
        }
        let queue = self.queue(direction)?;

        let vehicle = transfer.into_vehicle();
        outlet.report(
            EventLogEntry::new("VEHICLE_ARRIVAL", self.clock.now(), self.config.id.clone())
                .vehicle(vehicle.id.clone())
                .details(format!("from={from}, dir={direction}")),
        );
        queue.enqueue(vehicle);
        Some(direction)
    }

    /// Sample every queue and summarize the signal state
    pub fn telemetry(&self) -> TelemetryPayload {
        let mut total = 0;
        let mut averages = 0.0;
        for (_, queue) in &self.queues {
            queue.sample();
            total += queue.len();
            averages += queue.average_size();
        }
        let avg = if self.queues.is_empty() {
            0.0
        } else {
            averages / self.queues.len() as f64
        };

        TelemetryPayload {
            crossing: self.config.id.clone(),
            queue: total as u32,
            avg,
            light_state: self.board.light_state(),
            pedestrian: self.board.pedestrian(),
            direction_green: self.board.direction_green(),
        }
    }

    pub async fn bind(&self) -> CrosswayResult<TcpListener> {
        Ok(TcpListener::bind(&self.config.listen_addr).await?)
    }

    pub async fn run(self: Arc<Self>) -> CrosswayResult<()> {
        let listener = self.bind().await?;
        self.run_with(listener).await
    }

    /// Connect to the hub and run every task until shutdown
    pub async fn run_with(self: Arc<Self>, listener: TcpListener) -> CrosswayResult<()> {
        let config = &self.config;
        let (link, reader, writer_task) = HubLink::connect(
            config.id.clone(),
            &config.hub_addr,
            &config.retry,
            Arc::clone(&self.shutdown),
        )
        .await?;
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&link),
            Arc::clone(&self.clock),
            config.road_time,
            Arc::clone(&self.shutdown),
        ));

        let ctx = CycleContext {
            crossing: config.id.clone(),
            control: Arc::clone(&link),
            outlet: Arc::clone(&forwarder),
            clock: Arc::clone(&self.clock),
            board: Arc::clone(&self.board),
            policy: self.policy.clone(),
            shutdown: Arc::clone(&self.shutdown),
            policy_poll: config.policy_poll,
        };

        let mut tasks = vec![
            tokio::spawn(Arc::clone(&self).hub_reader(reader, Arc::clone(&link), Arc::clone(&forwarder))),
            tokio::spawn(Arc::clone(&self).accept_loop(listener, Arc::clone(&forwarder))),
            tokio::spawn(Arc::clone(&self).telemetry_loop(Arc::clone(&link))),
        ];
        for (direction, queue) in &self.queues {
            let cycle = SignalCycle::new(ctx.clone(), *direction, Arc::clone(queue), config.service_time);
            tasks.push(tokio::spawn(cycle.run()));
        }
        if let Some(pedestrian) = &config.pedestrian {
            tasks.push(tokio::spawn(PedestrianCycle::new(ctx.clone(), pedestrian.clone()).run()));
        }
        tracing::info!(crossing = %config.id, directions = self.queues.len(), pedestrian = config.pedestrian.is_some(), "crossing running");

        self.shutdown.wait().await;

        for (_, queue) in &self.queues {
            queue.close();
        }
        for task in tasks {
            let _ = task.await;
        }
        link.close();
        let _ = writer_task.await;
        tracing::info!(crossing = %config.id, "crossing stopped");
        Ok(())
    }

    async fn hub_reader(self: Arc<Self>, mut reader: LineReader, link: Arc<HubLink>, outlet: Arc<Forwarder>) {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.wait() => break,
                next = reader.next_message() => next,
            };
            match next {
                Ok(Some(Ok(message))) => self.on_hub_message(message, &link, outlet.as_ref()),
                Ok(Some(Err(e))) => tracing::warn!(crossing = %self.config.id, error = %e, "bad line from hub"),
                Ok(None) => {
                    tracing::warn!(crossing = %self.config.id, "hub closed the link");
                    self.shutdown.trigger();
                    break;
                }
                Err(e) => {
                    tracing::warn!(crossing = %self.config.id, error = %e, "hub link failed");
                    self.shutdown.trigger();
                    break;
                }
            }
        }
        link.fail_pending();
    }

    fn on_hub_message<O: Outlet>(&self, message: Message, link: &HubLink, outlet: &O) {
        match message {
            Message::Policy(json) => match Message::decode_policy(&json) {
                Ok(policy) => {
                    tracing::info!(crossing = %self.config.id, ?policy, "policy updated");
                    self.policy.set(policy);
                }
                Err(e) => tracing::warn!(error = %e, "unusable policy ignored"),
            },
            Message::Stop(reason) => {
                tracing::info!(crossing = %self.config.id, %reason, "stop received");
                self.shutdown.trigger();
            }
            Message::VehicleArrival(transfer) => {
                self.admit(transfer, outlet);
            }
            Message::Ok(ack) if ack.status == AckStatus::PhaseGranted => {
                link.grant_received(&ack);
            }
            Message::Ok(ack) => tracing::trace!(status = ?ack.status, "ack"),
            Message::Error(reason) => tracing::warn!(crossing = %self.config.id, ?reason, "hub error"),
            other => tracing::debug!(kind = other.kind(), "ignored hub message"),
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, outlet: Arc<Forwarder>) {
        tracing::info!(crossing = %self.config.id, addr = ?listener.local_addr().ok(), "listening for arrivals");
        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "arrival connection");
                        tokio::spawn(Arc::clone(&self).peer_session(stream, Arc::clone(&outlet)));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }
    }

    async fn peer_session(self: Arc<Self>, stream: TcpStream, outlet: Arc<Forwarder>) {
        let (mut reader, _writer) = split(stream);
        loop {
            let next = tokio::select! {
                _ = self.shutdown.wait() => break,
                next = reader.next_message() => next,
            };
            match next {
                Ok(Some(Ok(Message::VehicleArrival(transfer)))) => {
                    self.admit(transfer, outlet.as_ref());
                }
                Ok(Some(Ok(other))) => tracing::debug!(kind = other.kind(), "ignored peer message"),
                Ok(Some(Err(e))) => tracing::warn!(error = %e, "bad line from peer"),
                Ok(None) | Err(_) => break,
            }
        }
    }

    async fn telemetry_loop(self: Arc<Self>, link: Arc<HubLink>) {
        let mut ticker = tokio::time::interval(self.config.telemetry_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = ticker.tick() => {
                    if link.send(&Message::Telemetry(self.telemetry())).is_err() {
                        break;
                    }
                }
            }
        }
    }
}
