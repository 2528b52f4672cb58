//! One session per accepted connection
//!
//! The session reads lines, stamps and records each message, then replies on
//! the connection's writer task. Phase requests wait in their own task so a
//! blocked request never stalls the releases arriving on the same link.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crossway_core::{CausalEvent, CrosswayError, Direction, NodeId, Stamp};
use crossway_transport::{split, start_writer, LinkSender};
use crossway_wire::{
    decode_line, Ack, AckStatus, ErrorReason, HistoryData, Message, PhaseRequest,
};

use crate::{ConnId, Hub};

type Held = Arc<Mutex<Vec<(NodeId, Direction)>>>;

pub(crate) struct Session {
    hub: Arc<Hub>,
    conn: ConnId,
    /// Id announced by REGISTER
    node: Option<NodeId>,
    /// Phases granted over this connection and not yet released
    held: Held,
    pending: Vec<JoinHandle<()>>,
}

impl Session {
    pub(crate) fn new(hub: Arc<Hub>, conn: ConnId) -> Self {
        Session {
            hub,
            conn,
            node: None,
            held: Arc::default(),
            pending: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self, stream: TcpStream) {
        let (mut reader, writer) = split(stream);
        let peer = reader.peer_addr();
        let (link, writer_task) = start_writer(writer);
        let hub = Arc::clone(&self.hub);

        loop {
            tokio::select! {
                _ = hub.shutdown_signal().wait() => break,
                _ = link.closed() => {
                    tracing::debug!(conn = self.conn, "link closed by hub");
                    break;
                }
                line = reader.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line, &link),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(conn = self.conn, ?peer, error = %e, "read failed");
                        break;
                    }
                },
            }
        }

        self.finish(link, writer_task).await;
    }

    fn handle_line(&mut self, line: &str, link: &LinkSender) {
        match decode_line(line) {
            Ok(message) => self.dispatch(message, link),
            Err(CrosswayError::UnknownMessageType(kind)) => {
                tracing::warn!(conn = self.conn, %kind, "unknown message type");
                self.hub.record_raw(line);
                reply(link, Message::Error(ErrorReason::UnknownType));
            }
            Err(e) => {
                tracing::warn!(conn = self.conn, error = %e, "malformed line skipped");
                self.hub.record_raw(line);
            }
        }
    }

    fn origin(&self) -> &str {
        self.node.as_ref().map(NodeId::as_str).unwrap_or("UNREGISTERED")
    }

    fn dispatch(&mut self, message: Message, link: &LinkSender) {
        let hub = Arc::clone(&self.hub);
        let kind = message.kind();

        match message {
            Message::Register(request) => {
                // Registration sits outside the causal order
                hub.record(
                    CausalEvent::new(Stamp::Raw, kind, request.node_id.as_str())
                        .with_details(request.role.as_str()),
                );
                hub.register(request.node_id.clone(), request.role, self.conn, link.clone());
                self.node = Some(request.node_id);
                reply(link, Message::Ok(Ack::new(AckStatus::RegisterOk)));
            }

            Message::Telemetry(telemetry) => {
                let details = serde_json::to_string(&telemetry).unwrap_or_default();
                hub.record(hub.stamp(kind, telemetry.crossing.as_str()).with_details(details));
                hub.broadcast_to_dashboards(&Message::TelemetryUpdate(telemetry));
                reply(link, Message::Ok(Ack::new(AckStatus::TelemetryOk)));
            }

            Message::EventLog(entry) => {
                hub.record(
                    hub.stamp(&entry.kind, entry.node.as_str())
                        .with_vehicle(entry.vehicle_id)
                        .with_details(entry.details)
                        .at(entry.sim_time),
                );
                reply(link, Message::Ok(Ack::new(AckStatus::EventLogOk)));
            }

            Message::TrafficStats(stats) => {
                let details = serde_json::to_string(&stats).unwrap_or_default();
                hub.record(hub.stamp(kind, self.origin()).with_details(details));
                hub.broadcast_to_dashboards(&Message::TrafficStatsUpdate(stats));
                reply(link, Message::Ok(Ack::new(AckStatus::TrafficStatsOk)));
            }

            Message::PolicyUpdate => {
                hub.record(hub.stamp(kind, self.origin()));
                match Message::policy(&hub.policy().current()) {
                    Ok(policy) => reply(link, policy),
                    Err(e) => tracing::error!(error = %e, "policy encode failed"),
                }
            }

            Message::VehicleTransfer(transfer) => {
                hub.record(
                    hub.stamp(kind, transfer.from.as_str())
                        .with_vehicle(Some(transfer.vehicle_id.clone()))
                        .with_details(format!("{} -> {}", transfer.from, transfer.to))
                        .at(transfer.time),
                );
                let to = transfer.to.clone();
                let vehicle = transfer.vehicle_id.clone();
                let status = if hub.route_to(&to, &Message::VehicleArrival(transfer)) {
                    AckStatus::VehicleTransferOk
                } else {
                    tracing::warn!(%vehicle, %to, "transfer destination not registered");
                    AckStatus::NodeNotFound
                };
                reply(link, Message::Ok(Ack::new(status)));
            }

            Message::PhaseRequest(request) => {
                let event = match request.timestamp {
                    Some(received) => hub.stamp_received(kind, request.crossing.as_str(), received),
                    None => hub.stamp(kind, request.crossing.as_str()),
                };
                hub.record(event.with_details(request.direction.as_str()));
                self.spawn_grant(request, link.clone());
            }

            Message::PhaseRelease(request) => {
                hub.record(
                    hub.stamp(kind, request.crossing.as_str())
                        .with_details(request.direction.as_str()),
                );
                hub.arbiter().release_green(&request.crossing, request.direction);
                self.held
                    .lock()
                    .retain(|(c, d)| !(c == &request.crossing && *d == request.direction));
                reply(link, Message::Ok(Ack::phase(AckStatus::PhaseReleased, &request)));
            }

            Message::RequestHistory(vehicle_id) => {
                hub.record(hub.stamp(kind, self.origin()).with_details(vehicle_id.as_str()));
                let events = hub.history(&vehicle_id);
                reply(link, Message::HistoryData(HistoryData { vehicle_id, events }));
            }

            other => {
                tracing::warn!(conn = self.conn, kind = other.kind(), "unexpected message for hub");
                reply(link, Message::Error(ErrorReason::UnknownType));
            }
        }
    }

    fn spawn_grant(&mut self, request: PhaseRequest, link: LinkSender) {
        let hub = Arc::clone(&self.hub);
        let held = Arc::clone(&self.held);

        self.pending.retain(|task| !task.is_finished());
        self.pending.push(tokio::spawn(async move {
            tokio::select! {
                _ = hub.arbiter().request_green(&request.crossing, request.direction) => {}
                _ = hub.shutdown_signal().wait() => return,
            }
            held.lock().push((request.crossing.clone(), request.direction));

            let granted = Message::Ok(Ack::phase(AckStatus::PhaseGranted, &request));
            if link.send(&granted).is_err() {
                tracing::debug!(crossing = %request.crossing, direction = %request.direction, "grant undeliverable");
                hub.arbiter().release_green(&request.crossing, request.direction);
                held.lock()
                    .retain(|(c, d)| !(c == &request.crossing && *d == request.direction));
            }
        }));
    }

    async fn finish(self, link: LinkSender, writer_task: JoinHandle<()>) {
        for task in &self.pending {
            task.abort();
        }
        for task in self.pending {
            let _ = task.await;
        }

        let gone = self.hub.registry().remove_connection(self.conn);

        let held = std::mem::take(&mut *self.held.lock());
        for (crossing, direction) in held {
            tracing::warn!(%crossing, %direction, "releasing phase held by closed connection");
            self.hub.arbiter().release_green(&crossing, direction);
        }

        link.close();
        let _ = writer_task.await;
        tracing::info!(conn = self.conn, nodes = ?gone, "session closed");
    }
}

fn reply(link: &LinkSender, message: Message) {
    if let Err(e) = link.send(&message) {
        tracing::debug!(kind = message.kind(), error = %e, "reply dropped");
    }
}
