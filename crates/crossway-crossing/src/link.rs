//! Connection from an intersection to the hub
//!
//! Phase requests from every direction share this one link. Each direction
//! has at most one request outstanding; the hub's grant ack names the
//! direction, which completes the matching waiter.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crossway_core::{
    CrosswayError, CrosswayResult, Direction, LamportClock, NodeId, NodeRole, ShutdownSignal,
};
use crossway_transport::{connect_with_retry, split, start_writer, LineReader, LinkSender, RetryPolicy};
use crossway_wire::{Ack, AckStatus, EventLogEntry, Message, PhaseRequest, RegisterRequest};

use crate::PhaseControl;

#[derive(Debug)]
pub struct HubLink {
    crossing: NodeId,
    link: LinkSender,
    lamport: LamportClock,
    grants: Mutex<HashMap<Direction, oneshot::Sender<()>>>,
    shutdown: Arc<ShutdownSignal>,
}

impl HubLink {
    /// Connect, register as a crossing and ask for the current policy.
    /// Returns the reading half for the caller's dispatch loop.
    pub async fn connect(
        crossing: NodeId,
        hub_addr: &str,
        retry: &RetryPolicy,
        shutdown: Arc<ShutdownSignal>,
    ) -> CrosswayResult<(Arc<HubLink>, LineReader, JoinHandle<()>)> {
        let stream = connect_with_retry(hub_addr, retry).await?;
        let (reader, writer) = split(stream);
        let (link, writer_task) = start_writer(writer);

        link.send(&Message::Register(RegisterRequest {
            node_id: crossing.clone(),
            role: NodeRole::Crossing,
        }))?;
        link.send(&Message::PolicyUpdate)?;
        tracing::info!(%crossing, %hub_addr, "registered with hub");

        let hub = HubLink {
            crossing,
            link,
            lamport: LamportClock::new(),
            grants: Mutex::new(HashMap::new()),
            shutdown,
        };
        Ok((Arc::new(hub), reader, writer_task))
    }

    pub fn crossing(&self) -> &NodeId {
        &self.crossing
    }

    pub fn send(&self, message: &Message) -> CrosswayResult<()> {
        self.link.send(message)
    }

    /// Fire-and-forget EVENT_LOG
    pub fn report(&self, entry: EventLogEntry) {
        if let Err(e) = self.link.send(&Message::EventLog(entry)) {
            tracing::debug!(error = %e, "event dropped");
        }
    }

    /// Complete the waiter a PHASE_GRANTED ack refers to
    pub fn grant_received(&self, ack: &Ack) -> bool {
        if ack.status != AckStatus::PhaseGranted || ack.crossing.as_ref() != Some(&self.crossing) {
            return false;
        }
        let Some(direction) = ack.direction else {
            return false;
        };
        match self.grants.lock().remove(&direction) {
            Some(waiter) => waiter.send(()).is_ok(),
            None => {
                tracing::warn!(crossing = %self.crossing, %direction, "grant with no waiter");
                false
            }
        }
    }

    /// Drop every pending waiter; their requests fail with `LinkClosed`
    pub fn fail_pending(&self) {
        self.grants.lock().clear();
    }

    pub fn close(&self) {
        self.fail_pending();
        self.link.close();
    }

    fn phase_request(&self, direction: Direction) -> PhaseRequest {
        PhaseRequest {
            timestamp: Some(self.lamport.increment()),
            ..PhaseRequest::new(self.crossing.clone(), direction)
        }
    }
}

impl PhaseControl for HubLink {
    async fn request_green(&self, direction: Direction) -> CrosswayResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.grants.lock().insert(direction, tx).is_some() {
            tracing::warn!(crossing = %self.crossing, %direction, "replacing outstanding phase request");
        }
        self.link.send(&Message::PhaseRequest(self.phase_request(direction)))?;

        tokio::select! {
            granted = rx => granted.map_err(|_| CrosswayError::LinkClosed),
            _ = self.shutdown.wait() => {
                self.grants.lock().remove(&direction);
                Err(CrosswayError::Interrupted)
            }
        }
    }

    async fn release_green(&self, direction: Direction) -> CrosswayResult<()> {
        self.link.send(&Message::PhaseRelease(self.phase_request(direction)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn linked() -> (Arc<HubLink>, crossway_transport::LineReader) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let shutdown = Arc::new(ShutdownSignal::new());
        let (hub, _reader, _writer) =
            HubLink::connect(NodeId::from("Cr2"), &addr, &RetryPolicy::default(), shutdown)
                .await
                .unwrap();
        let (server_reader, _server_writer) = split(accept.await.unwrap());
        (hub, server_reader)
    }

    #[tokio::test]
    async fn test_connect_registers_and_asks_policy() {
        let (_hub, mut server) = linked().await;
        match server.next_message().await.unwrap().unwrap().unwrap() {
            Message::Register(req) => {
                assert_eq!(req.node_id, "Cr2");
                assert_eq!(req.role, NodeRole::Crossing);
            }
            other => panic!("expected REGISTER, got {other:?}"),
        }
        assert_eq!(server.next_message().await.unwrap().unwrap().unwrap(), Message::PolicyUpdate);
    }

    #[tokio::test]
    async fn test_grant_completes_matching_direction() {
        let (hub, mut server) = linked().await;
        server.next_line().await.unwrap();
        server.next_line().await.unwrap();

        let waiting = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.request_green(Direction::East).await })
        };

        let request = match server.next_message().await.unwrap().unwrap().unwrap() {
            Message::PhaseRequest(req) => req,
            other => panic!("expected PHASE_REQUEST, got {other:?}"),
        };
        assert_eq!(request.direction, Direction::East);
        assert!(request.timestamp.is_some());

        // A grant for another direction or crossing does not wake it
        let north = PhaseRequest::new(NodeId::from("Cr2"), Direction::North);
        assert!(!hub.grant_received(&Ack::phase(AckStatus::PhaseGranted, &north)));
        let elsewhere = PhaseRequest::new(NodeId::from("Cr3"), Direction::East);
        assert!(!hub.grant_received(&Ack::phase(AckStatus::PhaseGranted, &elsewhere)));
        assert!(!waiting.is_finished());

        assert!(hub.grant_received(&Ack::phase(AckStatus::PhaseGranted, &request)));
        timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_link_fails_waiter() {
        let (hub, _server) = linked().await;
        let waiting = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.request_green(Direction::West).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        hub.close();
        let result = timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap();
        assert!(matches!(result, Err(CrosswayError::LinkClosed)));
    }
}
