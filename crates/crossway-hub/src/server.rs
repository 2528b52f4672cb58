//! Hub process: shared state plus the accept loop

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use crossway_core::{
    CausalEvent, CrosswayResult, LamportClock, NodeId, NodeRole, ShutdownSignal, Stamp,
};
use crossway_transport::LinkSender;
use crossway_wire::Message;

use crate::session::Session;
use crate::{ConnId, EventLedger, EventLogStore, NodeRegistry, PhaseArbiter, PolicyManager, Registration};

/// Default hub port
pub const DEFAULT_HUB_PORT: u16 = 6000;

/// Hub configuration
#[derive(Clone, Debug)]
pub struct HubConfig {
    pub listen_addr: String,
    /// JSONL event log; `None` keeps events in memory only
    pub log_path: Option<PathBuf>,
    /// Where the ordered ledger is written on shutdown
    pub export_path: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            listen_addr: format!("0.0.0.0:{DEFAULT_HUB_PORT}"),
            log_path: Some(PathBuf::from("logs/events.jsonl")),
            export_path: Some(PathBuf::from("logs/ledger.json")),
            policy_path: None,
        }
    }
}

/// Shared hub state. Sessions hold an `Arc<Hub>`.
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    registry: NodeRegistry,
    arbiter: PhaseArbiter,
    ledger: EventLedger,
    store: Option<EventLogStore>,
    policy: PolicyManager,
    clock: LamportClock,
    shutdown: ShutdownSignal,
    next_conn: AtomicU64,
}

impl Hub {
    pub fn new(config: HubConfig) -> CrosswayResult<Arc<Self>> {
        let store = config.log_path.clone().map(EventLogStore::open).transpose()?;
        let policy = PolicyManager::new(config.policy_path.clone());

        Ok(Arc::new(Hub {
            config,
            registry: NodeRegistry::new(),
            arbiter: PhaseArbiter::new(),
            ledger: EventLedger::new(),
            store,
            policy,
            clock: LamportClock::new(),
            shutdown: ShutdownSignal::new(),
            next_conn: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn arbiter(&self) -> &PhaseArbiter {
        &self.arbiter
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &PolicyManager {
        &self.policy
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub async fn bind(&self) -> CrosswayResult<TcpListener> {
        Ok(TcpListener::bind(&self.config.listen_addr).await?)
    }

    /// Accept connections until shutdown
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> CrosswayResult<()> {
        tracing::info!(addr = ?listener.local_addr().ok(), "hub listening");

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(%peer, conn, "connection accepted");
                        let session = Session::new(Arc::clone(self), conn);
                        tokio::spawn(session.run(stream));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }

        tracing::info!("hub stopped accepting");
        Ok(())
    }

    pub fn register(&self, id: NodeId, role: NodeRole, conn: ConnId, link: LinkSender) {
        self.registry.register(Registration { id, role, conn, link });
    }

    /// Stamp an inbound message with the next Lamport value
    pub fn stamp(&self, kind: &str, node: &str) -> CausalEvent {
        CausalEvent::new(Stamp::Lamport(self.clock.increment()), kind, node)
    }

    /// Stamp after merging a sender's Lamport value
    pub fn stamp_received(&self, kind: &str, node: &str, received: u64) -> CausalEvent {
        CausalEvent::new(Stamp::Lamport(self.clock.update(received)), kind, node)
    }

    /// Append to the ledger and the durable log
    pub fn record(&self, event: CausalEvent) {
        if let Some(store) = &self.store {
            if let Err(e) = store.append(&event) {
                tracing::error!(error = %e, "event log write failed");
            }
        }
        tracing::trace!(seq = event.seq.as_i64(), kind = %event.kind, node = %event.node, "event");
        self.ledger.append(event);
    }

    /// Record something that has no place in the causal order
    pub fn record_raw(&self, details: impl Into<String>) {
        self.record(CausalEvent::raw(details));
    }

    pub fn route_to(&self, id: &NodeId, message: &Message) -> bool {
        self.registry.route_to(id, message)
    }

    pub fn broadcast_to_dashboards(&self, message: &Message) -> usize {
        self.registry.broadcast(|r| r.role == NodeRole::Dashboard, message)
    }

    pub fn history(&self, vehicle_id: &str) -> Vec<CausalEvent> {
        self.ledger.history(vehicle_id)
    }

    /// Re-read the policy file and push the result to every crossing
    pub fn reload_policy(&self) -> CrosswayResult<usize> {
        let policy = self.policy.reload()?;
        let message = Message::policy(&policy)?;
        let pushed = self.registry.broadcast(|r| r.role == NodeRole::Crossing, &message);
        tracing::info!(crossings = pushed, "policy pushed");
        Ok(pushed)
    }

    /// Tell every node to stop, stop accepting, and export the ledger
    pub fn shutdown(&self) -> CrosswayResult<()> {
        if self.shutdown.is_triggered() {
            return Ok(());
        }
        let told = self.registry.broadcast(|_| true, &Message::stop());
        tracing::info!(nodes = told, "broadcasting STOP");
        self.shutdown.trigger();

        if let Some(path) = &self.config.export_path {
            self.ledger.export_json(path)?;
        }
        Ok(())
    }
}
