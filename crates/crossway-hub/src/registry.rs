//! Registered nodes and their outbound links

use std::collections::HashMap;

use parking_lot::RwLock;

use crossway_core::{NodeId, NodeRole};
use crossway_transport::LinkSender;
use crossway_wire::{encode_line, Message};

/// Identifies one accepted connection for the lifetime of the hub
pub type ConnId = u64;

#[derive(Clone, Debug)]
pub struct Registration {
    pub id: NodeId,
    pub role: NodeRole,
    pub conn: ConnId,
    pub link: LinkSender,
}

/// Node id -> live connection
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Registration>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, replacing and closing any previous connection under the same id
    pub fn register(&self, registration: Registration) {
        let id = registration.id.clone();
        let role = registration.role;
        let conn = registration.conn;
        let previous = self.nodes.write().insert(id.clone(), registration);

        if let Some(previous) = previous.filter(|p| p.conn != conn) {
            tracing::info!(node = %id, old_conn = previous.conn, "replacing registration");
            previous.link.close();
        }
        tracing::info!(node = %id, %role, conn, "node registered");
    }

    pub fn get(&self, id: &NodeId) -> Option<Registration> {
        self.nodes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Deliver to one node. A dead link is unregistered and reported as not delivered.
    pub fn route_to(&self, id: &NodeId, message: &Message) -> bool {
        let Some(target) = self.get(id) else {
            return false;
        };
        match target.link.send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(node = %id, error = %e, "delivery failed, dropping node");
                self.remove_if_conn(id, target.conn);
                false
            }
        }
    }

    /// Deliver to every node accepted by `filter`; returns how many were reached
    pub fn broadcast<F>(&self, filter: F, message: &Message) -> usize
    where
        F: Fn(&Registration) -> bool,
    {
        let line = match encode_line(message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "broadcast encode failed");
                return 0;
            }
        };

        let targets: Vec<Registration> =
            self.nodes.read().values().filter(|r| filter(r)).cloned().collect();

        let mut delivered = 0;
        for target in targets {
            if target.link.send_line(line.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(node = %target.id, "broadcast target gone");
                self.remove_if_conn(&target.id, target.conn);
            }
        }
        delivered
    }

    /// Drop every registration made over `conn`
    pub fn remove_connection(&self, conn: ConnId) -> Vec<NodeId> {
        let mut nodes = self.nodes.write();
        let gone: Vec<NodeId> = nodes
            .values()
            .filter(|r| r.conn == conn)
            .map(|r| r.id.clone())
            .collect();
        for id in &gone {
            nodes.remove(id);
        }
        gone
    }

    fn remove_if_conn(&self, id: &NodeId, conn: ConnId) {
        let mut nodes = self.nodes.write();
        if nodes.get(id).is_some_and(|r| r.conn == conn) {
            nodes.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossway_transport::{split, start_writer};
    use crossway_wire::{Ack, AckStatus};
    use tokio::net::{TcpListener, TcpStream};

    async fn link_pair() -> (LinkSender, crossway_transport::LineReader) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let (_server_reader, server_writer) = split(server);
        let (sender, _task) = start_writer(server_writer);
        let (client_reader, _client_writer) = split(client);
        (sender, client_reader)
    }

    fn registration(id: &str, role: NodeRole, conn: ConnId, link: LinkSender) -> Registration {
        Registration {
            id: NodeId::from(id),
            role,
            conn,
            link,
        }
    }

    #[tokio::test]
    async fn test_route_to_registered_node() {
        let registry = NodeRegistry::new();
        let (link, mut reader) = link_pair().await;
        registry.register(registration("Cr1", NodeRole::Crossing, 1, link));

        let ok = Message::Ok(Ack::new(AckStatus::TelemetryOk));
        assert!(registry.route_to(&NodeId::from("Cr1"), &ok));
        assert!(!registry.route_to(&NodeId::from("Cr9"), &ok));

        let got = reader.next_message().await.unwrap().unwrap().unwrap();
        assert_eq!(got, ok);
    }

    #[tokio::test]
    async fn test_reregistration_closes_old_link() {
        let registry = NodeRegistry::new();
        let (old_link, mut old_reader) = link_pair().await;
        let (new_link, _new_reader) = link_pair().await;

        registry.register(registration("Cr2", NodeRole::Crossing, 1, old_link));
        registry.register(registration("Cr2", NodeRole::Crossing, 2, new_link));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&NodeId::from("Cr2")).unwrap().conn, 2);
        assert!(old_reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_broadcast_filters_by_role() {
        let registry = NodeRegistry::new();
        let (dash, mut dash_reader) = link_pair().await;
        let (crossing, _) = link_pair().await;
        registry.register(registration("dash", NodeRole::Dashboard, 1, dash));
        registry.register(registration("Cr1", NodeRole::Crossing, 2, crossing));

        let stop = Message::stop();
        let reached = registry.broadcast(|r| r.role == NodeRole::Dashboard, &stop);
        assert_eq!(reached, 1);
        assert_eq!(dash_reader.next_message().await.unwrap().unwrap().unwrap(), stop);
    }

    #[tokio::test]
    async fn test_remove_connection() {
        let registry = NodeRegistry::new();
        let (a, _ra) = link_pair().await;
        let (b, _rb) = link_pair().await;
        registry.register(registration("E1", NodeRole::Entry, 7, a));
        registry.register(registration("S", NodeRole::Sink, 8, b));

        assert_eq!(registry.remove_connection(7), vec![NodeId::from("E1")]);
        assert!(!registry.contains(&NodeId::from("E1")));
        assert!(registry.contains(&NodeId::from("S")));
    }
}
