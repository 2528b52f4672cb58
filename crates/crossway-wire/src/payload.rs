//! Message payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crossway_core::{
    CausalEvent, Direction, LightColor, NodeId, NodeRole, SimTime, Vehicle, VehicleType,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub node_id: NodeId,
    pub role: NodeRole,
}

/// Periodic intersection status, forwarded to dashboards
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    pub crossing: NodeId,
    /// Vehicles waiting across every approach
    pub queue: u32,
    /// Mean of the per-approach running averages
    pub avg: f64,
    pub light_state: LightColor,
    pub pedestrian: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_green: Option<Direction>,
}

/// Structured simulation event reported by a node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sim_time: SimTime,
    pub node: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub details: String,
}

impl EventLogEntry {
    pub fn new(kind: impl Into<String>, sim_time: SimTime, node: NodeId) -> Self {
        EventLogEntry {
            kind: kind.into(),
            sim_time,
            node,
            vehicle_id: None,
            details: String::new(),
        }
    }

    pub fn vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// End-to-end statistics published by the sink
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficStatsPayload {
    pub total_vehicles: u64,
    pub count_by_type: BTreeMap<String, u64>,
    pub avg_dwelling_by_type: BTreeMap<String, f64>,
    pub min_dwelling_by_type: BTreeMap<String, f64>,
    pub max_dwelling_by_type: BTreeMap<String, f64>,
}

/// Hand-off of a vehicle from one node to the next
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleTransfer {
    pub vehicle_id: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Simulated arrival time at `to`
    pub time: SimTime,
    pub path: Vec<NodeId>,
    /// Index of `to` within `path`
    pub index: usize,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    /// Network entry time; older senders omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_at: Option<SimTime>,
}

impl VehicleTransfer {
    /// Build the transfer that moves `vehicle` to its next path node
    pub fn handoff(vehicle: &Vehicle, from: NodeId, time: SimTime) -> Option<Self> {
        let mut next = vehicle.clone();
        let to = next.advance()?.clone();
        Some(VehicleTransfer {
            vehicle_id: next.id,
            from,
            to,
            time,
            index: next.path_index,
            path: next.path,
            vehicle_type: next.vehicle_type,
            entered_at: Some(next.entered_at),
        })
    }

    /// The vehicle as it stands on arrival at `to`
    pub fn into_vehicle(self) -> Vehicle {
        let entered_at = self.entered_at.unwrap_or(self.time);
        Vehicle {
            id: self.vehicle_id,
            vehicle_type: self.vehicle_type,
            path: self.path,
            path_index: self.index,
            entered_at,
            left_at: None,
        }
    }
}

/// Phase request or release for one direction of a crossing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRequest {
    pub crossing: NodeId,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl PhaseRequest {
    pub fn new(crossing: NodeId, direction: Direction) -> Self {
        PhaseRequest {
            crossing,
            direction,
            timestamp: None,
        }
    }
}

/// Ordered event history of a single vehicle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    pub vehicle_id: String,
    pub events: Vec<CausalEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    RegisterOk,
    TelemetryOk,
    EventLogOk,
    TrafficStatsOk,
    VehicleTransferOk,
    NodeNotFound,
    PhaseGranted,
    PhaseReleased,
}

/// Positive reply; phase acks name the crossing and direction they answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossing: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Ack {
    pub fn new(status: AckStatus) -> Self {
        Ack {
            status,
            crossing: None,
            direction: None,
        }
    }

    pub fn phase(status: AckStatus, request: &PhaseRequest) -> Self {
        Ack {
            status,
            crossing: Some(request.crossing.clone()),
            direction: Some(request.direction),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    UnknownType,
    Malformed,
}
