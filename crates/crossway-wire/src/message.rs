//! Message kinds

use serde_json::Value;

use crossway_core::{CrosswayError, CrosswayResult, Policy};

use crate::{
    Ack, ErrorReason, EventLogEntry, HistoryData, PhaseRequest, RegisterRequest, TelemetryPayload,
    TrafficStatsPayload, VehicleTransfer,
};

/// Payload carried by STOP
pub const END_SIMULATION: &str = "END_SIMULATION";

/// Every message exchanged between Crossway processes
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    // Node -> hub
    Register(RegisterRequest),
    Telemetry(TelemetryPayload),
    EventLog(EventLogEntry),
    TrafficStats(TrafficStatsPayload),
    PolicyUpdate,
    VehicleTransfer(VehicleTransfer),
    PhaseRequest(PhaseRequest),
    PhaseRelease(PhaseRequest),
    RequestHistory(String),

    // Hub -> node
    /// Current policy, carried as a JSON string
    Policy(String),
    VehicleArrival(VehicleTransfer),
    TelemetryUpdate(TelemetryPayload),
    TrafficStatsUpdate(TrafficStatsPayload),
    HistoryData(HistoryData),
    Stop(String),
    Ok(Ack),
    Error(ErrorReason),
}

impl Message {
    /// Value of the envelope `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Register(_) => "REGISTER",
            Message::Telemetry(_) => "TELEMETRY",
            Message::EventLog(_) => "EVENT_LOG",
            Message::TrafficStats(_) => "TRAFFIC_STATS",
            Message::PolicyUpdate => "POLICY_UPDATE",
            Message::VehicleTransfer(_) => "VehicleTransfer",
            Message::PhaseRequest(_) => "PHASE_REQUEST",
            Message::PhaseRelease(_) => "PHASE_RELEASE",
            Message::RequestHistory(_) => "REQUEST_HISTORY",
            Message::Policy(_) => "POLICY",
            Message::VehicleArrival(_) => "VehicleArrival",
            Message::TelemetryUpdate(_) => "Telemetry",
            Message::TrafficStatsUpdate(_) => "TrafficStats",
            Message::HistoryData(_) => "HISTORY_DATA",
            Message::Stop(_) => "STOP",
            Message::Ok(_) => "OK",
            Message::Error(_) => "ERROR",
        }
    }

    pub fn policy(policy: &Policy) -> CrosswayResult<Self> {
        Ok(Message::Policy(serde_json::to_string(policy)?))
    }

    pub fn stop() -> Self {
        Message::Stop(END_SIMULATION.to_string())
    }

    /// Decode the policy carried by a POLICY message
    pub fn decode_policy(json: &str) -> CrosswayResult<Policy> {
        serde_json::from_str(json).map_err(|e| CrosswayError::MalformedMessage(e.to_string()))
    }

    pub(crate) fn payload(&self) -> CrosswayResult<Value> {
        let value = match self {
            Message::Register(p) => serde_json::to_value(p)?,
            Message::Telemetry(p) | Message::TelemetryUpdate(p) => serde_json::to_value(p)?,
            Message::EventLog(p) => serde_json::to_value(p)?,
            Message::TrafficStats(p) | Message::TrafficStatsUpdate(p) => serde_json::to_value(p)?,
            Message::PolicyUpdate => Value::Null,
            Message::VehicleTransfer(p) | Message::VehicleArrival(p) => serde_json::to_value(p)?,
            Message::PhaseRequest(p) | Message::PhaseRelease(p) => serde_json::to_value(p)?,
            Message::RequestHistory(id) => Value::String(id.clone()),
            Message::Policy(json) => Value::String(json.clone()),
            Message::HistoryData(p) => serde_json::to_value(p)?,
            Message::Stop(reason) => Value::String(reason.clone()),
            Message::Ok(ack) => serde_json::to_value(ack)?,
            Message::Error(reason) => serde_json::to_value(reason)?,
        };
        Ok(value)
    }

    /// Build the variant selected by `kind` from its payload
    pub(crate) fn from_parts(kind: &str, payload: Value) -> CrosswayResult<Self> {
        fn typed<T: serde::de::DeserializeOwned>(kind: &str, payload: Value) -> CrosswayResult<T> {
            serde_json::from_value(payload)
                .map_err(|e| CrosswayError::MalformedMessage(format!("{kind}: {e}")))
        }

        let message = match kind {
            "REGISTER" => Message::Register(typed(kind, payload)?),
            "TELEMETRY" => Message::Telemetry(typed(kind, payload)?),
            "EVENT_LOG" => Message::EventLog(typed(kind, payload)?),
            "TRAFFIC_STATS" => Message::TrafficStats(typed(kind, payload)?),
            // Payload is ignored; senders use null or a marker string
            "POLICY_UPDATE" => Message::PolicyUpdate,
            "VehicleTransfer" => Message::VehicleTransfer(typed(kind, payload)?),
            "PHASE_REQUEST" => Message::PhaseRequest(typed(kind, payload)?),
            "PHASE_RELEASE" => Message::PhaseRelease(typed(kind, payload)?),
            "REQUEST_HISTORY" => Message::RequestHistory(typed(kind, payload)?),
            "POLICY" => Message::Policy(typed(kind, payload)?),
            "VehicleArrival" => Message::VehicleArrival(typed(kind, payload)?),
            "Telemetry" => Message::TelemetryUpdate(typed(kind, payload)?),
            "TrafficStats" => Message::TrafficStatsUpdate(typed(kind, payload)?),
            "HISTORY_DATA" => Message::HistoryData(typed(kind, payload)?),
            "STOP" => Message::Stop(typed::<Option<String>>(kind, payload)?.unwrap_or_default()),
            "OK" => Message::Ok(typed(kind, payload)?),
            "ERROR" => Message::Error(typed(kind, payload)?),
            other => return Err(CrosswayError::UnknownMessageType(other.to_string())),
        };
        Ok(message)
    }
}
