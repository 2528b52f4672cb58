//! Causally stamped events
//!
//! Every substantive message the hub handles becomes a CausalEvent carrying
//! the Lamport value it was assigned. Diagnostic lines with no causal
//! position carry the raw stamp, which orders after every Lamport value.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SimTime;

/// Wire sentinel for raw stamps
pub const RAW_STAMP: i64 = -1;

/// Position of an event in the hub's causal order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stamp {
    Lamport(u64),
    Raw,
}

impl Stamp {
    pub fn as_i64(self) -> i64 {
        match self {
            Stamp::Lamport(seq) => seq as i64,
            Stamp::Raw => RAW_STAMP,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value < 0 {
            Stamp::Raw
        } else {
            Stamp::Lamport(value as u64)
        }
    }

    #[inline]
    pub fn is_raw(self) -> bool {
        self == Stamp::Raw
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Stamp::Lamport(a), Stamp::Lamport(b)) => a.cmp(b),
            (Stamp::Lamport(_), Stamp::Raw) => Ordering::Less,
            (Stamp::Raw, Stamp::Lamport(_)) => Ordering::Greater,
            (Stamp::Raw, Stamp::Raw) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Stamp::from_i64(i64::deserialize(deserializer)?))
    }
}

/// Immutable ledger record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CausalEvent {
    pub seq: Stamp,
    pub kind: String,
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub sim_time: SimTime,
}

impl CausalEvent {
    pub fn new(seq: Stamp, kind: impl Into<String>, node: impl Into<String>) -> Self {
        CausalEvent {
            seq,
            kind: kind.into(),
            node: node.into(),
            vehicle_id: None,
            details: String::new(),
            sim_time: SimTime::ZERO,
        }
    }

    /// Diagnostic entry with no causal position
    pub fn raw(details: impl Into<String>) -> Self {
        CausalEvent::new(Stamp::Raw, "RAW", "SYSTEM").with_details(details)
    }

    pub fn with_vehicle(mut self, vehicle_id: Option<String>) -> Self {
        self.vehicle_id = vehicle_id;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn at(mut self, sim_time: SimTime) -> Self {
        self.sim_time = sim_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_orders_last() {
        let mut stamps = vec![
            Stamp::Lamport(3),
            Stamp::Raw,
            Stamp::Lamport(1),
            Stamp::Raw,
            Stamp::Lamport(2),
        ];
        stamps.sort();
        assert_eq!(
            stamps,
            vec![
                Stamp::Lamport(1),
                Stamp::Lamport(2),
                Stamp::Lamport(3),
                Stamp::Raw,
                Stamp::Raw
            ]
        );
    }

    #[test]
    fn test_stamp_wire_sentinel() {
        assert_eq!(serde_json::to_string(&Stamp::Raw).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<Stamp>("7").unwrap(), Stamp::Lamport(7));
        assert_eq!(serde_json::from_str::<Stamp>("-1").unwrap(), Stamp::Raw);
    }
}
