//! Vehicles travelling through the road network

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{NodeId, SimTime};

/// Vehicle class, carrying its relative speed factor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleType {
    #[serde(alias = "MOTA")]
    Motorcycle,
    #[serde(alias = "CARRO")]
    Car,
    #[serde(alias = "CAMIAO")]
    Truck,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Motorcycle, VehicleType::Car, VehicleType::Truck];

    /// Time multiplier relative to a car (service and road times)
    pub fn factor(self) -> f64 {
        match self {
            VehicleType::Motorcycle => 0.5,
            VehicleType::Car => 1.0,
            VehicleType::Truck => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Motorcycle => "MOTORCYCLE",
            VehicleType::Car => "CAR",
            VehicleType::Truck => "TRUCK",
        }
    }

    /// Slot for per-type counter arrays
    #[inline]
    pub fn index(self) -> usize {
        match self {
            VehicleType::Motorcycle => 0,
            VehicleType::Car => 1,
            VehicleType::Truck => 2,
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vehicle and its route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub path: Vec<NodeId>,
    pub path_index: usize,
    pub entered_at: SimTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_at: Option<SimTime>,
}

impl Vehicle {
    pub fn new(id: impl Into<String>, vehicle_type: VehicleType, path: Vec<NodeId>) -> Self {
        Vehicle {
            id: id.into(),
            vehicle_type,
            path,
            path_index: 0,
            entered_at: SimTime::ZERO,
            left_at: None,
        }
    }

    pub fn entered_at(mut self, at: SimTime) -> Self {
        self.entered_at = at;
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.path_index = index;
        self
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        self.path.get(self.path_index)
    }

    /// Next hop, or None once the path is exhausted
    pub fn next_node(&self) -> Option<&NodeId> {
        self.path_index.checked_add(1).and_then(|i| self.path.get(i))
    }

    /// Step onto the next hop and return it. At the end of the path the
    /// vehicle stays put and None is returned.
    pub fn advance(&mut self) -> Option<&NodeId> {
        let next = self.path_index.checked_add(1).filter(|i| *i < self.path.len())?;
        self.path_index = next;
        self.path.get(next)
    }

    /// Simulated seconds spent in the network; zero until the vehicle leaves
    pub fn dwelling_time(&self) -> f64 {
        self.left_at
            .map(|left| left.secs_since(self.entered_at))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(nodes: &[&str]) -> Vec<NodeId> {
        nodes.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn test_path_navigation() {
        let mut v = Vehicle::new("V1", VehicleType::Car, path(&["E1", "Cr1", "S"])).at_index(1);
        assert_eq!(v.current_node().unwrap(), "Cr1");
        assert_eq!(v.next_node().unwrap(), "S");
        assert_eq!(v.advance().unwrap(), "S");
        assert_eq!(v.path_index, 2);
        assert!(v.next_node().is_none());
        assert!(v.advance().is_none());
        assert_eq!(v.path_index, 2);
    }

    #[test]
    fn test_index_past_path_end() {
        let mut v = Vehicle::new("V9", VehicleType::Car, path(&["E1", "Cr1", "S"])).at_index(usize::MAX);
        assert!(v.current_node().is_none());
        assert!(v.next_node().is_none());
        assert!(v.advance().is_none());
        assert_eq!(v.path_index, usize::MAX);
    }

    #[test]
    fn test_dwelling_time() {
        let mut v = Vehicle::new("V2", VehicleType::Truck, path(&["E1", "S"]))
            .entered_at(SimTime::from_secs_f64(2.0));
        assert_eq!(v.dwelling_time(), 0.0);
        v.left_at = Some(SimTime::from_secs_f64(9.5));
        assert!((v.dwelling_time() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_type_accepts_legacy_names() {
        let t: VehicleType = serde_json::from_str("\"CAMIAO\"").unwrap();
        assert_eq!(t, VehicleType::Truck);
        assert_eq!(serde_json::to_string(&VehicleType::Motorcycle).unwrap(), "\"MOTORCYCLE\"");
        assert_eq!(VehicleType::Motorcycle.factor(), 0.5);
    }
}
