//! Intersection configuration

use std::time::Duration;

use crossway_core::{Direction, NodeId, DEFAULT_TIME_SCALE};
use crossway_transport::RetryPolicy;

use crate::Approaches;

/// Base service time per vehicle, simulated seconds
pub const DEFAULT_SERVICE_TIME: f64 = 1.5;
/// Base road travel time between crossings, simulated seconds
pub const DEFAULT_ROAD_TIME: f64 = 3.0;

/// Crossing that runs a pedestrian cycle unless configured otherwise
pub const PEDESTRIAN_CROSSING: &str = "Cr4";

#[derive(Clone, Debug, PartialEq)]
pub struct PedestrianConfig {
    /// Real time between walk phases
    pub period: Duration,
    /// Walk duration, simulated seconds
    pub walk: f64,
    /// Real pause after each walk phase
    pub cooldown: Duration,
    /// Re-check interval while vehicles hold the junction
    pub poll: Duration,
}

impl Default for PedestrianConfig {
    fn default() -> Self {
        PedestrianConfig {
            period: Duration::from_secs(12),
            walk: 4.0,
            cooldown: Duration::from_millis(150),
            poll: Duration::from_millis(80),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CrossingConfig {
    pub id: NodeId,
    pub hub_addr: String,
    /// Listener for direct VehicleArrival connections
    pub listen_addr: String,
    pub directions: Vec<Direction>,
    pub service_time: f64,
    pub road_time: f64,
    pub time_scale: f64,
    pub telemetry_interval: Duration,
    /// Idle re-check while no policy has arrived
    pub policy_poll: Duration,
    pub approaches: Approaches,
    pub pedestrian: Option<PedestrianConfig>,
    pub retry: RetryPolicy,
}

impl CrossingConfig {
    /// Defaults for crossing `id` on the standard grid
    pub fn new(id: impl Into<NodeId>) -> Self {
        let id = id.into();
        let pedestrian = (id == PEDESTRIAN_CROSSING).then(PedestrianConfig::default);
        CrossingConfig {
            approaches: Approaches::grid(&id),
            pedestrian,
            id,
            hub_addr: "127.0.0.1:6000".into(),
            listen_addr: "0.0.0.0:0".into(),
            directions: Direction::VEHICLE.to_vec(),
            service_time: DEFAULT_SERVICE_TIME,
            road_time: DEFAULT_ROAD_TIME,
            time_scale: DEFAULT_TIME_SCALE,
            telemetry_interval: Duration::from_secs(2),
            policy_poll: Duration::from_millis(50),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self::new("Cr1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pedestrian_only_at_cr4() {
        assert!(CrossingConfig::new("Cr4").pedestrian.is_some());
        assert!(CrossingConfig::new("Cr2").pedestrian.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = CrossingConfig::default();
        assert_eq!(config.directions.len(), 4);
        assert_eq!(config.service_time, 1.5);
        assert_eq!(config.road_time, 3.0);
        assert_eq!(config.retry.attempts, 3);
    }
}
