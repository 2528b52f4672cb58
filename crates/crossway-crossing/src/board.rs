//! Observable signal state of one intersection
//!
//! Written by the cycles, read by telemetry and by the pedestrian cycle.
//! Plain atomics; readers may see a state that is a moment old.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crossway_core::{Direction, LightColor};

#[derive(Debug, Default)]
pub struct SignalBoard {
    lights: [AtomicU8; 4],
    /// Set from grant to release, yellow and clearance included
    active: [AtomicBool; 4],
    pedestrian: AtomicBool,
}

impl SignalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_light(&self, direction: Direction, color: LightColor) {
        match direction.index() {
            Some(i) => self.lights[i].store(color.to_byte(), Ordering::Release),
            None => self.set_pedestrian(color == LightColor::Pedestrian),
        }
    }

    pub fn light(&self, direction: Direction) -> LightColor {
        match direction.index() {
            Some(i) => LightColor::from_byte(self.lights[i].load(Ordering::Acquire)),
            None if self.pedestrian() => LightColor::Pedestrian,
            None => LightColor::Red,
        }
    }

    pub fn set_active(&self, direction: Direction, active: bool) {
        if let Some(i) = direction.index() {
            self.active[i].store(active, Ordering::Release);
        }
    }

    pub fn set_pedestrian(&self, walking: bool) {
        self.pedestrian.store(walking, Ordering::Release);
    }

    pub fn pedestrian(&self) -> bool {
        self.pedestrian.load(Ordering::Acquire)
    }

    /// Whether any vehicle direction currently holds right-of-way
    pub fn any_green(&self) -> bool {
        self.active.iter().any(|a| a.load(Ordering::Acquire))
    }

    pub fn direction_green(&self) -> Option<Direction> {
        Direction::VEHICLE
            .into_iter()
            .find(|d| self.light(*d) == LightColor::Green)
    }

    /// Summary colour for telemetry
    pub fn light_state(&self) -> LightColor {
        if self.pedestrian() {
            return LightColor::Pedestrian;
        }
        let lights: Vec<LightColor> = Direction::VEHICLE.iter().map(|d| self.light(*d)).collect();
        if lights.contains(&LightColor::Green) {
            LightColor::Green
        } else if lights.contains(&LightColor::Yellow) {
            LightColor::Yellow
        } else {
            LightColor::Red
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_red() {
        let board = SignalBoard::new();
        assert_eq!(board.light_state(), LightColor::Red);
        assert!(!board.any_green());
        assert_eq!(board.direction_green(), None);
    }

    #[test]
    fn test_light_state_summary() {
        let board = SignalBoard::new();
        board.set_light(Direction::East, LightColor::Yellow);
        assert_eq!(board.light_state(), LightColor::Yellow);

        board.set_light(Direction::North, LightColor::Green);
        assert_eq!(board.light_state(), LightColor::Green);
        assert_eq!(board.direction_green(), Some(Direction::North));

        board.set_light(Direction::Pedestrian, LightColor::Pedestrian);
        assert!(board.pedestrian());
        assert_eq!(board.light_state(), LightColor::Pedestrian);
    }

    #[test]
    fn test_active_spans_clearance() {
        let board = SignalBoard::new();
        board.set_active(Direction::West, true);
        board.set_light(Direction::West, LightColor::Red);
        assert!(board.any_green());

        board.set_active(Direction::West, false);
        assert!(!board.any_green());
    }
}
