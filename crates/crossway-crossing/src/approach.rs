//! Which local queue an arriving vehicle joins

use std::collections::HashMap;

use crossway_core::{Direction, NodeId};

/// Five-crossing grid: (from, to) -> approach at `to`
const GRID: &[(&str, &str, Direction)] = &[
    ("Cr1", "Cr2", Direction::South),
    ("Cr2", "Cr1", Direction::North),
    ("Cr2", "Cr3", Direction::South),
    ("Cr3", "Cr2", Direction::North),
    ("Cr1", "Cr4", Direction::East),
    ("Cr4", "Cr1", Direction::West),
    ("Cr4", "Cr5", Direction::South),
    ("Cr5", "Cr4", Direction::North),
    ("Cr2", "Cr5", Direction::East),
    ("Cr5", "Cr2", Direction::West),
];

/// Origin node -> approach direction at this crossing
#[derive(Clone, Debug, PartialEq)]
pub struct Approaches {
    routes: HashMap<NodeId, Direction>,
    fallback: Direction,
}

impl Approaches {
    pub fn new(fallback: Direction) -> Self {
        Approaches {
            routes: HashMap::new(),
            fallback,
        }
    }

    /// Grid edges ending at `crossing`
    pub fn grid(crossing: &NodeId) -> Self {
        let mut approaches = Approaches::new(Direction::North);
        for (from, to, direction) in GRID {
            if crossing == to {
                approaches = approaches.route(*from, *direction);
            }
        }
        approaches
    }

    pub fn route(mut self, from: impl Into<NodeId>, direction: Direction) -> Self {
        self.routes.insert(from.into(), direction);
        self
    }

    pub fn fallback(&self) -> Direction {
        self.fallback
    }

    /// Approach for a vehicle coming from `from`, and whether it was mapped
    pub fn resolve(&self, from: &NodeId) -> (Direction, bool) {
        match self.routes.get(from) {
            Some(direction) => (*direction, true),
            None => (self.fallback, false),
        }
    }
}

impl Default for Approaches {
    fn default() -> Self {
        Approaches::new(Direction::North)
    }
}
