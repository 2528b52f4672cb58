//! Crossway Crossing - one intersection process
//!
//! Each configured direction runs its own signal cycle over its own vehicle
//! queue. Right-of-way comes from the hub's phase arbiter through `HubLink`.
//! Qualifying intersections also run a pedestrian cycle.

pub mod approach;
pub mod board;
pub mod config;
pub mod control;
pub mod crossing;
pub mod cycle;
pub mod forward;
pub mod link;
pub mod pedestrian;
pub mod policy_cell;
pub mod queue;

pub use approach::*;
pub use board::*;
pub use config::*;
pub use control::*;
pub use crossing::*;
pub use cycle::*;
pub use forward::*;
pub use link::*;
pub use pedestrian::*;
pub use policy_cell::*;
pub use queue::*;
