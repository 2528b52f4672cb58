//! Crossway Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every Crossway process:
//! - Identifiers (NodeId, NodeRole)
//! - Signal primitives (Direction, PhaseGroup, LightColor)
//! - Vehicles and the adaptive signal Policy
//! - Causally stamped events
//! - Clocks (SimClock for simulated time, LamportClock for causal order)
//! - Process-wide shutdown signalling

pub mod clock;
pub mod direction;
pub mod error;
pub mod event;
pub mod id;
pub mod policy;
pub mod shutdown;
pub mod time;
pub mod vehicle;

pub use clock::*;
pub use direction::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use policy::*;
pub use shutdown::*;
pub use time::*;
pub use vehicle::*;
