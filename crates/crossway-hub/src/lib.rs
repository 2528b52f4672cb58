//! Crossway Hub - central coordination process
//!
//! Every intersection, entry generator, sink and dashboard connects here.
//! The hub:
//! 1. Accepts connections and runs one session per connection
//! 2. Stamps each substantive message with a Lamport value
//! 3. Appends the stamped event to the ledger and the log file
//! 4. Routes vehicles to their next node and fans telemetry out to dashboards
//! 5. Arbitrates right-of-way through the global phase arbiter

pub mod arbiter;
pub mod ledger;
pub mod policy;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;

pub use arbiter::*;
pub use ledger::*;
pub use policy::*;
pub use registry::*;
pub use server::*;
pub use store::*;
