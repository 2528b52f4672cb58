//! Crossway Wire - message format
//!
//! Transport is TCP carrying one JSON object per line:
//!
//! ```text
//! {"type":"<KIND>","payload":<any>}\n
//! ```
//!
//! The envelope is decoded once; its payload is decoded straight into the
//! `Message` variant selected by `type`.

pub mod codec;
pub mod message;
pub mod payload;

pub use codec::*;
pub use message::*;
pub use payload::*;
