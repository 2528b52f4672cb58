//! Crossway Transport Layer - TCP line links
//!
//! This crate provides:
//! - Bounded-retry outbound connects
//! - Line reader/writer halves speaking the envelope codec
//! - A writer task fed by a cloneable sender, so many tasks can share one
//!   connection without interleaving partial lines

pub mod tcp;

pub use tcp::*;
