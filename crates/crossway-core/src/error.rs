//! Error types for Crossway

use thiserror::Error;

/// Core Crossway errors
#[derive(Error, Debug)]
pub enum CrosswayError {
    // Transport errors
    #[error("Connection to {addr} failed after {attempts} attempts")]
    ConnectionFailed { addr: String, attempts: u32 },

    #[error("Link closed")]
    LinkClosed,

    // Wire errors
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid node role: {0}")]
    InvalidRole(String),

    // Coordination errors
    #[error("Destination not registered: {0}")]
    RoutingFailed(String),

    #[error("No policy snapshot available")]
    PolicyUnavailable,

    #[error("Wait interrupted by shutdown")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrosswayError {
    /// Shutdown interruptions are an orderly exit, not a failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CrosswayError::Interrupted | CrosswayError::LinkClosed)
    }
}

/// Result type for Crossway operations
pub type CrosswayResult<T> = Result<T, CrosswayError>;
