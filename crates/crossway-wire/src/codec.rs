//! Envelope encoding and decoding

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crossway_core::{CrosswayError, CrosswayResult};

use crate::Message;

/// Outer object of every line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// Decode one line into a message
///
/// Lines that are not a JSON object with a string `type`, or whose payload
/// does not fit the kind, are `MalformedMessage`. A well-formed envelope
/// with an unrecognised `type` is `UnknownMessageType`.
pub fn decode_line(line: &str) -> CrosswayResult<Message> {
    let envelope: Envelope = serde_json::from_str(line.trim())
        .map_err(|e| CrosswayError::MalformedMessage(e.to_string()))?;
    Message::from_parts(&envelope.kind, envelope.payload)
}

/// Encode a message as a single line, without the trailing newline
pub fn encode_line(message: &Message) -> CrosswayResult<String> {
    let envelope = Envelope {
        kind: message.kind().to_string(),
        payload: message.payload()?,
    };
    Ok(serde_json::to_string(&envelope)?)
}
