//! # Wire Message Decoder
//!
//! Decodes datagram payloads into [`WireMessage`] values.
//!
//! Host replies come in two dialects: newer builds set `action`, older ones
//! only set `status`. When both are present, `action` wins.

use serde::Deserialize;
use serde_json::Value;

use super::message::*;
use crate::error::{RemoteError, Result};

/// Reply shape of host builds that answer with `status` instead of `action`
#[derive(Deserialize)]
struct StatusReply {
    status: String,
    #[serde(rename = "serverName", default)]
    server_name: Option<String>,
}

/// Decode one datagram payload
///
/// # Arguments
///
/// * `payload` - Raw datagram bytes
///
/// # Returns
///
/// * `Ok(WireMessage)` - Decoded message
/// * `Err(RemoteError)` - Not JSON, not an object, or an unknown/incomplete message
pub fn decode_message(payload: &[u8]) -> Result<WireMessage> {
    let value: Value = serde_json::from_slice(payload)?;
    let object = value
        .as_object()
        .ok_or_else(|| RemoteError::Protocol("Datagram is not a JSON object".to_string()))?;

    if object.contains_key("action") {
        return Ok(serde_json::from_value(value)?);
    }
    if !object.contains_key("status") {
        return Err(RemoteError::Protocol(
            "Message has neither action nor status".to_string(),
        ));
    }

    let reply: StatusReply = serde_json::from_value(value)?;
    match reply.status.as_str() {
        statuses::FOUND => Ok(WireMessage::DiscoveryReply {
            server_name: reply.server_name,
        }),
        statuses::CONNECTED => Ok(WireMessage::PairSuccess),
        other => Err(RemoteError::Protocol(format!("Unknown status: {}", other))),
    }
}

/// True if `message` answers a discovery broadcast
#[must_use]
pub fn is_discovery_reply(message: &WireMessage) -> bool {
    matches!(message, WireMessage::DiscoveryReply { .. })
}
