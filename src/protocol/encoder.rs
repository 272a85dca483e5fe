//! # Wire Message Encoder
//!
//! Encodes [`WireMessage`] values into single-datagram JSON payloads.

use bytes::Bytes;

use super::message::WireMessage;
use crate::error::Result;

/// Encode a message into one datagram payload
///
/// # Arguments
///
/// * `message` - Message to encode
///
/// # Returns
///
/// * `Result<Bytes>` - UTF-8 JSON object, one per datagram
///
/// # Examples
///
/// ```
/// use mobcontrol::protocol::encoder::encode_message;
/// use mobcontrol::protocol::keys::KeyName;
/// use mobcontrol::protocol::message::WireMessage;
///
/// let msg = WireMessage::key(KeyName::parse("w")?, true);
/// let payload = encode_message(&msg)?;
/// assert!(payload.starts_with(b"{"));
/// # Ok::<(), mobcontrol::error::RemoteError>(())
/// ```
pub fn encode_message(message: &WireMessage) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    Ok(Bytes::from(payload))
}
