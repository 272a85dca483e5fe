//! # Wire Message Types
//!
//! Every datagram carries one self-contained UTF-8 JSON object. The
//! `action` field names the message; pairing replies may instead carry a
//! `status` field only.

use serde::{Deserialize, Serialize};

use super::keys::{KeyName, MouseButton};
use super::pairing::PairingCode;

/// Default UDP port of the desktop host
pub const DEFAULT_PORT: u16 = 7777;

/// Receive buffer size for host replies
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Wire `status` values used by older host builds.
pub mod statuses {
    pub const FOUND: &str = "found";
    pub const CONNECTED: &str = "connected";
}

/// One datagram exchanged between client and host, tagged by `action`.
///
/// Fields the host adds beyond these (such as a `message` text on pairing
/// replies) are ignored when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WireMessage {
    /// Client broadcast looking for a host showing `code`.
    Discover { code: PairingCode },
    /// Host answer to a discovery broadcast.
    #[serde(rename = "discovered")]
    DiscoveryReply {
        #[serde(
            rename = "serverName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        server_name: Option<String>,
    },
    /// Client pairing request.
    Pair {
        code: PairingCode,
        #[serde(rename = "deviceName")]
        device_name: String,
    },
    /// Host accepted the pairing code.
    PairSuccess,
    /// Host rejected the pairing code.
    PairFailed,
    /// Key press or release. `player` is set in multiplayer mode.
    Key {
        key: KeyName,
        pressed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player: Option<u8>,
    },
    /// Relative pointer movement.
    MouseMove { x: i32, y: i32 },
    /// Mouse button press or release.
    MouseButton { button: MouseButton, pressed: bool },
    /// Raw calibrated orientation in degrees.
    GyroData { pitch: f32, roll: f32 },
    /// Periodic keep-alive while the session is active.
    Heartbeat {
        #[serde(rename = "deviceName")]
        device_name: String,
    },
    /// Sent once at teardown.
    Disconnect {
        #[serde(rename = "deviceName")]
        device_name: String,
    },
}

impl WireMessage {
    /// The `action` this message is sent under.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            WireMessage::Discover { .. } => "discover",
            WireMessage::DiscoveryReply { .. } => "discovered",
            WireMessage::Pair { .. } => "pair",
            WireMessage::PairSuccess => "pair_success",
            WireMessage::PairFailed => "pair_failed",
            WireMessage::Key { .. } => "key",
            WireMessage::MouseMove { .. } => "mouse_move",
            WireMessage::MouseButton { .. } => "mouse_button",
            WireMessage::GyroData { .. } => "gyro_data",
            WireMessage::Heartbeat { .. } => "heartbeat",
            WireMessage::Disconnect { .. } => "disconnect",
        }
    }

    /// Shorthand for a key message without a player slot.
    #[must_use]
    pub fn key(key: KeyName, pressed: bool) -> Self {
        WireMessage::Key {
            key,
            pressed,
            player: None,
        }
    }
}
