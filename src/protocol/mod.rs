//! # Wire Protocol Module
//!
//! JSON-over-UDP messages exchanged with the desktop host, plus the
//! validated value types they carry.

pub mod decoder;
pub mod encoder;
pub mod keys;
pub mod message;
pub mod pairing;

pub use decoder::decode_message;
pub use encoder::encode_message;
pub use keys::{KeyName, MouseButton};
pub use message::{WireMessage, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
pub use pairing::{ConnectTarget, PairingCode};
