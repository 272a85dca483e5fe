//! # Error Types
//!
//! Custom error types for MobControl using `thiserror`.

use thiserror::Error;

use crate::transport::Phase;

/// Main error type for MobControl
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The orientation sensor is missing; motion features are disabled
    #[error("Orientation sensor unavailable, motion controls disabled")]
    SensorUnavailable,

    /// Rotation sample could not be turned into an orientation
    #[error("Invalid orientation sample: {0}")]
    InvalidSample(String),

    /// No host answered any discovery attempt
    #[error("No desktop host answered after {attempts} discovery attempts. Is the desktop app running on the same network?")]
    DiscoveryTimeout { attempts: u32 },

    /// Host explicitly refused the pairing code
    #[error("Pairing rejected by host: check the 4-digit code and try again")]
    PairingRejected,

    /// Host never answered the pairing request
    #[error("No pairing response from host: check the network connection and firewall")]
    PairingTimeout,

    /// Socket send failure
    #[error("Send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Attempted to use a session after it was closed
    #[error("Session is closed")]
    SessionClosed,

    /// Operation not allowed in the current session phase
    #[error("Invalid session phase: expected {expected}, was {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    /// Pairing needs a server address but neither discovery nor config provided one
    #[error("No server address known, run discovery or configure a host")]
    NoServerAddress,

    /// Name outside the key vocabulary understood by the host
    #[error("Unknown key name: {0:?}")]
    InvalidKey(String),

    /// Pairing code is not four digits
    #[error("Invalid pairing code {0:?}: expected 4 digits")]
    InvalidPairingCode(String),

    /// Scanned connection payload is not `host:port:code`
    #[error("Invalid QR payload {0:?}: expected host:port:code")]
    InvalidQrPayload(String),

    /// Hysteresis thresholds violate `0 <= deactivate < activate`
    #[error("Invalid thresholds: activate {activate}, deactivate {deactivate}")]
    InvalidThresholds { activate: f32, deactivate: f32 },

    /// Digital mapper given more gates than it supports
    #[error("Too many key gates: {count} (max {max})")]
    TooManyGates { count: usize, max: usize },

    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for MobControl
pub type Result<T> = std::result::Result<T, RemoteError>;
