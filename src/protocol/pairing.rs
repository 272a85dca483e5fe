//! # Pairing Entry
//!
//! The desktop host shows a 4-digit code, either as text for manual entry
//! or inside a QR code encoding `host:port:code`. Both entry paths end up
//! here and produce the values the transport session needs.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, Result};

/// Number of digits in a pairing code.
pub const PAIRING_CODE_LEN: usize = 4;

/// A validated 4-digit pairing code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairingCode(String);

impl PairingCode {
    /// Parses a pairing code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidPairingCode`] unless the input is
    /// exactly four ASCII digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use mobcontrol::protocol::pairing::PairingCode;
    ///
    /// assert!(PairingCode::parse("0427").is_ok());
    /// assert!(PairingCode::parse("427").is_err());
    /// ```
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() == PAIRING_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(RemoteError::InvalidPairingCode(code.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PairingCode {
    type Error = RemoteError;

    fn try_from(code: String) -> Result<Self> {
        Self::parse(&code)
    }
}

impl From<PairingCode> for String {
    fn from(code: PairingCode) -> Self {
        code.0
    }
}

/// Host, port and code scanned from the desktop's QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: IpAddr,
    pub port: u16,
    pub code: PairingCode,
}

impl ConnectTarget {
    /// Parses a `host:port:code` payload.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidQrPayload`] when the payload has fewer
    /// than three parts, the host is not an IP address or the port is not
    /// numeric, and [`RemoteError::InvalidPairingCode`] for a bad code.
    ///
    /// # Examples
    ///
    /// ```
    /// use mobcontrol::protocol::pairing::ConnectTarget;
    ///
    /// let target = ConnectTarget::from_qr("192.168.1.20:7777:1234")?;
    /// assert_eq!(target.port, 7777);
    /// assert_eq!(target.code.as_str(), "1234");
    /// # Ok::<(), mobcontrol::error::RemoteError>(())
    /// ```
    pub fn from_qr(payload: &str) -> Result<Self> {
        let invalid = || RemoteError::InvalidQrPayload(payload.to_string());

        let mut parts = payload.trim().split(':');
        let (host, port, code) = match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), Some(code)) => (host, port, code),
            _ => return Err(invalid()),
        };

        let host: IpAddr = host.parse().map_err(|_| invalid())?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        let code = PairingCode::parse(code)?;

        Ok(Self { host, port, code })
    }

    /// Socket address of the host.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
