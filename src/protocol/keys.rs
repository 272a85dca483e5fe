//! # Key Vocabulary
//!
//! Names the desktop host understands verbatim. The host maps each name
//! straight onto a virtual key, so anything outside this set is rejected
//! before it reaches the wire.
//!
//! | Group | Names |
//! |-------|-------|
//! | Characters | `a`-`z`, `0`-`9` |
//! | Editing | `space`, `enter`, `shift`, `ctrl`, `alt`, `tab`, `esc`, `backspace` |
//! | Arrows | `up`, `down`, `left`, `right` |
//! | Function | `f1`-`f12` |
//!
//! Mouse buttons use their own two-word vocabulary: `left` and `right`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, Result};

/// Named (multi-character) keys accepted by the host.
pub const NAMED_KEYS: &[&str] = &[
    "space",
    "enter",
    "shift",
    "ctrl",
    "alt",
    "tab",
    "esc",
    "backspace",
    "up",
    "down",
    "left",
    "right",
];

/// Highest function key number.
pub const MAX_FUNCTION_KEY: u8 = 12;

/// A validated key name from the host vocabulary.
///
/// # Examples
///
/// ```
/// use mobcontrol::protocol::keys::KeyName;
///
/// let key = KeyName::parse("w")?;
/// assert_eq!(key.as_str(), "w");
/// assert!(KeyName::parse("W").is_err());
/// # Ok::<(), mobcontrol::error::RemoteError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyName(String);

impl KeyName {
    /// Validates `name` against the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidKey`] if the host would not recognise it.
    pub fn parse(name: &str) -> Result<Self> {
        Self::try_from(name.to_string())
    }

    /// The wire spelling of this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeyName {
    type Error = RemoteError;

    fn try_from(name: String) -> Result<Self> {
        if is_known_key(&name) {
            Ok(Self(name))
        } else {
            Err(RemoteError::InvalidKey(name))
        }
    }
}

impl From<KeyName> for String {
    fn from(key: KeyName) -> Self {
        key.0
    }
}

impl FromStr for KeyName {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_known_key(name: &str) -> bool {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_ascii_lowercase() || c.is_ascii_digit();
    }

    if NAMED_KEYS.contains(&name) {
        return true;
    }

    name.strip_prefix('f')
        .filter(|n| !n.starts_with('0'))
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=MAX_FUNCTION_KEY).contains(&n))
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    /// The wire spelling of this button.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            other => Err(RemoteError::InvalidKey(other.to_string())),
        }
    }
}
