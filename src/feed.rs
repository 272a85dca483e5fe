//! # Event Feed
//!
//! JSON-lines input adapter standing in for the phone's sensor and touch
//! callbacks. Each line is one object tagged by `"event"`:
//!
//! ```text
//! {"event":"rotation","values":[0.0,0.0,0.0,1.0]}
//! {"event":"key","key":"space","pressed":true}
//! {"event":"mouse_button","button":"left","pressed":false}
//! {"event":"joystick","x":0.4,"y":-0.2}
//! {"event":"joystick_release"}
//! {"event":"calibrate"}
//! ```

use serde::Deserialize;
use tracing::{debug, warn};

use crate::controller::pwm::Clock;
use crate::controller::RemoteController;
use crate::error::Result;
use crate::protocol::keys::{KeyName, MouseButton};

/// One line of the input feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    Rotation { values: Vec<f32> },
    Key { key: String, pressed: bool },
    MouseButton { button: String, pressed: bool },
    Joystick { x: f32, y: f32 },
    JoystickRelease,
    Calibrate,
}

impl FeedEvent {
    /// Hand the event to the controller.
    ///
    /// # Errors
    ///
    /// Invalid key or button names, malformed rotation samples and sends on
    /// a closed session.
    pub fn apply<C: Clock>(self, controller: &mut RemoteController<C>) -> Result<()> {
        match self {
            FeedEvent::Rotation { values } => {
                controller.on_rotation_vector(&values)?;
            }
            FeedEvent::Key { key, pressed } => {
                controller.key(KeyName::parse(&key)?, pressed)?;
            }
            FeedEvent::MouseButton { button, pressed } => {
                controller.mouse_button(button.parse::<MouseButton>()?, pressed)?;
            }
            FeedEvent::Joystick { x, y } => controller.joystick(x, y),
            FeedEvent::JoystickRelease => controller.joystick_released()?,
            FeedEvent::Calibrate => {
                if controller.calibrate().is_none() {
                    debug!("Calibration skipped, no orientation yet");
                }
            }
        }
        Ok(())
    }
}

/// Parse one feed line; blank and malformed lines yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<FeedEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed feed line {:?}: {}", line, e);
            None
        }
    }
}
