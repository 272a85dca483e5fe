//! # Input Dispatcher
//!
//! Maps high-level control events to wire messages and hands them to the
//! session's send queue. Holds no input state of its own.

use tracing::trace;

use crate::controller::KeyTransition;
use crate::error::Result;
use crate::protocol::keys::{KeyName, MouseButton};
use crate::protocol::message::WireMessage;
use crate::transport::SessionHandle;

/// One discrete input from a controller screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Key { key: KeyName, pressed: bool },
    MouseMove { x: i32, y: i32 },
    MouseButton { button: MouseButton, pressed: bool },
    Gyro { pitch: f32, roll: f32 },
}

impl ControlEvent {
    /// The wire message for this event.
    ///
    /// `player` is attached to key messages only.
    #[must_use]
    pub fn to_wire(&self, player: Option<u8>) -> WireMessage {
        match self {
            ControlEvent::Key { key, pressed } => WireMessage::Key {
                key: key.clone(),
                pressed: *pressed,
                player,
            },
            ControlEvent::MouseMove { x, y } => WireMessage::MouseMove { x: *x, y: *y },
            ControlEvent::MouseButton { button, pressed } => WireMessage::MouseButton {
                button: *button,
                pressed: *pressed,
            },
            ControlEvent::Gyro { pitch, roll } => WireMessage::GyroData {
                pitch: *pitch,
                roll: *roll,
            },
        }
    }
}

impl From<KeyTransition> for ControlEvent {
    fn from(transition: KeyTransition) -> Self {
        ControlEvent::Key {
            key: transition.key,
            pressed: transition.pressed,
        }
    }
}

/// Forwards control events to one session.
#[derive(Debug, Clone)]
pub struct InputDispatcher {
    session: SessionHandle,
    player: Option<u8>,
}

impl InputDispatcher {
    /// # Arguments
    ///
    /// * `session` - Handle of the active session
    /// * `player` - Multiplayer slot (1-4) stamped on key messages, if any
    #[must_use]
    pub fn new(session: SessionHandle, player: Option<u8>) -> Self {
        Self { session, player }
    }

    #[must_use]
    pub fn player(&self) -> Option<u8> {
        self.player
    }

    /// Queue one event; never waits for the network.
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed` once the session is shutting down.
    pub fn dispatch(&self, event: ControlEvent) -> Result<()> {
        let message = event.to_wire(self.player);
        trace!("Dispatching {:?}", message);
        self.session.send(message)
    }
}
