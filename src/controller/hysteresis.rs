//! # Digital Input Mapper
//!
//! Hysteresis-gated key emulation from continuous angles.
//!
//! Each [`KeyGate`] watches one axis in one direction and uses two
//! thresholds so the key cannot chatter while the angle hovers near a
//! single boundary:
//!
//! ```text
//!            released ──(signed > Ta)──▶ pressed
//!            released ◀─(signed ≤ Td)─── pressed
//!
//!   signed = angle × direction sign,   0 ≤ Td < Ta
//! ```
//!
//! While the angle stays within `[Td, Ta]` the key keeps whatever state it
//! had.

use super::orientation::OrientationSample;
use super::KeyTransition;
use crate::error::{RemoteError, Result};
use crate::protocol::keys::KeyName;

/// Maximum number of gates a [`DigitalInputMapper`] runs.
pub const MAX_GATES: usize = 4;

/// Orientation axis a gate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Roll,
    Pitch,
}

impl Axis {
    #[must_use]
    pub fn read(self, sample: OrientationSample) -> f32 {
        match self {
            Axis::Roll => sample.roll,
            Axis::Pitch => sample.pitch,
        }
    }
}

/// Tilt direction that presses the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    #[must_use]
    pub fn sign(self) -> f32 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

/// One key driven by one axis with activation/deactivation thresholds.
#[derive(Debug, Clone)]
pub struct KeyGate {
    key: KeyName,
    axis: Axis,
    direction: Direction,
    activate: f32,
    deactivate: f32,
    pressed: bool,
}

impl KeyGate {
    /// Creates a released gate.
    ///
    /// # Arguments
    ///
    /// * `key` - Key to press
    /// * `axis` - Axis to read
    /// * `direction` - Which sign of the angle presses the key
    /// * `activate` - Ta in degrees; press when the signed angle exceeds it
    /// * `deactivate` - Td in degrees; release when the signed angle no longer exceeds it
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidThresholds`] unless `0 ≤ Td < Ta`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mobcontrol::controller::hysteresis::{Axis, Direction, KeyGate};
    /// use mobcontrol::protocol::keys::KeyName;
    ///
    /// let gate = KeyGate::new(KeyName::parse("w")?, Axis::Pitch, Direction::Negative, 15.0, 10.0);
    /// assert!(gate.is_ok());
    ///
    /// let bad = KeyGate::new(KeyName::parse("w")?, Axis::Pitch, Direction::Negative, 10.0, 15.0);
    /// assert!(bad.is_err());
    /// # Ok::<(), mobcontrol::error::RemoteError>(())
    /// ```
    pub fn new(
        key: KeyName,
        axis: Axis,
        direction: Direction,
        activate: f32,
        deactivate: f32,
    ) -> Result<Self> {
        if !(0.0 <= deactivate && deactivate < activate) || !activate.is_finite() {
            return Err(RemoteError::InvalidThresholds {
                activate,
                deactivate,
            });
        }

        Ok(Self {
            key,
            axis,
            direction,
            activate,
            deactivate,
            pressed: false,
        })
    }

    #[must_use]
    pub fn key(&self) -> &KeyName {
        &self.key
    }

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Feed one angle in degrees; returns the transition, if any.
    pub fn update_angle(&mut self, angle: f32) -> Option<KeyTransition> {
        let signed = angle * self.direction.sign();

        if !self.pressed && signed > self.activate {
            self.pressed = true;
            Some(KeyTransition::down(self.key.clone()))
        } else if self.pressed && !(signed > self.deactivate) {
            self.pressed = false;
            Some(KeyTransition::up(self.key.clone()))
        } else {
            None
        }
    }

    /// Feed one sample, reading this gate's axis.
    pub fn update(&mut self, sample: OrientationSample) -> Option<KeyTransition> {
        self.update_angle(self.axis.read(sample))
    }

    /// Release the key if pressed.
    pub fn release(&mut self) -> Option<KeyTransition> {
        if self.pressed {
            self.pressed = false;
            Some(KeyTransition::up(self.key.clone()))
        } else {
            None
        }
    }
}

/// Up to [`MAX_GATES`] independent gates evaluated on every sample.
#[derive(Debug, Clone, Default)]
pub struct DigitalInputMapper {
    gates: Vec<KeyGate>,
}

impl DigitalInputMapper {
    /// # Errors
    ///
    /// Returns [`RemoteError::TooManyGates`] for more than [`MAX_GATES`] gates.
    pub fn new(gates: Vec<KeyGate>) -> Result<Self> {
        if gates.len() > MAX_GATES {
            return Err(RemoteError::TooManyGates {
                count: gates.len(),
                max: MAX_GATES,
            });
        }
        Ok(Self { gates })
    }

    #[must_use]
    pub fn gates(&self) -> &[KeyGate] {
        &self.gates
    }

    /// Evaluate every gate against `sample`, in gate order.
    pub fn process(&mut self, sample: OrientationSample) -> Vec<KeyTransition> {
        self.gates
            .iter_mut()
            .filter_map(|gate| gate.update(sample))
            .collect()
    }

    /// Key-up for every gate still pressed.
    pub fn release_all(&mut self) -> Vec<KeyTransition> {
        self.gates.iter_mut().filter_map(KeyGate::release).collect()
    }
}
