//! # Calibration Module
//!
//! Zero-point offset for orientation angles.
//!
//! Calibrating captures the current (already offset) orientation and adds
//! it to the stored offset, so the next sample taken at the same physical
//! orientation reads approximately zero. Repeated calibrations accumulate.
//! Nothing recalibrates automatically; only an explicit user action does.
//!
//! ## Usage
//!
//! ```
//! use mobcontrol::controller::calibration::CalibrationOffset;
//! use mobcontrol::controller::orientation::OrientationSample;
//!
//! let mut offset = CalibrationOffset::default();
//! let raw = OrientationSample::new(12.0, -4.0);
//!
//! offset.calibrate(offset.apply(raw));
//!
//! let zeroed = offset.apply(raw);
//! assert!(zeroed.roll.abs() < 0.001);
//! assert!(zeroed.pitch.abs() < 0.001);
//! ```

use super::orientation::{normalize_degrees, OrientationSample};

/// Accumulated roll/pitch offset in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOffset {
    roll_offset: f32,
    pitch_offset: f32,
}

impl CalibrationOffset {
    /// Creates an offset with explicit values.
    #[must_use]
    pub fn new(roll_offset: f32, pitch_offset: f32) -> Self {
        Self {
            roll_offset,
            pitch_offset,
        }
    }

    #[must_use]
    pub fn roll_offset(&self) -> f32 {
        self.roll_offset
    }

    #[must_use]
    pub fn pitch_offset(&self) -> f32 {
        self.pitch_offset
    }

    /// Absorbs `current` into the offset.
    ///
    /// # Arguments
    ///
    /// * `current` - The last processed sample, with the existing offset already applied
    pub fn calibrate(&mut self, current: OrientationSample) {
        self.roll_offset = normalize_degrees(self.roll_offset + current.roll);
        self.pitch_offset = normalize_degrees(self.pitch_offset + current.pitch);
    }

    /// Clears the offset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Subtracts the offset from a raw sample, re-normalizing both angles.
    #[must_use]
    pub fn apply(&self, raw: OrientationSample) -> OrientationSample {
        OrientationSample {
            roll: normalize_degrees(raw.roll - self.roll_offset),
            pitch: normalize_degrees(raw.pitch - self.pitch_offset),
        }
    }
}
