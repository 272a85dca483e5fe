//! # Orientation Module
//!
//! Turns raw rotation vector samples into calibrated roll/pitch angles.
//!
//! ## Pipeline
//!
//! ```text
//! [x, y, z, (w)] → rotation matrix → mounting remap → Euler angles
//!                → degrees → normalize → subtract offset → normalize
//! ```
//!
//! The rotation matrix is row-major, `m[3 * row + col]`. Euler extraction
//! follows the usual sensor convention:
//!
//! - `pitch = asin(−m21)`
//! - `roll = atan2(−m20, m22)`
//!
//! ## Mounting
//!
//! | Mounting | Remap | Used by |
//! |----------|-------|---------|
//! | Portrait | identity | flight and button layouts held upright |
//! | Landscape | X→Y, Y→−X | racing and universal layouts |
//!
//! ## Usage
//!
//! ```
//! use mobcontrol::controller::orientation::{Mounting, OrientationProcessor};
//!
//! let mut processor = OrientationProcessor::new(Mounting::Portrait);
//!
//! // Identity quaternion: device flat, no rotation
//! let sample = processor.process(&[0.0, 0.0, 0.0, 1.0])?;
//! assert!(sample.roll.abs() < 0.001);
//! assert!(sample.pitch.abs() < 0.001);
//! # Ok::<(), mobcontrol::error::RemoteError>(())
//! ```

use serde::Deserialize;
use tracing::debug;

use super::calibration::CalibrationOffset;
use crate::error::{RemoteError, Result};

/// Row-major 3×3 rotation matrix.
pub type RotationMatrix = [f32; 9];

/// Calibrated orientation in degrees, each angle in (-180, 180].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationSample {
    pub roll: f32,
    pub pitch: f32,
}

impl OrientationSample {
    #[must_use]
    pub fn new(roll: f32, pitch: f32) -> Self {
        Self { roll, pitch }
    }
}

/// How the device is held relative to its natural orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mounting {
    Portrait,
    Landscape,
}

impl Mounting {
    /// Remap the matrix axes for this mounting.
    #[must_use]
    pub fn remap(self, m: &RotationMatrix) -> RotationMatrix {
        match self {
            Mounting::Portrait => *m,
            Mounting::Landscape => {
                let mut out = [0.0; 9];
                for row in 0..3 {
                    let i = row * 3;
                    out[i] = -m[i + 1];
                    out[i + 1] = m[i];
                    out[i + 2] = m[i + 2];
                }
                out
            }
        }
    }
}

/// Build a rotation matrix from a rotation vector sample.
///
/// # Arguments
///
/// * `values` - `[x, y, z]` or `[x, y, z, w]` unit quaternion components.
///   When `w` is absent it is derived as `sqrt(max(0, 1 − x² − y² − z²))`.
///   Extra trailing components are ignored.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidSample`] for fewer than 3 components or
/// non-finite values.
pub fn rotation_matrix_from_vector(values: &[f32]) -> Result<RotationMatrix> {
    if values.len() < 3 {
        return Err(RemoteError::InvalidSample(format!(
            "expected at least 3 components, got {}",
            values.len()
        )));
    }

    let components = &values[..values.len().min(4)];
    if components.iter().any(|v| !v.is_finite()) {
        return Err(RemoteError::InvalidSample(
            "components must be finite".to_string(),
        ));
    }

    let (x, y, z) = (components[0], components[1], components[2]);
    let w = match components.get(3) {
        Some(&w) => w,
        None => (1.0 - x * x - y * y - z * z).max(0.0).sqrt(),
    };

    let (xx, yy, zz) = (2.0 * x * x, 2.0 * y * y, 2.0 * z * z);
    let (xy, xz, yz) = (2.0 * x * y, 2.0 * x * z, 2.0 * y * z);
    let (xw, yw, zw) = (2.0 * x * w, 2.0 * y * w, 2.0 * z * w);

    Ok([
        1.0 - yy - zz,
        xy - zw,
        xz + yw,
        xy + zw,
        1.0 - xx - zz,
        yz - xw,
        xz - yw,
        yz + xw,
        1.0 - xx - yy,
    ])
}

/// Extract `(pitch, roll)` in radians from a rotation matrix.
#[must_use]
pub fn euler_angles(m: &RotationMatrix) -> (f32, f32) {
    let pitch = (-m[7]).clamp(-1.0, 1.0).asin();
    let roll = (-m[6]).atan2(m[8]);
    (pitch, roll)
}

/// Map any angle in degrees to (-180, 180].
#[must_use]
pub fn normalize_degrees(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Stateful processor for one controller screen.
///
/// Holds the calibration offset and the last calibrated sample.
#[derive(Debug, Clone)]
pub struct OrientationProcessor {
    mounting: Mounting,
    offset: CalibrationOffset,
    last: Option<OrientationSample>,
}

impl OrientationProcessor {
    #[must_use]
    pub fn new(mounting: Mounting) -> Self {
        Self {
            mounting,
            offset: CalibrationOffset::default(),
            last: None,
        }
    }

    #[must_use]
    pub fn mounting(&self) -> Mounting {
        self.mounting
    }

    #[must_use]
    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    /// Last calibrated sample, if any has been processed.
    #[must_use]
    pub fn last_sample(&self) -> Option<OrientationSample> {
        self.last
    }

    /// Process one raw rotation vector sample.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidSample`] if the sample is malformed;
    /// the previous sample is kept in that case.
    pub fn process(&mut self, values: &[f32]) -> Result<OrientationSample> {
        let matrix = rotation_matrix_from_vector(values)?;
        let matrix = self.mounting.remap(&matrix);
        let (pitch, roll) = euler_angles(&matrix);

        let raw = OrientationSample {
            roll: normalize_degrees(roll.to_degrees()),
            pitch: normalize_degrees(pitch.to_degrees()),
        };
        let sample = self.offset.apply(raw);
        self.last = Some(sample);
        Ok(sample)
    }

    /// Make the current physical orientation read as zero.
    ///
    /// Returns the sample that was absorbed into the offset, or `None` if
    /// no sample has been processed yet.
    pub fn calibrate(&mut self) -> Option<OrientationSample> {
        let Some(current) = self.last else {
            debug!("Calibration requested before any orientation sample");
            return None;
        };

        self.offset.calibrate(current);
        self.last = Some(OrientationSample::default());
        Some(current)
    }

    pub fn reset_calibration(&mut self) {
        self.offset.reset();
    }
}
