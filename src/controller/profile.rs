//! # Control Profiles
//!
//! One table of per-layout motion constants, selected at session start.
//!
//! | Profile | Motion mapping | Keys | Gyro stream |
//! |---------|----------------|------|-------------|
//! | Racing | PWM on roll, deadzone 8°, max 30°, 100 ms cycle | `a` / `d` | no |
//! | Flight | Hysteresis gates, Ta 15°, Td 10° | `w` `s` `a` `d` | yes |
//! | Buttons | none | - | no |

use serde::Deserialize;

use super::hysteresis::{Axis, DigitalInputMapper, Direction, KeyGate};
use super::orientation::OrientationSample;
use super::pwm::{PwmSettings, PwmSteering};
use super::KeyTransition;
use crate::error::Result;
use crate::protocol::keys::KeyName;

/// Racing steering deadzone in degrees
pub const RACING_DEADZONE: f32 = 8.0;
/// Racing tilt for full steering in degrees
pub const RACING_MAX_ANGLE: f32 = 30.0;
/// Racing PWM cycle length
pub const RACING_CYCLE_MS: u64 = 100;

/// Flight gate activation threshold in degrees
pub const FLIGHT_ACTIVATE: f32 = 15.0;
/// Flight gate deactivation threshold in degrees
pub const FLIGHT_DEACTIVATE: f32 = 10.0;

/// Profile names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Racing,
    Flight,
    Buttons,
}

/// Declarative description of one gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSpec {
    pub key: &'static str,
    pub axis: Axis,
    pub direction: Direction,
    pub activate: f32,
    pub deactivate: f32,
}

/// How orientation turns into keys for a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionSpec {
    Pwm {
        axis: Axis,
        deadzone: f32,
        max_angle: f32,
        cycle_ms: u64,
        left: &'static str,
        right: &'static str,
    },
    Digital(Vec<GateSpec>),
    None,
}

/// Constants for one controller layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlProfile {
    pub kind: ProfileKind,
    pub motion: MotionSpec,
    /// Also stream raw `gyro_data` to the host
    pub streams_gyro: bool,
}

impl ControlProfile {
    #[must_use]
    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Racing => Self::racing(),
            ProfileKind::Flight => Self::flight(),
            ProfileKind::Buttons => Self::buttons(),
        }
    }

    #[must_use]
    pub fn racing() -> Self {
        Self {
            kind: ProfileKind::Racing,
            motion: MotionSpec::Pwm {
                axis: Axis::Roll,
                deadzone: RACING_DEADZONE,
                max_angle: RACING_MAX_ANGLE,
                cycle_ms: RACING_CYCLE_MS,
                left: "a",
                right: "d",
            },
            streams_gyro: false,
        }
    }

    #[must_use]
    pub fn flight() -> Self {
        let gate = |key, axis, direction| GateSpec {
            key,
            axis,
            direction,
            activate: FLIGHT_ACTIVATE,
            deactivate: FLIGHT_DEACTIVATE,
        };

        Self {
            kind: ProfileKind::Flight,
            motion: MotionSpec::Digital(vec![
                gate("w", Axis::Pitch, Direction::Negative),
                gate("s", Axis::Pitch, Direction::Positive),
                gate("a", Axis::Roll, Direction::Negative),
                gate("d", Axis::Roll, Direction::Positive),
            ]),
            streams_gyro: true,
        }
    }

    #[must_use]
    pub fn buttons() -> Self {
        Self {
            kind: ProfileKind::Buttons,
            motion: MotionSpec::None,
            streams_gyro: false,
        }
    }

    /// Build the stateful mapper for this profile.
    ///
    /// # Errors
    ///
    /// Propagates key, threshold and gate-count validation errors.
    pub fn build_mapper(&self) -> Result<MotionMapper> {
        match &self.motion {
            MotionSpec::Pwm {
                axis,
                deadzone,
                max_angle,
                cycle_ms,
                left,
                right,
            } => Ok(MotionMapper::Pwm {
                axis: *axis,
                steering: PwmSteering::new(PwmSettings {
                    deadzone: *deadzone,
                    max_angle: *max_angle,
                    cycle_ms: *cycle_ms,
                    left: KeyName::parse(left)?,
                    right: KeyName::parse(right)?,
                })?,
            }),
            MotionSpec::Digital(specs) => {
                let gates = specs
                    .iter()
                    .map(|spec| {
                        KeyGate::new(
                            KeyName::parse(spec.key)?,
                            spec.axis,
                            spec.direction,
                            spec.activate,
                            spec.deactivate,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(MotionMapper::Digital(DigitalInputMapper::new(gates)?))
            }
            MotionSpec::None => Ok(MotionMapper::None),
        }
    }
}

/// Stateful motion mapper built from a profile.
#[derive(Debug, Clone)]
pub enum MotionMapper {
    /// Evaluated on every orientation sample
    Digital(DigitalInputMapper),
    /// Evaluated on every PWM tick against the latest sample
    Pwm { axis: Axis, steering: PwmSteering },
    None,
}

impl MotionMapper {
    /// Transitions triggered directly by a new sample.
    pub fn on_sample(&mut self, sample: OrientationSample) -> Vec<KeyTransition> {
        match self {
            MotionMapper::Digital(mapper) => mapper.process(sample),
            MotionMapper::Pwm { .. } | MotionMapper::None => Vec::new(),
        }
    }

    /// Transitions produced by a PWM tick.
    pub fn on_tick(&mut self, sample: OrientationSample, now_ms: u64) -> Vec<KeyTransition> {
        match self {
            MotionMapper::Pwm { axis, steering } => steering.tick(axis.read(sample), now_ms),
            MotionMapper::Digital(_) | MotionMapper::None => Vec::new(),
        }
    }

    /// True if the mapper needs the PWM tick timer.
    #[must_use]
    pub fn uses_ticks(&self) -> bool {
        matches!(self, MotionMapper::Pwm { .. })
    }

    /// Key-up for every key the mapper holds.
    pub fn release_all(&mut self) -> Vec<KeyTransition> {
        match self {
            MotionMapper::Digital(mapper) => mapper.release_all(),
            MotionMapper::Pwm { steering, .. } => steering.release_all(),
            MotionMapper::None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> KeyName {
        KeyName::parse(name).unwrap()
    }

    #[test]
    fn test_for_kind() {
        assert_eq!(ControlProfile::for_kind(ProfileKind::Racing), ControlProfile::racing());
        assert_eq!(ControlProfile::for_kind(ProfileKind::Flight), ControlProfile::flight());
        assert_eq!(ControlProfile::for_kind(ProfileKind::Buttons), ControlProfile::buttons());
    }

    #[test]
    fn test_racing_constants() {
        let profile = ControlProfile::racing();
        assert!(!profile.streams_gyro);
        match profile.motion {
            MotionSpec::Pwm {
                axis,
                deadzone,
                max_angle,
                cycle_ms,
                left,
                right,
            } => {
                assert_eq!(axis, Axis::Roll);
                assert_eq!(deadzone, 8.0);
                assert_eq!(max_angle, 30.0);
                assert_eq!(cycle_ms, 100);
                assert_eq!((left, right), ("a", "d"));
            }
            other => panic!("Expected PWM motion, got {:?}", other),
        }
    }

    #[test]
    fn test_flight_gates() {
        let profile = ControlProfile::flight();
        assert!(profile.streams_gyro);
        let MotionSpec::Digital(gates) = profile.motion else {
            panic!("Expected digital motion");
        };

        let keys: Vec<_> = gates.iter().map(|g| (g.key, g.axis, g.direction)).collect();
        assert_eq!(
            keys,
            vec![
                ("w", Axis::Pitch, Direction::Negative),
                ("s", Axis::Pitch, Direction::Positive),
                ("a", Axis::Roll, Direction::Negative),
                ("d", Axis::Roll, Direction::Positive),
            ]
        );
        assert!(gates.iter().all(|g| g.activate == 15.0 && g.deactivate == 10.0));
    }

    #[test]
    fn test_build_racing_mapper() {
        let mut mapper = ControlProfile::racing().build_mapper().unwrap();
        assert!(mapper.uses_ticks());

        let tilt = OrientationSample::new(-29.0, 0.0);
        assert!(mapper.on_sample(tilt).is_empty());
        assert_eq!(mapper.on_tick(tilt, 0), vec![KeyTransition::down(key("a"))]);
        assert_eq!(mapper.release_all(), vec![KeyTransition::up(key("a"))]);
    }

    #[test]
    fn test_racing_ignores_pitch() {
        let mut mapper = ControlProfile::racing().build_mapper().unwrap();
        assert!(mapper.on_tick(OrientationSample::new(0.0, 45.0), 0).is_empty());
    }

    #[test]
    fn test_build_flight_mapper() {
        let mut mapper = ControlProfile::flight().build_mapper().unwrap();
        assert!(!mapper.uses_ticks());

        let transitions = mapper.on_sample(OrientationSample::new(0.0, -20.0));
        assert_eq!(transitions, vec![KeyTransition::down(key("w"))]);
        assert!(mapper.on_tick(OrientationSample::new(0.0, -20.0), 0).is_empty());
        assert_eq!(mapper.release_all(), vec![KeyTransition::up(key("w"))]);
    }

    #[test]
    fn test_build_buttons_mapper() {
        let mut mapper = ControlProfile::buttons().build_mapper().unwrap();
        assert!(matches!(mapper, MotionMapper::None));
        assert!(mapper.on_sample(OrientationSample::new(90.0, 90.0)).is_empty());
        assert!(mapper.release_all().is_empty());
    }

    #[test]
    fn test_invalid_gate_spec() {
        let profile = ControlProfile {
            kind: ProfileKind::Flight,
            motion: MotionSpec::Digital(vec![GateSpec {
                key: "w",
                axis: Axis::Pitch,
                direction: Direction::Negative,
                activate: 5.0,
                deactivate: 10.0,
            }]),
            streams_gyro: false,
        };
        assert!(profile.build_mapper().is_err());
    }
}
