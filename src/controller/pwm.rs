//! # PWM Steering Emulator
//!
//! Approximates analog steering with a digital key by toggling it at a
//! duty cycle proportional to the tilt.
//!
//! ## Intensity
//!
//! `intensity = clamp((|angle| − deadzone) / (max_angle − deadzone), 0, 1)`
//!
//! ## Duty Bands
//!
//! | Intensity | Duty |
//! |-----------|------|
//! | < 0.15 | 0% |
//! | 0.15 – 0.35 | 50% |
//! | 0.35 – 0.65 | 80% |
//! | 0.65 – 0.85 | 95% |
//! | ≥ 0.85 | 100% |
//!
//! ## Timing
//!
//! The key is on while `now mod cycle < duty × cycle`. Ticks should come
//! much faster than the cycle (10 ms ticks for a 100 ms cycle) so the phase
//! actually sweeps the whole cycle; a tick period equal to the cycle would
//! always sample the same phase.
//!
//! Negative angles steer with the left key, positive with the right. The
//! two are never on at the same time.

use super::KeyTransition;
use crate::error::{RemoteError, Result};
use crate::protocol::keys::KeyName;

/// Upper intensity bound and duty fraction for each band below full duty.
pub const DEFAULT_DUTY_BANDS: [(f32, f32); 4] =
    [(0.15, 0.0), (0.35, 0.5), (0.65, 0.8), (0.85, 0.95)];

/// Source of monotonic-enough milliseconds for PWM phase.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Wall clock milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Normalized steering intensity in [0, 1].
#[must_use]
pub fn steering_intensity(angle: f32, deadzone: f32, max_angle: f32) -> f32 {
    let magnitude = angle.abs();
    if !(magnitude > deadzone) {
        return 0.0;
    }
    ((magnitude - deadzone) / (max_angle - deadzone)).clamp(0.0, 1.0)
}

/// Duty fraction for an intensity using [`DEFAULT_DUTY_BANDS`].
#[must_use]
pub fn duty_for_intensity(intensity: f32) -> f32 {
    DEFAULT_DUTY_BANDS
        .iter()
        .find(|(below, _)| intensity < *below)
        .map_or(1.0, |(_, duty)| *duty)
}

/// Steering emulator parameters.
#[derive(Debug, Clone)]
pub struct PwmSettings {
    /// Degrees of tilt ignored around center
    pub deadzone: f32,
    /// Tilt in degrees mapped to full intensity
    pub max_angle: f32,
    pub cycle_ms: u64,
    pub left: KeyName,
    pub right: KeyName,
}

/// Duty-cycle key emulator for one steering axis.
#[derive(Debug, Clone)]
pub struct PwmSteering {
    settings: PwmSettings,
    left_on: bool,
    right_on: bool,
}

impl PwmSteering {
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidThresholds`] unless
    /// `0 ≤ deadzone < max_angle`, and [`RemoteError::Protocol`] for a zero
    /// cycle length.
    pub fn new(settings: PwmSettings) -> Result<Self> {
        if !(0.0 <= settings.deadzone && settings.deadzone < settings.max_angle)
            || !settings.max_angle.is_finite()
        {
            return Err(RemoteError::InvalidThresholds {
                activate: settings.max_angle,
                deactivate: settings.deadzone,
            });
        }
        if settings.cycle_ms == 0 {
            return Err(RemoteError::Protocol(
                "PWM cycle length must be positive".to_string(),
            ));
        }

        Ok(Self {
            settings,
            left_on: false,
            right_on: false,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &PwmSettings {
        &self.settings
    }

    /// (left, right) key states as last emitted.
    #[must_use]
    pub fn state(&self) -> (bool, bool) {
        (self.left_on, self.right_on)
    }

    /// Advance the emulator with the current angle.
    ///
    /// # Arguments
    ///
    /// * `angle` - Calibrated steering angle in degrees
    /// * `now_ms` - Current time, used only for the cycle phase
    ///
    /// # Returns
    ///
    /// Transitions to send, in order. A forced release of the opposite key
    /// always comes before the active key's transition.
    pub fn tick(&mut self, angle: f32, now_ms: u64) -> Vec<KeyTransition> {
        let PwmSettings {
            deadzone,
            max_angle,
            cycle_ms,
            ..
        } = self.settings;

        if !(angle.abs() > deadzone) {
            return self.release_all();
        }

        let mut transitions = Vec::with_capacity(2);
        let steer_left = angle < 0.0;

        if steer_left && self.right_on {
            self.right_on = false;
            transitions.push(KeyTransition::up(self.settings.right.clone()));
        } else if !steer_left && self.left_on {
            self.left_on = false;
            transitions.push(KeyTransition::up(self.settings.left.clone()));
        }

        let duty = duty_for_intensity(steering_intensity(angle, deadzone, max_angle));
        let phase = now_ms % cycle_ms;
        let desired = (phase as f32) < duty * cycle_ms as f32;

        let (state, key) = if steer_left {
            (&mut self.left_on, &self.settings.left)
        } else {
            (&mut self.right_on, &self.settings.right)
        };

        if *state != desired {
            *state = desired;
            transitions.push(KeyTransition {
                key: key.clone(),
                pressed: desired,
            });
        }

        transitions
    }

    /// Release whichever key is on.
    pub fn release_all(&mut self) -> Vec<KeyTransition> {
        let mut transitions = Vec::new();
        if self.left_on {
            self.left_on = false;
            transitions.push(KeyTransition::up(self.settings.left.clone()));
        }
        if self.right_on {
            self.right_on = false;
            transitions.push(KeyTransition::up(self.settings.right.clone()));
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADZONE: f32 = 8.0;
    const MAX_ANGLE: f32 = 30.0;

    fn key(name: &str) -> KeyName {
        KeyName::parse(name).unwrap()
    }

    fn steering() -> PwmSteering {
        PwmSteering::new(PwmSettings {
            deadzone: DEADZONE,
            max_angle: MAX_ANGLE,
            cycle_ms: 100,
            left: key("a"),
            right: key("d"),
        })
        .unwrap()
    }

    /// Angle producing `intensity` with the racing deadzone and max angle.
    fn angle_for(intensity: f32) -> f32 {
        DEADZONE + intensity * (MAX_ANGLE - DEADZONE)
    }

    /// Key state after each 10 ms tick across `ms` milliseconds.
    fn trace(pwm: &mut PwmSteering, angle: f32, ms: u64) -> Vec<(bool, bool)> {
        (0..ms)
            .step_by(10)
            .map(|now| {
                pwm.tick(angle, now);
                pwm.state()
            })
            .collect()
    }

    // ==================== Intensity and Duty Tests ====================

    #[test]
    fn test_intensity_deadzone() {
        assert_eq!(steering_intensity(0.0, DEADZONE, MAX_ANGLE), 0.0);
        assert_eq!(steering_intensity(8.0, DEADZONE, MAX_ANGLE), 0.0);
        assert_eq!(steering_intensity(-8.0, DEADZONE, MAX_ANGLE), 0.0);
    }

    #[test]
    fn test_intensity_scaling() {
        assert!((steering_intensity(19.0, DEADZONE, MAX_ANGLE) - 0.5).abs() < 0.001);
        assert!((steering_intensity(-19.0, DEADZONE, MAX_ANGLE) - 0.5).abs() < 0.001);
        assert_eq!(steering_intensity(30.0, DEADZONE, MAX_ANGLE), 1.0);
        assert_eq!(steering_intensity(85.0, DEADZONE, MAX_ANGLE), 1.0);
    }

    #[test]
    fn test_duty_bands() {
        assert_eq!(duty_for_intensity(0.0), 0.0);
        assert_eq!(duty_for_intensity(0.149), 0.0);
        assert_eq!(duty_for_intensity(0.15), 0.5);
        assert_eq!(duty_for_intensity(0.34), 0.5);
        assert_eq!(duty_for_intensity(0.35), 0.8);
        assert_eq!(duty_for_intensity(0.65), 0.95);
        assert_eq!(duty_for_intensity(0.85), 1.0);
        assert_eq!(duty_for_intensity(1.0), 1.0);
    }

    #[test]
    fn test_invalid_settings() {
        let mut settings = steering().settings().clone();
        settings.deadzone = 30.0;
        assert!(PwmSteering::new(settings.clone()).is_err());

        settings.deadzone = 8.0;
        settings.cycle_ms = 0;
        assert!(PwmSteering::new(settings).is_err());
    }

    // ==================== Duty Cycle Tests ====================

    #[test]
    fn test_full_duty_stays_on_whole_cycle() {
        let mut pwm = steering();
        let states = trace(&mut pwm, -angle_for(0.9), 200);
        assert!(states.iter().all(|&(left, right)| left && !right));
    }

    #[test]
    fn test_half_duty_first_half_of_cycle() {
        let mut pwm = steering();
        let states = trace(&mut pwm, angle_for(0.2), 100);

        for (i, &(left, right)) in states.iter().enumerate() {
            assert!(!left);
            assert_eq!(right, i * 10 < 50, "at {} ms", i * 10);
        }
    }

    #[test]
    fn test_half_duty_transitions() {
        let mut pwm = steering();
        let angle = angle_for(0.2);

        assert_eq!(pwm.tick(angle, 0), vec![KeyTransition::down(key("d"))]);
        assert!(pwm.tick(angle, 40).is_empty());
        assert_eq!(pwm.tick(angle, 50), vec![KeyTransition::up(key("d"))]);
        assert!(pwm.tick(angle, 90).is_empty());
        assert_eq!(pwm.tick(angle, 100), vec![KeyTransition::down(key("d"))]);
    }

    #[test]
    fn test_eighty_percent_duty() {
        let mut pwm = steering();
        let states = trace(&mut pwm, angle_for(0.5), 100);
        let on = states.iter().filter(|&&(_, right)| right).count();
        assert_eq!(on, 8);
    }

    #[test]
    fn test_low_intensity_never_presses() {
        let mut pwm = steering();
        let states = trace(&mut pwm, angle_for(0.1), 300);
        assert!(states.iter().all(|&s| s == (false, false)));
    }

    // ==================== Direction Tests ====================

    #[test]
    fn test_deadzone_releases_active_key() {
        let mut pwm = steering();
        pwm.tick(-25.0, 0);
        assert_eq!(pwm.state(), (true, false));

        assert_eq!(pwm.tick(3.0, 10), vec![KeyTransition::up(key("a"))]);
        assert_eq!(pwm.state(), (false, false));
        assert!(pwm.tick(-8.0, 20).is_empty());
    }

    #[test]
    fn test_direction_switch_releases_opposite_first() {
        let mut pwm = steering();
        pwm.tick(-25.0, 0);

        assert_eq!(
            pwm.tick(25.0, 10),
            vec![KeyTransition::up(key("a")), KeyTransition::down(key("d"))]
        );
    }

    #[test]
    fn test_never_both_keys_on() {
        let mut pwm = steering();
        let angles = [-29.0, 29.0, -12.0, 14.0, -20.0, 0.0, 25.0, -25.0, 11.0, -11.0];

        for now in (0..2000).step_by(10) {
            let angle = angles[(now / 70) as usize % angles.len()];
            pwm.tick(angle, now);
            assert_ne!(pwm.state(), (true, true), "both keys on at {} ms", now);
        }
    }

    #[test]
    fn test_nan_angle_releases() {
        let mut pwm = steering();
        pwm.tick(25.0, 0);
        assert_eq!(pwm.tick(f32::NAN, 10), vec![KeyTransition::up(key("d"))]);
    }

    #[test]
    fn test_release_all() {
        let mut pwm = steering();
        assert!(pwm.release_all().is_empty());
        pwm.tick(25.0, 0);
        assert_eq!(pwm.release_all(), vec![KeyTransition::up(key("d"))]);
        assert_eq!(pwm.state(), (false, false));
    }

    // ==================== Clock Tests ====================

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now_ms();
        assert!(first > 0);
        assert!(clock.now_ms() >= first);
    }

    #[test]
    fn test_mock_clock_drives_tick() {
        let mut clock = MockClock::new();
        clock.expect_now_ms().times(2).returning({
            let mut t = 0;
            move || {
                let now = t;
                t += 60;
                now
            }
        });

        let mut pwm = steering();
        let angle = angle_for(0.2);
        assert_eq!(pwm.tick(angle, clock.now_ms()), vec![KeyTransition::down(key("d"))]);
        assert_eq!(pwm.tick(angle, clock.now_ms()), vec![KeyTransition::up(key("d"))]);
    }
}
