//! # Joystick Mouse Smoothing
//!
//! Turns a normalized joystick vector into eased relative mouse movement.
//!
//! On every mouse tick each axis inside the deadzone is zeroed, the target
//! velocity is `axis × max_speed`, and the current velocity moves a fixed
//! fraction (`acceleration`) toward it. The rounded velocity is what gets
//! sent, so movement ramps up over a few ticks instead of jumping.

/// Smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseSettings {
    pub deadzone: f32,
    pub max_speed: f32,
    pub acceleration: f32,
}

impl Default for MouseSettings {
    fn default() -> Self {
        Self {
            deadzone: 0.1,
            max_speed: 5.0,
            acceleration: 0.3,
        }
    }
}

/// Velocity state for one on-screen joystick.
#[derive(Debug, Clone)]
pub struct MouseSmoother {
    settings: MouseSettings,
    vector: (f32, f32),
    velocity: (f32, f32),
    active: bool,
}

impl MouseSmoother {
    #[must_use]
    pub fn new(settings: MouseSettings) -> Self {
        Self {
            settings,
            vector: (0.0, 0.0),
            velocity: (0.0, 0.0),
            active: false,
        }
    }

    /// True while the joystick is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Update the joystick position; each axis is clamped to [-1, 1].
    ///
    /// The first update after a release starts from zero velocity.
    pub fn set_vector(&mut self, x: f32, y: f32) {
        if !self.active {
            self.velocity = (0.0, 0.0);
            self.active = true;
        }
        self.vector = (clamp_axis(x), clamp_axis(y));
    }

    /// Advance one tick; returns the movement to send while held.
    pub fn tick(&mut self) -> Option<(i32, i32)> {
        if !self.active {
            return None;
        }

        let MouseSettings {
            deadzone,
            max_speed,
            acceleration,
        } = self.settings;
        let apply_deadzone = |v: f32| if v.abs() < deadzone { 0.0 } else { v };

        let target_x = apply_deadzone(self.vector.0) * max_speed;
        let target_y = apply_deadzone(self.vector.1) * max_speed;

        self.velocity.0 += (target_x - self.velocity.0) * acceleration;
        self.velocity.1 += (target_y - self.velocity.1) * acceleration;

        Some((self.velocity.0.round() as i32, self.velocity.1.round() as i32))
    }

    /// Stop moving; the caller sends one final `(0, 0)` movement.
    pub fn release(&mut self) -> (i32, i32) {
        self.active = false;
        self.vector = (0.0, 0.0);
        self.velocity = (0.0, 0.0);
        (0, 0)
    }
}

fn clamp_axis(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
