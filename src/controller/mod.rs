//! # Controller Module
//!
//! Motion and touch input handling for one controller screen.
//!
//! This module handles:
//! - Turning rotation vector samples into calibrated roll/pitch
//! - Hysteresis key gates and PWM steering driven by those angles
//! - Joystick-to-mouse smoothing
//! - Tracking every held key so teardown can release it
//!
//! [`RemoteController`] ties these to one active session. It is driven by a
//! single loop: sensor and touch callbacks, the PWM tick and the mouse tick
//! all call into it sequentially, so it needs no locking.

pub mod calibration;
pub mod hysteresis;
pub mod mouse;
pub mod orientation;
pub mod profile;
pub mod pwm;

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatcher::{ControlEvent, InputDispatcher};
use crate::error::{RemoteError, Result};
use crate::protocol::keys::{KeyName, MouseButton};
use crate::transport::{ActiveSession, SessionHandle};

use self::mouse::{MouseSettings, MouseSmoother};
use self::orientation::{Mounting, OrientationProcessor, OrientationSample};
use self::profile::{ControlProfile, MotionMapper};
use self::pwm::{Clock, SystemClock};

/// A key press or release produced by a motion mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyName,
    pub pressed: bool,
}

impl KeyTransition {
    #[must_use]
    pub fn down(key: KeyName) -> Self {
        Self { key, pressed: true }
    }

    #[must_use]
    pub fn up(key: KeyName) -> Self {
        Self {
            key,
            pressed: false,
        }
    }
}

/// Everything a controller screen needs besides the session.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub profile: ControlProfile,
    pub mounting: Mounting,
    /// False when the device has no rotation vector sensor
    pub motion_enabled: bool,
    pub gyro_stream_interval_ms: u64,
    pub mouse: MouseSettings,
    pub player: Option<u8>,
}

impl ControllerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            profile: ControlProfile::for_kind(config.motion.profile),
            mounting: config.motion.mounting,
            motion_enabled: config.motion.enabled,
            gyro_stream_interval_ms: config.motion.gyro_stream_interval_ms,
            mouse: MouseSettings {
                deadzone: config.mouse.deadzone,
                max_speed: config.mouse.max_speed,
                acceleration: config.mouse.acceleration,
            },
            player: config.server.player,
        }
    }
}

/// Per-screen orchestrator owning the active session.
pub struct RemoteController<C: Clock = SystemClock> {
    session: ActiveSession,
    dispatcher: InputDispatcher,
    orientation: Option<OrientationProcessor>,
    motion: MotionMapper,
    streams_gyro: bool,
    gyro_interval_ms: u64,
    last_gyro_ms: Option<u64>,
    mouse: MouseSmoother,
    held_keys: BTreeSet<KeyName>,
    held_buttons: Vec<MouseButton>,
    clock: C,
}

impl RemoteController<SystemClock> {
    /// Create a controller using wall-clock time.
    ///
    /// # Errors
    ///
    /// Fails if the profile's motion mapper cannot be built.
    pub fn new(session: ActiveSession, settings: ControllerSettings) -> Result<Self> {
        Self::with_clock(session, settings, SystemClock)
    }
}

impl<C: Clock> RemoteController<C> {
    /// Create a controller with an explicit time source.
    pub fn with_clock(
        session: ActiveSession,
        settings: ControllerSettings,
        clock: C,
    ) -> Result<Self> {
        let dispatcher = InputDispatcher::new(session.handle(), settings.player);

        let (orientation, motion) = if settings.motion_enabled {
            (
                Some(OrientationProcessor::new(settings.mounting)),
                settings.profile.build_mapper()?,
            )
        } else {
            warn!("{}", RemoteError::SensorUnavailable);
            (None, MotionMapper::None)
        };

        info!(
            "Controller ready: profile {:?}, mounting {:?}, motion {}",
            settings.profile.kind,
            settings.mounting,
            if orientation.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            session,
            dispatcher,
            orientation,
            motion,
            streams_gyro: settings.profile.streams_gyro,
            gyro_interval_ms: settings.gyro_stream_interval_ms,
            last_gyro_ms: None,
            mouse: MouseSmoother::new(settings.mouse),
            held_keys: BTreeSet::new(),
            held_buttons: Vec::new(),
            clock,
        })
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.session.handle()
    }

    #[must_use]
    pub fn motion_enabled(&self) -> bool {
        self.orientation.is_some()
    }

    /// True if [`pwm_tick`](Self::pwm_tick) should be driven.
    #[must_use]
    pub fn uses_pwm_ticks(&self) -> bool {
        self.motion.uses_ticks()
    }

    /// True while the joystick is held and mouse ticks produce movement.
    #[must_use]
    pub fn joystick_active(&self) -> bool {
        self.mouse.is_active()
    }

    /// Last calibrated orientation, if motion is enabled and sampled.
    #[must_use]
    pub fn orientation(&self) -> Option<OrientationSample> {
        self.orientation.as_ref().and_then(OrientationProcessor::last_sample)
    }

    fn send_transitions(&self, transitions: Vec<KeyTransition>) -> Result<()> {
        for transition in transitions {
            debug!(
                "Motion key {} {}",
                transition.key,
                if transition.pressed { "down" } else { "up" }
            );
            self.dispatcher.dispatch(transition.into())?;
        }
        Ok(())
    }

    /// Handle one rotation vector sample from the sensor.
    ///
    /// Returns the calibrated sample, or `None` when motion is disabled.
    ///
    /// # Errors
    ///
    /// Malformed samples yield `InvalidSample`; closed sessions yield
    /// `SessionClosed`.
    pub fn on_rotation_vector(&mut self, values: &[f32]) -> Result<Option<OrientationSample>> {
        let Some(processor) = self.orientation.as_mut() else {
            debug!("Ignoring rotation sample, motion disabled");
            return Ok(None);
        };

        let sample = processor.process(values)?;
        let transitions = self.motion.on_sample(sample);
        self.send_transitions(transitions)?;

        if self.streams_gyro {
            let now = self.clock.now_ms();
            let due = self
                .last_gyro_ms
                .map_or(true, |last| now.saturating_sub(last) >= self.gyro_interval_ms);
            if due {
                self.last_gyro_ms = Some(now);
                self.dispatcher.dispatch(ControlEvent::Gyro {
                    pitch: sample.pitch,
                    roll: sample.roll,
                })?;
            }
        }

        Ok(Some(sample))
    }

    /// Treat the current orientation as neutral.
    pub fn calibrate(&mut self) -> Option<OrientationSample> {
        let absorbed = self.orientation.as_mut()?.calibrate();
        if let Some(sample) = absorbed {
            info!(
                "Calibrated at roll {:.1}°, pitch {:.1}°",
                sample.roll, sample.pitch
            );
        }
        absorbed
    }

    /// Advance PWM steering using the latest sample.
    pub fn pwm_tick(&mut self) -> Result<()> {
        let Some(sample) = self.orientation() else {
            return Ok(());
        };
        let transitions = self.motion.on_tick(sample, self.clock.now_ms());
        self.send_transitions(transitions)
    }

    /// Touch button press or release.
    pub fn key(&mut self, key: KeyName, pressed: bool) -> Result<()> {
        if pressed {
            self.held_keys.insert(key.clone());
        } else {
            self.held_keys.remove(&key);
        }
        self.dispatcher.dispatch(ControlEvent::Key { key, pressed })
    }

    /// Touch mouse button press or release.
    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        if pressed {
            if !self.held_buttons.contains(&button) {
                self.held_buttons.push(button);
            }
        } else {
            self.held_buttons.retain(|held| *held != button);
        }
        self.dispatcher
            .dispatch(ControlEvent::MouseButton { button, pressed })
    }

    /// Update the mouse joystick vector.
    pub fn joystick(&mut self, x: f32, y: f32) {
        self.mouse.set_vector(x, y);
    }

    /// Joystick let go: stop and send one zero movement.
    pub fn joystick_released(&mut self) -> Result<()> {
        let (x, y) = self.mouse.release();
        self.dispatcher.dispatch(ControlEvent::MouseMove { x, y })
    }

    /// Advance mouse smoothing; sends movement while the joystick is held.
    pub fn mouse_tick(&mut self) -> Result<()> {
        match self.mouse.tick() {
            Some((x, y)) => self.dispatcher.dispatch(ControlEvent::MouseMove { x, y }),
            None => Ok(()),
        }
    }

    /// Release everything held, then disconnect and close the session.
    ///
    /// Key-ups and button-ups are queued ahead of the disconnect message,
    /// so the host never keeps a key stuck after the socket closes.
    pub async fn shutdown(mut self) -> Result<()> {
        let mut releases: Vec<ControlEvent> = self
            .motion
            .release_all()
            .into_iter()
            .map(ControlEvent::from)
            .collect();

        releases.extend(std::mem::take(&mut self.held_keys).into_iter().map(|key| {
            ControlEvent::Key {
                key,
                pressed: false,
            }
        }));

        releases.extend(
            self.held_buttons
                .drain(..)
                .map(|button| ControlEvent::MouseButton {
                    button,
                    pressed: false,
                }),
        );

        if self.mouse.is_active() {
            let (x, y) = self.mouse.release();
            releases.push(ControlEvent::MouseMove { x, y });
        }

        if !releases.is_empty() {
            info!("Releasing {} held inputs before disconnect", releases.len());
        }
        for event in releases {
            if let Err(e) = self.dispatcher.dispatch(event) {
                warn!("Failed to queue release: {}", e);
            }
        }

        self.session.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::ProfileKind;
    use crate::controller::pwm::MockClock;
    use crate::protocol::pairing::PairingCode;
    use crate::transport::socket::mocks::{MockSocket, MockSocketMonitor};
    use crate::transport::{Session, SessionSettings};
    use serde_json::Value;
    use std::f32::consts::FRAC_1_SQRT_2;
    use std::net::SocketAddr;

    fn host() -> SocketAddr {
        "192.168.0.20:7777".parse().unwrap()
    }

    async fn active_session() -> (ActiveSession, MockSocketMonitor) {
        let (socket, monitor) = MockSocket::new();
        let mut settings = SessionSettings::new(PairingCode::parse("1234").unwrap(), "phone");
        settings.server_host = Some(host().ip());
        monitor.push_reply(r#"{"status":"connected"}"#, host());

        let mut session = Session::new(socket, settings);
        session.pair().await.unwrap();
        (session.activate().unwrap(), monitor)
    }

    fn settings(kind: ProfileKind, mounting: Mounting) -> ControllerSettings {
        ControllerSettings {
            profile: ControlProfile::for_kind(kind),
            mounting,
            motion_enabled: true,
            gyro_stream_interval_ms: 50,
            mouse: MouseSettings::default(),
            player: None,
        }
    }

    /// Quaternion `[x, y, z, w]` rotating `degrees` about a unit axis.
    fn axis_angle(axis: [f32; 3], degrees: f32) -> [f32; 4] {
        let half = degrees.to_radians() / 2.0;
        let s = half.sin();
        [axis[0] * s, axis[1] * s, axis[2] * s, half.cos()]
    }

    /// Clock that advances `step` ms on every read, starting at 0.
    fn stepping_clock(step: u64) -> MockClock {
        let mut clock = MockClock::new();
        let mut now = 0;
        clock.expect_now_ms().returning(move || {
            let current = now;
            now += step;
            current
        });
        clock
    }

    /// Gameplay messages sent between pairing and disconnect.
    fn gameplay(monitor: &MockSocketMonitor) -> Vec<Value> {
        monitor
            .sent_json()
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| !matches!(v["action"].as_str(), Some("pair") | Some("heartbeat")))
            .collect()
    }

    fn key_events(messages: &[Value]) -> Vec<(String, bool)> {
        messages
            .iter()
            .filter(|v| v["action"] == "key")
            .map(|v| {
                (
                    v["key"].as_str().unwrap().to_string(),
                    v["pressed"].as_bool().unwrap(),
                )
            })
            .collect()
    }

    // ==================== Flight Profile Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_flight_tilt_presses_and_releases() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Flight, Mounting::Portrait),
            stepping_clock(10),
        )
        .unwrap();

        // Pitch forward (negative) by 20° presses w
        let sample = controller
            .on_rotation_vector(&axis_angle([1.0, 0.0, 0.0], 20.0))
            .unwrap()
            .unwrap();
        assert!(sample.pitch < -15.0);

        // Back into the hysteresis band keeps w held
        controller
            .on_rotation_vector(&axis_angle([1.0, 0.0, 0.0], 12.0))
            .unwrap();
        // Level releases it
        controller.on_rotation_vector(&[0.0, 0.0, 0.0, 1.0]).unwrap();

        controller.shutdown().await.unwrap();

        assert_eq!(
            key_events(&gameplay(&monitor)),
            vec![("w".to_string(), true), ("w".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flight_streams_gyro_at_interval() {
        let (session, monitor) = active_session().await;
        // Samples arrive every 20 ms; gyro goes out at most every 50 ms
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Flight, Mounting::Portrait),
            stepping_clock(20),
        )
        .unwrap();

        for _ in 0..6 {
            controller.on_rotation_vector(&[0.0, 0.0, 0.0, 1.0]).unwrap();
        }
        controller.shutdown().await.unwrap();

        let gyro: Vec<_> = gameplay(&monitor)
            .into_iter()
            .filter(|v| v["action"] == "gyro_data")
            .collect();
        // Reads at 0, 20, 40, 60, 80, 100 → sent at 0, 60
        assert_eq!(gyro.len(), 2);
        assert_eq!(gyro[0]["pitch"].as_f64(), Some(0.0));
    }

    // ==================== Racing Profile Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_racing_pwm_ticks() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Racing, Mounting::Portrait),
            stepping_clock(10),
        )
        .unwrap();
        assert!(controller.uses_pwm_ticks());

        // No sample yet: ticks do nothing
        controller.pwm_tick().unwrap();

        // Roll -13° in portrait is a left turn at ~23% intensity → 50% duty
        controller
            .on_rotation_vector(&axis_angle([0.0, 1.0, 0.0], -13.0))
            .unwrap();
        for _ in 0..10 {
            controller.pwm_tick().unwrap();
        }
        controller.shutdown().await.unwrap();

        assert_eq!(
            key_events(&gameplay(&monitor)),
            vec![("a".to_string(), true), ("a".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_landscape_steers_on_long_axis() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Racing, Mounting::Landscape),
            stepping_clock(10),
        )
        .unwrap();

        controller
            .on_rotation_vector(&axis_angle([1.0, 0.0, 0.0], 28.0))
            .unwrap();
        controller.pwm_tick().unwrap();

        // Shutdown releases the held key before disconnecting
        controller.shutdown().await.unwrap();

        let messages = gameplay(&monitor);
        assert_eq!(
            key_events(&messages),
            vec![("d".to_string(), true), ("d".to_string(), false)]
        );
        assert_eq!(messages.last().unwrap()["action"], "disconnect");
    }

    // ==================== Calibration Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_calibrate_neutralizes_tilt() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Flight, Mounting::Portrait),
            stepping_clock(100),
        )
        .unwrap();

        let tilted = axis_angle([FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0], 25.0);
        controller.on_rotation_vector(&tilted).unwrap();
        assert!(controller.calibrate().is_some());

        let sample = controller.on_rotation_vector(&tilted).unwrap().unwrap();
        assert!(sample.roll.abs() < 0.01);
        assert!(sample.pitch.abs() < 0.01);

        controller.shutdown().await.unwrap();

        // Gates pressed by the tilt were released by the level reading
        let keys = key_events(&gameplay(&monitor));
        let downs = keys.iter().filter(|(_, pressed)| *pressed).count();
        let ups = keys.iter().filter(|(_, pressed)| !*pressed).count();
        assert_eq!(downs, ups);
    }

    // ==================== Motion Disabled Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_motion_disabled_ignores_samples() {
        let (session, monitor) = active_session().await;
        let mut settings = settings(ProfileKind::Flight, Mounting::Portrait);
        settings.motion_enabled = false;
        let mut controller =
            RemoteController::with_clock(session, settings, MockClock::new()).unwrap();

        assert!(!controller.motion_enabled());
        assert!(!controller.uses_pwm_ticks());
        assert_eq!(
            controller
                .on_rotation_vector(&axis_angle([1.0, 0.0, 0.0], 40.0))
                .unwrap(),
            None
        );
        assert_eq!(controller.calibrate(), None);

        // Touch input still works
        controller.key(KeyName::parse("space").unwrap(), true).unwrap();
        controller.key(KeyName::parse("space").unwrap(), false).unwrap();
        controller.shutdown().await.unwrap();

        assert_eq!(
            key_events(&gameplay(&monitor)),
            vec![("space".to_string(), true), ("space".to_string(), false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_sample_reported() {
        let (session, _monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Flight, Mounting::Portrait),
            MockClock::new(),
        )
        .unwrap();

        assert!(matches!(
            controller.on_rotation_vector(&[0.5]),
            Err(RemoteError::InvalidSample(_))
        ));
        controller.shutdown().await.unwrap();
    }

    // ==================== Touch and Mouse Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_joystick_mouse() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Buttons, Mounting::Portrait),
            MockClock::new(),
        )
        .unwrap();

        controller.mouse_tick().unwrap();
        controller.joystick(1.0, -1.0);
        assert!(controller.joystick_active());
        controller.mouse_tick().unwrap();
        controller.mouse_tick().unwrap();
        controller.joystick_released().unwrap();
        controller.mouse_tick().unwrap();
        controller.shutdown().await.unwrap();

        let moves: Vec<(i64, i64)> = gameplay(&monitor)
            .into_iter()
            .filter(|v| v["action"] == "mouse_move")
            .map(|v| (v["x"].as_i64().unwrap(), v["y"].as_i64().unwrap()))
            .collect();
        assert_eq!(moves, vec![(2, -2), (3, -3), (0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_player_slot_on_keys() {
        let (session, monitor) = active_session().await;
        let mut settings = settings(ProfileKind::Buttons, Mounting::Portrait);
        settings.player = Some(4);
        let mut controller =
            RemoteController::with_clock(session, settings, MockClock::new()).unwrap();

        controller.key(KeyName::parse("enter").unwrap(), true).unwrap();
        controller.key(KeyName::parse("enter").unwrap(), false).unwrap();
        controller.shutdown().await.unwrap();

        let keys: Vec<_> = gameplay(&monitor)
            .into_iter()
            .filter(|v| v["action"] == "key")
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|v| v["player"] == 4));
    }

    // ==================== Teardown Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_everything_before_disconnect() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Flight, Mounting::Portrait),
            stepping_clock(100),
        )
        .unwrap();

        // Motion holds w, touch holds shift and the right mouse button
        controller
            .on_rotation_vector(&axis_angle([1.0, 0.0, 0.0], 30.0))
            .unwrap();
        controller.key(KeyName::parse("shift").unwrap(), true).unwrap();
        controller.mouse_button(MouseButton::Right, true).unwrap();
        controller.joystick(0.5, 0.0);

        let handle = controller.handle();
        controller.shutdown().await.unwrap();

        let messages = gameplay(&monitor);
        let actions: Vec<&str> = messages
            .iter()
            .map(|v| v["action"].as_str().unwrap())
            .collect();
        let disconnect_at = actions.iter().position(|a| *a == "disconnect").unwrap();
        assert_eq!(disconnect_at, actions.len() - 1);

        let released: Vec<String> = messages
            .iter()
            .filter(|v| v["pressed"] == false)
            .map(|v| {
                v["key"]
                    .as_str()
                    .or_else(|| v["button"].as_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(released, vec!["w", "shift", "right"]);

        // Joystick was active: one zero move goes out before disconnect
        assert_eq!(actions[disconnect_at - 1], "mouse_move");

        assert!(monitor.is_closed());
        assert!(!handle.is_connected());
        assert!(matches!(
            handle.send(crate::protocol::message::WireMessage::MouseMove { x: 0, y: 0 }),
            Err(RemoteError::SessionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_touch_key_not_released_again() {
        let (session, monitor) = active_session().await;
        let mut controller = RemoteController::with_clock(
            session,
            settings(ProfileKind::Buttons, Mounting::Portrait),
            MockClock::new(),
        )
        .unwrap();

        controller.key(KeyName::parse("a").unwrap(), true).unwrap();
        controller.key(KeyName::parse("a").unwrap(), false).unwrap();
        controller.mouse_button(MouseButton::Left, true).unwrap();
        controller.mouse_button(MouseButton::Left, false).unwrap();
        controller.shutdown().await.unwrap();

        let actions: Vec<String> = gameplay(&monitor)
            .into_iter()
            .map(|v| v["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            actions,
            vec!["key", "key", "mouse_button", "mouse_button", "disconnect"]
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_toml(
            r#"
[server]
code = "1234"
player = 1

[motion]
profile = "buttons"
enabled = false

[mouse]
max_speed = 9.0
"#,
        )
        .unwrap();

        let settings = ControllerSettings::from_config(&config);
        assert_eq!(settings.profile.kind, ProfileKind::Buttons);
        assert!(!settings.motion_enabled);
        assert_eq!(settings.mouse.max_speed, 9.0);
        assert_eq!(settings.player, Some(1));
    }
}
