//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use crate::controller::orientation::Mounting;
use crate::controller::profile::ProfileKind;
use crate::error::{RemoteError, Result};
use crate::protocol::pairing::{ConnectTarget, PairingCode};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub mouse: MouseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Desktop host configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Known host address; discovery runs when absent
    #[serde(default)]
    pub host: Option<IpAddr>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub code: String,

    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Scanned `host:port:code` payload, overrides host/port/code
    #[serde(default)]
    pub qr: Option<String>,

    /// Multiplayer slot (1-4)
    #[serde(default)]
    pub player: Option<u8>,
}

/// UDP session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,

    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    #[serde(default = "default_discovery_retry_delay_ms")]
    pub discovery_retry_delay_ms: u64,

    #[serde(default = "default_broadcast_addresses")]
    pub broadcast_addresses: Vec<IpAddr>,

    /// Local IPv4 address used to derive a /24 subnet broadcast target
    #[serde(default)]
    pub local_address: Option<Ipv4Addr>,

    #[serde(default = "default_fallback_hosts")]
    pub fallback_hosts: Vec<IpAddr>,

    #[serde(default = "default_pair_timeout_ms")]
    pub pair_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_disconnect_grace_ms")]
    pub disconnect_grace_ms: u64,
}

/// Motion controls configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotionConfig {
    /// False when the device has no rotation vector sensor
    #[serde(default = "default_motion_enabled")]
    pub enabled: bool,

    #[serde(default = "default_mounting")]
    pub mounting: Mounting,

    #[serde(default = "default_profile")]
    pub profile: ProfileKind,

    #[serde(default = "default_pwm_tick_ms")]
    pub pwm_tick_ms: u64,

    #[serde(default = "default_gyro_stream_interval_ms")]
    pub gyro_stream_interval_ms: u64,
}

/// Joystick-to-mouse configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MouseConfig {
    #[serde(default = "default_mouse_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_mouse_max_speed")]
    pub max_speed: f32,

    #[serde(default = "default_mouse_acceleration")]
    pub acceleration: f32,

    #[serde(default = "default_mouse_tick_ms")]
    pub tick_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write daily rolling log files here instead of stderr
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_port() -> u16 { 7777 }
fn default_device_name() -> String { "mobcontrol".to_string() }

fn default_bind_address() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 0)) }
fn default_discovery_attempts() -> u32 { 3 }
fn default_discovery_timeout_ms() -> u64 { 3000 }
fn default_discovery_retry_delay_ms() -> u64 { 500 }
fn default_broadcast_addresses() -> Vec<IpAddr> { vec![IpAddr::V4(Ipv4Addr::BROADCAST)] }
fn default_fallback_hosts() -> Vec<IpAddr> { vec![IpAddr::V4(Ipv4Addr::new(10, 0, 2, 2))] }
fn default_pair_timeout_ms() -> u64 { 5000 }
fn default_heartbeat_interval_ms() -> u64 { 3000 }
fn default_disconnect_grace_ms() -> u64 { 300 }

fn default_motion_enabled() -> bool { true }
fn default_mounting() -> Mounting { Mounting::Landscape }
fn default_profile() -> ProfileKind { ProfileKind::Racing }
fn default_pwm_tick_ms() -> u64 { 10 }
fn default_gyro_stream_interval_ms() -> u64 { 50 }

fn default_mouse_deadzone() -> f32 { 0.1 }
fn default_mouse_max_speed() -> f32 { 5.0 }
fn default_mouse_acceleration() -> f32 { 0.3 }
fn default_mouse_tick_ms() -> u64 { 16 }

fn default_log_level() -> String { "info".to_string() }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            discovery_attempts: default_discovery_attempts(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            discovery_retry_delay_ms: default_discovery_retry_delay_ms(),
            broadcast_addresses: default_broadcast_addresses(),
            local_address: None,
            fallback_hosts: default_fallback_hosts(),
            pair_timeout_ms: default_pair_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            disconnect_grace_ms: default_disconnect_grace_ms(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: default_motion_enabled(),
            mounting: default_mounting(),
            profile: default_profile(),
            pwm_tick_ms: default_pwm_tick_ms(),
            gyro_stream_interval_ms: default_gyro_stream_interval_ms(),
        }
    }
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            deadzone: default_mouse_deadzone(),
            max_speed: default_mouse_max_speed(),
            acceleration: default_mouse_acceleration(),
            tick_ms: default_mouse_tick_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(message: impl std::fmt::Display) -> RemoteError {
    RemoteError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mobcontrol::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Pairing entry: either a scanned payload or a typed code
        match &self.server.qr {
            Some(payload) => {
                ConnectTarget::from_qr(payload)
                    .map_err(|e| invalid(format!("server qr is invalid: {}", e)))?;
            }
            None => {
                PairingCode::parse(&self.server.code)
                    .map_err(|_| invalid("server code must be exactly 4 digits"))?;
            }
        }

        if self.server.port == 0 {
            return Err(invalid("server port cannot be 0"));
        }

        if self.server.device_name.trim().is_empty() {
            return Err(invalid("device_name cannot be empty"));
        }

        if let Some(player) = self.server.player {
            if !(1..=4).contains(&player) {
                return Err(invalid("player must be between 1 and 4"));
            }
        }

        // Discovery needs somewhere to send
        let has_host = self.server.host.is_some() || self.server.qr.is_some();
        if !has_host
            && self.transport.broadcast_addresses.is_empty()
            && self.transport.fallback_hosts.is_empty()
            && self.transport.local_address.is_none()
        {
            return Err(invalid(
                "no server host configured and no discovery targets available",
            ));
        }

        if self.transport.discovery_attempts == 0 || self.transport.discovery_attempts > 10 {
            return Err(invalid("discovery_attempts must be between 1 and 10"));
        }

        if self.transport.discovery_timeout_ms == 0 || self.transport.discovery_timeout_ms > 60000 {
            return Err(invalid("discovery_timeout_ms must be between 1 and 60000"));
        }

        if self.transport.discovery_retry_delay_ms > 60000 {
            return Err(invalid("discovery_retry_delay_ms must be at most 60000"));
        }

        if self.transport.pair_timeout_ms == 0 || self.transport.pair_timeout_ms > 60000 {
            return Err(invalid("pair_timeout_ms must be between 1 and 60000"));
        }

        if !(100..=60000).contains(&self.transport.heartbeat_interval_ms) {
            return Err(invalid("heartbeat_interval_ms must be between 100 and 60000"));
        }

        if self.transport.disconnect_grace_ms > 5000 {
            return Err(invalid("disconnect_grace_ms must be at most 5000"));
        }

        // Motion timers
        if self.motion.pwm_tick_ms == 0 || self.motion.pwm_tick_ms > 100 {
            return Err(invalid("pwm_tick_ms must be between 1 and 100"));
        }

        if self.motion.gyro_stream_interval_ms == 0 || self.motion.gyro_stream_interval_ms > 1000 {
            return Err(invalid("gyro_stream_interval_ms must be between 1 and 1000"));
        }

        // Mouse smoothing
        if !(0.0..1.0).contains(&self.mouse.deadzone) {
            return Err(invalid("mouse deadzone must be between 0.0 and 1.0 (exclusive)"));
        }

        if !(self.mouse.max_speed > 0.0 && self.mouse.max_speed <= 100.0) {
            return Err(invalid("mouse max_speed must be between 0.0 (exclusive) and 100.0"));
        }

        if !(self.mouse.acceleration > 0.0 && self.mouse.acceleration <= 1.0) {
            return Err(invalid("mouse acceleration must be between 0.0 (exclusive) and 1.0"));
        }

        if self.mouse.tick_ms == 0 || self.mouse.tick_ms > 1000 {
            return Err(invalid("mouse tick_ms must be between 1 and 1000"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if matches!(&self.logging.directory, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging directory cannot be empty when set"));
        }

        Ok(())
    }
}
