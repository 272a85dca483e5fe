//! # MobControl
//!
//! Drive a desktop host from phone motion and touch input.
//!
//! Sensor and touch events arrive as JSON lines on stdin (see
//! [`mobcontrol::feed`]); key, mouse and gyro messages go to the host over
//! UDP.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mobcontrol::config::{Config, LoggingConfig};
use mobcontrol::controller::{ControllerSettings, RemoteController};
use mobcontrol::error::RemoteError;
use mobcontrol::feed;
use mobcontrol::transport::socket::UdpTransport;
use mobcontrol::transport::{Session, SessionEvent, SessionSettings};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside `logging.directory`
const LOG_FILE_PREFIX: &str = "mobcontrol.log";

fn config_path(args: &[String]) -> &str {
    args.get(1).map_or(DEFAULT_CONFIG_PATH, String::as_str)
}

/// Install the tracing subscriber.
///
/// Logs go to stderr unless a directory is configured, since stdin carries
/// the event feed. The returned guard must live until exit so buffered file
/// output is flushed.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(
        config
            .level
            .parse()
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    );

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Main entry point for MobControl
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging
///    - Bind the UDP socket, then discover and pair with the host
///
/// 2. **Main Loop**
///    - Apply feed events from stdin
///    - Drive PWM steering ticks when the profile needs them
///    - Drive mouse ticks while the joystick is held
///    - Watch session events for heartbeat loss
///
/// 3. **Graceful Shutdown**
///    - On Ctrl+C, end of input or session loss
///    - Release every held key and button, send disconnect, close the socket
///
/// # Errors
///
/// Returns error if the configuration is invalid, the socket cannot be
/// bound, or no host could be discovered or paired.
#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = config_path(&args);
    let config =
        Config::load(path).with_context(|| format!("Failed to load configuration from {}", path))?;

    let _log_guard = init_logging(&config.logging)?;
    info!("MobControl v{} starting...", env!("CARGO_PKG_VERSION"));

    let session_settings = SessionSettings::from_config(&config)?;
    let socket = UdpTransport::bind(config.transport.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.transport.bind_address))?;
    info!("UDP socket bound at {}", socket.local_addr()?);

    let active = Session::new(socket, session_settings).establish().await?;
    let mut controller = RemoteController::new(active, ControllerSettings::from_config(&config))?;
    let mut events = controller.handle().subscribe();

    let mut pwm_ticks = interval(Duration::from_millis(config.motion.pwm_tick_ms));
    pwm_ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut mouse_ticks = interval(Duration::from_millis(config.mouse.tick_ms));
    mouse_ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Reading input events from stdin, press Ctrl+C to exit");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let Some(event) = feed::parse_line(&line) else {
                            continue;
                        };
                        match event.apply(&mut controller) {
                            Ok(()) => {}
                            Err(RemoteError::SessionClosed) => break,
                            Err(e) => warn!("Feed event rejected: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("Input feed closed");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read input feed: {}", e);
                        break;
                    }
                }
            }

            _ = pwm_ticks.tick(), if controller.uses_pwm_ticks() => {
                if let Err(e) = controller.pwm_tick() {
                    debug!("PWM tick failed: {}", e);
                }
            }

            _ = mouse_ticks.tick(), if controller.joystick_active() => {
                if let Err(e) = controller.mouse_tick() {
                    debug!("Mouse tick failed: {}", e);
                }
            }

            event = events.recv() => {
                match event {
                    Ok(SessionEvent::HeartbeatFailed(reason)) => {
                        warn!("Host unreachable: {}", reason);
                        break;
                    }
                    Ok(SessionEvent::Disconnected) | Err(RecvError::Closed) => break,
                    Ok(other) => debug!("Session event: {:?}", other),
                    Err(RecvError::Lagged(skipped)) => debug!("Skipped {} session events", skipped),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    controller.shutdown().await?;
    info!("Disconnected");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_default() {
        let args = vec!["mobcontrol".to_string()];
        assert_eq!(config_path(&args), "config/default.toml");
    }

    #[test]
    fn test_config_path_argument() {
        let args = vec!["mobcontrol".to_string(), "/etc/mobcontrol.toml".to_string()];
        assert_eq!(config_path(&args), "/etc/mobcontrol.toml");
    }

    #[test]
    fn test_default_config_file_is_valid() {
        let contents = include_str!("../config/default.toml");
        let config = Config::from_toml(contents).unwrap();
        assert_eq!(config.server.port, 7777);
        assert!(SessionSettings::from_config(&config).is_ok());
    }
}
