//! # Transport Session Module
//!
//! Owns the UDP conversation with one desktop host.
//!
//! This module handles:
//! - Discovering the host by broadcasting the pairing code
//! - The one-shot pairing handshake
//! - Fire-and-forget delivery of input events from a single worker task
//! - Periodic heartbeats while active
//! - Graceful disconnect at teardown
//!
//! Lifecycle: `Idle → Discovering → Paired → Active → Disconnected`.
//! Discover and Pair are awaited directly on the [`Session`]; once
//! activated, the socket moves into a worker task and callers only talk to
//! it through a [`SessionHandle`].

pub mod socket;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{RemoteError, Result};
use crate::protocol::decoder::{decode_message, is_discovery_reply};
use crate::protocol::encoder::encode_message;
use crate::protocol::message::{WireMessage, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
use crate::protocol::pairing::{ConnectTarget, PairingCode};

pub use socket::{DatagramSocket, UdpTransport};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pause after a failed receive before trying again
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Broadcasting for a host; kept after a match until pairing completes
    Discovering,
    Paired,
    Active,
    /// Terminal
    Disconnected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Discovering => "Discovering",
            Phase::Paired => "Paired",
            Phase::Active => "Active",
            Phase::Disconnected => "Disconnected",
        };
        f.write_str(name)
    }
}

/// Non-blocking session notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged(Phase),
    /// A gameplay datagram could not be sent; liveness is unchanged
    SendFailed { action: &'static str, reason: String },
    /// A heartbeat could not be sent; the session is marked disconnected
    HeartbeatFailed(String),
    Disconnected,
}

/// Timing and addressing for one session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Known host; discovery fills this in when absent
    pub server_host: Option<IpAddr>,
    pub server_port: u16,
    pub code: PairingCode,
    pub device_name: String,
    pub discovery_attempts: u32,
    pub discovery_timeout: Duration,
    pub discovery_retry_delay: Duration,
    pub broadcast_targets: Vec<IpAddr>,
    pub fallback_hosts: Vec<IpAddr>,
    pub pair_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub disconnect_grace: Duration,
}

impl SessionSettings {
    /// Settings with default timings for the given code and device name
    #[must_use]
    pub fn new(code: PairingCode, device_name: impl Into<String>) -> Self {
        Self {
            server_host: None,
            server_port: DEFAULT_PORT,
            code,
            device_name: device_name.into(),
            discovery_attempts: 3,
            discovery_timeout: Duration::from_millis(3000),
            discovery_retry_delay: Duration::from_millis(500),
            broadcast_targets: vec![IpAddr::V4(Ipv4Addr::BROADCAST)],
            fallback_hosts: vec![IpAddr::V4(Ipv4Addr::new(10, 0, 2, 2))],
            pair_timeout: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_millis(3000),
            disconnect_grace: Duration::from_millis(300),
        }
    }

    /// Settings for a host scanned from a QR payload
    #[must_use]
    pub fn for_target(target: ConnectTarget, device_name: impl Into<String>) -> Self {
        let mut settings = Self::new(target.code, device_name);
        settings.server_host = Some(target.host);
        settings.server_port = target.port;
        settings
    }

    /// Build settings from a validated configuration
    ///
    /// A `qr` payload takes precedence over `host`, `port` and `code`. A
    /// configured `local_address` adds its /24 subnet broadcast to the
    /// discovery targets.
    pub fn from_config(config: &Config) -> Result<Self> {
        let server = &config.server;
        let transport = &config.transport;

        let mut settings = match &server.qr {
            Some(payload) => {
                Self::for_target(ConnectTarget::from_qr(payload)?, &server.device_name)
            }
            None => {
                let code = PairingCode::parse(&server.code)?;
                let mut settings = Self::new(code, &server.device_name);
                settings.server_host = server.host;
                settings.server_port = server.port;
                settings
            }
        };

        settings.discovery_attempts = transport.discovery_attempts;
        settings.discovery_timeout = Duration::from_millis(transport.discovery_timeout_ms);
        settings.discovery_retry_delay = Duration::from_millis(transport.discovery_retry_delay_ms);
        settings.broadcast_targets = transport.broadcast_addresses.clone();
        if let Some(local) = transport.local_address {
            let subnet = IpAddr::V4(subnet_broadcast(local));
            if !settings.broadcast_targets.contains(&subnet) {
                settings.broadcast_targets.push(subnet);
            }
        }
        settings.fallback_hosts = transport.fallback_hosts.clone();
        settings.pair_timeout = Duration::from_millis(transport.pair_timeout_ms);
        settings.heartbeat_interval = Duration::from_millis(transport.heartbeat_interval_ms);
        settings.disconnect_grace = Duration::from_millis(transport.disconnect_grace_ms);

        Ok(settings)
    }

    /// Every address a discovery broadcast is sent to, on the server port
    #[must_use]
    pub fn discovery_targets(&self) -> Vec<SocketAddr> {
        self.broadcast_targets
            .iter()
            .chain(self.fallback_hosts.iter())
            .map(|ip| SocketAddr::new(*ip, self.server_port))
            .collect()
    }
}

/// The /24 broadcast address for a local IPv4 address (`a.b.c.255`)
#[must_use]
pub fn subnet_broadcast(local: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = local.octets();
    Ipv4Addr::new(a, b, c, 255)
}

/// One session with one desktop host, before activation
///
/// Exclusively owns its socket.
pub struct Session<S> {
    socket: S,
    settings: SessionSettings,
    server_addr: Option<SocketAddr>,
    server_name: Option<String>,
    pair_attempted: bool,
    phase: watch::Sender<Phase>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server_addr", &self.server_addr)
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: DatagramSocket + 'static> Session<S> {
    /// Create an idle session over `socket`
    #[must_use]
    pub fn new(socket: S, settings: SessionSettings) -> Self {
        let server_addr = settings
            .server_host
            .map(|host| SocketAddr::new(host, settings.server_port));
        let (phase, _) = watch::channel(Phase::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            socket,
            settings,
            server_addr,
            server_name: None,
            pair_attempted: false,
            phase,
            events,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Address pairing will target, if known
    #[must_use]
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    /// Host name reported by the discovery reply, if any
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Watch the session phase
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!("Session phase {} -> {}", previous, phase);
            let _ = self.events.send(SessionEvent::PhaseChanged(phase));
        }
    }

    /// Find the desktop host by broadcasting the pairing code
    ///
    /// Each attempt sends the discover message to every target, then waits
    /// for a matching reply until the attempt's deadline, ignoring anything
    /// else that arrives. Attempts are separated by the retry delay.
    ///
    /// # Returns
    ///
    /// * `Ok(SocketAddr)` - Responder's IP on the configured server port
    /// * `Err(RemoteError::DiscoveryTimeout)` - No reply after all attempts
    ///
    /// # Errors
    ///
    /// Also fails with `InvalidPhase` unless the session is `Idle`. On any
    /// failure the session returns to `Idle` so discovery can be retried.
    pub async fn discover(&mut self) -> Result<SocketAddr> {
        let phase = self.phase();
        if phase != Phase::Idle {
            return Err(RemoteError::InvalidPhase {
                expected: Phase::Idle,
                actual: phase,
            });
        }

        self.set_phase(Phase::Discovering);
        match self.run_discovery().await {
            Ok(addr) => {
                info!(
                    "Discovered host {} ({})",
                    addr,
                    self.server_name.as_deref().unwrap_or("unnamed")
                );
                self.server_addr = Some(addr);
                Ok(addr)
            }
            Err(e) => {
                warn!("Discovery failed: {}", e);
                self.set_phase(Phase::Idle);
                Err(e)
            }
        }
    }

    async fn run_discovery(&mut self) -> Result<SocketAddr> {
        self.socket.set_broadcast(true)?;

        let payload = encode_message(&WireMessage::Discover {
            code: self.settings.code.clone(),
        })?;
        let targets = self.settings.discovery_targets();
        let attempts = self.settings.discovery_attempts;
        let port = self.settings.server_port;

        for attempt in 1..=attempts {
            debug!("Discovery attempt {}/{}", attempt, attempts);

            for target in &targets {
                if let Err(e) = self.socket.send_to(&payload, *target).await {
                    warn!("Failed to send discovery to {}: {}", target, e);
                }
            }

            let deadline = Instant::now() + self.settings.discovery_timeout;
            let reply = receive_until(&mut self.socket, deadline, |message, from| {
                match message {
                    WireMessage::DiscoveryReply { server_name } => Some((from, server_name)),
                    _ => None,
                }
            })
            .await;

            if let Some((from, server_name)) = reply {
                self.server_name = server_name;
                return Ok(SocketAddr::new(from.ip(), port));
            }

            if attempt < attempts {
                sleep(self.settings.discovery_retry_delay).await;
            }
        }

        Err(RemoteError::DiscoveryTimeout { attempts })
    }

    /// Perform the pairing handshake with the known or discovered host
    ///
    /// Only one handshake is allowed per session. Datagrams from other
    /// senders and stray discovery replies are ignored while waiting.
    ///
    /// # Errors
    ///
    /// * `NoServerAddress` - Neither configuration nor discovery gave a host
    /// * `PairingRejected` - Host answered `pair_failed`
    /// * `PairingTimeout` - No answer before the pairing timeout
    /// * `InvalidPhase` - Session already paired, active or spent
    ///
    /// A rejected or timed-out handshake leaves the session `Disconnected`.
    pub async fn pair(&mut self) -> Result<()> {
        let phase = self.phase();
        if self.pair_attempted || !matches!(phase, Phase::Idle | Phase::Discovering) {
            return Err(RemoteError::InvalidPhase {
                expected: Phase::Idle,
                actual: phase,
            });
        }

        let addr = self.server_addr.ok_or(RemoteError::NoServerAddress)?;
        self.pair_attempted = true;

        let payload = encode_message(&WireMessage::Pair {
            code: self.settings.code.clone(),
            device_name: self.settings.device_name.clone(),
        })?;

        if let Err(e) = self.socket.send_to(&payload, addr).await {
            self.set_phase(Phase::Disconnected);
            return Err(RemoteError::Send(e));
        }
        debug!("Sent pairing request to {}", addr);

        let deadline = Instant::now() + self.settings.pair_timeout;
        let answer = receive_until(&mut self.socket, deadline, |message, from| {
            if from.ip() != addr.ip() {
                return None;
            }
            match message {
                WireMessage::PairSuccess => Some(true),
                WireMessage::PairFailed => Some(false),
                _ => None,
            }
        })
        .await;

        match answer {
            Some(true) => {
                info!("Paired with {}", addr);
                self.set_phase(Phase::Paired);
                Ok(())
            }
            Some(false) => {
                warn!("Host {} rejected pairing code", addr);
                self.set_phase(Phase::Disconnected);
                Err(RemoteError::PairingRejected)
            }
            None => {
                warn!("No pairing response from {}", addr);
                self.set_phase(Phase::Disconnected);
                Err(RemoteError::PairingTimeout)
            }
        }
    }

    /// Move a paired session into its worker task and start heartbeats
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhase` unless the session is `Paired`.
    pub fn activate(self) -> Result<ActiveSession> {
        let phase = self.phase();
        let server_addr = match (phase, self.server_addr) {
            (Phase::Paired, Some(addr)) => addr,
            _ => {
                return Err(RemoteError::InvalidPhase {
                    expected: Phase::Paired,
                    actual: phase,
                })
            }
        };

        self.set_phase(Phase::Active);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let closed = Arc::new(AtomicBool::new(false));

        let handle = SessionHandle {
            commands: commands_tx,
            connected: Arc::clone(&connected),
            closed: Arc::clone(&closed),
            phase: self.phase.subscribe(),
            events: self.events.clone(),
        };

        let worker = Worker {
            socket: self.socket,
            server_addr,
            device_name: self.settings.device_name,
            heartbeat_interval: self.settings.heartbeat_interval,
            disconnect_grace: self.settings.disconnect_grace,
            commands: commands_rx,
            connected,
            phase: self.phase,
            events: self.events,
        };

        let task = tokio::spawn(worker.run());

        Ok(ActiveSession { handle, task })
    }

    /// Discover (when no host is known), pair, then activate
    pub async fn establish(mut self) -> Result<ActiveSession> {
        if self.server_addr.is_none() {
            self.discover().await?;
        }
        self.pair().await?;
        self.activate()
    }
}

/// Receive datagrams until `accept` picks one or `deadline` passes
///
/// Undecodable datagrams, those `accept` declines and receive errors (such
/// as an ICMP port unreachable surfacing as `ConnectionReset`) are skipped.
/// After an error the loop pauses briefly so a persistently failing socket
/// cannot spin until the deadline.
async fn receive_until<S, T, F>(socket: &mut S, deadline: Instant, mut accept: F) -> Option<T>
where
    S: DatagramSocket,
    F: FnMut(WireMessage, SocketAddr) -> Option<T>,
{
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => return None,
            Ok(Err(e)) => {
                warn!("Receive failed, still waiting: {}", e);
                sleep_until(deadline.min(Instant::now() + RECV_ERROR_BACKOFF)).await;
            }
            Ok(Ok((len, from))) => match decode_message(&buf[..len]) {
                Ok(message) => {
                    let discovery = is_discovery_reply(&message);
                    if let Some(accepted) = accept(message, from) {
                        return Some(accepted);
                    }
                    debug!("Ignoring datagram from {} (discovery reply: {})", from, discovery);
                }
                Err(e) => debug!("Ignoring undecodable datagram from {}: {}", from, e),
            },
        }
    }
}

enum Command {
    Send(WireMessage),
    Shutdown,
}

/// Cloneable sender for gameplay events on an active session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    phase: watch::Receiver<Phase>,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Send(message) => write!(f, "Send({})", message.action()),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl SessionHandle {
    /// Queue one message for delivery; returns immediately
    ///
    /// # Errors
    ///
    /// Returns `SessionClosed` once shutdown has begun.
    pub fn send(&self, message: WireMessage) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RemoteError::SessionClosed);
        }
        self.commands
            .send(Command::Send(message))
            .map_err(|_| RemoteError::SessionClosed)
    }

    /// False once a heartbeat could not be sent or the session closed
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// An active session: the worker task plus a handle to it
#[derive(Debug)]
pub struct ActiveSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl ActiveSession {
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Disconnect gracefully and wait for the socket to close
    ///
    /// New sends are refused immediately. Everything queued before this
    /// call is still sent, followed by the disconnect message and the
    /// grace period.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.closed.store(true, Ordering::Release);
        let _ = self.handle.commands.send(Command::Shutdown);
        self.task
            .await
            .map_err(|e| RemoteError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }
}

struct Worker<S> {
    socket: S,
    server_addr: SocketAddr,
    device_name: String,
    heartbeat_interval: Duration,
    disconnect_grace: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    connected: Arc<AtomicBool>,
    phase: watch::Sender<Phase>,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: DatagramSocket> Worker<S> {
    async fn run(mut self) {
        let period = self.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat_enabled = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(message)) => {
                        if let Err(e) = self.send(&message).await {
                            warn!("Dropped {} message: {}", message.action(), e);
                            let _ = self.events.send(SessionEvent::SendFailed {
                                action: message.action(),
                                reason: e.to_string(),
                            });
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = heartbeat.tick(), if heartbeat_enabled => {
                    let message = WireMessage::Heartbeat {
                        device_name: self.device_name.clone(),
                    };
                    if let Err(e) = self.send(&message).await {
                        warn!("Heartbeat failed, marking session disconnected: {}", e);
                        heartbeat_enabled = false;
                        self.connected.store(false, Ordering::Release);
                        let _ = self.events.send(SessionEvent::HeartbeatFailed(e.to_string()));
                    }
                }
            }
        }

        self.teardown().await;
    }

    async fn send(&mut self, message: &WireMessage) -> Result<()> {
        let payload = encode_message(message)?;
        self.socket
            .send_to(&payload, self.server_addr)
            .await
            .map_err(RemoteError::Send)?;
        debug!("Sent {} ({} bytes)", message.action(), payload.len());
        Ok(())
    }

    async fn teardown(mut self) {
        let message = WireMessage::Disconnect {
            device_name: self.device_name.clone(),
        };
        if let Err(e) = self.send(&message).await {
            warn!("Failed to send disconnect: {}", e);
        }

        sleep(self.disconnect_grace).await;

        self.connected.store(false, Ordering::Release);
        drop(self.socket);

        self.phase.send_replace(Phase::Disconnected);
        info!("Session with {} closed", self.server_addr);
        let _ = self.events.send(SessionEvent::PhaseChanged(Phase::Disconnected));
        let _ = self.events.send(SessionEvent::Disconnected);
    }
}
