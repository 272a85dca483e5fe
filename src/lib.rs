//! # MobControl Library
//!
//! Client core for using a phone as a remote controller for a desktop host.
//!
//! This library turns motion and touch input into key, mouse and gyro
//! messages, and runs the UDP session (discovery, pairing, heartbeat and
//! teardown) that carries them to the host.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod feed;
pub mod protocol;
pub mod transport;
