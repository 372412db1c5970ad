//! # meshlink - Meshtastic Device Session Engine
//!
//! `meshlink` keeps a client application synchronized with a Meshtastic radio.
//! It supervises the link to the device, runs the two-pass configuration
//! handshake, correlates admin requests with their replies and turns every
//! inbound mesh packet into repository updates and user notifications.
//!
//! ## Features
//!
//! - **Connection supervision**: discovery, preferred-device auto-reconnect,
//!   bounded connect timeout and pairing-loss handling
//! - **Handshake engine**: `want_config` passes with a retrying watchdog and a
//!   minimum firmware gate
//! - **Admin correlation**: random request ids, session passkeys and channel /
//!   contact URL import
//! - **Packet dispatch**: text, positions, node info, telemetry, waypoints,
//!   routing acks, trace routes and store-and-forward
//! - **Periodic tasks**: node eviction, passkey expiry and position reports
//! - **Serial transport**: the wired stream protocol over USB/UART
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshlink::config::Config;
//! use meshlink::notify::LogNotifier;
//! use meshlink::session::{Session, SessionRunner};
//! use meshlink::storage::MemoryRepository;
//! use meshlink::transport::{DeviceId, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("meshlink.toml").await?;
//!     let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let transport = SerialTransport::new(
//!         config.transport.port.clone(),
//!         config.transport.baud_rate,
//!         events_tx,
//!     );
//!     let session = Session::new(
//!         transport,
//!         MemoryRepository::new(),
//!         LogNotifier,
//!         config.tunings(),
//!     );
//!     let (runner, handle) = SessionRunner::new(session, events_rx);
//!     tokio::spawn(runner.run());
//!     handle.connect(DeviceId(config.transport.port.clone())).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Connection supervisor, handshake, admin correlator, dispatcher and runner
//! - [`transport`] - Transport capability and the serial implementation
//! - [`storage`] - Repository capability and the in-memory/JSON implementation
//! - [`protobuf`] - Meshtastic wire messages
//! - [`notify`] - User-facing notification sinks
//! - [`config`] - TOML configuration
//! - [`metrics`] - Process-wide counters
//! - [`logutil`] - Log formatting helpers

pub mod config;
pub mod logutil;
pub mod metrics;
pub mod notify;
pub mod protobuf;
pub mod session;
pub mod storage;
pub mod transport;
