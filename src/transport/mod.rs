//! Transport capability consumed by the session engine.
//!
//! A transport wraps the physical link to a radio (serial, BLE, TCP). All of
//! its methods are fire-and-forget: outcomes come back later as
//! [`TransportEvent`]s on the channel handed to the transport at construction,
//! and the session runner feeds them to the session in arrival order.

use bytes::Bytes;
use thiserror::Error;

pub mod framing;
#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;

/// Logical streams of the link. Serial links multiplex everything on one
/// byte stream and only use [`LinkChannel::FromRadio`] / [`LinkChannel::ToRadio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkChannel {
    /// Outbound `ToRadio` frames.
    ToRadio,
    /// Inbound `FromRadio` frames (config stream and mesh traffic).
    FromRadio,
    /// "New data waiting" notifications prompting a `FromRadio` read.
    FromNum,
    /// Device debug log records.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub String);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: String,
    pub rssi: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The peer forgot our bond; the user must forget and re-pair. Never retried.
    PairingInvalidated,
    Other(String),
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectFailure::PairingInvalidated => {
                f.write_str("pairing information is no longer valid")
            }
            ConnectFailure::Other(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Discovered(DiscoveredDevice),
    Connected(DeviceId),
    ConnectFailed {
        device: DeviceId,
        cause: ConnectFailure,
    },
    Disconnected(Option<String>),
    /// Every logical channel the session needs is available.
    ChannelsResolved,
    Frame {
        channel: LinkChannel,
        bytes: Bytes,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("frame of {0} bytes exceeds the link limit")]
    FrameTooLarge(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub trait Transport {
    fn start_scan(&mut self);
    fn stop_scan(&mut self);
    /// Begin connecting; completion arrives as `Connected` or `ConnectFailed`.
    fn connect(&mut self, device: &DeviceId);
    fn disconnect(&mut self);
    fn write(&mut self, channel: LinkChannel, bytes: &[u8]) -> Result<(), TransportError>;
    fn subscribe(&mut self, channel: LinkChannel);
    /// Ask for the next frame on `channel`. Streaming links may ignore this.
    fn request_read(&mut self, channel: LinkChannel);
    /// Whether the `ToRadio` and `FromRadio` channels are both usable.
    fn channels_resolved(&self) -> bool;
}
