//! # Device session engine
//!
//! [`Session`] turns an unreliable [`Transport`] into a synchronized view of a
//! Meshtastic radio: it supervises the link, runs the two-pass "want config"
//! handshake under a watchdog, correlates admin requests with their replies
//! and dispatches every inbound mesh packet by port.
//!
//! The engine is synchronous and owns no clock or task. Every entry point
//! takes the current `Instant`; timers are deadlines in a [`TimerSet`] that
//! the caller polls through [`Session::next_deadline`] / [`Session::on_timers`].
//! [`runner::SessionRunner`] is the tokio event loop that serializes transport
//! events, caller commands and timer expiry into one sequence.
//!
//! ```text
//! Transport --events--> Session --frames--> Dispatcher --> Repository
//!     ^                    |                    |
//!     +------writes--------+<------effects------+--> NotificationSink
//! ```
//!
//! Each inbound frame is one repository unit of work, saved (or rolled back)
//! before the next frame is looked at.

use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, log, trace, warn, Level};
use prost::Message;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::logutil::{escape_log, hex_snippet};
use crate::metrics;
use crate::notify::{Notification, NotificationSink};
use crate::protobuf::{FromRadio, LogLevel, LogRecord, MqttClientProxyMessage};
use crate::storage::{Repository, RepositoryError};
use crate::transport::{LinkChannel, Transport, TransportError, TransportEvent};

pub mod admin;
pub mod dispatch;
pub mod envelope;
pub mod handshake;
pub mod periodic;
pub mod runner;
pub mod store_forward;
pub mod supervisor;
pub mod timers;
pub mod traceroute;

pub use admin::{
    parse_channel_url, parse_contact_url, AdminCorrelator, AdminOperation, PendingAdminRequest,
    UrlImportError,
};
pub use dispatch::{Dispatcher, Effect, PacketContext, PacketHandler};
pub use envelope::{generate_packet_id, Envelope};
pub use handshake::{FirmwareVersion, HandshakePhase, HandshakeState};
pub use runner::{SessionCommand, SessionHandle, SessionRunner, DEFAULT_FLUSH_INTERVAL};
pub use supervisor::{ConnectionState, LinkPhase, LinkState};
pub use timers::{ManualClock, TimerKind, TimerSet};
pub use traceroute::SignalQuality;

/// `want_config_id` of the configuration pass.
pub const NONCE_CONFIG: u32 = 69420;
/// `want_config_id` of the node-database pass.
pub const NONCE_NODE_DB: u32 = 69421;
pub const MINIMUM_FIRMWARE_VERSION: &str = "2.3.15";
/// Cached positions older than this are not attached to trace-route hops.
pub const TRACE_ROUTE_POSITION_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
/// Radios rotate admin session passkeys after this long.
pub const SESSION_PASSKEY_TTL: Duration = Duration::from_secs(300);
/// Largest text payload accepted by `send_text`.
pub const MAX_TEXT_BYTES: usize = 228;

/// Optional packet classes requested once the configuration pass completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterestFlags {
    pub store_forward_history: bool,
    pub mqtt_proxy: bool,
}

/// Runtime knobs of a session, usually produced by [`crate::config::Config::tunings`].
#[derive(Debug, Clone)]
pub struct SessionTunings {
    pub auto_reconnect: bool,
    pub preferred_device: Option<String>,
    pub connect_timeout: Duration,
    pub connect_max_attempts: u32,
    pub handshake_watchdog: Duration,
    pub handshake_max_retries: u32,
    pub minimum_firmware: String,
    pub provide_location: bool,
    pub position_interval: Duration,
    /// (latitude, longitude, altitude) reported by the position task.
    pub fixed_position: Option<(f64, f64, Option<i32>)>,
    pub maintenance_interval: Duration,
    pub node_max_age: Duration,
    pub trace_route_position_max_age: Duration,
    pub interest: InterestFlags,
}

impl Default for SessionTunings {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            preferred_device: None,
            connect_timeout: Duration::from_millis(1500),
            connect_max_attempts: 10,
            handshake_watchdog: Duration::from_secs(10),
            handshake_max_retries: 3,
            minimum_firmware: MINIMUM_FIRMWARE_VERSION.to_string(),
            provide_location: false,
            position_interval: Duration::from_secs(900),
            fixed_position: None,
            maintenance_interval: Duration::from_secs(600),
            node_max_age: Duration::from_secs(7 * 24 * 3600),
            trace_route_position_max_age: TRACE_ROUTE_POSITION_MAX_AGE,
            interest: InterestFlags::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no device is connected")]
    NotConnected,

    #[error("device {0} has not been discovered")]
    UnknownDevice(String),

    #[error("device does not expose the required channels; update its firmware")]
    UnsupportedPeer,

    #[error("connected node number is not known yet")]
    NodeNumUnknown,

    #[error("payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    #[error("packet id 0 is reserved")]
    InvalidPacketId,

    #[error("failed to encode message: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    UrlImport(#[from] UrlImportError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("session runner has stopped")]
    Closed,
}

/// Everything a UI needs to render the connection, published after each event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub phase: LinkPhase,
    pub device: Option<String>,
    pub last_error: Option<String>,
    pub invalid_version: bool,
    pub pairing_invalid: bool,
    pub subscribed: bool,
    pub handshake: HandshakePhase,
    pub connect_attempts: u32,
    pub handshake_retries: u32,
    pub my_node_num: Option<u32>,
    pub firmware_version: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            phase: LinkPhase::Disconnected,
            device: None,
            last_error: None,
            invalid_version: false,
            pairing_invalid: false,
            subscribed: false,
            handshake: HandshakePhase::Idle,
            connect_attempts: 0,
            handshake_retries: 0,
            my_node_num: None,
            firmware_version: None,
        }
    }
}

pub struct Session<T, R, N> {
    transport: T,
    repo: R,
    notifier: N,
    tunings: SessionTunings,
    conn: ConnectionState,
    handshake: HandshakeState,
    admin: AdminCorrelator,
    timers: TimerSet,
    dispatcher: Dispatcher,
    my_node_num: Option<u32>,
    firmware_version: Option<String>,
    /// A `FromRadio` read is outstanding.
    reading: bool,
    mqtt_sink: Option<UnboundedSender<MqttClientProxyMessage>>,
    /// Routers asked for history on this connection.
    history_requested: HashSet<u32>,
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    pub fn new(transport: T, repo: R, notifier: N, tunings: SessionTunings) -> Self {
        let conn = ConnectionState::new(&tunings);
        Self {
            transport,
            repo,
            notifier,
            tunings,
            conn,
            handshake: HandshakeState::default(),
            admin: AdminCorrelator::default(),
            timers: TimerSet::new(),
            dispatcher: Dispatcher::with_default_handlers(),
            my_node_num: None,
            firmware_version: None,
            reading: false,
            mqtt_sink: None,
            history_requested: HashSet::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn tunings(&self) -> &SessionTunings {
        &self.tunings
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.conn
    }

    pub fn handshake(&self) -> &HandshakeState {
        &self.handshake
    }

    pub fn admin(&self) -> &AdminCorrelator {
        &self.admin
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn my_node_num(&self) -> Option<u32> {
        self.my_node_num
    }

    pub fn is_subscribed(&self) -> bool {
        self.handshake.subscribed
    }

    /// Register extra or replacement port handlers.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Where inbound MQTT proxy messages go when the `mqtt_proxy` interest is on.
    pub fn set_mqtt_proxy_sink(&mut self, sink: UnboundedSender<MqttClientProxyMessage>) {
        self.mqtt_sink = Some(sink);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            phase: self.conn.link.phase(),
            device: self.conn.link.device().map(|d| d.0.clone()),
            last_error: self.conn.last_error.clone(),
            invalid_version: self.handshake.invalid_version,
            pairing_invalid: self.conn.pairing_invalid,
            subscribed: self.handshake.subscribed,
            handshake: self.handshake.phase,
            connect_attempts: self.conn.connect_attempts,
            handshake_retries: self.handshake.retries,
            my_node_num: self.my_node_num,
            firmware_version: self.firmware_version.clone(),
        }
    }

    /// Begin discovery; a rediscovered preferred device reconnects automatically.
    pub fn start(&mut self, _now: Instant) {
        info!("Session starting; scanning for devices");
        self.conn.scanning = true;
        self.transport.start_scan();
    }

    pub fn on_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Discovered(device) => self.on_discovered(device, now),
            TransportEvent::Connected(device) => self.on_connected(device, now),
            TransportEvent::ConnectFailed { device, cause } => {
                self.on_connect_failed(device, cause, now)
            }
            TransportEvent::Disconnected(cause) => self.on_disconnected(cause, now),
            TransportEvent::ChannelsResolved => self.on_channels_resolved(now),
            TransportEvent::Frame { channel, bytes } => self.on_frame(channel, bytes, now),
        }
    }

    /// Fire every timer due at `now`.
    pub fn on_timers(&mut self, now: Instant) {
        for kind in self.timers.take_due(now) {
            trace!("timer fired: {:?}", kind);
            match kind {
                TimerKind::ConnectTimeout => self.on_connect_timeout(now),
                TimerKind::HandshakeWatchdog => self.on_watchdog(now),
                TimerKind::Maintenance => self.run_maintenance(now),
                TimerKind::PositionReport => self.on_position_timer(now),
            }
        }
    }

    fn on_frame(&mut self, channel: LinkChannel, bytes: Bytes, now: Instant) {
        match channel {
            LinkChannel::FromNum => {
                if !self.reading && self.conn.link.is_connected() {
                    self.reading = true;
                    self.transport.request_read(LinkChannel::FromRadio);
                }
            }
            LinkChannel::Log => match LogRecord::decode(bytes) {
                Ok(record) => log_device_record(&record),
                Err(e) => debug!("Undecodable log record: {}", e),
            },
            LinkChannel::FromRadio => {
                if bytes.is_empty() {
                    // Radio queue drained
                    self.reading = false;
                    return;
                }
                self.process_from_radio(&bytes, now);
                if self.conn.link.is_connected() {
                    self.reading = true;
                    self.transport.request_read(LinkChannel::FromRadio);
                }
            }
            LinkChannel::ToRadio => {
                debug!("Ignoring {} bytes on the write channel", bytes.len());
            }
        }
    }

    fn process_from_radio(&mut self, bytes: &[u8], now: Instant) {
        metrics::inc_frames_received();
        trace!("FromRadio {} bytes: {}", bytes.len(), hex_snippet(bytes, 64));
        let msg = match FromRadio::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                metrics::inc_frames_malformed();
                warn!(
                    "Skipping malformed FromRadio frame ({} bytes): {}",
                    bytes.len(),
                    e
                );
                return;
            }
        };

        self.repo.begin();
        let effects = {
            let mut ctx = PacketContext {
                repo: &mut self.repo,
                my_node_num: self.my_node_num,
                now: Utc::now(),
                accept_config: !self.handshake.invalid_version,
                trace_position_max_age: chrono::Duration::from_std(
                    self.tunings.trace_route_position_max_age,
                )
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
            };
            self.dispatcher.dispatch_from_radio(msg, &mut ctx)
        };
        self.repo.save_and_log_on_failure();
        self.apply_effects(effects, now);
    }

    fn apply_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::Progress => self.on_progress_observed(),
                Effect::MyNodeNum(num) => {
                    if self.my_node_num != Some(num) {
                        info!("Connected radio is node !{:08x}", num);
                    }
                    self.my_node_num = Some(num);
                }
                Effect::ConfigComplete(id) => self.on_config_complete(id, now),
                Effect::Rebooted => self.on_rebooted(now),
                Effect::Metadata(metadata) => self.on_device_metadata(&metadata),
                Effect::AdminReply { request_id, from } => {
                    self.admin.resolve_reply(request_id, from);
                }
                Effect::SessionPasskey { node, passkey } => {
                    self.admin.store_passkey(node, passkey, now)
                }
                Effect::Ack { request_id } => {
                    self.admin.resolve_ack(request_id);
                }
                Effect::RoutingError { request_id, reason } => {
                    self.admin.resolve_error(request_id, reason);
                }
                Effect::MqttProxy(msg) => self.forward_mqtt_proxy(msg),
                Effect::Notify(n) => self.notifier.schedule(n),
            }
        }
    }

    fn forward_mqtt_proxy(&mut self, msg: MqttClientProxyMessage) {
        if !self.tunings.interest.mqtt_proxy {
            trace!("MQTT proxy message for {} ignored (not enabled)", msg.topic);
            return;
        }
        match &self.mqtt_sink {
            Some(sink) => {
                if sink.send(msg).is_err() {
                    warn!("MQTT proxy sink closed; dropping message");
                    self.mqtt_sink = None;
                }
            }
            None => debug!(
                "MQTT proxy message for {} dropped: no sink registered",
                escape_log(&msg.topic)
            ),
        }
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifier.schedule(notification);
    }
}

fn log_device_record(record: &LogRecord) {
    let level = match LogLevel::try_from(record.level).unwrap_or(LogLevel::Unset) {
        LogLevel::Critical | LogLevel::Error => Level::Error,
        LogLevel::Warning => Level::Warn,
        LogLevel::Info | LogLevel::Unset => Level::Info,
        LogLevel::Debug => Level::Debug,
        LogLevel::Trace => Level::Trace,
    };
    log!(
        target: "device",
        level,
        "[{}] {}",
        escape_log(&record.source),
        escape_log(&record.message)
    );
}
