//! # Storage Module - Mesh Repository
//!
//! The session engine never owns mesh entities; it reads and upserts them
//! through the [`Repository`] capability. Each inbound frame is one unit of
//! work: the session calls [`Repository::begin`], applies the frame's derived
//! mutations, then [`Repository::save_and_log_on_failure`], which rolls the
//! unit back if the save fails.
//!
//! Saving commits a unit in memory. Making it durable is separate:
//! [`Repository::take_flush`] hands out a blocking [`FlushJob`] that the
//! runner executes off the event loop, so no frame waits on disk IO.
//!
//! Records are keyed by numeric node / packet ids only. [`MemoryRepository`]
//! is the bundled implementation, optionally mirrored to a JSON snapshot.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SignalQuality;

mod memory;

pub use memory::{MemoryRepository, MeshSnapshot};

/// Blocking persistence work handed out by [`Repository::take_flush`].
pub type FlushJob = Box<dyn FnOnce() -> Result<(), RepositoryError> + Send + 'static>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Returned when updating a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub num: u32,
    pub user_id: String,
    pub long_name: String,
    pub short_name: String,
    pub hw_model: i32,
    pub role: i32,
    #[serde(default)]
    pub public_key: Vec<u8>,
    pub snr: Option<f32>,
    pub hops_away: Option<u32>,
    pub channel: u32,
    pub via_mqtt: bool,
    pub is_favorite: bool,
    pub is_ignored: bool,
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
    pub channel_utilization: Option<f32>,
    pub air_util_tx: Option<f32>,
    pub uptime_seconds: Option<u32>,
    pub firmware_version: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_heard: Option<DateTime<Utc>>,
}

impl NodeRecord {
    /// Placeholder record for a node only known by number.
    pub fn new(num: u32) -> Self {
        Self {
            num,
            user_id: format!("!{:08x}", num),
            long_name: format!("Meshtastic {:04x}", num & 0xFFFF),
            short_name: format!("{:04x}", num & 0xFFFF),
            hw_model: 0,
            role: 0,
            public_key: Vec::new(),
            snr: None,
            hops_away: None,
            channel: 0,
            via_mqtt: false,
            is_favorite: false,
            is_ignored: false,
            battery_level: None,
            voltage: None,
            channel_utilization: None,
            air_util_tx: None,
            uptime_seconds: None,
            firmware_version: None,
            first_seen: Utc::now(),
            last_heard: None,
        }
    }

    /// Best human label: long name, else the `!xxxxxxxx` id.
    pub fn display_name(&self) -> &str {
        if self.long_name.trim().is_empty() {
            &self.user_id
        } else {
            &self.long_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckState {
    /// Outgoing and not yet acknowledged.
    Pending,
    Acked,
    Failed(String),
    /// Inbound messages are never acknowledged by us.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: u32,
    pub from: u32,
    pub to: u32,
    pub channel: u32,
    pub text: String,
    pub received: DateTime<Utc>,
    pub rx_snr: Option<f32>,
    pub rx_rssi: Option<i32>,
    pub hop_start: u32,
    pub hop_limit: u32,
    pub via_mqtt: bool,
    pub direct: bool,
    pub reply_id: Option<u32>,
    pub emoji: bool,
    pub alert: bool,
    pub store_forward: bool,
    pub outgoing: bool,
    pub ack: AckState,
}

/// Which category a stored configuration body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigKind {
    /// A `ConfigType` value.
    Radio(i32),
    /// A `ModuleConfigType` value.
    Module(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub node_num: u32,
    pub kind: ConfigKind,
    pub body: Vec<u8>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub node_num: u32,
    pub index: i32,
    pub name: String,
    pub role: i32,
    pub psk: Vec<u8>,
    pub uplink_enabled: bool,
    pub downlink_enabled: bool,
    pub position_precision: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub node_num: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<i32>,
    pub time: DateTime<Utc>,
    pub sats_in_view: u32,
    pub precision_bits: u32,
    pub speed: Option<u32>,
    pub heading: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub id: u32,
    pub from: u32,
    pub name: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub expire: Option<DateTime<Utc>>,
    pub locked_to: u32,
    pub icon: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryMetrics {
    Device {
        battery_level: Option<u32>,
        voltage: Option<f32>,
        channel_utilization: Option<f32>,
        air_util_tx: Option<f32>,
        uptime_seconds: Option<u32>,
    },
    Environment {
        temperature: Option<f32>,
        relative_humidity: Option<f32>,
        barometric_pressure: Option<f32>,
    },
    LocalStats {
        uptime_seconds: u32,
        channel_utilization: f32,
        air_util_tx: f32,
        num_packets_tx: u32,
        num_packets_rx: u32,
        num_online_nodes: u32,
        num_total_nodes: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub node_num: u32,
    pub time: DateTime<Utc>,
    pub metrics: TelemetryMetrics,
}

/// One hop of a completed trace route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRouteHop {
    pub node_num: u32,
    pub name: String,
    pub snr: SignalQuality,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `true` for hops on the route back to us.
    pub back: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRouteRecord {
    pub request_id: u32,
    pub from: u32,
    pub to: u32,
    pub channel: u32,
    pub sent: DateTime<Utc>,
    pub response: Option<TraceRouteResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRouteResponse {
    pub received: DateTime<Utc>,
    pub hops: Vec<TraceRouteHop>,
    pub hops_towards: i32,
    /// -1 when no route back was observed.
    pub hops_back: i32,
    pub route_text: String,
    pub route_back_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreForwardPeer {
    pub node_num: u32,
    pub is_router: bool,
    pub heartbeat_period: u32,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Router-side index of the last history request it served us.
    pub last_request: u32,
    pub history_messages: u32,
    pub window: u32,
    /// `last_request` value our most recent history request started from.
    #[serde(default)]
    pub requested_since: u32,
}

impl StoreForwardPeer {
    pub fn new(node_num: u32) -> Self {
        Self {
            node_num,
            is_router: false,
            heartbeat_period: 0,
            last_heartbeat: None,
            last_request: 0,
            history_messages: 0,
            window: 0,
            requested_since: 0,
        }
    }
}

/// Persistent store of mesh entities consumed by the session engine.
///
/// Mutations between [`begin`](Repository::begin) and a successful
/// [`save`](Repository::save) form one unit of work; [`rollback`](Repository::rollback)
/// discards them.
pub trait Repository {
    fn begin(&mut self);
    fn rollback(&mut self);
    fn save(&mut self) -> Result<(), RepositoryError>;

    /// Save the current unit of work; on failure log it, roll back and return `false`.
    fn save_and_log_on_failure(&mut self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Repository save failed, rolling back: {}", e);
                crate::metrics::inc_repository_rollbacks();
                self.rollback();
                false
            }
        }
    }

    /// Work that persists everything saved so far, or `None` when nothing
    /// is pending. Call between units of work.
    fn take_flush(&mut self) -> Option<FlushJob> {
        None
    }

    /// A job from [`take_flush`](Repository::take_flush) failed; its changes
    /// are still pending.
    fn flush_failed(&mut self) {}

    fn find_node(&self, num: u32) -> Option<NodeRecord>;
    fn upsert_node(&mut self, node: NodeRecord);
    fn nodes(&self) -> Vec<NodeRecord>;
    /// Remove nodes not heard since `cutoff`, except favorites and the nodes
    /// in `keep`; returns how many went.
    fn evict_stale_nodes(&mut self, cutoff: DateTime<Utc>, keep: &[u32]) -> usize;

    fn upsert_message(&mut self, message: MessageRecord);
    fn mark_message_ack(&mut self, id: u32, state: AckState) -> Result<(), RepositoryError>;

    fn upsert_config(&mut self, node_num: u32, kind: ConfigKind, body: Vec<u8>);
    fn upsert_channel(&mut self, channel: ChannelRecord);
    /// Channels stored for `node_num`, ordered by index.
    fn channels_of(&self, node_num: u32) -> Vec<ChannelRecord>;

    fn upsert_position(&mut self, position: PositionRecord);
    fn latest_position(&self, node_num: u32) -> Option<PositionRecord>;

    fn upsert_waypoint(&mut self, waypoint: WaypointRecord);
    fn upsert_telemetry(&mut self, telemetry: TelemetryRecord);

    fn record_trace_route_request(&mut self, record: TraceRouteRecord);
    fn trace_route_request(&self, request_id: u32) -> Option<TraceRouteRecord>;
    fn save_trace_route(&mut self, record: TraceRouteRecord);

    fn store_forward_peer(&self, node_num: u32) -> Option<StoreForwardPeer>;
    /// Any peer that has announced itself as a store-and-forward router.
    fn store_forward_router(&self) -> Option<StoreForwardPeer>;
    fn upsert_store_forward_peer(&mut self, peer: StoreForwardPeer);
}
