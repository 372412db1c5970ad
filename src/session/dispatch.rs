//! Inbound classification.
//!
//! [`Dispatcher::dispatch_from_radio`] sorts every decoded `FromRadio` into
//! record ingestion (node info, config, channels, metadata), handshake markers
//! and mesh packets. Mesh packets are routed by port through a registration
//! table of [`PacketHandler`]s; ports without a handler are only logged.
//!
//! Handlers write to the repository through [`PacketContext`] and return
//! [`Effect`]s for the session to apply once the frame's unit of work is saved.

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, trace, warn};
use prost::Message;
use std::collections::HashMap;

use crate::logutil::{escape_log, truncate_for_log};
use crate::notify::{Notification, RouteTarget};
use crate::protobuf::{
    admin_message::PayloadVariant as AdminPayload, coord_from_i, from_radio, routing,
    telemetry, AdminMessage, Channel, ClientNotification, Data, DeviceMetadata, FromRadio,
    LogLevel, MeshPacket, MqttClientProxyMessage, NodeInfo, PortNum, Position, Routing,
    Telemetry, User, Waypoint, BROADCAST_ADDR,
};
use crate::storage::{
    AckState, ChannelRecord, ConfigKind, MessageRecord, NodeRecord, PositionRecord, Repository,
    RepositoryError, TelemetryMetrics, TelemetryRecord, WaypointRecord,
};

/// Something the session must do after a frame's repository work is saved.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A handshake-relevant record arrived.
    Progress,
    MyNodeNum(u32),
    ConfigComplete(u32),
    Rebooted,
    Metadata(DeviceMetadata),
    AdminReply { request_id: u32, from: u32 },
    SessionPasskey { node: u32, passkey: Vec<u8> },
    Ack { request_id: u32 },
    RoutingError { request_id: u32, reason: routing::Error },
    MqttProxy(MqttClientProxyMessage),
    Notify(Notification),
}

/// What a handler may see and touch while processing one frame.
pub struct PacketContext<'a> {
    pub repo: &'a mut dyn Repository,
    pub my_node_num: Option<u32>,
    pub now: DateTime<Utc>,
    /// False while the radio's firmware is rejected: configuration is not stored.
    pub accept_config: bool,
    pub trace_position_max_age: chrono::Duration,
}

impl PacketContext<'_> {
    /// Long name of `num`, or its `!xxxxxxxx` id.
    pub fn node_name(&self, num: u32) -> String {
        self.repo
            .find_node(num)
            .map(|n| n.display_name().to_string())
            .unwrap_or_else(|| format!("!{:08x}", num))
    }

    /// Existing record for `num`, or a placeholder that is stored right away.
    pub fn node_or_create(&mut self, num: u32) -> NodeRecord {
        match self.repo.find_node(num) {
            Some(node) => node,
            None => {
                let node = NodeRecord::new(num);
                self.repo.upsert_node(node.clone());
                node
            }
        }
    }
}

pub type PacketHandler = fn(&MeshPacket, &Data, &mut PacketContext<'_>) -> Vec<Effect>;

pub struct Dispatcher {
    handlers: HashMap<PortNum, PacketHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_default_handlers()
    }
}

impl Dispatcher {
    /// A dispatcher with no handlers: every packet lands in the log-only bucket.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with_default_handlers() -> Self {
        let mut d = Self::new();
        d.register(PortNum::TextMessageApp, handle_text);
        d.register(PortNum::DetectionSensorApp, handle_text);
        d.register(PortNum::RangeTestApp, handle_text);
        d.register(PortNum::AlertApp, handle_alert);
        d.register(PortNum::PositionApp, handle_position);
        d.register(PortNum::NodeinfoApp, handle_nodeinfo);
        d.register(PortNum::RoutingApp, handle_routing);
        d.register(PortNum::AdminApp, handle_admin);
        d.register(PortNum::WaypointApp, handle_waypoint);
        d.register(PortNum::TelemetryApp, handle_telemetry);
        d.register(PortNum::TracerouteApp, super::traceroute::handle_trace_route);
        d.register(PortNum::StoreForwardApp, super::store_forward::handle_store_forward);
        d
    }

    /// Install `handler` for `port`, returning the one it replaces.
    pub fn register(&mut self, port: PortNum, handler: PacketHandler) -> Option<PacketHandler> {
        self.handlers.insert(port, handler)
    }

    pub fn handles(&self, port: PortNum) -> bool {
        self.handlers.contains_key(&port)
    }

    pub fn dispatch_packet(&self, packet: &MeshPacket, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
        touch_sender(packet, ctx);
        let Some(data) = packet.decoded() else {
            debug!(
                "Packet {} from !{:08x} is encrypted for another key; skipping",
                packet.id, packet.from
            );
            return Vec::new();
        };
        let port = PortNum::try_from(data.portnum).unwrap_or(PortNum::UnknownApp);
        match self.handlers.get(&port) {
            Some(handler) => {
                debug!(
                    "{:?} packet {} from !{:08x} ({} bytes)",
                    port,
                    packet.id,
                    packet.from,
                    data.payload.len()
                );
                handler(packet, data, ctx)
            }
            None => {
                debug!(
                    "Unhandled port {} ({:?}) from !{:08x}, {} bytes",
                    data.portnum,
                    port,
                    packet.from,
                    data.payload.len()
                );
                Vec::new()
            }
        }
    }

    pub fn dispatch_from_radio(&self, msg: FromRadio, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
        let Some(variant) = msg.payload_variant else {
            debug!("Empty FromRadio (id {})", msg.id);
            return Vec::new();
        };
        match variant {
            from_radio::PayloadVariant::Packet(packet) => self.dispatch_packet(&packet, ctx),
            from_radio::PayloadVariant::MyInfo(info) => {
                debug!("MyInfo: node !{:08x}", info.my_node_num);
                ctx.node_or_create(info.my_node_num);
                vec![Effect::Progress, Effect::MyNodeNum(info.my_node_num)]
            }
            from_radio::PayloadVariant::NodeInfo(info) => {
                if ctx.accept_config {
                    ingest_node_info(&info, ctx);
                } else {
                    debug!("Ignoring node !{:08x}: firmware not supported", info.num);
                }
                vec![Effect::Progress]
            }
            from_radio::PayloadVariant::Config(config) => {
                match (config.kind(), config.body()) {
                    (Some(kind), Some(body)) if ctx.accept_config => {
                        let node = ctx.my_node_num.unwrap_or(0);
                        debug!("Config {:?} ({} bytes)", kind, body.len());
                        ctx.repo
                            .upsert_config(node, ConfigKind::Radio(kind as i32), body.to_vec());
                    }
                    (Some(kind), _) if !ctx.accept_config => {
                        debug!("Ignoring config {:?}: firmware not supported", kind)
                    }
                    _ => debug!("Config frame without a category"),
                }
                vec![Effect::Progress]
            }
            from_radio::PayloadVariant::ModuleConfig(config) => {
                match (config.kind(), config.body()) {
                    (Some(kind), Some(body)) if ctx.accept_config => {
                        let node = ctx.my_node_num.unwrap_or(0);
                        debug!("Module config {:?} ({} bytes)", kind, body.len());
                        ctx.repo
                            .upsert_config(node, ConfigKind::Module(kind as i32), body.to_vec());
                    }
                    (Some(kind), _) if !ctx.accept_config => {
                        debug!("Ignoring module config {:?}: firmware not supported", kind)
                    }
                    _ => debug!("Module config frame without a category"),
                }
                vec![Effect::Progress]
            }
            from_radio::PayloadVariant::Channel(channel) => {
                if ctx.accept_config {
                    let node = ctx.my_node_num.unwrap_or(0);
                    ctx.repo.upsert_channel(channel_record(node, &channel));
                }
                vec![Effect::Progress]
            }
            from_radio::PayloadVariant::Metadata(metadata) => {
                if let Some(me) = ctx.my_node_num.filter(|_| ctx.accept_config) {
                    let mut node = ctx.node_or_create(me);
                    node.firmware_version = Some(metadata.firmware_version.clone());
                    node.hw_model = metadata.hw_model;
                    ctx.repo.upsert_node(node);
                }
                vec![Effect::Progress, Effect::Metadata(metadata)]
            }
            from_radio::PayloadVariant::ConfigCompleteId(id) => vec![Effect::ConfigComplete(id)],
            from_radio::PayloadVariant::Rebooted(_) => vec![Effect::Rebooted],
            from_radio::PayloadVariant::LogRecord(record) => {
                super::log_device_record(&record);
                Vec::new()
            }
            from_radio::PayloadVariant::QueueStatus(status) => {
                if status.res != 0 {
                    warn!(
                        "Radio queue rejected packet {} (res {}, {}/{} free)",
                        status.mesh_packet_id, status.res, status.free, status.maxlen
                    );
                } else {
                    trace!("Queue status: {}/{} free", status.free, status.maxlen);
                }
                Vec::new()
            }
            from_radio::PayloadVariant::MqttClientProxyMessage(msg) => vec![Effect::MqttProxy(msg)],
            from_radio::PayloadVariant::FileInfo(info) => {
                debug!(
                    "Device file {} ({} bytes)",
                    escape_log(&info.file_name),
                    info.size_bytes
                );
                Vec::new()
            }
            from_radio::PayloadVariant::ClientNotification(note) => client_notification(note),
        }
    }
}

fn client_notification(note: ClientNotification) -> Vec<Effect> {
    let level = LogLevel::try_from(note.level).unwrap_or(LogLevel::Unset);
    match level {
        LogLevel::Warning | LogLevel::Error | LogLevel::Critical => {
            warn!("Device notification: {}", escape_log(&note.message))
        }
        _ => debug!("Device notification: {}", escape_log(&note.message)),
    }
    vec![Effect::Notify(
        Notification::new("Device", note.message).with_target(RouteTarget::Connection),
    )]
}

fn timestamp(secs: u32, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if secs == 0 {
        return fallback;
    }
    Utc.timestamp_opt(i64::from(secs), 0)
        .single()
        .unwrap_or(fallback)
}

/// Bookkeeping for every packet: the sender exists and was just heard.
fn touch_sender(packet: &MeshPacket, ctx: &mut PacketContext<'_>) {
    if packet.from == 0 || Some(packet.from) == ctx.my_node_num {
        return;
    }
    let mut node = ctx.node_or_create(packet.from);
    node.last_heard = Some(timestamp(packet.rx_time, ctx.now));
    node.via_mqtt = packet.via_mqtt;
    node.channel = packet.channel;
    if packet.rx_snr != 0.0 {
        node.snr = Some(packet.rx_snr);
    }
    if packet.hop_start > 0 && packet.hop_start >= packet.hop_limit {
        node.hops_away = Some(packet.hop_start - packet.hop_limit);
    }
    ctx.repo.upsert_node(node);
}

pub(crate) fn apply_user(node: &mut NodeRecord, user: &User) {
    if !user.id.is_empty() {
        node.user_id = user.id.clone();
    }
    if !user.long_name.is_empty() {
        node.long_name = user.long_name.clone();
    }
    if !user.short_name.is_empty() {
        node.short_name = user.short_name.clone();
    }
    node.hw_model = user.hw_model;
    node.role = user.role;
    if !user.public_key.is_empty() {
        node.public_key = user.public_key.clone();
    }
}

pub(crate) fn channel_record(node_num: u32, channel: &Channel) -> ChannelRecord {
    let settings = channel.settings.clone().unwrap_or_default();
    ChannelRecord {
        node_num,
        index: channel.index,
        name: settings.name,
        role: channel.role,
        psk: settings.psk,
        uplink_enabled: settings.uplink_enabled,
        downlink_enabled: settings.downlink_enabled,
        position_precision: settings
            .module_settings
            .map(|m| m.position_precision)
            .unwrap_or(0),
    }
}

pub(crate) fn waypoint_record(from: u32, waypoint: &Waypoint) -> WaypointRecord {
    WaypointRecord {
        id: waypoint.id,
        from,
        name: waypoint.name.clone(),
        description: waypoint.description.clone(),
        latitude: waypoint.latitude_i.map(coord_from_i),
        longitude: waypoint.longitude_i.map(coord_from_i),
        expire: (waypoint.expire != 0)
            .then(|| Utc.timestamp_opt(i64::from(waypoint.expire), 0).single())
            .flatten(),
        locked_to: waypoint.locked_to,
        icon: char::from_u32(waypoint.icon).filter(|_| waypoint.icon != 0),
    }
}

fn position_record(node_num: u32, pos: &Position, now: DateTime<Utc>) -> Option<PositionRecord> {
    let (lat, lon) = (pos.latitude_i?, pos.longitude_i?);
    if lat == 0 && lon == 0 {
        return None;
    }
    Some(PositionRecord {
        node_num,
        latitude: coord_from_i(lat),
        longitude: coord_from_i(lon),
        altitude: pos.altitude,
        time: timestamp(pos.time, now),
        sats_in_view: pos.sats_in_view,
        precision_bits: pos.precision_bits,
        speed: pos.ground_speed,
        heading: pos.ground_track,
    })
}

fn ingest_node_info(info: &NodeInfo, ctx: &mut PacketContext<'_>) {
    let mut node = ctx
        .repo
        .find_node(info.num)
        .unwrap_or_else(|| NodeRecord::new(info.num));
    if let Some(user) = &info.user {
        apply_user(&mut node, user);
    }
    if info.snr != 0.0 {
        node.snr = Some(info.snr);
    }
    if info.last_heard != 0 {
        node.last_heard = Some(timestamp(info.last_heard, ctx.now));
    }
    if let Some(m) = &info.device_metrics {
        node.battery_level = m.battery_level;
        node.voltage = m.voltage;
        node.channel_utilization = m.channel_utilization;
        node.air_util_tx = m.air_util_tx;
        node.uptime_seconds = m.uptime_seconds;
    }
    node.channel = info.channel;
    node.via_mqtt = info.via_mqtt;
    node.hops_away = info.hops_away;
    node.is_favorite = info.is_favorite;
    node.is_ignored = info.is_ignored;
    trace!("NodeInfo !{:08x} '{}'", info.num, escape_log(&node.long_name));
    ctx.repo.upsert_node(node);
    if let Some(record) = info
        .position
        .as_ref()
        .and_then(|p| position_record(info.num, p, ctx.now))
    {
        ctx.repo.upsert_position(record);
    }
}

fn decode_or_warn<M: Message + Default>(what: &str, packet: &MeshPacket, data: &Data) -> Option<M> {
    match M::decode(data.payload.clone()) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(
                "Malformed {} payload in packet {} from !{:08x}: {}",
                what, packet.id, packet.from, e
            );
            None
        }
    }
}

/// Flags distinguishing the ways a text reaches us.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TextOrigin {
    pub alert: bool,
    pub store_forward: bool,
}

/// Store an inbound text and notify for direct messages and alerts.
pub(crate) fn ingest_text(
    packet: &MeshPacket,
    payload: &[u8],
    data: &Data,
    origin: TextOrigin,
    ctx: &mut PacketContext<'_>,
) -> Vec<Effect> {
    if Some(packet.from) == ctx.my_node_num {
        trace!("Ignoring echo of our own message {}", packet.id);
        return Vec::new();
    }
    if ctx.repo.find_node(packet.from).is_some_and(|n| n.is_ignored) {
        debug!("Dropping message from ignored node !{:08x}", packet.from);
        return Vec::new();
    }
    let text = String::from_utf8_lossy(payload).into_owned();
    let direct = packet.to != BROADCAST_ADDR && Some(packet.to) == ctx.my_node_num;
    debug!(
        "Text {} from !{:08x} ({}): '{}'",
        packet.id,
        packet.from,
        if direct { "direct" } else { "channel" },
        truncate_for_log(&text, 80)
    );
    ctx.repo.upsert_message(MessageRecord {
        id: packet.id,
        from: packet.from,
        to: packet.to,
        channel: packet.channel,
        text: text.clone(),
        received: timestamp(packet.rx_time, ctx.now),
        rx_snr: (packet.rx_snr != 0.0).then_some(packet.rx_snr),
        rx_rssi: (packet.rx_rssi != 0).then_some(packet.rx_rssi),
        hop_start: packet.hop_start,
        hop_limit: packet.hop_limit,
        via_mqtt: packet.via_mqtt,
        direct,
        reply_id: (data.reply_id != 0).then_some(data.reply_id),
        emoji: data.emoji != 0,
        alert: origin.alert,
        store_forward: origin.store_forward,
        outgoing: false,
        ack: AckState::NotApplicable,
    });

    if !(direct || origin.alert) {
        return Vec::new();
    }
    let sender = ctx.node_name(packet.from);
    let title = if origin.alert {
        format!("Alert from {}", sender)
    } else {
        sender
    };
    vec![Effect::Notify(
        Notification::new(title, text).with_target(RouteTarget::Messages {
            channel: packet.channel,
            from: packet.from,
        }),
    )]
}

fn handle_text(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    ingest_text(packet, &data.payload, data, TextOrigin::default(), ctx)
}

fn handle_alert(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let origin = TextOrigin {
        alert: true,
        ..TextOrigin::default()
    };
    ingest_text(packet, &data.payload, data, origin, ctx)
}

fn handle_position(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(pos) = decode_or_warn::<Position>("position", packet, data) else {
        return Vec::new();
    };
    match position_record(packet.from, &pos, ctx.now) {
        Some(record) => ctx.repo.upsert_position(record),
        None => trace!("Position from !{:08x} without coordinates", packet.from),
    }
    Vec::new()
}

fn handle_nodeinfo(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(user) = decode_or_warn::<User>("user", packet, data) else {
        return Vec::new();
    };
    let mut node = ctx.node_or_create(packet.from);
    apply_user(&mut node, &user);
    ctx.repo.upsert_node(node);
    Vec::new()
}

fn mark_ack(ctx: &mut PacketContext<'_>, request_id: u32, state: AckState) {
    match ctx.repo.mark_message_ack(request_id, state) {
        Ok(()) => {}
        Err(RepositoryError::NotFound(_)) => trace!("No outgoing message {} to mark", request_id),
        Err(e) => warn!("Failed to mark message {}: {}", request_id, e),
    }
}

fn handle_routing(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(routing) = decode_or_warn::<Routing>("routing", packet, data) else {
        return Vec::new();
    };
    let request_id = data.request_id;
    match routing.variant {
        Some(routing::Variant::ErrorReason(code)) if request_id != 0 => {
            let reason = routing::Error::try_from(code).unwrap_or(routing::Error::BadRequest);
            if reason == routing::Error::None {
                debug!("Ack for {} from !{:08x}", request_id, packet.from);
                mark_ack(ctx, request_id, AckState::Acked);
                vec![Effect::Ack { request_id }]
            } else {
                debug!("Nak for {} from !{:08x}: {:?}", request_id, packet.from, reason);
                mark_ack(ctx, request_id, AckState::Failed(format!("{:?}", reason)));
                vec![Effect::RoutingError { request_id, reason }]
            }
        }
        Some(other) => {
            trace!("Routing frame from !{:08x} not for us: {:?}", packet.from, other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn handle_admin(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(admin) = decode_or_warn::<AdminMessage>("admin", packet, data) else {
        return Vec::new();
    };
    let from = packet.from;
    let mut effects = Vec::new();
    if !admin.session_passkey.is_empty() {
        effects.push(Effect::SessionPasskey {
            node: from,
            passkey: admin.session_passkey.clone(),
        });
    }
    match admin.payload_variant {
        Some(AdminPayload::GetChannelResponse(channel)) if ctx.accept_config => {
            ctx.repo.upsert_channel(channel_record(from, &channel));
        }
        Some(AdminPayload::GetOwnerResponse(user)) if ctx.accept_config => {
            let mut node = ctx.node_or_create(from);
            apply_user(&mut node, &user);
            ctx.repo.upsert_node(node);
        }
        Some(AdminPayload::GetConfigResponse(config)) if ctx.accept_config => {
            if let (Some(kind), Some(body)) = (config.kind(), config.body()) {
                ctx.repo
                    .upsert_config(from, ConfigKind::Radio(kind as i32), body.to_vec());
            }
        }
        Some(AdminPayload::GetModuleConfigResponse(config)) if ctx.accept_config => {
            if let (Some(kind), Some(body)) = (config.kind(), config.body()) {
                ctx.repo
                    .upsert_config(from, ConfigKind::Module(kind as i32), body.to_vec());
            }
        }
        Some(AdminPayload::GetDeviceMetadataResponse(metadata)) => {
            if ctx.accept_config {
                let mut node = ctx.node_or_create(from);
                node.firmware_version = Some(metadata.firmware_version.clone());
                ctx.repo.upsert_node(node);
            }
            if Some(from) == ctx.my_node_num {
                effects.push(Effect::Metadata(metadata));
            }
        }
        Some(AdminPayload::GetCannedMessageModuleMessagesResponse(text))
        | Some(AdminPayload::GetRingtoneResponse(text)) => {
            debug!("Admin text reply from !{:08x}: '{}'", from, truncate_for_log(&text, 80));
        }
        Some(_) => trace!("Admin message from !{:08x} needs no ingestion", from),
        None => {}
    }
    if data.request_id != 0 {
        effects.push(Effect::AdminReply {
            request_id: data.request_id,
            from,
        });
    }
    effects
}

fn handle_waypoint(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(waypoint) = decode_or_warn::<Waypoint>("waypoint", packet, data) else {
        return Vec::new();
    };
    let record = waypoint_record(packet.from, &waypoint);
    debug!("Waypoint {} '{}'", record.id, escape_log(&record.name));
    ctx.repo.upsert_waypoint(record);
    Vec::new()
}

fn handle_telemetry(packet: &MeshPacket, data: &Data, ctx: &mut PacketContext<'_>) -> Vec<Effect> {
    let Some(telemetry) = decode_or_warn::<Telemetry>("telemetry", packet, data) else {
        return Vec::new();
    };
    let time = timestamp(telemetry.time, ctx.now);
    let metrics = match telemetry.variant {
        Some(telemetry::Variant::DeviceMetrics(m)) => {
            let mut node = ctx.node_or_create(packet.from);
            node.battery_level = m.battery_level.or(node.battery_level);
            node.voltage = m.voltage.or(node.voltage);
            node.channel_utilization = m.channel_utilization.or(node.channel_utilization);
            node.air_util_tx = m.air_util_tx.or(node.air_util_tx);
            node.uptime_seconds = m.uptime_seconds.or(node.uptime_seconds);
            ctx.repo.upsert_node(node);
            TelemetryMetrics::Device {
                battery_level: m.battery_level,
                voltage: m.voltage,
                channel_utilization: m.channel_utilization,
                air_util_tx: m.air_util_tx,
                uptime_seconds: m.uptime_seconds,
            }
        }
        Some(telemetry::Variant::EnvironmentMetrics(m)) => TelemetryMetrics::Environment {
            temperature: m.temperature,
            relative_humidity: m.relative_humidity,
            barometric_pressure: m.barometric_pressure,
        },
        Some(telemetry::Variant::LocalStats(s)) => TelemetryMetrics::LocalStats {
            uptime_seconds: s.uptime_seconds,
            channel_utilization: s.channel_utilization,
            air_util_tx: s.air_util_tx,
            num_packets_tx: s.num_packets_tx,
            num_packets_rx: s.num_packets_rx,
            num_online_nodes: s.num_online_nodes,
            num_total_nodes: s.num_total_nodes,
        },
        None => return Vec::new(),
    };
    ctx.repo.upsert_telemetry(TelemetryRecord {
        node_num: packet.from,
        time,
        metrics,
    });
    Vec::new()
}
