//! Radio-link envelopes (`ToRadio`/`FromRadio`), mesh packets and the records
//! a radio streams during the configuration handshake.

/// Application port carried in [`Data::portnum`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PortNum {
    UnknownApp = 0,
    TextMessageApp = 1,
    RemoteHardwareApp = 2,
    PositionApp = 3,
    NodeinfoApp = 4,
    RoutingApp = 5,
    AdminApp = 6,
    TextMessageCompressedApp = 7,
    WaypointApp = 8,
    AudioApp = 9,
    DetectionSensorApp = 10,
    AlertApp = 11,
    ReplyApp = 32,
    IpTunnelApp = 33,
    PaxcounterApp = 34,
    SerialApp = 64,
    StoreForwardApp = 65,
    RangeTestApp = 66,
    TelemetryApp = 67,
    ZpsApp = 68,
    SimulatorApp = 69,
    TracerouteApp = 70,
    NeighborinfoApp = 71,
    AtakPlugin = 72,
    MapReportApp = 73,
    PowerstressApp = 74,
    ReticulumTunnelApp = 76,
    PrivateApp = 256,
    AtakForwarder = 257,
    Max = 511,
}

/// Transmit priority of a [`MeshPacket`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Priority {
    Unset = 0,
    Min = 1,
    Background = 10,
    Default = 64,
    Reliable = 70,
    Response = 80,
    High = 100,
    Alert = 110,
    Ack = 120,
    Max = 127,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    Unset = 0,
    Trace = 5,
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    #[prost(enumeration = "PortNum", tag = "1")]
    pub portnum: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: ::bytes::Bytes,
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    #[prost(fixed32, tag = "4")]
    pub dest: u32,
    #[prost(fixed32, tag = "5")]
    pub source: u32,
    #[prost(fixed32, tag = "6")]
    pub request_id: u32,
    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
    #[prost(fixed32, tag = "8")]
    pub emoji: u32,
    #[prost(uint32, optional, tag = "9")]
    pub bitfield: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeshPacket {
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,
    #[prost(float, tag = "8")]
    pub rx_snr: f32,
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    #[prost(enumeration = "Priority", tag = "11")]
    pub priority: i32,
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
    #[prost(bool, tag = "14")]
    pub via_mqtt: bool,
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
    #[prost(bytes = "vec", tag = "16")]
    pub public_key: Vec<u8>,
    #[prost(bool, tag = "17")]
    pub pki_encrypted: bool,
}

pub mod mesh_packet {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        #[prost(bytes, tag = "5")]
        Encrypted(Vec<u8>),
    }
}

impl MeshPacket {
    /// The decoded application payload, if the radio delivered one.
    pub fn decoded(&self) -> Option<&Data> {
        match &self.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(d)) => Some(d),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub long_name: String,
    #[prost(string, tag = "3")]
    pub short_name: String,
    #[prost(bytes = "vec", tag = "4")]
    pub macaddr: Vec<u8>,
    #[prost(int32, tag = "5")]
    pub hw_model: i32,
    #[prost(bool, tag = "6")]
    pub is_licensed: bool,
    #[prost(int32, tag = "7")]
    pub role: i32,
    #[prost(bytes = "vec", tag = "8")]
    pub public_key: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    #[prost(fixed32, tag = "4")]
    pub time: u32,
    #[prost(fixed32, tag = "7")]
    pub timestamp: u32,
    #[prost(uint32, optional, tag = "15")]
    pub ground_speed: Option<u32>,
    #[prost(uint32, optional, tag = "16")]
    pub ground_track: Option<u32>,
    #[prost(uint32, tag = "19")]
    pub sats_in_view: u32,
    #[prost(uint32, tag = "23")]
    pub precision_bits: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub battery_level: Option<u32>,
    #[prost(float, optional, tag = "2")]
    pub voltage: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub channel_utilization: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub air_util_tx: Option<f32>,
    #[prost(uint32, optional, tag = "5")]
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    #[prost(uint32, tag = "1")]
    pub num: u32,
    #[prost(message, optional, tag = "2")]
    pub user: Option<User>,
    #[prost(message, optional, tag = "3")]
    pub position: Option<Position>,
    #[prost(float, tag = "4")]
    pub snr: f32,
    #[prost(fixed32, tag = "5")]
    pub last_heard: u32,
    #[prost(message, optional, tag = "6")]
    pub device_metrics: Option<DeviceMetrics>,
    #[prost(uint32, tag = "7")]
    pub channel: u32,
    #[prost(bool, tag = "8")]
    pub via_mqtt: bool,
    #[prost(uint32, optional, tag = "9")]
    pub hops_away: Option<u32>,
    #[prost(bool, tag = "10")]
    pub is_favorite: bool,
    #[prost(bool, tag = "11")]
    pub is_ignored: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MyNodeInfo {
    #[prost(uint32, tag = "1")]
    pub my_node_num: u32,
    #[prost(uint32, tag = "8")]
    pub reboot_count: u32,
    #[prost(uint32, tag = "11")]
    pub min_app_version: u32,
    #[prost(bytes = "vec", tag = "12")]
    pub device_id: Vec<u8>,
    #[prost(string, tag = "13")]
    pub pio_env: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceMetadata {
    #[prost(string, tag = "1")]
    pub firmware_version: String,
    #[prost(uint32, tag = "2")]
    pub device_state_version: u32,
    #[prost(bool, tag = "3")]
    pub can_shutdown: bool,
    #[prost(bool, tag = "4")]
    pub has_wifi: bool,
    #[prost(bool, tag = "5")]
    pub has_bluetooth: bool,
    #[prost(bool, tag = "6")]
    pub has_ethernet: bool,
    #[prost(int32, tag = "7")]
    pub role: i32,
    #[prost(uint32, tag = "8")]
    pub position_flags: u32,
    #[prost(int32, tag = "9")]
    pub hw_model: i32,
    #[prost(bool, tag = "10")]
    pub has_remote_hardware: bool,
    #[prost(bool, tag = "11")]
    pub has_pkc: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChannelRole {
    Disabled = 0,
    Primary = 1,
    Secondary = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleSettings {
    #[prost(uint32, tag = "1")]
    pub position_precision: u32,
    #[prost(bool, tag = "2")]
    pub is_client_muted: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelSettings {
    #[prost(uint32, tag = "1")]
    pub channel_num: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub psk: Vec<u8>,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(fixed32, tag = "4")]
    pub id: u32,
    #[prost(bool, tag = "5")]
    pub uplink_enabled: bool,
    #[prost(bool, tag = "6")]
    pub downlink_enabled: bool,
    #[prost(message, optional, tag = "7")]
    pub module_settings: Option<ModuleSettings>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Channel {
    #[prost(int32, tag = "1")]
    pub index: i32,
    #[prost(message, optional, tag = "2")]
    pub settings: Option<ChannelSettings>,
    #[prost(enumeration = "ChannelRole", tag = "3")]
    pub role: i32,
}

/// Radio configuration categories, in the order of [`config::PayloadVariant`] tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConfigType {
    DeviceConfig = 0,
    PositionConfig = 1,
    PowerConfig = 2,
    NetworkConfig = 3,
    DisplayConfig = 4,
    LoraConfig = 5,
    BluetoothConfig = 6,
    SecurityConfig = 7,
    SessionkeyConfig = 8,
    DeviceuiConfig = 9,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Config {
    #[prost(oneof = "config::PayloadVariant", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10")]
    pub payload_variant: Option<config::PayloadVariant>,
}

pub mod config {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(bytes, tag = "1")]
        Device(Vec<u8>),
        #[prost(bytes, tag = "2")]
        Position(Vec<u8>),
        #[prost(bytes, tag = "3")]
        Power(Vec<u8>),
        #[prost(bytes, tag = "4")]
        Network(Vec<u8>),
        #[prost(bytes, tag = "5")]
        Display(Vec<u8>),
        #[prost(bytes, tag = "6")]
        Lora(Vec<u8>),
        #[prost(bytes, tag = "7")]
        Bluetooth(Vec<u8>),
        #[prost(bytes, tag = "8")]
        Security(Vec<u8>),
        #[prost(bytes, tag = "9")]
        Sessionkey(Vec<u8>),
        #[prost(bytes, tag = "10")]
        DeviceUi(Vec<u8>),
    }
}

impl Config {
    pub fn new(kind: ConfigType, body: Vec<u8>) -> Self {
        use config::PayloadVariant as V;
        let variant = match kind {
            ConfigType::DeviceConfig => V::Device(body),
            ConfigType::PositionConfig => V::Position(body),
            ConfigType::PowerConfig => V::Power(body),
            ConfigType::NetworkConfig => V::Network(body),
            ConfigType::DisplayConfig => V::Display(body),
            ConfigType::LoraConfig => V::Lora(body),
            ConfigType::BluetoothConfig => V::Bluetooth(body),
            ConfigType::SecurityConfig => V::Security(body),
            ConfigType::SessionkeyConfig => V::Sessionkey(body),
            ConfigType::DeviceuiConfig => V::DeviceUi(body),
        };
        Self {
            payload_variant: Some(variant),
        }
    }

    pub fn kind(&self) -> Option<ConfigType> {
        use config::PayloadVariant as V;
        Some(match self.payload_variant.as_ref()? {
            V::Device(_) => ConfigType::DeviceConfig,
            V::Position(_) => ConfigType::PositionConfig,
            V::Power(_) => ConfigType::PowerConfig,
            V::Network(_) => ConfigType::NetworkConfig,
            V::Display(_) => ConfigType::DisplayConfig,
            V::Lora(_) => ConfigType::LoraConfig,
            V::Bluetooth(_) => ConfigType::BluetoothConfig,
            V::Security(_) => ConfigType::SecurityConfig,
            V::Sessionkey(_) => ConfigType::SessionkeyConfig,
            V::DeviceUi(_) => ConfigType::DeviceuiConfig,
        })
    }

    pub fn body(&self) -> Option<&[u8]> {
        use config::PayloadVariant as V;
        Some(match self.payload_variant.as_ref()? {
            V::Device(b)
            | V::Position(b)
            | V::Power(b)
            | V::Network(b)
            | V::Display(b)
            | V::Lora(b)
            | V::Bluetooth(b)
            | V::Security(b)
            | V::Sessionkey(b)
            | V::DeviceUi(b) => b.as_slice(),
        })
    }
}

/// Module configuration categories, in the order of [`module_config::PayloadVariant`] tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ModuleConfigType {
    MqttConfig = 0,
    SerialConfig = 1,
    ExtnotifConfig = 2,
    StoreforwardConfig = 3,
    RangetestConfig = 4,
    TelemetryConfig = 5,
    CannedmsgConfig = 6,
    AudioConfig = 7,
    RemotehardwareConfig = 8,
    NeighborinfoConfig = 9,
    AmbientlightingConfig = 10,
    DetectionsensorConfig = 11,
    PaxcounterConfig = 12,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleConfig {
    #[prost(
        oneof = "module_config::PayloadVariant",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13"
    )]
    pub payload_variant: Option<module_config::PayloadVariant>,
}

pub mod module_config {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(bytes, tag = "1")]
        Mqtt(Vec<u8>),
        #[prost(bytes, tag = "2")]
        Serial(Vec<u8>),
        #[prost(bytes, tag = "3")]
        ExternalNotification(Vec<u8>),
        #[prost(bytes, tag = "4")]
        StoreForward(Vec<u8>),
        #[prost(bytes, tag = "5")]
        RangeTest(Vec<u8>),
        #[prost(bytes, tag = "6")]
        Telemetry(Vec<u8>),
        #[prost(bytes, tag = "7")]
        CannedMessage(Vec<u8>),
        #[prost(bytes, tag = "8")]
        Audio(Vec<u8>),
        #[prost(bytes, tag = "9")]
        RemoteHardware(Vec<u8>),
        #[prost(bytes, tag = "10")]
        NeighborInfo(Vec<u8>),
        #[prost(bytes, tag = "11")]
        AmbientLighting(Vec<u8>),
        #[prost(bytes, tag = "12")]
        DetectionSensor(Vec<u8>),
        #[prost(bytes, tag = "13")]
        Paxcounter(Vec<u8>),
    }
}

impl ModuleConfig {
    pub fn new(kind: ModuleConfigType, body: Vec<u8>) -> Self {
        use module_config::PayloadVariant as V;
        let variant = match kind {
            ModuleConfigType::MqttConfig => V::Mqtt(body),
            ModuleConfigType::SerialConfig => V::Serial(body),
            ModuleConfigType::ExtnotifConfig => V::ExternalNotification(body),
            ModuleConfigType::StoreforwardConfig => V::StoreForward(body),
            ModuleConfigType::RangetestConfig => V::RangeTest(body),
            ModuleConfigType::TelemetryConfig => V::Telemetry(body),
            ModuleConfigType::CannedmsgConfig => V::CannedMessage(body),
            ModuleConfigType::AudioConfig => V::Audio(body),
            ModuleConfigType::RemotehardwareConfig => V::RemoteHardware(body),
            ModuleConfigType::NeighborinfoConfig => V::NeighborInfo(body),
            ModuleConfigType::AmbientlightingConfig => V::AmbientLighting(body),
            ModuleConfigType::DetectionsensorConfig => V::DetectionSensor(body),
            ModuleConfigType::PaxcounterConfig => V::Paxcounter(body),
        };
        Self {
            payload_variant: Some(variant),
        }
    }

    pub fn kind(&self) -> Option<ModuleConfigType> {
        use module_config::PayloadVariant as V;
        Some(match self.payload_variant.as_ref()? {
            V::Mqtt(_) => ModuleConfigType::MqttConfig,
            V::Serial(_) => ModuleConfigType::SerialConfig,
            V::ExternalNotification(_) => ModuleConfigType::ExtnotifConfig,
            V::StoreForward(_) => ModuleConfigType::StoreforwardConfig,
            V::RangeTest(_) => ModuleConfigType::RangetestConfig,
            V::Telemetry(_) => ModuleConfigType::TelemetryConfig,
            V::CannedMessage(_) => ModuleConfigType::CannedmsgConfig,
            V::Audio(_) => ModuleConfigType::AudioConfig,
            V::RemoteHardware(_) => ModuleConfigType::RemotehardwareConfig,
            V::NeighborInfo(_) => ModuleConfigType::NeighborinfoConfig,
            V::AmbientLighting(_) => ModuleConfigType::AmbientlightingConfig,
            V::DetectionSensor(_) => ModuleConfigType::DetectionsensorConfig,
            V::Paxcounter(_) => ModuleConfigType::PaxcounterConfig,
        })
    }

    pub fn body(&self) -> Option<&[u8]> {
        use module_config::PayloadVariant as V;
        Some(match self.payload_variant.as_ref()? {
            V::Mqtt(b)
            | V::Serial(b)
            | V::ExternalNotification(b)
            | V::StoreForward(b)
            | V::RangeTest(b)
            | V::Telemetry(b)
            | V::CannedMessage(b)
            | V::Audio(b)
            | V::RemoteHardware(b)
            | V::NeighborInfo(b)
            | V::AmbientLighting(b)
            | V::DetectionSensor(b)
            | V::Paxcounter(b) => b.as_slice(),
        })
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogRecord {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(fixed32, tag = "2")]
    pub time: u32,
    #[prost(string, tag = "3")]
    pub source: String,
    #[prost(enumeration = "LogLevel", tag = "4")]
    pub level: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueStatus {
    #[prost(int32, tag = "1")]
    pub res: i32,
    #[prost(uint32, tag = "2")]
    pub free: u32,
    #[prost(uint32, tag = "3")]
    pub maxlen: u32,
    #[prost(uint32, tag = "4")]
    pub mesh_packet_id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfo {
    #[prost(string, tag = "1")]
    pub file_name: String,
    #[prost(uint32, tag = "2")]
    pub size_bytes: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MqttClientProxyMessage {
    #[prost(string, tag = "1")]
    pub topic: String,
    #[prost(oneof = "mqtt_client_proxy_message::PayloadVariant", tags = "2, 3")]
    pub payload_variant: Option<mqtt_client_proxy_message::PayloadVariant>,
    #[prost(bool, tag = "4")]
    pub retained: bool,
}

pub mod mqtt_client_proxy_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(bytes, tag = "2")]
        Data(Vec<u8>),
        #[prost(string, tag = "3")]
        Text(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientNotification {
    #[prost(fixed32, optional, tag = "1")]
    pub reply_id: Option<u32>,
    #[prost(fixed32, tag = "2")]
    pub time: u32,
    #[prost(enumeration = "LogLevel", tag = "3")]
    pub level: i32,
    #[prost(string, tag = "4")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(uint32, tag = "1")]
    pub nonce: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromRadio {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(
        oneof = "from_radio::PayloadVariant",
        tags = "2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14, 15, 16"
    )]
    pub payload_variant: Option<from_radio::PayloadVariant>,
}

pub mod from_radio {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "2")]
        Packet(super::MeshPacket),
        #[prost(message, tag = "3")]
        MyInfo(super::MyNodeInfo),
        #[prost(message, tag = "4")]
        NodeInfo(super::NodeInfo),
        #[prost(message, tag = "5")]
        Config(super::Config),
        #[prost(message, tag = "6")]
        LogRecord(super::LogRecord),
        #[prost(uint32, tag = "7")]
        ConfigCompleteId(u32),
        #[prost(bool, tag = "8")]
        Rebooted(bool),
        #[prost(message, tag = "9")]
        ModuleConfig(super::ModuleConfig),
        #[prost(message, tag = "10")]
        Channel(super::Channel),
        #[prost(message, tag = "11")]
        QueueStatus(super::QueueStatus),
        #[prost(message, tag = "13")]
        Metadata(super::DeviceMetadata),
        #[prost(message, tag = "14")]
        MqttClientProxyMessage(super::MqttClientProxyMessage),
        #[prost(message, tag = "15")]
        FileInfo(super::FileInfo),
        #[prost(message, tag = "16")]
        ClientNotification(super::ClientNotification),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToRadio {
    #[prost(oneof = "to_radio::PayloadVariant", tags = "1, 3, 4, 6, 7")]
    pub payload_variant: Option<to_radio::PayloadVariant>,
}

pub mod to_radio {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "1")]
        Packet(super::MeshPacket),
        #[prost(uint32, tag = "3")]
        WantConfigId(u32),
        #[prost(bool, tag = "4")]
        Disconnect(bool),
        #[prost(message, tag = "6")]
        MqttClientProxyMessage(super::MqttClientProxyMessage),
        #[prost(message, tag = "7")]
        Heartbeat(super::Heartbeat),
    }
}
