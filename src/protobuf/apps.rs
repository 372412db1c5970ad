//! Application payloads carried inside [`super::Data`]: routing, trace route,
//! waypoints, store-and-forward and telemetry.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RouteDiscovery {
    #[prost(fixed32, repeated, tag = "1")]
    pub route: Vec<u32>,
    #[prost(int32, repeated, tag = "2")]
    pub snr_towards: Vec<i32>,
    #[prost(fixed32, repeated, tag = "3")]
    pub route_back: Vec<u32>,
    #[prost(int32, repeated, tag = "4")]
    pub snr_back: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Routing {
    #[prost(oneof = "routing::Variant", tags = "1, 2, 3")]
    pub variant: Option<routing::Variant>,
}

pub mod routing {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Error {
        None = 0,
        NoRoute = 1,
        GotNak = 2,
        Timeout = 3,
        NoInterface = 4,
        MaxRetransmit = 5,
        NoChannel = 6,
        TooLarge = 7,
        NoResponse = 8,
        DutyCycleLimit = 9,
        BadRequest = 32,
        NotAuthorized = 33,
        PkiFailed = 34,
        PkiUnknownPubkey = 35,
        AdminBadSessionKey = 36,
        AdminPublicKeyUnauthorized = 37,
        RateLimitExceeded = 38,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "1")]
        RouteRequest(super::RouteDiscovery),
        #[prost(message, tag = "2")]
        RouteReply(super::RouteDiscovery),
        #[prost(enumeration = "Error", tag = "3")]
        ErrorReason(i32),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Waypoint {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(sfixed32, optional, tag = "2")]
    pub latitude_i: Option<i32>,
    #[prost(sfixed32, optional, tag = "3")]
    pub longitude_i: Option<i32>,
    #[prost(uint32, tag = "4")]
    pub expire: u32,
    #[prost(uint32, tag = "5")]
    pub locked_to: u32,
    #[prost(string, tag = "6")]
    pub name: String,
    #[prost(string, tag = "7")]
    pub description: String,
    #[prost(fixed32, tag = "8")]
    pub icon: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StoreAndForward {
    #[prost(enumeration = "store_and_forward::RequestResponse", tag = "1")]
    pub rr: i32,
    #[prost(oneof = "store_and_forward::Variant", tags = "2, 3, 4, 5")]
    pub variant: Option<store_and_forward::Variant>,
}

pub mod store_and_forward {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum RequestResponse {
        Unset = 0,
        RouterError = 1,
        RouterHeartbeat = 2,
        RouterPing = 3,
        RouterPong = 4,
        RouterBusy = 5,
        RouterHistory = 6,
        RouterStats = 7,
        RouterTextDirect = 8,
        RouterTextBroadcast = 9,
        ClientError = 64,
        ClientHistory = 65,
        ClientStats = 66,
        ClientPing = 67,
        ClientPong = 68,
        ClientAbort = 106,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Statistics {
        #[prost(uint32, tag = "1")]
        pub messages_total: u32,
        #[prost(uint32, tag = "2")]
        pub messages_saved: u32,
        #[prost(uint32, tag = "3")]
        pub messages_max: u32,
        #[prost(uint32, tag = "4")]
        pub up_time: u32,
        #[prost(uint32, tag = "5")]
        pub requests: u32,
        #[prost(uint32, tag = "6")]
        pub requests_history: u32,
        #[prost(bool, tag = "7")]
        pub heartbeat: bool,
        #[prost(uint32, tag = "8")]
        pub return_max: u32,
        #[prost(uint32, tag = "9")]
        pub return_window: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct History {
        #[prost(uint32, tag = "1")]
        pub history_messages: u32,
        #[prost(uint32, tag = "2")]
        pub window: u32,
        #[prost(uint32, tag = "3")]
        pub last_request: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Heartbeat {
        #[prost(uint32, tag = "1")]
        pub period: u32,
        #[prost(uint32, tag = "2")]
        pub secondary: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "2")]
        Stats(Statistics),
        #[prost(message, tag = "3")]
        History(History),
        #[prost(message, tag = "4")]
        Heartbeat(Heartbeat),
        #[prost(bytes, tag = "5")]
        Text(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvironmentMetrics {
    #[prost(float, optional, tag = "1")]
    pub temperature: Option<f32>,
    #[prost(float, optional, tag = "2")]
    pub relative_humidity: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub barometric_pressure: Option<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LocalStats {
    #[prost(uint32, tag = "1")]
    pub uptime_seconds: u32,
    #[prost(float, tag = "2")]
    pub channel_utilization: f32,
    #[prost(float, tag = "3")]
    pub air_util_tx: f32,
    #[prost(uint32, tag = "4")]
    pub num_packets_tx: u32,
    #[prost(uint32, tag = "5")]
    pub num_packets_rx: u32,
    #[prost(uint32, tag = "6")]
    pub num_packets_rx_bad: u32,
    #[prost(uint32, tag = "7")]
    pub num_online_nodes: u32,
    #[prost(uint32, tag = "8")]
    pub num_total_nodes: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Telemetry {
    #[prost(fixed32, tag = "1")]
    pub time: u32,
    #[prost(oneof = "telemetry::Variant", tags = "2, 3, 6")]
    pub variant: Option<telemetry::Variant>,
}

pub mod telemetry {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "2")]
        DeviceMetrics(super::super::DeviceMetrics),
        #[prost(message, tag = "3")]
        EnvironmentMetrics(super::EnvironmentMetrics),
        #[prost(message, tag = "6")]
        LocalStats(super::LocalStats),
    }
}
