//! Administrative messages (port [`super::PortNum::AdminApp`]) and the share
//! payloads behind channel and contact URLs.

use super::mesh::{ChannelSettings, User};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SharedContact {
    #[prost(uint32, tag = "1")]
    pub node_num: u32,
    #[prost(message, optional, tag = "2")]
    pub user: Option<User>,
    #[prost(bool, tag = "3")]
    pub should_ignore: bool,
}

/// Payload of a `https://meshtastic.org/e/#...` share link.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelSet {
    #[prost(message, repeated, tag = "1")]
    pub settings: Vec<ChannelSettings>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub lora_config: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AdminMessage {
    #[prost(
        oneof = "admin_message::PayloadVariant",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15, 21, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 47, 48, 64, 65, 66, 94, 95, 97, 98, 99, 100"
    )]
    pub payload_variant: Option<admin_message::PayloadVariant>,
    #[prost(bytes = "vec", tag = "101")]
    pub session_passkey: Vec<u8>,
}

pub mod admin_message {
    use crate::protobuf::mesh::{Channel, Config, DeviceMetadata, ModuleConfig, Position, User};

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(uint32, tag = "1")]
        GetChannelRequest(u32),
        #[prost(message, tag = "2")]
        GetChannelResponse(Channel),
        #[prost(bool, tag = "3")]
        GetOwnerRequest(bool),
        #[prost(message, tag = "4")]
        GetOwnerResponse(User),
        #[prost(enumeration = "crate::protobuf::ConfigType", tag = "5")]
        GetConfigRequest(i32),
        #[prost(message, tag = "6")]
        GetConfigResponse(Config),
        #[prost(enumeration = "crate::protobuf::ModuleConfigType", tag = "7")]
        GetModuleConfigRequest(i32),
        #[prost(message, tag = "8")]
        GetModuleConfigResponse(ModuleConfig),
        #[prost(bool, tag = "10")]
        GetCannedMessageModuleMessagesRequest(bool),
        #[prost(string, tag = "11")]
        GetCannedMessageModuleMessagesResponse(String),
        #[prost(bool, tag = "12")]
        GetDeviceMetadataRequest(bool),
        #[prost(message, tag = "13")]
        GetDeviceMetadataResponse(DeviceMetadata),
        #[prost(bool, tag = "14")]
        GetRingtoneRequest(bool),
        #[prost(string, tag = "15")]
        GetRingtoneResponse(String),
        #[prost(bool, tag = "21")]
        EnterDfuModeRequest(bool),
        #[prost(message, tag = "32")]
        SetOwner(User),
        #[prost(message, tag = "33")]
        SetChannel(Channel),
        #[prost(message, tag = "34")]
        SetConfig(Config),
        #[prost(message, tag = "35")]
        SetModuleConfig(ModuleConfig),
        #[prost(string, tag = "36")]
        SetCannedMessageModuleMessages(String),
        #[prost(string, tag = "37")]
        SetRingtoneMessage(String),
        #[prost(uint32, tag = "38")]
        RemoveByNodenum(u32),
        #[prost(uint32, tag = "39")]
        SetFavoriteNode(u32),
        #[prost(uint32, tag = "40")]
        RemoveFavoriteNode(u32),
        #[prost(message, tag = "41")]
        SetFixedPosition(Position),
        #[prost(bool, tag = "42")]
        RemoveFixedPosition(bool),
        #[prost(fixed32, tag = "43")]
        SetTimeOnly(u32),
        #[prost(uint32, tag = "47")]
        SetIgnoredNode(u32),
        #[prost(uint32, tag = "48")]
        RemoveIgnoredNode(u32),
        #[prost(bool, tag = "64")]
        BeginEditSettings(bool),
        #[prost(bool, tag = "65")]
        CommitEditSettings(bool),
        #[prost(message, tag = "66")]
        AddContact(super::SharedContact),
        #[prost(int32, tag = "94")]
        FactoryResetDevice(i32),
        #[prost(int32, tag = "95")]
        RebootOtaSeconds(i32),
        #[prost(int32, tag = "97")]
        RebootSeconds(i32),
        #[prost(int32, tag = "98")]
        ShutdownSeconds(i32),
        #[prost(int32, tag = "99")]
        FactoryResetConfig(i32),
        #[prost(int32, tag = "100")]
        NodedbReset(i32),
    }
}
