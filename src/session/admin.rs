//! Administrative requests and their correlation.
//!
//! Every admin packet gets a random id that doubles as the correlation token.
//! Replies arrive later as admin packets whose `request_id` names it, or as
//! routing acks/errors. There is no timeout here: callers that need one build
//! it on top of [`AdminCorrelator::pending`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::{debug, info, warn};
use prost::Message;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

use super::{Envelope, Session, SessionError, SESSION_PASSKEY_TTL};
use crate::metrics;
use crate::notify::NotificationSink;
use crate::protobuf::{
    admin_message::PayloadVariant as AdminPayload, routing, AdminMessage, Channel, ChannelRole,
    ChannelSet, ChannelSettings, Config, ConfigType, ModuleConfig, ModuleConfigType, PortNum,
    Position, Priority, SharedContact, User,
};
use crate::storage::{ChannelRecord, NodeRecord, Repository};
use crate::transport::Transport;

/// Highest channel index a radio supports.
const MAX_CHANNEL_INDEX: i32 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum AdminOperation {
    GetChannel(u32),
    GetOwner,
    GetConfig(ConfigType),
    GetModuleConfig(ModuleConfigType),
    GetCannedMessages,
    GetDeviceMetadata,
    GetRingtone,
    SetOwner(User),
    SetChannel(Channel),
    SetConfig(Config),
    SetModuleConfig(ModuleConfig),
    SetCannedMessages(String),
    SetRingtone(String),
    RemoveNode(u32),
    SetFavoriteNode(u32),
    RemoveFavoriteNode(u32),
    SetIgnoredNode(u32),
    RemoveIgnoredNode(u32),
    SetFixedPosition(Position),
    RemoveFixedPosition,
    /// Unix seconds.
    SetTime(u32),
    BeginEditSettings,
    CommitEditSettings,
    AddContact(SharedContact),
    Reboot { seconds: i32 },
    RebootOta { seconds: i32 },
    Shutdown { seconds: i32 },
    FactoryResetDevice,
    FactoryResetConfig,
    NodeDbReset,
    EnterDfuMode,
}

impl AdminOperation {
    pub fn to_payload(&self) -> AdminPayload {
        match self {
            AdminOperation::GetChannel(index) => AdminPayload::GetChannelRequest(index + 1),
            AdminOperation::GetOwner => AdminPayload::GetOwnerRequest(true),
            AdminOperation::GetConfig(kind) => AdminPayload::GetConfigRequest(*kind as i32),
            AdminOperation::GetModuleConfig(kind) => {
                AdminPayload::GetModuleConfigRequest(*kind as i32)
            }
            AdminOperation::GetCannedMessages => {
                AdminPayload::GetCannedMessageModuleMessagesRequest(true)
            }
            AdminOperation::GetDeviceMetadata => AdminPayload::GetDeviceMetadataRequest(true),
            AdminOperation::GetRingtone => AdminPayload::GetRingtoneRequest(true),
            AdminOperation::SetOwner(user) => AdminPayload::SetOwner(user.clone()),
            AdminOperation::SetChannel(channel) => AdminPayload::SetChannel(channel.clone()),
            AdminOperation::SetConfig(config) => AdminPayload::SetConfig(config.clone()),
            AdminOperation::SetModuleConfig(config) => {
                AdminPayload::SetModuleConfig(config.clone())
            }
            AdminOperation::SetCannedMessages(text) => {
                AdminPayload::SetCannedMessageModuleMessages(text.clone())
            }
            AdminOperation::SetRingtone(text) => AdminPayload::SetRingtoneMessage(text.clone()),
            AdminOperation::RemoveNode(num) => AdminPayload::RemoveByNodenum(*num),
            AdminOperation::SetFavoriteNode(num) => AdminPayload::SetFavoriteNode(*num),
            AdminOperation::RemoveFavoriteNode(num) => AdminPayload::RemoveFavoriteNode(*num),
            AdminOperation::SetIgnoredNode(num) => AdminPayload::SetIgnoredNode(*num),
            AdminOperation::RemoveIgnoredNode(num) => AdminPayload::RemoveIgnoredNode(*num),
            AdminOperation::SetFixedPosition(pos) => AdminPayload::SetFixedPosition(pos.clone()),
            AdminOperation::RemoveFixedPosition => AdminPayload::RemoveFixedPosition(true),
            AdminOperation::SetTime(secs) => AdminPayload::SetTimeOnly(*secs),
            AdminOperation::BeginEditSettings => AdminPayload::BeginEditSettings(true),
            AdminOperation::CommitEditSettings => AdminPayload::CommitEditSettings(true),
            AdminOperation::AddContact(contact) => AdminPayload::AddContact(contact.clone()),
            AdminOperation::Reboot { seconds } => AdminPayload::RebootSeconds(*seconds),
            AdminOperation::RebootOta { seconds } => AdminPayload::RebootOtaSeconds(*seconds),
            AdminOperation::Shutdown { seconds } => AdminPayload::ShutdownSeconds(*seconds),
            AdminOperation::FactoryResetDevice => AdminPayload::FactoryResetDevice(1),
            AdminOperation::FactoryResetConfig => AdminPayload::FactoryResetConfig(1),
            AdminOperation::NodeDbReset => AdminPayload::NodedbReset(1),
            AdminOperation::EnterDfuMode => AdminPayload::EnterDfuModeRequest(true),
        }
    }

    /// Getters are answered by an admin packet; setters only by a routing ack.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            AdminOperation::GetChannel(_)
                | AdminOperation::GetOwner
                | AdminOperation::GetConfig(_)
                | AdminOperation::GetModuleConfig(_)
                | AdminOperation::GetCannedMessages
                | AdminOperation::GetDeviceMetadata
                | AdminOperation::GetRingtone
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdminOperation::GetChannel(_) => "get_channel",
            AdminOperation::GetOwner => "get_owner",
            AdminOperation::GetConfig(_) => "get_config",
            AdminOperation::GetModuleConfig(_) => "get_module_config",
            AdminOperation::GetCannedMessages => "get_canned_messages",
            AdminOperation::GetDeviceMetadata => "get_device_metadata",
            AdminOperation::GetRingtone => "get_ringtone",
            AdminOperation::SetOwner(_) => "set_owner",
            AdminOperation::SetChannel(_) => "set_channel",
            AdminOperation::SetConfig(_) => "set_config",
            AdminOperation::SetModuleConfig(_) => "set_module_config",
            AdminOperation::SetCannedMessages(_) => "set_canned_messages",
            AdminOperation::SetRingtone(_) => "set_ringtone",
            AdminOperation::RemoveNode(_) => "remove_node",
            AdminOperation::SetFavoriteNode(_) => "set_favorite_node",
            AdminOperation::RemoveFavoriteNode(_) => "remove_favorite_node",
            AdminOperation::SetIgnoredNode(_) => "set_ignored_node",
            AdminOperation::RemoveIgnoredNode(_) => "remove_ignored_node",
            AdminOperation::SetFixedPosition(_) => "set_fixed_position",
            AdminOperation::RemoveFixedPosition => "remove_fixed_position",
            AdminOperation::SetTime(_) => "set_time",
            AdminOperation::BeginEditSettings => "begin_edit_settings",
            AdminOperation::CommitEditSettings => "commit_edit_settings",
            AdminOperation::AddContact(_) => "add_contact",
            AdminOperation::Reboot { .. } => "reboot",
            AdminOperation::RebootOta { .. } => "reboot_ota",
            AdminOperation::Shutdown { .. } => "shutdown",
            AdminOperation::FactoryResetDevice => "factory_reset_device",
            AdminOperation::FactoryResetConfig => "factory_reset_config",
            AdminOperation::NodeDbReset => "nodedb_reset",
            AdminOperation::EnterDfuMode => "enter_dfu_mode",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAdminRequest {
    pub id: u32,
    pub target: u32,
    pub operation: &'static str,
    pub expects_reply: bool,
    pub sent: Instant,
}

#[derive(Debug, Clone)]
struct Passkey {
    key: Vec<u8>,
    expires: Instant,
}

/// Outstanding admin requests plus the per-node session passkeys.
#[derive(Debug, Default)]
pub struct AdminCorrelator {
    pending: HashMap<u32, PendingAdminRequest>,
    passkeys: HashMap<u32, Passkey>,
}

impl AdminCorrelator {
    pub fn register(&mut self, request: PendingAdminRequest) {
        self.pending.insert(request.id, request);
    }

    pub fn pending(&self) -> &HashMap<u32, PendingAdminRequest> {
        &self.pending
    }

    pub fn is_pending(&self, id: u32) -> bool {
        self.pending.contains_key(&id)
    }

    /// Forget in-flight requests; passkeys survive a reconnect until they expire.
    pub fn clear_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("Abandoning {} pending admin requests", self.pending.len());
        }
        self.pending.clear();
    }

    pub fn resolve_reply(&mut self, request_id: u32, from: u32) -> Option<PendingAdminRequest> {
        let request = self.pending.remove(&request_id)?;
        if request.target != from {
            debug!(
                "Admin reply {} came from !{:08x}, sent to !{:08x}",
                request_id, from, request.target
            );
        }
        metrics::inc_admin_correlated();
        debug!("Admin {} ({}) answered", request_id, request.operation);
        Some(request)
    }

    /// A routing ack completes fire-and-forget requests; getters keep waiting for data.
    pub fn resolve_ack(&mut self, request_id: u32) -> Option<PendingAdminRequest> {
        match self.pending.get(&request_id) {
            Some(request) if !request.expects_reply => {
                metrics::inc_admin_correlated();
                debug!("Admin {} ({}) acknowledged", request_id, request.operation);
                self.pending.remove(&request_id)
            }
            _ => None,
        }
    }

    pub fn resolve_error(
        &mut self,
        request_id: u32,
        reason: routing::Error,
    ) -> Option<PendingAdminRequest> {
        let request = self.pending.remove(&request_id)?;
        metrics::inc_admin_correlated();
        warn!(
            "Admin {} ({}) to !{:08x} failed: {:?}",
            request_id, request.operation, request.target, reason
        );
        Some(request)
    }

    pub fn store_passkey(&mut self, node: u32, passkey: Vec<u8>, now: Instant) {
        if passkey.is_empty() {
            return;
        }
        self.passkeys.insert(
            node,
            Passkey {
                key: passkey,
                expires: now + SESSION_PASSKEY_TTL,
            },
        );
    }

    pub fn passkey_for(&self, node: u32, now: Instant) -> Option<&[u8]> {
        self.passkeys
            .get(&node)
            .filter(|p| p.expires > now)
            .map(|p| p.key.as_slice())
    }

    /// Drop expired passkeys; returns how many went.
    pub fn expire_passkeys(&mut self, now: Instant) -> usize {
        let before = self.passkeys.len();
        self.passkeys.retain(|_, p| p.expires > now);
        before - self.passkeys.len()
    }
}

#[derive(Debug, Error)]
pub enum UrlImportError {
    #[error("not a share link: {0}")]
    InvalidUrl(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid share payload: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("share link carries no {0}")]
    Empty(&'static str),

    #[error("share link carries {0} channels but a radio holds {1}")]
    TooManyChannels(usize, usize),
}

/// Payload after `#`, with any trailing `?query` removed.
fn share_fragment<'a>(url: &'a str, marker: &str) -> Result<&'a str, UrlImportError> {
    let (head, fragment) = url
        .split_once('#')
        .ok_or_else(|| UrlImportError::InvalidUrl(url.to_string()))?;
    if !head.contains(marker) {
        return Err(UrlImportError::InvalidUrl(url.to_string()));
    }
    let fragment = fragment.split('?').next().unwrap_or_default().trim();
    if fragment.is_empty() {
        return Err(UrlImportError::InvalidUrl(url.to_string()));
    }
    Ok(fragment)
}

fn decode_share_payload(fragment: &str) -> Result<Vec<u8>, UrlImportError> {
    let normalized: String = fragment
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Ok(URL_SAFE_NO_PAD.decode(normalized.as_bytes())?)
}

/// Decode a `https://meshtastic.org/e/#...` link. The flag is `true` for
/// `?add=true` links, which append instead of replacing.
pub fn parse_channel_url(url: &str) -> Result<(ChannelSet, bool), UrlImportError> {
    let fragment = share_fragment(url, "/e/")?;
    let add = url.contains("add=true");
    let set = ChannelSet::decode(decode_share_payload(fragment)?.as_slice())?;
    if set.settings.is_empty() {
        return Err(UrlImportError::Empty("channels"));
    }
    Ok((set, add))
}

/// Decode a `https://meshtastic.org/v/#...` contact link.
pub fn parse_contact_url(url: &str) -> Result<SharedContact, UrlImportError> {
    let fragment = share_fragment(url, "/v/")?;
    let contact = SharedContact::decode(decode_share_payload(fragment)?.as_slice())?;
    if contact.node_num == 0 || contact.user.is_none() {
        return Err(UrlImportError::Empty("contact"));
    }
    Ok(contact)
}

fn same_channel(a: &ChannelSettings, b: &ChannelRecord) -> bool {
    a.name == b.name && a.psk == b.psk
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Send an admin operation to `target` (our own radio when `None`).
    /// The returned id is the correlation token.
    pub fn send_admin(
        &mut self,
        operation: AdminOperation,
        target: Option<u32>,
        now: Instant,
    ) -> Result<u32, SessionError> {
        if !self.conn.link.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let me = self.my_node_num.ok_or(SessionError::NodeNumUnknown)?;
        let target = target.unwrap_or(me);
        let remote = target != me;

        let session_passkey = if remote {
            match self.admin.passkey_for(target, now) {
                Some(key) => key.to_vec(),
                None => {
                    debug!("No session passkey for !{:08x}; the node may reject {}", target, operation.name());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let message = AdminMessage {
            payload_variant: Some(operation.to_payload()),
            session_passkey,
        };

        let mut envelope = Envelope::new(PortNum::AdminApp, message.encode_to_vec())
            .to(target)
            .priority(Priority::Reliable)
            .want_ack(true)
            .want_response(operation.expects_reply());
        if remote {
            if let Some(key) = self
                .repo
                .find_node(target)
                .map(|n| n.public_key)
                .filter(|k| !k.is_empty())
            {
                envelope = envelope.pki(key);
            }
        }

        let id = self.send_envelope(envelope)?;
        metrics::inc_admin_sent();
        info!("Admin {} sent to !{:08x} (id {})", operation.name(), target, id);
        self.admin.register(PendingAdminRequest {
            id,
            target,
            operation: operation.name(),
            expects_reply: operation.expects_reply(),
            sent: now,
        });
        Ok(id)
    }

    /// Send `ops` to our own radio between begin and commit edit settings and
    /// return every id sent. A failure after the edit has begun still tries
    /// to close it so the radio does not stay in edit mode.
    fn send_edit_transaction(
        &mut self,
        ops: Vec<AdminOperation>,
        now: Instant,
    ) -> Result<Vec<u32>, SessionError> {
        let mut ids = Vec::with_capacity(ops.len() + 2);
        ids.push(self.send_admin(AdminOperation::BeginEditSettings, None, now)?);
        for op in ops {
            match self.send_admin(op, None, now) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!("Settings edit aborted after {} operations: {}", ids.len() - 1, e);
                    if let Err(close) =
                        self.send_admin(AdminOperation::CommitEditSettings, None, now)
                    {
                        warn!("Could not close the settings edit: {}", close);
                    }
                    return Err(e);
                }
            }
        }
        ids.push(self.send_admin(AdminOperation::CommitEditSettings, None, now)?);
        Ok(ids)
    }

    /// Apply a channel-set share link to our radio inside one edit transaction.
    pub fn import_channel_url(&mut self, url: &str, now: Instant) -> Result<Vec<u32>, SessionError> {
        let (set, add) = parse_channel_url(url)?;
        let me = self.my_node_num.ok_or(SessionError::NodeNumUnknown)?;
        let existing = self.repo.channels_of(me);

        let mut channels = Vec::new();
        if add {
            let mut taken: Vec<i32> = existing
                .iter()
                .filter(|c| c.role != ChannelRole::Disabled as i32)
                .map(|c| c.index)
                .collect();
            for settings in set.settings {
                if existing.iter().any(|c| same_channel(&settings, c)) {
                    debug!("Channel '{}' already present", settings.name);
                    continue;
                }
                let Some(index) = (1..=MAX_CHANNEL_INDEX).find(|i| !taken.contains(i)) else {
                    warn!("No free channel slot for '{}'", settings.name);
                    break;
                };
                taken.push(index);
                channels.push(Channel {
                    index,
                    settings: Some(settings),
                    role: ChannelRole::Secondary as i32,
                });
            }
        } else {
            let slots = (MAX_CHANNEL_INDEX + 1) as usize;
            if set.settings.len() > slots {
                return Err(UrlImportError::TooManyChannels(set.settings.len(), slots).into());
            }
            let count = set.settings.len() as i32;
            for (i, settings) in set.settings.into_iter().enumerate() {
                let index = i as i32;
                let role = if index == 0 {
                    ChannelRole::Primary
                } else {
                    ChannelRole::Secondary
                };
                channels.push(Channel {
                    index,
                    settings: Some(settings),
                    role: role as i32,
                });
            }
            for stale in existing
                .iter()
                .filter(|c| c.index >= count && c.role != ChannelRole::Disabled as i32)
            {
                channels.push(Channel {
                    index: stale.index,
                    settings: Some(ChannelSettings::default()),
                    role: ChannelRole::Disabled as i32,
                });
            }
        }

        let mut ops: Vec<AdminOperation> =
            channels.iter().cloned().map(AdminOperation::SetChannel).collect();
        if !add {
            if let Some(lora) = set.lora_config.filter(|b| !b.is_empty()) {
                ops.push(AdminOperation::SetConfig(Config::new(ConfigType::LoraConfig, lora)));
            }
        }
        let ids = self.send_edit_transaction(ops, now)?;

        self.repo.begin();
        for channel in &channels {
            self.repo
                .upsert_channel(super::dispatch::channel_record(me, channel));
        }
        self.repo.save_and_log_on_failure();
        info!(
            "Imported {} channels ({})",
            channels.len(),
            if add { "added" } else { "replaced" }
        );
        Ok(ids)
    }

    /// Add the node behind a contact share link to our radio's node database.
    pub fn import_contact_url(&mut self, url: &str, now: Instant) -> Result<u32, SessionError> {
        let contact = parse_contact_url(url)?;
        let node_num = contact.node_num;
        let ids = self.send_edit_transaction(vec![AdminOperation::AddContact(contact.clone())], now)?;
        let id = ids[1];

        self.repo.begin();
        let mut node = self
            .repo
            .find_node(node_num)
            .unwrap_or_else(|| NodeRecord::new(node_num));
        if let Some(user) = &contact.user {
            super::dispatch::apply_user(&mut node, user);
        }
        node.is_ignored = contact.should_ignore;
        self.repo.upsert_node(node);
        self.repo.save_and_log_on_failure();
        Ok(id)
    }
}
