//! Outbound mesh packets: the [`Envelope`] builder and the session's send paths
//! for text, waypoints and MQTT proxy traffic.

use bytes::Bytes;
use chrono::Utc;
use log::{debug, trace};
use prost::Message;
use rand::Rng;

use super::{Session, SessionError, MAX_TEXT_BYTES, NONCE_CONFIG, NONCE_NODE_DB};
use crate::logutil::{hex_snippet, truncate_for_log};
use crate::notify::NotificationSink;
use crate::protobuf::{
    mesh_packet, to_radio, Data, MeshPacket, MqttClientProxyMessage, PortNum, Priority, ToRadio,
    Waypoint, BROADCAST_ADDR,
};
use crate::storage::{AckState, MessageRecord, Repository};
use crate::transport::{LinkChannel, Transport};

/// Random packet id in `256..=u32::MAX`, never one of the handshake nonces.
pub fn generate_packet_id<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    loop {
        let id = rng.gen_range(256..=u32::MAX);
        if id != NONCE_CONFIG && id != NONCE_NODE_DB {
            return id;
        }
    }
}

/// A directional mesh packet before it is stamped with our node number.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: u32,
    pub to: u32,
    pub channel: u32,
    pub port: PortNum,
    pub payload: Bytes,
    pub priority: Priority,
    pub want_ack: bool,
    pub want_response: bool,
    pub reply_id: u32,
    pub emoji: bool,
    pub pki_encrypted: bool,
    pub public_key: Vec<u8>,
}

impl Envelope {
    /// Broadcast on channel 0 with a freshly generated id.
    pub fn new(port: PortNum, payload: impl Into<Bytes>) -> Self {
        Self {
            id: generate_packet_id(&mut rand::thread_rng()),
            to: BROADCAST_ADDR,
            channel: 0,
            port,
            payload: payload.into(),
            priority: Priority::Unset,
            want_ack: false,
            want_response: false,
            reply_id: 0,
            emoji: false,
            pki_encrypted: false,
            public_key: Vec::new(),
        }
    }

    /// `0` and [`BROADCAST_ADDR`] both mean the whole mesh.
    pub fn to(mut self, dest: u32) -> Self {
        self.to = if dest == 0 { BROADCAST_ADDR } else { dest };
        self
    }

    pub fn channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn want_ack(mut self, want_ack: bool) -> Self {
        self.want_ack = want_ack;
        self
    }

    pub fn want_response(mut self, want_response: bool) -> Self {
        self.want_response = want_response;
        self
    }

    pub fn reply_to(mut self, reply_id: Option<u32>, emoji: bool) -> Self {
        self.reply_id = reply_id.unwrap_or(0);
        self.emoji = emoji;
        self
    }

    /// Encrypt end-to-end for the holder of `public_key`.
    pub fn pki(mut self, public_key: Vec<u8>) -> Self {
        self.pki_encrypted = true;
        self.public_key = public_key;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDR
    }

    /// Stamp the sender and produce the wire packet. Id 0 is rejected.
    pub fn into_packet(self, from: u32) -> Result<MeshPacket, SessionError> {
        if self.id == 0 {
            return Err(SessionError::InvalidPacketId);
        }
        let data = Data {
            portnum: self.port as i32,
            payload: self.payload,
            want_response: self.want_response,
            reply_id: self.reply_id,
            emoji: u32::from(self.emoji),
            ..Default::default()
        };
        Ok(MeshPacket {
            from,
            to: self.to,
            channel: self.channel,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(data)),
            id: self.id,
            want_ack: self.want_ack,
            priority: self.priority as i32,
            pki_encrypted: self.pki_encrypted,
            public_key: self.public_key,
            // hop_limit 0 lets the radio apply its configured default
            ..Default::default()
        })
    }
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    pub(crate) fn write_to_radio(&mut self, msg: &ToRadio) -> Result<(), SessionError> {
        let mut payload = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut payload)?;
        trace!("ToRadio {} bytes: {}", payload.len(), hex_snippet(&payload, 64));
        self.transport.write(LinkChannel::ToRadio, &payload)?;
        Ok(())
    }

    /// Send a packet on the live link; returns its id.
    pub fn send_envelope(&mut self, envelope: Envelope) -> Result<u32, SessionError> {
        if !self.conn.link.is_connected() {
            return Err(SessionError::NotConnected);
        }
        let port = envelope.port;
        let packet = envelope.into_packet(self.my_node_num.unwrap_or(0))?;
        let id = packet.id;
        debug!(
            "Sending {:?} id={} to=0x{:08x} channel={} want_ack={}",
            port, id, packet.to, packet.channel, packet.want_ack
        );
        self.write_to_radio(&ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Packet(packet)),
        })?;
        Ok(id)
    }

    /// Send a text message; `to = None` broadcasts on `channel`. The message is
    /// stored as outgoing with a pending acknowledgement.
    pub fn send_text(
        &mut self,
        text: &str,
        to: Option<u32>,
        channel: u32,
        reply_id: Option<u32>,
        emoji: bool,
    ) -> Result<u32, SessionError> {
        if text.len() > MAX_TEXT_BYTES {
            return Err(SessionError::PayloadTooLarge(text.len()));
        }
        let envelope = Envelope::new(PortNum::TextMessageApp, text.as_bytes().to_vec())
            .to(to.unwrap_or(BROADCAST_ADDR))
            .channel(channel)
            .want_ack(true)
            .reply_to(reply_id, emoji);
        let dest = envelope.to;
        let direct = !envelope.is_broadcast();
        let id = self.send_envelope(envelope)?;
        debug!("Sent text {} '{}'", id, truncate_for_log(text, 80));

        self.repo.begin();
        self.repo.upsert_message(MessageRecord {
            id,
            from: self.my_node_num.unwrap_or(0),
            to: dest,
            channel,
            text: text.to_string(),
            received: Utc::now(),
            rx_snr: None,
            rx_rssi: None,
            hop_start: 0,
            hop_limit: 0,
            via_mqtt: false,
            direct,
            reply_id,
            emoji,
            alert: false,
            store_forward: false,
            outgoing: true,
            ack: AckState::Pending,
        });
        self.repo.save_and_log_on_failure();
        Ok(id)
    }

    /// Broadcast a waypoint; an id of 0 is replaced by a fresh one.
    pub fn send_waypoint(&mut self, mut waypoint: Waypoint, channel: u32) -> Result<u32, SessionError> {
        if waypoint.id == 0 {
            waypoint.id = generate_packet_id(&mut rand::thread_rng());
        }
        let envelope = Envelope::new(PortNum::WaypointApp, waypoint.encode_to_vec())
            .channel(channel)
            .want_ack(true);
        let id = self.send_envelope(envelope)?;
        self.repo.begin();
        let record = super::dispatch::waypoint_record(self.my_node_num.unwrap_or(0), &waypoint);
        self.repo.upsert_waypoint(record);
        self.repo.save_and_log_on_failure();
        Ok(id)
    }

    /// Hand an MQTT message from the local broker to the radio unchanged.
    pub fn send_mqtt_proxy(&mut self, msg: MqttClientProxyMessage) -> Result<(), SessionError> {
        if !self.conn.link.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.write_to_radio(&ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::MqttClientProxyMessage(msg)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_ids_avoid_reserved_values() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let id = generate_packet_id(&mut rng);
            assert!(id >= 256);
            assert_ne!(id, NONCE_CONFIG);
            assert_ne!(id, NONCE_NODE_DB);
        }
    }

    #[test]
    fn zero_destination_means_broadcast() {
        let env = Envelope::new(PortNum::TextMessageApp, &b"hi"[..]).to(0);
        assert!(env.is_broadcast());
        let packet = env.into_packet(0x1234).unwrap();
        assert_eq!(packet.to, BROADCAST_ADDR);
        assert_eq!(packet.from, 0x1234);
        assert_eq!(packet.hop_limit, 0);
    }

    #[test]
    fn zero_id_is_rejected() {
        let env = Envelope::new(PortNum::TextMessageApp, &b"hi"[..]).with_id(0);
        assert!(matches!(
            env.into_packet(1),
            Err(SessionError::InvalidPacketId)
        ));
    }

    #[test]
    fn reply_fields_reach_the_payload() {
        let packet = Envelope::new(PortNum::TextMessageApp, &b"\xF0\x9F\x91\x8D"[..])
            .to(42)
            .reply_to(Some(99), true)
            .into_packet(1)
            .unwrap();
        let data = packet.decoded().unwrap();
        assert_eq!(data.reply_id, 99);
        assert_eq!(data.emoji, 1);
        assert_eq!(data.portnum, PortNum::TextMessageApp as i32);
    }
}
