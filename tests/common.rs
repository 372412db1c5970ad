//! Test utilities & fixtures.
//! A scripted in-memory transport plus builders for the frames a radio sends.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use prost::Message;

use meshlink::notify::CollectingNotifier;
use meshlink::protobuf::{
    from_radio, mesh_packet, to_radio, AdminMessage, Channel, ChannelRole, ChannelSettings, Data,
    DeviceMetadata, FromRadio, MeshPacket, MyNodeInfo, NodeInfo, PortNum, ToRadio, User,
};
use meshlink::session::{ManualClock, Session, SessionTunings, NONCE_CONFIG, NONCE_NODE_DB};
use meshlink::storage::MemoryRepository;
use meshlink::transport::{
    DeviceId, DiscoveredDevice, LinkChannel, Transport, TransportError, TransportEvent,
};

pub const ME: u32 = 0x1234_5678;
pub const REMOTE: u32 = 0x0bad_cafe;
pub const DEVICE: &str = "/dev/ttyTEST0";

/// Everything the session asked of the transport, in order.
#[derive(Debug)]
pub struct FakeState {
    pub writes: Vec<ToRadio>,
    pub connects: Vec<DeviceId>,
    pub disconnects: usize,
    pub scans: usize,
    pub stop_scans: usize,
    pub subscriptions: Vec<LinkChannel>,
    pub reads: usize,
    pub channels_resolved: bool,
    pub fail_writes: bool,
    /// Fail the write that would land at this index in `writes`, once.
    pub fail_write_at: Option<usize>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            connects: Vec::new(),
            disconnects: 0,
            scans: 0,
            stop_scans: 0,
            subscriptions: Vec::new(),
            reads: 0,
            channels_resolved: true,
            fail_writes: false,
            fail_write_at: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn want_config_ids(&self) -> Vec<u32> {
        self.state()
            .writes
            .iter()
            .filter_map(|w| match w.payload_variant {
                Some(to_radio::PayloadVariant::WantConfigId(id)) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn sent_packets(&self) -> Vec<MeshPacket> {
        self.state()
            .writes
            .iter()
            .filter_map(|w| match &w.payload_variant {
                Some(to_radio::PayloadVariant::Packet(p)) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_on(&self, port: PortNum) -> Vec<MeshPacket> {
        self.sent_packets()
            .into_iter()
            .filter(|p| p.decoded().map(|d| d.portnum) == Some(port as i32))
            .collect()
    }

    /// Admin packets with their decoded bodies.
    pub fn sent_admin(&self) -> Vec<(MeshPacket, AdminMessage)> {
        self.sent_on(PortNum::AdminApp)
            .into_iter()
            .map(|p| {
                let body = AdminMessage::decode(p.decoded().unwrap().payload.clone()).unwrap();
                (p, body)
            })
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

impl Transport for FakeTransport {
    fn start_scan(&mut self) {
        self.state().scans += 1;
    }

    fn stop_scan(&mut self) {
        self.state().stop_scans += 1;
    }

    fn connect(&mut self, device: &DeviceId) {
        self.state().connects.push(device.clone());
    }

    fn disconnect(&mut self) {
        self.state().disconnects += 1;
    }

    fn write(&mut self, channel: LinkChannel, bytes: &[u8]) -> Result<(), TransportError> {
        assert_eq!(channel, LinkChannel::ToRadio);
        let mut state = self.state();
        if state.fail_write_at == Some(state.writes.len()) {
            state.fail_write_at = None;
            return Err(TransportError::WriteFailed("scripted failure".into()));
        }
        if state.fail_writes {
            return Err(TransportError::WriteFailed("scripted failure".into()));
        }
        state.writes.push(ToRadio::decode(bytes).expect("session wrote a valid ToRadio"));
        Ok(())
    }

    fn subscribe(&mut self, channel: LinkChannel) {
        self.state().subscriptions.push(channel);
    }

    fn request_read(&mut self, _channel: LinkChannel) {
        self.state().reads += 1;
    }

    fn channels_resolved(&self) -> bool {
        self.state().channels_resolved
    }
}

pub type TestSession = Session<FakeTransport, MemoryRepository, CollectingNotifier>;

pub fn tunings() -> SessionTunings {
    SessionTunings {
        auto_reconnect: true,
        ..SessionTunings::default()
    }
}

pub fn new_session(tunings: SessionTunings) -> (TestSession, FakeTransport) {
    session_with_repository(tunings, MemoryRepository::new())
}

pub fn session_with_repository(
    tunings: SessionTunings,
    repo: MemoryRepository,
) -> (TestSession, FakeTransport) {
    let fake = FakeTransport::default();
    let session = Session::new(fake.clone(), repo, CollectingNotifier::default(), tunings);
    (session, fake)
}

pub fn device() -> DeviceId {
    DeviceId::from(DEVICE)
}

pub fn discovered() -> TransportEvent {
    TransportEvent::Discovered(DiscoveredDevice {
        id: device(),
        name: "Test radio".into(),
        rssi: Some(-60),
    })
}

/// Started, discovered and linked; the first `want_config` has been written.
pub fn connected_session(clock: &ManualClock) -> (TestSession, FakeTransport) {
    connected_with(tunings(), clock)
}

pub fn connected_with(tunings: SessionTunings, clock: &ManualClock) -> (TestSession, FakeTransport) {
    let (mut session, fake) = new_session(tunings);
    session.start(clock.now());
    session.on_transport_event(discovered(), clock.now());
    session.connect(&device(), clock.now()).unwrap();
    session.on_transport_event(TransportEvent::Connected(device()), clock.now());
    (session, fake)
}

/// Both handshake passes completed with a supported firmware.
pub fn subscribed_session(clock: &ManualClock) -> (TestSession, FakeTransport) {
    subscribed_with(tunings(), clock)
}

pub fn subscribed_with(tunings: SessionTunings, clock: &ManualClock) -> (TestSession, FakeTransport) {
    let (mut session, fake) = connected_with(tunings, clock);
    let now = clock.now();
    session.on_transport_event(my_info(ME), now);
    session.on_transport_event(metadata("2.5.6.abc1234"), now);
    session.on_transport_event(channel(0, "LongFast", ChannelRole::Primary), now);
    session.on_transport_event(config_complete(NONCE_CONFIG), now);
    session.on_transport_event(config_complete(NONCE_NODE_DB), now);
    (session, fake)
}

pub fn from_radio(variant: from_radio::PayloadVariant) -> TransportEvent {
    raw_frame(
        FromRadio {
            id: 1,
            payload_variant: Some(variant),
        }
        .encode_to_vec(),
    )
}

pub fn raw_frame(bytes: impl Into<Bytes>) -> TransportEvent {
    TransportEvent::Frame {
        channel: LinkChannel::FromRadio,
        bytes: bytes.into(),
    }
}

pub fn my_info(num: u32) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::MyInfo(MyNodeInfo {
        my_node_num: num,
        ..Default::default()
    }))
}

pub fn user(num: u32, long_name: &str) -> User {
    User {
        id: format!("!{:08x}", num),
        long_name: long_name.into(),
        short_name: long_name.chars().take(4).collect(),
        ..Default::default()
    }
}

pub fn node_info(num: u32, long_name: &str) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::NodeInfo(NodeInfo {
        num,
        user: Some(user(num, long_name)),
        ..Default::default()
    }))
}

pub fn node_info_with_key(num: u32, long_name: &str, public_key: Vec<u8>) -> TransportEvent {
    let mut u = user(num, long_name);
    u.public_key = public_key;
    from_radio(from_radio::PayloadVariant::NodeInfo(NodeInfo {
        num,
        user: Some(u),
        ..Default::default()
    }))
}

pub fn channel(index: i32, name: &str, role: ChannelRole) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::Channel(Channel {
        index,
        settings: Some(ChannelSettings {
            name: name.into(),
            psk: vec![1],
            ..Default::default()
        }),
        role: role as i32,
    }))
}

pub fn metadata(version: &str) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::Metadata(DeviceMetadata {
        firmware_version: version.into(),
        ..Default::default()
    }))
}

pub fn config_complete(id: u32) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::ConfigCompleteId(id))
}

pub fn rebooted() -> TransportEvent {
    from_radio(from_radio::PayloadVariant::Rebooted(true))
}

pub fn data_packet(from: u32, to: u32, port: PortNum, payload: Vec<u8>, request_id: u32) -> MeshPacket {
    MeshPacket {
        from,
        to,
        id: rand::random::<u32>() | 0x100,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
            portnum: port as i32,
            payload: payload.into(),
            request_id,
            ..Default::default()
        })),
        ..Default::default()
    }
}

pub fn packet(packet: MeshPacket) -> TransportEvent {
    from_radio(from_radio::PayloadVariant::Packet(packet))
}

pub fn seconds(s: u64) -> Duration {
    Duration::from_secs(s)
}
