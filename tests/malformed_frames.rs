mod common;

use common::*;

use meshlink::protobuf::{mesh_packet, MeshPacket, PortNum};
use meshlink::session::{HandshakePhase, ManualClock};
use meshlink::storage::Repository;
use meshlink::transport::{LinkChannel, TransportEvent};

#[test]
fn garbage_frames_are_skipped() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_session(&clock);
    let before = meshlink::metrics::snapshot().frames_malformed;

    session.on_transport_event(raw_frame(vec![0xff, 0xff, 0xff, 0x0f, 0x12]), clock.now());
    assert!(meshlink::metrics::snapshot().frames_malformed > before);

    // the session keeps working
    session.on_transport_event(
        packet(data_packet(REMOTE, ME, PortNum::TextMessageApp, b"still here".to_vec(), 0)),
        clock.now(),
    );
    assert_eq!(session.repository().messages().len(), 1);
}

#[test]
fn malformed_payload_inside_a_valid_packet() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_session(&clock);
    for port in [
        PortNum::PositionApp,
        PortNum::AdminApp,
        PortNum::RoutingApp,
        PortNum::TracerouteApp,
        PortNum::StoreForwardApp,
        PortNum::TelemetryApp,
        PortNum::WaypointApp,
        PortNum::NodeinfoApp,
    ] {
        session.on_transport_event(
            packet(data_packet(REMOTE, ME, port, vec![0xff, 0xff, 0xff], 1234)),
            clock.now(),
        );
    }
    // only the sender bookkeeping survives
    assert!(session.repository().find_node(REMOTE).is_some());
    assert!(session.repository().messages().is_empty());
    assert!(session.is_subscribed());
}

#[test]
fn encrypted_and_unknown_port_packets_are_ignored() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_session(&clock);
    let encrypted = MeshPacket {
        from: REMOTE,
        to: ME,
        id: 999,
        payload_variant: Some(mesh_packet::PayloadVariant::Encrypted(vec![1, 2, 3])),
        ..Default::default()
    };
    session.on_transport_event(packet(encrypted), clock.now());
    session.on_transport_event(
        packet(data_packet(REMOTE, ME, PortNum::PrivateApp, vec![1, 2, 3], 0)),
        clock.now(),
    );
    assert!(session.repository().messages().is_empty());
    assert_eq!(session.handshake().phase, HandshakePhase::Complete);
}

#[test]
fn device_log_records_do_not_disturb_the_handshake() {
    let clock = ManualClock::new();
    let (mut session, fake) = connected_session(&clock);
    session.on_transport_event(
        TransportEvent::Frame {
            channel: LinkChannel::Log,
            bytes: vec![0x0a, 0x03, b'b', b'o', b'o'].into(),
        },
        clock.now(),
    );
    session.on_transport_event(
        TransportEvent::Frame {
            channel: LinkChannel::Log,
            bytes: vec![0xff].into(),
        },
        clock.now(),
    );
    assert_eq!(session.handshake().phase, HandshakePhase::AwaitingConfig);
    assert!(session.handshake().waiting);
    assert_eq!(fake.want_config_ids().len(), 1);
}

#[test]
fn frames_after_disconnect_do_not_resubscribe() {
    let clock = ManualClock::new();
    let (mut session, fake) = subscribed_session(&clock);
    session.disconnect(false, clock.now());
    let writes = fake.state().writes.len();
    session.on_transport_event(config_complete(meshlink::session::NONCE_CONFIG), clock.now());
    session.on_transport_event(rebooted(), clock.now());
    assert!(!session.is_subscribed());
    assert_eq!(fake.state().writes.len(), writes);
}
