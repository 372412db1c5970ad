mod common;

use common::*;
use meshlink::protobuf::{from_radio, to_radio, ChannelRole, Config, ConfigType};
use meshlink::session::{HandshakePhase, LinkPhase, ManualClock, TimerKind, NONCE_CONFIG, NONCE_NODE_DB};
use meshlink::storage::{ConfigKind, Repository};
use meshlink::transport::{LinkChannel, TransportEvent};

#[test]
fn connect_subscribes_and_requests_config() {
    let clock = ManualClock::new();
    let (session, fake) = connected_session(&clock);

    {
        let state = fake.state();
        assert_eq!(state.connects, vec![device()]);
        assert!(state.subscriptions.contains(&LinkChannel::FromRadio));
        assert!(state.subscriptions.contains(&LinkChannel::FromNum));
        assert!(state.subscriptions.contains(&LinkChannel::Log));
        // heartbeat first, then the config request
        assert!(matches!(
            state.writes[0].payload_variant,
            Some(to_radio::PayloadVariant::Heartbeat(_))
        ));
        assert!(state.reads > 0);
    }
    assert_eq!(fake.want_config_ids(), vec![NONCE_CONFIG]);
    assert_eq!(session.handshake().phase, HandshakePhase::AwaitingConfig);
    assert!(session.timers().is_armed(TimerKind::HandshakeWatchdog));
    assert_eq!(session.status().phase, LinkPhase::Connected);
}

#[test]
fn config_pass_then_node_db_pass() {
    let clock = ManualClock::new();
    let (mut session, fake) = connected_session(&clock);
    let now = clock.now();

    session.on_transport_event(my_info(ME), now);
    assert_eq!(session.my_node_num(), Some(ME));
    assert!(!session.timers().is_armed(TimerKind::HandshakeWatchdog));
    assert!(!session.handshake().waiting);

    session.on_transport_event(channel(0, "LongFast", ChannelRole::Primary), now);
    session.on_transport_event(
        from_radio(from_radio::PayloadVariant::Config(Config::new(
            ConfigType::LoraConfig,
            vec![0x08, 0x03],
        ))),
        now,
    );
    session.on_transport_event(config_complete(NONCE_CONFIG), now);

    assert!(session.is_subscribed());
    assert_eq!(session.status().phase, LinkPhase::Subscribed);
    assert_eq!(session.handshake().phase, HandshakePhase::AwaitingNodeDb);
    assert_eq!(fake.want_config_ids(), vec![NONCE_CONFIG, NONCE_NODE_DB]);
    assert!(session.timers().is_armed(TimerKind::Maintenance));
    assert!(!session.timers().is_armed(TimerKind::PositionReport));

    session.on_transport_event(node_info(REMOTE, "Far Away"), now);
    session.on_transport_event(config_complete(NONCE_NODE_DB), now);
    assert_eq!(session.handshake().phase, HandshakePhase::Complete);
    assert!(!session.timers().is_armed(TimerKind::HandshakeWatchdog));

    let repo = session.repository();
    assert_eq!(repo.find_node(REMOTE).unwrap().long_name, "Far Away");
    assert_eq!(repo.channels_of(ME).len(), 1);
    assert!(repo
        .configs()
        .iter()
        .any(|c| c.kind == ConfigKind::Radio(ConfigType::LoraConfig as i32) && c.body == vec![0x08, 0x03]));
}

#[test]
fn unknown_config_complete_id_is_ignored() {
    let clock = ManualClock::new();
    let (mut session, fake) = connected_session(&clock);
    session.on_transport_event(config_complete(12345), clock.now());
    assert!(!session.is_subscribed());
    assert_eq!(session.handshake().phase, HandshakePhase::AwaitingConfig);
    assert_eq!(fake.want_config_ids(), vec![NONCE_CONFIG]);
}

#[test]
fn old_firmware_stays_unsubscribed() {
    let clock = ManualClock::new();
    let (mut session, fake) = connected_session(&clock);
    let now = clock.now();

    session.on_transport_event(my_info(ME), now);
    session.on_transport_event(metadata("2.2.24.deadbee"), now);
    session.on_transport_event(channel(0, "LongFast", ChannelRole::Primary), now);
    session.on_transport_event(node_info(0x0abc_0001, "Intruder"), now);
    session.on_transport_event(config_complete(NONCE_CONFIG), now);

    let status = session.status();
    assert!(status.invalid_version);
    assert!(!status.subscribed);
    assert_eq!(status.handshake, HandshakePhase::Idle);
    assert!(status.last_error.unwrap().contains("2.2.24"));
    assert!(session.repository().channels_of(ME).is_empty());
    assert!(session.repository().find_node(0x0abc_0001).is_none());
    // no node-database pass for an unsupported radio
    assert_eq!(fake.want_config_ids(), vec![NONCE_CONFIG]);
    assert!(session
        .notifier()
        .scheduled
        .iter()
        .any(|n| n.title == "Firmware update required"));
}

#[test]
fn reboot_restarts_the_config_pass() {
    let clock = ManualClock::new();
    let (mut session, fake) = subscribed_session(&clock);
    assert!(session.timers().is_armed(TimerKind::Maintenance));

    session.on_transport_event(rebooted(), clock.now());
    assert!(!session.is_subscribed());
    assert_eq!(session.status().phase, LinkPhase::Connected);
    assert_eq!(session.handshake().phase, HandshakePhase::AwaitingConfig);
    assert!(!session.timers().is_armed(TimerKind::Maintenance));
    assert_eq!(
        fake.want_config_ids(),
        vec![NONCE_CONFIG, NONCE_NODE_DB, NONCE_CONFIG]
    );
}

#[test]
fn from_num_notification_prompts_a_read() {
    let clock = ManualClock::new();
    let (mut session, fake) = subscribed_session(&clock);
    // drain the queue so the session is no longer reading
    session.on_transport_event(raw_frame(Vec::new()), clock.now());
    let reads = fake.state().reads;
    session.on_transport_event(
        TransportEvent::Frame {
            channel: LinkChannel::FromNum,
            bytes: vec![1, 0, 0, 0].into(),
        },
        clock.now(),
    );
    assert_eq!(fake.state().reads, reads + 1);
}

#[test]
fn missing_channels_fail_the_handshake() {
    let clock = ManualClock::new();
    let (mut session, fake) = new_session(tunings());
    fake.state().channels_resolved = false;
    session.start(clock.now());
    session.on_transport_event(discovered(), clock.now());
    session.connect(&device(), clock.now()).unwrap();
    session.on_transport_event(TransportEvent::Connected(device()), clock.now());
    // nothing written until the channels resolve
    assert!(fake.want_config_ids().is_empty());

    session.on_transport_event(TransportEvent::ChannelsResolved, clock.now());
    let status = session.status();
    assert_eq!(status.phase, LinkPhase::Disconnected);
    assert_eq!(status.handshake, HandshakePhase::Failed);
    assert!(status.last_error.is_some());
    assert_eq!(fake.state().disconnects, 1);
    assert!(fake.want_config_ids().is_empty());
}
