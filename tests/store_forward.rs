mod common;

use common::*;
use prost::Message;

use meshlink::protobuf::{
    store_and_forward::{self, RequestResponse},
    PortNum, StoreAndForward,
};
use meshlink::session::{ManualClock, SessionTunings, NONCE_CONFIG, NONCE_NODE_DB};
use meshlink::storage::{Repository, StoreForwardPeer};
use meshlink::transport::TransportEvent;

const ROUTER: u32 = 0x0000_5f5f;

fn with_history() -> SessionTunings {
    let mut t = tunings();
    t.interest.store_forward_history = true;
    t
}

fn heartbeat() -> TransportEvent {
    let msg = StoreAndForward {
        rr: RequestResponse::RouterHeartbeat as i32,
        variant: Some(store_and_forward::Variant::Heartbeat(store_and_forward::Heartbeat {
            period: 900,
            secondary: 0,
        })),
    };
    packet(data_packet(ROUTER, u32::MAX, PortNum::StoreForwardApp, msg.encode_to_vec(), 0))
}

fn history_requests(fake: &FakeTransport) -> Vec<StoreAndForward> {
    fake.sent_on(PortNum::StoreForwardApp)
        .into_iter()
        .map(|p| StoreAndForward::decode(p.decoded().unwrap().payload.clone()).unwrap())
        .filter(|m| m.rr == RequestResponse::ClientHistory as i32)
        .collect()
}

#[test]
fn history_is_requested_once_per_connection() {
    let mut clock = ManualClock::new();
    let (mut session, fake) = subscribed_with(with_history(), &clock);
    assert!(history_requests(&fake).is_empty());

    session.on_transport_event(heartbeat(), clock.now());
    let interval = session.tunings().maintenance_interval;
    session.on_timers(clock.advance(interval));
    session.on_timers(clock.advance(interval));

    let requests = history_requests(&fake);
    assert_eq!(requests.len(), 1);
    match &requests[0].variant {
        Some(store_and_forward::Variant::History(h)) => {
            assert_eq!(h.window, 0);
            assert_eq!(h.last_request, 0);
        }
        other => panic!("unexpected variant {:?}", other),
    }
    let sent = fake.sent_on(PortNum::StoreForwardApp);
    assert_eq!(sent[0].to, ROUTER);
}

#[test]
fn reconnect_asks_again_from_last_request() {
    let mut clock = ManualClock::new();
    let (mut session, fake) = subscribed_with(with_history(), &clock);
    session.on_transport_event(heartbeat(), clock.now());
    let mut peer = session.repository().store_forward_peer(ROUTER).unwrap();
    peer.last_request = 512;
    session.repository_mut().upsert_store_forward_peer(peer);

    session.disconnect(true, clock.now());
    session.on_transport_event(TransportEvent::Disconnected(None), clock.now());
    session.on_transport_event(discovered(), clock.now());
    session.on_transport_event(TransportEvent::Connected(device()), clock.advance(seconds(1)));
    session.on_transport_event(my_info(ME), clock.now());
    session.on_transport_event(config_complete(NONCE_CONFIG), clock.now());
    session.on_transport_event(config_complete(NONCE_NODE_DB), clock.now());

    let requests = history_requests(&fake);
    assert_eq!(requests.len(), 1);
    match &requests[0].variant {
        Some(store_and_forward::Variant::History(h)) => assert_eq!(h.last_request, 512),
        other => panic!("unexpected variant {:?}", other),
    }
}

fn reconnect(session: &mut TestSession, clock: &mut ManualClock) {
    session.disconnect(true, clock.now());
    session.on_transport_event(TransportEvent::Disconnected(None), clock.now());
    session.on_transport_event(discovered(), clock.now());
    session.on_transport_event(TransportEvent::Connected(device()), clock.advance(seconds(1)));
    session.on_transport_event(my_info(ME), clock.now());
    session.on_transport_event(config_complete(NONCE_CONFIG), clock.now());
    session.on_transport_event(config_complete(NONCE_NODE_DB), clock.now());
}

#[test]
fn history_already_pulled_is_skipped_until_the_router_moves_on() {
    let mut clock = ManualClock::new();
    let (mut session, fake) = subscribed_with(with_history(), &clock);
    session.on_transport_event(heartbeat(), clock.now());
    let mut peer = session.repository().store_forward_peer(ROUTER).unwrap();
    peer.last_request = 512;
    peer.requested_since = 512;
    session.repository_mut().upsert_store_forward_peer(peer);

    session.on_timers(clock.advance(session.tunings().maintenance_interval));
    assert!(history_requests(&fake).is_empty());

    // the router served more history since
    let summary = StoreAndForward {
        rr: RequestResponse::RouterHistory as i32,
        variant: Some(store_and_forward::Variant::History(store_and_forward::History {
            history_messages: 2,
            window: 600,
            last_request: 600,
        })),
    };
    session.on_transport_event(
        packet(data_packet(ROUTER, ME, PortNum::StoreForwardApp, summary.encode_to_vec(), 0)),
        clock.now(),
    );
    reconnect(&mut session, &mut clock);

    let requests = history_requests(&fake);
    assert_eq!(requests.len(), 1);
    match &requests[0].variant {
        Some(store_and_forward::Variant::History(h)) => assert_eq!(h.last_request, 600),
        other => panic!("unexpected variant {:?}", other),
    }
    let peer = session.repository().store_forward_peer(ROUTER).unwrap();
    assert_eq!(peer.requested_since, 600);
}

#[test]
fn no_history_without_interest() {
    let mut clock = ManualClock::new();
    let (mut session, fake) = subscribed_session(&clock);
    session.on_transport_event(heartbeat(), clock.now());
    session.on_timers(clock.advance(session.tunings().maintenance_interval));
    assert!(history_requests(&fake).is_empty());
    // the router is still tracked
    assert!(session.repository().store_forward_router().is_some());
}

#[test]
fn replayed_broadcast_lands_in_messages() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_with(with_history(), &clock);
    let msg = StoreAndForward {
        rr: RequestResponse::RouterTextBroadcast as i32,
        variant: Some(store_and_forward::Variant::Text(b"while you were out".to_vec())),
    };
    let mut p = data_packet(ROUTER, u32::MAX, PortNum::StoreForwardApp, msg.encode_to_vec(), 0);
    p.from = REMOTE;
    session.on_transport_event(packet(p), clock.now());
    let stored = &session.repository().messages()[0];
    assert_eq!(stored.text, "while you were out");
    assert!(stored.store_forward);
    assert!(!stored.direct);
}

#[test]
fn history_summary_updates_the_peer() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_session(&clock);
    let msg = StoreAndForward {
        rr: RequestResponse::RouterHistory as i32,
        variant: Some(store_and_forward::Variant::History(store_and_forward::History {
            history_messages: 4,
            window: 3600,
            last_request: 99,
        })),
    };
    session.on_transport_event(
        packet(data_packet(ROUTER, ME, PortNum::StoreForwardApp, msg.encode_to_vec(), 0)),
        clock.now(),
    );
    let peer: StoreForwardPeer = session.repository().store_forward_peer(ROUTER).unwrap();
    assert!(peer.is_router);
    assert_eq!(peer.last_request, 99);
    assert_eq!(peer.window, 3600);
}
