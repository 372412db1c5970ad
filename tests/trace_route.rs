mod common;

use common::*;
use prost::Message;

use meshlink::notify::RouteTarget;
use meshlink::protobuf::{PortNum, RouteDiscovery};
use meshlink::session::{ManualClock, SignalQuality};
use meshlink::storage::Repository;

const HOP: u32 = 0x0000_a11a;

#[test]
fn trace_route_round_trip_through_the_session() {
    let clock = ManualClock::new();
    let (mut session, fake) = subscribed_session(&clock);
    session.on_transport_event(node_info(HOP, "Relay"), clock.now());
    session.on_transport_event(node_info(REMOTE, "Hilltop"), clock.now());

    let id = session.request_trace_route(REMOTE, 0).unwrap();
    let sent = fake.sent_on(PortNum::TracerouteApp);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, REMOTE);
    assert!(sent[0].decoded().unwrap().want_response);
    let pending = session.repository().trace_route_request(id).unwrap();
    assert!(pending.response.is_none());

    let discovery = RouteDiscovery {
        route: vec![HOP],
        snr_towards: vec![20, 12],
        route_back: vec![HOP],
        snr_back: vec![8, -128],
    };
    let mut reply = data_packet(REMOTE, ME, PortNum::TracerouteApp, discovery.encode_to_vec(), id);
    reply.hop_start = 3;
    reply.hop_limit = 2;
    session.on_transport_event(packet(reply), clock.now());

    let response = session
        .repository()
        .trace_route_request(id)
        .unwrap()
        .response
        .unwrap();
    assert_eq!(response.hops_towards, 1);
    assert_eq!(response.hops_back, 1);
    assert!(response.route_text.ends_with("Relay → Hilltop"));
    assert_eq!(
        response.route_back_text.as_deref(),
        Some(format!("Hilltop → Relay → {}", response.hops[3].name).as_str())
    );
    let snrs: Vec<_> = response.hops.iter().map(|h| h.snr).collect();
    assert_eq!(
        snrs,
        vec![
            SignalQuality::Db(5.0),
            SignalQuality::Db(3.0),
            SignalQuality::Db(2.0),
            SignalQuality::Unknown,
        ]
    );

    let n = session.notifier().scheduled.last().unwrap();
    assert_eq!(n.route_target, Some(RouteTarget::TraceRoute { request_id: id }));
    assert!(n.body.contains('\n'));
}

#[test]
fn duplicate_reply_does_not_renotify() {
    let clock = ManualClock::new();
    let (mut session, _fake) = subscribed_session(&clock);
    let id = session.request_trace_route(REMOTE, 0).unwrap();
    let reply = data_packet(REMOTE, ME, PortNum::TracerouteApp, RouteDiscovery::default().encode_to_vec(), id);
    session.on_transport_event(packet(reply.clone()), clock.now());
    let count = session.notifier().scheduled.len();
    session.on_transport_event(packet(reply), clock.now());
    assert_eq!(session.notifier().scheduled.len(), count);

    let response = session.repository().trace_route_request(id).unwrap().response.unwrap();
    // direct neighbor: only the destination hop
    assert_eq!(response.hops_towards, 0);
    assert_eq!(response.hops.len(), 1);
    assert_eq!(response.hops[0].snr, SignalQuality::NotSampled);
}
