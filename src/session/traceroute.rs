//! Trace routes: issuing the request and folding the reply into a stored,
//! human-readable route.

use chrono::Utc;
use log::{debug, info};
use prost::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::dispatch::{Effect, PacketContext};
use super::{Envelope, Session, SessionError};
use crate::notify::{Notification, NotificationSink, RouteTarget};
use crate::protobuf::{Data, MeshPacket, PortNum, RouteDiscovery};
use crate::storage::{Repository, TraceRouteHop, TraceRouteRecord, TraceRouteResponse};
use crate::transport::Transport;

/// Raw SNR value meaning the hop could not measure it.
const SNR_UNKNOWN_RAW: i32 = -128;

/// Per-hop SNR as reported in a route discovery (quarter-dB steps).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SignalQuality {
    Db(f32),
    /// The hop reported the "unknown" marker.
    Unknown,
    /// The reply carried no sample for this hop.
    NotSampled,
}

impl SignalQuality {
    pub fn from_raw(raw: i32) -> Self {
        if raw == SNR_UNKNOWN_RAW {
            SignalQuality::Unknown
        } else {
            SignalQuality::Db(raw as f32 / 4.0)
        }
    }

    fn sample(samples: &[i32], index: usize) -> Self {
        samples
            .get(index)
            .copied()
            .map(Self::from_raw)
            .unwrap_or(SignalQuality::NotSampled)
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalQuality::Db(db) => write!(f, "{} dB", db),
            SignalQuality::Unknown => f.write_str("unknown"),
            SignalQuality::NotSampled => f.write_str("no sample"),
        }
    }
}

fn hop(ctx: &mut PacketContext<'_>, node_num: u32, snr: SignalQuality, back: bool) -> TraceRouteHop {
    let node = ctx.node_or_create(node_num);
    let position = ctx
        .repo
        .latest_position(node_num)
        .filter(|p| ctx.now.signed_duration_since(p.time) < ctx.trace_position_max_age);
    TraceRouteHop {
        node_num,
        name: node.display_name().to_string(),
        snr,
        latitude: position.as_ref().map(|p| p.latitude),
        longitude: position.as_ref().map(|p| p.longitude),
        back,
    }
}

fn summary(start: &str, hops: &[TraceRouteHop]) -> String {
    std::iter::once(start)
        .chain(hops.iter().map(|h| h.name.as_str()))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Complete the trace route that `data.request_id` refers to.
pub(crate) fn handle_trace_route(
    packet: &MeshPacket,
    data: &Data,
    ctx: &mut PacketContext<'_>,
) -> Vec<Effect> {
    let discovery = match RouteDiscovery::decode(data.payload.clone()) {
        Ok(d) => d,
        Err(e) => {
            debug!("Malformed route discovery from !{:08x}: {}", packet.from, e);
            return Vec::new();
        }
    };
    if data.request_id == 0 {
        debug!("Trace route request from !{:08x} passing through", packet.from);
        return Vec::new();
    }
    let Some(mut record) = ctx.repo.trace_route_request(data.request_id) else {
        debug!("Trace route reply {} matches no request", data.request_id);
        return Vec::new();
    };
    if record.response.is_some() {
        debug!("Trace route {} already completed", data.request_id);
        return Vec::new();
    }

    let origin = ctx.my_node_num.unwrap_or(record.from);
    let destination = packet.from;
    let origin_name = ctx.node_or_create(origin).display_name().to_string();

    let mut towards = Vec::with_capacity(discovery.route.len() + 1);
    for (i, num) in discovery.route.iter().enumerate() {
        let snr = SignalQuality::sample(&discovery.snr_towards, i);
        towards.push(hop(ctx, *num, snr, false));
    }
    let snr = SignalQuality::sample(&discovery.snr_towards, discovery.route.len());
    towards.push(hop(ctx, destination, snr, false));
    let route_text = summary(&origin_name, &towards);
    let hops_towards = discovery.route.len() as i32;

    let mut back = Vec::new();
    let mut hops_back = -1;
    let mut route_back_text = None;
    if packet.hop_start > 0 && !discovery.snr_back.is_empty() {
        for (i, num) in discovery.route_back.iter().enumerate() {
            let snr = SignalQuality::sample(&discovery.snr_back, i);
            back.push(hop(ctx, *num, snr, true));
        }
        let snr = SignalQuality::sample(&discovery.snr_back, discovery.route_back.len());
        back.push(hop(ctx, origin, snr, true));
        hops_back = discovery.route_back.len() as i32;
        let destination_name = towards
            .last()
            .map(|h| h.name.clone())
            .unwrap_or_default();
        route_back_text = Some(summary(&destination_name, &back));
    }

    info!(
        "Trace route {}: {} ({} hops towards, {} back)",
        record.request_id, route_text, hops_towards, hops_back
    );
    let mut body = route_text.clone();
    if let Some(text) = &route_back_text {
        body.push('\n');
        body.push_str(text);
    }
    towards.extend(back);
    record.response = Some(TraceRouteResponse {
        received: ctx.now,
        hops: towards,
        hops_towards,
        hops_back,
        route_text,
        route_back_text,
    });
    let request_id = record.request_id;
    ctx.repo.save_trace_route(record);

    vec![Effect::Notify(
        Notification::new("Trace route complete", body)
            .with_subtitle(ctx.node_name(destination))
            .with_target(RouteTarget::TraceRoute { request_id }),
    )]
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Ask `dest` for the route between us; the reply completes the stored request.
    pub fn request_trace_route(&mut self, dest: u32, channel: u32) -> Result<u32, SessionError> {
        let envelope = Envelope::new(PortNum::TracerouteApp, RouteDiscovery::default().encode_to_vec())
            .to(dest)
            .channel(channel)
            .want_response(true);
        let id = self.send_envelope(envelope)?;
        self.repo.begin();
        self.repo.record_trace_route_request(TraceRouteRecord {
            request_id: id,
            from: self.my_node_num.unwrap_or(0),
            to: dest,
            channel,
            sent: Utc::now(),
            response: None,
        });
        self.repo.save_and_log_on_failure();
        info!("Trace route {} requested to !{:08x}", id, dest);
        Ok(id)
    }
}
