//! Store-and-forward: router bookkeeping, replayed texts and history requests.

use log::{debug, info, trace, warn};
use prost::Message;

use super::dispatch::{ingest_text, Effect, PacketContext, TextOrigin};
use super::{Envelope, Session};
use crate::notify::NotificationSink;
use crate::protobuf::{
    store_and_forward::{self, RequestResponse},
    Data, MeshPacket, PortNum, StoreAndForward,
};
use crate::storage::{Repository, StoreForwardPeer};
use crate::transport::Transport;

fn peer_or_new(ctx: &PacketContext<'_>, node_num: u32) -> StoreForwardPeer {
    ctx.repo
        .store_forward_peer(node_num)
        .unwrap_or_else(|| StoreForwardPeer::new(node_num))
}

pub(crate) fn handle_store_forward(
    packet: &MeshPacket,
    data: &Data,
    ctx: &mut PacketContext<'_>,
) -> Vec<Effect> {
    let message = match StoreAndForward::decode(data.payload.clone()) {
        Ok(m) => m,
        Err(e) => {
            warn!("Malformed store-and-forward frame from !{:08x}: {}", packet.from, e);
            return Vec::new();
        }
    };
    let rr = RequestResponse::try_from(message.rr).unwrap_or(RequestResponse::Unset);
    let from = packet.from;

    match (rr, message.variant) {
        (RequestResponse::RouterHeartbeat, variant) => {
            let mut p = peer_or_new(ctx, from);
            match variant {
                Some(store_and_forward::Variant::Heartbeat(hb)) => {
                    p.heartbeat_period = hb.period;
                    p.is_router = hb.secondary == 0;
                }
                _ => p.is_router = true,
            }
            p.last_heartbeat = Some(ctx.now);
            trace!(
                "S&F heartbeat from !{:08x} (router={}, period {}s)",
                from,
                p.is_router,
                p.heartbeat_period
            );
            ctx.repo.upsert_store_forward_peer(p);
            Vec::new()
        }
        (RequestResponse::RouterHistory, Some(store_and_forward::Variant::History(h))) => {
            let mut p = peer_or_new(ctx, from);
            p.is_router = true;
            p.last_request = h.last_request;
            p.history_messages = h.history_messages;
            p.window = h.window;
            info!(
                "Router !{:08x} will replay {} messages from the last {} min",
                from,
                h.history_messages,
                h.window / 60
            );
            ctx.repo.upsert_store_forward_peer(p);
            Vec::new()
        }
        (
            RequestResponse::RouterTextDirect | RequestResponse::RouterTextBroadcast,
            Some(store_and_forward::Variant::Text(text)),
        ) => {
            let origin = TextOrigin {
                store_forward: true,
                ..TextOrigin::default()
            };
            ingest_text(packet, &text, data, origin, ctx)
        }
        (RequestResponse::RouterStats, Some(store_and_forward::Variant::Stats(stats))) => {
            debug!(
                "Router !{:08x} stats: {}/{} saved, {} history requests",
                from, stats.messages_saved, stats.messages_max, stats.requests_history
            );
            let mut p = peer_or_new(ctx, from);
            p.is_router = true;
            ctx.repo.upsert_store_forward_peer(p);
            Vec::new()
        }
        (RequestResponse::RouterBusy, _) => {
            warn!("Store-and-forward router !{:08x} is busy", from);
            Vec::new()
        }
        (RequestResponse::RouterError, _) => {
            warn!("Store-and-forward router !{:08x} reported an error", from);
            Vec::new()
        }
        (rr, _) => {
            trace!("S&F {:?} from !{:08x} ignored", rr, from);
            Vec::new()
        }
    }
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Ask the known router for missed messages, once per router per connection.
    pub(crate) fn request_store_forward_history(&mut self) {
        if !self.tunings.interest.store_forward_history {
            return;
        }
        let Some(router) = self.repo.store_forward_router() else {
            debug!("No store-and-forward router known yet");
            return;
        };
        if self.history_requested.contains(&router.node_num) {
            return;
        }
        if router.last_request != 0 && router.last_request == router.requested_since {
            // Nothing new served since we last asked from this index
            debug!(
                "History from !{:08x} already pulled through #{}",
                router.node_num, router.last_request
            );
            self.history_requested.insert(router.node_num);
            return;
        }
        let request = StoreAndForward {
            rr: RequestResponse::ClientHistory as i32,
            variant: Some(store_and_forward::Variant::History(store_and_forward::History {
                history_messages: 0,
                window: 0,
                last_request: router.last_request,
            })),
        };
        let envelope =
            Envelope::new(PortNum::StoreForwardApp, request.encode_to_vec()).to(router.node_num);
        match self.send_envelope(envelope) {
            Ok(id) => {
                info!(
                    "Requested history from router !{:08x} since #{} (id {})",
                    router.node_num, router.last_request, id
                );
                self.history_requested.insert(router.node_num);
                let mut peer = router;
                peer.requested_since = peer.last_request;
                self.repo.begin();
                self.repo.upsert_store_forward_peer(peer);
                self.repo.save_and_log_on_failure();
            }
            Err(e) => warn!("History request to !{:08x} failed: {}", router.node_num, e),
        }
    }
}
