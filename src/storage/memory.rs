use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{
    AckState, ChannelRecord, ConfigKind, ConfigRecord, FlushJob, MessageRecord, NodeRecord,
    PositionRecord, Repository, RepositoryError, StoreForwardPeer, TelemetryRecord,
    TraceRouteRecord, WaypointRecord,
};

/// Oldest telemetry samples are dropped beyond this many.
const MAX_TELEMETRY: usize = 2048;

/// Everything the in-memory repository holds; also the JSON snapshot format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSnapshot {
    #[serde(default)]
    pub nodes: BTreeMap<u32, NodeRecord>,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub configs: Vec<ConfigRecord>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(default)]
    pub positions: BTreeMap<u32, PositionRecord>,
    #[serde(default)]
    pub waypoints: BTreeMap<u32, WaypointRecord>,
    #[serde(default)]
    pub telemetry: Vec<TelemetryRecord>,
    #[serde(default)]
    pub trace_routes: BTreeMap<u32, TraceRouteRecord>,
    #[serde(default)]
    pub store_forward: BTreeMap<u32, StoreForwardPeer>,
    pub last_updated: DateTime<Utc>,
}

impl Default for MeshSnapshot {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            messages: Vec::new(),
            configs: Vec::new(),
            channels: Vec::new(),
            positions: BTreeMap::new(),
            waypoints: BTreeMap::new(),
            telemetry: Vec::new(),
            trace_routes: BTreeMap::new(),
            store_forward: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

/// How to reverse one mutation made inside a unit of work. Keyed entries hold
/// the previous value; indexed entries hold the replaced record, or `None`
/// when the record was pushed at that index.
#[derive(Debug)]
enum Undo {
    Node(u32, Option<NodeRecord>),
    Position(u32, Option<PositionRecord>),
    Waypoint(u32, Option<WaypointRecord>),
    TraceRoute(u32, Option<TraceRouteRecord>),
    StoreForward(u32, Option<StoreForwardPeer>),
    Message(usize, Option<MessageRecord>),
    Config(usize, Option<ConfigRecord>),
    Channel(usize, Option<ChannelRecord>),
    Telemetry { trimmed: Vec<TelemetryRecord> },
}

fn restore_key<V>(map: &mut BTreeMap<u32, V>, key: u32, previous: Option<V>) {
    match previous {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

fn restore_index<V>(list: &mut Vec<V>, index: usize, previous: Option<V>) {
    match previous {
        Some(value) => {
            if let Some(slot) = list.get_mut(index) {
                *slot = value;
            }
        }
        None => list.truncate(index),
    }
}

/// Replace the entry matching `same` or push a new one; returns the undo.
fn upsert_indexed<V>(
    list: &mut Vec<V>,
    value: V,
    same: impl Fn(&V) -> bool,
) -> (usize, Option<V>) {
    match list.iter().position(same) {
        Some(i) => (i, Some(std::mem::replace(&mut list[i], value))),
        None => {
            list.push(value);
            (list.len() - 1, None)
        }
    }
}

/// In-memory [`Repository`] with per-unit-of-work undo logs and an optional
/// JSON snapshot. Saves only mark the snapshot dirty; [`Repository::take_flush`]
/// produces the write.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: MeshSnapshot,
    /// Open unit of work, newest entry last.
    undo: Option<Vec<Undo>>,
    dirty: bool,
    snapshot_path: Option<PathBuf>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository mirrored to `path`; an existing snapshot there is loaded.
    pub fn with_snapshot<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            // Guard against accidental leading NULs from previous partial writes
            let cleaned = content.trim_start_matches('\0');
            let snapshot: MeshSnapshot = serde_json::from_str(cleaned)?;
            info!(
                "Loaded mesh snapshot {} ({} nodes)",
                path.display(),
                snapshot.nodes.len()
            );
            snapshot
        } else {
            MeshSnapshot::default()
        };
        Ok(Self {
            state,
            undo: None,
            dirty: false,
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot(&self) -> &MeshSnapshot {
        &self.state
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.state.messages
    }

    pub fn configs(&self) -> &[ConfigRecord] {
        &self.state.configs
    }

    pub fn channels(&self) -> &[ChannelRecord] {
        &self.state.channels
    }

    /// Saved changes not yet written to the snapshot file.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending changes on the calling thread.
    pub fn flush(&mut self) -> Result<(), RepositoryError> {
        match self.take_flush() {
            Some(job) => job().map_err(|e| {
                self.dirty = true;
                e
            }),
            None => Ok(()),
        }
    }

    fn record(&mut self, undo: Undo) {
        self.dirty = true;
        if let Some(log) = self.undo.as_mut() {
            log.push(undo);
        }
    }

    fn apply_undo(&mut self, undo: Undo) {
        let state = &mut self.state;
        match undo {
            Undo::Node(k, prev) => restore_key(&mut state.nodes, k, prev),
            Undo::Position(k, prev) => restore_key(&mut state.positions, k, prev),
            Undo::Waypoint(k, prev) => restore_key(&mut state.waypoints, k, prev),
            Undo::TraceRoute(k, prev) => restore_key(&mut state.trace_routes, k, prev),
            Undo::StoreForward(k, prev) => restore_key(&mut state.store_forward, k, prev),
            Undo::Message(i, prev) => restore_index(&mut state.messages, i, prev),
            Undo::Config(i, prev) => restore_index(&mut state.configs, i, prev),
            Undo::Channel(i, prev) => restore_index(&mut state.channels, i, prev),
            Undo::Telemetry { trimmed } => {
                state.telemetry.pop();
                state.telemetry.splice(0..0, trimmed);
            }
        }
    }
}

/// Write `snapshot` to `path` through a unique temp file and a rename.
fn write_snapshot(path: &Path, snapshot: &MeshSnapshot) -> Result<(), RepositoryError> {
    use std::fs::{self as sfs, File, OpenOptions};
    use std::io::Write;
    let content = serde_json::to_string_pretty(snapshot)?;

    if let Some(parent) = path.parent() {
        let _ = sfs::create_dir_all(parent);
    }

    // Unique temp file in the same directory so the rename is atomic
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(RepositoryError::Io(e)),
        }
    };

    sfs::rename(&tmp_path, path)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    debug!("Wrote mesh snapshot {} ({} bytes)", path.display(), content.len());
    Ok(())
}

impl Repository for MemoryRepository {
    fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    fn rollback(&mut self) {
        if let Some(log) = self.undo.take() {
            for undo in log.into_iter().rev() {
                self.apply_undo(undo);
            }
        }
    }

    fn save(&mut self) -> Result<(), RepositoryError> {
        if self.undo.take().is_some_and(|log| !log.is_empty()) {
            self.state.last_updated = Utc::now();
        }
        Ok(())
    }

    fn take_flush(&mut self) -> Option<FlushJob> {
        if !self.dirty || self.undo.is_some() {
            return None;
        }
        let path = self.snapshot_path.clone()?;
        self.dirty = false;
        let snapshot = self.state.clone();
        Some(Box::new(move || write_snapshot(&path, &snapshot)))
    }

    fn flush_failed(&mut self) {
        self.dirty = true;
    }

    fn find_node(&self, num: u32) -> Option<NodeRecord> {
        self.state.nodes.get(&num).cloned()
    }

    fn upsert_node(&mut self, node: NodeRecord) {
        let num = node.num;
        let prev = self.state.nodes.insert(num, node);
        self.record(Undo::Node(num, prev));
    }

    fn nodes(&self) -> Vec<NodeRecord> {
        self.state.nodes.values().cloned().collect()
    }

    fn evict_stale_nodes(&mut self, cutoff: DateTime<Utc>, keep: &[u32]) -> usize {
        let stale: Vec<u32> = self
            .state
            .nodes
            .iter()
            .filter(|(num, node)| {
                !node.is_favorite
                    && !keep.contains(num)
                    && node.last_heard.unwrap_or(node.first_seen) <= cutoff
            })
            .map(|(num, _)| *num)
            .collect();
        for num in &stale {
            let prev = self.state.nodes.remove(num);
            self.record(Undo::Node(*num, prev));
            if let Some(position) = self.state.positions.remove(num) {
                self.record(Undo::Position(*num, Some(position)));
            }
        }
        if !stale.is_empty() {
            debug!("Evicted {} stale nodes", stale.len());
        }
        stale.len()
    }

    fn upsert_message(&mut self, message: MessageRecord) {
        let (id, from) = (message.id, message.from);
        let (i, prev) = upsert_indexed(&mut self.state.messages, message, |m| {
            m.id == id && m.from == from
        });
        self.record(Undo::Message(i, prev));
    }

    fn mark_message_ack(&mut self, id: u32, state: AckState) -> Result<(), RepositoryError> {
        let i = self
            .state
            .messages
            .iter()
            .position(|m| m.id == id && m.outgoing)
            .ok_or_else(|| RepositoryError::NotFound(format!("message {}", id)))?;
        let prev = self.state.messages[i].clone();
        self.state.messages[i].ack = state;
        self.record(Undo::Message(i, Some(prev)));
        Ok(())
    }

    fn upsert_config(&mut self, node_num: u32, kind: ConfigKind, body: Vec<u8>) {
        let record = ConfigRecord {
            node_num,
            kind,
            body,
            updated: Utc::now(),
        };
        let (i, prev) = upsert_indexed(&mut self.state.configs, record, |c| {
            c.node_num == node_num && c.kind == kind
        });
        self.record(Undo::Config(i, prev));
    }

    fn upsert_channel(&mut self, channel: ChannelRecord) {
        let (node_num, index) = (channel.node_num, channel.index);
        let (i, prev) = upsert_indexed(&mut self.state.channels, channel, |c| {
            c.node_num == node_num && c.index == index
        });
        self.record(Undo::Channel(i, prev));
    }

    fn channels_of(&self, node_num: u32) -> Vec<ChannelRecord> {
        let mut channels: Vec<ChannelRecord> = self
            .state
            .channels
            .iter()
            .filter(|c| c.node_num == node_num)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.index);
        channels
    }

    fn upsert_position(&mut self, position: PositionRecord) {
        let num = position.node_num;
        let newer = self
            .state
            .positions
            .get(&num)
            .map_or(true, |p| p.time <= position.time);
        if newer {
            let prev = self.state.positions.insert(num, position);
            self.record(Undo::Position(num, prev));
        }
    }

    fn latest_position(&self, node_num: u32) -> Option<PositionRecord> {
        self.state.positions.get(&node_num).cloned()
    }

    fn upsert_waypoint(&mut self, waypoint: WaypointRecord) {
        let id = waypoint.id;
        let prev = self.state.waypoints.insert(id, waypoint);
        self.record(Undo::Waypoint(id, prev));
    }

    fn upsert_telemetry(&mut self, telemetry: TelemetryRecord) {
        self.state.telemetry.push(telemetry);
        let excess = self.state.telemetry.len().saturating_sub(MAX_TELEMETRY);
        let trimmed: Vec<TelemetryRecord> = self.state.telemetry.drain(..excess).collect();
        self.record(Undo::Telemetry { trimmed });
    }

    fn record_trace_route_request(&mut self, record: TraceRouteRecord) {
        let id = record.request_id;
        let prev = self.state.trace_routes.insert(id, record);
        self.record(Undo::TraceRoute(id, prev));
    }

    fn trace_route_request(&self, request_id: u32) -> Option<TraceRouteRecord> {
        self.state.trace_routes.get(&request_id).cloned()
    }

    fn save_trace_route(&mut self, record: TraceRouteRecord) {
        self.record_trace_route_request(record);
    }

    fn store_forward_peer(&self, node_num: u32) -> Option<StoreForwardPeer> {
        self.state.store_forward.get(&node_num).cloned()
    }

    fn store_forward_router(&self) -> Option<StoreForwardPeer> {
        self.state
            .store_forward
            .values()
            .filter(|p| p.is_router)
            .max_by_key(|p| p.last_heartbeat)
            .cloned()
    }

    fn upsert_store_forward_peer(&mut self, peer: StoreForwardPeer) {
        let num = peer.node_num;
        let prev = self.state.store_forward.insert(num, peer);
        self.record(Undo::StoreForward(num, prev));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn outgoing(id: u32) -> MessageRecord {
        MessageRecord {
            id,
            from: 1,
            to: 2,
            channel: 0,
            text: "hi".into(),
            received: Utc::now(),
            rx_snr: None,
            rx_rssi: None,
            hop_start: 0,
            hop_limit: 3,
            via_mqtt: false,
            direct: true,
            reply_id: None,
            emoji: false,
            alert: false,
            store_forward: false,
            outgoing: true,
            ack: AckState::Pending,
        }
    }

    fn primary(name: &str) -> ChannelRecord {
        ChannelRecord {
            node_num: 1,
            index: 0,
            name: name.into(),
            role: 1,
            psk: vec![1],
            uplink_enabled: false,
            downlink_enabled: false,
            position_precision: 0,
        }
    }

    #[test]
    fn rollback_discards_unit_of_work() {
        let mut repo = MemoryRepository::new();
        repo.begin();
        repo.upsert_node(NodeRecord::new(1));
        repo.save().unwrap();

        repo.begin();
        repo.upsert_node(NodeRecord::new(2));
        repo.rollback();
        assert!(repo.find_node(1).is_some());
        assert!(repo.find_node(2).is_none());
    }

    #[test]
    fn rollback_restores_replaced_and_evicted_records() {
        let mut repo = MemoryRepository::new();
        let mut base = NodeRecord::new(1);
        base.long_name = "Ridge".into();
        base.last_heard = Some(Utc::now() - Duration::days(30));
        repo.upsert_node(base);
        repo.upsert_channel(primary("LongFast"));
        repo.upsert_message(outgoing(5));

        repo.begin();
        let mut renamed = NodeRecord::new(1);
        renamed.long_name = "Summit".into();
        repo.upsert_node(renamed);
        repo.evict_stale_nodes(Utc::now(), &[]);
        repo.upsert_channel(primary("Private"));
        repo.mark_message_ack(5, AckState::Acked).unwrap();
        repo.upsert_message(outgoing(6));
        repo.rollback();

        assert_eq!(repo.find_node(1).unwrap().long_name, "Ridge");
        assert_eq!(repo.channels_of(1)[0].name, "LongFast");
        assert_eq!(repo.messages().len(), 1);
        assert_eq!(repo.messages()[0].ack, AckState::Pending);
    }

    #[test]
    fn save_defers_disk_writes_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.json");
        let mut repo = MemoryRepository::with_snapshot(&path).unwrap();
        repo.begin();
        repo.upsert_node(NodeRecord::new(3));
        assert!(repo.save_and_log_on_failure());
        assert!(!path.exists());
        assert!(repo.is_dirty());

        let job = repo.take_flush().expect("pending flush");
        assert!(!repo.is_dirty());
        assert!(repo.take_flush().is_none());
        job().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn no_flush_while_a_unit_of_work_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = MemoryRepository::with_snapshot(dir.path().join("mesh.json")).unwrap();
        repo.upsert_node(NodeRecord::new(1));
        repo.begin();
        repo.upsert_node(NodeRecord::new(2));
        assert!(repo.take_flush().is_none());
        repo.save().unwrap();
        assert!(repo.take_flush().is_some());
    }

    #[test]
    fn failed_flush_keeps_changes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut repo = MemoryRepository::with_snapshot(blocker.join("mesh.json")).unwrap();

        repo.begin();
        repo.upsert_node(NodeRecord::new(9));
        assert!(repo.save_and_log_on_failure());
        assert!(repo.flush().is_err());
        assert!(repo.find_node(9).is_some());
        assert!(repo.is_dirty());
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("mesh.json");
        {
            let mut repo = MemoryRepository::with_snapshot(&path).unwrap();
            repo.begin();
            let mut node = NodeRecord::new(0x1234);
            node.long_name = "Base Camp".into();
            repo.upsert_node(node);
            assert!(repo.save_and_log_on_failure());
            repo.flush().unwrap();
        }
        let repo = MemoryRepository::with_snapshot(&path).unwrap();
        assert_eq!(repo.find_node(0x1234).unwrap().long_name, "Base Camp");
    }

    #[test]
    fn eviction_spares_favorites_kept_and_recent_nodes() {
        let mut repo = MemoryRepository::new();
        let old = Utc::now() - Duration::days(10);
        let mut stale = NodeRecord::new(1);
        stale.last_heard = Some(old);
        let mut fav = NodeRecord::new(2);
        fav.last_heard = Some(old);
        fav.is_favorite = true;
        let mut fresh = NodeRecord::new(3);
        fresh.last_heard = Some(Utc::now());
        for n in [stale, fav, fresh] {
            repo.upsert_node(n);
        }
        let mut own = NodeRecord::new(4);
        own.first_seen = old;
        repo.upsert_node(own);
        let removed = repo.evict_stale_nodes(Utc::now() - Duration::days(7), &[4]);
        assert_eq!(removed, 1);
        assert!(repo.find_node(1).is_none());
        assert!(repo.find_node(2).is_some());
        assert!(repo.find_node(3).is_some());
        assert!(repo.find_node(4).is_some());
    }

    #[test]
    fn ack_marks_only_outgoing_messages() {
        let mut repo = MemoryRepository::new();
        repo.upsert_message(outgoing(77));
        repo.mark_message_ack(77, AckState::Acked).unwrap();
        assert_eq!(repo.messages()[0].ack, AckState::Acked);
        assert!(matches!(
            repo.mark_message_ack(78, AckState::Acked),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn older_position_does_not_replace_newer() {
        let mut repo = MemoryRepository::new();
        let now = Utc::now();
        let pos = |t| PositionRecord {
            node_num: 5,
            latitude: 1.0,
            longitude: 2.0,
            altitude: None,
            time: t,
            sats_in_view: 0,
            precision_bits: 32,
            speed: None,
            heading: None,
        };
        repo.upsert_position(pos(now));
        repo.upsert_position(pos(now - Duration::hours(1)));
        assert_eq!(repo.latest_position(5).unwrap().time, now);
    }

    #[test]
    fn config_upsert_replaces_same_category() {
        let mut repo = MemoryRepository::new();
        repo.upsert_config(1, ConfigKind::Radio(5), vec![1]);
        repo.upsert_config(1, ConfigKind::Radio(5), vec![2]);
        repo.upsert_config(1, ConfigKind::Module(5), vec![3]);
        assert_eq!(repo.configs().len(), 2);
        assert_eq!(repo.configs()[0].body, vec![2]);
    }
}
