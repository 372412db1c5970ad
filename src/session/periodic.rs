//! Maintenance sweeps and the optional position report, both only while subscribed.

use chrono::Utc;
use log::{debug, info, warn};
use prost::Message;
use std::time::Instant;

use super::{Envelope, Session, SessionError, TimerKind};
use crate::notify::NotificationSink;
use crate::protobuf::{coord_to_i, PortNum, Position, Priority};
use crate::storage::{PositionRecord, Repository};
use crate::transport::Transport;

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Arm the repeating tasks of a freshly subscribed session.
    pub(crate) fn start_periodic_tasks(&mut self, now: Instant) {
        self.timers
            .arm_repeating(TimerKind::Maintenance, now, self.tunings.maintenance_interval);
        if self.tunings.provide_location {
            debug!(
                "Reporting position every {}s",
                self.tunings.position_interval.as_secs()
            );
            self.timers
                .arm_repeating(TimerKind::PositionReport, now, self.tunings.position_interval);
        }
    }

    /// Evict nodes not heard within the configured age and drop expired passkeys.
    pub fn run_maintenance(&mut self, now: Instant) {
        if !self.handshake.subscribed {
            debug!("Skipping maintenance: not subscribed");
            return;
        }
        let max_age = chrono::Duration::from_std(self.tunings.node_max_age)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let cutoff = Utc::now() - max_age;
        self.repo.begin();
        let keep: Vec<u32> = self.my_node_num.into_iter().collect();
        let evicted = self.repo.evict_stale_nodes(cutoff, &keep);
        if self.repo.save_and_log_on_failure() && evicted > 0 {
            info!("Maintenance: evicted {} stale nodes", evicted);
        }
        let expired = self.admin.expire_passkeys(now);
        if expired > 0 {
            debug!("Maintenance: {} session passkeys expired", expired);
        }
        self.request_store_forward_history();
    }

    pub(crate) fn on_position_timer(&mut self, _now: Instant) {
        if !self.handshake.subscribed {
            return;
        }
        let Some((lat, lon, alt)) = self.tunings.fixed_position else {
            debug!("Position report due but no location is configured");
            return;
        };
        if let Err(e) = self.send_position(lat, lon, alt) {
            warn!("Position report failed: {}", e);
        }
    }

    /// Broadcast our position and remember it as our own latest fix.
    pub fn send_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: Option<i32>,
    ) -> Result<u32, SessionError> {
        let now = Utc::now();
        let position = Position {
            latitude_i: Some(coord_to_i(latitude)),
            longitude_i: Some(coord_to_i(longitude)),
            altitude,
            time: now.timestamp() as u32,
            ..Default::default()
        };
        let envelope = Envelope::new(PortNum::PositionApp, position.encode_to_vec())
            .priority(Priority::Background);
        let id = self.send_envelope(envelope)?;
        debug!("Sent position {:.5},{:.5} (id {})", latitude, longitude, id);

        if let Some(me) = self.my_node_num {
            self.repo.begin();
            self.repo.upsert_position(PositionRecord {
                node_num: me,
                latitude,
                longitude,
                altitude,
                time: now,
                sats_in_view: 0,
                precision_bits: 32,
                speed: None,
                heading: None,
            });
            self.repo.save_and_log_on_failure();
        }
        Ok(id)
    }
}
