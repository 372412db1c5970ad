//! The two-pass "want config" handshake.
//!
//! The first pass (nonce [`NONCE_CONFIG`]) pulls radio configuration,
//! channels and module configuration; once its `config_complete_id` arrives
//! the session is subscribed and immediately runs the second pass
//! ([`NONCE_NODE_DB`]) for the node database. A watchdog re-issues the
//! request when no handshake frame arrives in time and disconnects once the
//! retry ceiling is exhausted.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

use super::{Session, SessionError, TimerKind, NONCE_CONFIG, NONCE_NODE_DB};
use crate::logutil::escape_log;
use crate::metrics;
use crate::notify::{Notification, NotificationSink, RouteTarget};
use crate::protobuf::{to_radio, DeviceMetadata, Heartbeat, ToRadio};
use crate::storage::Repository;
use crate::transport::{LinkChannel, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandshakePhase {
    Idle,
    AwaitingConfig,
    AwaitingNodeDb,
    Complete,
    /// Retries exhausted; cleared by the next connection.
    Failed,
}

#[derive(Debug, Clone)]
pub struct HandshakeState {
    pub phase: HandshakePhase,
    /// Nonce of the request in flight.
    pub nonce: Option<u32>,
    /// No handshake frame seen since the watchdog was armed.
    pub waiting: bool,
    pub retries: u32,
    /// The configuration pass has completed on this connection.
    pub subscribed: bool,
    pub invalid_version: bool,
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self {
            phase: HandshakePhase::Idle,
            nonce: None,
            waiting: false,
            retries: 0,
            subscribed: false,
            invalid_version: false,
        }
    }
}

impl HandshakeState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// `major.minor.patch` prefix of a firmware version string such as `2.5.6.abc1234`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().trim_start_matches('v').split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch_part = parts.next()?;
        let digits: String = patch_part.chars().take_while(|c| c.is_ascii_digit()).collect();
        let patch = digits.parse().ok()?;
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Send a heartbeat and a `want_config` for the current pass, then arm
    /// the watchdog. Returns the nonce sent.
    pub fn request_handshake(&mut self, now: Instant) -> Result<u32, SessionError> {
        if !self.conn.link.is_connected() {
            debug!("Handshake requested while not connected");
            return Err(SessionError::NotConnected);
        }
        if !self.transport.channels_resolved() {
            error!("Device lacks the required channels; not retrying");
            self.handshake.phase = HandshakePhase::Failed;
            self.disconnect(false, now);
            self.handshake.phase = HandshakePhase::Failed;
            let message = SessionError::UnsupportedPeer.to_string();
            self.conn.last_error = Some(message.clone());
            self.notify(
                Notification::new("Unsupported device", message)
                    .with_target(RouteTarget::Connection),
            );
            return Err(SessionError::UnsupportedPeer);
        }

        let (nonce, phase) = if self.handshake.subscribed {
            (NONCE_NODE_DB, HandshakePhase::AwaitingNodeDb)
        } else {
            (NONCE_CONFIG, HandshakePhase::AwaitingConfig)
        };
        self.handshake.nonce = Some(nonce);
        self.handshake.phase = phase;
        self.handshake.waiting = true;

        let heartbeat = ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Heartbeat(Heartbeat {
                nonce: rand::random(),
            })),
        };
        let want = ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(nonce)),
        };
        for msg in [heartbeat, want] {
            if let Err(e) = self.write_to_radio(&msg) {
                // The watchdog will re-issue the request
                warn!("Handshake write failed: {}", e);
            }
        }
        info!("Requested configuration (nonce {}, {:?})", nonce, phase);

        self.timers
            .arm_once(TimerKind::HandshakeWatchdog, now, self.tunings.handshake_watchdog);
        self.reading = true;
        self.transport.request_read(LinkChannel::FromRadio);
        Ok(nonce)
    }

    pub(crate) fn on_watchdog(&mut self, now: Instant) {
        if !self.handshake.waiting {
            return;
        }
        if self.handshake.retries < self.tunings.handshake_max_retries {
            self.handshake.retries += 1;
            metrics::inc_handshake_retries();
            warn!(
                "No configuration received; retrying ({}/{})",
                self.handshake.retries, self.tunings.handshake_max_retries
            );
            let _ = self.request_handshake(now);
            return;
        }

        error!(
            "Device did not answer {} configuration requests; disconnecting",
            self.handshake.retries + 1
        );
        metrics::inc_handshake_failures();
        let retries = self.handshake.retries;
        self.disconnect(false, now);
        self.handshake.phase = HandshakePhase::Failed;
        self.handshake.retries = retries;
        let message = "device did not respond to the configuration request".to_string();
        self.conn.last_error = Some(message.clone());
        self.notify(
            Notification::new("Connection timed out", message)
                .with_target(RouteTarget::Connection),
        );
    }

    /// A handshake-relevant frame arrived: disarm the watchdog.
    pub(crate) fn on_progress_observed(&mut self) {
        if !self.handshake.waiting {
            return;
        }
        self.timers.cancel(TimerKind::HandshakeWatchdog);
        self.handshake.waiting = false;
        self.handshake.retries = 0;
    }

    pub(crate) fn on_config_complete(&mut self, id: u32, now: Instant) {
        if !self.conn.link.is_connected() {
            debug!("Stale config_complete_id {} after disconnect", id);
            return;
        }
        match id {
            NONCE_CONFIG => {
                self.finish_pass();
                if self.handshake.invalid_version {
                    warn!("Configuration complete but firmware is unsupported; staying unsubscribed");
                    self.handshake.phase = HandshakePhase::Idle;
                    return;
                }
                self.conn.last_error = None;
                self.handshake.subscribed = true;
                self.handshake.phase = HandshakePhase::Complete;
                if let Some(device) = self.conn.link.device().cloned() {
                    self.conn.link = super::LinkState::Subscribed { device };
                }
                info!("Configuration pass complete; subscribed");
                self.start_periodic_tasks(now);
                self.request_store_forward_history();
                let _ = self.request_handshake(now);
            }
            NONCE_NODE_DB => {
                self.finish_pass();
                self.handshake.phase = HandshakePhase::Complete;
                info!("Node database synchronized");
            }
            other => debug!("Ignoring config_complete_id {}", other),
        }
    }

    fn finish_pass(&mut self) {
        self.timers.cancel(TimerKind::HandshakeWatchdog);
        self.handshake.waiting = false;
        self.handshake.retries = 0;
        self.handshake.nonce = None;
    }

    pub(crate) fn on_rebooted(&mut self, now: Instant) {
        if !self.conn.link.is_connected() {
            return;
        }
        info!("Device rebooted; restarting handshake");
        self.handshake.subscribed = false;
        self.handshake.phase = HandshakePhase::Idle;
        self.timers.cancel(TimerKind::PositionReport);
        self.timers.cancel(TimerKind::Maintenance);
        if let Some(device) = self.conn.link.device().cloned() {
            self.conn.link = super::LinkState::Connected { device };
        }
        let _ = self.request_handshake(now);
    }

    /// Gate the session on the advertised firmware version.
    pub(crate) fn on_device_metadata(&mut self, metadata: &DeviceMetadata) {
        let advertised = metadata.firmware_version.trim().to_string();
        self.firmware_version = Some(advertised.clone());
        let minimum = FirmwareVersion::parse(&self.tunings.minimum_firmware);
        let compatible = match (FirmwareVersion::parse(&advertised), minimum) {
            (Some(v), Some(min)) => v >= min,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if compatible {
            debug!("Firmware {} accepted", escape_log(&advertised));
            return;
        }
        warn!(
            "Firmware '{}' is below the minimum {}",
            escape_log(&advertised),
            self.tunings.minimum_firmware
        );
        self.handshake.invalid_version = true;
        let message = format!(
            "firmware {} is not supported; update to {} or newer",
            if advertised.is_empty() { "(unknown)" } else { advertised.as_str() },
            self.tunings.minimum_firmware
        );
        self.conn.last_error = Some(message.clone());
        self.notify(
            Notification::new("Firmware update required", message)
                .with_target(RouteTarget::Connection),
        );
    }
}
