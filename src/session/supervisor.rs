//! Connection supervision: discovery results, the preferred-device
//! auto-reconnect policy, the bounded connect timeout and teardown.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use super::{HandshakePhase, Session, SessionError, SessionTunings, TimerKind};
use crate::metrics;
use crate::notify::{Notification, NotificationSink, RouteTarget};
use crate::storage::Repository;
use crate::transport::{ConnectFailure, DeviceId, DiscoveredDevice, LinkChannel, Transport};

/// Link lifecycle. Operations needing a live link match on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting { device: DeviceId, attempt: u32 },
    Connected { device: DeviceId },
    Subscribed { device: DeviceId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkPhase {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

impl LinkState {
    pub fn phase(&self) -> LinkPhase {
        match self {
            LinkState::Disconnected => LinkPhase::Disconnected,
            LinkState::Connecting { .. } => LinkPhase::Connecting,
            LinkState::Connected { .. } => LinkPhase::Connected,
            LinkState::Subscribed { .. } => LinkPhase::Subscribed,
        }
    }

    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            LinkState::Disconnected => None,
            LinkState::Connecting { device, .. }
            | LinkState::Connected { device }
            | LinkState::Subscribed { device } => Some(device),
        }
    }

    /// Connected or subscribed: frames can be written.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            LinkState::Connected { .. } | LinkState::Subscribed { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub link: LinkState,
    pub last_error: Option<String>,
    /// Connect-timeout firings for the attempt in progress.
    pub connect_attempts: u32,
    pub auto_reconnect: bool,
    /// The next link loss was requested by us and must not reconnect.
    pub allow_disconnect: bool,
    pub preferred_device: Option<DeviceId>,
    pub discovered: BTreeMap<DeviceId, DiscoveredDevice>,
    /// Set by a pairing-invalidated failure; cleared by an explicit connect.
    pub pairing_invalid: bool,
    pub scanning: bool,
}

impl ConnectionState {
    pub fn new(tunings: &SessionTunings) -> Self {
        Self {
            link: LinkState::Disconnected,
            last_error: None,
            connect_attempts: 0,
            auto_reconnect: tunings.auto_reconnect,
            allow_disconnect: false,
            preferred_device: tunings.preferred_device.as_deref().map(DeviceId::from),
            discovered: BTreeMap::new(),
            pairing_invalid: false,
            scanning: false,
        }
    }
}

impl<T: Transport, R: Repository, N: NotificationSink> Session<T, R, N> {
    /// Connect to a discovered or preferred device, tearing down any current link first.
    pub fn connect(&mut self, target: &DeviceId, now: Instant) -> Result<(), SessionError> {
        let known = self.conn.discovered.contains_key(target)
            || self.conn.preferred_device.as_ref() == Some(target);
        if !known {
            return Err(SessionError::UnknownDevice(target.0.clone()));
        }
        if self.conn.link != LinkState::Disconnected {
            info!("Replacing current connection before connecting to {}", target);
            self.teardown(true);
        }
        self.conn.pairing_invalid = false;
        self.conn.auto_reconnect = self.tunings.auto_reconnect;
        self.begin_connect(target.clone(), now);
        Ok(())
    }

    fn begin_connect(&mut self, target: DeviceId, now: Instant) {
        if self.conn.scanning {
            self.transport.stop_scan();
            self.conn.scanning = false;
        }
        info!("Connecting to {}", target);
        metrics::inc_connect_attempts();
        self.conn.connect_attempts = 0;
        self.conn.link = LinkState::Connecting {
            device: target.clone(),
            attempt: 0,
        };
        self.timers
            .arm_repeating(TimerKind::ConnectTimeout, now, self.tunings.connect_timeout);
        self.transport.connect(&target);
    }

    /// Drop the link. With `auto_reconnect` the preferred device is reconnected
    /// when it is discovered again. A no-op when already disconnected.
    pub fn disconnect(&mut self, auto_reconnect: bool, _now: Instant) {
        if self.conn.link == LinkState::Disconnected {
            debug!("disconnect: already disconnected");
            return;
        }
        info!("Disconnecting (auto_reconnect={})", auto_reconnect);
        self.teardown(true);
        self.conn.auto_reconnect = auto_reconnect;
        if auto_reconnect && self.conn.preferred_device.is_some() {
            self.restart_scan();
        }
    }

    /// Cancel timers, forget in-flight admin and handshake state and mark the
    /// link down. `close_transport` also instructs the transport to disconnect.
    fn teardown(&mut self, close_transport: bool) {
        self.timers.cancel_all();
        self.admin.clear_pending();
        self.handshake.reset();
        self.history_requested.clear();
        self.reading = false;
        self.conn.connect_attempts = 0;
        self.conn.link = LinkState::Disconnected;
        if close_transport {
            self.conn.allow_disconnect = true;
            self.transport.disconnect();
        }
    }

    fn restart_scan(&mut self) {
        self.conn.scanning = true;
        self.transport.start_scan();
    }

    pub(crate) fn on_discovered(&mut self, device: DiscoveredDevice, now: Instant) {
        debug!("Discovered {} ({})", device.id, device.name);
        let id = device.id.clone();
        self.conn.discovered.insert(id.clone(), device);
        let wants_reconnect = self.conn.link == LinkState::Disconnected
            && self.conn.auto_reconnect
            && !self.conn.pairing_invalid
            && self.conn.preferred_device.as_ref() == Some(&id);
        if wants_reconnect {
            info!("Preferred device {} rediscovered; reconnecting", id);
            self.begin_connect(id, now);
        }
    }

    pub(crate) fn on_connect_timeout(&mut self, _now: Instant) {
        let LinkState::Connecting { device, .. } = &self.conn.link else {
            self.timers.cancel(TimerKind::ConnectTimeout);
            return;
        };
        let device = device.clone();
        self.conn.connect_attempts += 1;
        let attempts = self.conn.connect_attempts;
        if attempts < self.tunings.connect_max_attempts {
            debug!(
                "Still connecting to {} ({}/{})",
                device, attempts, self.tunings.connect_max_attempts
            );
            self.conn.link = LinkState::Connecting {
                device,
                attempt: attempts,
            };
            return;
        }

        warn!("Giving up on {} after {} attempts", device, attempts);
        metrics::inc_connect_failures();
        self.teardown(true);
        let message = format!("connection failed after {} attempts", attempts);
        self.conn.last_error = Some(message.clone());
        self.notify(
            Notification::new("Connection failed", message)
                .with_subtitle(device.0.clone())
                .with_target(RouteTarget::Connection),
        );
        self.restart_scan();
    }

    pub(crate) fn on_connected(&mut self, device: DeviceId, now: Instant) {
        match &self.conn.link {
            LinkState::Connecting { device: pending, .. } if *pending == device => {}
            other => {
                warn!(
                    "Ignoring connect callback for {} while {:?}",
                    device,
                    other.phase()
                );
                return;
            }
        }
        self.timers.cancel(TimerKind::ConnectTimeout);
        self.conn.connect_attempts = 0;
        self.conn.allow_disconnect = false;
        self.conn.last_error = None;
        if self.conn.preferred_device.is_none() {
            info!("{} is now the preferred device", device);
            self.conn.preferred_device = Some(device.clone());
        }
        info!("Connected to {}; resolving channels", device);
        self.conn.link = LinkState::Connected { device };
        self.transport.subscribe(LinkChannel::FromRadio);
        self.transport.subscribe(LinkChannel::FromNum);
        self.transport.subscribe(LinkChannel::Log);
        if self.transport.channels_resolved() {
            let _ = self.request_handshake(now);
        }
    }

    pub(crate) fn on_channels_resolved(&mut self, now: Instant) {
        if !self.conn.link.is_connected() {
            return;
        }
        if self.handshake.phase == HandshakePhase::Idle || !self.transport.channels_resolved() {
            let _ = self.request_handshake(now);
        }
    }

    pub(crate) fn on_connect_failed(
        &mut self,
        device: DeviceId,
        cause: ConnectFailure,
        _now: Instant,
    ) {
        if self.conn.link.device() != Some(&device) {
            debug!("Stale connect failure for {}: {}", device, cause);
            return;
        }
        metrics::inc_connect_failures();
        self.teardown(false);
        match cause {
            ConnectFailure::PairingInvalidated => {
                error!("Pairing with {} was invalidated", device);
                self.conn.pairing_invalid = true;
                let message = format!(
                    "pairing with {} is no longer valid; forget the device and pair again",
                    device
                );
                self.conn.last_error = Some(message.clone());
                self.notify(
                    Notification::new("Pairing required", message)
                        .with_target(RouteTarget::Connection),
                );
            }
            ConnectFailure::Other(reason) => {
                warn!("Failed to connect to {}: {}", device, reason);
                self.conn.last_error = Some(format!("failed to connect to {}: {}", device, reason));
                self.restart_scan();
            }
        }
    }

    pub(crate) fn on_disconnected(&mut self, cause: Option<String>, _now: Instant) {
        if std::mem::take(&mut self.conn.allow_disconnect) {
            // Our own teardown already ran; this confirms the old link closed
            info!("Disconnected");
            return;
        }
        if self.conn.link == LinkState::Disconnected {
            debug!("Transport disconnect while already disconnected");
            return;
        }
        let device = self.conn.link.device().cloned();
        self.teardown(false);
        warn!(
            "Lost connection to {}: {}",
            device.as_ref().map(|d| d.0.as_str()).unwrap_or("device"),
            cause.as_deref().unwrap_or("no reason given")
        );
        if let Some(reason) = cause {
            self.conn.last_error = Some(reason);
        }
        if self.conn.auto_reconnect
            && !self.conn.pairing_invalid
            && device.is_some()
            && device == self.conn.preferred_device
        {
            self.restart_scan();
        }
    }
}
