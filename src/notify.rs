//! User-facing notifications raised by the session (incoming direct messages,
//! completed trace routes, connection failures).

use log::info;
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;

/// Where a tapped notification should take the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteTarget {
    Messages { channel: u32, from: u32 },
    Node(u32),
    TraceRoute { request_id: u32 },
    Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub route_target: Option<RouteTarget>,
}

impl Notification {
    /// New notification with a fresh random id.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            subtitle: None,
            body: body.into(),
            route_target: None,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_target(mut self, target: RouteTarget) -> Self {
        self.route_target = Some(target);
        self
    }
}

pub trait NotificationSink {
    fn schedule(&mut self, notification: Notification);
}

/// Sink that only writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn schedule(&mut self, n: Notification) {
        info!(
            "notify[{}] {}{}: {}",
            n.id,
            escape_log(&n.title),
            n.subtitle
                .as_deref()
                .map(|s| format!(" ({})", escape_log(s)))
                .unwrap_or_default(),
            escape_log(&n.body)
        );
    }
}

/// Buffers notifications in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    pub scheduled: Vec<Notification>,
}

impl NotificationSink for CollectingNotifier {
    fn schedule(&mut self, notification: Notification) {
        self.scheduled.push(notification);
    }
}
