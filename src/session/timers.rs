//! Cancelable deadlines for the session's four timers.
//!
//! The session never sleeps itself: it arms deadlines here and the runner (or
//! a test driving a [`ManualClock`]) calls back with the current instant.
//! Re-arming a kind replaces its previous deadline, which is how a new
//! handshake invalidates an older watchdog.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    ConnectTimeout,
    HandshakeWatchdog,
    Maintenance,
    PositionReport,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    armed: BTreeMap<TimerKind, Deadline>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once, `after` from `now`.
    pub fn arm_once(&mut self, kind: TimerKind, now: Instant, after: Duration) {
        self.armed.insert(
            kind,
            Deadline {
                at: now + after,
                period: None,
            },
        );
    }

    /// Fire every `period`, first at `now + period`.
    pub fn arm_repeating(&mut self, kind: TimerKind, now: Instant, period: Duration) {
        self.armed.insert(
            kind,
            Deadline {
                at: now + period,
                period: Some(period),
            },
        );
    }

    /// Returns whether the timer was armed. Canceling twice is a no-op.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.armed.clear();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.armed.get(&kind).map(|d| d.at)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|d| d.at).min()
    }

    /// Kinds due at `now`, each at most once. One-shot timers are disarmed;
    /// repeating ones move to their next period.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let due: Vec<TimerKind> = self
            .armed
            .iter()
            .filter(|(_, d)| d.at <= now)
            .map(|(k, _)| *k)
            .collect();
        for kind in &due {
            let Some(deadline) = self.armed.get_mut(kind) else {
                continue;
            };
            match deadline.period {
                Some(period) => {
                    deadline.at += period;
                    // A stalled loop must not replay a backlog of firings
                    if deadline.at <= now {
                        deadline.at = now + period;
                    }
                }
                None => {
                    self.armed.remove(kind);
                }
            }
        }
        due
    }
}

/// Hand-driven clock for exercising timers without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    now: Instant,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn advance(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
