//! Process-wide session counters.
//! Cheap atomics bumped from the session engine; `snapshot()` feeds the CLI probe report.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static FRAMES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static FRAMES_MALFORMED: AtomicU64 = AtomicU64::new(0);
static HANDSHAKE_RETRIES: AtomicU64 = AtomicU64::new(0);
static HANDSHAKE_FAILURES: AtomicU64 = AtomicU64::new(0);
static ADMIN_SENT: AtomicU64 = AtomicU64::new(0);
static ADMIN_CORRELATED: AtomicU64 = AtomicU64::new(0);
static CONNECT_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static CONNECT_FAILURES: AtomicU64 = AtomicU64::new(0);
static REPOSITORY_ROLLBACKS: AtomicU64 = AtomicU64::new(0);

pub fn inc_frames_received() {
    FRAMES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_frames_malformed() {
    FRAMES_MALFORMED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_handshake_retries() {
    HANDSHAKE_RETRIES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_handshake_failures() {
    HANDSHAKE_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_admin_sent() {
    ADMIN_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_admin_correlated() {
    ADMIN_CORRELATED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_connect_attempts() {
    CONNECT_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_connect_failures() {
    CONNECT_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_repository_rollbacks() {
    REPOSITORY_ROLLBACKS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub handshake_retries: u64,
    pub handshake_failures: u64,
    pub admin_sent: u64,
    pub admin_correlated: u64,
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub repository_rollbacks: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        frames_received: FRAMES_RECEIVED.load(Ordering::Relaxed),
        frames_malformed: FRAMES_MALFORMED.load(Ordering::Relaxed),
        handshake_retries: HANDSHAKE_RETRIES.load(Ordering::Relaxed),
        handshake_failures: HANDSHAKE_FAILURES.load(Ordering::Relaxed),
        admin_sent: ADMIN_SENT.load(Ordering::Relaxed),
        admin_correlated: ADMIN_CORRELATED.load(Ordering::Relaxed),
        connect_attempts: CONNECT_ATTEMPTS.load(Ordering::Relaxed),
        connect_failures: CONNECT_FAILURES.load(Ordering::Relaxed),
        repository_rollbacks: REPOSITORY_ROLLBACKS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and other tests bump them concurrently,
    // so only monotonic growth is asserted.
    #[test]
    fn counters_only_grow() {
        let before = snapshot();
        inc_frames_received();
        inc_admin_sent();
        let after = snapshot();
        assert!(after.frames_received > before.frames_received);
        assert!(after.admin_sent > before.admin_sent);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let json = serde_json::to_string(&snapshot()).unwrap();
        assert!(json.contains("\"frames_received\""));
    }
}
