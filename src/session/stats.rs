use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about the current (or last) streaming run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// When streaming started
    pub started_at: Option<DateTime<Utc>>,

    /// Chunks cut from captured audio
    pub chunks_produced: u64,

    /// Chunks the session client accepted
    pub chunks_forwarded: u64,

    /// Chunks dropped because the send failed
    pub transport_failures: u64,

    /// Payload bytes accepted by the session client
    pub bytes_forwarded: u64,
}

/// Counters shared between the controller and its chunk tasks
#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    pub chunks_produced: AtomicU64,
    pub chunks_forwarded: AtomicU64,
    pub transport_failures: AtomicU64,
    pub bytes_forwarded: AtomicU64,
}

impl StreamCounters {
    pub fn snapshot(&self, started_at: Option<DateTime<Utc>>) -> StreamStats {
        StreamStats {
            started_at,
            chunks_produced: self.chunks_produced.load(Ordering::SeqCst),
            chunks_forwarded: self.chunks_forwarded.load(Ordering::SeqCst),
            transport_failures: self.transport_failures.load(Ordering::SeqCst),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::SeqCst),
        }
    }
}
