use tracing::{debug, error, info, warn};

use super::state::SessionState;
use crate::error::CleanupFailure;

/// Lifecycle events reported by a `SessionController`
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ChunkForwarded {
        sequence: u64,
        bytes: usize,
    },
    TransportFailed {
        sequence: u64,
        error: String,
    },
    CleanupFailed(CleanupFailure),
    /// The capture device stopped producing frames on its own
    CaptureEnded,
}

/// Observability hook for session lifecycle events
///
/// Called from the controller and from chunk tasks, so implementations must
/// be cheap and must not block.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Default observer that logs events through `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { from, to } => {
                info!("Session state: {} -> {} ({})", from, to, to.status_text())
            }
            SessionEvent::ChunkForwarded { sequence, bytes } => {
                debug!("Sent audio chunk {} ({} bytes)", sequence, bytes)
            }
            SessionEvent::TransportFailed { sequence, error } => {
                warn!("Dropped audio chunk {}: {}", sequence, error)
            }
            SessionEvent::CleanupFailed(failure) => {
                error!("Cleanup step '{}' failed: {}", failure.step, failure.message)
            }
            SessionEvent::CaptureEnded => warn!("Audio capture ended"),
        }
    }
}
