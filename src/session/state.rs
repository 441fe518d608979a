use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a realtime voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Closing,
    /// Terminal until `stop()` or `reset()`
    Failed,
}

impl SessionState {
    /// Status line shown to the user
    pub fn status_text(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Ready to connect",
            SessionState::Connecting => "Connecting to realtime service...",
            SessionState::Connected => "Connected to realtime service",
            SessionState::Streaming => "Listening... Speak now!",
            SessionState::Closing => "Ending conversation...",
            SessionState::Failed => "Connection failed",
        }
    }

    /// Whether the controller may be holding a device or session
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Disconnected
    }
}
