use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioChunk;
use crate::error::{SessionError, TransportError};

/// Parameters sent when negotiating a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub audio_format: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            audio_format: "pcm16".to_string(),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// A negotiated context with the remote inference service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Where audio chunks for this session are sent
    pub transport_url: String,
    /// Model deployment serving the session
    pub deployment: String,
    pub created_at: DateTime<Utc>,
}

/// Remote realtime service as seen by the session controller
#[async_trait]
pub trait RealtimeSessionClient: Send + Sync {
    async fn open_session(&self, request: &SessionRequest) -> Result<Session, SessionError>;

    /// Relay one chunk. The controller spawns this call and never waits on it.
    async fn send_chunk(&self, session: &Session, chunk: AudioChunk) -> Result<(), TransportError>;

    /// Close a session. Closing an already closed or unknown session is Ok.
    async fn close_session(&self, session: &Session) -> Result<(), SessionError>;
}
