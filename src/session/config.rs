use crate::audio::{ChunkConfig, MicrophoneConstraints};
use crate::config::AudioConfig;
use crate::realtime::SessionRequest;

/// Configuration for a session controller
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Constraints requested from the microphone
    /// Default: echo cancellation + noise suppression, 16kHz mono
    pub constraints: MicrophoneConstraints,

    /// Chunk cadence (default: 100ms)
    pub chunk: ChunkConfig,

    /// Audio metadata sent when opening a session
    pub session: SessionRequest,
}

impl From<&AudioConfig> for ControllerConfig {
    fn from(audio: &AudioConfig) -> Self {
        Self {
            constraints: audio.constraints(),
            chunk: audio.chunk_config(),
            session: audio.session_request(),
        }
    }
}
