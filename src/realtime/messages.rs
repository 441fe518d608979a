use serde::{Deserialize, Serialize};

/// Body returned by the session negotiation endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "sessionId", alias = "session_id", alias = "id")]
    pub session_id: String,
    /// Audio transport URL; derived from the endpoint when absent
    #[serde(default, alias = "websocket_url")]
    pub url: Option<String>,
}

/// Frames sent from client to service over the audio transport
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "input_audio_buffer.append")]
    AudioAppend {
        session_id: String,
        sequence: u64,
        audio: String, // Base64-encoded PCM16 LE bytes
        timestamp: String, // RFC3339 timestamp
    },
    #[serde(rename = "session.close")]
    SessionClose { session_id: String },
}

/// Frames received from the service
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session_id: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta { delta: String },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(other)]
    Unknown,
}

/// Chat message in the text fallback conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}
