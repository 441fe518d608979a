//! Text conversation fallback over the chat completions API

use reqwest::Url;
use tracing::{error, info};

use crate::config::RealtimeConfig;
use crate::error::ChatError;
use crate::realtime::messages::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Respond concisely and helpfully.";
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

pub struct ChatClient {
    http: reqwest::Client,
    config: RealtimeConfig,
}

impl ChatClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> Result<Url, ChatError> {
        let base = self.config.endpoint.trim_end_matches('/');
        Url::parse_with_params(
            &format!(
                "{}/openai/deployments/{}/chat/completions",
                base, self.config.deployment
            ),
            &[("api-version", self.config.api_version.as_str())],
        )
        .map_err(|e| ChatError::Request(format!("Invalid endpoint: {}", e)))
    }

    /// Build the message list sent for one turn
    pub fn build_request(message: &str, history: &[ChatMessage]) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(message));

        ChatCompletionRequest {
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            stream: false,
        }
    }

    /// Send one user message with the conversation so far and return the reply
    pub async fn send_text_message(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String, ChatError> {
        let url = self.completions_url()?;
        let request = Self::build_request(message, history);

        info!("Sending text message ({} history turns)", history.len());

        let response = self
            .http
            .post(url)
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat request failed: {}", e);
                ChatError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Chat request rejected: {}", status);
            return Err(ChatError::Request(status.to_string()));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ChatError::EmptyCompletion)
    }
}
