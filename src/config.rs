use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::{ChunkConfig, MicrophoneConstraints};
use crate::realtime::SessionRequest;

pub const DEFAULT_ENDPOINT: &str = "https://aimcs-resource.cognitiveservices.azure.com";
pub const DEFAULT_API_KEY: &str = "your-api-key";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o-mini-realtime-preview";
pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

/// Environment prefix for nested overrides, e.g. `REALTIME_VOICE__AUDIO__SAMPLE_RATE`
const ENV_PREFIX: &str = "REALTIME_VOICE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub realtime: RealtimeConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Remote realtime service settings
#[derive(Clone, Deserialize)]
pub struct RealtimeConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub chunk_interval_ms: u64,
}

impl AudioConfig {
    pub fn constraints(&self) -> MicrophoneConstraints {
        MicrophoneConstraints {
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            interval: Duration::from_millis(self.chunk_interval_ms),
        }
    }

    pub fn session_request(&self) -> SessionRequest {
        SessionRequest {
            audio_format: self.format.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Layers, lowest precedence first: built-in defaults, the optional config
    /// file at `path`, `REALTIME_VOICE__*` variables, then the
    /// `AZURE_OPENAI_ENDPOINT` / `AZURE_OPENAI_API_KEY` /
    /// `AZURE_OPENAI_DEPLOYMENT` credentials.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("realtime.endpoint", std::env::var("AZURE_OPENAI_ENDPOINT").ok())?
            .set_override_option("realtime.api_key", std::env::var("AZURE_OPENAI_API_KEY").ok())?
            .set_override_option(
                "realtime.deployment",
                std::env::var("AZURE_OPENAI_DEPLOYMENT").ok(),
            )?
            .build()
            .context("Failed to build configuration")?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if cfg.audio.chunk_interval_ms == 0 {
            anyhow::bail!("audio.chunk_interval_ms must be greater than zero");
        }

        if cfg.realtime.api_key == DEFAULT_API_KEY {
            tracing::warn!("Using placeholder API key; set AZURE_OPENAI_API_KEY");
        }

        Ok(cfg)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "realtime-voice")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8089)?
            .set_default("realtime.endpoint", DEFAULT_ENDPOINT)?
            .set_default("realtime.api_key", DEFAULT_API_KEY)?
            .set_default("realtime.deployment", DEFAULT_DEPLOYMENT)?
            .set_default("realtime.api_version", DEFAULT_API_VERSION)?
            .set_default("audio.format", "pcm16")?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.channels", 1)?
            .set_default("audio.echo_cancellation", true)?
            .set_default("audio.noise_suppression", true)?
            .set_default("audio.chunk_interval_ms", 100)?)
    }
}
