use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureDevice, CaptureSettings, Microphone, MicrophoneConstraints};
use super::convert::conform_frame;
use super::feed::{RealtimeFeed, FRAME_MS};
use crate::error::{DeviceError, StreamError};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            anyhow::bail!(
                "Unsupported WAV format: {}-bit {:?} (expected 16-bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Samples making up one capture frame at the file's native format
    fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.channels as u64 * FRAME_MS / 1000) as usize
    }
}

/// Microphone that replays a WAV file at real-time speed
pub struct FileMicrophone {
    path: PathBuf,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Microphone for FileMicrophone {
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::NotFound(self.path.display().to_string()));
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| DeviceError::Unsupported(e.to_string()))?
            .map_err(|e| DeviceError::Unsupported(format!("{:#}", e)))?;

        if constraints.echo_cancellation || constraints.noise_suppression {
            warn!("File capture ignores echo cancellation and noise suppression");
        }

        Ok(Box::new(FileCaptureDevice {
            name: format!("file:{}", self.path.display()),
            audio: Arc::new(audio),
            constraints: constraints.clone(),
            feed: RealtimeFeed::default(),
        }))
    }
}

struct FileCaptureDevice {
    name: String,
    audio: Arc<AudioFile>,
    constraints: MicrophoneConstraints,
    feed: RealtimeFeed,
}

#[async_trait]
impl CaptureDevice for FileCaptureDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, StreamError> {
        let frame_len = self.audio.samples_per_frame();
        if frame_len == 0 {
            return Err(StreamError::StartFailed(format!(
                "{} has no playable audio",
                self.name
            )));
        }

        info!("Starting file capture: {}", self.name);

        let audio = Arc::clone(&self.audio);
        let target_rate = self.constraints.sample_rate;
        let target_channels = self.constraints.channels;

        self.feed.start(&self.name, move |index| {
            let start = index as usize * frame_len;
            if start >= audio.samples.len() {
                return None;
            }
            let end = (start + frame_len).min(audio.samples.len());

            let frame = AudioFrame {
                samples: audio.samples[start..end].to_vec(),
                sample_rate: audio.sample_rate,
                channels: audio.channels,
                timestamp_ms: index * FRAME_MS,
            };
            Some(conform_frame(frame, target_rate, target_channels))
        })
    }

    async fn stop(&mut self) -> Result<(), StreamError> {
        self.feed.stop().await;
        Ok(())
    }

    async fn release(mut self: Box<Self>) -> Result<(), DeviceError> {
        self.feed.stop().await;
        info!("Released capture device: {}", self.name);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.feed.is_running()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> CaptureSettings {
        CaptureSettings {
            sample_rate: self.constraints.sample_rate,
            channels: self.constraints.channels,
            echo_cancellation: false,
            noise_suppression: false,
        }
    }
}
