// Sine-tone microphone for demos and tests

use async_trait::async_trait;
use std::f32::consts::TAU;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioFrame, CaptureDevice, CaptureSettings, Microphone, MicrophoneConstraints};
use super::feed::{RealtimeFeed, FRAME_MS};
use crate::error::{DeviceError, StreamError};

const AMPLITUDE: f32 = 0.2;

pub struct SyntheticMicrophone {
    frequency_hz: f32,
}

impl SyntheticMicrophone {
    pub fn new(frequency_hz: f32) -> Self {
        Self { frequency_hz }
    }
}

impl Default for SyntheticMicrophone {
    fn default() -> Self {
        Self::new(440.0)
    }
}

#[async_trait]
impl Microphone for SyntheticMicrophone {
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        if constraints.sample_rate == 0 || constraints.channels == 0 {
            return Err(DeviceError::Unsupported(format!(
                "{}Hz, {} channels",
                constraints.sample_rate, constraints.channels
            )));
        }

        Ok(Box::new(SyntheticCaptureDevice {
            name: format!("synthetic:{}Hz", self.frequency_hz),
            frequency_hz: self.frequency_hz,
            constraints: constraints.clone(),
            feed: RealtimeFeed::default(),
        }))
    }
}

struct SyntheticCaptureDevice {
    name: String,
    frequency_hz: f32,
    constraints: MicrophoneConstraints,
    feed: RealtimeFeed,
}

#[async_trait]
impl CaptureDevice for SyntheticCaptureDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, StreamError> {
        info!("Starting synthetic capture: {}", self.name);

        let sample_rate = self.constraints.sample_rate;
        let channels = self.constraints.channels;
        let frequency = self.frequency_hz;
        let frames_per_tick = (sample_rate as u64 * FRAME_MS / 1000) as usize;

        self.feed.start(&self.name, move |index| {
            let offset = index as usize * frames_per_tick;
            let mut samples = Vec::with_capacity(frames_per_tick * channels as usize);

            for n in offset..offset + frames_per_tick {
                let t = n as f32 / sample_rate as f32;
                let value = ((TAU * frequency * t).sin() * AMPLITUDE * i16::MAX as f32) as i16;
                samples.extend(std::iter::repeat(value).take(channels as usize));
            }

            Some(AudioFrame {
                samples,
                sample_rate,
                channels,
                timestamp_ms: index * FRAME_MS,
            })
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
