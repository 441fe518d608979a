use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::{DeviceError, StreamError};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let per_channel = self.samples.len() as u64 / self.channels as u64;
        per_channel * 1000 / self.sample_rate as u64
    }
}

/// Constraints requested when acquiring a microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Target sample rate (devices resample if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 16000, // 16kHz speech input
            channels: 1,        // Mono
        }
    }
}

/// Settings a device actually applied after acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

/// Capability to acquire a capture device
///
/// Acquiring is where permission prompts and device lookup happen, so this is
/// the step that fails with `DeviceError`.
#[async_trait]
pub trait Microphone: Send + Sync {
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError>;
}

/// An acquired microphone handle
#[async_trait]
pub trait CaptureDevice: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, StreamError>;

    /// Stop producing frames; the device stays acquired
    async fn stop(&mut self) -> Result<(), StreamError>;

    /// Release the device (the equivalent of stopping every track)
    async fn release(self: Box<Self>) -> Result<(), DeviceError>;

    /// Check if device is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get device name for logging
    fn name(&self) -> &str;

    fn settings(&self) -> CaptureSettings;
}

/// Microphone source type
#[derive(Debug, Clone)]
pub enum MicrophoneSource {
    /// Replay a WAV file in real time
    File(PathBuf),
    /// Generated sine tone
    Synthetic { frequency_hz: f32 },
}

/// Microphone factory
pub struct MicrophoneFactory;

impl MicrophoneFactory {
    pub fn create(source: MicrophoneSource) -> Box<dyn Microphone> {
        match source {
            MicrophoneSource::File(path) => Box::new(super::file::FileMicrophone::new(path)),
            MicrophoneSource::Synthetic { frequency_hz } => {
                Box::new(super::synthetic::SyntheticMicrophone::new(frequency_hz))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_default() {
        let constraints = MicrophoneConstraints::default();

        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert_eq!(constraints.sample_rate, 16000, "Default should be 16kHz");
        assert_eq!(constraints.channels, 1, "Default should be mono");
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        };
        assert_eq!(frame.duration_ms(), 100);

        let stereo = AudioFrame {
            samples: vec![0i16; 640],
            sample_rate: 16000,
            channels: 2,
            timestamp_ms: 0,
        };
        assert_eq!(stereo.duration_ms(), 20);
    }
}
