use std::time::Duration;

use super::backend::AudioFrame;
use super::convert::pcm16_le_bytes;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// How often a chunk is cut from the captured audio (default: 100ms)
    pub interval: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// A time-boxed slice of captured audio
///
/// Moved into the session client when forwarded; nothing keeps a copy.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioChunk {
    /// Chunk number within a streaming run (0-indexed)
    pub sequence: u64,
    /// PCM16 little-endian bytes
    pub payload: Vec<u8>,
    /// Timestamp of the first frame, in milliseconds since capture started
    pub start_ms: u64,
    /// Audio duration covered by the payload
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Collects frames between ticks and cuts them into numbered chunks
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    samples: Vec<i16>,
    start_ms: Option<u64>,
    sample_rate: u32,
    channels: u16,
    next_sequence: u64,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: AudioFrame) {
        if self.start_ms.is_none() {
            self.start_ms = Some(frame.timestamp_ms);
        }
        self.sample_rate = frame.sample_rate;
        self.channels = frame.channels;
        self.samples.extend_from_slice(&frame.samples);
    }

    /// Cut everything buffered so far into a chunk
    ///
    /// Returns `None` when nothing was captured since the last cut, so empty
    /// intervals never consume a sequence number.
    pub fn take_chunk(&mut self) -> Option<AudioChunk> {
        if self.samples.is_empty() {
            return None;
        }

        let samples = std::mem::take(&mut self.samples);
        let start_ms = self.start_ms.take().unwrap_or_default();
        let per_channel = samples.len() as u64 / self.channels.max(1) as u64;
        let duration_ms = if self.sample_rate == 0 {
            0
        } else {
            per_channel * 1000 / self.sample_rate as u64
        };

        let chunk = AudioChunk {
            sequence: self.next_sequence,
            payload: pcm16_le_bytes(&samples),
            start_ms,
            duration_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
        };
        self.next_sequence += 1;

        Some(chunk)
    }

    /// Number of chunks cut so far
    pub fn chunks_cut(&self) -> u64 {
        self.next_sequence
    }

    pub fn buffered_samples(&self) -> usize {
        self.samples.len()
    }
}
