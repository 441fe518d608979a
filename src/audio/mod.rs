pub mod backend;
pub mod chunk;
pub mod convert;
mod feed;
pub mod file;
pub mod synthetic;

pub use backend::{
    AudioFrame, CaptureDevice, CaptureSettings, Microphone, MicrophoneConstraints,
    MicrophoneFactory, MicrophoneSource,
};
pub use chunk::{AudioChunk, ChunkAccumulator, ChunkConfig};
pub use feed::FRAME_MS;
pub use file::{AudioFile, FileMicrophone};
pub use synthetic::SyntheticMicrophone;
