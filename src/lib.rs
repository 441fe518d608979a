pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod realtime;
pub mod session;

pub use audio::{
    AudioChunk, AudioFile, AudioFrame, CaptureDevice, ChunkConfig, FileMicrophone, Microphone,
    MicrophoneConstraints, MicrophoneFactory, MicrophoneSource, SyntheticMicrophone,
};
pub use chat::ChatClient;
pub use config::Config;
pub use error::{
    ChatError, CleanupError, ControllerError, DeviceError, SessionError, StreamError,
    TransportError,
};
pub use http::{create_router, AppState};
pub use realtime::{HttpRealtimeClient, RealtimeSessionClient, Session, SessionRequest};
pub use session::{
    ControllerConfig, SessionController, SessionEvent, SessionObserver, SessionState,
    StreamStats, TracingObserver,
};
