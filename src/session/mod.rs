//! Realtime voice session lifecycle
//!
//! `SessionController` owns the microphone handle and the remote session and
//! drives them through:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Streaming -> Closing -> Disconnected
//!                                  (any failure) -> Closing -> Failed
//! ```

mod config;
mod controller;
mod observer;
mod state;
mod stats;

pub use config::ControllerConfig;
pub use controller::SessionController;
pub use observer::{SessionEvent, SessionObserver, TracingObserver};
pub use state::SessionState;
pub use stats::StreamStats;
