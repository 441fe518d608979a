//! Error taxonomy for the realtime session lifecycle
//!
//! - `DeviceError`: microphone unavailable or denied
//! - `StreamError`: capture could not start
//! - `SessionError`: remote session open/close failure
//! - `TransportError`: chunk send failure (never fatal to a stream)
//!
//! `ControllerError` is what `SessionController` transitions return and
//! `CleanupError` collects every failed step of a best-effort teardown.

use std::fmt;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("No capture device found: {0}")]
    NotFound(String),

    #[error("Capture device unsupported: {0}")]
    Unsupported(String),

    #[error("Failed to release capture device: {0}")]
    Release(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Capture already running on {0}")]
    AlreadyCapturing(String),

    #[error("Failed to start capture: {0}")]
    StartFailed(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to initialize realtime session: {status} {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Realtime service request failed: {0}")]
    Request(String),

    #[error("Invalid session response: {0}")]
    InvalidResponse(String),

    #[error("Failed to open audio transport: {0}")]
    Transport(String),

    #[error("Failed to close realtime session: {0}")]
    Close(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Session {0} is not open")]
    Closed(String),

    #[error("Send queue full, chunk {0} dropped")]
    Backpressure(u64),

    #[error("Failed to send audio chunk: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}

/// Teardown step that failed during best-effort cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    StopChunks,
    ReleaseDevice,
    CloseSession,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupStep::StopChunks => "stop chunk production",
            CleanupStep::ReleaseDevice => "release audio device",
            CleanupStep::CloseSession => "close session",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub step: CleanupStep,
    pub message: String,
}

/// All failures collected while tearing a session down
#[derive(Debug, Error)]
#[error("Cleanup finished with {} failed step(s): {}", .failures.len(), summarize(.failures))]
pub struct CleanupError {
    pub failures: Vec<CleanupFailure>,
}

impl CleanupError {
    pub fn failed(&self, step: CleanupStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }
}

fn summarize(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.step, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Failed to get response from AI: {0}")]
    Request(String),

    #[error("Failed to get response from AI: empty completion")]
    EmptyCompletion,
}
