//! HTTP control API standing in for the voice chat UI
//!
//! - GET /session/status - State, status text, error banner and stream stats
//! - POST /session/start - Connect (if needed) and start streaming
//! - POST /session/stop - End the conversation
//! - POST /session/toggle - Start when idle, stop otherwise
//! - POST /chat - Text message fallback
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ChatRequest, ChatResponse, ErrorResponse, StatusResponse};
pub use routes::create_router;
pub use state::AppState;
