use super::state::AppState;
use crate::error::ControllerError;
use crate::realtime::ChatMessage;
use crate::session::{SessionController, SessionState, StreamStats};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: SessionState,
    /// Status line for display
    pub status: String,
    /// Error banner text, if the last operation failed
    pub error: Option<String>,
    pub session_id: Option<String>,
    pub stats: StreamStats,
}

impl StatusResponse {
    pub(crate) fn from_controller(controller: &SessionController) -> Self {
        Self {
            state: controller.state(),
            status: controller.status_text().to_string(),
            error: controller.last_error().map(str::to_string),
            session_id: controller.session().map(|s| s.id.clone()),
            stats: controller.stats(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn controller_error_status(err: &ControllerError) -> StatusCode {
    match err {
        ControllerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ControllerError::Session(_) => StatusCode::BAD_GATEWAY,
        ControllerError::Device(_) | ControllerError::Stream(_) | ControllerError::Cleanup(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session/status
/// Answers immediately, even while a transition holds the controller
pub async fn get_session_status(State(state): State<AppState>) -> impl IntoResponse {
    let current = *state.state.borrow();

    let mut status = match state.controller.try_lock() {
        Ok(controller) => {
            let fresh = StatusResponse::from_controller(&controller);
            state.snapshot.send_replace(fresh.clone());
            fresh
        }
        Err(_) => state.snapshot.borrow().clone(),
    };
    status.state = current;
    status.status = current.status_text().to_string();

    (StatusCode::OK, Json(status))
}

/// POST /session/start
/// Connect if needed and start streaming microphone audio
pub async fn start_session(State(state): State<AppState>) -> Response {
    run_transition(state, Transition::Start).await
}

/// POST /session/stop
pub async fn stop_session(State(state): State<AppState>) -> Response {
    run_transition(state, Transition::Stop).await
}

/// POST /session/toggle
/// The single start/stop control
pub async fn toggle_session(State(state): State<AppState>) -> Response {
    run_transition(state, Transition::Toggle).await
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Start,
    Stop,
    Toggle,
}

/// Run a transition on its own task so a dropped request cannot cancel it
/// half way; the task owns the controller lock until the transition settles
async fn run_transition(state: AppState, transition: Transition) -> Response {
    let task = tokio::spawn(async move {
        let mut controller = Arc::clone(&state.controller).lock_owned().await;

        let response = match transition {
            Transition::Start => start(&mut controller).await,
            Transition::Stop => stop(&mut controller).await,
            Transition::Toggle => match controller.state() {
                SessionState::Disconnected | SessionState::Failed => start(&mut controller).await,
                _ => stop(&mut controller).await,
            },
        };

        state
            .snapshot
            .send_replace(StatusResponse::from_controller(&controller));
        response
    });

    match task.await {
        Ok(response) => response,
        Err(e) => {
            error!("Session transition task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Session task failed: {}", e))
        }
    }
}

async fn start(controller: &mut SessionController) -> Response {
    info!("Starting conversation");

    match controller.start().await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::from_controller(controller))).into_response(),
        Err(e) => {
            error!("Failed to start conversation: {}", e);
            error_response(controller_error_status(&e), format!("Failed to start conversation: {}", e))
        }
    }
}

async fn stop(controller: &mut SessionController) -> Response {
    info!("Stopping conversation");

    match controller.stop().await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::from_controller(controller))).into_response(),
        Err(e) => {
            // The session is down either way; report what could not be released
            error!("Error stopping conversation: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// POST /chat
/// Text conversation fallback
pub async fn send_chat_message(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    match state.chat.send_text_message(&req.message, &req.history).await {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse { reply })).into_response(),
        Err(e) => {
            error!("Chat request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
