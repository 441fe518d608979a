// In-process stand-in for the remote realtime service

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Recorded {
    pub session_requests: Vec<Value>,
    pub api_keys: Vec<String>,
    pub audio_frames: Vec<Value>,
    pub chat_requests: Vec<Value>,
    pub chat_deployments: Vec<String>,
}

#[derive(Clone)]
struct ServiceState {
    reject_with: Option<StatusCode>,
    /// Accept the audio socket but never read from it
    stall_audio: bool,
    recorded: Arc<Mutex<Recorded>>,
}

pub struct FakeService {
    pub url: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeService {
    pub async fn start() -> Self {
        Self::spawn(None, false).await
    }

    /// A service that answers every session request with `status`
    pub async fn rejecting(status: StatusCode) -> Self {
        Self::spawn(Some(status), false).await
    }

    /// A service whose audio socket stops reading once upgraded
    pub async fn stalled() -> Self {
        Self::spawn(None, true).await
    }

    async fn spawn(reject_with: Option<StatusCode>, stall_audio: bool) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = ServiceState {
            reject_with,
            stall_audio,
            recorded: Arc::clone(&recorded),
        };

        let app = Router::new()
            .route("/openai/realtime", post(open_session).get(audio_socket))
            .route(
                "/openai/deployments/:deployment/chat/completions",
                post(chat_completions),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake service");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake service");
        });

        Self {
            url: format!("http://{}", addr),
            recorded,
        }
    }

    /// Wait until at least `count` audio transport frames arrived
    pub async fn wait_for_frames(&self, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            {
                let recorded = self.recorded.lock().unwrap();
                if recorded.audio_frames.len() >= count {
                    return recorded.audio_frames.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.recorded.lock().unwrap().audio_frames.clone()
    }
}

async fn open_session(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    {
        let mut recorded = state.recorded.lock().unwrap();
        recorded.session_requests.push(body);
        if let Some(key) = headers.get("api-key").and_then(|v| v.to_str().ok()) {
            recorded.api_keys.push(key.to_string());
        }
    }

    if let Some(status) = state.reject_with {
        return status.into_response();
    }

    Json(json!({ "sessionId": "sess-1" })).into_response()
}

async fn audio_socket(ws: WebSocketUpgrade, State(state): State<ServiceState>) -> Response {
    ws.on_upgrade(move |socket| record_audio(socket, state))
}

async fn record_audio(mut socket: WebSocket, state: ServiceState) {
    if state.stall_audio {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        drop(socket);
        return;
    }

    let hello = json!({ "type": "session.created", "session_id": "sess-1" }).to_string();
    if socket.send(Message::Text(hello)).await.is_err() {
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    state.recorded.lock().unwrap().audio_frames.push(value);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn chat_completions(
    State(state): State<ServiceState>,
    Path(deployment): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    {
        let mut recorded = state.recorded.lock().unwrap();
        recorded.chat_requests.push(body);
        recorded.chat_deployments.push(deployment);
    }

    if let Some(status) = state.reject_with {
        return status.into_response();
    }

    Json(json!({
        "choices": [
            { "message": { "role": "assistant", "content": "Hi there!" } }
        ]
    }))
    .into_response()
}
