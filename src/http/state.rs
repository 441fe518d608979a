use super::handlers::StatusResponse;
use crate::chat::ChatClient;
use crate::session::{SessionController, SessionState};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one voice session this service drives
    ///
    /// Held for the whole of a transition; status reads never take it.
    pub controller: Arc<Mutex<SessionController>>,

    /// Live lifecycle state, updated by the controller mid-transition
    pub state: watch::Receiver<SessionState>,

    /// Details (error, session, stats) as of the last completed transition
    pub snapshot: Arc<watch::Sender<StatusResponse>>,

    /// Text fallback client
    pub chat: Arc<ChatClient>,
}

impl AppState {
    pub fn new(controller: SessionController, chat: ChatClient) -> Self {
        let state = controller.subscribe();
        let (snapshot, _) = watch::channel(StatusResponse::from_controller(&controller));

        Self {
            controller: Arc::new(Mutex::new(controller)),
            state,
            snapshot: Arc::new(snapshot),
            chat: Arc::new(chat),
        }
    }
}
