use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::client::{RealtimeSessionClient, Session, SessionRequest};
use super::messages::{ClientEvent, ServerEvent, SessionResponse};
use crate::audio::AudioChunk;
use crate::config::RealtimeConfig;
use crate::error::{SessionError, TransportError};

/// Chunks queued per session before sends start failing with back-pressure
const SEND_QUEUE_CAPACITY: usize = 32;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open audio transport for one session
struct AudioLink {
    tx: mpsc::Sender<ClientEvent>,
    task: JoinHandle<()>,
}

/// Realtime client that negotiates sessions over HTTPS and streams chunks
/// over a WebSocket
pub struct HttpRealtimeClient {
    http: reqwest::Client,
    config: RealtimeConfig,
    links: Mutex<HashMap<String, AudioLink>>,
    close_timeout: Duration,
}

impl HttpRealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            links: Mutex::new(HashMap::new()),
            close_timeout: CLOSE_TIMEOUT,
        }
    }

    /// Bound on delivering `session.close` and joining the transport task
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    fn session_url(&self) -> Result<Url, SessionError> {
        let base = self.config.endpoint.trim_end_matches('/');
        Url::parse_with_params(
            &format!("{}/openai/realtime", base),
            &[
                ("api-version", self.config.api_version.as_str()),
                ("deployment", self.config.deployment.as_str()),
            ],
        )
        .map_err(|e| SessionError::Request(format!("Invalid endpoint: {}", e)))
    }

    /// Transport URL used when the service does not name one
    fn default_transport_url(&self, session_id: &str) -> Result<String, SessionError> {
        let mut url = self.session_url()?;
        let scheme = match url.scheme() {
            "http" => "ws",
            _ => "wss",
        };
        url.set_scheme(scheme)
            .map_err(|_| SessionError::Transport(format!("Cannot derive transport URL from {}", url)))?;
        url.query_pairs_mut().append_pair("session", session_id);
        Ok(url.to_string())
    }

    async fn open_link(&self, url: &str, session_id: &str) -> Result<AudioLink, SessionError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|e| SessionError::Transport(format!("Invalid API key header: {}", e)))?;
        request.headers_mut().insert("api-key", api_key);

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        info!("Audio transport connected for session {}", session_id);

        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(SEND_QUEUE_CAPACITY);
        let session_id = session_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        let closing = matches!(event, ClientEvent::SessionClose { .. });

                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize client event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(json.into())).await {
                            error!("Failed to send to realtime service: {}", e);
                            break;
                        }

                        if closing {
                            if let Err(e) = sink.send(Message::Close(None)).await {
                                debug!("Close frame not delivered: {}", e);
                            }
                            break;
                        }
                    }

                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => handle_server_text(&session_id, &text),
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Audio transport closed by service ({})", session_id);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("Audio transport error ({}): {}", session_id, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }

            debug!("Audio transport task finished ({})", session_id);
        });

        Ok(AudioLink { tx, task })
    }
}

fn handle_server_text(session_id: &str, text: &str) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(ServerEvent::SessionCreated { session_id: remote_id }) => {
            debug!("Service confirmed session {}", remote_id)
        }
        Ok(ServerEvent::SpeechStarted) => debug!("Speech started ({})", session_id),
        Ok(ServerEvent::SpeechStopped) => debug!("Speech stopped ({})", session_id),
        Ok(ServerEvent::TranscriptDelta { delta }) => info!("Assistant: {}", delta),
        Ok(ServerEvent::Error { message }) => warn!("Realtime service error ({}): {}", session_id, message),
        Ok(ServerEvent::Unknown) => debug!("Ignoring server event: {}", text),
        Err(e) => warn!("Failed to parse server event: {} - {}", e, text),
    }
}

#[async_trait]
impl RealtimeSessionClient for HttpRealtimeClient {
    async fn open_session(&self, request: &SessionRequest) -> Result<Session, SessionError> {
        let url = self.session_url()?;
        info!("Initializing realtime session at {}", url.path());

        let response = self
            .http
            .post(url)
            .header("api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;

        let transport_url = match body.url {
            Some(url) => url,
            None => self.default_transport_url(&body.session_id)?,
        };

        let link = match self.open_link(&transport_url, &body.session_id).await {
            Ok(link) => link,
            Err(e) => {
                warn!(
                    "Audio transport failed; session {} left open on the service",
                    body.session_id
                );
                return Err(e);
            }
        };
        self.links.lock().await.insert(body.session_id.clone(), link);

        info!("Realtime session {} opened", body.session_id);

        Ok(Session {
            id: body.session_id,
            transport_url,
            deployment: self.config.deployment.clone(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn send_chunk(&self, session: &Session, chunk: AudioChunk) -> Result<(), TransportError> {
        let sequence = chunk.sequence;
        let event = ClientEvent::AudioAppend {
            session_id: session.id.clone(),
            sequence,
            audio: base64::engine::general_purpose::STANDARD.encode(&chunk.payload),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let links = self.links.lock().await;
        let link = links
            .get(&session.id)
            .ok_or_else(|| TransportError::Closed(session.id.clone()))?;

        link.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure(sequence),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(session.id.clone()),
        })?;

        debug!("Queued audio chunk {} ({} bytes)", sequence, chunk.payload.len());
        Ok(())
    }

    async fn close_session(&self, session: &Session) -> Result<(), SessionError> {
        let link = self.links.lock().await.remove(&session.id);
        let Some(AudioLink { tx, mut task }) = link else {
            debug!("Session {} already closed", session.id);
            return Ok(());
        };

        info!("Closing realtime session {}", session.id);

        // The close frame queues behind pending chunks, so a peer that stopped
        // reading blocks the send as well as the join
        let close = async {
            // A send error means the transport already went away
            let _ = tx
                .send(ClientEvent::SessionClose {
                    session_id: session.id.clone(),
                })
                .await;
            drop(tx);
            (&mut task).await
        };

        match tokio::time::timeout(self.close_timeout, close).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Close(format!("transport task failed: {}", e))),
            Err(_) => {
                task.abort();
                warn!("Transport for session {} did not close; aborted", session.id);
                Err(SessionError::Close(format!(
                    "timed out after {:?} waiting for transport to close",
                    self.close_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> HttpRealtimeClient {
        HttpRealtimeClient::new(RealtimeConfig {
            endpoint: endpoint.to_string(),
            ..RealtimeConfig::default()
        })
    }

    #[test]
    fn test_session_url_carries_version_and_deployment() {
        let url = client("https://example.test/").session_url().unwrap();
        assert_eq!(url.path(), "/openai/realtime");
        assert_eq!(
            url.query(),
            Some("api-version=2024-10-01-preview&deployment=gpt-4o-mini-realtime-preview")
        );
    }

    #[test]
    fn test_default_transport_url_switches_scheme() {
        let secure = client("https://example.test").default_transport_url("abc").unwrap();
        assert!(secure.starts_with("wss://example.test/openai/realtime?"));
        assert!(secure.ends_with("&session=abc"));

        let plain = client("http://127.0.0.1:9000").default_transport_url("abc").unwrap();
        assert!(plain.starts_with("ws://127.0.0.1:9000/"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_session_is_closed_error() {
        let client = client("http://127.0.0.1:9");
        let session = Session {
            id: "missing".to_string(),
            transport_url: String::new(),
            deployment: String::new(),
            created_at: chrono::Utc::now(),
        };
        let chunk = AudioChunk {
            sequence: 3,
            payload: vec![0; 4],
            start_ms: 0,
            duration_ms: 0,
            sample_rate: 16000,
            channels: 1,
        };

        let err = client.send_chunk(&session, chunk).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(id) if id == "missing"));

        // unknown sessions close cleanly
        client.close_session(&session).await.unwrap();
    }
}
