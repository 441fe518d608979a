use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::ControllerConfig;
use super::observer::{SessionEvent, SessionObserver, TracingObserver};
use super::state::SessionState;
use super::stats::{StreamCounters, StreamStats};
use crate::audio::{AudioChunk, AudioFrame, CaptureDevice, ChunkAccumulator, Microphone};
use crate::error::{CleanupError, CleanupFailure, CleanupStep, ControllerError, StreamError};
use crate::realtime::{RealtimeSessionClient, Session};

/// Drives one realtime voice session: microphone, remote session, chunk stream
///
/// Transitions take `&mut self`, so only one of `connect`, `start_streaming`
/// and `stop` can be in flight at a time. Every exit path (stop, failure,
/// drop) releases the device and closes the session best-effort.
pub struct SessionController {
    id: Uuid,
    config: ControllerConfig,
    microphone: Arc<dyn Microphone>,
    client: Arc<dyn RealtimeSessionClient>,
    observer: Arc<dyn SessionObserver>,
    state_tx: watch::Sender<SessionState>,
    device: Option<Box<dyn CaptureDevice>>,
    session: Option<Arc<Session>>,
    chunk_task: Option<ChunkTask>,
    /// Set once teardown begins; chunk tasks stop forwarding when they see it
    closing: Arc<AtomicBool>,
    counters: Arc<StreamCounters>,
    streaming_started_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

struct ChunkTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SessionController {
    pub fn new(
        config: ControllerConfig,
        microphone: Arc<dyn Microphone>,
        client: Arc<dyn RealtimeSessionClient>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);

        Self {
            id: Uuid::new_v4(),
            config,
            microphone,
            client,
            observer: Arc::new(TracingObserver),
            state_tx,
            device: None,
            session: None,
            chunk_task: None,
            closing: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(StreamCounters::default()),
            streaming_started_at: None,
            last_error: None,
        }
    }

    /// Replace the default `tracing` observer
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch state changes (e.g. to re-render a status indicator)
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn status_text(&self) -> &'static str {
        self.state().status_text()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    /// Message of the most recent failure, cleared by the next `connect()`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn holds_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot(self.streaming_started_at)
    }

    /// Acquire the microphone and open a remote session
    pub async fn connect(&mut self) -> Result<(), ControllerError> {
        let state = self.state();
        if state != SessionState::Disconnected {
            return Err(ControllerError::InvalidTransition {
                operation: "connect",
                state,
            });
        }

        self.closing.store(false, Ordering::SeqCst);
        self.last_error = None;
        self.set_state(SessionState::Connecting);

        info!("[{}] Initializing audio", self.id);
        let device = match self.microphone.acquire(&self.config.constraints).await {
            Ok(device) => device,
            Err(e) => return Err(self.abort_connect(e.into()).await),
        };
        info!("[{}] Acquired capture device {}", self.id, device.name());
        self.device = Some(device);

        info!("[{}] Opening realtime session", self.id);
        let session = match self.client.open_session(&self.config.session).await {
            Ok(session) => session,
            Err(e) => return Err(self.abort_connect(e.into()).await),
        };
        info!("[{}] Session {} ready", self.id, session.id);
        self.session = Some(Arc::new(session));

        self.set_state(SessionState::Connected);
        Ok(())
    }

    /// Start capture and forward a chunk to the session every chunk interval
    pub async fn start_streaming(&mut self) -> Result<(), ControllerError> {
        let state = self.state();
        if state != SessionState::Connected {
            return Err(ControllerError::InvalidTransition {
                operation: "start streaming",
                state,
            });
        }

        if self.config.chunk.interval.is_zero() {
            let err = StreamError::StartFailed("chunk interval must be greater than zero".to_string());
            return Err(self.fail(err.into()).await);
        }

        let Some(session) = self.session.clone() else {
            let err = StreamError::StartFailed("no active session".to_string());
            return Err(self.fail(err.into()).await);
        };

        let started = match self.device.as_mut() {
            Some(device) => device.start().await,
            None => Err(StreamError::StartFailed("no acquired microphone".to_string())),
        };
        let frames = match started {
            Ok(frames) => frames,
            Err(e) => return Err(self.fail(e.into()).await),
        };

        self.counters = Arc::new(StreamCounters::default());
        self.streaming_started_at = Some(Utc::now());
        self.set_state(SessionState::Streaming);

        let (shutdown, shutdown_rx) = oneshot::channel();
        let chunk_loop = ChunkLoop {
            frames,
            session,
            client: Arc::clone(&self.client),
            observer: Arc::clone(&self.observer),
            closing: Arc::clone(&self.closing),
            counters: Arc::clone(&self.counters),
            interval: self.config.chunk.interval,
        };
        let handle = tokio::spawn(chunk_loop.run(shutdown_rx));
        self.chunk_task = Some(ChunkTask { shutdown, handle });

        info!(
            "[{}] Streaming {}ms chunks",
            self.id,
            self.config.chunk.interval.as_millis()
        );
        Ok(())
    }

    /// Connect if needed, then start streaming (the "start conversation" toggle)
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        if self.state() == SessionState::Failed {
            self.reset().await?;
        }
        if self.state() == SessionState::Disconnected {
            self.connect().await?;
        }
        self.start_streaming().await
    }

    /// Stop streaming, release the microphone and close the session
    ///
    /// Every step runs even if an earlier one fails; failures are returned
    /// together afterwards and the controller always ends up Disconnected.
    /// Calling this while already Disconnected is a no-op.
    pub async fn stop(&mut self) -> Result<(), CleanupError> {
        if self.state() == SessionState::Disconnected {
            debug!("[{}] Stop requested while disconnected", self.id);
            return Ok(());
        }

        info!("[{}] Ending conversation", self.id);
        self.teardown(SessionState::Disconnected).await
    }

    /// Leave the Failed state
    pub async fn reset(&mut self) -> Result<(), CleanupError> {
        self.stop().await
    }

    fn set_state(&self, to: SessionState) {
        let from = self.state_tx.send_replace(to);
        if from != to {
            self.observer.on_event(&SessionEvent::StateChanged { from, to });
        }
    }

    async fn abort_connect(&mut self, error: ControllerError) -> ControllerError {
        error!("[{}] Connection failed: {}", self.id, error);
        self.last_error = Some(error.to_string());
        if let Err(cleanup) = self.teardown(SessionState::Disconnected).await {
            warn!("[{}] {}", self.id, cleanup);
        }
        error
    }

    async fn fail(&mut self, error: ControllerError) -> ControllerError {
        error!("[{}] Session failed: {}", self.id, error);
        self.last_error = Some(error.to_string());
        if let Err(cleanup) = self.teardown(SessionState::Failed).await {
            warn!("[{}] {}", self.id, cleanup);
        }
        error
    }

    async fn teardown(&mut self, settle: SessionState) -> Result<(), CleanupError> {
        self.set_state(SessionState::Closing);
        self.closing.store(true, Ordering::SeqCst);

        let mut failures = Vec::new();

        if let Some(task) = self.chunk_task.take() {
            // Err means the loop already exited
            let _ = task.shutdown.send(());
            if let Err(e) = task.handle.await {
                failures.push(CleanupFailure {
                    step: CleanupStep::StopChunks,
                    message: format!("chunk task ended abnormally: {}", e),
                });
            }
        }

        failures.extend(
            release_resources(self.device.take(), self.session.take(), self.client.as_ref()).await,
        );

        for failure in &failures {
            self.observer.on_event(&SessionEvent::CleanupFailed(failure.clone()));
        }

        self.set_state(settle);

        if failures.is_empty() {
            Ok(())
        } else {
            let err = CleanupError { failures };
            self.last_error = Some(err.to_string());
            Err(err)
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if !self.state().is_active() {
            return;
        }

        warn!("[{}] Dropped while {}; cleaning up", self.id, self.state());
        self.closing.store(true, Ordering::SeqCst);

        if let Some(task) = self.chunk_task.take() {
            let _ = task.shutdown.send(());
        }

        let device = self.device.take();
        let session = self.session.take();

        if device.is_some() || session.is_some() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let client = Arc::clone(&self.client);
                    let observer = Arc::clone(&self.observer);
                    runtime.spawn(async move {
                        for failure in release_resources(device, session, client.as_ref()).await {
                            observer.on_event(&SessionEvent::CleanupFailed(failure));
                        }
                    });
                }
                Err(_) => {
                    warn!(
                        "[{}] No async runtime; dropping device and session without closing",
                        self.id
                    );
                }
            }
        }

        self.set_state(SessionState::Disconnected);
    }
}

/// Steps after chunk production stops: stop capture, release the device,
/// close the session. Each step is isolated from the others' failures.
async fn release_resources(
    device: Option<Box<dyn CaptureDevice>>,
    session: Option<Arc<Session>>,
    client: &dyn RealtimeSessionClient,
) -> Vec<CleanupFailure> {
    let mut failures = Vec::new();

    if let Some(mut device) = device {
        if device.is_capturing() {
            if let Err(message) = guarded(device.stop()).await {
                failures.push(CleanupFailure {
                    step: CleanupStep::StopChunks,
                    message,
                });
            }
        }

        let name = device.name().to_string();
        match guarded(device.release()).await {
            Ok(()) => debug!("Released {}", name),
            Err(message) => failures.push(CleanupFailure {
                step: CleanupStep::ReleaseDevice,
                message,
            }),
        }
    }

    if let Some(session) = session {
        match guarded(client.close_session(&session)).await {
            Ok(()) => debug!("Closed session {}", session.id),
            Err(message) => failures.push(CleanupFailure {
                step: CleanupStep::CloseSession,
                message,
            }),
        }
    }

    failures
}

/// Run a cleanup step, turning both errors and panics into a message
async fn guarded<T, E: Display>(step: impl Future<Output = Result<T, E>>) -> Result<T, String> {
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Periodic chunker running for the lifetime of one streaming run
struct ChunkLoop {
    frames: mpsc::Receiver<AudioFrame>,
    session: Arc<Session>,
    client: Arc<dyn RealtimeSessionClient>,
    observer: Arc<dyn SessionObserver>,
    closing: Arc<AtomicBool>,
    counters: Arc<StreamCounters>,
    interval: Duration,
}

impl ChunkLoop {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut accumulator = ChunkAccumulator::new();
        let mut capturing = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                frame = self.frames.recv(), if capturing => match frame {
                    Some(frame) => accumulator.push(frame),
                    None => {
                        capturing = false;
                        self.observer.on_event(&SessionEvent::CaptureEnded);
                    }
                },

                _ = ticker.tick() => {
                    if self.closing.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(chunk) = accumulator.take_chunk() {
                        self.forward(chunk);
                    }
                    if !capturing {
                        break;
                    }
                }
            }
        }

        debug!(
            "Chunk loop for session {} finished after {} chunks",
            self.session.id,
            accumulator.chunks_cut()
        );
    }

    /// Hand a chunk to the client without waiting for the send
    fn forward(&self, chunk: AudioChunk) {
        self.counters.chunks_produced.fetch_add(1, Ordering::SeqCst);

        let client = Arc::clone(&self.client);
        let session = Arc::clone(&self.session);
        let observer = Arc::clone(&self.observer);
        let counters = Arc::clone(&self.counters);
        let closing = Arc::clone(&self.closing);

        tokio::spawn(async move {
            if closing.load(Ordering::SeqCst) {
                return;
            }
            let sequence = chunk.sequence;
            let bytes = chunk.len();

            match client.send_chunk(&session, chunk).await {
                Ok(()) => {
                    counters.chunks_forwarded.fetch_add(1, Ordering::SeqCst);
                    counters.bytes_forwarded.fetch_add(bytes as u64, Ordering::SeqCst);
                    observer.on_event(&SessionEvent::ChunkForwarded { sequence, bytes });
                }
                Err(e) => {
                    counters.transport_failures.fetch_add(1, Ordering::SeqCst);
                    observer.on_event(&SessionEvent::TransportFailed {
                        sequence,
                        error: e.to_string(),
                    });
                }
            }
        });
    }
}
