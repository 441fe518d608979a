// Test doubles for the microphone and the realtime service
//
// The fake microphone wraps the synthetic tone device so frames flow in real
// (or paused) time, and counts how many handles are currently held.

#![allow(dead_code)]

pub mod service;

use async_trait::async_trait;
use realtime_voice::audio::{
    AudioFrame, CaptureDevice, CaptureSettings, Microphone, MicrophoneConstraints,
    SyntheticMicrophone,
};
use realtime_voice::error::{DeviceError, SessionError, StreamError, TransportError};
use realtime_voice::realtime::{RealtimeSessionClient, Session, SessionRequest};
use realtime_voice::session::{
    ControllerConfig, SessionController, SessionEvent, SessionObserver, SessionState,
};
use realtime_voice::AudioChunk;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Default)]
pub struct MicProbe {
    pub acquired: AtomicUsize,
    pub held: AtomicUsize,
    pub started: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeMicrophone {
    pub probe: Arc<MicProbe>,
    pub deny: bool,
    pub fail_start: bool,
    pub fail_release: bool,
}

impl FakeMicrophone {
    pub fn held(&self) -> usize {
        self.probe.held.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.probe.acquired.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.probe.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn acquire(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        if self.deny {
            return Err(DeviceError::PermissionDenied(
                "Permission denied by user".to_string(),
            ));
        }

        let inner = SyntheticMicrophone::default().acquire(constraints).await?;
        self.probe.acquired.fetch_add(1, Ordering::SeqCst);
        self.probe.held.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(TrackedDevice {
            inner,
            probe: Arc::clone(&self.probe),
            fail_start: self.fail_start,
            fail_release: self.fail_release,
        }))
    }
}

struct TrackedDevice {
    inner: Box<dyn CaptureDevice>,
    probe: Arc<MicProbe>,
    fail_start: bool,
    fail_release: bool,
}

#[async_trait]
impl CaptureDevice for TrackedDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, StreamError> {
        if self.fail_start {
            return Err(StreamError::StartFailed("audio track ended".to_string()));
        }
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        self.inner.start().await
    }

    async fn stop(&mut self) -> Result<(), StreamError> {
        self.inner.stop().await
    }

    async fn release(self: Box<Self>) -> Result<(), DeviceError> {
        let this = *self;
        this.probe.held.fetch_sub(1, Ordering::SeqCst);
        let result = this.inner.release().await;
        if this.fail_release {
            return Err(DeviceError::Release("device busy".to_string()));
        }
        result
    }

    fn is_capturing(&self) -> bool {
        self.inner.is_capturing()
    }

    fn name(&self) -> &str {
        "fake-microphone"
    }

    fn settings(&self) -> CaptureSettings {
        self.inner.settings()
    }
}

#[derive(Default)]
pub struct FakeClient {
    pub fail_open: bool,
    pub fail_close: bool,
    pub panic_on_close: bool,
    /// Chunk sequences whose send fails
    pub fail_sequences: HashSet<u64>,
    /// When set, `open_session` waits for a permit before answering
    pub open_gate: Option<Arc<Notify>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub attempted: Mutex<Vec<u64>>,
    pub delivered: Mutex<Vec<AudioChunk>>,
}

impl FakeClient {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn attempted(&self) -> Vec<u64> {
        let mut seqs = self.attempted.lock().unwrap().clone();
        seqs.sort_unstable();
        seqs
    }

    pub fn delivered_sequences(&self) -> Vec<u64> {
        let mut seqs: Vec<u64> = self
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.sequence)
            .collect();
        seqs.sort_unstable();
        seqs
    }
}

#[async_trait]
impl RealtimeSessionClient for FakeClient {
    async fn open_session(&self, request: &SessionRequest) -> Result<Session, SessionError> {
        if self.fail_open {
            return Err(SessionError::Rejected {
                status: 401,
                reason: "Unauthorized".to_string(),
            });
        }

        if let Some(gate) = &self.open_gate {
            gate.notified().await;
        }

        let n = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            id: format!("session-{}", n),
            transport_url: format!("memory://{}", request.audio_format),
            deployment: "test-deployment".to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn send_chunk(&self, _session: &Session, chunk: AudioChunk) -> Result<(), TransportError> {
        self.attempted.lock().unwrap().push(chunk.sequence);
        if self.fail_sequences.contains(&chunk.sequence) {
            return Err(TransportError::Send("connection reset".to_string()));
        }
        self.delivered.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn close_session(&self, _session: &Session) -> Result<(), SessionError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_close {
            panic!("socket already torn down");
        }
        if self.fail_close {
            return Err(SessionError::Close("socket already torn down".to_string()));
        }
        Ok(())
    }
}

/// Observer that records every event
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn transitions(&self) -> Vec<SessionState> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn transport_failures(&self) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::TransportFailed { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn controller(mic: &FakeMicrophone, client: &Arc<FakeClient>) -> SessionController {
    SessionController::new(
        ControllerConfig::default(),
        Arc::new(mic.clone()),
        Arc::clone(client) as Arc<dyn RealtimeSessionClient>,
    )
}
