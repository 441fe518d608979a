// Real-time frame pump shared by the file and synthetic devices
//
// A spawned task ticks every FRAME_MS and pulls the next frame from a source
// closure until the source runs dry, the receiver goes away, or stop() is
// called.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::backend::AudioFrame;
use crate::error::StreamError;

/// Capture frame size in milliseconds
pub const FRAME_MS: u64 = 20;

const FRAME_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub(crate) struct RealtimeFeed {
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RealtimeFeed {
    pub(crate) fn start<F>(
        &mut self,
        device_name: &str,
        mut next_frame: F,
    ) -> Result<mpsc::Receiver<AudioFrame>, StreamError>
    where
        F: FnMut(u64) -> Option<AudioFrame> + Send + 'static,
    {
        if self.is_running() {
            return Err(StreamError::AlreadyCapturing(device_name.to_string()));
        }

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let name = device_name.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(FRAME_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut index = 0u64;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let Some(frame) = next_frame(index) else {
                            debug!("{}: source exhausted after {} frames", name, index);
                            break;
                        };
                        if tx.send(frame).await.is_err() {
                            debug!("{}: frame receiver dropped", name);
                            break;
                        }
                        index += 1;
                    }
                }
            }
        });

        self.task = Some(task);
        self.shutdown = Some(shutdown_tx);

        Ok(rx)
    }

    pub(crate) async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // Err means the task already finished on its own
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Capture task ended abnormally: {}", e);
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RealtimeFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
