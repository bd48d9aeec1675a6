use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{RecognizerEvent, SpeechRecognizer};
use crate::error::{StreamError, StreamErrorKind};
use crate::transcript::TranscriptState;

/// Point-in-time view of the stream for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct StreamSnapshot {
    pub active: bool,
    /// Set when any non-trivial error occurred or restarts were exhausted;
    /// tells the orchestrator to offer the cloud fallback.
    pub fallback_flagged: bool,
    pub last_error: Option<StreamErrorKind>,
    pub restarts: u32,
}

#[derive(Debug, Default)]
struct Shared {
    active: bool,
    fallback_flagged: bool,
    last_error: Option<StreamErrorKind>,
    restarts: u32,
}

/// Wraps a [`SpeechRecognizer`] and normalizes its event stream into the
/// session's [`TranscriptState`].
///
/// Long-lived recognition streams get terminated by the platform well before
/// a speech ends; when the stream drops while the session is still active,
/// the pump restarts it after a short delay, preserving accumulated final
/// text and clearing the interim tail. Restarts are capped with linear
/// backoff so a permanently dead recognizer degrades to fallback mode
/// instead of looping forever. A confirmed chunk resets the restart counter.
pub struct LiveTranscriptionStream {
    recognizer: Arc<dyn SpeechRecognizer>,
    transcript: Arc<Mutex<TranscriptState>>,
    shared: Arc<Mutex<Shared>>,
    restart_delay: Duration,
    max_restarts: u32,
    pump: Option<JoinHandle<()>>,
}

impl LiveTranscriptionStream {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        transcript: Arc<Mutex<TranscriptState>>,
        restart_delay: Duration,
        max_restarts: u32,
    ) -> Self {
        Self {
            recognizer,
            transcript,
            shared: Arc::new(Mutex::new(Shared::default())),
            restart_delay,
            max_restarts,
            pump: None,
        }
    }

    /// Start the recognizer and the event pump. No-op if already active.
    pub async fn start(&mut self) -> Result<(), StreamError> {
        {
            let shared = self.shared.lock().await;
            if shared.active {
                return Ok(());
            }
        }

        let events = self.recognizer.start().await?;

        {
            let mut shared = self.shared.lock().await;
            shared.active = true;
            shared.restarts = 0;
        }
        {
            self.transcript.lock().await.clear_interim();
        }

        info!("live transcription stream started");

        let recognizer = Arc::clone(&self.recognizer);
        let transcript = Arc::clone(&self.transcript);
        let shared = Arc::clone(&self.shared);
        let restart_delay = self.restart_delay;
        let max_restarts = self.max_restarts;

        self.pump = Some(tokio::spawn(pump(
            recognizer,
            transcript,
            shared,
            events,
            restart_delay,
            max_restarts,
        )));

        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        self.shared.lock().await.active
    }

    /// Signal the stream to stop and reap the pump. Safe to call twice.
    pub async fn stop(&mut self) {
        {
            let mut shared = self.shared.lock().await;
            shared.active = false;
        }
        self.recognizer.stop().await;

        if let Some(pump) = self.pump.take() {
            // The pump exits once the recognizer closes its event channel;
            // bound the wait so a misbehaving recognizer cannot hang a stop.
            if tokio::time::timeout(Duration::from_secs(2), pump)
                .await
                .is_err()
            {
                warn!("recognizer pump did not exit in time");
            }
        }
    }

    pub async fn snapshot(&self) -> StreamSnapshot {
        let shared = self.shared.lock().await;
        StreamSnapshot {
            active: shared.active,
            fallback_flagged: shared.fallback_flagged,
            last_error: shared.last_error,
            restarts: shared.restarts,
        }
    }
}

async fn pump(
    recognizer: Arc<dyn SpeechRecognizer>,
    transcript: Arc<Mutex<TranscriptState>>,
    shared: Arc<Mutex<Shared>>,
    mut events: mpsc::Receiver<RecognizerEvent>,
    restart_delay: Duration,
    max_restarts: u32,
) {
    loop {
        while let Some(event) = events.recv().await {
            match event {
                RecognizerEvent::Interim(text) => {
                    transcript.lock().await.set_interim(&text);
                }
                RecognizerEvent::FinalChunk(text) => {
                    transcript.lock().await.push_final_chunk(&text);
                    shared.lock().await.restarts = 0;
                }
                RecognizerEvent::Error(StreamErrorKind::NoSpeech) => {
                    debug!("recognizer reported no speech; ignoring");
                }
                RecognizerEvent::Error(kind) => {
                    warn!("recognizer error: {kind}; flagging fallback mode");
                    let mut shared = shared.lock().await;
                    shared.fallback_flagged = true;
                    shared.last_error = Some(kind);
                }
                RecognizerEvent::Ended => break,
            }
        }

        // Stream ended (event or channel close). Restart if the session is
        // still live and the cap has not been hit.
        let attempt = {
            let mut shared = shared.lock().await;
            if !shared.active {
                break;
            }
            shared.restarts += 1;
            if shared.restarts > max_restarts {
                warn!(
                    "recognizer restart cap reached ({max_restarts}); flagging fallback mode"
                );
                shared.fallback_flagged = true;
                shared.active = false;
                break;
            }
            shared.restarts
        };

        tokio::time::sleep(restart_delay * attempt).await;

        if !shared.lock().await.active {
            break;
        }

        match recognizer.start().await {
            Ok(new_events) => {
                transcript.lock().await.clear_interim();
                debug!("live transcription stream restarted (attempt {attempt})");
                events = new_events;
            }
            Err(e) => {
                warn!("recognizer restart failed: {e}; flagging fallback mode");
                let mut shared = shared.lock().await;
                shared.fallback_flagged = true;
                shared.active = false;
                break;
            }
        }
    }

    debug!("recognizer pump stopped");
}
