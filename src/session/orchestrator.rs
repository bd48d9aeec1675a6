use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::OrchestratorConfig;
use super::notice::Notice;
use super::{PracticeSession, RecordingState};
use crate::audio::{drain_capture, MicrophoneDevice, MicrophoneSession, SealedCapture};
use crate::error::{ScoringError, StreamErrorKind, ValidationError};
use crate::fallback::TranscriptionService;
use crate::recognizer::{LiveTranscriptionStream, SpeechRecognizer};
use crate::scoring::{ScoreReport, ScoringRequest, ScoringService};
use crate::store::{PracticeRecord, PracticeStore};
use crate::transcript::{strip_placeholders, TranscriptState};

/// Transcripts shorter than this are rejected at submit time.
const MIN_TRANSCRIPT_CHARS: usize = 10;

struct Inner {
    state: RecordingState,

    /// Session token, bumped on every new session and on reset. Every async
    /// callback compares it before touching state, so late-arriving work
    /// from a dead session is a no-op.
    epoch: u64,

    session: Option<PracticeSession>,
    mic: Option<Box<dyn MicrophoneSession>>,
    capture_task: Option<JoinHandle<Result<SealedCapture>>>,
    sealed: Option<Arc<SealedCapture>>,
    stream: Option<LiveTranscriptionStream>,
    transcript: Arc<Mutex<TranscriptState>>,

    live_supported: bool,
    /// Live stream failed at start; recording continues, fallback is offered.
    stream_failed: bool,
    last_stream_error: Option<StreamErrorKind>,

    notice: Option<Notice>,
    fallback_available: bool,
    fallback_in_flight: bool,

    /// Guards the stop path against the manual-stop/timer race.
    stopping: bool,

    /// The single active countdown timer (prep or record, never both).
    timer: Option<JoinHandle<()>>,
    prep_remaining: u64,
    record_remaining: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            epoch: 0,
            session: None,
            mic: None,
            capture_task: None,
            sealed: None,
            stream: None,
            transcript: Arc::new(Mutex::new(TranscriptState::new())),
            live_supported: false,
            stream_failed: false,
            last_stream_error: None,
            notice: None,
            fallback_available: false,
            fallback_in_flight: false,
            stopping: false,
            timer: None,
            prep_remaining: 0,
            record_remaining: 0,
        }
    }
}

/// The core state machine: countdown → capture → live transcription → stop →
/// reconciliation → fallback-if-needed → scoring hand-off.
///
/// States move `Idle → Preparing → Recording → Completed`; the only way back
/// from `Completed` is an explicit [`reset`](Self::reset). All timers and
/// transcript buffers are owned here.
#[derive(Clone)]
pub struct RecordingOrchestrator {
    cfg: OrchestratorConfig,
    device: Arc<dyn MicrophoneDevice>,
    recognizer: Arc<dyn SpeechRecognizer>,
    fallback: Arc<dyn TranscriptionService>,
    scoring: Arc<dyn ScoringService>,
    store: Option<Arc<dyn PracticeStore>>,
    inner: Arc<Mutex<Inner>>,
}

impl RecordingOrchestrator {
    pub fn new(
        cfg: OrchestratorConfig,
        device: Arc<dyn MicrophoneDevice>,
        recognizer: Arc<dyn SpeechRecognizer>,
        fallback: Arc<dyn TranscriptionService>,
        scoring: Arc<dyn ScoringService>,
        store: Option<Arc<dyn PracticeStore>>,
    ) -> Self {
        Self {
            cfg,
            device,
            recognizer,
            fallback,
            scoring,
            store,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    pub async fn state(&self) -> RecordingState {
        self.inner.lock().await.state
    }

    pub async fn notice(&self) -> Option<Notice> {
        self.inner.lock().await.notice.clone()
    }

    pub async fn fallback_available(&self) -> bool {
        self.inner.lock().await.fallback_available
    }

    pub async fn fallback_in_flight(&self) -> bool {
        self.inner.lock().await.fallback_in_flight
    }

    pub async fn prep_remaining(&self) -> u64 {
        self.inner.lock().await.prep_remaining
    }

    pub async fn record_remaining(&self) -> u64 {
        self.inner.lock().await.record_remaining
    }

    pub async fn sealed_capture(&self) -> Option<Arc<SealedCapture>> {
        self.inner.lock().await.sealed.clone()
    }

    /// Best available transcript text for display.
    pub async fn transcript_preview(&self) -> String {
        let transcript = {
            let inner = self.inner.lock().await;
            Arc::clone(&inner.transcript)
        };
        let transcript = transcript.lock().await;
        transcript.display_text()
    }

    // ------------------------------------------------------------------
    // start_prep
    // ------------------------------------------------------------------

    /// Begin a new session: acquire the microphone, start live recognition
    /// best-effort, and run the preparation countdown. Valid only in `Idle`.
    ///
    /// Device failure leaves the state in `Idle` with an error notice and
    /// returns the error. Live-recognition failure never aborts the attempt;
    /// it only flags fallback mode.
    pub async fn start_prep(&self, session: PracticeSession) -> Result<()> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            if inner.state != RecordingState::Idle {
                warn!("start_prep ignored: state is {:?}", inner.state);
                return Ok(());
            }
            inner.epoch += 1;
            inner.notice = None;
            inner.epoch
        };

        info!(
            "starting prep for motion: {} ({}s)",
            session.motion.topic, session.duration_seconds
        );

        let mic = match self.device.acquire().await {
            Ok(mic) => mic,
            Err(e) => {
                warn!("microphone acquisition failed: {e}");
                let mut inner = self.inner.lock().await;
                if inner.epoch == epoch {
                    inner.notice = Some(Notice::error_with(
                        "Microphone unavailable",
                        e.to_string(),
                    ));
                }
                return Err(e.into());
            }
        };

        let supported = self.recognizer.is_supported();
        let transcript = Arc::new(Mutex::new(TranscriptState::new()));
        let mut stream = None;
        let mut stream_failed = false;

        if supported {
            let mut live = LiveTranscriptionStream::new(
                Arc::clone(&self.recognizer),
                Arc::clone(&transcript),
                self.cfg.restart_delay,
                self.cfg.max_stream_restarts,
            );
            match live.start().await {
                Ok(()) => stream = Some(live),
                Err(e) => {
                    warn!("live recognition unavailable: {e}; continuing in fallback mode");
                    stream_failed = true;
                }
            }
        } else {
            debug!("live recognition not supported; fallback mode");
        }

        let mut mic = Some(mic);
        let raced = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch {
                true
            } else {
                inner.state = RecordingState::Preparing;
                inner.session = Some(session);
                inner.mic = mic.take();
                inner.stream = stream.take();
                inner.transcript = transcript;
                inner.live_supported = supported;
                inner.stream_failed = stream_failed;
                inner.last_stream_error = None;
                inner.sealed = None;
                inner.fallback_available = false;
                inner.fallback_in_flight = false;
                inner.stopping = false;
                inner.prep_remaining = self.cfg.prep_ticks;
                inner.record_remaining = 0;

                let this = self.clone();
                inner.timer = Some(tokio::spawn(async move {
                    this.run_prep_timer(epoch).await;
                }));
                false
            }
        };

        if raced {
            // A reset landed between acquisition and registration; the reset
            // never saw this mic or stream, so they are released here.
            if let Some(mut live) = stream {
                live.stop().await;
            }
            if let Some(mut mic) = mic {
                if let Err(e) = mic.stop().await {
                    warn!("microphone stop failed: {e}");
                }
            }
            debug!("start_prep abandoned: session was reset");
        }

        Ok(())
    }

    async fn run_prep_timer(&self, epoch: u64) {
        for _ in 0..self.cfg.prep_ticks {
            tokio::time::sleep(self.cfg.tick_interval).await;

            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch || inner.state != RecordingState::Preparing {
                return;
            }
            inner.prep_remaining = inner.prep_remaining.saturating_sub(1);
        }

        self.begin_recording(epoch).await;
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    async fn begin_recording(&self, epoch: u64) {
        // Take the device out so capture starts without holding the lock.
        let (mic, stream, duration) = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch || inner.state != RecordingState::Preparing {
                return;
            }
            let duration = inner
                .session
                .as_ref()
                .map(|s| s.duration_seconds)
                .unwrap_or(0);
            (inner.mic.take(), inner.stream.take(), duration)
        };

        let Some(mut mic) = mic else {
            error!("no microphone session at recording start");
            return;
        };

        let frames = match mic.start().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("audio capture failed to start: {e}");
                let _ = mic.stop().await;
                if let Some(mut live) = stream {
                    live.stop().await;
                }
                self.reset().await;
                let mut inner = self.inner.lock().await;
                inner.notice = Some(Notice::error_with(
                    "Could not start recording",
                    e.to_string(),
                ));
                return;
            }
        };

        // Reconfirm the live stream survived the prep countdown.
        let stream = match stream {
            Some(mut live) => {
                if !live.is_active().await {
                    if let Err(e) = live.start().await {
                        warn!("live recognition did not resume: {e}");
                    }
                }
                Some(live)
            }
            None => None,
        };

        let mut mic = Some(mic);
        let mut stream = stream;
        let mut capture_task = Some(tokio::spawn(drain_capture(frames)));

        let raced = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch {
                true
            } else {
                inner.state = RecordingState::Recording;
                inner.mic = mic.take();
                inner.stream = stream.take();
                inner.capture_task = capture_task.take();
                inner.record_remaining = duration;

                let this = self.clone();
                inner.timer = Some(tokio::spawn(async move {
                    this.run_record_timer(epoch).await;
                }));

                info!("recording started ({duration}s)");
                false
            }
        };

        if raced {
            // A reset landed while capture was coming up; everything taken
            // out of the session is stopped here, not leaked.
            if let Some(mut mic) = mic {
                if let Err(e) = mic.stop().await {
                    warn!("microphone stop failed: {e}");
                }
            }
            if let Some(mut live) = stream {
                live.stop().await;
            }
            if let Some(task) = capture_task {
                task.abort();
            }
            debug!("recording start abandoned: session was reset");
        }
    }

    async fn run_record_timer(&self, epoch: u64) {
        loop {
            tokio::time::sleep(self.cfg.tick_interval).await;

            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch || inner.state != RecordingState::Recording {
                return;
            }
            inner.record_remaining = inner.record_remaining.saturating_sub(1);
            if inner.record_remaining == 0 {
                // Detach our own handle so the stop path doesn't abort the
                // task that is running it.
                drop(inner.timer.take());
                break;
            }
        }

        info!("recording timer elapsed; stopping");
        self.finish_recording(epoch).await;
    }

    /// Manually stop an active recording. Identical in effect to the timer
    /// running out.
    pub async fn stop_recording(&self) -> Result<()> {
        let epoch = {
            let inner = self.inner.lock().await;
            if inner.state != RecordingState::Recording {
                warn!("stop_recording ignored: state is {:?}", inner.state);
                return Ok(());
            }
            inner.epoch
        };

        self.finish_recording(epoch).await;
        Ok(())
    }

    /// The capture-stop path: seal the audio, settle, stop the live stream,
    /// reconcile transcript sources, then (and only then) become
    /// `Completed`. Runs exactly once per session regardless of whether the
    /// stop was manual or timer-driven.
    async fn finish_recording(&self, epoch: u64) {
        let (mic, capture_task, timer) = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch
                || inner.state != RecordingState::Recording
                || inner.stopping
            {
                return;
            }
            inner.stopping = true;
            (inner.mic.take(), inner.capture_task.take(), inner.timer.take())
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        // Stopping the device closes the frame channel, which lets the
        // capture task seal the buffer.
        if let Some(mut mic) = mic {
            if let Err(e) = mic.stop().await {
                warn!("microphone stop failed: {e}");
            }
        }

        let sealed = match capture_task {
            Some(task) => match task.await {
                Ok(Ok(sealed)) => Some(Arc::new(sealed)),
                Ok(Err(e)) => {
                    error!("failed to seal capture: {e}");
                    None
                }
                Err(e) => {
                    error!("capture task panicked: {e}");
                    None
                }
            },
            None => None,
        };

        // Let trailing recognizer events land before reading the buffers.
        tokio::time::sleep(self.cfg.settle_delay).await;

        let stream = {
            let mut inner = self.inner.lock().await;
            if inner.epoch != epoch {
                return;
            }
            inner.stream.take()
        };

        let mut stream_snapshot = None;
        if let Some(mut live) = stream {
            if live.is_active().await {
                live.stop().await;
                tokio::time::sleep(self.cfg.stream_stop_delay).await;
            } else {
                live.stop().await;
            }
            stream_snapshot = Some(live.snapshot().await);
        }

        // Reconcile and complete.
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return;
        }

        inner.sealed = sealed;
        if let Some(snapshot) = stream_snapshot {
            if snapshot.fallback_flagged {
                inner.last_stream_error = snapshot.last_error;
            }
        }

        let winning = {
            let transcript = inner.transcript.lock().await;
            transcript.winning()
        };

        match winning {
            Some((source, text)) => {
                info!("transcript reconciled from {source:?} ({} chars)", text.len());
            }
            None if inner.sealed.is_some() => {
                info!(
                    "no live transcript (supported={}, start_failed={}); offering fallback",
                    inner.live_supported, inner.stream_failed
                );
                inner.fallback_available = true;
                if let Some(kind) = inner.last_stream_error {
                    inner.notice = Some(Notice::error_with(
                        "Live transcription dropped out",
                        format!("{kind}. You can transcribe the recording instead."),
                    ));
                }
            }
            None => {
                inner.notice = Some(Notice::error_with(
                    "No transcript was captured",
                    "Nothing was recorded. Try again.",
                ));
            }
        }

        inner.state = RecordingState::Completed;
        inner.stopping = false;
        info!("recording completed");
    }

    // ------------------------------------------------------------------
    // Fallback transcription
    // ------------------------------------------------------------------

    /// Manually trigger the cloud fallback for the sealed capture. No-op
    /// unless the fallback affordance is showing; never runs concurrently
    /// with itself.
    pub async fn handle_transcribe(&self) -> Result<()> {
        let (epoch, sealed) = {
            let mut inner = self.inner.lock().await;
            if inner.state != RecordingState::Completed
                || !inner.fallback_available
                || inner.fallback_in_flight
            {
                debug!("handle_transcribe ignored");
                return Ok(());
            }
            let Some(sealed) = inner.sealed.clone() else {
                warn!("fallback requested without a sealed capture");
                return Ok(());
            };
            inner.fallback_in_flight = true;
            inner.fallback_available = false;
            inner.notice = None;
            (inner.epoch, sealed)
        };

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.fallback.transcribe(&sealed).await;

            let mut inner = this.inner.lock().await;
            if inner.epoch != epoch {
                debug!("fallback result discarded: session was reset");
                return;
            }
            inner.fallback_in_flight = false;

            match result {
                Ok(text) => {
                    info!("fallback transcript received ({} chars)", text.len());
                    {
                        let mut transcript = inner.transcript.lock().await;
                        transcript.set_fallback(&text);
                    }
                    inner.notice = Some(Notice::info("Transcript ready"));
                }
                Err(e) => {
                    warn!("fallback transcription failed: {e}");
                    inner.notice = Some(Notice::error_with(
                        "Transcription failed",
                        format!("{e}. You can try again."),
                    ));
                    inner.fallback_available = true;
                }
            }
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    /// Hand the finished round to the scoring collaborator. The single
    /// hand-off point out of the core.
    ///
    /// Waits (bounded) for an in-flight fallback call. With no usable
    /// transcript this re-shows the fallback affordance and fails
    /// validation; scoring failures reset the session with a retry notice.
    pub async fn submit_recording(&self) -> Result<ScoreReport> {
        for _ in 0..self.cfg.submit_wait_attempts {
            let in_flight = {
                let inner = self.inner.lock().await;
                if inner.state != RecordingState::Completed {
                    bail!("submit is only valid once recording has completed");
                }
                inner.fallback_in_flight
            };
            if !in_flight {
                break;
            }
            tokio::time::sleep(self.cfg.submit_wait_interval).await;
        }

        let (epoch, session, winning) = {
            let inner = self.inner.lock().await;
            if inner.state != RecordingState::Completed {
                bail!("submit is only valid once recording has completed");
            }
            let session = inner
                .session
                .clone()
                .context("no active session to submit")?;
            let winning = {
                let transcript = inner.transcript.lock().await;
                transcript.winning()
            };
            (inner.epoch, session, winning)
        };

        let Some((_, text)) = winning else {
            let mut inner = self.inner.lock().await;
            if inner.epoch == epoch {
                inner.fallback_available = inner.sealed.is_some();
                inner.notice = Some(Notice::error_with(
                    "No transcript yet",
                    "Transcribe the recording before submitting.",
                ));
            }
            return Err(ValidationError::TranscriptMissing.into());
        };

        let text = strip_placeholders(&text);
        let chars = text.chars().count();
        if chars < MIN_TRANSCRIPT_CHARS {
            self.reset().await;
            let mut inner = self.inner.lock().await;
            inner.notice = Some(Notice::error_with(
                "Transcript too short",
                "Not enough speech was captured to score. Record again.",
            ));
            return Err(ValidationError::TranscriptTooShort { chars }.into());
        }

        let request = ScoringRequest {
            transcript: text.clone(),
            topic: session.motion.topic.clone(),
            stance: session.stance.map(|s| s.as_str().to_string()),
            duration_seconds: session.duration_seconds,
        };

        info!("submitting practice round for scoring: {}", session.id);

        match self.scoring.score(&request).await {
            Ok(report) => {
                self.persist(&session, &text, &report).await;
                Ok(report)
            }
            Err(e) => {
                error!("scoring failed: {e}");
                let title = match &e {
                    ScoringError::Unavailable => "Scoring service unavailable",
                    ScoringError::RateLimited => "Too many requests",
                    ScoringError::Generic(_) => "Scoring failed",
                };
                self.reset().await;
                let mut inner = self.inner.lock().await;
                inner.notice = Some(Notice::error_with(
                    title,
                    "Your recording was not scored. Record again to retry.",
                ));
                Err(e.into())
            }
        }
    }

    async fn persist(&self, session: &PracticeSession, transcript: &str, report: &ScoreReport) {
        let Some(store) = &self.store else {
            return;
        };

        let record = PracticeRecord {
            motion_id: session.motion.id.clone(),
            topic: session.motion.topic.clone(),
            stance: session.stance.map(|s| s.as_str().to_string()),
            duration_seconds: session.duration_seconds,
            transcript: transcript.to_string(),
            scores: report.scores.clone(),
            feedback: report.feedback.clone(),
            recorded_at: Utc::now(),
        };

        // Persistence never blocks the user-visible flow.
        if let Err(e) = store.save(&record).await {
            warn!("failed to persist practice record: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Tear everything down and return to `Idle`. Valid from any state.
    /// Cancels timers, stops capture and recognition, releases the
    /// microphone, and invalidates every outstanding async callback.
    pub async fn reset(&self) {
        let (mic, stream, timer, capture_task) = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            inner.state = RecordingState::Idle;
            inner.session = None;
            inner.sealed = None;
            inner.notice = None;
            inner.fallback_available = false;
            inner.fallback_in_flight = false;
            inner.stopping = false;
            inner.live_supported = false;
            inner.stream_failed = false;
            inner.last_stream_error = None;
            inner.prep_remaining = 0;
            inner.record_remaining = 0;
            inner.transcript = Arc::new(Mutex::new(TranscriptState::new()));
            (
                inner.mic.take(),
                inner.stream.take(),
                inner.timer.take(),
                inner.capture_task.take(),
            )
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(mut stream) = stream {
            stream.stop().await;
        }
        if let Some(mut mic) = mic {
            if let Err(e) = mic.stop().await {
                warn!("microphone stop failed during reset: {e}");
            }
        }
        if let Some(task) = capture_task {
            task.abort();
        }

        info!("orchestrator reset");
    }
}
