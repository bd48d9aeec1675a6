// Integration tests for the recording orchestrator state machine.
//
// These drive full sessions through trait-seam doubles: a counting
// microphone, a scripted recognizer, and canned fallback/scoring services.
// Countdown ticks are shrunk to milliseconds so whole sessions run fast.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use rostrum::{
    AudioFrame, DeviceError, FallbackError, Motion, MotionKind, MicrophoneDevice,
    MicrophoneSession, NoticeTone, OrchestratorConfig, PracticeSession, RecognizerEvent,
    RecordingOrchestrator, RecordingState, RubricFeedback, RubricScores, ScoreReport,
    ScoringError, ScoringRequest, ScoringService, SealedCapture, SpeechRecognizer, StreamError,
    StreamErrorKind, TranscriptionService, UnsupportedRecognizer,
};

// ============================================================================
// Test doubles
// ============================================================================

struct TestDevice {
    deny: bool,
    acquire_delay: Duration,
    start_delay: Duration,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl TestDevice {
    fn new() -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        Self::build(false, Duration::ZERO, Duration::ZERO)
    }

    /// A device whose `acquire` stalls, widening the window between
    /// acquisition and session registration.
    fn slow_acquire(delay: Duration) -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        Self::build(false, delay, Duration::ZERO)
    }

    /// A device whose sessions stall in `start`, widening the window between
    /// the prep countdown ending and the recording being registered.
    fn slow_start(delay: Duration) -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        Self::build(false, Duration::ZERO, delay)
    }

    fn denying() -> Arc<Self> {
        Self::build(true, Duration::ZERO, Duration::ZERO).0
    }

    fn build(
        deny: bool,
        acquire_delay: Duration,
        start_delay: Duration,
    ) -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let acquired = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let device = Arc::new(Self {
            deny,
            acquire_delay,
            start_delay,
            acquired: Arc::clone(&acquired),
            released: Arc::clone(&released),
        });
        (device, acquired, released)
    }
}

#[async_trait::async_trait]
impl MicrophoneDevice for TestDevice {
    async fn acquire(&self) -> Result<Box<dyn MicrophoneSession>, DeviceError> {
        if self.deny {
            return Err(DeviceError::PermissionDenied);
        }
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestMic {
            released: Arc::clone(&self.released),
            start_delay: self.start_delay,
            tx: None,
            capturing: false,
            stopped: false,
        }))
    }
}

struct TestMic {
    released: Arc<AtomicUsize>,
    start_delay: Duration,
    tx: Option<mpsc::Sender<AudioFrame>>,
    capturing: bool,
    stopped: bool,
}

#[async_trait::async_trait]
impl MicrophoneSession for TestMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        let (tx, rx) = mpsc::channel(64);
        for i in 0..3u64 {
            let _ = tx.try_send(AudioFrame {
                samples: vec![42i16; 160],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: i * 10,
            });
        }
        self.tx = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if !self.stopped {
            self.stopped = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        self.tx = None;
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "test-mic"
    }
}

/// Each `start` call consumes one scripted run. A run either keeps its event
/// channel open until `stop` (a healthy stream) or closes it after the last
/// event (a platform drop).
struct ScriptRun {
    events: Vec<RecognizerEvent>,
    keep_open: bool,
}

struct ScriptedRecognizer {
    runs: StdMutex<VecDeque<ScriptRun>>,
    active_tx: StdMutex<Option<mpsc::Sender<RecognizerEvent>>>,
}

impl ScriptedRecognizer {
    fn new(runs: Vec<ScriptRun>) -> Arc<Self> {
        Arc::new(Self {
            runs: StdMutex::new(runs.into()),
            active_tx: StdMutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start(&self) -> Result<mpsc::Receiver<RecognizerEvent>, StreamError> {
        let run = self.runs.lock().unwrap().pop_front();
        let Some(run) = run else {
            return Err(StreamError::StartFailed("script exhausted".to_string()));
        };

        let (tx, rx) = mpsc::channel(64);
        for event in run.events {
            let _ = tx.try_send(event);
        }
        if run.keep_open {
            *self.active_tx.lock().unwrap() = Some(tx);
        }
        Ok(rx)
    }

    async fn stop(&self) {
        self.active_tx.lock().unwrap().take();
    }
}

struct TestFallback {
    text: Option<String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl TestFallback {
    fn ok(text: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
        Self::with_delay(text, Duration::ZERO)
    }

    fn with_delay(text: &str, delay: Duration) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = Arc::new(Self {
            text: Some(text.to_string()),
            delay,
            calls: Arc::clone(&calls),
        });
        (service, calls)
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionService for TestFallback {
    async fn transcribe(&self, _audio: &SealedCapture) -> Result<String, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(FallbackError::EmptyResult),
        }
    }
}

struct TestScoring {
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl TestScoring {
    fn ok() -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = Arc::new(Self {
            fail: false,
            calls: Arc::clone(&calls),
        });
        (service, calls)
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

fn canned_report() -> ScoreReport {
    ScoreReport {
        scores: RubricScores {
            logic: 80.0,
            rhetoric: 70.0,
            empathy: 75.0,
            delivery: 65.0,
            total: 73.0,
        },
        feedback: RubricFeedback {
            logic: "solid".to_string(),
            rhetoric: "fine".to_string(),
            empathy: "good".to_string(),
            delivery: "steady".to_string(),
        },
        missing_points: vec!["counterexamples".to_string()],
        enhanced_argument: "a sharper version".to_string(),
    }
}

#[async_trait::async_trait]
impl ScoringService for TestScoring {
    async fn score(&self, _request: &ScoringRequest) -> Result<ScoreReport, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ScoringError::Unavailable)
        } else {
            Ok(canned_report())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        prep_ticks: 10,
        tick_interval: Duration::from_millis(5),
        settle_delay: Duration::from_millis(5),
        stream_stop_delay: Duration::from_millis(5),
        restart_delay: Duration::from_millis(2),
        max_stream_restarts: 3,
        submit_wait_interval: Duration::from_millis(10),
        submit_wait_attempts: 50,
    }
}

fn motion(topic: &str) -> Motion {
    Motion {
        id: "m-1".to_string(),
        topic: topic.to_string(),
        category: "society".to_string(),
        description: None,
        kind: MotionKind::Opinion,
    }
}

async fn wait_for_state(
    orchestrator: &RecordingOrchestrator,
    state: RecordingState,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    while orchestrator.state().await != state {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for state {state:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_for_fallback_done(orchestrator: &RecordingOrchestrator, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while orchestrator.fallback_in_flight().await {
        assert!(Instant::now() < deadline, "fallback call never resolved");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn healthy_session_submits_live_transcript_once() {
    let (device, _, _) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![
            RecognizerEvent::Interim("hel".to_string()),
            RecognizerEvent::FinalChunk("hello".to_string()),
            RecognizerEvent::Interim("wor".to_string()),
            RecognizerEvent::FinalChunk("world today".to_string()),
        ],
        keep_open: true,
    }]);
    let (fallback, fallback_calls) = TestFallback::ok("unused");
    let (scoring, scoring_calls) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("ban cars in city centers"), 3, None);
    orchestrator.start_prep(session).await.unwrap();

    assert_eq!(orchestrator.state().await, RecordingState::Preparing);
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    // Finals joined with spaces; interim never contributes.
    assert_eq!(orchestrator.transcript_preview().await, "hello world today");
    assert!(!orchestrator.fallback_available().await);

    let report = orchestrator.submit_recording().await.unwrap();
    assert_eq!(report.scores.total, 73.0);
    assert_eq!(scoring_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);

    // Submitting does not leave Completed; only reset does.
    assert_eq!(orchestrator.state().await, RecordingState::Completed);
}

#[tokio::test]
async fn manual_stop_behaves_like_timer_expiry() {
    let (device, _, _) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![RecognizerEvent::FinalChunk("a short opening".to_string())],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    // A duration far longer than the test; only the manual stop ends it.
    let session = PracticeSession::new(motion("topic"), 10_000, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Recording, Duration::from_secs(2)).await;

    orchestrator.stop_recording().await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;
    assert_eq!(orchestrator.transcript_preview().await, "a short opening");
}

#[tokio::test]
async fn unsupported_recognizer_offers_fallback_without_error_notice() {
    let (device, _, _) = TestDevice::new();
    let (fallback, fallback_calls) = TestFallback::ok("the cloud transcript of my speech");
    let (scoring, scoring_calls) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        Arc::new(UnsupportedRecognizer),
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    // No StreamError notice for an unsupported platform, just the affordance.
    assert!(orchestrator.notice().await.is_none());
    assert!(orchestrator.fallback_available().await);

    orchestrator.handle_transcribe().await.unwrap();
    wait_for_fallback_done(&orchestrator, Duration::from_secs(2)).await;

    assert_eq!(
        orchestrator.transcript_preview().await,
        "the cloud transcript of my speech"
    );
    let notice = orchestrator.notice().await.expect("transcript-ready notice");
    assert_eq!(notice.tone, NoticeTone::Info);

    orchestrator.submit_recording().await.unwrap();
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    assert_eq!(scoring_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submit_without_transcript_never_reaches_scoring() {
    let (device, _, _) = TestDevice::new();
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, scoring_calls) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        Arc::new(UnsupportedRecognizer),
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    let err = orchestrator.submit_recording().await;
    assert!(err.is_err());
    assert_eq!(scoring_calls.load(Ordering::SeqCst), 0);
    assert!(orchestrator.fallback_available().await);
    assert!(orchestrator.notice().await.is_some());
}

#[tokio::test]
async fn fallback_call_is_never_concurrent_with_itself() {
    let (device, _, _) = TestDevice::new();
    let (fallback, fallback_calls) =
        TestFallback::with_delay("a transcript from the cloud", Duration::from_millis(200));
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        Arc::new(UnsupportedRecognizer),
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    orchestrator.handle_transcribe().await.unwrap();
    // Second trigger while in flight is a no-op (the affordance is hidden).
    orchestrator.handle_transcribe().await.unwrap();
    assert!(!orchestrator.fallback_available().await);

    // submit waits out the in-flight call before reconciling.
    let report = orchestrator.submit_recording().await.unwrap();
    assert_eq!(report.scores.total, 73.0);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fallback_is_retryable() {
    let (device, _, _) = TestDevice::new();
    let fallback = TestFallback::failing();
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        Arc::new(UnsupportedRecognizer),
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    orchestrator.handle_transcribe().await.unwrap();
    wait_for_fallback_done(&orchestrator, Duration::from_secs(2)).await;

    // Failure re-shows the affordance and surfaces an error notice.
    assert!(orchestrator.fallback_available().await);
    let notice = orchestrator.notice().await.expect("notice after failure");
    assert_eq!(notice.tone, NoticeTone::Error);
}

#[tokio::test]
async fn reset_releases_device_and_cancels_timers() {
    let (device, acquired, released) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 10_000, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Recording, Duration::from_secs(2)).await;

    orchestrator.reset().await;
    assert_eq!(orchestrator.state().await, RecordingState::Idle);
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);

    // No late timer tick may resurrect the dead session.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orchestrator.state().await, RecordingState::Idle);
    assert_eq!(orchestrator.record_remaining().await, 0);
}

#[tokio::test]
async fn reset_during_device_acquisition_releases_microphone() {
    let (device, acquired, released) = TestDevice::slow_acquire(Duration::from_millis(50));
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    let starter = {
        let orchestrator = orchestrator.clone();
        let session = PracticeSession::new(motion("topic"), 60, None);
        tokio::spawn(async move { orchestrator.start_prep(session).await })
    };

    // Reset lands while acquire is still underway; the late-arriving mic
    // must still be released.
    tokio::time::sleep(Duration::from_millis(10)).await;
    orchestrator.reset().await;

    starter.await.unwrap().unwrap();

    assert_eq!(orchestrator.state().await, RecordingState::Idle);
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reset_during_capture_start_releases_microphone() {
    let (device, acquired, released) = TestDevice::slow_start(Duration::from_millis(60));
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    orchestrator
        .start_prep(PracticeSession::new(motion("topic"), 60, None))
        .await
        .unwrap();

    // The prep countdown is 10 ticks of 5ms; by 75ms the recording start is
    // stalled inside the mic's `start`. Reset in that window.
    tokio::time::sleep(Duration::from_millis(75)).await;
    orchestrator.reset().await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(orchestrator.state().await, RecordingState::Idle);
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_stop_and_timer_expiry_reconcile_once() {
    let (device, _, released) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![RecognizerEvent::FinalChunk("both paths race here".to_string())],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, scoring_calls) = TestScoring::ok();

    // A long settle delay holds the stop path open so the manual stop
    // overlaps the timer-driven one.
    let mut cfg = fast_config();
    cfg.settle_delay = Duration::from_millis(150);

    let orchestrator = RecordingOrchestrator::new(cfg, device, recognizer, fallback, scoring, None);

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Recording, Duration::from_secs(2)).await;

    // The record countdown elapses at ~10ms; issue manual stops into the
    // in-flight finish.
    tokio::time::sleep(Duration::from_millis(15)).await;
    orchestrator.stop_recording().await.unwrap();
    orchestrator.stop_recording().await.unwrap();

    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    // One reconciliation: the sealed capture and transcript survive, the
    // device is released once, and nothing clobbered the result.
    assert_eq!(orchestrator.transcript_preview().await, "both paths race here");
    assert!(orchestrator.sealed_capture().await.is_some());
    assert!(orchestrator.notice().await.is_none());
    assert_eq!(released.load(Ordering::SeqCst), 1);

    let report = orchestrator.submit_recording().await.unwrap();
    assert_eq!(report.scores.total, 73.0);
    assert_eq!(scoring_calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.state().await, RecordingState::Completed);
}

#[tokio::test]
async fn device_denial_keeps_state_idle_with_notice() {
    let device = TestDevice::denying();
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        Arc::new(UnsupportedRecognizer),
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 60, None);
    let err = orchestrator.start_prep(session).await;
    assert!(err.is_err());
    assert_eq!(orchestrator.state().await, RecordingState::Idle);

    let notice = orchestrator.notice().await.expect("device error notice");
    assert_eq!(notice.tone, NoticeTone::Error);

    // A retry is allowed from Idle.
    assert_eq!(orchestrator.state().await, RecordingState::Idle);
}

#[tokio::test]
async fn dead_recognizer_degrades_to_fallback_mode() {
    let (device, _, _) = TestDevice::new();
    // One stream that errors and drops; every restart attempt then fails.
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![RecognizerEvent::Error(StreamErrorKind::Network)],
        keep_open: false,
    }]);
    let (fallback, _) = TestFallback::ok("recovered via the cloud");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 3, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    // The stream error never aborted the capture; fallback is offered.
    assert!(orchestrator.fallback_available().await);
    assert!(orchestrator.sealed_capture().await.is_some());
}

#[tokio::test]
async fn scoring_failure_resets_session_for_retry() {
    let (device, _, _) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![RecognizerEvent::FinalChunk(
            "an argument worth scoring".to_string(),
        )],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let scoring = TestScoring::failing();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    let session = PracticeSession::new(motion("topic"), 2, None);
    orchestrator.start_prep(session).await.unwrap();
    wait_for_state(&orchestrator, RecordingState::Completed, Duration::from_secs(2)).await;

    let err = orchestrator.submit_recording().await;
    assert!(err.is_err());

    // The session reset for retry, with a descriptive notice.
    assert_eq!(orchestrator.state().await, RecordingState::Idle);
    let notice = orchestrator.notice().await.expect("scoring failure notice");
    assert_eq!(notice.tone, NoticeTone::Error);
}

#[tokio::test]
async fn start_prep_outside_idle_is_a_no_op() {
    let (device, acquired, _) = TestDevice::new();
    let recognizer = ScriptedRecognizer::new(vec![ScriptRun {
        events: vec![],
        keep_open: true,
    }]);
    let (fallback, _) = TestFallback::ok("unused");
    let (scoring, _) = TestScoring::ok();

    let orchestrator = RecordingOrchestrator::new(
        fast_config(),
        device,
        recognizer,
        fallback,
        scoring,
        None,
    );

    orchestrator
        .start_prep(PracticeSession::new(motion("topic"), 10_000, None))
        .await
        .unwrap();
    assert_eq!(orchestrator.state().await, RecordingState::Preparing);

    // The device must not be acquired twice.
    orchestrator
        .start_prep(PracticeSession::new(motion("another"), 10_000, None))
        .await
        .unwrap();
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
}
