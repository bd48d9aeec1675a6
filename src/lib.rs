pub mod audio;
pub mod config;
pub mod error;
pub mod fallback;
pub mod motion;
pub mod recognizer;
pub mod scoring;
pub mod session;
pub mod store;
pub mod transcript;

pub use audio::{
    drain_capture, AudioFrame, CaptureBuffer, FileMicrophone, MicrophoneDevice,
    MicrophoneSession, SealedCapture,
};
pub use config::Config;
pub use error::{
    DeviceError, FallbackError, ScoringError, StreamError, StreamErrorKind, ValidationError,
};
pub use fallback::{FallbackConfig, HttpTranscriptionService, TranscriptionService};
pub use motion::{Motion, MotionKind, Stance};
pub use recognizer::{
    LiveTranscriptionStream, RecognizerEvent, SpeechRecognizer, StreamSnapshot,
    UnsupportedRecognizer,
};
pub use scoring::{
    HttpScoringService, RubricFeedback, RubricScores, ScoreReport, ScoringConfig,
    ScoringRequest, ScoringService,
};
pub use session::{
    Notice, NoticeTone, OrchestratorConfig, PracticeSession, RecordingOrchestrator,
    RecordingState,
};
pub use store::{JsonlStore, PracticeRecord, PracticeStore};
pub use transcript::{strip_placeholders, TranscriptSource, TranscriptState};
