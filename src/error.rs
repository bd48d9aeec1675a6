use thiserror::Error;

/// Microphone acquisition or hardware failures. Terminal for the current
/// attempt; the user recovers by retrying `start_prep`.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no microphone device found")]
    NotFound,

    #[error("microphone device is in use: {0}")]
    Busy(String),

    #[error("microphone failure: {0}")]
    Other(String),
}

/// Error classes surfaced by the live recognizer mid-stream. Every kind maps
/// to "keep recording audio, flag fallback mode" — none aborts the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamErrorKind {
    #[error("speech recognition permission denied")]
    PermissionDenied,

    /// Non-fatal; the recognizer simply heard nothing in its window.
    #[error("no speech detected")]
    NoSpeech,

    #[error("recognition was aborted")]
    Aborted,

    #[error("recognition network error")]
    Network,

    #[error("recognition service unavailable")]
    ServiceUnavailable,

    #[error("recognition failed")]
    Unknown,
}

/// Failure to bring a live recognition stream up at all.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("live recognition is not supported on this platform")]
    Unsupported,

    #[error("recognizer failed to start: {0}")]
    StartFailed(String),
}

/// Failures of the asynchronous upload → submit → poll transcription call.
/// All of these are retryable through the manual transcribe affordance.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("audio upload failed: {0}")]
    Upload(String),

    #[error("transcription job submission failed: {0}")]
    JobSubmission(String),

    #[error("transcription job did not complete in time")]
    PollTimeout,

    #[error("transcription service returned no text")]
    EmptyResult,
}

/// Remote scoring failures, classified so the caller can pick a
/// retry-prompting user message.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring service unavailable")]
    Unavailable,

    #[error("scoring service rate limit exceeded")]
    RateLimited,

    #[error("scoring failed: {0}")]
    Generic(String),
}

impl From<reqwest::Error> for ScoringError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ScoringError::Unavailable
        } else {
            ScoringError::Generic(e.to_string())
        }
    }
}

/// Transcript problems detected at submit time.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no transcript is available to submit")]
    TranscriptMissing,

    #[error("transcript is too short to score ({chars} characters)")]
    TranscriptTooShort { chars: usize },
}
