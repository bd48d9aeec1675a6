pub mod stream;

pub use stream::{LiveTranscriptionStream, StreamSnapshot};

use crate::error::{StreamError, StreamErrorKind};
use tokio::sync::mpsc;

/// Normalized events from a real-time recognizer.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// Provisional text; fully replaces any previous interim text.
    Interim(String),
    /// Confirmed text; appended to the running transcript.
    FinalChunk(String),
    /// Mid-stream error. Never fatal to the audio capture.
    Error(StreamErrorKind),
    /// The stream terminated (platform auto-timeout or explicit stop).
    Ended,
}

/// A continuous, interim-enabled speech recognition capability.
///
/// Implementations must tolerate repeated `start` calls: the live stream
/// restarts recognizers to mask platform-level auto-timeouts of long-lived
/// streams.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether live recognition exists at all on this platform. When false,
    /// the orchestrator goes straight to fallback mode without an error.
    fn is_supported(&self) -> bool {
        true
    }

    /// Begin a recognition stream. Returns a channel receiver of events;
    /// the sender side closing is equivalent to an `Ended` event.
    async fn start(&self) -> Result<mpsc::Receiver<RecognizerEvent>, StreamError>;

    /// Ask the current stream to terminate. Idempotent.
    async fn stop(&self);
}

/// Stand-in for platforms with no live recognition capability.
pub struct UnsupportedRecognizer;

#[async_trait::async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<mpsc::Receiver<RecognizerEvent>, StreamError> {
        Err(StreamError::Unsupported)
    }

    async fn stop(&self) {}
}
