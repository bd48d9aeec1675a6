use crate::error::DeviceError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Audio sample data (16-bit PCM, interleaved).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// An audio input device that can hand out exclusive capture sessions.
///
/// Acquisition is the permission/ownership step; frames only flow once the
/// session's `start` is called. Acquisition failures carry the full
/// [`DeviceError`] taxonomy (denied, absent, in use).
#[async_trait::async_trait]
pub trait MicrophoneDevice: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn MicrophoneSession>, DeviceError>;
}

/// An exclusive hold on the audio input device.
///
/// `stop` releases the device (all tracks stopped) and closes the frame
/// channel, which is what seals the capture downstream.
#[async_trait::async_trait]
pub trait MicrophoneSession: Send + Sync {
    /// Begin capture. Returns a channel receiver that will receive frames.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Stop capture and release the device.
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Whether frames are currently flowing.
    fn is_capturing(&self) -> bool;

    /// Device name for logging.
    fn name(&self) -> &str;
}

/// Replays a WAV file as if it were a microphone. Used by the demo binary
/// and tests; frames are paced at real time so countdown behavior matches a
/// live device.
pub struct FileMicrophone {
    path: PathBuf,
    frame_duration_ms: u64,
}

impl FileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_duration_ms: 100,
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneDevice for FileMicrophone {
    async fn acquire(&self) -> Result<Box<dyn MicrophoneSession>, DeviceError> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| match e {
            hound::Error::IoError(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                DeviceError::NotFound
            }
            other => DeviceError::Other(other.to_string()),
        })?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| DeviceError::Other(format!("failed to read WAV samples: {e}")))?;

        info!(
            "file microphone acquired: {} ({} Hz, {} ch, {} samples)",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Box::new(FileMicSession {
            name: self.path.display().to_string(),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            frame_duration_ms: self.frame_duration_ms,
            stopped: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct FileMicSession {
    name: String,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    frame_duration_ms: u64,
    stopped: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl MicrophoneSession for FileMicSession {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        let (tx, rx) = mpsc::channel(64);

        let samples = std::mem::take(&mut self.samples);
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let frame_ms = self.frame_duration_ms;
        let stopped = Arc::clone(&self.stopped);
        let capturing = Arc::clone(&self.capturing);

        capturing.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let samples_per_frame =
                (sample_rate as u64 * channels as u64 * frame_ms / 1000) as usize;
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(samples_per_frame.max(1)) {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    warn!("audio frame receiver dropped; ending file playback");
                    break;
                }

                timestamp_ms += frame_ms;
                tokio::time::sleep(std::time::Duration::from_millis(frame_ms)).await;
            }

            capturing.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        self.stopped.store(true, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
