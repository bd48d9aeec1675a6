use anyhow::{Context, Result};
use std::io::Cursor;
use tokio::sync::mpsc;
use tracing::info;

use super::device::AudioFrame;

/// Accumulates raw frames while a recording is in progress. Mutable only
/// until sealed.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Format is adopted from the first frame seen.
    pub fn push_frame(&mut self, frame: &AudioFrame) {
        if self.sample_rate == 0 {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Finalize the buffer into an immutable capture, encoding the samples
    /// as a WAV byte stream.
    pub fn seal(self) -> Result<SealedCapture> {
        let sample_rate = if self.sample_rate == 0 { 16000 } else { self.sample_rate };
        let channels = if self.channels == 0 { 1 } else { self.channels };

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut wav_bytes = Vec::new();
        {
            let cursor = Cursor::new(&mut wav_bytes);
            let mut writer =
                hound::WavWriter::new(cursor, spec).context("failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("failed to write sample to WAV")?;
            }
            writer.finalize().context("failed to finalize WAV data")?;
        }

        let sample_count = self.samples.len();
        let duration_seconds =
            sample_count as f64 / (sample_rate as f64 * channels.max(1) as f64);

        info!(
            "capture sealed: {} samples ({:.1}s, {} bytes WAV)",
            sample_count,
            duration_seconds,
            wav_bytes.len()
        );

        Ok(SealedCapture {
            wav_bytes,
            sample_rate,
            channels,
            sample_count,
            duration_seconds,
        })
    }
}

/// An immutable, completed audio capture. Created exactly once per session
/// when capture stops; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SealedCapture {
    wav_bytes: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    sample_count: usize,
    duration_seconds: f64,
}

impl SealedCapture {
    pub fn wav_bytes(&self) -> &[u8] {
        &self.wav_bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
}

/// Drain a frame channel into a sealed capture. Runs until the sender side
/// closes, which happens when the microphone session stops.
pub async fn drain_capture(mut audio_rx: mpsc::Receiver<AudioFrame>) -> Result<SealedCapture> {
    let mut buffer = CaptureBuffer::new();

    while let Some(frame) = audio_rx.recv().await {
        buffer.push_frame(&frame);
    }

    buffer.seal()
}
