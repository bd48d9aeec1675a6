//! Transcript buffers and reconciliation.
//!
//! Three sources feed a session's transcript: confirmed (final) chunks from
//! the live recognizer, the replaceable interim tail, and the one-shot cloud
//! fallback result. [`TranscriptState`] owns all three so the "at most one
//! winning source" invariant is enforced in a single place.

use tracing::warn;

/// Phrases that some recognizer paths embed in otherwise-empty output.
/// Treated as equivalent to no transcript at all.
pub const PLACEHOLDER_PHRASES: &[&str] = &[
    "No transcript was captured",
    "Transcription failed",
    "Could not transcribe audio",
];

/// Remove known placeholder phrases and collapse whitespace.
///
/// Idempotent: stripping text that never contained a placeholder returns the
/// same (whitespace-normalized) text.
pub fn strip_placeholders(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in PLACEHOLDER_PHRASES {
        out = out.replace(phrase, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Which source produced the winning transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    /// Accumulated final chunks from the live recognizer.
    Live,
    /// One-shot result of the cloud fallback call.
    Fallback,
}

/// All transcript state for one session.
#[derive(Debug, Clone, Default)]
pub struct TranscriptState {
    /// Confirmed recognizer output, append-only within a session.
    final_chunks: Vec<String>,

    /// Unconfirmed tail; overwritten on every recognizer update and cleared
    /// on each final commit and on stream restart.
    interim: String,

    /// Cloud fallback result, set at most once per session.
    fallback_final: Option<String>,
}

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed chunk. Empty chunks are dropped; a commit always
    /// clears the interim tail it supersedes.
    pub fn push_final_chunk(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.final_chunks.push(trimmed.to_string());
        }
        self.interim.clear();
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim = text.to_string();
    }

    pub fn clear_interim(&mut self) {
        self.interim.clear();
    }

    /// Record the fallback result. Returns false (and keeps the first value)
    /// if a result was already recorded this session.
    pub fn set_fallback(&mut self, text: &str) -> bool {
        if self.fallback_final.is_some() {
            warn!("fallback transcript already set; ignoring second result");
            return false;
        }
        self.fallback_final = Some(text.trim().to_string());
        true
    }

    /// Space-joined confirmed transcript.
    pub fn live_final(&self) -> String {
        self.final_chunks.join(" ")
    }

    /// Confirmed transcript with the current interim tail appended.
    pub fn merged_live(&self) -> String {
        let mut merged = self.live_final();
        let interim = self.interim.trim();
        if !interim.is_empty() {
            if !merged.is_empty() {
                merged.push(' ');
            }
            merged.push_str(interim);
        }
        merged
    }

    /// The single reconcile point: live final text wins if non-empty after
    /// placeholder stripping, then the fallback result. Interim text never
    /// wins.
    pub fn winning(&self) -> Option<(TranscriptSource, String)> {
        let live = strip_placeholders(&self.live_final());
        if !live.is_empty() {
            return Some((TranscriptSource::Live, live));
        }
        if let Some(fallback) = &self.fallback_final {
            let fallback = strip_placeholders(fallback);
            if !fallback.is_empty() {
                return Some((TranscriptSource::Fallback, fallback));
            }
        }
        None
    }

    /// Best text for display only. Falls back to the interim-merged live
    /// state when no source has won.
    pub fn display_text(&self) -> String {
        match self.winning() {
            Some((_, text)) => text,
            None => self.merged_live(),
        }
    }

    pub fn clear(&mut self) {
        self.final_chunks.clear();
        self.interim.clear();
        self.fallback_final = None;
    }
}
