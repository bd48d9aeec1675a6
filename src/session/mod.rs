mod config;
mod notice;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use notice::{Notice, NoticeTone};
pub use orchestrator::RecordingOrchestrator;

use crate::motion::{Motion, Stance};
use serde::Serialize;

/// One practice attempt at a motion. Immutable once created; torn down when
/// the orchestrator resets.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    pub id: String,
    pub motion: Motion,
    pub duration_seconds: u64,
    pub stance: Option<Stance>,
}

impl PracticeSession {
    pub fn new(motion: Motion, duration_seconds: u64, stance: Option<Stance>) -> Self {
        Self {
            id: format!("practice-{}", uuid::Uuid::new_v4()),
            motion,
            duration_seconds,
            stance,
        }
    }
}

/// The orchestrator's state machine value. Owned exclusively by the
/// orchestrator; mutated only by its transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    #[default]
    Idle,
    Preparing,
    Recording,
    Completed,
}
