use std::time::Duration;

/// Timing and retry policy for the recording orchestrator.
///
/// The countdown granularity is one tick; tests shrink `tick_interval` to
/// run whole sessions in milliseconds.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Preparation countdown length, in ticks
    pub prep_ticks: u64,

    /// Real duration of one countdown tick
    pub tick_interval: Duration,

    /// Pause after capture stop so trailing recognizer events can land
    pub settle_delay: Duration,

    /// Additional wait after asking a still-active stream to terminate
    pub stream_stop_delay: Duration,

    /// Base delay before restarting a dropped recognition stream
    pub restart_delay: Duration,

    /// Consecutive restart attempts before degrading to fallback mode
    pub max_stream_restarts: u32,

    /// Interval between checks while waiting out an in-flight fallback call
    /// during submit
    pub submit_wait_interval: Duration,

    /// Number of those checks before submitting without the fallback result
    pub submit_wait_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            prep_ticks: 10,
            tick_interval: Duration::from_secs(1),
            settle_delay: Duration::from_millis(300),
            stream_stop_delay: Duration::from_millis(500),
            restart_delay: Duration::from_millis(250),
            max_stream_restarts: 5,
            submit_wait_interval: Duration::from_millis(500),
            submit_wait_attempts: 20, // ~10 seconds
        }
    }
}
