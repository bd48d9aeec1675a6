//! Scoring collaborator contract.
//!
//! The orchestrator hands `(audio, transcript)` off exactly once; this module
//! defines the request/report shapes and an HTTP client against an
//! OpenAI-compatible chat-completions endpoint that returns the report as
//! JSON. Endpoint internals are out of the core's scope; only the contract
//! matters here.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::ScoringError;

/// Input contract for the scoring call.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringRequest {
    pub transcript: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stance: Option<String>,
    pub duration_seconds: u64,
}

/// Rubric scores, each 0–100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RubricScores {
    pub logic: f32,
    pub rhetoric: f32,
    pub empathy: f32,
    pub delivery: f32,
    pub total: f32,
}

/// Per-rubric written feedback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RubricFeedback {
    pub logic: String,
    pub rhetoric: String,
    pub empathy: String,
    pub delivery: String,
}

/// Output contract of the scoring call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    pub scores: RubricScores,
    pub feedback: RubricFeedback,
    #[serde(default)]
    pub missing_points: Vec<String>,
    #[serde(default)]
    pub enhanced_argument: String,
}

/// Remote analysis of a practice-round transcript.
#[async_trait::async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport, ScoringError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Base URL of an OpenAI-compatible endpoint
    pub base_url: String,
    /// API credential; attached as a Bearer header only when non-empty
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Scores transcripts via `/v1/chat/completions`.
pub struct HttpScoringService {
    client: reqwest::Client,
    config: ScoringConfig,
}

impl HttpScoringService {
    pub fn new(config: ScoringConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    fn build_prompt(request: &ScoringRequest) -> (String, String) {
        let system = "You are a debate coach. Score the speech on logic, rhetoric, \
                      empathy and delivery (0-100 each, plus a total), give one short \
                      paragraph of feedback per rubric, list missing points, and write \
                      an enhanced version of the argument. Respond with a single JSON \
                      object with keys: scores {logic, rhetoric, empathy, delivery, \
                      total}, feedback {logic, rhetoric, empathy, delivery}, \
                      missing_points, enhanced_argument."
            .to_string();

        let stance = request
            .stance
            .as_deref()
            .map(|s| format!("\nStance: {s}"))
            .unwrap_or_default();

        let user = format!(
            "Motion: {}{stance}\nSpeech length: {} seconds\n\nTranscript:\n{}",
            request.topic, request.duration_seconds, request.transcript
        );

        (system, user)
    }
}

#[async_trait::async_trait]
impl ScoringService for HttpScoringService {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport, ScoringError> {
        let (system, user) = Self::build_prompt(request);
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ScoringError::Generic("empty scoring response".to_string()))?;

        let report: ScoreReport = serde_json::from_str(extract_json(content))
            .map_err(|e| ScoringError::Generic(format!("unparseable score report: {e}")))?;

        info!("scoring complete: total {:.0}", report.scores.total);
        Ok(report)
    }
}

fn classify_status(status: StatusCode) -> ScoringError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ScoringError::RateLimited,
        s if s.is_server_error() => ScoringError::Unavailable,
        s => ScoringError::Generic(format!("scoring service returned HTTP {s}")),
    }
}

/// Models sometimes wrap JSON answers in markdown fences.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
