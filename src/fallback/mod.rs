//! Cloud fallback transcription: upload the sealed capture, submit a
//! transcription job, poll until it completes.
//!
//! Used when live recognition is unsupported or produced nothing. The client
//! itself enforces no hard deadline beyond an optional poll cap; callers
//! apply their own bounded wait.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::audio::SealedCapture;
use crate::error::FallbackError;

/// Asynchronous remote transcription of a completed audio buffer.
#[async_trait::async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio: &SealedCapture) -> Result<String, FallbackError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    /// Base URL of the transcription service
    pub base_url: String,
    /// API credential, sent only to this service
    pub api_key: String,
    /// Fixed interval between job status polls
    pub poll_interval_secs: u64,
    /// Optional cap on poll attempts; `None` leaves bounding to the caller
    #[serde(default)]
    pub max_polls: Option<u32>,
    /// Language hint for the transcription job
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.assemblyai.com".to_string(),
            api_key: String::new(),
            poll_interval_secs: 3,
            max_polls: None,
            language: default_language(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of the upload → submit-job → poll protocol.
pub struct HttpTranscriptionService {
    client: reqwest::Client,
    config: FallbackConfig,
}

impl HttpTranscriptionService {
    pub fn new(config: FallbackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    async fn upload(&self, audio: &SealedCapture) -> Result<String, FallbackError> {
        let url = format!("{}/v2/upload", self.config.base_url);

        let resp = self
            .client
            .post(&url)
            .header("authorization", &self.config.api_key)
            .body(audio.wav_bytes().to_vec())
            .send()
            .await
            .map_err(|e| FallbackError::Upload(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FallbackError::Upload(format!(
                "upload returned HTTP {}",
                resp.status()
            )));
        }

        let upload: UploadResponse = resp
            .json()
            .await
            .map_err(|e| FallbackError::Upload(e.to_string()))?;

        debug!("audio uploaded for fallback transcription");
        Ok(upload.upload_url)
    }

    async fn submit_job(&self, audio_url: &str) -> Result<String, FallbackError> {
        let url = format!("{}/v2/transcript", self.config.base_url);

        let body = serde_json::json!({
            "audio_url": audio_url,
            "language_code": self.config.language,
        });

        let resp = self
            .client
            .post(&url)
            .header("authorization", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FallbackError::JobSubmission(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FallbackError::JobSubmission(format!(
                "job submission returned HTTP {}",
                resp.status()
            )));
        }

        let job: JobResponse = resp
            .json()
            .await
            .map_err(|e| FallbackError::JobSubmission(e.to_string()))?;

        debug!("transcription job submitted: {}", job.id);
        Ok(job.id)
    }

    async fn poll_job(&self, job_id: &str) -> Result<String, FallbackError> {
        let url = format!("{}/v2/transcript/{}", self.config.base_url, job_id);
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut polls = 0u32;

        loop {
            if let Some(max) = self.config.max_polls {
                if polls >= max {
                    return Err(FallbackError::PollTimeout);
                }
            }
            polls += 1;

            tokio::time::sleep(interval).await;

            let status: JobStatusResponse = self
                .client
                .get(&url)
                .header("authorization", &self.config.api_key)
                .send()
                .await
                .map_err(|e| FallbackError::JobSubmission(e.to_string()))?
                .json()
                .await
                .map_err(|e| FallbackError::JobSubmission(e.to_string()))?;

            match status.status.as_str() {
                "completed" => {
                    let text = status.text.unwrap_or_default();
                    if text.trim().is_empty() {
                        return Err(FallbackError::EmptyResult);
                    }
                    return Ok(text.trim().to_string());
                }
                "error" => {
                    return Err(FallbackError::JobSubmission(
                        status.error.unwrap_or_else(|| "job failed".to_string()),
                    ));
                }
                other => {
                    debug!("transcription job {job_id} still {other}");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn transcribe(&self, audio: &SealedCapture) -> Result<String, FallbackError> {
        info!(
            "starting fallback transcription ({:.1}s of audio)",
            audio.duration_seconds()
        );

        let audio_url = self.upload(audio).await?;
        let job_id = self.submit_job(&audio_url).await?;
        let text = self.poll_job(&job_id).await?;

        info!("fallback transcription complete ({} chars)", text.len());
        Ok(text)
    }
}
