use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use rostrum::{
    Config, FileMicrophone, HttpScoringService, HttpTranscriptionService, JsonlStore, Motion,
    MotionKind, OrchestratorConfig, PracticeSession, RecordingOrchestrator, RecordingState,
    UnsupportedRecognizer,
};

/// Run one practice round from a WAV file against the configured services.
#[derive(Debug, Parser)]
#[command(name = "rostrum", version)]
struct Args {
    /// Config file (without extension)
    #[arg(long, default_value = "config/rostrum")]
    config: String,

    /// WAV file to replay as the microphone
    #[arg(long)]
    wav: std::path::PathBuf,

    /// Motion topic to speak on
    #[arg(long)]
    topic: String,

    /// Recording duration in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("rostrum v0.1.0");
    info!("motion: {}", args.topic);

    let motion = Motion {
        id: format!("cli-{}", uuid::Uuid::new_v4()),
        topic: args.topic.clone(),
        category: "custom".to_string(),
        description: None,
        kind: MotionKind::Opinion,
    };

    let orchestrator = RecordingOrchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(FileMicrophone::new(&args.wav)),
        Arc::new(UnsupportedRecognizer),
        Arc::new(HttpTranscriptionService::new(cfg.fallback)),
        Arc::new(HttpScoringService::new(cfg.scoring)),
        Some(Arc::new(JsonlStore::new(&cfg.storage.records_path))),
    );

    let session = PracticeSession::new(motion, args.duration, None);
    orchestrator.start_prep(session).await?;

    // Prep countdown, then the recording runs to its timer.
    while orchestrator.state().await != RecordingState::Completed {
        if let Some(notice) = orchestrator.notice().await {
            if orchestrator.state().await == RecordingState::Idle {
                anyhow::bail!("{}: {}", notice.title, notice.description.unwrap_or_default());
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    if orchestrator.fallback_available().await {
        info!("no live transcript; requesting fallback transcription");
        orchestrator.handle_transcribe().await?;
    }

    let report = orchestrator.submit_recording().await?;

    println!("total score: {:.0}", report.scores.total);
    println!(
        "logic {:.0} | rhetoric {:.0} | empathy {:.0} | delivery {:.0}",
        report.scores.logic, report.scores.rhetoric, report.scores.empathy, report.scores.delivery
    );
    for point in &report.missing_points {
        println!("missing: {point}");
    }

    orchestrator.reset().await;
    Ok(())
}
