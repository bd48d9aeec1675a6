use anyhow::Result;
use serde::Deserialize;

use crate::fallback::FallbackConfig;
use crate::scoring::ScoringConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub audio: AudioConfig,
    pub scoring: ScoringConfig,
    pub fallback: FallbackConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub records_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
