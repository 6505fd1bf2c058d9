use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::docs::Corpus;
use crate::pipeline::capability::SummaryOptions;
use crate::pipeline::Pipeline;

/// Tunable pipeline parameters, read from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub similarity_threshold: f32,
    pub chunk_size: usize,
    pub summary_max_length: usize,
    pub summary_min_length: usize,
    pub max_concurrency: usize,
    pub task_timeout: Duration,
    pub cache_embeddings: bool,
    pub strip_stop_words: bool,
    pub exclusive_capabilities: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            chunk_size: 512,
            summary_max_length: 100,
            summary_min_length: 30,
            max_concurrency: default_concurrency(),
            task_timeout: Duration::from_secs(120),
            cache_embeddings: false,
            strip_stop_words: false,
            exclusive_capabilities: false,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Read `key` and parse it, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            similarity_threshold: env_or("SIMILARITY_THRESHOLD", defaults.similarity_threshold)?,
            chunk_size: env_or("CHUNK_SIZE", defaults.chunk_size)?,
            summary_max_length: env_or("SUMMARY_MAX_LENGTH", defaults.summary_max_length)?,
            summary_min_length: env_or("SUMMARY_MIN_LENGTH", defaults.summary_min_length)?,
            max_concurrency: env_or("MAX_CONCURRENCY", defaults.max_concurrency)?,
            task_timeout: Duration::from_secs(env_or(
                "TASK_TIMEOUT_SECS",
                defaults.task_timeout.as_secs(),
            )?),
            cache_embeddings: env_or("CACHE_EMBEDDINGS", defaults.cache_embeddings)?,
            strip_stop_words: env_or("STRIP_STOP_WORDS", defaults.strip_stop_words)?,
            exclusive_capabilities: env_or(
                "EXCLUSIVE_CAPABILITIES",
                defaults.exclusive_capabilities,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (-1.0..=1.0).contains(&self.similarity_threshold),
            "similarity_threshold must be within [-1, 1], got {}",
            self.similarity_threshold
        );
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(self.summary_max_length > 0, "summary_max_length must be positive");
        anyhow::ensure!(
            self.summary_min_length <= self.summary_max_length,
            "summary_min_length ({}) exceeds summary_max_length ({})",
            self.summary_min_length,
            self.summary_max_length
        );
        anyhow::ensure!(self.max_concurrency > 0, "max_concurrency must be positive");
        anyhow::ensure!(!self.task_timeout.is_zero(), "task_timeout must be positive");
        Ok(())
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            max_length: self.summary_max_length,
            min_length: self.summary_min_length,
            sample: false,
        }
    }
}

pub struct AppState {
    pub corpus: Corpus,
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<PipelineConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.chunk_size, 512);
        assert!(config.max_concurrency >= 1);
        assert!(!config.summary_options().sample);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            PipelineConfig {
                chunk_size: 0,
                ..Default::default()
            },
            PipelineConfig {
                similarity_threshold: 1.5,
                ..Default::default()
            },
            PipelineConfig {
                summary_min_length: 200,
                ..Default::default()
            },
            PipelineConfig {
                max_concurrency: 0,
                ..Default::default()
            },
            PipelineConfig {
                task_timeout: Duration::ZERO,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_env_or_parses_and_defaults() {
        assert_eq!(env_or("CHAT_VERIFY_TEST_UNSET_KEY", 7usize).unwrap(), 7);
        std::env::set_var("CHAT_VERIFY_TEST_BAD_KEY", "seven");
        assert!(env_or("CHAT_VERIFY_TEST_BAD_KEY", 7usize).is_err());
        std::env::set_var("CHAT_VERIFY_TEST_GOOD_KEY", " 0.55 ");
        assert_eq!(env_or("CHAT_VERIFY_TEST_GOOD_KEY", 0.7f32).unwrap(), 0.55);
    }
}
