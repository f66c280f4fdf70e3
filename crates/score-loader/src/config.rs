use anyhow::{Context, Result};
use dividend_analysis::Rubric;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:dividend_scores.db";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8010";

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub database_url: String,
    pub market_data_base_url: String,
    pub market_data_api_key: Option<String>,
    pub rate_limit_per_minute: usize,
    pub concurrency: usize,
    /// Read bundles from this directory instead of the HTTP provider
    pub bundle_dir: Option<PathBuf>,
    pub rubric: String,
    /// JSON scoring profile (extractor constants, rubric, label table)
    pub score_config: Option<PathBuf>,
    /// Only fetch tickers that have no stored score yet
    pub skip_existing: bool,
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self> {
        let rubric = env::var("SCORE_RUBRIC").unwrap_or_else(|_| "standard".to_string());
        if Rubric::from_name(&rubric).is_none() {
            anyhow::bail!("SCORE_RUBRIC must be 'standard' or 'strict', got '{}'", rubric);
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            market_data_base_url: env::var("MARKET_DATA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            market_data_api_key: env::var("MARKET_DATA_API_KEY").ok().filter(|k| !k.is_empty()),
            rate_limit_per_minute: env::var("MARKET_DATA_RATE_LIMIT")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("MARKET_DATA_RATE_LIMIT must be a positive integer")?,
            concurrency: env::var("SCORE_CONCURRENCY")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("SCORE_CONCURRENCY must be a positive integer")?,
            bundle_dir: env::var("BUNDLE_DIR").ok().filter(|d| !d.is_empty()).map(PathBuf::from),
            rubric,
            score_config: env::var("SCORE_CONFIG").ok().filter(|p| !p.is_empty()).map(PathBuf::from),
            skip_existing: env::var("SKIP_EXISTING")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("SKIP_EXISTING must be true or false")?,
        })
    }

    pub fn rubric(&self) -> Rubric {
        Rubric::from_name(&self.rubric).unwrap_or_default()
    }
}
