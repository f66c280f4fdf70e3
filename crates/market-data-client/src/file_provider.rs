use async_trait::async_trait;
use dividend_core::{MarketDataProvider, RawFinancialBundle, ScoringError};
use std::path::{Path, PathBuf};

/// Serves bundles saved as `{dir}/{ticker}.json`.
#[derive(Debug, Clone)]
pub struct FileProvider {
    dir: PathBuf,
}

impl FileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bundle_path(&self, ticker: &str) -> Result<PathBuf, ScoringError> {
        if ticker.is_empty() || ticker.contains(['/', '\\']) || ticker.contains("..") {
            return Err(ScoringError::NotFound(format!("invalid ticker {:?}", ticker)));
        }
        Ok(self.dir.join(format!("{}.json", ticker)))
    }
}

#[async_trait]
impl MarketDataProvider for FileProvider {
    async fn fetch_bundle(&self, ticker: &str) -> Result<RawFinancialBundle, ScoringError> {
        let path = self.bundle_path(ticker)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScoringError::NotFound(format!("no bundle at {}", path.display())));
            }
            Err(e) => return Err(ScoringError::ApiError(format!("{}: {}", path.display(), e))),
        };

        let mut bundle: RawFinancialBundle = serde_json::from_str(&raw)?;
        if bundle.ticker.is_empty() {
            bundle.ticker = ticker.to_string();
        }
        tracing::debug!(ticker, dividends = bundle.dividends.len(), "loaded bundle from disk");
        Ok(bundle)
    }
}
