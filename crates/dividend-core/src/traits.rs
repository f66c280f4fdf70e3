use async_trait::async_trait;
use crate::{RawFinancialBundle, ScoreRecord, ScoringError};

/// Source of raw financial records for a ticker
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_bundle(&self, ticker: &str) -> Result<RawFinancialBundle, ScoringError>;
}

/// Key-value store of the latest score per ticker
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get(&self, ticker: &str) -> Result<Option<ScoreRecord>, ScoringError>;

    /// Insert or replace the record for `record.ticker` (last write wins).
    async fn upsert(&self, record: &ScoreRecord) -> Result<(), ScoringError>;

    /// Every ticker with a stored record, ascending.
    async fn list_tickers(&self) -> Result<Vec<String>, ScoringError>;

    /// Records ordered by total score descending, ticker ascending on ties.
    async fn list_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>, ScoringError>;
}
