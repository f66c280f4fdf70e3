//! SQLite persistence for the latest dividend score of each ticker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dividend_core::{ScoreDetail, ScoreRecord, ScoreStore, ScoringError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

type ScoreRow = (String, i64, String, String);

fn db_err(e: sqlx::Error) -> ScoringError {
    ScoringError::DatabaseError(e.to_string())
}

#[derive(Clone)]
pub struct ScoreDb {
    pool: SqlitePool,
}

impl ScoreDb {
    /// Open (or create) the database and make sure the table exists
    pub async fn new(database_url: &str) -> Result<Self, ScoringError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        // Each in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), ScoringError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS stock_scores (
                ticker TEXT PRIMARY KEY,
                total_score INTEGER NOT NULL,
                score_detail TEXT NOT NULL,
                last_update TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_stock_scores_total ON stock_scores(total_score)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row((ticker, total_score, detail, last_update): ScoreRow) -> Result<ScoreRecord, ScoringError> {
    let score_detail: ScoreDetail = serde_json::from_str(&detail)?;
    let last_update = DateTime::parse_from_rfc3339(&last_update)
        .map_err(|e| ScoringError::SerializationError(format!("last_update for {}: {}", ticker, e)))?
        .with_timezone(&Utc);

    let stored_total = u32::try_from(total_score)
        .map_err(|_| ScoringError::SerializationError(format!("negative total_score {} for {}", total_score, ticker)))?;

    let record = ScoreRecord::new(&ticker, score_detail, last_update);
    if record.total_score != stored_total {
        return Err(ScoringError::SerializationError(format!(
            "total_score {} for {} does not match score_detail sum {}",
            stored_total, ticker, record.total_score
        )));
    }
    Ok(record)
}

#[async_trait]
impl ScoreStore for ScoreDb {
    async fn get(&self, ticker: &str) -> Result<Option<ScoreRecord>, ScoringError> {
        let row: Option<ScoreRow> = sqlx::query_as(
            "SELECT ticker, total_score, score_detail, last_update FROM stock_scores WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &ScoreRecord) -> Result<(), ScoringError> {
        if !record.is_consistent() {
            return Err(ScoringError::SerializationError(format!(
                "total_score {} for {} does not match score_detail sum {}",
                record.total_score,
                record.ticker,
                record.score_detail.total()
            )));
        }
        let detail = serde_json::to_string(&record.score_detail)?;
        sqlx::query(
            "INSERT INTO stock_scores (ticker, total_score, score_detail, last_update) VALUES (?, ?, ?, ?)
             ON CONFLICT(ticker) DO UPDATE SET
                total_score = excluded.total_score,
                score_detail = excluded.score_detail,
                last_update = excluded.last_update",
        )
        .bind(&record.ticker)
        .bind(i64::from(record.total_score))
        .bind(&detail)
        .bind(record.last_update.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(ticker = %record.ticker, total = record.total_score, "score saved");
        Ok(())
    }

    async fn list_tickers(&self) -> Result<Vec<String>, ScoringError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT ticker FROM stock_scores ORDER BY ticker ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|(ticker,)| ticker).collect())
    }

    async fn list_ranked(&self, limit: usize) -> Result<Vec<ScoreRecord>, ScoringError> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            "SELECT ticker, total_score, score_detail, last_update FROM stock_scores
             ORDER BY total_score DESC, ticker ASC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(record_from_row).collect()
    }
}
