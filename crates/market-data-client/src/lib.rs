//! Market data retrieval for dividend scoring.
//!
//! [`MarketDataClient`] talks to an HTTP JSON provider with client-side rate
//! limiting and 429 retry. [`FileProvider`] serves bundles saved on disk for
//! offline runs and tests.

mod file_provider;
pub mod frames;
mod rate_limiter;

pub use file_provider::FileProvider;
pub use frames::{parse_date, InfoPayload, StatementFrame};

use async_trait::async_trait;
use dividend_core::{
    DividendEvent, FinancialStatement, InfoFields, MarketDataProvider, RawFinancialBundle, ScoringError,
    SplitEvent,
};
use frames::{DividendsResponse, SplitsResponse};
use rate_limiter::RateLimiter;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_RATE_LIMIT: usize = 120;
const MAX_RETRIES: u32 = 3;
const RETRY_WAIT_SECS: u64 = 15;
const MAX_RETRY_WAIT_SECS: u64 = 120;

/// How long a 429 asks us to back off: the `Retry-After` seconds when given
/// (capped), otherwise the default wait.
fn retry_delay(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_WAIT_SECS)))
        .unwrap_or(Duration::from_secs(RETRY_WAIT_SECS))
}

#[derive(Clone)]
pub struct MarketDataClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    rate_limiter: RateLimiter,
}

impl MarketDataClient {
    /// `rate_limit` is the number of requests allowed per minute.
    pub fn new(base_url: &str, api_key: Option<String>, rate_limit: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            rate_limiter: RateLimiter::per_minute(rate_limit),
        }
    }

    fn section_url(&self, ticker: &str, section: &str) -> String {
        format!("{}/v1/tickers/{}/{}", self.base_url, ticker, section)
    }

    /// Send a request through the shared limiter. A 429 pauses the whole client
    /// for the provider's requested delay before the next attempt.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ScoringError> {
        let request = builder.build().map_err(|e| ScoringError::ApiError(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| ScoringError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| ScoringError::ApiError(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let wait = retry_delay(response.headers());
            tracing::warn!(
                "Market data 429 rate limited, pausing {}s before retry {}/{}",
                wait.as_secs(),
                attempt + 1,
                MAX_RETRIES
            );
            self.rate_limiter.cool_down(wait).await;
        }

        Err(ScoringError::RateLimited(format!(
            "still rate limited after {} retries",
            MAX_RETRIES
        )))
    }

    /// Fetch one section. A 404 means the provider has no such data for the
    /// ticker and yields the empty default; auth failures and other errors propagate.
    async fn get_section<T: DeserializeOwned + Default>(&self, ticker: &str, section: &str) -> Result<T, ScoringError> {
        let mut builder = self.client.get(self.section_url(ticker, section));
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("apiKey", key)]);
        }
        let response = self.send_request(builder).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(ticker, section, "no data from provider");
            return Ok(T::default());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ScoringError::Unauthorized(format!("HTTP {} for {} {}", status, ticker, section)));
        }
        if !status.is_success() {
            return Err(ScoringError::ApiError(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScoringError::ApiError(e.to_string()))
    }

    /// Get dividend history for a ticker
    pub async fn get_dividends(&self, ticker: &str) -> Result<Vec<DividendEvent>, ScoringError> {
        let response: DividendsResponse = self.get_section(ticker, "dividends").await?;
        Ok(frames::dividend_events(response.results))
    }

    /// Get stock split history for a ticker
    pub async fn get_splits(&self, ticker: &str) -> Result<Vec<SplitEvent>, ScoringError> {
        let response: SplitsResponse = self.get_section(ticker, "splits").await?;
        Ok(frames::split_events(response.results))
    }

    /// Get the annual income statement
    pub async fn get_income_statement(&self, ticker: &str) -> Result<FinancialStatement, ScoringError> {
        let frame: StatementFrame = self.get_section(ticker, "income-statement").await?;
        Ok(frame.into_statement())
    }

    /// Get the balance sheet
    pub async fn get_balance_sheet(&self, ticker: &str) -> Result<FinancialStatement, ScoringError> {
        let frame: StatementFrame = self.get_section(ticker, "balance-sheet").await?;
        Ok(frame.into_statement())
    }

    /// Get instantaneous info fields (ratios, market cap, price)
    pub async fn get_info(&self, ticker: &str) -> Result<InfoFields, ScoringError> {
        let payload: InfoPayload = self.get_section(ticker, "info").await?;
        Ok(payload.into())
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataClient {
    async fn fetch_bundle(&self, ticker: &str) -> Result<RawFinancialBundle, ScoringError> {
        let (dividends, splits, income, balance, info) = tokio::join!(
            self.get_dividends(ticker),
            self.get_splits(ticker),
            self.get_income_statement(ticker),
            self.get_balance_sheet(ticker),
            self.get_info(ticker),
        );

        let info = info?;
        Ok(RawFinancialBundle {
            ticker: ticker.to_string(),
            dividends: dividends?,
            splits: splits?,
            income_statement: income?,
            balance_sheet: balance?,
            latest_price: info.current_price,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_url_trims_trailing_slash() {
        let client = MarketDataClient::new("http://localhost:8010/", None, DEFAULT_RATE_LIMIT);
        assert_eq!(
            client.section_url("7203.T", "dividends"),
            "http://localhost:8010/v1/tickers/7203.T/dividends"
        );
    }

    #[test]
    fn test_retry_delay_honors_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_delay(&headers), Duration::from_secs(RETRY_WAIT_SECS));

        headers.insert(RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(retry_delay(&headers), Duration::from_secs(3));

        headers.insert(RETRY_AFTER, "86400".parse().unwrap());
        assert_eq!(retry_delay(&headers), Duration::from_secs(MAX_RETRY_WAIT_SECS));

        // HTTP-date form is not interpreted
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2025 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_delay(&headers), Duration::from_secs(RETRY_WAIT_SECS));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_error() {
        // Port 9 (discard) is not served over HTTP; the connection fails fast.
        let client = MarketDataClient::new("http://127.0.0.1:9", None, DEFAULT_RATE_LIMIT);
        let err = client.fetch_bundle("7203.T").await.unwrap_err();
        assert!(err.is_upstream(), "{}", err);
    }
}
