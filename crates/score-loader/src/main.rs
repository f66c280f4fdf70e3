//! score-loader: fetch raw financials for a list of tickers, score them on the
//! dividend growth rubric and persist the latest score per ticker.
//!
//! Usage:
//!   cargo run -p score-loader -- --symbols 7203 8058.T 9432
//!   cargo run -p score-loader -- --tickers-file tickers.txt --only-new
//!   cargo run -p score-loader -- --symbols 8306 --as-of 2025-07-01 --dry-run
//!   cargo run -p score-loader -- --tickers-file tickers.txt --top 20 --sort-by dividend_yield

mod config;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use config::LoaderConfig;
use dividend_analysis::{DividendScoringEngine, ScoreRanker, ScoringProfile};
use dividend_core::{MarketDataProvider, Metric, ScoreRecord, ScoreStore, ScoringError};
use market_data_client::{FileProvider, MarketDataClient};
use score_store::ScoreDb;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

const DEFAULT_TOP: usize = 20;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    symbols: Vec<String>,
    tickers_file: Option<String>,
    as_of: Option<NaiveDate>,
    dry_run: bool,
    only_new: bool,
    top: Option<usize>,
    concurrency: Option<usize>,
    min_total: Option<u32>,
    sort_by: Option<Metric>,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_number<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    flag_value(args, flag)
        .map(|v| {
            v.parse()
                .map_err(|_| anyhow::anyhow!("{} expects a number, got {}", flag, v))
        })
        .transpose()
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let symbols = match args.iter().position(|a| a == "--symbols") {
        Some(idx) => args[idx + 1..]
            .iter()
            .take_while(|a| !a.starts_with("--"))
            .flat_map(|a| a.split(','))
            .filter(|s| !s.trim().is_empty())
            .map(normalize_ticker)
            .collect(),
        None => Vec::new(),
    };

    let as_of = flag_value(args, "--as-of")
        .map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").with_context(|| format!("--as-of expects YYYY-MM-DD, got {}", v)))
        .transpose()?;
    let sort_by = flag_value(args, "--sort-by")
        .map(|v| Metric::from_key(v).ok_or_else(|| anyhow::anyhow!("--sort-by: unknown metric {}", v)))
        .transpose()?;

    Ok(CliArgs {
        symbols,
        tickers_file: flag_value(args, "--tickers-file").map(str::to_string),
        as_of,
        dry_run: args.iter().any(|a| a == "--dry-run"),
        only_new: args.iter().any(|a| a == "--only-new"),
        top: parse_number(args, "--top")?,
        concurrency: parse_number(args, "--concurrency")?,
        min_total: parse_number(args, "--min-total")?,
        sort_by,
    })
}

/// Upper-case the ticker and add the `.T` suffix to bare Tokyo codes (`7203`, `130A`)
fn normalize_ticker(raw: &str) -> String {
    let ticker = raw.trim().to_uppercase();
    let is_tse_code = ticker.len() == 4
        && ticker.starts_with(|c: char| c.is_ascii_digit())
        && ticker.chars().all(|c| c.is_ascii_alphanumeric());
    if is_tse_code {
        format!("{}.T", ticker)
    } else {
        ticker
    }
}

/// One ticker per line or comma-separated; `#` starts a comment
fn parse_tickers_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(normalize_ticker)
        .collect()
}

fn dedupe(tickers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Drop tickers that already have a stored score
async fn filter_new_tickers(store: &dyn ScoreStore, tickers: Vec<String>) -> Result<Vec<String>, ScoringError> {
    let existing: HashSet<String> = store.list_tickers().await?.into_iter().collect();
    Ok(tickers.into_iter().filter(|t| !existing.contains(t)).collect())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  score-loader --symbols 7203 8058.T ...  Score specific tickers");
    eprintln!("  score-loader --tickers-file PATH        Score tickers listed in a file");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --as-of YYYY-MM-DD   Evaluation date (default: today, UTC)");
    eprintln!("  --dry-run            Score and print without writing to the DB");
    eprintln!("  --only-new           Skip tickers that already have a stored score");
    eprintln!("  --top N              Rows in the ranking view (default: {})", DEFAULT_TOP);
    eprintln!("  --min-total N        Hide rows with a total below N");
    eprintln!("  --sort-by METRIC     Order the ranking by one sub-score (e.g. dividend_yield)");
    eprintln!("  --concurrency N      Max parallel tickers (default: SCORE_CONCURRENCY or 10)");
}

async fn build_engine(config: &LoaderConfig) -> Result<DividendScoringEngine> {
    let Some(path) = &config.score_config else {
        return Ok(DividendScoringEngine::new().with_rubric(config.rubric()));
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read scoring profile {}", path.display()))?;
    let profile = ScoringProfile::from_json(&json)
        .with_context(|| format!("invalid scoring profile {}", path.display()))?;
    tracing::info!("Using scoring profile {}", path.display());
    Ok(DividendScoringEngine::from_profile(profile, config.rubric()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "score_loader=info,market_data_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;
    let config = LoaderConfig::from_env()?;

    let mut tickers = cli.symbols.clone();
    if let Some(path) = &cli.tickers_file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read tickers file {}", path))?;
        tickers.extend(parse_tickers_file(&contents));
    }
    let mut tickers = dedupe(tickers);
    if tickers.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    let as_of = cli.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let concurrency = cli.concurrency.unwrap_or(config.concurrency).max(1);
    let top = cli.top.unwrap_or(DEFAULT_TOP);
    let only_new = cli.only_new || config.skip_existing;

    let provider: Arc<dyn MarketDataProvider> = match &config.bundle_dir {
        Some(dir) => {
            tracing::info!("Reading bundles from {}", dir.display());
            Arc::new(FileProvider::new(dir))
        }
        None => Arc::new(MarketDataClient::new(
            &config.market_data_base_url,
            config.market_data_api_key.clone(),
            config.rate_limit_per_minute,
        )),
    };

    // A dry run still reads the store when it has to skip existing tickers
    let store = if cli.dry_run && !only_new {
        None
    } else {
        let db = ScoreDb::new(&config.database_url)
            .await
            .with_context(|| format!("failed to open {}", config.database_url))?;
        Some(Arc::new(db))
    };

    if only_new {
        if let Some(store) = &store {
            let requested = tickers.len();
            tickers = filter_new_tickers(store.as_ref(), tickers).await?;
            tracing::info!("{} already scored, {} new", requested - tickers.len(), tickers.len());
        }
    }

    let engine = Arc::new(build_engine(&config).await?);

    tracing::info!(
        "score-loader: {} tickers, as_of={}, rubric={}, dry_run={}, only_new={}, concurrency={}",
        tickers.len(), as_of, config.rubric, cli.dry_run, only_new, concurrency
    );

    let writer = if cli.dry_run { None } else { store.clone() };
    let outcome = score_batch(provider, engine, writer, tickers, as_of, concurrency).await;
    tracing::info!("Done! {} scored, {} failed", outcome.scored.len(), outcome.failed);

    let filtered_view = cli.min_total.is_some() || cli.sort_by.is_some();
    let candidates = match (&store, cli.dry_run) {
        (Some(store), false) => store.list_ranked(if filtered_view { usize::MAX } else { top }).await?,
        _ => outcome.scored,
    };
    let ranking = build_ranking(candidates, cli.min_total.unwrap_or(0), cli.sort_by, top);
    print!("{}", render_ranking(&ranking));

    Ok(())
}

struct BatchOutcome {
    scored: Vec<ScoreRecord>,
    failed: u64,
}

/// Score every ticker with at most `concurrency` in flight. Failed tickers are
/// logged, counted and left untouched in the store.
async fn score_batch(
    provider: Arc<dyn MarketDataProvider>,
    engine: Arc<DividendScoringEngine>,
    store: Option<Arc<ScoreDb>>,
    tickers: Vec<String>,
    as_of: NaiveDate,
    concurrency: usize,
) -> BatchOutcome {
    let total_tickers = tickers.len();
    let completed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(total_tickers);

    for ticker in tickers {
        let provider = Arc::clone(&provider);
        let engine = Arc::clone(&engine);
        let store = store.clone();
        let completed = Arc::clone(&completed);
        let failed = Arc::clone(&failed);
        let semaphore = Arc::clone(&semaphore);

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };

            let result = process_ticker(provider.as_ref(), &engine, store.as_deref(), &ticker, as_of).await;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;

            match result {
                Ok(record) => {
                    tracing::info!("[{}/{}] {} => {}", done, total_tickers, ticker, record.total_score);
                    Some(record)
                }
                Err(e) if e.is_upstream() => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("[{}/{}] {} not scored this cycle: {}", done, total_tickers, ticker, e);
                    None
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("[{}/{}] {} failed: {}", done, total_tickers, ticker, e);
                    None
                }
            }
        });

        handles.push(handle);
    }

    let mut scored = Vec::with_capacity(total_tickers);
    for handle in handles {
        match handle.await {
            Ok(Some(record)) => scored.push(record),
            Ok(None) => {}
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("scoring task aborted: {}", e);
            }
        }
    }

    BatchOutcome {
        scored,
        failed: failed.load(Ordering::Relaxed),
    }
}

async fn process_ticker(
    provider: &dyn MarketDataProvider,
    engine: &DividendScoringEngine,
    store: Option<&ScoreDb>,
    ticker: &str,
    as_of: NaiveDate,
) -> Result<ScoreRecord, ScoringError> {
    let bundle = provider.fetch_bundle(ticker).await?;
    if bundle.is_empty() {
        tracing::debug!("{} returned no usable data, scoring floors", ticker);
    }

    let scores = engine.score(ticker, &bundle, as_of)?;
    let record = ScoreRecord::from_scores(&scores, Utc::now());

    if let Some(store) = store {
        store.upsert(&record).await?;
    }
    Ok(record)
}

/// Apply the ranking view options: minimum total, ordering, row limit
fn build_ranking(records: Vec<ScoreRecord>, min_total: u32, sort_by: Option<Metric>, top: usize) -> Vec<ScoreRecord> {
    let ranker = ScoreRanker::with_min_total(min_total);
    let mut records = ranker.filter_min_total(&records);
    match sort_by {
        Some(metric) => ranker.rank_by_metric(&mut records, metric),
        None => ranker.rank(&mut records),
    }
    ranker.top_n(&records, top)
}

/// Ranking table followed by the per-metric breakdown of each row
fn render_ranking(records: &[ScoreRecord]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        out.push_str("No scores to show.\n");
        return out;
    }

    out.push_str(&format!("{:>4}  {:<10} {:>5}  {}\n", "Rank", "Ticker", "Total", "Updated"));
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<10} {:>5}  {}\n",
            i + 1,
            record.ticker,
            record.total_score,
            record.last_update.format("%Y-%m-%d %H:%M")
        ));
    }

    for record in records {
        out.push_str(&format!("\n{} ({}/100)\n", record.ticker, record.total_score));
        for metric in Metric::ALL {
            out.push_str(&format!(
                "  {:<32} {:>2}/10\n",
                metric.to_label(),
                record.score_detail.get(metric)
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dividend_core::{RawFinancialBundle, ScoreDetail};

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("score-loader")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
    }

    fn record(ticker: &str, per_metric: u8) -> ScoreRecord {
        ScoreRecord::new(ticker, ScoreDetail::from_fn(|_| per_metric), Utc::now())
    }

    /// Serves empty bundles and counts fetches
    #[derive(Default)]
    struct CountingProvider {
        fetched: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        async fn fetch_bundle(&self, ticker: &str) -> Result<RawFinancialBundle, ScoringError> {
            if let Ok(mut fetched) = self.fetched.lock() {
                fetched.push(ticker.to_string());
            }
            match ticker {
                "0000.T" => Err(ScoringError::NotFound(ticker.to_string())),
                "PANIC.T" => panic!("provider blew up"),
                _ => Ok(RawFinancialBundle::empty(ticker)),
            }
        }
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("7203"), "7203.T");
        assert_eq!(normalize_ticker(" 130a "), "130A.T");
        assert_eq!(normalize_ticker("8058.t"), "8058.T");
        assert_eq!(normalize_ticker("aapl"), "AAPL");
        assert_eq!(normalize_ticker("72030"), "72030");
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(&args(&[
            "--symbols", "7203", "8058.T,9432", "--as-of", "2025-07-01", "--dry-run", "--top", "5",
        ]))
        .unwrap();
        assert_eq!(cli.symbols, vec!["7203.T", "8058.T", "9432.T"]);
        assert_eq!(cli.as_of, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert!(cli.dry_run);
        assert!(!cli.only_new);
        assert_eq!(cli.top, Some(5));
        assert_eq!(cli.concurrency, None);
        assert_eq!(cli.tickers_file, None);
    }

    #[test]
    fn test_parse_ranking_flags() {
        let cli = parse_args(&args(&["--only-new", "--min-total", "60", "--sort-by", "dividend-yield"])).unwrap();
        assert!(cli.only_new);
        assert_eq!(cli.min_total, Some(60));
        assert_eq!(cli.sort_by, Some(Metric::DividendYield));
        assert!(parse_args(&args(&["--sort-by", "eps"])).is_err());
    }

    #[test]
    fn test_parse_args_rejects_bad_values() {
        assert!(parse_args(&args(&["--as-of", "07/01/2025"])).is_err());
        assert!(parse_args(&args(&["--top", "many"])).is_err());
        assert!(parse_args(&args(&["--min-total", "-1"])).is_err());
        assert_eq!(parse_args(&args(&[])).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_parse_tickers_file_and_dedupe() {
        let tickers = parse_tickers_file("# core holdings\n7203\n8058.T, 9432 # telecom\n\n7203.T\n");
        assert_eq!(dedupe(tickers), vec!["7203.T", "8058.T", "9432.T"]);
    }

    #[test]
    fn test_build_ranking_applies_view_options() {
        let mut high_yield = record("9433.T", 6);
        high_yield.score_detail.set(Metric::DividendYield, 10);
        high_yield.total_score = high_yield.score_detail.total();
        let records = vec![record("8058.T", 8), high_yield, record("1301.T", 2), record("2914.T", 7)];

        let by_total = build_ranking(records.clone(), 0, None, 10);
        let order: Vec<&str> = by_total.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, ["8058.T", "2914.T", "9433.T", "1301.T"]);

        let by_yield = build_ranking(records.clone(), 60, Some(Metric::DividendYield), 2);
        let order: Vec<&str> = by_yield.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, ["9433.T", "8058.T"]);
    }

    #[test]
    fn test_render_ranking() {
        let out = render_ranking(&[record("8058.T", 8)]);
        assert!(out.contains("8058.T (80/100)"));
        assert_eq!(out.matches(" 8/10").count(), 10);
        assert_eq!(render_ranking(&[]), "No scores to show.\n");
    }

    #[tokio::test]
    async fn test_only_new_skips_stored_tickers() {
        let db = Arc::new(ScoreDb::new("sqlite::memory:").await.unwrap());
        db.upsert(&record("7203.T", 8)).await.unwrap();

        let requested = vec!["7203.T".to_string(), "8058.T".to_string()];
        let tickers = filter_new_tickers(db.as_ref(), requested).await.unwrap();
        assert_eq!(tickers, vec!["8058.T"]);

        let provider = Arc::new(CountingProvider::default());
        let outcome = score_batch(
            provider.clone(),
            Arc::new(DividendScoringEngine::new()),
            Some(Arc::clone(&db)),
            tickers,
            as_of(),
            4,
        )
        .await;

        assert_eq!(*provider.fetched.lock().unwrap(), vec!["8058.T"]);
        assert_eq!(outcome.scored.len(), 1);
        assert_eq!(db.list_tickers().await.unwrap(), vec!["7203.T", "8058.T"]);
        // The existing record was not rewritten
        assert_eq!(db.get("7203.T").await.unwrap().unwrap().total_score, 80);
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_not_written() {
        let db = Arc::new(ScoreDb::new("sqlite::memory:").await.unwrap());
        let tickers = vec!["0000.T".to_string(), "PANIC.T".to_string(), "9432.T".to_string()];

        let outcome = score_batch(
            Arc::new(CountingProvider::default()),
            Arc::new(DividendScoringEngine::new()),
            Some(Arc::clone(&db)),
            tickers,
            as_of(),
            2,
        )
        .await;

        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.scored.len(), 1);
        assert_eq!(outcome.scored[0].ticker, "9432.T");
        assert_eq!(db.list_tickers().await.unwrap(), vec!["9432.T"]);
    }
}
