//! Dividend growth scoring
//!
//! Turns a ticker's raw financial records into ten rubric metrics, maps each
//! through a threshold ladder to a 0-10 sub-score, and sums them to a 0-100 total.

pub mod config;
pub mod dividends;
pub mod engine;
pub mod extractor;
pub mod growth;
pub mod labels;
pub mod ranking;
pub mod rubric;
pub mod series;

pub use config::{ExtractorConfig, ScoringProfile};
pub use dividends::{adjust_for_splits, AnnualDividends};
pub use engine::DividendScoringEngine;
pub use extractor::{normalize_yield_pct, MetricExtractor};
pub use growth::{cagr, consecutive_growth_years, trailing_cagr};
pub use labels::{normalize_label, LabelTable, LineItemKind};
pub use ranking::ScoreRanker;
pub use rubric::{Ladder, Rubric, Threshold, MAX_SUB_SCORE};
pub use series::Series;
