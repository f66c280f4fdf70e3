//! Score ranking
//!
//! Orders persisted score records for the ranking view.

use dividend_core::{Metric, ScoreRecord};
use std::cmp::Ordering;

/// Ranks score records by total, highest first
#[derive(Debug, Clone, Default)]
pub struct ScoreRanker {
    /// Records below this total are dropped by [`ScoreRanker::filter_min_total`]
    pub min_total: u32,
}

impl ScoreRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_total(min_total: u32) -> Self {
        Self { min_total }
    }

    /// Sort by total descending; ties break on ticker ascending so the order is stable
    pub fn rank(&self, records: &mut [ScoreRecord]) {
        records.sort_by(compare_records);
    }

    /// Sort by one metric's sub-score descending, then by total
    pub fn rank_by_metric(&self, records: &mut [ScoreRecord], metric: Metric) {
        records.sort_by(|a, b| {
            b.score_detail
                .get(metric)
                .cmp(&a.score_detail.get(metric))
                .then_with(|| compare_records(a, b))
        });
    }

    pub fn filter_min_total(&self, records: &[ScoreRecord]) -> Vec<ScoreRecord> {
        records
            .iter()
            .filter(|r| r.total_score >= self.min_total)
            .cloned()
            .collect()
    }

    /// Get top N records
    pub fn top_n(&self, records: &[ScoreRecord], n: usize) -> Vec<ScoreRecord> {
        records.iter().take(n).cloned().collect()
    }
}

fn compare_records(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.total_score
        .cmp(&a.total_score)
        .then_with(|| a.ticker.cmp(&b.ticker))
}
