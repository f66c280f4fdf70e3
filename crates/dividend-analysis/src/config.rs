use dividend_core::ScoringError;
use serde::{Deserialize, Serialize};

use crate::labels::LabelTable;
use crate::rubric::Rubric;

/// Constants used by the metric extractor. Every heuristic cutoff lives here
/// rather than in the extraction logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Trailing points in a CAGR window. 6 points span 5 annual periods.
    pub cagr_window_points: usize,
    /// Payout ratio (%) considered the sustainable ceiling; headroom is measured against it.
    pub payout_target_pct: f64,
    /// Payout (%) assumed when no payout ratio can be determined.
    pub undetermined_payout_pct: f64,
    /// CN-PER considered fair value; headroom is measured against it.
    pub valuation_target: f64,
    /// CN-PER assigned when net income is non-positive or market cap is unknown.
    pub cn_per_penalty: f64,
    /// Yields (%) above this are treated as data errors and zeroed.
    pub yield_cap_pct: f64,
    /// Yearly dividend-per-share sums above this are treated as data errors and zeroed.
    pub max_annual_dividend: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            cagr_window_points: 6,
            payout_target_pct: 60.0,
            undetermined_payout_pct: 100.0,
            valuation_target: 30.0,
            cn_per_penalty: 999.0,
            yield_cap_pct: 20.0,
            max_annual_dividend: 10_000.0,
        }
    }
}

/// A complete scoring setup loadable from one JSON document. Missing sections
/// keep the built-in defaults; a missing rubric leaves the choice to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringProfile {
    pub extractor: ExtractorConfig,
    pub rubric: Option<Rubric>,
    pub labels: Option<LabelTable>,
}

impl ScoringProfile {
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        Ok(serde_json::from_str(json)?)
    }
}
