use chrono::NaiveDate;
use dividend_core::{MetricVector, RawFinancialBundle, ScoreDetail, ScoreVector, ScoringError};

use crate::config::{ExtractorConfig, ScoringProfile};
use crate::extractor::MetricExtractor;
use crate::rubric::Rubric;

/// Scores a ticker's raw records on the 100-point dividend growth rubric.
///
/// Stateless: every call is a pure function of its arguments, so one engine can
/// be shared across threads.
pub struct DividendScoringEngine {
    extractor: MetricExtractor,
    rubric: Rubric,
}

impl DividendScoringEngine {
    pub fn new() -> Self {
        Self {
            extractor: MetricExtractor::new(),
            rubric: Rubric::standard(),
        }
    }

    /// Engine for a loaded profile; `fallback_rubric` applies when the profile names none
    pub fn from_profile(profile: ScoringProfile, fallback_rubric: Rubric) -> Self {
        let extractor = MetricExtractor::with_config(profile.extractor)
            .with_labels(profile.labels.unwrap_or_default());
        Self::new()
            .with_extractor(extractor)
            .with_rubric(profile.rubric.unwrap_or(fallback_rubric))
    }

    pub fn with_rubric(mut self, rubric: Rubric) -> Self {
        self.rubric = rubric;
        self
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        let labels = self.extractor.labels().clone();
        self.extractor = MetricExtractor::with_config(config).with_labels(labels);
        self
    }

    pub fn with_extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn extractor(&self) -> &MetricExtractor {
        &self.extractor
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Extract metrics from `bundle` and score them.
    ///
    /// Missing or malformed data never fails; it lowers the affected sub-scores.
    /// The only error is a bundle that does not describe `ticker_id`.
    pub fn score(
        &self,
        ticker_id: &str,
        bundle: &RawFinancialBundle,
        as_of: NaiveDate,
    ) -> Result<ScoreVector, ScoringError> {
        let ticker = ticker_id.trim();
        if ticker.is_empty() {
            return Err(ScoringError::InvalidBundle("empty ticker id".to_string()));
        }
        if !bundle.ticker.is_empty() && !bundle.ticker.trim().eq_ignore_ascii_case(ticker) {
            return Err(ScoringError::InvalidBundle(format!(
                "bundle is for {} but {} was requested",
                bundle.ticker, ticker
            )));
        }

        let metrics = self.extractor.extract(bundle, as_of);
        let scores = self.score_metrics(&metrics);
        let result = ScoreVector::new(ticker, as_of, metrics, scores);

        tracing::debug!(ticker, total = result.total(), "scored");
        Ok(result)
    }

    /// Map an already-extracted metric vector to sub-scores
    pub fn score_metrics(&self, metrics: &MetricVector) -> ScoreDetail {
        self.rubric.score(metrics)
    }
}

impl Default for DividendScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}
