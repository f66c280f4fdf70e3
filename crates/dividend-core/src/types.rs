use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single cash dividend payment (per share, in the listing currency)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

/// A stock split. `ratio` is new shares per old share (2.0 for a 2-for-1 split).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub date: NaiveDate,
    pub ratio: f64,
}

/// One cell of a statement line item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: NaiveDate,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A labeled row of a financial statement, as the provider names it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    #[serde(default)]
    pub values: Vec<SeriesPoint>,
}

/// Income statement or balance sheet. Rows keep provider order; labels may repeat
/// (one row per consolidation scope) and periods may be in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    #[serde(default)]
    pub rows: Vec<LineItem>,
}

impl FinancialStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.values.iter().all(|p| p.value.is_none()))
    }

    /// Append a row built from `(period, value)` pairs
    pub fn push_row(&mut self, label: &str, values: impl IntoIterator<Item = (NaiveDate, f64)>) {
        self.rows.push(LineItem {
            label: label.to_string(),
            values: values
                .into_iter()
                .map(|(period, value)| SeriesPoint { period, value: Some(value) })
                .collect(),
        });
    }

    /// Builder variant of [`push_row`](Self::push_row)
    pub fn with_row(mut self, label: &str, values: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        self.push_row(label, values);
        self
    }
}

/// Instantaneous attributes reported by the data provider. Ratios are fractions
/// (0.25 = 25%) except the trailing yield, whose scale varies by provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoFields {
    pub payout_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub operating_margins: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub trailing_annual_dividend_yield: Option<f64>,
    pub current_price: Option<f64>,
    pub total_cash: Option<f64>,
}

/// Everything the provider returned for one ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFinancialBundle {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub dividends: Vec<DividendEvent>,
    #[serde(default)]
    pub splits: Vec<SplitEvent>,
    #[serde(default)]
    pub income_statement: FinancialStatement,
    #[serde(default)]
    pub balance_sheet: FinancialStatement,
    #[serde(default)]
    pub info: InfoFields,
    #[serde(default)]
    pub latest_price: Option<f64>,
}

impl RawFinancialBundle {
    pub fn empty(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    /// Last traded price, falling back to the info snapshot
    pub fn price(&self) -> Option<f64> {
        self.latest_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| self.info.current_price.filter(|p| p.is_finite() && *p > 0.0))
    }

    /// True when there is nothing usable to score
    pub fn is_empty(&self) -> bool {
        self.dividends.is_empty()
            && self.income_statement.is_empty()
            && self.balance_sheet.is_empty()
            && self.info == InfoFields::default()
            && self.latest_price.is_none()
    }
}

/// The ten rubric metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "consecutive_growth_years")]
    ConsecutiveGrowthYears,
    #[serde(rename = "dividend_cagr_5y")]
    DividendCagr5y,
    #[serde(rename = "payout_headroom")]
    PayoutHeadroom,
    #[serde(rename = "net_income_cagr_5y")]
    NetIncomeCagr5y,
    #[serde(rename = "roe")]
    Roe,
    #[serde(rename = "sustainability_years")]
    SustainabilityYears,
    #[serde(rename = "revenue_cagr_5y")]
    RevenueCagr5y,
    #[serde(rename = "operating_margin")]
    OperatingMargin,
    #[serde(rename = "valuation_headroom")]
    ValuationHeadroom,
    #[serde(rename = "dividend_yield")]
    DividendYield,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::ConsecutiveGrowthYears,
        Metric::DividendCagr5y,
        Metric::PayoutHeadroom,
        Metric::NetIncomeCagr5y,
        Metric::Roe,
        Metric::SustainabilityYears,
        Metric::RevenueCagr5y,
        Metric::OperatingMargin,
        Metric::ValuationHeadroom,
        Metric::DividendYield,
    ];

    /// Stable key used in serialized score details
    pub fn key(&self) -> &'static str {
        match self {
            Metric::ConsecutiveGrowthYears => "consecutive_growth_years",
            Metric::DividendCagr5y => "dividend_cagr_5y",
            Metric::PayoutHeadroom => "payout_headroom",
            Metric::NetIncomeCagr5y => "net_income_cagr_5y",
            Metric::Roe => "roe",
            Metric::SustainabilityYears => "sustainability_years",
            Metric::RevenueCagr5y => "revenue_cagr_5y",
            Metric::OperatingMargin => "operating_margin",
            Metric::ValuationHeadroom => "valuation_headroom",
            Metric::DividendYield => "dividend_yield",
        }
    }

    /// Inverse of [`Metric::key`]; case-insensitive, `-` accepted for `_`
    pub fn from_key(key: &str) -> Option<Metric> {
        let key = key.trim().to_lowercase().replace('-', "_");
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }

    /// Human-readable label for the metric
    pub fn to_label(&self) -> &'static str {
        match self {
            Metric::ConsecutiveGrowthYears => "Consecutive Dividend Growth Years",
            Metric::DividendCagr5y => "5Y Dividend CAGR %",
            Metric::PayoutHeadroom => "Payout Headroom",
            Metric::NetIncomeCagr5y => "5Y Net Income CAGR %",
            Metric::Roe => "ROE %",
            Metric::SustainabilityYears => "Dividend Sustainability Years",
            Metric::RevenueCagr5y => "5Y Revenue CAGR %",
            Metric::OperatingMargin => "Operating Margin %",
            Metric::ValuationHeadroom => "Valuation Headroom (CN-PER)",
            Metric::DividendYield => "Dividend Yield %",
        }
    }
}

/// One value per rubric metric. The ten slots are fixed by the type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricMap<T> {
    pub consecutive_growth_years: T,
    pub dividend_cagr_5y: T,
    pub payout_headroom: T,
    pub net_income_cagr_5y: T,
    pub roe: T,
    pub sustainability_years: T,
    pub revenue_cagr_5y: T,
    pub operating_margin: T,
    pub valuation_headroom: T,
    pub dividend_yield: T,
}

impl<T> MetricMap<T> {
    /// Build a map by evaluating `f` once per metric, in [`Metric::ALL`] order
    pub fn from_fn(mut f: impl FnMut(Metric) -> T) -> Self {
        Self {
            consecutive_growth_years: f(Metric::ConsecutiveGrowthYears),
            dividend_cagr_5y: f(Metric::DividendCagr5y),
            payout_headroom: f(Metric::PayoutHeadroom),
            net_income_cagr_5y: f(Metric::NetIncomeCagr5y),
            roe: f(Metric::Roe),
            sustainability_years: f(Metric::SustainabilityYears),
            revenue_cagr_5y: f(Metric::RevenueCagr5y),
            operating_margin: f(Metric::OperatingMargin),
            valuation_headroom: f(Metric::ValuationHeadroom),
            dividend_yield: f(Metric::DividendYield),
        }
    }

    pub fn field(&self, metric: Metric) -> &T {
        match metric {
            Metric::ConsecutiveGrowthYears => &self.consecutive_growth_years,
            Metric::DividendCagr5y => &self.dividend_cagr_5y,
            Metric::PayoutHeadroom => &self.payout_headroom,
            Metric::NetIncomeCagr5y => &self.net_income_cagr_5y,
            Metric::Roe => &self.roe,
            Metric::SustainabilityYears => &self.sustainability_years,
            Metric::RevenueCagr5y => &self.revenue_cagr_5y,
            Metric::OperatingMargin => &self.operating_margin,
            Metric::ValuationHeadroom => &self.valuation_headroom,
            Metric::DividendYield => &self.dividend_yield,
        }
    }

    pub fn field_mut(&mut self, metric: Metric) -> &mut T {
        match metric {
            Metric::ConsecutiveGrowthYears => &mut self.consecutive_growth_years,
            Metric::DividendCagr5y => &mut self.dividend_cagr_5y,
            Metric::PayoutHeadroom => &mut self.payout_headroom,
            Metric::NetIncomeCagr5y => &mut self.net_income_cagr_5y,
            Metric::Roe => &mut self.roe,
            Metric::SustainabilityYears => &mut self.sustainability_years,
            Metric::RevenueCagr5y => &mut self.revenue_cagr_5y,
            Metric::OperatingMargin => &mut self.operating_margin,
            Metric::ValuationHeadroom => &mut self.valuation_headroom,
            Metric::DividendYield => &mut self.dividend_yield,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &T)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.field(m)))
    }
}

impl<T: Copy> MetricMap<T> {
    pub fn get(&self, metric: Metric) -> T {
        *self.field(metric)
    }

    pub fn set(&mut self, metric: Metric, value: T) {
        *self.field_mut(metric) = value;
    }
}

/// Raw metric values fed to the rubric
pub type MetricVector = MetricMap<f64>;

/// Per-metric sub-scores, each in 0..=10
pub type ScoreDetail = MetricMap<u8>;

impl MetricMap<u8> {
    /// Unweighted sum of the ten sub-scores
    pub fn total(&self) -> u32 {
        self.iter().map(|(_, s)| u32::from(*s)).sum()
    }
}

/// Result of scoring one ticker. The total is derived from `scores`, also when
/// deserializing, so it always equals their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreVectorFields")]
pub struct ScoreVector {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub metrics: MetricVector,
    pub scores: ScoreDetail,
    total: u32,
}

impl ScoreVector {
    pub fn new(ticker: &str, as_of: NaiveDate, metrics: MetricVector, scores: ScoreDetail) -> Self {
        let total = scores.total();
        Self {
            ticker: ticker.to_string(),
            as_of,
            metrics,
            scores,
            total,
        }
    }

    /// Sum of the sub-scores (0 to 100)
    pub fn total(&self) -> u32 {
        self.total
    }
}

#[derive(Deserialize)]
struct ScoreVectorFields {
    ticker: String,
    as_of: NaiveDate,
    metrics: MetricVector,
    scores: ScoreDetail,
}

impl From<ScoreVectorFields> for ScoreVector {
    fn from(f: ScoreVectorFields) -> Self {
        Self::new(&f.ticker, f.as_of, f.metrics, f.scores)
    }
}

/// Persisted form of a score: one row per ticker, last write wins.
///
/// `total_score` is recomputed from `score_detail` on deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreRecordFields")]
pub struct ScoreRecord {
    pub ticker: String,
    pub total_score: u32,
    pub score_detail: ScoreDetail,
    pub last_update: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(ticker: &str, score_detail: ScoreDetail, last_update: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.to_string(),
            total_score: score_detail.total(),
            score_detail,
            last_update,
        }
    }

    pub fn from_scores(scores: &ScoreVector, last_update: DateTime<Utc>) -> Self {
        Self::new(&scores.ticker, scores.scores, last_update)
    }

    /// Whether `total_score` still matches the sub-scores
    pub fn is_consistent(&self) -> bool {
        self.total_score == self.score_detail.total()
    }
}

#[derive(Deserialize)]
struct ScoreRecordFields {
    ticker: String,
    score_detail: ScoreDetail,
    last_update: DateTime<Utc>,
}

impl From<ScoreRecordFields> for ScoreRecord {
    fn from(f: ScoreRecordFields) -> Self {
        Self::new(&f.ticker, f.score_detail, f.last_update)
    }
}
