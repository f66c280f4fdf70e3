//! Provider wire formats and their conversion into core types.

use chrono::NaiveDate;
use dividend_core::{DividendEvent, FinancialStatement, InfoFields, LineItem, SeriesPoint, SplitEvent};
use serde::{Deserialize, Serialize};

/// Parse `YYYY-MM-DD`, also accepting a full timestamp by its date prefix
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let prefix = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DividendsResponse {
    #[serde(default)]
    pub results: Vec<DividendRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendRow {
    #[serde(alias = "ex_dividend_date")]
    pub date: String,
    #[serde(default, alias = "cash_amount")]
    pub amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SplitsResponse {
    #[serde(default)]
    pub results: Vec<SplitRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRow {
    #[serde(alias = "execution_date")]
    pub date: String,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub split_from: Option<f64>,
    #[serde(default)]
    pub split_to: Option<f64>,
}

impl SplitRow {
    /// New shares per old share, from either representation
    pub fn ratio(&self) -> Option<f64> {
        self.ratio.or_else(|| match (self.split_from, self.split_to) {
            (Some(from), Some(to)) if from > 0.0 => Some(to / from),
            _ => None,
        })
    }
}

/// Column-oriented statement table: one column per period, one row per line item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementFrame {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<FrameRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRow {
    pub label: String,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

/// Instantaneous quote/profile fields. Key names drift between provider
/// versions, and some versions send both spellings, so each spelling gets its
/// own field and the conversion picks the preferred one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoPayload {
    pub payout_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub operating_margins: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub implied_shares_outstanding: Option<f64>,
    pub trailing_annual_dividend_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub current_price: Option<f64>,
    pub regular_market_price: Option<f64>,
    pub total_cash: Option<f64>,
}

pub(crate) fn dividend_events(rows: Vec<DividendRow>) -> Vec<DividendEvent> {
    rows.into_iter()
        .filter_map(|row| {
            let date = parse_date(&row.date);
            if date.is_none() {
                tracing::debug!("skipping dividend row with bad date {:?}", row.date);
            }
            Some(DividendEvent {
                date: date?,
                amount: row.amount.filter(|a| a.is_finite())?,
            })
        })
        .collect()
}

pub(crate) fn split_events(rows: Vec<SplitRow>) -> Vec<SplitEvent> {
    rows.into_iter()
        .filter_map(|row| {
            Some(SplitEvent {
                date: parse_date(&row.date)?,
                ratio: row.ratio().filter(|r| r.is_finite() && *r > 0.0)?,
            })
        })
        .collect()
}

impl StatementFrame {
    /// Transpose into line items. Columns whose header is not a date are dropped,
    /// and short rows are padded with missing cells.
    pub fn into_statement(self) -> FinancialStatement {
        let periods: Vec<Option<NaiveDate>> = self.columns.iter().map(|c| parse_date(c)).collect();

        let rows = self
            .rows
            .into_iter()
            .map(|row| LineItem {
                label: row.label,
                values: periods
                    .iter()
                    .enumerate()
                    .filter_map(|(i, period)| {
                        Some(SeriesPoint {
                            period: (*period)?,
                            value: row.values.get(i).copied().flatten(),
                        })
                    })
                    .collect(),
            })
            .collect();

        FinancialStatement { rows }
    }
}

impl From<InfoPayload> for InfoFields {
    fn from(p: InfoPayload) -> Self {
        InfoFields {
            payout_ratio: p.payout_ratio,
            return_on_equity: p.return_on_equity,
            operating_margins: p.operating_margins,
            market_cap: p.market_cap,
            shares_outstanding: p.shares_outstanding.or(p.implied_shares_outstanding),
            trailing_annual_dividend_yield: p.trailing_annual_dividend_yield.or(p.dividend_yield),
            current_price: p.current_price.or(p.regular_market_price),
            total_cash: p.total_cash,
        }
    }
}
