//! Metric extraction: raw provider records to the ten-slot metric vector.

use chrono::NaiveDate;
use dividend_core::{InfoFields, Metric, MetricVector, RawFinancialBundle};

use crate::config::ExtractorConfig;
use crate::dividends::AnnualDividends;
use crate::growth::{consecutive_growth_years, trailing_cagr};
use crate::labels::{LabelTable, LineItemKind};
use crate::series::Series;

/// Normalize a provider trailing-yield field to a percentage.
///
/// Some provider versions report a fraction (0.032), others a pre-multiplied
/// percentage (3.2). Values above 1.0 are taken as already being percentages.
pub fn normalize_yield_pct(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        0.0
    } else if raw > 1.0 {
        raw
    } else {
        raw * 100.0
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Statement series the extractor works from, each aligned oldest first
#[derive(Debug, Clone, Default)]
struct Statements {
    net_income: Series,
    revenue: Series,
    operating_income: Series,
    equity: Series,
    retained_earnings: Series,
    cash: Series,
}

/// Per-ticker inputs after normalization
struct Inputs<'a> {
    info: &'a InfoFields,
    price: Option<f64>,
    shares: Option<f64>,
    dividends: AnnualDividends,
    statements: Statements,
}

pub struct MetricExtractor {
    config: ExtractorConfig,
    labels: LabelTable,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricExtractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            config,
            labels: LabelTable::standard(),
        }
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = labels;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Compute all ten metrics for `bundle` as of `as_of`.
    ///
    /// Never fails: each metric is computed independently and anything that
    /// cannot be determined (or comes out non-finite) becomes 0, or the
    /// configured sentinel for the two headroom metrics.
    pub fn extract(&self, bundle: &RawFinancialBundle, as_of: NaiveDate) -> MetricVector {
        let inputs = self.prepare(bundle, as_of);

        MetricVector::from_fn(|metric| {
            let value = match metric {
                Metric::ConsecutiveGrowthYears => {
                    f64::from(consecutive_growth_years(&inputs.dividends.values()))
                }
                Metric::DividendCagr5y => {
                    trailing_cagr(&inputs.dividends.values(), self.config.cagr_window_points)
                }
                Metric::PayoutHeadroom => self.payout_headroom(&inputs),
                Metric::NetIncomeCagr5y => trailing_cagr(
                    &inputs.statements.net_income.values(),
                    self.config.cagr_window_points,
                ),
                Metric::Roe => self.roe(&inputs).unwrap_or(0.0),
                Metric::SustainabilityYears => self.sustainability_years(&inputs).unwrap_or(0.0),
                Metric::RevenueCagr5y => trailing_cagr(
                    &inputs.statements.revenue.values(),
                    self.config.cagr_window_points,
                ),
                Metric::OperatingMargin => self.operating_margin(&inputs).unwrap_or(0.0),
                Metric::ValuationHeadroom => self.valuation_headroom(&inputs),
                Metric::DividendYield => self.dividend_yield(&inputs),
            };
            if value.is_finite() {
                value
            } else {
                tracing::debug!(ticker = %bundle.ticker, metric = metric.key(), "non-finite metric, defaulting to 0");
                0.0
            }
        })
    }

    fn prepare<'a>(&self, bundle: &'a RawFinancialBundle, as_of: NaiveDate) -> Inputs<'a> {
        let income = &bundle.income_statement;
        let balance = &bundle.balance_sheet;
        let statements = Statements {
            net_income: self.labels.series(income, LineItemKind::NetIncome),
            revenue: self.labels.series(income, LineItemKind::TotalRevenue),
            operating_income: self.labels.series(income, LineItemKind::OperatingIncome),
            equity: self.labels.series(balance, LineItemKind::StockholdersEquity),
            retained_earnings: self.labels.series(balance, LineItemKind::RetainedEarnings),
            cash: self.labels.series(balance, LineItemKind::CashAndEquivalents),
        };

        Inputs {
            info: &bundle.info,
            price: bundle.price(),
            shares: positive(bundle.info.shares_outstanding),
            dividends: AnnualDividends::from_events(
                &bundle.dividends,
                &bundle.splits,
                as_of,
                self.config.max_annual_dividend,
            ),
            statements,
        }
    }

    /// Latest completed-year dividend per share, if positive
    fn latest_dividend(inputs: &Inputs) -> Option<f64> {
        positive(inputs.dividends.latest())
    }

    /// Payout ratio (%): provider field first, else dividends paid over net income
    fn payout_pct(&self, inputs: &Inputs) -> Option<f64> {
        positive(inputs.info.payout_ratio)
            .map(|r| r * 100.0)
            .or_else(|| {
                let dps = Self::latest_dividend(inputs)?;
                let shares = inputs.shares?;
                let net_income = positive(inputs.statements.net_income.latest())?;
                Some(dps * shares / net_income * 100.0)
            })
    }

    fn payout_headroom(&self, inputs: &Inputs) -> f64 {
        let payout = self.payout_pct(inputs).unwrap_or_else(|| {
            tracing::debug!("payout ratio undeterminable, using sentinel");
            self.config.undetermined_payout_pct
        });
        self.config.payout_target_pct - payout
    }

    fn calculate_roe(net_income: f64, equity: f64) -> Option<f64> {
        if equity > 0.0 {
            Some((net_income / equity) * 100.0)
        } else {
            None
        }
    }

    fn calculate_operating_margin(operating_income: f64, revenue: f64) -> Option<f64> {
        if revenue > 0.0 {
            Some((operating_income / revenue) * 100.0)
        } else {
            None
        }
    }

    fn roe(&self, inputs: &Inputs) -> Option<f64> {
        non_zero(inputs.info.return_on_equity)
            .map(|r| r * 100.0)
            .or_else(|| {
                let net_income = inputs.statements.net_income.latest()?;
                let equity = inputs.statements.equity.latest()?;
                Self::calculate_roe(net_income, equity)
            })
    }

    fn operating_margin(&self, inputs: &Inputs) -> Option<f64> {
        non_zero(inputs.info.operating_margins)
            .map(|m| m * 100.0)
            .or_else(|| {
                let operating_income = inputs.statements.operating_income.latest()?;
                let revenue = inputs.statements.revenue.latest()?;
                Self::calculate_operating_margin(operating_income, revenue)
            })
    }

    /// Years of the current dividend that retained earnings alone could fund
    fn sustainability_years(&self, inputs: &Inputs) -> Option<f64> {
        let retained = inputs.statements.retained_earnings.latest()?;
        let dps = inputs.dividends.latest()?;
        let shares = inputs.shares?;
        let annual_payout = dps * shares;
        if annual_payout > 0.0 {
            Some(retained / annual_payout)
        } else {
            None
        }
    }

    /// Cash-adjusted earnings multiple: (market cap - cash) / net income
    fn calculate_cn_per(&self, inputs: &Inputs) -> Option<f64> {
        let market_cap = positive(inputs.info.market_cap)
            .or_else(|| Some(inputs.price? * inputs.shares?))?;
        let net_income = positive(inputs.statements.net_income.latest())?;
        let cash = inputs
            .statements
            .cash
            .latest()
            .or_else(|| positive(inputs.info.total_cash))
            .unwrap_or(0.0);
        Some((market_cap - cash) / net_income)
    }

    fn valuation_headroom(&self, inputs: &Inputs) -> f64 {
        let cn_per = self.calculate_cn_per(inputs).unwrap_or_else(|| {
            tracing::debug!("CN-PER undeterminable, using penalty");
            self.config.cn_per_penalty
        });
        self.config.valuation_target - cn_per
    }

    /// Yield (%): actual dividends over price first, else the provider's trailing field
    fn dividend_yield(&self, inputs: &Inputs) -> f64 {
        let actual = Self::latest_dividend(inputs)
            .zip(inputs.price)
            .map(|(dps, price)| dps / price * 100.0);
        let yield_pct = actual
            .or_else(|| inputs.info.trailing_annual_dividend_yield.map(normalize_yield_pct))
            .unwrap_or(0.0);

        if yield_pct > self.config.yield_cap_pct {
            tracing::debug!(yield_pct, "yield above cap, treating as data error");
            0.0
        } else {
            yield_pct
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dividend_core::{DividendEvent, FinancialStatement, SplitEvent};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fy(y: i32) -> NaiveDate {
        ymd(y, 3, 31)
    }

    fn as_of() -> NaiveDate {
        ymd(2025, 6, 30)
    }

    fn yearly_dividends(first_year: i32, amounts: &[f64]) -> Vec<DividendEvent> {
        amounts
            .iter()
            .enumerate()
            .flat_map(|(i, a)| {
                let y = first_year + i as i32;
                [
                    DividendEvent { date: ymd(y, 6, 15), amount: a / 2.0 },
                    DividendEvent { date: ymd(y, 12, 15), amount: a / 2.0 },
                ]
            })
            .collect()
    }

    #[test]
    fn test_empty_bundle_is_fully_defined() {
        let extractor = MetricExtractor::new();
        let metrics = extractor.extract(&RawFinancialBundle::empty("0000.T"), as_of());
        let config = extractor.config();

        assert_eq!(metrics.consecutive_growth_years, 0.0);
        assert_eq!(metrics.dividend_cagr_5y, 0.0);
        assert_eq!(metrics.net_income_cagr_5y, 0.0);
        assert_eq!(metrics.roe, 0.0);
        assert_eq!(metrics.sustainability_years, 0.0);
        assert_eq!(metrics.revenue_cagr_5y, 0.0);
        assert_eq!(metrics.operating_margin, 0.0);
        assert_eq!(metrics.dividend_yield, 0.0);
        assert_eq!(
            metrics.payout_headroom,
            config.payout_target_pct - config.undetermined_payout_pct
        );
        assert_eq!(metrics.valuation_headroom, config.valuation_target - config.cn_per_penalty);
    }

    #[test]
    fn test_dividend_metrics_use_completed_years_only() {
        let mut bundle = RawFinancialBundle::empty("8058.T");
        bundle.dividends = yearly_dividends(2019, &[10.0, 12.0, 14.0, 16.0, 18.0, 20.0]);
        // Partial current year with a lower amount must not break the streak
        bundle.dividends.push(DividendEvent { date: ymd(2025, 3, 1), amount: 1.0 });

        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert_eq!(metrics.consecutive_growth_years, 5.0);
        let expected = ((20.0f64 / 10.0).powf(1.0 / 5.0) - 1.0) * 100.0;
        assert!((metrics.dividend_cagr_5y - expected).abs() < 1e-9);
    }

    #[test]
    fn test_streak_resets_on_latest_cut() {
        let mut bundle = RawFinancialBundle::empty("1234.T");
        bundle.dividends = yearly_dividends(2019, &[10.0, 12.0, 14.0, 16.0, 18.0, 11.0]);
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert_eq!(metrics.consecutive_growth_years, 0.0);
    }

    #[test]
    fn test_split_does_not_read_as_cut() {
        let mut bundle = RawFinancialBundle::empty("6758.T");
        bundle.dividends = vec![
            DividendEvent { date: ymd(2023, 6, 1), amount: 50.0 },
            DividendEvent { date: ymd(2024, 6, 1), amount: 120.0 },
        ];
        // A 2-for-1 split after the 2024 payment: 120 unadjusted becomes 60
        bundle.splits = vec![SplitEvent { date: ymd(2024, 10, 1), ratio: 2.0 }];
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert_eq!(metrics.consecutive_growth_years, 1.0);
        assert!((metrics.dividend_cagr_5y - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_yield_scale_normalization() {
        for raw in [0.032, 3.2] {
            let mut bundle = RawFinancialBundle::empty("9433.T");
            bundle.info.trailing_annual_dividend_yield = Some(raw);
            let metrics = MetricExtractor::new().extract(&bundle, as_of());
            assert!((metrics.dividend_yield - 3.2).abs() < 1e-9, "raw {}", raw);
        }
    }

    #[test]
    fn test_actual_yield_preferred_over_provider_field() {
        let mut bundle = RawFinancialBundle::empty("8306.T");
        bundle.dividends = yearly_dividends(2024, &[40.0]);
        bundle.latest_price = Some(1000.0);
        bundle.info.trailing_annual_dividend_yield = Some(0.09);
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert!((metrics.dividend_yield - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_implausible_yield_capped_to_zero() {
        let mut bundle = RawFinancialBundle::empty("9999.T");
        bundle.info.trailing_annual_dividend_yield = Some(35.0);
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert_eq!(metrics.dividend_yield, 0.0);
    }

    #[test]
    fn test_ratio_fallbacks_from_statements() {
        let mut bundle = RawFinancialBundle::empty("4502.T");
        bundle.income_statement = FinancialStatement::new()
            .with_row("Total Revenue", [(fy(2024), 1000.0), (fy(2023), 900.0)])
            .with_row("Operating Income", [(fy(2023), 100.0), (fy(2024), 150.0)])
            .with_row("Net Income", [(fy(2024), 80.0), (fy(2023), 70.0)]);
        bundle.balance_sheet = FinancialStatement::new().with_row("Stockholders Equity", [(fy(2024), 400.0)]);
        // Zero provider ratios count as absent
        bundle.info.operating_margins = Some(0.0);

        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert!((metrics.operating_margin - 15.0).abs() < 1e-9);
        assert!((metrics.roe - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_provider_ratios_preferred() {
        let mut bundle = RawFinancialBundle::empty("4502.T");
        bundle.info.return_on_equity = Some(0.12);
        bundle.info.operating_margins = Some(0.08);
        bundle.income_statement = FinancialStatement::new()
            .with_row("Operating Income", [(fy(2024), 500.0)])
            .with_row("Total Revenue", [(fy(2024), 1000.0)]);
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert!((metrics.roe - 12.0).abs() < 1e-9);
        assert!((metrics.operating_margin - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_statement_columns_give_positive_growth() {
        let mut bundle = RawFinancialBundle::empty("7203.T");
        bundle.income_statement = FinancialStatement::new().with_row(
            "Net Income",
            [(fy(2024), 121.0), (fy(2022), 100.0), (fy(2023), 110.0)],
        );
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        assert!((metrics.net_income_cagr_5y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sustainability_and_derived_payout() {
        let mut bundle = RawFinancialBundle::empty("2914.T");
        bundle.dividends = yearly_dividends(2024, &[100.0]);
        bundle.info.shares_outstanding = Some(1_000.0);
        bundle.income_statement = FinancialStatement::new().with_row("Net Income", [(fy(2024), 400_000.0)]);
        bundle.balance_sheet = FinancialStatement::new().with_row("Retained Earnings", [(fy(2024), 1_200_000.0)]);

        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        // 1.2M / (100 * 1000)
        assert!((metrics.sustainability_years - 12.0).abs() < 1e-9);
        // payout = 100 * 1000 / 400k = 25%, headroom 35
        assert!((metrics.payout_headroom - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_valuation_headroom_and_penalty() {
        let mut bundle = RawFinancialBundle::empty("8001.T");
        bundle.info.market_cap = Some(1_400.0);
        bundle.balance_sheet = FinancialStatement::new().with_row("Cash And Cash Equivalents", [(fy(2024), 200.0)]);
        bundle.income_statement = FinancialStatement::new().with_row("Net Income", [(fy(2024), 100.0)]);
        let extractor = MetricExtractor::new();

        let metrics = extractor.extract(&bundle, as_of());
        // CN-PER = (1400 - 200) / 100 = 12, headroom 18
        assert!((metrics.valuation_headroom - 18.0).abs() < 1e-9);

        bundle.income_statement = FinancialStatement::new().with_row("Net Income", [(fy(2024), -50.0)]);
        let metrics = extractor.extract(&bundle, as_of());
        let config = extractor.config();
        assert_eq!(metrics.valuation_headroom, config.valuation_target - config.cn_per_penalty);
    }

    #[test]
    fn test_market_cap_falls_back_to_price_times_shares() {
        let mut bundle = RawFinancialBundle::empty("8002.T");
        bundle.latest_price = Some(10.0);
        bundle.info.shares_outstanding = Some(100.0);
        bundle.info.total_cash = Some(100.0);
        bundle.income_statement = FinancialStatement::new().with_row("Net Income", [(fy(2024), 90.0)]);
        let metrics = MetricExtractor::new().extract(&bundle, as_of());
        // (1000 - 100) / 90 = 10
        assert!((metrics.valuation_headroom - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_yield_pct() {
        assert!((normalize_yield_pct(0.032) - 3.2).abs() < 1e-9);
        assert!((normalize_yield_pct(3.2) - 3.2).abs() < 1e-9);
        assert_eq!(normalize_yield_pct(f64::NAN), 0.0);
        assert_eq!(normalize_yield_pct(-0.5), 0.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let mut bundle = RawFinancialBundle::empty("9984.T");
        bundle.dividends = yearly_dividends(2015, &[5.0, 6.0, 7.0, 7.0, 8.0, 9.0, 10.0, 10.0, 11.0, 12.0]);
        bundle.info.payout_ratio = Some(0.3);
        bundle.latest_price = Some(500.0);
        let extractor = MetricExtractor::new();
        assert_eq!(extractor.extract(&bundle, as_of()), extractor.extract(&bundle, as_of()));
    }
}
