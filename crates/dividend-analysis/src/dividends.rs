//! Yearly dividend aggregation.

use chrono::{Datelike, NaiveDate};
use dividend_core::{DividendEvent, SplitEvent};
use std::collections::BTreeMap;

/// Sort events oldest first and undo an unadjusted split on the latest event.
///
/// Providers back-adjust dividend history for splits, except a payment recorded
/// before a split that has not been processed yet. If splits occurred after the
/// most recent dividend, that dividend is divided by their combined ratio so a
/// post-split per-share drop is not read as a cut.
pub fn adjust_for_splits(events: &[DividendEvent], splits: &[SplitEvent]) -> Vec<DividendEvent> {
    let mut events: Vec<DividendEvent> = events
        .iter()
        .filter(|e| e.amount.is_finite())
        .copied()
        .collect();
    events.sort_by_key(|e| e.date);

    if let Some(last) = events.last_mut() {
        let factor: f64 = splits
            .iter()
            .filter(|s| s.date > last.date && s.ratio.is_finite() && s.ratio > 0.0)
            .map(|s| s.ratio)
            .product();
        if factor != 1.0 {
            tracing::debug!(
                date = %last.date,
                factor,
                "adjusting latest dividend for later split"
            );
            last.amount /= factor;
        }
    }

    events
}

/// Dividend per share summed by calendar year, completed years only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnualDividends {
    years: BTreeMap<i32, f64>,
}

impl AnnualDividends {
    /// Aggregate events into completed calendar years before `as_of`.
    ///
    /// Years without payments between the first paying year and the last
    /// completed year are recorded as 0. Sums outside `(0, max_annual]` are
    /// treated as data errors and zeroed.
    pub fn from_events(
        events: &[DividendEvent],
        splits: &[SplitEvent],
        as_of: NaiveDate,
        max_annual: f64,
    ) -> Self {
        let last_completed = as_of.year() - 1;
        let mut years: BTreeMap<i32, f64> = BTreeMap::new();

        for event in adjust_for_splits(events, splits) {
            let year = event.date.year();
            if year > last_completed {
                continue;
            }
            *years.entry(year).or_insert(0.0) += event.amount;
        }

        let Some(&first) = years.keys().next() else {
            return Self::default();
        };
        for year in first..=last_completed {
            years.entry(year).or_insert(0.0);
        }

        for (year, sum) in years.iter_mut() {
            if !(*sum > 0.0 && *sum <= max_annual) {
                if *sum != 0.0 {
                    tracing::debug!(year, sum = *sum, "implausible yearly dividend, zeroing");
                }
                *sum = 0.0;
            }
        }

        Self { years }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Yearly sums, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.years.values().copied().collect()
    }

    pub fn years(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.years.iter().map(|(y, v)| (*y, *v))
    }

    /// Sum for the most recent completed year
    pub fn latest(&self) -> Option<f64> {
        self.years.values().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn div(y: i32, m: u32, amount: f64) -> DividendEvent {
        DividendEvent { date: ymd(y, m, 28), amount }
    }

    #[test]
    fn test_groups_by_year_and_excludes_current_year() {
        let events = vec![
            div(2024, 9, 30.0),
            div(2023, 3, 25.0),
            div(2023, 9, 25.0),
            div(2024, 3, 30.0),
            div(2025, 3, 35.0),
        ];
        let annual = AnnualDividends::from_events(&events, &[], ymd(2025, 6, 1), 10_000.0);
        assert_eq!(annual.values(), vec![50.0, 60.0]);
        assert_eq!(annual.latest(), Some(60.0));
    }

    #[test]
    fn test_gap_years_filled_with_zero() {
        let events = vec![div(2020, 6, 10.0), div(2022, 6, 12.0)];
        let annual = AnnualDividends::from_events(&events, &[], ymd(2024, 1, 15), 10_000.0);
        let years: Vec<(i32, f64)> = annual.years().collect();
        assert_eq!(years, vec![(2020, 10.0), (2021, 0.0), (2022, 12.0), (2023, 0.0)]);
        assert_eq!(annual.latest(), Some(0.0));
    }

    #[test]
    fn test_implausible_sum_zeroed() {
        let events = vec![div(2022, 6, 40.0), div(2023, 6, 250_000.0)];
        let annual = AnnualDividends::from_events(&events, &[], ymd(2024, 2, 1), 10_000.0);
        assert_eq!(annual.values(), vec![40.0, 0.0]);
    }

    #[test]
    fn test_no_events_is_empty() {
        let annual = AnnualDividends::from_events(&[], &[], ymd(2024, 2, 1), 10_000.0);
        assert!(annual.is_empty());
        assert_eq!(annual.latest(), None);
    }

    #[test]
    fn test_split_after_latest_dividend_adjusts_it() {
        let events = vec![div(2023, 9, 100.0), div(2023, 3, 100.0)];
        let splits = vec![SplitEvent { date: ymd(2023, 12, 1), ratio: 2.0 }];
        let adjusted = adjust_for_splits(&events, &splits);
        assert_eq!(adjusted[0].amount, 100.0);
        assert_eq!(adjusted[1].amount, 50.0);
    }

    #[test]
    fn test_split_before_latest_dividend_ignored() {
        let events = vec![div(2023, 3, 50.0), div(2023, 9, 50.0)];
        let splits = vec![SplitEvent { date: ymd(2023, 6, 1), ratio: 2.0 }];
        let adjusted = adjust_for_splits(&events, &splits);
        assert_eq!(adjusted[1].amount, 50.0);
    }
}
