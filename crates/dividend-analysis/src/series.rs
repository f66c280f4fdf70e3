//! Chronologically aligned numeric series.

use chrono::NaiveDate;
use dividend_core::{LineItem, SeriesPoint};

/// A time series sorted oldest first, with missing and non-finite cells removed.
///
/// Providers return periods newest-first, oldest-first, or unordered depending on
/// the endpoint; positional indexing is only done after this normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<(NaiveDate, f64)>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort ascending by period. When a period repeats, the first occurrence in
    /// input order is kept.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a SeriesPoint>) -> Self {
        let mut points: Vec<(NaiveDate, f64)> = points
            .into_iter()
            .filter_map(|p| p.value.filter(|v| v.is_finite()).map(|v| (p.period, v)))
            .collect();
        points.sort_by_key(|(period, _)| *period);
        points.dedup_by_key(|(period, _)| *period);
        Self { points }
    }

    pub fn from_line_item(item: &LineItem) -> Self {
        Self::from_points(&item.values)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }
}
