//! Line-item label resolution.
//!
//! Providers rename statement rows between schema versions ("Net Income" vs
//! "Net Income Common Stockholders" vs "Profit Attributable To Owners Of Parent")
//! and sometimes emit the same label twice, once per consolidation scope. Each
//! target line item maps to an ordered list of synonyms. An exact (normalized)
//! match on any synonym beats every substring hit; within a pass the earlier
//! synonym wins, then the first row in statement order. Rows containing one of
//! the kind's exclusions ("Non Operating" for operating income) never match.

use dividend_core::{FinancialStatement, LineItem};
use serde::{Deserialize, Serialize};

use crate::series::Series;

/// Statement line items the extractor needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineItemKind {
    NetIncome,
    TotalRevenue,
    OperatingIncome,
    StockholdersEquity,
    RetainedEarnings,
    CashAndEquivalents,
}

impl LineItemKind {
    pub const ALL: [LineItemKind; 6] = [
        LineItemKind::NetIncome,
        LineItemKind::TotalRevenue,
        LineItemKind::OperatingIncome,
        LineItemKind::StockholdersEquity,
        LineItemKind::RetainedEarnings,
        LineItemKind::CashAndEquivalents,
    ];
}

/// Lowercase and strip all whitespace, so "Net Income" and "NetIncome" compare equal.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered synonym lists per line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    entries: Vec<(LineItemKind, Vec<String>)>,
    #[serde(default)]
    exclusions: Vec<(LineItemKind, Vec<String>)>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl LabelTable {
    /// Synonyms seen across provider schema versions. More specific labels come
    /// first because matching is by substring.
    pub fn standard() -> Self {
        Self::empty()
            .with_synonyms(
                LineItemKind::NetIncome,
                &["Net Income Common Stockholders", "Net Income", "Profit Attributable"],
            )
            .with_synonyms(
                LineItemKind::TotalRevenue,
                &["Total Revenue", "Operating Revenue", "Net Sales"],
            )
            .with_synonyms(
                LineItemKind::OperatingIncome,
                &["Operating Income", "Operating Profit", "Total Operating Income As Reported"],
            )
            .with_exclusions(LineItemKind::OperatingIncome, &["Non Operating"])
            .with_synonyms(
                LineItemKind::StockholdersEquity,
                &["Stockholders Equity", "Common Stock Equity", "Shareholders Equity", "Total Equity"],
            )
            .with_synonyms(
                LineItemKind::RetainedEarnings,
                &["Retained Earnings", "Earned Surplus"],
            )
            .with_synonyms(
                LineItemKind::CashAndEquivalents,
                &[
                    "Cash And Cash Equivalents",
                    "Cash Cash Equivalents And Short Term Investments",
                    "Cash Financial",
                ],
            )
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Replace the synonym list for `kind`
    pub fn with_synonyms(mut self, kind: LineItemKind, synonyms: &[&str]) -> Self {
        let synonyms: Vec<String> = synonyms.iter().map(|s| s.to_string()).collect();
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => *existing = synonyms,
            None => self.entries.push((kind, synonyms)),
        }
        self
    }

    /// Replace the labels whose rows must never resolve to `kind`
    pub fn with_exclusions(mut self, kind: LineItemKind, labels: &[&str]) -> Self {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        match self.exclusions.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => *existing = labels,
            None => self.exclusions.push((kind, labels)),
        }
        self
    }

    pub fn candidates(&self, kind: LineItemKind) -> &[String] {
        lookup(&self.entries, kind)
    }

    pub fn exclusions(&self, kind: LineItemKind) -> &[String] {
        lookup(&self.exclusions, kind)
    }

    /// Find the row for `kind`, or `None` when no synonym matches
    pub fn resolve<'a>(&self, statement: &'a FinancialStatement, kind: LineItemKind) -> Option<&'a LineItem> {
        let needles = normalized(self.candidates(kind));
        let excluded = normalized(self.exclusions(kind));
        let rows: Vec<(String, &LineItem)> = statement
            .rows
            .iter()
            .map(|row| (normalize_label(&row.label), row))
            .filter(|(label, _)| !excluded.iter().any(|e| label.contains(e.as_str())))
            .collect();

        let exact = needles
            .iter()
            .find_map(|needle| rows.iter().find(|(label, _)| label == needle));
        exact
            .or_else(|| {
                needles
                    .iter()
                    .find_map(|needle| rows.iter().find(|(label, _)| label.contains(needle.as_str())))
            })
            .map(|(_, row)| *row)
    }

    /// Resolve `kind` and align it chronologically. Unmatched labels yield an empty series.
    pub fn series(&self, statement: &FinancialStatement, kind: LineItemKind) -> Series {
        self.resolve(statement, kind)
            .map(Series::from_line_item)
            .unwrap_or_default()
    }
}

fn lookup(entries: &[(LineItemKind, Vec<String>)], kind: LineItemKind) -> &[String] {
    entries
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, v)| v.as_slice())
        .unwrap_or(&[])
}

fn normalized(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|l| normalize_label(l))
        .filter(|l| !l.is_empty())
        .collect()
}
