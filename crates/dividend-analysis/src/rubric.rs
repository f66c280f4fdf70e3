//! Threshold scoring.
//!
//! Each metric maps through a ladder of `(score, minimum)` steps: the first step
//! (highest minimum first) whose minimum the value meets or exceeds gives the
//! score, otherwise the ladder's floor. This is a step function; values are never
//! interpolated between steps.

use dividend_core::{Metric, MetricMap, MetricVector, ScoreDetail};
use serde::{Deserialize, Serialize};

pub const MAX_SUB_SCORE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub score: u8,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LadderDef {
    steps: Vec<Threshold>,
    floor: u8,
}

/// A monotone step function from a metric value to a sub-score in 0..=10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LadderDef", into = "LadderDef")]
pub struct Ladder {
    steps: Vec<Threshold>,
    floor: u8,
}

impl From<LadderDef> for Ladder {
    fn from(def: LadderDef) -> Self {
        Self::from_thresholds(def.steps, def.floor)
    }
}

impl From<Ladder> for LadderDef {
    fn from(ladder: Ladder) -> Self {
        Self {
            steps: ladder.steps,
            floor: ladder.floor,
        }
    }
}

impl Ladder {
    /// Build a ladder from `(score, min)` pairs in any order
    pub fn new(steps: &[(u8, f64)], floor: u8) -> Self {
        Self::from_thresholds(
            steps.iter().map(|&(score, min)| Threshold { score, min }).collect(),
            floor,
        )
    }

    /// Steps are sorted by descending minimum and scores clamped to 10. A step
    /// never scores above the step before it and the floor never exceeds the
    /// lowest step, so a higher value can never score lower.
    fn from_thresholds(steps: Vec<Threshold>, floor: u8) -> Self {
        let mut steps: Vec<Threshold> = steps.into_iter().filter(|t| t.min.is_finite()).collect();
        steps.sort_by(|a, b| b.min.total_cmp(&a.min));

        let mut ceiling = MAX_SUB_SCORE;
        for step in steps.iter_mut() {
            step.score = step.score.min(ceiling);
            ceiling = step.score;
        }

        Self {
            steps,
            floor: floor.min(ceiling),
        }
    }

    pub fn steps(&self) -> &[Threshold] {
        &self.steps
    }

    pub fn floor(&self) -> u8 {
        self.floor
    }

    pub fn with_floor(self, floor: u8) -> Self {
        Self::from_thresholds(self.steps, floor)
    }

    /// Score `value`. NaN scores the floor.
    pub fn score(&self, value: f64) -> u8 {
        self.steps
            .iter()
            .find(|t| value >= t.min)
            .map(|t| t.score)
            .unwrap_or(self.floor)
    }
}

/// One ladder per metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    ladders: MetricMap<Ladder>,
}

impl Default for Rubric {
    fn default() -> Self {
        Self::standard()
    }
}

impl Rubric {
    pub const STANDARD_FLOOR: u8 = 2;

    /// The ten-metric table with a uniform floor of 2
    pub fn standard() -> Self {
        let floor = Self::STANDARD_FLOOR;
        Self::from_ladders(MetricMap::from_fn(|metric| match metric {
            Metric::ConsecutiveGrowthYears => Ladder::new(&[(10, 10.0), (8, 5.0), (6, 3.0)], floor),
            Metric::DividendCagr5y => Ladder::new(&[(10, 15.0), (8, 10.0), (6, 5.0)], floor),
            Metric::PayoutHeadroom => Ladder::new(&[(10, 20.0), (8, 10.0), (6, 0.0)], floor),
            Metric::NetIncomeCagr5y => Ladder::new(&[(10, 15.0), (8, 10.0), (6, 5.0)], floor),
            Metric::Roe => Ladder::new(&[(10, 20.0), (8, 15.0), (6, 10.0)], floor),
            Metric::SustainabilityYears => Ladder::new(&[(10, 10.0), (8, 5.0), (6, 3.0)], floor),
            Metric::RevenueCagr5y => Ladder::new(&[(10, 10.0), (8, 5.0), (6, 3.0)], floor),
            Metric::OperatingMargin => Ladder::new(&[(10, 20.0), (8, 15.0), (6, 10.0)], floor),
            Metric::ValuationHeadroom => Ladder::new(&[(10, 15.0), (8, 5.0), (6, 0.0)], floor),
            Metric::DividendYield => Ladder::new(&[(10, 5.0), (8, 4.0), (6, 3.0)], floor),
        }))
    }

    /// Floor of 0 everywhere and a 9-step yield ladder from 4.5% down to 2.5%
    pub fn strict() -> Self {
        let mut ladders = Self::standard().ladders.clone();
        for metric in Metric::ALL {
            let ladder = ladders.field(metric).clone();
            *ladders.field_mut(metric) = ladder.with_floor(0);
        }
        let yield_steps: Vec<(u8, f64)> = (0..9u8)
            .map(|i| (MAX_SUB_SCORE - i, 4.5 - 0.25 * f64::from(i)))
            .collect();
        ladders.dividend_yield = Ladder::new(&yield_steps, 0);
        Self::from_ladders(ladders)
    }

    pub fn from_ladders(ladders: MetricMap<Ladder>) -> Self {
        Self { ladders }
    }

    /// Look up a rubric by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }

    pub fn ladder(&self, metric: Metric) -> &Ladder {
        self.ladders.field(metric)
    }

    pub fn score_metric(&self, metric: Metric, value: f64) -> u8 {
        self.ladder(metric).score(value)
    }

    /// Sub-score every metric. The total is `ScoreDetail::total`.
    pub fn score(&self, metrics: &MetricVector) -> ScoreDetail {
        ScoreDetail::from_fn(|metric| self.score_metric(metric, metrics.get(metric)))
    }

    /// Sub-scores a metric vector with no usable data would receive
    pub fn floor_detail(&self) -> ScoreDetail {
        ScoreDetail::from_fn(|metric| self.ladder(metric).floor())
    }
}
