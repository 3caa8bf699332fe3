// Trend indicator over the merged series
use crate::models::MergedPoint;
use serde::{Deserialize, Serialize};

const TREND_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Absolute percent change, rounded to one decimal
    pub percentage: f64,
    pub is_up: bool,
}

impl TrendSummary {
    pub fn flat() -> Self {
        Self {
            percentage: 0.0,
            is_up: true,
        }
    }
}

impl Default for TrendSummary {
    fn default() -> Self {
        Self::flat()
    }
}

/// Compares the average of the first three points with the average of the
/// last three (fewer on short series, at least one per side). Each point
/// contributes its actual, or its prediction when no actual exists.
pub fn summarize(series: &[MergedPoint]) -> TrendSummary {
    if series.len() < 2 {
        return TrendSummary::flat();
    }

    let window = TREND_WINDOW.min(series.len());
    let first_avg = average(&series[..window]);
    let last_avg = average(&series[series.len() - window..]);

    let (first_avg, last_avg) = match (first_avg, last_avg) {
        (Some(first), Some(last)) => (first, last),
        _ => return TrendSummary::flat(),
    };

    if first_avg == 0.0 {
        return TrendSummary::flat();
    }

    let change = (last_avg - first_avg) * 100.0 / first_avg;
    if !change.is_finite() {
        return TrendSummary::flat();
    }

    TrendSummary {
        percentage: round_tenths(change).abs(),
        is_up: change >= 0.0,
    }
}

/// Rounds to one decimal with halves going toward positive infinity
fn round_tenths(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

fn average(points: &[MergedPoint]) -> Option<f64> {
    let values: Vec<f64> = points.iter().filter_map(MergedPoint::display_value).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
