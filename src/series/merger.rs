// Reconciles actuals, validation points and forecasts into one series
use crate::models::{ActualSales, ForecastPoint, MergedPoint, MonthKey, ValidationPoint};
use std::collections::{BTreeMap, HashSet};

/// Folds the three sources into one series keyed by (year, month), at most one
/// row per key, sorted chronologically. Pure: identical inputs give identical output.
pub fn merge(
    actuals: &[ActualSales],
    validation: &[ValidationPoint],
    forecasts: &[ForecastPoint],
) -> Vec<MergedPoint> {
    let mut rows: BTreeMap<MonthKey, MergedPoint> = BTreeMap::new();

    for actual in actuals {
        rows.insert(actual.key(), MergedPoint::from_actual(actual));
    }

    for point in validation {
        rows.entry(point.key)
            .and_modify(|row| {
                row.predicted_sales = Some(point.predicted_sales);
                row.is_validation = true;
            })
            .or_insert_with(|| MergedPoint {
                key: point.key,
                month_label: point.month_label.clone(),
                total_sales: Some(point.actual_sales),
                predicted_sales: Some(point.predicted_sales),
                is_validation: true,
                is_prediction: false,
            });
    }

    for point in forecasts {
        rows.entry(point.key)
            .and_modify(|row| {
                row.predicted_sales = Some(point.predicted_sales);
                row.is_prediction = true;
            })
            .or_insert_with(|| MergedPoint {
                key: point.key,
                month_label: point.month_label.clone(),
                total_sales: None,
                predicted_sales: Some(point.predicted_sales),
                is_validation: false,
                is_prediction: true,
            });
    }

    rows.into_values().collect()
}

/// Removes everything a previous job contributed: rows with no actual behind
/// them (pure forecasts, validation rows inserted without a fetched actual) are
/// dropped and predictions are cleared from the rest.
pub fn discard_predictions(series: &[MergedPoint], actuals: &[ActualSales]) -> Vec<MergedPoint> {
    let known: HashSet<MonthKey> = actuals.iter().map(ActualSales::key).collect();

    series
        .iter()
        .filter(|row| row.total_sales.is_some() && known.contains(&row.key))
        .map(|row| MergedPoint {
            predicted_sales: None,
            is_validation: false,
            is_prediction: false,
            ..row.clone()
        })
        .collect()
}
