// Sales series data models
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite temporal key. Ordering is chronological (year, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A historical month as returned by the monthly aggregates endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualSales {
    pub year: i32,
    pub month: u32,
    #[serde(rename = "month_name", default)]
    pub month_label: String,
    pub total_sales: f64,
}

impl ActualSales {
    pub fn new(year: i32, month: u32, month_label: &str, total_sales: f64) -> Self {
        Self {
            year,
            month,
            month_label: month_label.to_string(),
            total_sales,
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::new(self.year, self.month)
    }
}

/// Model prediction scored against a month with known sales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPoint {
    pub key: MonthKey,
    pub month_label: String,
    pub actual_sales: f64,
    pub predicted_sales: f64,
    pub difference: f64,
    pub percentage_error: f64,
}

impl ValidationPoint {
    /// Builds a point, deriving `difference` and `percentage_error` locally.
    /// A zero actual yields a percentage error of 0 instead of a division by zero.
    pub fn new(key: MonthKey, month_label: &str, actual_sales: f64, predicted_sales: f64) -> Self {
        let difference = actual_sales - predicted_sales;
        let percentage_error = if actual_sales != 0.0 {
            difference.abs() / actual_sales * 100.0
        } else {
            0.0
        };

        Self {
            key,
            month_label: month_label.to_string(),
            actual_sales,
            predicted_sales,
            difference,
            percentage_error,
        }
    }
}

/// Predicted value for a month without ground truth yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub key: MonthKey,
    pub month_label: String,
    pub predicted_sales: f64,
    pub normalized_prediction: Option<f64>,
}

impl ForecastPoint {
    pub fn new(key: MonthKey, month_label: &str, predicted_sales: f64) -> Self {
        Self {
            key,
            month_label: month_label.to_string(),
            predicted_sales,
            normalized_prediction: None,
        }
    }
}

/// One row of the reconciled series handed to charts and tables.
///
/// Validation rows carry both `total_sales` and `predicted_sales`; a pure
/// forecast row always has `total_sales == None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPoint {
    pub key: MonthKey,
    pub month_label: String,
    pub total_sales: Option<f64>,
    pub predicted_sales: Option<f64>,
    pub is_validation: bool,
    pub is_prediction: bool,
}

impl MergedPoint {
    pub fn from_actual(actual: &ActualSales) -> Self {
        Self {
            key: actual.key(),
            month_label: actual.month_label.clone(),
            total_sales: Some(actual.total_sales),
            predicted_sales: None,
            is_validation: false,
            is_prediction: false,
        }
    }

    /// Value used for charting trends: the actual when known, else the prediction
    pub fn display_value(&self) -> Option<f64> {
        self.total_sales.or(self.predicted_sales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_orders_chronologically() {
        let mut keys = vec![
            MonthKey::new(2024, 2),
            MonthKey::new(2023, 12),
            MonthKey::new(2024, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![MonthKey::new(2023, 12), MonthKey::new(2024, 1), MonthKey::new(2024, 2)]
        );
        assert_eq!(MonthKey::new(2024, 3).to_string(), "2024-03");
    }

    #[test]
    fn test_validation_point_derives_error_fields() {
        let point = ValidationPoint::new(MonthKey::new(2024, 2), "February", 1200.0, 1100.0);
        assert_eq!(point.difference, 100.0);
        assert!((point.percentage_error - 8.333333).abs() < 1e-4);
    }

    #[test]
    fn test_zero_actual_guards_percentage_error() {
        let point = ValidationPoint::new(MonthKey::new(2024, 2), "February", 0.0, 50.0);
        assert_eq!(point.difference, -50.0);
        assert_eq!(point.percentage_error, 0.0);
        assert!(point.percentage_error.is_finite());
    }

    #[test]
    fn test_actual_sales_deserializes_api_shape() {
        let json = r#"{"year": 2024, "month": 1, "month_name": "January", "total_sales": 1000.5}"#;
        let actual: ActualSales = serde_json::from_str(json).unwrap();
        assert_eq!(actual.key(), MonthKey::new(2024, 1));
        assert_eq!(actual.month_label, "January");
        assert_eq!(actual.total_sales, 1000.5);
    }
}
