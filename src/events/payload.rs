// Push-channel event payloads
use crate::models::{ForecastPoint, ModelMetadata, MonthKey, TrainingProgress, ValidationPoint};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Raw message as delivered by a transport: the event name plus its JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: String,
    pub data: String,
}

impl RawEvent {
    pub fn new(kind: &str, data: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastEvent {
    ModelLoaded(ModelLoadedPayload),
    Progress(TrainingProgress),
    Validation(ValidationPayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

impl ForecastEvent {
    pub const MODEL_LOADED: &'static str = "model-loaded";
    pub const PROGRESS: &'static str = "progress";
    pub const VALIDATION: &'static str = "validation";
    pub const COMPLETE: &'static str = "complete";
    pub const ERROR: &'static str = "error";

    pub fn decode(raw: &RawEvent) -> Result<Self, DecodeError> {
        let event = match raw.kind.as_str() {
            Self::MODEL_LOADED => ForecastEvent::ModelLoaded(parse(raw)?),
            Self::PROGRESS => ForecastEvent::Progress(parse(raw)?),
            Self::VALIDATION => ForecastEvent::Validation(parse(raw)?),
            Self::COMPLETE => ForecastEvent::Complete(parse(raw)?),
            Self::ERROR => ForecastEvent::Error(parse(raw)?),
            other => return Err(DecodeError::UnknownKind(other.to_string())),
        };
        Ok(event)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event kind '{0}'")]
    UnknownKind(String),

    #[error("malformed '{kind}' payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

fn parse<T: serde::de::DeserializeOwned>(raw: &RawEvent) -> Result<T, DecodeError> {
    serde_json::from_str(&raw.data).map_err(|source| DecodeError::Malformed {
        kind: raw.kind.clone(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLoadedPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetail {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub month_name: String,
    pub actual_sales: f64,
    pub predicted_sales: f64,
}

impl ValidationDetail {
    pub fn to_point(&self) -> ValidationPoint {
        ValidationPoint::new(
            MonthKey::new(self.year, self.month),
            &self.month_name,
            self.actual_sales,
            self.predicted_sales,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPayload {
    #[serde(default, deserialize_with = "lenient_number")]
    pub mse: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub mape: Option<f64>,
    #[serde(default)]
    pub details: Vec<ValidationDetail>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mse: Option<f64>,
    pub mape: Option<f64>,
}

impl ValidationPayload {
    pub fn metrics(&self) -> ValidationMetrics {
        ValidationMetrics {
            mse: self.mse,
            mape: self.mape,
        }
    }

    pub fn points(&self) -> Vec<ValidationPoint> {
        self.details.iter().map(ValidationDetail::to_point).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDetail {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub month_name: String,
    pub predicted_sales: f64,
    #[serde(default)]
    pub normalized_prediction: Option<f64>,
}

impl PredictionDetail {
    pub fn to_point(&self) -> ForecastPoint {
        ForecastPoint {
            key: MonthKey::new(self.year, self.month),
            month_label: self.month_name.clone(),
            predicted_sales: self.predicted_sales,
            normalized_prediction: self.normalized_prediction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub min_sales: f64,
    pub max_sales: f64,
    pub range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    #[serde(default)]
    pub predictions: Vec<PredictionDetail>,
    #[serde(default)]
    pub model_info: Option<ModelMetadata>,
    #[serde(default)]
    pub raw_data: Option<serde_json::Value>,
    #[serde(default)]
    pub normalized_data: Option<serde_json::Value>,
    #[serde(default)]
    pub normalization: Option<Normalization>,
    #[serde(default)]
    pub validation_results: Option<Vec<ValidationDetail>>,
}

impl CompletePayload {
    pub fn forecast_points(&self) -> Vec<ForecastPoint> {
        self.predictions.iter().map(PredictionDetail::to_point).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Accepts `"12.5"`, `12.5` or `null`; anything unparsable becomes `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    })
}
