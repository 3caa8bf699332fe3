// Forecast model provenance data models
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Loaded,
    Trained,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub source: ModelSource,
    pub model_type: String,
    pub created_at: Option<String>,
    pub last_sales_date: Option<String>,
}

/// Model description as sent by the server. Every field is optional because
/// `model-loaded` metadata and `complete.model_info` carry different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub source: Option<ModelSource>,
    #[serde(default, alias = "modelType", alias = "type")]
    pub model_type: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "lastSalesDate")]
    pub last_sales_date: Option<String>,
}

/// Entry of the persisted models listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "modelType", alias = "type")]
    pub model_type: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "lastSalesDate")]
    pub last_sales_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<PersistedModel>,
}
