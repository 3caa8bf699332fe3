// Tracks where the model behind the current results came from
use crate::models::{ModelInfo, ModelMetadata, ModelSource, PersistedModel};
use log::debug;

const UNKNOWN_MODEL_TYPE: &str = "forecast";

/// Records whether a job's results came from a freshly trained model or a
/// previously persisted one. Explicit server statements win over inference:
/// `complete.model_info.source` > `model-loaded` > observed training progress
/// > the `force_training` request flag.
#[derive(Debug, Default)]
pub struct ModelProvenanceTracker {
    force_training: bool,
    loaded: Option<ModelMetadata>,
    saw_training: bool,
    current: Option<ModelInfo>,
}

impl ModelProvenanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous job and remember what the new one requested
    pub fn begin(&mut self, force_training: bool) {
        *self = Self {
            force_training,
            ..Self::default()
        };
    }

    pub fn on_model_loaded(&mut self, metadata: &ModelMetadata) {
        debug!("Forecast model loaded: {:?}", metadata.model_type);
        self.loaded = Some(metadata.clone());
        self.current = Some(build_info(ModelSource::Loaded, metadata, None));
    }

    pub fn on_training_progress(&mut self) {
        self.saw_training = true;
    }

    /// Settle provenance once the job completes
    pub fn on_complete(&mut self, model_info: Option<&ModelMetadata>) -> ModelInfo {
        let source = model_info
            .and_then(|m| m.source)
            .unwrap_or_else(|| self.inferred_source());

        let info = match model_info {
            Some(metadata) => build_info(source, metadata, self.loaded.as_ref()),
            None => match &self.loaded {
                Some(loaded) => build_info(source, loaded, None),
                None => build_info(source, &ModelMetadata::default(), None),
            },
        };

        self.current = Some(info.clone());
        info
    }

    pub fn current(&self) -> Option<&ModelInfo> {
        self.current.as_ref()
    }

    /// Human-readable provenance for display next to the forecast
    pub fn label(&self) -> Option<String> {
        let info = self.current.as_ref()?;
        Some(match info.source {
            ModelSource::Loaded => match &info.created_at {
                Some(created) => format!("Loaded saved {} model (created {})", info.model_type, created),
                None => format!("Loaded saved {} model", info.model_type),
            },
            ModelSource::Trained => format!("Trained new {} model", info.model_type),
        })
    }

    /// Finds the persisted model the server reported loading, if it is listed
    pub fn find_persisted<'a>(&self, models: &'a [PersistedModel]) -> Option<&'a PersistedModel> {
        let info = self.current.as_ref().filter(|i| i.source == ModelSource::Loaded)?;
        let created = info.created_at.as_ref()?;
        models
            .iter()
            .find(|m| m.created_at.as_ref() == Some(created))
    }

    fn inferred_source(&self) -> ModelSource {
        if self.loaded.is_some() {
            ModelSource::Loaded
        } else if self.saw_training || self.force_training {
            ModelSource::Trained
        } else {
            // No training happened, so the server reused a stored model
            ModelSource::Loaded
        }
    }
}

fn build_info(
    source: ModelSource,
    metadata: &ModelMetadata,
    fallback: Option<&ModelMetadata>,
) -> ModelInfo {
    let pick = |own: &Option<String>, other: Option<&Option<String>>| {
        own.clone().or_else(|| other.and_then(|o| o.clone()))
    };

    ModelInfo {
        source,
        model_type: pick(&metadata.model_type, fallback.map(|f| &f.model_type))
            .unwrap_or_else(|| UNKNOWN_MODEL_TYPE.to_string()),
        created_at: pick(&metadata.created_at, fallback.map(|f| &f.created_at)),
        last_sales_date: pick(&metadata.last_sales_date, fallback.map(|f| &f.last_sales_date)),
    }
}
