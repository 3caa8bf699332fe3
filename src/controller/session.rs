// Per-view forecast state machine
// Applies channel messages for the current job and keeps the merged series in sync

use crate::channel::ChannelMessage;
use crate::events::{EventDispatcher, ForecastEvent, Normalization, ValidationMetrics};
use crate::models::{
    ActualSales, ForecastPoint, JobState, MergedPoint, ModelInfo, PersistedModel, StartParams,
    ValidationPoint,
};
use crate::provenance::ModelProvenanceTracker;
use crate::series::{discard_predictions, merge, summarize, TrendSummary};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const TRANSPORT_FAILURE_MESSAGE: &str = "Connection to the forecast service was lost";
pub const JOB_TIMEOUT_MESSAGE: &str = "Forecast job timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The job is over; its channel must be released
    Finished,
}

/// Everything a view renders, published on every transition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub generation: u64,
    pub state: JobState,
    pub merged: Vec<MergedPoint>,
    pub trend: TrendSummary,
    pub validation: Vec<ValidationPoint>,
    pub validation_metrics: Option<ValidationMetrics>,
    pub normalization: Option<Normalization>,
    pub model_info: Option<ModelInfo>,
    pub provenance_label: Option<String>,
    /// Id of the listed persisted model the job loaded
    pub persisted_model_id: Option<String>,
}

impl JobSnapshot {
    /// Whether a progress indicator should be shown
    pub fn is_busy(&self) -> bool {
        self.state.is_active()
    }

    pub fn forecasts(&self) -> impl Iterator<Item = &MergedPoint> {
        self.merged.iter().filter(|p| p.is_prediction)
    }
}

#[derive(Debug, Default)]
pub struct ForecastSession {
    state: JobState,
    generation: u64,
    actuals: Vec<ActualSales>,
    validation: Vec<ValidationPoint>,
    forecasts: Vec<ForecastPoint>,
    merged: Vec<MergedPoint>,
    metrics: Option<ValidationMetrics>,
    normalization: Option<Normalization>,
    persisted_models: Vec<PersistedModel>,
    dispatcher: EventDispatcher,
    provenance: ModelProvenanceTracker,
}

impl ForecastSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn merged(&self) -> &[MergedPoint] {
        &self.merged
    }

    pub fn set_actuals(&mut self, actuals: Vec<ActualSales>) {
        self.actuals = actuals;
        self.remerge();
    }

    pub fn set_persisted_models(&mut self, models: Vec<PersistedModel>) {
        self.persisted_models = models;
    }

    /// Prepare for a new job. Any previous job must already be cancelled.
    pub fn begin(&mut self, params: &StartParams) -> u64 {
        self.generation += 1;
        self.merged = discard_predictions(&self.merged, &self.actuals);
        self.clear_job_results();
        self.dispatcher = EventDispatcher::new();
        self.provenance.begin(params.force_training);
        self.transition(JobState::Connecting);
        self.generation
    }

    /// Returns false when no job was running
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.clear_job_results();
        self.remerge();
        self.transition(JobState::Cancelled);
        true
    }

    /// Ends the running job as failed, leaving only the actuals in the series
    pub fn fail(&mut self, message: &str) {
        self.clear_job_results();
        self.remerge();
        self.transition(JobState::Failed {
            message: message.to_string(),
        });
    }

    pub fn handle(&mut self, generation: u64, message: ChannelMessage) -> Flow {
        if generation != self.generation || !self.state.is_active() {
            debug!("Ignoring message for finished job {}", generation);
            return Flow::Finished;
        }

        match message {
            ChannelMessage::Event(raw) => match self.dispatcher.dispatch(&raw) {
                Some(event) => self.apply(event),
                None => Flow::Continue,
            },
            ChannelMessage::Failed(reason) => {
                warn!("Forecast channel failed: {}", reason);
                self.fail(TRANSPORT_FAILURE_MESSAGE);
                Flow::Finished
            }
            ChannelMessage::Closed => {
                warn!("Forecast channel closed before the job finished");
                self.fail(TRANSPORT_FAILURE_MESSAGE);
                Flow::Finished
            }
        }
    }

    fn apply(&mut self, event: ForecastEvent) -> Flow {
        match event {
            ForecastEvent::ModelLoaded(payload) => {
                info!("{}", payload.message);
                self.provenance.on_model_loaded(&payload.metadata);
                self.transition(JobState::Validating);
                Flow::Continue
            }
            ForecastEvent::Progress(progress) => {
                self.provenance.on_training_progress();
                self.transition(JobState::Training { progress });
                Flow::Continue
            }
            ForecastEvent::Validation(payload) => {
                self.validation = payload.points();
                self.metrics = Some(payload.metrics());
                self.remerge();
                self.transition(JobState::Validating);
                Flow::Continue
            }
            ForecastEvent::Complete(payload) => {
                if !self.dispatcher.validation_seen() {
                    if let Some(results) = &payload.validation_results {
                        self.validation = results.iter().map(|r| r.to_point()).collect();
                    }
                }
                self.forecasts = payload.forecast_points();
                self.normalization = payload.normalization;
                self.provenance.on_complete(payload.model_info.as_ref());
                self.remerge();
                info!("Forecast job {} produced {} predictions", self.generation, self.forecasts.len());
                self.transition(JobState::Completed);
                Flow::Finished
            }
            ForecastEvent::Error(payload) => {
                self.fail(&payload.message);
                Flow::Finished
            }
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            generation: self.generation,
            state: self.state.clone(),
            merged: self.merged.clone(),
            trend: summarize(&self.merged),
            validation: self.validation.clone(),
            validation_metrics: self.metrics,
            normalization: self.normalization,
            model_info: self.provenance.current().cloned(),
            provenance_label: self.provenance.label(),
            persisted_model_id: self
                .provenance
                .find_persisted(&self.persisted_models)
                .and_then(|model| model.id.clone()),
        }
    }

    fn clear_job_results(&mut self) {
        self.validation.clear();
        self.forecasts.clear();
        self.metrics = None;
        self.normalization = None;
    }

    fn remerge(&mut self) {
        self.merged = merge(&self.actuals, &self.validation, &self.forecasts);
    }

    fn transition(&mut self, next: JobState) {
        if std::mem::discriminant(&self.state) != std::mem::discriminant(&next) {
            info!("Forecast job {}: {:?} -> {:?}", self.generation, self.state, next);
        }
        self.state = next;
    }
}
