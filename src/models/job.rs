// Forecast job data models
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MONTHS_AHEAD: u32 = 6;
pub const MAX_MONTHS_AHEAD: u32 = 12;
pub const DEFAULT_MAX_DATA_POINTS: u32 = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgress {
    pub iterations: u32,
    pub error: f64,
    #[serde(alias = "error_threshold")]
    pub error_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Connecting,
    Training { progress: TrainingProgress },
    Validating,
    Completed,
    Failed { message: String },
    Cancelled,
}

impl JobState {
    /// A job in this state holds the push channel
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Connecting | JobState::Training { .. } | JobState::Validating
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed { .. } | JobState::Cancelled
        )
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Idle
    }
}

/// Parameters forwarded to the forecast service when a job starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartParams {
    pub months_ahead: u32,
    pub max_data_points: u32,
    pub force_training: bool,
}

impl StartParams {
    pub fn new(months_ahead: u32, max_data_points: u32, force_training: bool) -> Result<Self> {
        let params = Self {
            months_ahead,
            max_data_points,
            force_training,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.months_ahead == 0 {
            return Err(ForecastError::InvalidParams(
                "months_ahead must be greater than 0".to_string(),
            ));
        }
        if self.max_data_points == 0 {
            return Err(ForecastError::InvalidParams(
                "max_data_points must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StartParams {
    fn default() -> Self {
        Self {
            months_ahead: DEFAULT_MONTHS_AHEAD,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            force_training: false,
        }
    }
}

/// Returned by `ForecastJobController::start` to identify the job it launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub generation: u64,
    pub job_id: String,
    pub started_at: String,
    /// Generation of the running job this start cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded: Option<u64>,
}

impl JobTicket {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            job_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            superseded: None,
        }
    }

    pub fn superseding(mut self, previous: Option<u64>) -> Self {
        self.superseded = previous;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(!JobState::Idle.is_active());
        assert!(!JobState::Idle.is_terminal());
        assert!(JobState::Connecting.is_active());
        assert!(JobState::Training { progress: TrainingProgress::default() }.is_active());
        assert!(JobState::Validating.is_active());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Failed { message: "boom".into() }.is_terminal());
    }

    #[test]
    fn test_start_params_validation() {
        assert!(StartParams::new(6, 24, false).is_ok());
        assert!(matches!(
            StartParams::new(0, 24, false),
            Err(ForecastError::InvalidParams(_))
        ));
        assert!(matches!(
            StartParams::new(6, 0, true),
            Err(ForecastError::InvalidParams(_))
        ));
        assert_eq!(StartParams::default().months_ahead, DEFAULT_MONTHS_AHEAD);
    }

    #[test]
    fn test_job_state_serializes_with_status_tag() {
        let json = serde_json::to_value(JobState::Failed { message: "x".into() }).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "x");
    }
}
