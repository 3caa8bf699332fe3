// Settings data models
use crate::models::job::{StartParams, DEFAULT_MAX_DATA_POINTS, DEFAULT_MONTHS_AHEAD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub months_ahead: u32,
    pub max_data_points: u32,
    #[serde(default)]
    pub force_training: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// No limit when unset: a stalled job stays in its current state
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Settings {
    pub fn start_params(&self) -> StartParams {
        StartParams {
            months_ahead: self.months_ahead,
            max_data_points: self.max_data_points,
            force_training: self.force_training,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: String::from("http://localhost:5000"),
            months_ahead: DEFAULT_MONTHS_AHEAD,
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            force_training: false,
            request_timeout_secs: default_request_timeout_secs(),
            job_timeout_secs: None,
        }
    }
}
