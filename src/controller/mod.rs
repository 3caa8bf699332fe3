// Forecast job orchestration
pub mod forecast_job;
pub mod session;

pub use forecast_job::ForecastJobController;
pub use session::{Flow, ForecastSession, JobSnapshot, JOB_TIMEOUT_MESSAGE, TRANSPORT_FAILURE_MESSAGE};
