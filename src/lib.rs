pub mod api;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod file_manager;
pub mod logging;
pub mod models;
pub mod provenance;
pub mod series;
pub mod utils;

pub use channel::{ChannelOpener, MemoryOpener, SseOpener, WorkerOpener};
pub use controller::{ForecastJobController, JobSnapshot};
pub use error::{ForecastError, Result};
pub use events::{EventDispatcher, ForecastEvent, RawEvent};
pub use models::{
    ActualSales, ForecastPoint, JobState, JobTicket, MergedPoint, ModelInfo, ModelSource, MonthKey,
    Settings, StartParams, TrainingProgress, ValidationPoint,
};
pub use provenance::ModelProvenanceTracker;
pub use series::{merge, summarize, TrendSummary};

use log::info;

/// Create the data directories and load (or create) the stored settings
pub fn initialize_app_data() -> Result<Settings> {
    utils::initialize_data_directories()?;
    let settings = config::load_settings(&utils::get_settings_json_path())?;
    info!("App data initialized at {:?}", utils::get_app_data_dir());
    Ok(settings)
}
