//! # sales-forecast
//!
//! Runs one forecast job against the forecast service and prints the
//! reconciled sales series.

use clap::Parser;
use log::{info, warn};
use sales_forecast::api::ApiClient;
use sales_forecast::channel::{ChannelOpener, SseOpener, WorkerOpener};
use sales_forecast::config::{self, SettingsOverrides};
use sales_forecast::controller::{ForecastJobController, JobSnapshot};
use sales_forecast::models::{JobState, MAX_MONTHS_AHEAD};
use sales_forecast::{initialize_app_data, logging, utils};
use std::process;
use std::sync::Arc;

type CliResult<T> = std::result::Result<T, String>;

#[derive(Parser)]
#[command(name = "sales-forecast")]
#[command(about = "Forecast monthly sales and merge the result with known actuals", long_about = None)]
struct Cli {
    /// Forecast service base URL (overrides settings)
    #[arg(short, long)]
    server: Option<String>,

    /// Number of months to forecast
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=MAX_MONTHS_AHEAD as i64))]
    months_ahead: Option<u32>,

    /// Maximum number of historical points the model may use
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..))]
    max_points: Option<u32>,

    /// Retrain even if a saved model exists
    #[arg(short, long)]
    force_training: bool,

    /// Give up when the job sends nothing for this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Run the local forecast worker instead of connecting to the service stream
    #[arg(long)]
    worker: bool,

    /// Print a table instead of JSON
    #[arg(long)]
    table: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            server_url: self.server.clone(),
            months_ahead: self.months_ahead,
            max_data_points: self.max_points,
            force_training: self.force_training.then_some(true),
            job_timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let settings = initialize_app_data().map_err(|e| e.to_string())?;

    let logs_dir = utils::get_logs_dir();
    let _log_guard = logging::init(&logs_dir).map_err(|e| e.to_string())?;
    logging::cleanup_old_logs(&logs_dir);

    let settings = config::apply_overrides(settings, &cli.overrides()).map_err(|e| e.to_string())?;

    let api = ApiClient::from_settings(&settings);
    let (actuals, models) = tokio::task::spawn_blocking(move || {
        let actuals = api.list_monthly_sales();
        let models = api.list_models();
        (actuals, models)
    })
    .await
    .map_err(|e| format!("Failed to fetch sales data: {}", e))?;

    let actuals = actuals.map_err(|e| format!("Failed to load monthly sales: {}", e))?;
    let models = models.unwrap_or_else(|e| {
        warn!("Could not list saved models: {}", e);
        Vec::new()
    });
    info!("Loaded {} months of sales, {} saved models", actuals.len(), models.len());

    let opener: Arc<dyn ChannelOpener> = if cli.worker {
        Arc::new(WorkerOpener::python().map_err(|e| e.to_string())?)
    } else {
        Arc::new(SseOpener::new(&settings.server_url, settings.request_timeout()))
    };

    let controller = ForecastJobController::new(opener).with_job_timeout(settings.job_timeout());
    controller.set_actuals(actuals);
    controller.set_persisted_models(models);

    let mut updates = controller.subscribe();
    let ticket = controller
        .start(settings.start_params())
        .map_err(|e| e.to_string())?;
    info!("Started forecast job {}", ticket.job_id);

    let snapshot = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break controller.snapshot();
                }
                let snapshot = updates.borrow_and_update().clone();
                report_progress(&snapshot.state);
                if !snapshot.state.is_active() {
                    break snapshot;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                break controller.snapshot();
            }
        }
    };

    match &snapshot.state {
        JobState::Completed => {
            if cli.table {
                print_table(&snapshot);
            } else {
                let json = serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| format!("Failed to serialize result: {}", e))?;
                println!("{}", json);
            }
            Ok(())
        }
        JobState::Failed { message } => Err(message.clone()),
        JobState::Cancelled => Err("Forecast job cancelled".to_string()),
        other => Err(format!("Forecast job ended in state {:?}", other)),
    }
}

fn report_progress(state: &JobState) {
    match state {
        JobState::Connecting => info!("Connecting to forecast service..."),
        JobState::Training { progress } => info!(
            "Training: iteration {}, error {:.5} (target {:.5})",
            progress.iterations, progress.error, progress.error_threshold
        ),
        JobState::Validating => info!("Validating model against known months..."),
        _ => {}
    }
}

fn print_table(snapshot: &JobSnapshot) {
    let cell = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));

    println!("{:<8} {:<10} {:>14} {:>14}  {}", "Month", "Label", "Actual", "Predicted", "Kind");
    for point in &snapshot.merged {
        let kind = match (point.is_validation, point.is_prediction) {
            (true, _) => "validation",
            (false, true) => "forecast",
            (false, false) => "actual",
        };
        println!(
            "{:<8} {:<10} {:>14} {:>14}  {}",
            point.key.to_string(),
            point.month_label,
            cell(point.total_sales),
            cell(point.predicted_sales),
            kind
        );
    }

    println!();
    println!(
        "Trend: {}{:.1}%",
        if snapshot.trend.is_up { "+" } else { "-" },
        snapshot.trend.percentage
    );
    if let Some(metrics) = &snapshot.validation_metrics {
        println!("Validation: MSE {}  MAPE {}", cell(metrics.mse), cell(metrics.mape));
    }
    if let Some(label) = &snapshot.provenance_label {
        match &snapshot.persisted_model_id {
            Some(id) => println!("Model: {} [{}]", label, id),
            None => println!("Model: {}", label),
        }
    }
}
