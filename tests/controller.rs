mod common;

use common::*;
use pretty_assertions::assert_eq;
use sales_forecast::channel::MemoryOpener;
use sales_forecast::controller::{JOB_TIMEOUT_MESSAGE, TRANSPORT_FAILURE_MESSAGE};
use sales_forecast::{
    merge, ForecastError, ForecastJobController, JobState, MergedPoint, ModelSource, MonthKey,
    StartParams,
};
use std::sync::Arc;
use std::time::Duration;

fn controller() -> (ForecastJobController, Arc<MemoryOpener>) {
    let opener = Arc::new(MemoryOpener::new());
    let controller = ForecastJobController::new(opener.clone());
    controller.set_actuals(actuals());
    (controller, opener)
}

#[tokio::test]
async fn test_complete_job_merges_all_sources() {
    let (controller, opener) = controller();
    let ticket = controller.start(StartParams::new(3, 24, false).unwrap()).unwrap();
    assert_eq!(ticket.generation, 1);
    assert_eq!(ticket.superseded, None);
    assert_eq!(controller.state(), JobState::Connecting);

    let feed = opener.latest().unwrap();
    assert_eq!(feed.params().months_ahead, 3);

    feed.send_event("progress", PROGRESS);
    let snapshot = wait_until(&controller, |s| matches!(s.state, JobState::Training { .. })).await;
    assert!(snapshot.is_busy());

    feed.send_event("validation", VALIDATION);
    wait_until(&controller, |s| s.state == JobState::Validating).await;

    feed.send_event("complete", COMPLETE);
    let snapshot = wait_until(&controller, |s| s.state == JobState::Completed).await;

    assert_eq!(
        snapshot.merged,
        vec![
            MergedPoint {
                key: MonthKey::new(2024, 1),
                month_label: "January".into(),
                total_sales: Some(1000.0),
                predicted_sales: None,
                is_validation: false,
                is_prediction: false,
            },
            MergedPoint {
                key: MonthKey::new(2024, 2),
                month_label: "February".into(),
                total_sales: Some(1200.0),
                predicted_sales: Some(1100.0),
                is_validation: true,
                is_prediction: false,
            },
            MergedPoint {
                key: MonthKey::new(2024, 3),
                month_label: "March".into(),
                total_sales: None,
                predicted_sales: Some(1300.0),
                is_validation: false,
                is_prediction: true,
            },
        ]
    );
    assert!(snapshot.trend.is_up);
    let model = snapshot.model_info.unwrap();
    assert_eq!(model.source, ModelSource::Trained);
    assert_eq!(model.model_type, "neural_network");

    wait_released(&controller, &feed).await;
    assert!(!feed.send_event("progress", PROGRESS));
}

#[tokio::test]
async fn test_second_start_supersedes_running_job() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let first = opener.latest().unwrap();
    first.send_event("progress", PROGRESS);
    wait_until(&controller, |s| matches!(s.state, JobState::Training { .. })).await;

    let mut updates = controller.subscribe();
    let ticket = controller.start(StartParams::default()).unwrap();
    assert_eq!(ticket.generation, 2);
    assert_eq!(ticket.superseded, Some(1));
    assert!(updates.has_changed().unwrap());

    assert!(first.is_released());
    assert!(!first.send_event("complete", COMPLETE));
    assert_eq!(opener.opened_count(), 2);
    assert_eq!(opener.open_feeds(), 1);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.state, JobState::Connecting);

    let second = opener.latest().unwrap();
    second.send_event("complete", COMPLETE);
    let snapshot = wait_until(&controller, |s| s.state == JobState::Completed).await;
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.forecasts().count(), 1);
}

#[tokio::test]
async fn test_error_after_progress_leaves_actuals_untouched() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();

    feed.send_event("progress", PROGRESS);
    feed.send_event("error", r#"{"message": "Insufficient sales history"}"#);
    feed.send_event("complete", COMPLETE);

    let snapshot = wait_until(&controller, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        JobState::Failed {
            message: "Insufficient sales history".to_string()
        }
    );
    assert_eq!(snapshot.merged, merge(&actuals(), &[], &[]));
    assert_eq!(snapshot.forecasts().count(), 0);
    wait_released(&controller, &feed).await;
}

#[tokio::test]
async fn test_cancel_during_training() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();
    feed.send_event("progress", PROGRESS);
    wait_until(&controller, |s| matches!(s.state, JobState::Training { .. })).await;

    assert!(controller.cancel());
    assert_eq!(controller.state(), JobState::Cancelled);
    assert!(feed.is_released());
    assert!(!controller.has_open_channel());
    assert!(!controller.cancel());
    assert_eq!(controller.snapshot().merged, merge(&actuals(), &[], &[]));
}

#[tokio::test]
async fn test_unreachable_server_fails_start() {
    let (controller, opener) = controller();
    opener.refuse_connections(true);

    let result = controller.start(StartParams::default());
    assert!(matches!(result, Err(ForecastError::Transport(_))));
    assert_eq!(
        controller.state(),
        JobState::Failed {
            message: TRANSPORT_FAILURE_MESSAGE.to_string()
        }
    );
    assert_eq!(controller.snapshot().merged.len(), 2);
    assert!(!controller.has_open_channel());
}

#[tokio::test]
async fn test_transport_failure_mid_job() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();
    feed.send_event("progress", PROGRESS);
    feed.fail("connection reset by peer");

    let snapshot = wait_until(&controller, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        JobState::Failed {
            message: TRANSPORT_FAILURE_MESSAGE.to_string()
        }
    );
    wait_released(&controller, &feed).await;
}

#[tokio::test]
async fn test_unknown_events_do_not_disturb_job() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();
    feed.send_event("heartbeat", "{}");
    feed.send_event("progress", "{broken");
    feed.send_event("complete", COMPLETE);

    let snapshot = wait_until(&controller, |s| s.state.is_terminal()).await;
    assert_eq!(snapshot.state, JobState::Completed);
}

#[tokio::test]
async fn test_restart_discards_previous_forecasts() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    opener.latest().unwrap().send_event("complete", COMPLETE);
    let snapshot = wait_until(&controller, |s| s.state == JobState::Completed).await;
    assert_eq!(snapshot.merged.len(), 3);

    let ticket = controller.start(StartParams::default()).unwrap();
    assert_eq!(ticket.superseded, None);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.merged, merge(&actuals(), &[], &[]));
    assert!(snapshot.model_info.is_none());
}

#[tokio::test]
async fn test_job_timeout_fails_stalled_job() {
    let opener = Arc::new(MemoryOpener::new());
    let controller = ForecastJobController::new(opener.clone())
        .with_job_timeout(Some(Duration::from_millis(50)));
    controller.set_actuals(actuals());
    controller.start(StartParams::default()).unwrap();

    let snapshot = wait_until(&controller, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        JobState::Failed {
            message: JOB_TIMEOUT_MESSAGE.to_string()
        }
    );
    wait_released(&controller, &opener.latest().unwrap()).await;
}

#[tokio::test]
async fn test_invalid_params_open_nothing() {
    let (controller, opener) = controller();
    let params = StartParams {
        months_ahead: 0,
        max_data_points: 24,
        force_training: false,
    };
    assert!(matches!(
        controller.start(params),
        Err(ForecastError::InvalidParams(_))
    ));
    assert_eq!(opener.opened_count(), 0);
    assert_eq!(controller.state(), JobState::Idle);
}

#[tokio::test]
async fn test_dropping_controller_releases_channel() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();
    assert!(!feed.is_released());

    drop(controller);
    assert!(feed.is_released());
}

#[tokio::test]
async fn test_wait_for_terminal() {
    let (controller, opener) = controller();
    controller.start(StartParams::default()).unwrap();
    let feed = opener.latest().unwrap();

    let waiter = async { controller.wait_for_terminal().await };
    let driver = async {
        feed.send_event("progress", PROGRESS);
        feed.send_event("complete", COMPLETE);
    };
    let (snapshot, _) = tokio::join!(waiter, driver);
    assert_eq!(snapshot.state, JobState::Completed);
}
