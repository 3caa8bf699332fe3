// Local forecast worker process transport
// Spawns the worker and turns its JSON-lines stdout into channel messages

use super::{ChannelGuard, ChannelMessage, ChannelOpener, PushChannel, CHANNEL_CAPACITY};
use crate::error::{ForecastError, Result};
use crate::events::RawEvent;
use crate::models::StartParams;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub const WORKER_SCRIPT: &str = "sales_forecast.py";

/// One stdout line of the worker: `{"event": "<kind>", "data": {...}}`
#[derive(Debug, Deserialize)]
struct WorkerLine {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WorkerLog {
    #[serde(default)]
    level: String,
    #[serde(default)]
    message: String,
}

pub fn get_python_path() -> String {
    #[cfg(target_os = "windows")]
    let paths = ["python", "python3", "py"];

    #[cfg(not(target_os = "windows"))]
    let paths = ["python3", "python"];

    for path in paths {
        let mut cmd = std::process::Command::new(path);
        cmd.arg("--version");

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        if cmd.output().is_ok() {
            return path.to_string();
        }
    }

    "python".to_string()
}

/// Locate the `forecast_workers` directory next to the executable, walking up
/// a few levels for development builds, else under the current directory.
pub fn get_workers_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let workers_dir = exe_dir.join("forecast_workers");
            if workers_dir.exists() {
                return workers_dir;
            }

            let mut current = exe_dir;
            for _ in 0..3 {
                if let Some(parent) = current.parent() {
                    let dev_workers_dir = parent.join("forecast_workers");
                    if dev_workers_dir.exists() {
                        debug!("Found forecast_workers at: {:?}", dev_workers_dir);
                        return dev_workers_dir;
                    }
                    current = parent;
                }
            }
        }
    }

    std::env::current_dir()
        .unwrap_or_default()
        .join("forecast_workers")
}

/// Runs the forecast model as a child process. Start parameters go to stdin
/// as JSON; the child is killed when the channel guard is dropped.
pub struct WorkerOpener {
    program: String,
    args: Vec<String>,
}

impl WorkerOpener {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The bundled python worker script
    pub fn python() -> Result<Self> {
        let script_path = get_workers_dir().join(WORKER_SCRIPT);
        if !script_path.exists() {
            return Err(ForecastError::Transport(format!(
                "Worker script not found: {:?}",
                script_path
            )));
        }
        Ok(Self::new(
            get_python_path(),
            vec![script_path.to_string_lossy().to_string()],
        ))
    }
}

impl ChannelOpener for WorkerOpener {
    fn open(&self, params: &StartParams) -> Result<PushChannel> {
        debug!("Spawning forecast worker: {} {:?}", self.program, self.args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd
            .spawn()
            .map_err(|e| ForecastError::Transport(format!("Failed to spawn forecast worker: {}", e)))?;

        let input = serde_json::to_vec(params)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(async move {
            let outcome = match run_worker(child, input, &tx).await {
                Ok(()) => ChannelMessage::Closed,
                Err(reason) => ChannelMessage::Failed(reason),
            };
            let _ = tx.send(outcome).await;
        });

        Ok(PushChannel::new(rx, ChannelGuard::new(closed, Some(task))))
    }
}

async fn run_worker(
    mut child: Child,
    input: Vec<u8>,
    tx: &mpsc::Sender<ChannelMessage>,
) -> std::result::Result<(), String> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(&input)
            .await
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| format!("Failed to close stdin: {}", e))?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or("Failed to capture stdout")?;

    let mut reader = BufReader::new(stdout).lines();

    while let Some(line) = reader
        .next_line()
        .await
        .map_err(|e| format!("Failed to read worker output: {}", e))?
    {
        if let Some(event) = parse_worker_line(&line) {
            if tx.send(ChannelMessage::Event(event)).await.is_err() {
                return Ok(());
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    let exit_code = status.code().unwrap_or(-1);
    debug!("Forecast worker exited with code: {}", exit_code);

    if exit_code != 0 {
        return Err(format!("Forecast worker exited with code: {}", exit_code));
    }
    Ok(())
}

/// Worker log lines and non-JSON output are logged, everything else forwarded
fn parse_worker_line(line: &str) -> Option<RawEvent> {
    let parsed = match serde_json::from_str::<WorkerLine>(line) {
        Ok(parsed) => parsed,
        Err(_) => {
            info!("[worker] {}", line);
            return None;
        }
    };

    if parsed.event == "log" {
        match serde_json::from_value::<WorkerLog>(parsed.data) {
            Ok(log) => info!("[worker {}] {}", log.level, log.message),
            Err(e) => warn!("Unreadable worker log line: {}", e),
        }
        return None;
    }

    Some(RawEvent {
        kind: parsed.event,
        data: parsed.data.to_string(),
    })
}
