// Server-sent events transport for the forecast stream
use super::{ChannelGuard, ChannelMessage, ChannelOpener, PushChannel, CHANNEL_CAPACITY};
use crate::error::{ForecastError, Result};
use crate::events::RawEvent;
use crate::models::StartParams;
use log::{debug, warn};
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub const FORECAST_STREAM_PATH: &str = "/api/sales/forecast/stream";

/// How long a socket read may block before the reader rechecks its closed flag
pub const STREAM_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Opens `text/event-stream` connections to the forecast service.
///
/// The stream is read with a short socket read timeout so that a released
/// channel drops its connection within one poll interval, even when the
/// server has gone quiet. The response headers must arrive within that
/// interval too.
pub struct SseOpener {
    base_url: String,
    agent: ureq::Agent,
}

impl SseOpener {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Self {
        Self::with_poll_interval(base_url, connect_timeout, STREAM_POLL_INTERVAL)
    }

    pub fn with_poll_interval(base_url: &str, connect_timeout: Duration, poll_interval: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(poll_interval)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn stream_url(&self, params: &StartParams) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, FORECAST_STREAM_PATH))
            .map_err(|e| ForecastError::Settings(format!("Invalid server URL {}: {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("months_ahead", &params.months_ahead.to_string())
            .append_pair("max_data_points", &params.max_data_points.to_string())
            .append_pair("force_training", &params.force_training.to_string());
        Ok(url)
    }
}

impl ChannelOpener for SseOpener {
    fn open(&self, params: &StartParams) -> Result<PushChannel> {
        let url = self.stream_url(params)?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        let agent = self.agent.clone();
        let reader_closed = closed.clone();
        thread::Builder::new()
            .name("forecast-sse".to_string())
            .spawn(move || read_stream(agent, url, tx, reader_closed))?;

        Ok(PushChannel::new(rx, ChannelGuard::new(closed, None)))
    }
}

fn read_stream(
    agent: ureq::Agent,
    url: Url,
    tx: mpsc::Sender<ChannelMessage>,
    closed: Arc<AtomicBool>,
) {
    debug!("Opening forecast stream: {}", url);

    let response = match agent
        .get(url.as_str())
        .set("Accept", "text/event-stream")
        .call()
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Forecast stream request failed: {}", e);
            let _ = tx.blocking_send(ChannelMessage::Failed(e.to_string()));
            return;
        }
    };

    // Dropping the reader closes the connection
    let mut reader = BufReader::new(response.into_reader());
    let mut parser = SseParser::default();
    let mut pending = Vec::new();

    loop {
        if closed.load(Ordering::SeqCst) {
            debug!("Forecast stream released, closing connection");
            return;
        }

        // Bytes read before a timeout stay in `pending`
        match reader.read_until(b'\n', &mut pending) {
            Ok(0) => break,
            Ok(_) if !pending.ends_with(b"\n") => continue,
            Ok(_) => {
                let line = String::from_utf8_lossy(&pending[..pending.len() - 1]).into_owned();
                pending.clear();
                if let Some(event) = parser.feed(&line) {
                    if tx.blocking_send(ChannelMessage::Event(event)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if is_poll_timeout(&e) => continue,
            Err(e) => {
                warn!("Forecast stream read failed: {}", e);
                let _ = tx.blocking_send(ChannelMessage::Failed(e.to_string()));
                return;
            }
        }
    }

    if !pending.is_empty() {
        let line = String::from_utf8_lossy(&pending).into_owned();
        if let Some(event) = parser.feed(&line) {
            let _ = tx.blocking_send(ChannelMessage::Event(event));
        }
    }
    if let Some(event) = parser.finish() {
        let _ = tx.blocking_send(ChannelMessage::Event(event));
    }
    let _ = tx.blocking_send(ChannelMessage::Closed);
}

fn is_poll_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Line-oriented `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseParser {
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feeds one line (without the newline); returns an event on a blank line
    pub fn feed(&mut self, line: &str) -> Option<RawEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    /// Flushes a trailing event the server did not terminate with a blank line
    pub fn finish(&mut self) -> Option<RawEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<RawEvent> {
        let kind = self.event.take().unwrap_or_else(|| "message".to_string());
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(RawEvent { kind, data })
    }
}
