#![allow(dead_code)]

use sales_forecast::channel::MemoryFeed;
use sales_forecast::{ActualSales, ForecastJobController, JobSnapshot};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn actuals() -> Vec<ActualSales> {
    vec![
        ActualSales::new(2024, 1, "January", 1000.0),
        ActualSales::new(2024, 2, "February", 1200.0),
    ]
}

pub const PROGRESS: &str = r#"{"iterations": 200, "error": 0.04, "errorThreshold": 0.01}"#;

pub const VALIDATION: &str = r#"{"mse": "10000.00", "mape": "8.33", "details": [
    {"year": 2024, "month": 2, "month_name": "February", "actual_sales": 1200, "predicted_sales": 1100}
]}"#;

pub const COMPLETE: &str = r#"{"predictions": [
    {"year": 2024, "month": 3, "month_name": "March", "predicted_sales": 1300, "normalized_prediction": 0.6}
], "model_info": {"model_type": "neural_network"}}"#;

pub async fn wait_until<F>(controller: &ForecastJobController, predicate: F) -> JobSnapshot
where
    F: Fn(&JobSnapshot) -> bool,
{
    let mut rx = controller.subscribe();
    let snapshot = tokio::time::timeout(WAIT_LIMIT, rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for controller state")
        .expect("controller dropped")
        .clone();
    snapshot
}

/// Waits for the pump to hand the channel back after a terminal event
pub async fn wait_released(controller: &ForecastJobController, feed: &MemoryFeed) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while controller.has_open_channel() || !feed.is_released() {
        assert!(tokio::time::Instant::now() < deadline, "channel was never released");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Serves exactly one HTTP request with `head` + `body`, then closes the
/// connection. Returns the base URL and a handle yielding the request line.
pub fn serve_once(head: String, body: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
        }

        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(body.as_bytes()).unwrap();
        stream.flush().unwrap();
        request_line.trim_end().to_string()
    });

    (format!("http://{}", addr), handle)
}

/// Like `serve_once`, but keeps the connection open after writing. The handle
/// yields true once the client closes its end, false if it is still open
/// after `WAIT_LIMIT`.
pub fn serve_and_stall(head: String, body: String) -> (String, thread::JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
        }

        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(body.as_bytes()).unwrap();
        stream.flush().unwrap();

        stream.set_read_timeout(Some(WAIT_LIMIT)).unwrap();
        let mut buf = [0u8; 64];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return true,
                Err(_) => return false,
            }
        }
    });

    (format!("http://{}", addr), handle)
}

pub fn json_response(status: &str, body: &str) -> (String, String) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    (head, body.to_string())
}
