// Crate-wide error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Invalid job parameters: {0}")]
    InvalidParams(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to install logger: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ureq::Error> for ForecastError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());
                ForecastError::Http { status, body }
            }
            ureq::Error::Transport(transport) => ForecastError::Transport(transport.to_string()),
        }
    }
}
