use crate::domain::payment::PaymentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Server error: {0}")]
    GatewayRejected(String),
    #[error("Payment ended with status {0}")]
    PaymentFailed(PaymentStatus),
    #[error("Response arrived for a superseded session")]
    StaleResponse,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Terminal controller has shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TerminalError>;
