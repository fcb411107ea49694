use thiserror::Error;

use crate::app::reporter::ReportError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to initialize client: {0}")]
    ClientInit(String),
    #[error("power report aborted: {0}")]
    Report(#[from] ReportError),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn client_init<E: std::fmt::Display>(error: E) -> Self {
        Self::ClientInit(error.to_string())
    }
}
