//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Contract read error: {0}")]
    Rpc(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0}")]
    Precondition(String),

    #[error("A donation is already being processed")]
    SubmissionInFlight,
}

pub type Result<T> = std::result::Result<T, EngineError>;
