//! Error types for pygen

use thiserror::Error;

/// Result type for pygen operations
pub type Result<T> = std::result::Result<T, PygenError>;

/// pygen error types
#[derive(Error, Debug)]
pub enum PygenError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid arguments for {action} action: {message}")]
    InvalidArguments { action: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
