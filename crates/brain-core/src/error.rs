//! Error types for brainview

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Duplicate task ID: {0}")]
    DuplicateId(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid progress value: {0}")]
    InvalidProgress(String),

    #[error("Task {0} is not being edited")]
    NotEditing(String),

    #[error("Task {0} already has an update in flight")]
    CommitInFlight(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: HTTP {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Update of {task_id} rejected: {message}")]
    Rejected { task_id: String, message: String },

    #[error("Endpoint not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not logged in. Run 'brain login' first.")]
    NoSession,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
