use thiserror::Error;

use crate::action::ActionId;

#[derive(Debug, Error)]
pub enum SnoozeError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("timer error: {0}")]
    Timer(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("action not found: {0}")]
    ActionNotFound(ActionId),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("invalid time of day '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("invalid import: {0}")]
    InvalidImport(String),

    #[error("no further occurrence for action {0}")]
    NoFurtherOccurrence(ActionId),

    #[error("task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnoozeError>;
