use std::fmt;

use sea_orm::{ConnAcquireErr, DbErr};

#[derive(Debug)]
pub enum StashError {
    Configuration(String),
    IOError(String),
    NotFound(String),
    /// Stored database error, passed through untouched.
    Database(DbErr),
    ValidationError(String),
    Unauthorized(String),
    /// No free version number could be found inside the retry budget.
    Conflict(String),
    /// The store or the transaction ran out of time.
    Timeout(String),
    Other(String),
}

impl StashError {
    /// Conflicts and timeouts reflect contention, the caller can simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StashError::Conflict(_) | StashError::Timeout(_))
    }
}

impl fmt::Display for StashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StashError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            StashError::IOError(msg) => write!(f, "I/O error: {msg}"),
            StashError::NotFound(msg) => write!(f, "not found: {msg}"),
            StashError::Database(err) => write!(f, "database error: {err}"),
            StashError::ValidationError(msg) => write!(f, "validation failed: {msg}"),
            StashError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            StashError::Conflict(msg) => write!(f, "conflict: {msg}"),
            StashError::Timeout(msg) => write!(f, "timed out: {msg}"),
            StashError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StashError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StashError {
    fn from(err: std::io::Error) -> Self {
        StashError::IOError(err.to_string())
    }
}

impl From<DbErr> for StashError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) => {
                StashError::Timeout("timed out waiting for a database connection".to_string())
            }
            DbErr::RecordNotUpdated => {
                StashError::NotFound("record vanished before it could be updated".to_string())
            }
            err => StashError::Database(err),
        }
    }
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        StashError::ValidationError(err.to_string())
    }
}
