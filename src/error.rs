use thiserror::Error;

use crate::common::TimerKey;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `message` is the backend's explanation when it sent one.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Failures surfaced by the sync coordinator.
///
/// A refresh that hits an active cooldown or brings back nothing new is not an
/// error; see `RefreshOutcome`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("refreshing {key} failed: {source}")]
    FetchFailed {
        key: TimerKey,
        #[source]
        source: ApiError,
    },

    #[error("{action} failed: {source}")]
    CommandFailed {
        action: &'static str,
        #[source]
        source: ApiError,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;
