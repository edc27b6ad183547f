//! Errors raised while talking to the upstream provider.

use super::types::SessionKind;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache I/O error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("no event matching '{event}' in {year}")]
    EventNotFound { year: i32, event: String },

    #[error("no {kind} session for '{event}' in {year}")]
    SessionNotFound {
        year: i32,
        event: String,
        kind: SessionKind,
    },

    #[error("'{event}' ({year}) has no sprint session")]
    SprintNotAvailable { year: i32, event: String },
}
