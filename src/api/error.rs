use std::sync::Arc;

use thiserror::Error;

/// Failure shared between a background task and the component that owns it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid host {url:?}: {reason}")]
    InvalidHost { url: String, reason: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(String),

    #[error("response stream ended before completion")]
    IncompleteStream,
}

impl ApiError {
    pub fn shared(self) -> SharedError {
        Arc::new(self)
    }

    /// Build a status error from a non-success body, preferring Ollama's
    /// `{"error": "..."}` message over the raw text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<super::ErrorResponse>(body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no response body".to_string()
                } else {
                    trimmed.to_string()
                }
            });
        ApiError::Status { status, message }
    }
}
