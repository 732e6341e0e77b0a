use shared::error::ValidationError;
use thiserror::Error;

/// Network or HTTP failure from any remote call.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("{0}")]
    Transport(String),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    Url(String),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable text for notifications, falling back when the error carries no text.
    pub fn describe(&self, fallback: &str) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            RequestError::Decode(value.to_string())
        } else {
            RequestError::Transport(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("no duty editor is open")]
    EditorClosed,
}
