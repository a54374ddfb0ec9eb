use thiserror::Error;

/// Errors surfaced by backend calls and client configuration.
///
/// `Display` renders the user-facing text used in notifications.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("{status}: {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Message body without the category prefix, for inline error slots.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            AppError::Config(message)
            | AppError::Network(message)
            | AppError::Timeout(message)
            | AppError::Parse(message)
            | AppError::Serialization(message)
            | AppError::Http { message, .. } => message,
        }
    }

    /// HTTP status for `Http` errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout("Request timed out. Please try again.".to_string())
        } else if err.is_decode() {
            AppError::Parse(format!("Failed to decode response: {err}"))
        } else if err.is_builder() {
            AppError::Serialization(format!("Failed to build request: {err}"))
        } else {
            AppError::Network(format!("Unable to reach the server: {err}"))
        }
    }
}
