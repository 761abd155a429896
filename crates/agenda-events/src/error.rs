//! Event store error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Invalid event data: {0}")]
    Validation(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Event server unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Result type for event store operations.
pub type EventResult<T> = Result<T, EventError>;

impl EventError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "Event not found".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::Unavailable(_) => "The event server is busy. Try again shortly.".to_string(),
            Self::ApiError(msg) => format!("Event server error: {}", msg),
            Self::Storage(_) => "Local event database error".to_string(),
            Self::NetworkError(_) => "Network error. Is the event server running?".to_string(),
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Decides which failures [`RetryPolicy`](crate::RetryPolicy) retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Unavailable(_) => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for EventError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = EventError::RateLimited(30);
        assert!(err.user_message().contains("30"));

        let err = EventError::validation("End time must be after start time");
        assert_eq!(err.user_message(), "End time must be after start time");

        let err = EventError::not_found("abc");
        assert_eq!(err.user_message(), "Event not found");
    }

    #[test]
    fn test_is_retryable() {
        assert!(EventError::RateLimited(10).is_retryable());
        assert!(EventError::Unavailable("503".into()).is_retryable());
        assert!(!EventError::ApiError("500 parse".into()).is_retryable());
        assert!(!EventError::not_found("x").is_retryable());
        assert!(!EventError::validation("bad").is_retryable());
        assert!(!EventError::storage("disk").is_retryable());
    }

    #[test]
    fn test_from_rusqlite_is_storage() {
        let err: EventError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, EventError::Storage(_)));
    }
}
