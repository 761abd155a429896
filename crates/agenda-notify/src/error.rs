//! Notification error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a schedule call armed nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Notifications are not supported by this surface")]
    CapabilityUnavailable,

    #[error("Notification permission not granted")]
    PermissionDenied,

    #[error("Event {event_id} started at {start}; notification skipped")]
    PastDue {
        event_id: String,
        start: DateTime<Utc>,
    },

    #[error("Invalid start timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },
}

impl ScheduleError {
    /// Whether the caller can carry on as if nothing happened.
    ///
    /// Only a malformed timestamp indicates a caller bug.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidTimestamp { .. })
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "Notifications are not available here.",
            Self::PermissionDenied => "Notifications are turned off, so no reminder was set.",
            Self::PastDue { .. } => "This event has already started, so no reminder was set.",
            Self::InvalidTimestamp { .. } => "The event start time could not be understood.",
        }
    }
}

/// Failures reported by a notification surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Notification surface unavailable")]
    Unavailable,

    #[error("Permission prompt failed: {0}")]
    Prompt(String),

    #[error("Failed to show notification: {0}")]
    Show(String),
}
