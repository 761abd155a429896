//! Event storage backend trait.
//!
//! This module defines the `EventBackend` trait that abstracts over local
//! storage implementations. The HTTP client exposes the same operations
//! asynchronously; `EventService` unifies both.

use crate::error::EventResult;
use crate::types::{Event, EventDraft};

/// Trait for synchronous event storage backends.
///
/// Implementations don't need to be Sync; `EventService` wraps them in a
/// Mutex and moves calls onto the blocking pool.
pub trait EventBackend: Send {
    /// List all events ordered by start time.
    fn list(&self) -> EventResult<Vec<Event>>;

    /// Get an event by ID.
    ///
    /// Returns `None` if the event doesn't exist.
    fn get(&self, id: &str) -> EventResult<Option<Event>>;

    /// Create a new event; the backend assigns the identifier.
    ///
    /// # Errors
    /// Returns `EventError::Validation` if the draft is incomplete or
    /// `end <= start`.
    fn create(&self, draft: &EventDraft) -> EventResult<Event>;

    /// Replace the fields of an existing event.
    ///
    /// # Errors
    /// Returns `EventError::NotFound` if the event doesn't exist.
    /// Returns `EventError::Validation` if the draft is invalid.
    fn update(&self, id: &str, draft: &EventDraft) -> EventResult<Event>;

    /// Delete an event.
    ///
    /// # Errors
    /// Returns `EventError::NotFound` if the event doesn't exist.
    fn delete(&self, id: &str) -> EventResult<()>;
}
