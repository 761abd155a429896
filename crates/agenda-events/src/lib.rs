//! Calendar events for Agenda.
//!
//! Provides the event model, a SQLite store, a REST client for the events
//! API and a unified service over both.

pub mod backend;
pub mod client;
pub mod error;
pub mod retry;
pub mod service;
pub mod store;
pub mod types;
pub mod view;

pub use backend::EventBackend;
pub use client::EventClient;
pub use error::{EventError, EventResult};
pub use retry::RetryPolicy;
pub use service::EventService;
pub use store::SqliteEventStore;
pub use types::{parse_user_instant, Event, EventDraft};
pub use view::{can_create_on, events_on, filter_events, month_grid, DayStyle};
