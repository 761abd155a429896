//! Unified event service over the SQLite store and the REST client.
//!
//! `EventService` gives both backends the same async interface. SQLite calls
//! run on the blocking pool behind a mutex.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::EventBackend;
use crate::client::EventClient;
use crate::error::{EventError, EventResult};
use crate::store::SqliteEventStore;
use crate::types::{Event, EventDraft};

#[derive(Clone)]
pub enum EventService {
    /// Local SQLite storage (default).
    Sqlite(Arc<Mutex<SqliteEventStore>>),

    /// Remote REST API.
    Http(Arc<EventClient>),
}

impl EventService {
    pub fn sqlite(store: SqliteEventStore) -> Self {
        Self::Sqlite(Arc::new(Mutex::new(store)))
    }

    pub fn http(client: EventClient) -> Self {
        Self::Http(Arc::new(client))
    }

    /// List all events ordered by start time.
    pub async fn list(&self) -> EventResult<Vec<Event>> {
        match self {
            Self::Sqlite(store) => {
                let store = store.clone();
                blocking(move || store.lock().list()).await
            }
            Self::Http(client) => client.list_events().await,
        }
    }

    /// Get an event by ID.
    ///
    /// Both backends report a missing event as `EventError::NotFound`.
    pub async fn get(&self, id: &str) -> EventResult<Event> {
        match self {
            Self::Sqlite(store) => {
                let store = store.clone();
                let id = id.to_string();
                blocking(move || store.lock().get(&id)?.ok_or_else(|| EventError::not_found(id)))
                    .await
            }
            Self::Http(client) => client.get_event(id).await,
        }
    }

    pub async fn create(&self, draft: EventDraft) -> EventResult<Event> {
        match self {
            Self::Sqlite(store) => {
                let store = store.clone();
                blocking(move || store.lock().create(&draft)).await
            }
            Self::Http(client) => client.create_event(&draft).await,
        }
    }

    pub async fn update(&self, id: &str, draft: EventDraft) -> EventResult<Event> {
        match self {
            Self::Sqlite(store) => {
                let store = store.clone();
                let id = id.to_string();
                blocking(move || store.lock().update(&id, &draft)).await
            }
            Self::Http(client) => client.update_event(id, &draft).await,
        }
    }

    pub async fn delete(&self, id: &str) -> EventResult<()> {
        match self {
            Self::Sqlite(store) => {
                let store = store.clone();
                let id = id.to_string();
                blocking(move || store.lock().delete(&id)).await
            }
            Self::Http(client) => client.delete_event(id).await,
        }
    }
}

async fn blocking<T, F>(f: F) -> EventResult<T>
where
    F: FnOnce() -> EventResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EventError::storage(format!("Store task failed: {}", e)))?
}
