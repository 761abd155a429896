//! SQLite-based event storage.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::backend::EventBackend;
use crate::error::{EventError, EventResult};
use crate::types::{Event, EventDraft};

const EVENT_COLUMNS: &str = "id, title, description, start_ms, end_ms, attachments_json";

/// SQLite store for events.
///
/// Instants are kept as UTC epoch milliseconds so a stored start reads back
/// as exactly the instant that was written.
pub struct SqliteEventStore {
    conn: Connection,
}

impl SqliteEventStore {
    /// Open (or create) a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                start_ms INTEGER NOT NULL,
                end_ms INTEGER NOT NULL,
                attachments_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_ms);
            "#,
        )?;
        Ok(())
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        let attachments_json: String = row.get(5)?;

        Ok(Event {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            start: Self::instant_at(row, 3)?,
            end: Self::instant_at(row, 4)?,
            attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
        })
    }

    /// Millisecond timestamp column as a UTC instant; out-of-range values are
    /// a conversion error, not the epoch.
    fn instant_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        let ms: i64 = row.get(idx)?;
        DateTime::from_timestamp_millis(ms).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Integer,
                format!("timestamp {} ms is out of range", ms).into(),
            )
        })
    }

    fn write(&self, event: &Event, created: bool) -> EventResult<usize> {
        let now = Utc::now().timestamp_millis();
        let attachments_json = serde_json::to_string(&event.attachments)?;

        let changed = if created {
            self.conn.execute(
                r#"
                INSERT INTO events
                (id, title, description, start_ms, end_ms, attachments_json, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                "#,
                params![
                    event.id,
                    event.title,
                    event.description,
                    event.start.timestamp_millis(),
                    event.end.timestamp_millis(),
                    attachments_json,
                    now,
                ],
            )?
        } else {
            self.conn.execute(
                r#"
                UPDATE events
                SET title = ?2, description = ?3, start_ms = ?4, end_ms = ?5,
                    attachments_json = ?6, updated_at = ?7
                WHERE id = ?1
                "#,
                params![
                    event.id,
                    event.title,
                    event.description,
                    event.start.timestamp_millis(),
                    event.end.timestamp_millis(),
                    attachments_json,
                    now,
                ],
            )?
        };
        Ok(changed)
    }
}

impl EventBackend for SqliteEventStore {
    fn list(&self) -> EventResult<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY start_ms ASC"))?;
        let rows = stmt.query_map([], Self::row_to_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get(&self, id: &str) -> EventResult<Option<Event>> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn create(&self, draft: &EventDraft) -> EventResult<Event> {
        let event = Event::from_draft(uuid::Uuid::new_v4().to_string(), draft)?;
        self.write(&event, true)?;
        tracing::debug!(id = %event.id, "Created event");
        Ok(event)
    }

    fn update(&self, id: &str, draft: &EventDraft) -> EventResult<Event> {
        let event = Event::from_draft(id, draft)?;
        if self.write(&event, false)? == 0 {
            return Err(EventError::not_found(id));
        }
        tracing::debug!(id, "Updated event");
        Ok(event)
    }

    fn delete(&self, id: &str) -> EventResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(EventError::not_found(id));
        }
        tracing::debug!(id, "Deleted event");
        Ok(())
    }
}
