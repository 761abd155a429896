//! Event types and data structures.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};

pub const MISSING_FIELDS_MESSAGE: &str =
    "Please fill in all required fields (title, start, and end time)";
pub const END_BEFORE_START_MESSAGE: &str = "End time must be after start time";

/// Calendar event as returned by a store.
///
/// The REST backend names the identifier `_id`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Event {
    /// Build a stored event from a validated draft.
    pub fn from_draft(id: impl Into<String>, draft: &EventDraft) -> EventResult<Self> {
        let (start, end) = draft.validate()?;
        Ok(Self {
            id: id.into(),
            title: draft.title.trim().to_string(),
            description: draft.description_text().map(str::to_string),
            start,
            end,
            attachments: draft.attachments.clone(),
        })
    }

    /// Description with blank strings treated as missing.
    pub fn description_text(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }

    /// Editable copy of this event.
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            start: Some(self.start),
            end: Some(self.end),
            attachments: self.attachments.clone(),
        }
    }
}

/// User-editable event fields, before the store assigns an identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Check required fields and ordering; returns the validated time range.
    ///
    /// # Errors
    /// `EventError::Validation` when the title, start or end is missing, or
    /// when `end <= start`.
    pub fn validate(&self) -> EventResult<(DateTime<Utc>, DateTime<Utc>)> {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) if !self.title.trim().is_empty() => (start, end),
            _ => return Err(EventError::validation(MISSING_FIELDS_MESSAGE)),
        };

        if end <= start {
            return Err(EventError::validation(END_BEFORE_START_MESSAGE));
        }

        Ok((start, end))
    }

    pub fn description_text(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|d| !d.trim().is_empty())
}

/// Parse a timestamp entered by a user.
///
/// RFC 3339 strings keep their explicit offset. A bare `YYYY-MM-DDTHH:MM[:SS]`
/// is read as local wall-clock time and converted to UTC here, so nothing
/// downstream ever sees a naive time.
///
/// # Errors
/// `EventError::Validation` when the string is neither form, or when the local
/// time is ambiguous or skipped by a DST transition.
pub fn parse_user_instant(input: &str) -> EventResult<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| EventError::validation(format!("Invalid date/time: {}", input)))?;

    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            EventError::validation(format!("Ambiguous local time (DST change): {}", input))
        })
}
