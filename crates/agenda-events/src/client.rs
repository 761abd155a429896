//! REST client for the events API (`/api/events`).

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::instrument;

use crate::error::{EventError, EventResult};
use crate::retry::RetryPolicy;
use crate::types::{Event, EventDraft};

const EVENTS_PATH: &str = "/api/events";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct EventClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl EventClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://localhost:5000`).
    pub fn new(base_url: &str) -> EventResult<Self> {
        Self::with_retry_policy(base_url, RetryPolicy::default())
    }

    pub fn with_retry_policy(base_url: &str, retry: RetryPolicy) -> EventResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, EVENTS_PATH)
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(id))
    }

    /// List all events, ordered by start.
    #[instrument(skip(self), level = "info")]
    pub async fn list_events(&self) -> EventResult<Vec<Event>> {
        let url = self.collection_url();
        let response = self
            .retry
            .run("list", || Self::send(self.client.get(&url), None))
            .await?;
        let mut events: Vec<Event> = Self::parse(response).await?;
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    /// Get a single event.
    #[instrument(skip(self), level = "info")]
    pub async fn get_event(&self, id: &str) -> EventResult<Event> {
        let url = self.event_url(id);
        let response = self
            .retry
            .run("get", || Self::send(self.client.get(&url), Some(id)))
            .await?;
        Self::parse(response).await
    }

    /// Create a new event. Sent once: the server is not idempotent for POST.
    #[instrument(skip(self, draft), level = "info", fields(title = %draft.title))]
    pub async fn create_event(&self, draft: &EventDraft) -> EventResult<Event> {
        draft.validate()?;

        let request = self.client.post(self.collection_url()).json(draft);
        let response = Self::send(request, None).await?;
        Self::parse(response).await
    }

    /// Replace an existing event.
    #[instrument(skip(self, draft), level = "info")]
    pub async fn update_event(&self, id: &str, draft: &EventDraft) -> EventResult<Event> {
        draft.validate()?;

        let url = self.event_url(id);
        let response = self
            .retry
            .run("update", || Self::send(self.client.put(&url).json(draft), Some(id)))
            .await?;
        Self::parse(response).await
    }

    /// Delete an event.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, id: &str) -> EventResult<()> {
        let url = self.event_url(id);
        self.retry
            .run("delete", || Self::send(self.client.delete(&url), Some(id)))
            .await?;
        Ok(())
    }

    /// Send one request, turning non-success statuses into errors.
    async fn send(request: RequestBuilder, id: Option<&str>) -> EventResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            Err(Self::status_error(status, response, id).await)
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> EventResult<T> {
        response
            .json()
            .await
            .map_err(|e| EventError::ApiError(format!("JSON parse error: {}", e)))
    }

    async fn status_error(status: StatusCode, response: Response, id: Option<&str>) -> EventError {
        match status {
            StatusCode::NOT_FOUND => EventError::not_found(id.unwrap_or_default()),
            StatusCode::BAD_REQUEST => {
                let text = response.text().await.unwrap_or_default();
                EventError::validation(text)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                EventError::RateLimited(retry_after)
            }
            s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
                let text = response.text().await.unwrap_or_default();
                EventError::Unavailable(format!("{}: {}", status, text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                EventError::ApiError(format!("{}: {}", status, text))
            }
        }
    }
}
