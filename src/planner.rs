//! Ties the event service to the notification scheduler.
//!
//! Every successful save hands the stored record to the scheduler exactly
//! once. A failed save never reaches the scheduler, and a refused schedule
//! never fails the save.

use std::collections::{HashMap, HashSet};

use agenda_events::{filter_events, Event, EventDraft, EventResult, EventService};
use agenda_notify::{NotificationScheduler, ScheduleError, ScheduledNotification};
use parking_lot::Mutex;

/// Outcome of a create or update.
#[derive(Debug)]
pub struct SavedEvent {
    pub event: Event,
    /// Why no reminder was armed, when none was.
    pub reminder: Result<ScheduledNotification, ScheduleError>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub scheduled: usize,
    pub cancelled: usize,
}

/// What happened when a saved event was handed to the scheduler.
enum Reminder {
    Armed(ScheduledNotification),
    /// Nothing to arm, and nothing will change that (start already passed).
    Skipped(ScheduleError),
    /// Refused for now (no permission, no notification surface).
    Refused(ScheduleError),
}

impl Reminder {
    /// Whether this version of the event needs another attempt later.
    fn is_settled(&self) -> bool {
        !matches!(self, Reminder::Refused(_))
    }

    fn into_result(self) -> Result<ScheduledNotification, ScheduleError> {
        match self {
            Reminder::Armed(reminder) => Ok(reminder),
            Reminder::Skipped(e) | Reminder::Refused(e) => Err(e),
        }
    }
}

pub struct Planner {
    events: EventService,
    scheduler: NotificationScheduler,
    /// Last version of each event this process has scheduled from.
    seen: Mutex<HashMap<String, Event>>,
}

impl Planner {
    pub fn new(events: EventService, scheduler: NotificationScheduler) -> Self {
        Self {
            events,
            scheduler,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    /// Events ordered by start, optionally narrowed by a search term.
    pub async fn list(&self, search: Option<&str>) -> EventResult<Vec<Event>> {
        let events = self.events.list().await?;
        match search {
            Some(term) => Ok(filter_events(&events, term).into_iter().cloned().collect()),
            None => Ok(events),
        }
    }

    pub async fn get(&self, id: &str) -> EventResult<Event> {
        self.events.get(id).await
    }

    /// Create (`id == None`) or update an event, then arm its reminder.
    ///
    /// # Errors
    /// Validation and store errors. Scheduling problems are logged only.
    pub async fn save(&self, draft: EventDraft, id: Option<&str>) -> EventResult<SavedEvent> {
        draft.validate()?;

        let event = match id {
            Some(id) => self.events.update(id, draft).await?,
            None => self.events.create(draft).await?,
        };
        tracing::info!(id = %event.id, title = %event.title, "Event saved");

        let reminder = self.notify(&event);
        let mut seen = self.seen.lock();
        if reminder.is_settled() {
            seen.insert(event.id.clone(), event.clone());
        } else {
            seen.remove(&event.id);
        }
        drop(seen);

        Ok(SavedEvent {
            event,
            reminder: reminder.into_result(),
        })
    }

    /// Delete an event and drop its pending reminders.
    ///
    /// Returns the number of reminder chains cancelled.
    pub async fn delete(&self, id: &str) -> EventResult<usize> {
        self.events.delete(id).await?;
        self.seen.lock().remove(id);
        let cancelled = self.scheduler.cancel(id);
        tracing::info!(id, cancelled, "Event deleted");
        Ok(cancelled)
    }

    /// Arm reminders for every event that has not started yet.
    pub async fn schedule_upcoming(&self) -> EventResult<usize> {
        Ok(self.refresh().await?.scheduled)
    }

    /// Bring armed reminders in line with the store.
    ///
    /// New or changed events are (re)scheduled, vanished ones cancelled.
    /// Events unchanged since the last pass are left alone, except ones the
    /// scheduler refused, which are tried again on every pass.
    pub async fn refresh(&self) -> EventResult<RefreshSummary> {
        let events = self.events.list().await?;
        let mut summary = RefreshSummary::default();
        let mut seen = self.seen.lock();

        for event in &events {
            if seen.get(&event.id) == Some(event) {
                continue;
            }

            if self.is_upcoming(event) {
                match self.notify(event) {
                    Reminder::Armed(_) => summary.scheduled += 1,
                    Reminder::Skipped(_) => {}
                    Reminder::Refused(_) => {
                        // the armed chain belongs to an older version
                        summary.cancelled += self.scheduler.cancel(&event.id);
                        seen.remove(&event.id);
                        continue;
                    }
                }
            } else {
                summary.cancelled += self.scheduler.cancel(&event.id);
            }
            seen.insert(event.id.clone(), event.clone());
        }

        let live: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        seen.retain(|id, _| {
            let keep = live.contains(id.as_str());
            if !keep {
                summary.cancelled += self.scheduler.cancel(id);
            }
            keep
        });

        Ok(summary)
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn is_upcoming(&self, event: &Event) -> bool {
        event.start > self.scheduler.now()
    }

    fn notify(&self, event: &Event) -> Reminder {
        match self.scheduler.schedule(event) {
            Ok(reminder) => Reminder::Armed(reminder),
            Err(e @ ScheduleError::InvalidTimestamp { .. }) => {
                tracing::error!(id = %event.id, "Could not schedule reminder: {}", e);
                Reminder::Skipped(e)
            }
            Err(e @ ScheduleError::PastDue { .. }) => {
                tracing::debug!(id = %event.id, "No reminder armed: {}", e);
                Reminder::Skipped(e)
            }
            Err(e) => {
                tracing::debug!(id = %event.id, "Reminder refused for now: {}", e);
                Reminder::Refused(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use agenda_events::{EventError, SqliteEventStore};
    use agenda_notify::{
        ChainState, ManualClock, Permission, RecordingSurface, SchedulerSettings,
    };
    use chrono::{DateTime, Utc};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2030-05-06T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn planner_with(surface: Arc<RecordingSurface>) -> (Planner, EventService) {
        let service = EventService::sqlite(SqliteEventStore::in_memory().unwrap());
        let scheduler = NotificationScheduler::new(
            surface,
            Arc::new(ManualClock::new(t0())),
            SchedulerSettings::default(),
            tokio::runtime::Handle::current(),
        );
        (Planner::new(service.clone(), scheduler), service)
    }

    fn draft(title: &str, start_min: i64) -> EventDraft {
        let start = t0() + chrono::Duration::minutes(start_min);
        EventDraft::new(title, start, start + chrono::Duration::hours(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_schedules_once() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, _) = planner_with(surface.clone());

        let saved = planner.save(draft("Standup", 10), None).await.unwrap();

        let reminder = saved.reminder.unwrap();
        assert_eq!(reminder.event_id, saved.event.id);
        assert_eq!(planner.scheduler().pending_count(&saved.event.id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_draft_never_reaches_store_or_scheduler() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, service) = planner_with(surface.clone());

        let mut bad = draft("Backwards", 10);
        bad.end = bad.start.map(|s| s - chrono::Duration::minutes(1));
        let err = planner.save(bad, None).await.unwrap_err();

        assert_eq!(err.user_message(), "End time must be after start time");
        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(planner.scheduler().pending_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_supersedes_reminder() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, _) = planner_with(surface.clone());

        let first = planner.save(draft("Standup", 10), None).await.unwrap();
        let id = first.event.id.clone();
        let second = planner
            .save(draft("Standup (moved)", 30), Some(&id))
            .await
            .unwrap();

        assert_eq!(first.reminder.unwrap().state(), ChainState::Cancelled);
        assert_eq!(planner.scheduler().pending_count(&id), 1);

        tokio::time::sleep(second.reminder.unwrap().delay + Duration::from_secs(1)).await;
        let titles: Vec<_> = surface
            .deliveries()
            .into_iter()
            .map(|d| d.notification.title)
            .collect();
        assert_eq!(titles, vec!["Standup (moved)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_event_saves_without_reminder() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, _) = planner_with(surface.clone());

        let saved = planner.save(draft("Yesterday", -24 * 60), None).await.unwrap();
        assert!(matches!(saved.reminder, Err(ScheduleError::PastDue { .. })));
        assert_eq!(planner.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_saves_without_reminder() {
        let surface = Arc::new(RecordingSurface::new(Permission::Denied));
        let (planner, _) = planner_with(surface.clone());

        let saved = planner.save(draft("Standup", 10), None).await.unwrap();
        assert_eq!(saved.reminder.unwrap_err(), ScheduleError::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_reminders() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, _) = planner_with(surface.clone());

        let saved = planner.save(draft("Standup", 10), None).await.unwrap();
        assert_eq!(planner.delete(&saved.event.id).await.unwrap(), 1);
        assert_eq!(planner.scheduler().pending_total(), 0);

        assert!(matches!(
            planner.delete(&saved.event.id).await,
            Err(EventError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_upcoming_skips_past_events() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, service) = planner_with(surface.clone());

        service.create(draft("Past", -60)).await.unwrap();
        service.create(draft("Soon", 15)).await.unwrap();
        service.create(draft("Later", 120)).await.unwrap();

        assert_eq!(planner.schedule_upcoming().await.unwrap(), 2);
        assert_eq!(planner.scheduler().pending_total(), 2);

        // nothing changed, nothing re-armed
        assert_eq!(planner.refresh().await.unwrap(), RefreshSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_follows_external_changes() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, service) = planner_with(surface.clone());

        let kept = service.create(draft("Kept", 15)).await.unwrap();
        let moved = service.create(draft("Moved", 20)).await.unwrap();
        let gone = service.create(draft("Gone", 25)).await.unwrap();
        planner.schedule_upcoming().await.unwrap();

        let mut edit = moved.to_draft();
        edit.start = Some(t0() + chrono::Duration::minutes(40));
        edit.end = Some(t0() + chrono::Duration::minutes(50));
        service.update(&moved.id, edit).await.unwrap();
        service.delete(&gone.id).await.unwrap();

        let summary = planner.refresh().await.unwrap();
        assert_eq!(summary, RefreshSummary { scheduled: 1, cancelled: 1 });
        assert_eq!(planner.scheduler().pending_count(&kept.id), 1);
        assert_eq!(planner.scheduler().pending_count(&moved.id), 1);
        assert_eq!(planner.scheduler().pending_count(&gone.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_retries_refused_events() {
        let surface = Arc::new(RecordingSurface::new(Permission::Denied));
        let (planner, service) = planner_with(surface.clone());

        let event = service.create(draft("Standup", 15)).await.unwrap();
        assert_eq!(planner.refresh().await.unwrap().scheduled, 0);
        assert_eq!(planner.refresh().await.unwrap().scheduled, 0);

        surface.set_permission(Permission::Granted);
        assert_eq!(planner.refresh().await.unwrap().scheduled, 1);
        assert_eq!(planner.scheduler().pending_count(&event.id), 1);

        // armed now, so the next pass leaves it alone
        assert_eq!(planner.refresh().await.unwrap(), RefreshSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_save_is_armed_by_refresh() {
        let surface = Arc::new(RecordingSurface::new(Permission::Denied));
        let (planner, _) = planner_with(surface.clone());

        let saved = planner.save(draft("Standup", 10), None).await.unwrap();
        assert!(saved.reminder.is_err());

        surface.set_permission(Permission::Granted);
        assert_eq!(planner.refresh().await.unwrap().scheduled, 1);
        assert_eq!(planner.scheduler().pending_count(&saved.event.id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_skips_event_that_just_started() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, service) = planner_with(surface.clone());

        let start = t0() - chrono::Duration::seconds(2);
        service
            .create(EventDraft::new("Running late", start, start + chrono::Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(planner.refresh().await.unwrap(), RefreshSummary::default());
        assert_eq!(planner.scheduler().pending_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_with_search() {
        let surface = Arc::new(RecordingSurface::granted());
        let (planner, _) = planner_with(surface);

        planner.save(draft("Team standup", 10), None).await.unwrap();
        planner.save(draft("Dentist", 20), None).await.unwrap();

        let found = planner.list(Some("STANDUP")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Team standup");
    }
}
