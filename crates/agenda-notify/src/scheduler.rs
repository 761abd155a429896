//! Start-time notification scheduler.
//!
//! `schedule` works out how long until an event starts and arms a chain on
//! the runtime: the primary notification at `start + grace_buffer`, then a
//! follow-up reminder `follow_up` after the primary was actually delivered.
//! Every chain has its own cancellation token, keyed by event id in a
//! registry, so re-scheduling an edited event can replace what was armed.
//!
//! Nothing here fails the caller except a malformed timestamp; every other
//! refusal is logged and reported as a recoverable [`ScheduleError`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agenda_core::{NotificationConfig, RescheduleMode};
use agenda_events::Event;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::ScheduleError;
use crate::permission::PermissionGate;
use crate::surface::{ClickAction, Notification, NotificationKind, NotificationSurface, Permission};

pub const DEFAULT_GRACE_BUFFER: Duration = Duration::from_millis(5000);
pub const DEFAULT_FOLLOW_UP: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_BODY: &str = "Your event is starting now!";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// When false every call is refused with `PermissionDenied`.
    pub enabled: bool,
    /// Added to the computed delay before the primary fires.
    pub grace_buffer: Duration,
    /// Gap between primary delivery and the follow-up.
    pub follow_up: Duration,
    /// Body for events without a description.
    pub default_body: String,
    pub reschedule: RescheduleMode,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_buffer: DEFAULT_GRACE_BUFFER,
            follow_up: DEFAULT_FOLLOW_UP,
            default_body: DEFAULT_BODY.to_string(),
            reschedule: RescheduleMode::Supersede,
        }
    }
}

impl From<&NotificationConfig> for SchedulerSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            grace_buffer: Duration::from_millis(config.grace_buffer_ms),
            follow_up: Duration::from_secs(u64::from(config.follow_up_minutes) * 60),
            default_body: config.default_body.clone(),
            reschedule: config.reschedule,
        }
    }
}

impl SchedulerSettings {
    fn follow_up_body(&self) -> String {
        let secs = self.follow_up.as_secs();
        let ago = match (secs / 60, secs % 60) {
            (1, 0) => "1 minute".to_string(),
            (mins, 0) => format!("{} minutes", mins),
            _ => format!("{} seconds", secs),
        };
        format!("This event started {} ago.", ago)
    }
}

/// Lifecycle of one notification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Armed,
    PrimaryFired,
    FollowUpArmed,
    FollowUpFired,
    Cancelled,
}

/// Handle to an armed chain. Dropping it does not cancel anything.
#[derive(Debug, Clone)]
pub struct ScheduledNotification {
    pub event_id: String,
    /// When the primary is due (start plus grace buffer).
    pub fire_at: DateTime<Utc>,
    /// Nominal follow-up time; the real one is measured from primary delivery.
    pub follow_up_at: DateTime<Utc>,
    /// Delay the primary timer was armed with.
    pub delay: Duration,
    state: Arc<Mutex<ChainState>>,
    token: CancellationToken,
}

impl ScheduledNotification {
    pub fn state(&self) -> ChainState {
        *self.state.lock()
    }

    /// Stop this chain. Notifications already shown stay shown.
    pub fn cancel(&self) {
        mark_cancelled(&self.state);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct PendingChain {
    chain_id: u64,
    token: CancellationToken,
    state: Arc<Mutex<ChainState>>,
}

struct Inner {
    surface: Arc<dyn NotificationSurface>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    runtime: Handle,
    root: CancellationToken,
    pending: Mutex<HashMap<String, Vec<PendingChain>>>,
    next_chain: AtomicU64,
}

impl Inner {
    fn release(&self, event_id: &str, chain_id: u64) {
        let mut pending = self.pending.lock();
        if let Some(chains) = pending.get_mut(event_id) {
            chains.retain(|c| c.chain_id != chain_id);
            if chains.is_empty() {
                pending.remove(event_id);
            }
        }
    }
}

#[derive(Clone)]
pub struct NotificationScheduler {
    inner: Arc<Inner>,
}

impl NotificationScheduler {
    /// Create a scheduler whose timers run on `runtime`.
    pub fn new(
        surface: Arc<dyn NotificationSurface>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                surface,
                clock,
                settings,
                runtime,
                root: CancellationToken::new(),
                pending: Mutex::new(HashMap::new()),
                next_chain: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.inner.settings
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Gate sharing this scheduler's surface.
    pub fn permission_gate(&self) -> PermissionGate {
        PermissionGate::new(self.inner.surface.clone())
    }

    /// Arm the primary and follow-up notifications for a stored event.
    ///
    /// # Errors
    /// `CapabilityUnavailable`, `PermissionDenied` or `PastDue` when nothing
    /// was armed; all of them are recoverable.
    pub fn schedule(&self, event: &Event) -> Result<ScheduledNotification, ScheduleError> {
        self.arm(&event.id, &event.title, event.description_text(), event.start)
    }

    /// Like [`schedule`](Self::schedule) for callers holding a raw start
    /// string. Only RFC 3339 with an explicit offset is accepted.
    ///
    /// # Errors
    /// `InvalidTimestamp` for anything else, plus the errors of `schedule`.
    pub fn schedule_raw(
        &self,
        event_id: &str,
        title: &str,
        description: Option<&str>,
        start: &str,
    ) -> Result<ScheduledNotification, ScheduleError> {
        let start = DateTime::parse_from_rfc3339(start.trim())
            .map_err(|e| {
                tracing::error!(event_id, start, "Invalid event start timestamp: {}", e);
                ScheduleError::InvalidTimestamp {
                    input: start.to_string(),
                    reason: e.to_string(),
                }
            })?
            .with_timezone(&Utc);

        let description = description.filter(|d| !d.trim().is_empty());
        self.arm(event_id, title, description, start)
    }

    fn arm(
        &self,
        event_id: &str,
        title: &str,
        description: Option<&str>,
        start: DateTime<Utc>,
    ) -> Result<ScheduledNotification, ScheduleError> {
        let inner = &self.inner;
        let settings = &inner.settings;

        if !settings.enabled {
            tracing::info!(event_id, "Notifications disabled, not scheduling");
            return Err(ScheduleError::PermissionDenied);
        }

        if !inner.surface.is_available() {
            tracing::warn!("This platform does not support notifications");
            return Err(ScheduleError::CapabilityUnavailable);
        }

        let permission = inner.surface.permission();
        if permission != Permission::Granted {
            tracing::warn!(event_id, %permission, "Notification permission not granted");
            return Err(ScheduleError::PermissionDenied);
        }

        let now = inner.clock.now();
        let delay_ms = (start - now).num_milliseconds();
        if delay_ms <= 0 {
            tracing::info!(event_id, %start, "Event start time is in the past, skipping notification");
            return Err(ScheduleError::PastDue {
                event_id: event_id.to_string(),
                start,
            });
        }

        let total_ms = delay_ms.saturating_add(millis(settings.grace_buffer));
        let out_of_range = || ScheduleError::InvalidTimestamp {
            input: start.to_rfc3339(),
            reason: "notification time out of range".to_string(),
        };
        let fire_at = now
            .checked_add_signed(chrono::Duration::milliseconds(total_ms))
            .ok_or_else(out_of_range)?;
        let follow_up_at = fire_at
            .checked_add_signed(chrono::Duration::milliseconds(millis(settings.follow_up)))
            .ok_or_else(out_of_range)?;
        let delay = Duration::from_millis(total_ms.unsigned_abs());

        if settings.reschedule == RescheduleMode::Supersede {
            let superseded = self.cancel(event_id);
            if superseded > 0 {
                tracing::debug!(event_id, superseded, "Replaced pending notifications");
            }
        }

        let state = Arc::new(Mutex::new(ChainState::Armed));
        let token = inner.root.child_token();

        let handle = ScheduledNotification {
            event_id: event_id.to_string(),
            fire_at,
            follow_up_at,
            delay,
            state: state.clone(),
            token: token.clone(),
        };

        if inner.root.is_cancelled() {
            tracing::debug!(event_id, "Scheduler shut down, not arming");
            mark_cancelled(&state);
            return Ok(handle);
        }

        let chain_id = inner.next_chain.fetch_add(1, Ordering::Relaxed);
        inner
            .pending
            .lock()
            .entry(event_id.to_string())
            .or_default()
            .push(PendingChain {
                chain_id,
                token: token.clone(),
                state: state.clone(),
            });

        let chain = Chain {
            event_id: event_id.to_string(),
            chain_id,
            token,
            state,
            deadline: {
                let _entered = inner.runtime.enter();
                Instant::now() + delay
            },
            primary: Notification {
                title: title.to_string(),
                body: description.unwrap_or(&settings.default_body).to_string(),
                tag: Some(event_id.to_string()),
                kind: NotificationKind::Primary,
                on_click: ClickAction::FocusHost,
            },
            follow_up: Notification {
                title: format!("Reminder: {}", title),
                body: settings.follow_up_body(),
                tag: None,
                kind: NotificationKind::FollowUp,
                on_click: ClickAction::None,
            },
        };
        inner.runtime.spawn(run_chain(inner.clone(), chain));

        tracing::info!(event_id, title, delay_ms = total_ms, %fire_at, "Notification scheduled");
        Ok(handle)
    }

    /// Cancel every pending chain for `event_id`. Returns how many were live.
    pub fn cancel(&self, event_id: &str) -> usize {
        let chains = self.inner.pending.lock().remove(event_id).unwrap_or_default();
        let mut cancelled = 0;
        for chain in chains {
            if !chain.token.is_cancelled() {
                cancelled += 1;
            }
            mark_cancelled(&chain.state);
            chain.token.cancel();
        }
        if cancelled > 0 {
            tracing::debug!(event_id, cancelled, "Cancelled pending notifications");
        }
        cancelled
    }

    /// Live chains for one event.
    pub fn pending_count(&self, event_id: &str) -> usize {
        self.inner
            .pending
            .lock()
            .get(event_id)
            .map(|chains| chains.iter().filter(|c| !c.token.is_cancelled()).count())
            .unwrap_or(0)
    }

    /// Live chains across all events.
    pub fn pending_total(&self) -> usize {
        self.inner
            .pending
            .lock()
            .values()
            .flatten()
            .filter(|c| !c.token.is_cancelled())
            .count()
    }

    /// Cancel everything. Later `schedule` calls arm nothing.
    pub fn shutdown(&self) {
        let drained: Vec<PendingChain> =
            self.inner.pending.lock().drain().flat_map(|(_, v)| v).collect();
        for chain in &drained {
            mark_cancelled(&chain.state);
        }
        self.inner.root.cancel();
        tracing::info!(cancelled = drained.len(), "Notification scheduler shut down");
    }
}

/// Whole milliseconds in `d`, saturating at `i64::MAX`.
fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn mark_cancelled(state: &Mutex<ChainState>) {
    let mut state = state.lock();
    if *state != ChainState::FollowUpFired {
        *state = ChainState::Cancelled;
    }
}

struct Chain {
    event_id: String,
    chain_id: u64,
    token: CancellationToken,
    state: Arc<Mutex<ChainState>>,
    deadline: Instant,
    primary: Notification,
    follow_up: Notification,
}

async fn run_chain(inner: Arc<Inner>, chain: Chain) {
    let Chain {
        event_id,
        chain_id,
        token,
        state,
        deadline,
        primary,
        follow_up,
    } = chain;

    let delivered = async {
        tokio::time::sleep_until(deadline).await;
        deliver(inner.surface.as_ref(), &primary);
        *state.lock() = ChainState::PrimaryFired;

        let follow_up_deadline = Instant::now() + inner.settings.follow_up;
        *state.lock() = ChainState::FollowUpArmed;
        tokio::time::sleep_until(follow_up_deadline).await;
        deliver(inner.surface.as_ref(), &follow_up);
        *state.lock() = ChainState::FollowUpFired;
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            mark_cancelled(&state);
            tracing::debug!(event_id = %event_id, "Notification chain cancelled");
        }
        _ = delivered => {}
    }

    inner.release(&event_id, chain_id);
}

fn deliver(surface: &dyn NotificationSurface, notification: &Notification) {
    match surface.show(notification) {
        Ok(()) => tracing::info!(
            kind = ?notification.kind,
            title = %notification.title,
            "Notification shown"
        ),
        Err(e) => tracing::error!(kind = ?notification.kind, "Failed to show notification: {}", e),
    }
}
