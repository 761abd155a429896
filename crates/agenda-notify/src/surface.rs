//! Platform notification surfaces.
//!
//! A surface answers three questions (is it there, may we use it, will the
//! user let us) and displays notifications. The scheduler only talks to this
//! trait, so tests swap in [`RecordingSurface`](crate::recording::RecordingSurface).

use crate::error::SurfaceError;

/// User consent to display notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Never asked.
    #[default]
    Default,
    Granted,
    Denied,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Fired at the event start.
    Primary,
    /// Fired a fixed offset after the primary.
    FollowUp,
}

/// What activating a notification does besides dismissing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Bring the hosting application to the foreground.
    FocusHost,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Correlation tag; a new notification with the same tag replaces the old one.
    pub tag: Option<String>,
    pub kind: NotificationKind,
    pub on_click: ClickAction,
}

pub trait NotificationSurface: Send + Sync {
    /// Whether this platform can show notifications at all.
    fn is_available(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Ask the user for consent and return the answer.
    fn request_permission(&self) -> Result<Permission, SurfaceError>;

    fn show(&self, notification: &Notification) -> Result<(), SurfaceError>;
}

/// Surface that writes notifications to the log.
///
/// Always available and always granted; used for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn is_available(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Result<Permission, SurfaceError> {
        Ok(Permission::Granted)
    }

    fn show(&self, notification: &Notification) -> Result<(), SurfaceError> {
        tracing::info!(
            tag = notification.tag.as_deref().unwrap_or(""),
            kind = ?notification.kind,
            "Notification: {}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}
