//! Native desktop notifications via notify-rust.

use crate::error::SurfaceError;
use crate::surface::{Notification, NotificationSurface, Permission};

const APP_NAME: &str = "Agenda";

/// Desktop notification daemon (freedesktop on Linux/BSD, Notification
/// Center on macOS, toasts on Windows).
///
/// Desktop platforms have no per-application consent prompt, so a reachable
/// daemon counts as granted.
#[derive(Debug, Clone)]
pub struct DesktopSurface {
    available: bool,
}

impl DesktopSurface {
    /// Probe the notification daemon once.
    pub fn new() -> Self {
        let available = probe();
        if !available {
            tracing::warn!("No desktop notification server found");
        }
        Self { available }
    }
}

impl Default for DesktopSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe() -> bool {
    match notify_rust::get_server_information() {
        Ok(info) => {
            tracing::debug!(server = %info.name, version = %info.version, "Notification server");
            true
        }
        Err(e) => {
            tracing::debug!("Notification server probe failed: {}", e);
            false
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn probe() -> bool {
    true
}

/// Stable replacement id for a tag, so a later notification with the same
/// tag replaces the earlier one on servers that support it.
#[cfg(all(unix, not(target_os = "macos")))]
fn replace_id(tag: &str) -> u32 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tag.hash(&mut hasher);
    // 0 asks the server for a fresh id
    (hasher.finish() as u32).max(1)
}

impl NotificationSurface for DesktopSurface {
    fn is_available(&self) -> bool {
        self.available
    }

    fn permission(&self) -> Permission {
        if self.available {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn request_permission(&self) -> Result<Permission, SurfaceError> {
        if !self.available {
            return Err(SurfaceError::Unavailable);
        }
        Ok(Permission::Granted)
    }

    fn show(&self, notification: &Notification) -> Result<(), SurfaceError> {
        if !self.available {
            return Err(SurfaceError::Unavailable);
        }

        native(notification)
            .show()
            .map(|_| ())
            .map_err(|e| SurfaceError::Show(e.to_string()))
    }
}

/// Build the native notification.
///
/// The handle is not kept, so no click action is registered: clicking a
/// desktop notification does whatever the desktop does by default (usually
/// dismiss it). `ClickAction::FocusHost` only has an effect on surfaces that
/// report clicks back, such as `RecordingSurface`.
fn native(notification: &Notification) -> notify_rust::Notification {
    let mut native = notify_rust::Notification::new();
    native
        .appname(APP_NAME)
        .summary(&notification.title)
        .body(&notification.body);

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if let Some(tag) = &notification.tag {
            native.id(replace_id(tag));
        }
    }
    native
}

#[cfg(all(test, unix, not(target_os = "macos")))]
mod tests {
    use super::*;
    use crate::surface::{ClickAction, NotificationKind};

    #[test]
    fn test_replace_id_is_stable_and_nonzero() {
        assert_eq!(replace_id("event-1"), replace_id("event-1"));
        assert_ne!(replace_id("event-1"), 0);
        assert_ne!(replace_id(""), 0);
    }

    #[test]
    fn test_native_notification_has_no_click_action() {
        let native = native(&Notification {
            title: "Standup".into(),
            body: "Your event is starting now!".into(),
            tag: Some("e1".into()),
            kind: NotificationKind::Primary,
            on_click: ClickAction::FocusHost,
        });

        assert_eq!(native.summary, "Standup");
        assert_eq!(native.body, "Your event is starting now!");
        assert!(native.actions.is_empty());
    }

    #[test]
    fn test_unavailable_surface_refuses() {
        let surface = DesktopSurface { available: false };
        assert_eq!(surface.permission(), Permission::Denied);
        assert_eq!(surface.request_permission(), Err(SurfaceError::Unavailable));
    }
}
