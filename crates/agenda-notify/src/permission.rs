//! One-time notification consent.

use std::sync::Arc;

use crate::surface::{NotificationSurface, Permission};

/// Asks the surface for notification permission, at most once per answer.
///
/// Nothing here is allowed to fail the caller; every outcome is logged.
#[derive(Clone)]
pub struct PermissionGate {
    surface: Arc<dyn NotificationSurface>,
}

impl PermissionGate {
    pub fn new(surface: Arc<dyn NotificationSurface>) -> Self {
        Self { surface }
    }

    /// Prompt the user if they have never been asked.
    ///
    /// Returns the permission in effect afterwards. An unavailable surface
    /// reports `Denied` without prompting.
    pub fn request_permission(&self) -> Permission {
        if !self.surface.is_available() {
            tracing::warn!("This platform does not support notifications");
            return Permission::Denied;
        }

        let current = self.surface.permission();
        if current != Permission::Default {
            tracing::debug!(permission = %current, "Notification permission already decided");
            return current;
        }

        match self.surface.request_permission() {
            Ok(Permission::Granted) => {
                tracing::info!("Notification permission granted");
                Permission::Granted
            }
            Ok(answer) => {
                tracing::info!("Notification permission denied");
                answer
            }
            Err(e) => {
                tracing::error!("Error requesting notification permission: {}", e);
                self.surface.permission()
            }
        }
    }
}
