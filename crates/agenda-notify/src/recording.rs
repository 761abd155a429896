//! In-memory surface that records what it was asked to show.
//!
//! Delivery instants are taken from the tokio clock, so tests running with
//! paused time can assert exact firing offsets.

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::SurfaceError;
use crate::surface::{ClickAction, Notification, NotificationSurface, Permission};

#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    pub at: Instant,
}

#[derive(Debug)]
pub struct RecordingSurface {
    available: bool,
    permission: Mutex<Permission>,
    prompt_answer: Result<Permission, SurfaceError>,
    show_error: Option<SurfaceError>,
    prompts: Mutex<usize>,
    delivered: Mutex<Vec<Delivery>>,
    visible: Mutex<Vec<Notification>>,
    focus_requests: Mutex<usize>,
}

impl RecordingSurface {
    /// Available surface with the given current permission. A prompt grants.
    pub fn new(permission: Permission) -> Self {
        Self {
            available: true,
            permission: Mutex::new(permission),
            prompt_answer: Ok(Permission::Granted),
            show_error: None,
            prompts: Mutex::new(0),
            delivered: Mutex::new(Vec::new()),
            visible: Mutex::new(Vec::new()),
            focus_requests: Mutex::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Permission::Default)
        }
    }

    /// What the user answers when prompted.
    pub fn answering(mut self, answer: Permission) -> Self {
        self.prompt_answer = Ok(answer);
        self
    }

    pub fn failing_prompt(mut self, message: &str) -> Self {
        self.prompt_answer = Err(SurfaceError::Prompt(message.to_string()));
        self
    }

    pub fn failing_show(mut self, message: &str) -> Self {
        self.show_error = Some(SurfaceError::Show(message.to_string()));
        self
    }

    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock() = permission;
    }

    pub fn prompt_count(&self) -> usize {
        *self.prompts.lock()
    }

    /// Every notification handed to `show`, in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered.lock().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }

    /// Notifications currently on screen (tag replacement applied).
    pub fn visible(&self) -> Vec<Notification> {
        self.visible.lock().clone()
    }

    /// Simulate the user clicking the visible notification with `tag`.
    ///
    /// Returns false when nothing with that tag is on screen.
    pub fn click(&self, tag: &str) -> bool {
        let mut visible = self.visible.lock();
        let Some(pos) = visible.iter().position(|n| n.tag.as_deref() == Some(tag)) else {
            return false;
        };
        let clicked = visible.remove(pos);
        if clicked.on_click == ClickAction::FocusHost {
            *self.focus_requests.lock() += 1;
        }
        true
    }

    pub fn focus_requests(&self) -> usize {
        *self.focus_requests.lock()
    }
}

impl NotificationSurface for RecordingSurface {
    fn is_available(&self) -> bool {
        self.available
    }

    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    fn request_permission(&self) -> Result<Permission, SurfaceError> {
        *self.prompts.lock() += 1;
        let answer = self.prompt_answer.clone()?;
        *self.permission.lock() = answer;
        Ok(answer)
    }

    fn show(&self, notification: &Notification) -> Result<(), SurfaceError> {
        if let Some(err) = &self.show_error {
            return Err(err.clone());
        }

        self.delivered.lock().push(Delivery {
            notification: notification.clone(),
            at: Instant::now(),
        });

        let mut visible = self.visible.lock();
        if let Some(tag) = &notification.tag {
            visible.retain(|n| n.tag.as_ref() != Some(tag));
        }
        visible.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NotificationKind;

    fn note(tag: &str, title: &str, on_click: ClickAction) -> Notification {
        Notification {
            title: title.into(),
            body: "body".into(),
            tag: Some(tag.into()),
            kind: NotificationKind::Primary,
            on_click,
        }
    }

    #[test]
    fn test_same_tag_replaces_visible_notification() {
        let surface = RecordingSurface::granted();
        surface.show(&note("e1", "First", ClickAction::FocusHost)).ok();
        surface.show(&note("e1", "Second", ClickAction::FocusHost)).ok();
        surface.show(&note("e2", "Other", ClickAction::None)).ok();

        assert_eq!(surface.delivered_count(), 3);
        let titles: Vec<_> = surface.visible().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Second", "Other"]);
    }

    #[test]
    fn test_click_dismisses_and_focuses() {
        let surface = RecordingSurface::granted();
        surface.show(&note("e1", "Standup", ClickAction::FocusHost)).ok();
        surface.show(&note("e2", "Reminder", ClickAction::None)).ok();

        assert!(surface.click("e1"));
        assert!(surface.click("e2"));
        assert!(!surface.click("e1"));
        assert!(surface.visible().is_empty());
        assert_eq!(surface.focus_requests(), 1);
    }

    #[test]
    fn test_prompt_records_answer() {
        let surface = RecordingSurface::new(Permission::Default).answering(Permission::Denied);
        assert_eq!(surface.request_permission(), Ok(Permission::Denied));
        assert_eq!(surface.permission(), Permission::Denied);
        assert_eq!(surface.prompt_count(), 1);
    }

    #[test]
    fn test_failing_show() {
        let surface = RecordingSurface::granted().failing_show("dbus gone");
        let result = surface.show(&note("e1", "x", ClickAction::None));
        assert!(matches!(result, Err(SurfaceError::Show(_))));
        assert_eq!(surface.delivered_count(), 0);
    }
}
