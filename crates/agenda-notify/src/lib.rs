//! Event start notifications for Agenda.
//!
//! A [`NotificationScheduler`] arms a primary notification at each event's
//! start and a follow-up reminder shortly after. Time comes from a [`Clock`]
//! and notifications go to a [`NotificationSurface`], both injected.

pub mod clock;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod error;
pub mod permission;
pub mod recording;
pub mod scheduler;
pub mod surface;

pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "desktop")]
pub use desktop::DesktopSurface;
pub use error::{ScheduleError, SurfaceError};
pub use permission::PermissionGate;
pub use recording::{Delivery, RecordingSurface};
pub use scheduler::{ChainState, NotificationScheduler, ScheduledNotification, SchedulerSettings};
pub use surface::{
    ClickAction, LogSurface, Notification, NotificationKind, NotificationSurface, Permission,
};
