//! Domain services shared by several handlers

pub mod notification_service;
pub mod onboarding;

pub use notification_service::{Notification, NotificationKind, NotificationOptions, NotificationService};
