pub mod notification;
pub mod user;

pub use notification::{format_created_time, Notification, NotificationPayload};
pub use user::{Role, UserProfile};
