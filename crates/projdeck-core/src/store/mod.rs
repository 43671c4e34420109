pub mod inbox;

pub use inbox::{NotificationInbox, NotificationList};
