use crate::models::Notification;
use crate::realtime::ConnectionState;

/// Updates broadcast by the runtime for views to render
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A notification that was not in the inbox yet
    Notification(Notification),
    ConnectionState(ConnectionState),
    /// Display-ready error message
    Error(String),
}
