use projdeck_core::constants::MAX_RETRIES;
use projdeck_core::models::Notification;
use projdeck_core::realtime::ConnectionState;
use projdeck_core::toast::Toast;
use projdeck_core::CoreEvent;

pub fn format_state(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "disconnected".to_string(),
        ConnectionState::Connecting => "connecting...".to_string(),
        ConnectionState::Open => "connected".to_string(),
        ConnectionState::Retrying { attempt } => {
            format!("connection lost, retry {}/{}", attempt, MAX_RETRIES)
        }
        ConnectionState::Failed => "connection failed".to_string(),
    }
}

/// One line per notification, unread ones marked with `*`
pub fn format_notification(notification: &Notification) -> String {
    let marker = if notification.read { ' ' } else { '*' };
    format!(
        "{} #{} [{}] {} ({}, project {})",
        marker,
        notification.id,
        notification.category,
        notification.message,
        notification.created_time,
        notification.project_ref
    )
}

pub fn format_toast(toast: &Toast) -> String {
    format!("{} {}", toast.icon(), toast.message)
}

pub fn format_event(event: &CoreEvent) -> String {
    match event {
        CoreEvent::Notification(n) => format_notification(n),
        CoreEvent::ConnectionState(state) => format!("-- {}", format_state(state)),
        CoreEvent::Error(message) => format!("!! {}", message),
    }
}
