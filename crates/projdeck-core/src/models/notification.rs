use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Display format for notification timestamps (24-hour clock, local time)
const CREATED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Notification payload as sent on the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_read: bool,
    pub project_id: i64,
    pub reference_id: i64,
    pub created_at: String,
}

impl NotificationPayload {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn into_notification(self) -> Notification {
        Notification {
            created_time: format_created_time(&self.created_at),
            id: self.id,
            message: self.message,
            category: self.kind,
            read: self.is_read,
            project_ref: self.project_id,
            source_ref: self.reference_id,
        }
    }
}

/// A notification held by the inbox. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub category: String,
    /// Localized display string, already formatted
    pub created_time: String,
    pub read: bool,
    pub project_ref: i64,
    pub source_ref: i64,
}

/// Convert a server timestamp into the display string.
///
/// RFC 3339 timestamps are shifted into the local zone; naive timestamps are
/// already server-local and only reformatted. Anything else is passed through.
pub fn format_created_time(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(CREATED_TIME_FORMAT).to_string();
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return naive.format(CREATED_TIME_FORMAT).to_string();
    }
    tracing::debug!("Unrecognized notification timestamp: {}", raw);
    raw.to_string()
}
