//! Application-wide constants
//!
//! Endpoint paths, storage keys and timing values shared by the session,
//! realtime and toast modules.

use std::time::Duration;

/// Default REST API base URL when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Default directory for persisted client state
pub const DEFAULT_DATA_DIR: &str = "projdeck_data";

/// File holding the persisted credential
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Well-known key of the bearer token inside the credential file
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

// Environment overrides
pub const ENV_API_URL: &str = "PROJDECK_API_URL";
pub const ENV_DATA_DIR: &str = "PROJDECK_DATA_DIR";
pub const ENV_LOG_FILTER: &str = "PROJDECK_LOG";
pub const ENV_LOG_FILE: &str = "PROJDECK_LOG_FILE";

// REST endpoints, relative to the API base URL
pub mod endpoints {
    pub const CURRENT_USER: &str = "/api/users/me";
    pub const SUBSCRIBE: &str = "/api/notifications/subscribe";
    pub const MARK_ALL_READ: &str = "/api/notifications/read/all";

    pub fn mark_read(id: i64) -> String {
        format!("/api/notifications/read/{}", id)
    }

    pub fn notification(id: i64) -> String {
        format!("/api/notifications/{}", id)
    }
}

/// Name of the SSE event carrying notification payloads
pub const NOTIFICATION_EVENT: &str = "notification";

/// Delay before a dropped push channel is reopened
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reconnect attempts allowed before the connection is declared failed
pub const MAX_RETRIES: u32 = 3;

/// Toast stays fully visible for this long
pub const TOAST_DWELL: Duration = Duration::from_millis(2500);

/// Toast is dropped from the queue after this long (dwell + exit animation)
pub const TOAST_LIFETIME: Duration = Duration::from_millis(2800);

// User-facing error strings
pub const CONNECTION_FAILED_MESSAGE: &str =
    "Connection to the notification server failed. Please reload the page.";
pub const PAYLOAD_ERROR_MESSAGE: &str = "Failed to parse notification.";
