//! REST backend access.
//!
//! The session and inbox talk to the backend through the [`ProfileApi`] and
//! [`NotificationApi`] traits so tests can substitute scripted backends.

pub mod http;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::models::UserProfile;

pub use http::HttpApi;

#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch the profile of the user owning `token`
    async fn fetch_current_user(&self, token: &str) -> CoreResult<UserProfile>;
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn mark_read(&self, id: i64) -> CoreResult<()>;

    async fn delete(&self, id: i64) -> CoreResult<()>;

    async fn mark_all_read(&self) -> CoreResult<()>;
}

/// Everything the runtime needs from the backend
pub trait Backend: ProfileApi + NotificationApi {
    /// Credential attached to notification mutations
    fn set_token(&self, _token: Option<String>) {}
}
