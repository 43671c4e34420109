use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use super::{Backend, NotificationApi, ProfileApi};
use crate::config::CoreConfig;
use crate::constants::endpoints;
use crate::error::{CoreError, CoreResult};
use crate::models::UserProfile;

/// reqwest-backed client for the project-management REST API
pub struct HttpApi {
    config: CoreConfig,
    client: reqwest::Client,
    /// Bearer token attached to notification mutations
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.endpoint(path);
        let builder = self.client.request(method, url);
        match self.token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, method: Method, path: &str) -> CoreResult<()> {
        let response = self.request(method.clone(), path).send().await?;
        check_status(response).await?;
        tracing::debug!("{} {} ok", method, path);
        Ok(())
    }
}

async fn check_status(response: Response) -> CoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CoreError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ProfileApi for HttpApi {
    async fn fetch_current_user(&self, token: &str) -> CoreResult<UserProfile> {
        let response = self
            .client
            .get(self.config.endpoint(endpoints::CURRENT_USER))
            .bearer_auth(token)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(CoreError::auth(format!(
                "profile request rejected ({})",
                response.status()
            )));
        }

        let response = check_status(response).await?;
        response
            .json::<UserProfile>()
            .await
            .map_err(|e| CoreError::payload(format!("invalid profile response: {}", e)))
    }
}

#[async_trait]
impl NotificationApi for HttpApi {
    async fn mark_read(&self, id: i64) -> CoreResult<()> {
        self.send(Method::PUT, &endpoints::mark_read(id)).await
    }

    async fn delete(&self, id: i64) -> CoreResult<()> {
        self.send(Method::DELETE, &endpoints::notification(id)).await
    }

    async fn mark_all_read(&self) -> CoreResult<()> {
        self.send(Method::PUT, endpoints::MARK_ALL_READ).await
    }
}

impl Backend for HttpApi {
    fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}
