use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::api::{Backend, HttpApi};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::CoreEvent;
use crate::models::{Notification, Role, UserProfile};
use crate::realtime::{ConnectionManager, ConnectionState, EventSink, PushTransport, SseTransport};
use crate::session::{CredentialStorage, SessionStore};
use crate::store::NotificationInbox;
use crate::toast::ToastQueue;

const EVENT_CAPACITY: usize = 256;

/// Routes connection output into the inbox, the toasts and the event stream
struct RuntimeSink {
    inbox: Arc<NotificationInbox>,
    toasts: Arc<Mutex<ToastQueue>>,
    events_tx: broadcast::Sender<CoreEvent>,
}

impl EventSink for RuntimeSink {
    fn on_notification(&self, notification: Notification) {
        if self.inbox.add_notification(notification.clone()) {
            let _ = self.events_tx.send(CoreEvent::Notification(notification));
        }
    }

    fn on_error(&self, error: CoreError) {
        if error.is_fatal() {
            tracing::error!("Notification channel gave up: {}", error);
        } else {
            tracing::warn!("Notification channel error: {}", error);
        }
        let message = error.to_string();
        self.inbox.set_error(message.clone());
        self.toasts.lock().failure(message.clone());
        let _ = self.events_tx.send(CoreEvent::Error(message));
    }

    fn on_state_change(&self, state: &ConnectionState) {
        let _ = self.events_tx.send(CoreEvent::ConnectionState(state.clone()));
    }
}

/// Inbox mutations that report their outcome as toasts
#[derive(Clone)]
pub struct NotificationActions {
    inbox: Arc<NotificationInbox>,
    toasts: Arc<Mutex<ToastQueue>>,
}

impl NotificationActions {
    pub async fn mark_as_read(&self, id: i64) -> CoreResult<()> {
        let result = self.inbox.mark_as_read(id).await;
        self.report(&result, None);
        result
    }

    pub async fn delete_notification(&self, id: i64) -> CoreResult<()> {
        let result = self.inbox.delete_notification(id).await;
        self.report(&result, Some("Notification deleted"));
        result
    }

    pub async fn mark_all_as_read(&self) -> CoreResult<()> {
        let result = self.inbox.mark_all_as_read().await;
        self.report(&result, Some("All notifications marked as read"));
        result
    }

    fn report(&self, result: &CoreResult<()>, success: Option<&str>) {
        match (result, success) {
            (Err(e), _) => {
                self.toasts.lock().failure(e.to_string());
            }
            (Ok(()), Some(message)) => {
                self.toasts.lock().success(message);
            }
            (Ok(()), None) => {}
        }
    }
}

/// One app instance: session, notification inbox, toasts and the push
/// channel that follows the session.
pub struct CoreRuntime {
    config: CoreConfig,
    session: Arc<SessionStore>,
    backend: Arc<dyn Backend>,
    inbox: Arc<NotificationInbox>,
    toasts: Arc<Mutex<ToastQueue>>,
    events_tx: broadcast::Sender<CoreEvent>,
    connection: ConnectionManager,
    /// Token the running push channel was opened with
    connected_token: Option<String>,
}

impl CoreRuntime {
    pub fn new(config: CoreConfig) -> Self {
        let api = Arc::new(HttpApi::new(config.clone()));
        let transport = Arc::new(SseTransport::new(api.client().clone()));
        Self::with_parts(config, api, transport)
    }

    pub fn with_parts<B: Backend + 'static>(
        config: CoreConfig,
        backend: Arc<B>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let session = Arc::new(SessionStore::init(CredentialStorage::new(&config.data_dir)));
        backend.set_token(session.token());

        let inbox = Arc::new(NotificationInbox::new(backend.clone()));
        let toasts = Arc::new(Mutex::new(ToastQueue::new()));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let sink = Arc::new(RuntimeSink {
            inbox: inbox.clone(),
            toasts: toasts.clone(),
            events_tx: events_tx.clone(),
        });
        let connection = ConnectionManager::new(transport, sink, config.subscribe_url());

        Self {
            config,
            session,
            backend,
            inbox,
            toasts,
            events_tx,
            connection,
            connected_token: None,
        }
    }

    // ===== Getters =====

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> Arc<SessionStore> {
        self.session.clone()
    }

    /// Backend bound to the current session token
    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    pub fn inbox(&self) -> Arc<NotificationInbox> {
        self.inbox.clone()
    }

    pub fn toasts(&self) -> Arc<Mutex<ToastQueue>> {
        self.toasts.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe_state()
    }

    // ===== Session lifecycle =====

    /// Load the profile for a stored token, then open or close the push
    /// channel to match the session.
    ///
    /// Returns `None` when nobody is logged in or the profile fetch failed,
    /// in which case the session has been cleared.
    pub async fn bootstrap(&mut self) -> Option<UserProfile> {
        let profile = if self.session.token().is_some() {
            match self.session.refresh_user(self.backend.as_ref()).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!("Session bootstrap failed: {}", e);
                    self.backend.set_token(self.session.token());
                    None
                }
            }
        } else {
            None
        };

        self.sync_connection();
        profile
    }

    pub fn sign_in(&mut self, token: &str) -> CoreResult<Option<Role>> {
        let role = self.session.sign_in(token)?;
        self.backend.set_token(Some(token.to_string()));
        self.sync_connection();
        Ok(role)
    }

    /// Clear the session and drop everything tied to it
    pub fn sign_out(&mut self) -> CoreResult<()> {
        let result = self.session.sign_out();
        self.backend.set_token(None);
        self.inbox.clear();
        self.sync_connection();
        result
    }

    /// Open the push channel while authenticated, close it otherwise
    pub fn sync_connection(&mut self) {
        let token = self
            .session
            .token()
            .filter(|_| self.session.is_authenticated());

        match token {
            Some(token) => {
                if self.connected_token.as_deref() == Some(token.as_str()) {
                    return;
                }
                tracing::info!("Opening notification channel");
                self.connection.start(Some(token.clone()));
                self.connected_token = Some(token);
            }
            None => {
                if self.connected_token.take().is_some() {
                    tracing::info!("Closing notification channel");
                    self.connection.stop();
                    self.backend.set_token(None);
                    self.inbox.clear();
                }
            }
        }
    }

    /// Follow session changes until `shutdown` resolves, then shut down
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut session_rx = self.session.subscribe();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_connection();
                }
            }
        }
        self.shutdown();
    }

    // ===== Notification actions =====

    /// Handle for notification actions that stays usable during `run_until`
    pub fn actions(&self) -> NotificationActions {
        NotificationActions {
            inbox: self.inbox.clone(),
            toasts: self.toasts.clone(),
        }
    }

    pub async fn mark_as_read(&self, id: i64) -> CoreResult<()> {
        self.actions().mark_as_read(id).await
    }

    pub async fn delete_notification(&self, id: i64) -> CoreResult<()> {
        self.actions().delete_notification(id).await
    }

    pub async fn mark_all_as_read(&self) -> CoreResult<()> {
        self.actions().mark_all_as_read().await
    }

    pub fn shutdown(&mut self) {
        self.connection.stop();
        self.connected_token = None;
        self.toasts.lock().clear();
        tracing::debug!("Runtime shut down");
    }
}
