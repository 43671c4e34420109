//! Scripted backends shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::api::{Backend, NotificationApi, ProfileApi};
use crate::error::{CoreError, CoreResult};
use crate::models::{Notification, Role, UserProfile};
use crate::realtime::{
    ConnectionState, EventSink, PushTransport, ReadyState, TransportEvent, TransportHandle,
};

/// Replays one script per `open`; channels of scripts marked held stay open
#[derive(Default)]
pub struct ScriptedTransport {
    pub scripts: Mutex<VecDeque<(Vec<TransportEvent>, bool)>>,
    pub fallback: Vec<TransportEvent>,
    pub fail_open: bool,
    pub opens: AtomicUsize,
    pub tokens: Mutex<Vec<Option<String>>>,
    pub held: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl ScriptedTransport {
    /// Every unscripted open closes right away
    pub fn closing() -> Self {
        Self {
            fallback: vec![TransportEvent::Error(ReadyState::Closed)],
            ..Default::default()
        }
    }

    pub fn script(self, events: Vec<TransportEvent>, hold: bool) -> Self {
        self.scripts.lock().push_back((events, hold));
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self, _url: &str, token: Option<&str>) -> CoreResult<TransportHandle> {
        if self.fail_open {
            return Err(CoreError::transport("unsupported environment"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(token.map(String::from));
        let (events, hold) = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| (self.fallback.clone(), false));

        let (tx, rx) = mpsc::channel(16);
        for event in events {
            tx.try_send(event).unwrap();
        }
        if hold {
            self.held.lock().push(tx);
        }
        Ok(TransportHandle::from_channel(rx))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
    pub errors: Mutex<Vec<CoreError>>,
    pub states: Mutex<Vec<ConnectionState>>,
}

impl EventSink for RecordingSink {
    fn on_notification(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    fn on_error(&self, error: CoreError) {
        self.errors.lock().push(error);
    }

    fn on_state_change(&self, state: &ConnectionState) {
        self.states.lock().push(state.clone());
    }
}

/// Backend that records calls and answers from flags
#[derive(Default)]
pub struct ScriptedApi {
    pub calls: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    pub gated: AtomicBool,
    pub gate: Notify,
    pub profile: Mutex<Option<CoreResult<UserProfile>>>,
    pub token: Mutex<Option<String>>,
}

impl ScriptedApi {
    pub fn failing() -> Self {
        let api = Self::default();
        api.fail.store(true, Ordering::SeqCst);
        api
    }

    pub fn with_profile(result: CoreResult<UserProfile>) -> Self {
        let api = Self::default();
        *api.profile.lock() = Some(result);
        api
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn respond(&self, call: String) -> CoreResult<()> {
        self.calls.lock().push(call);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            Err(CoreError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileApi for ScriptedApi {
    async fn fetch_current_user(&self, _token: &str) -> CoreResult<UserProfile> {
        self.calls.lock().push("me".to_string());
        self.profile
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(sample_profile()))
    }
}

#[async_trait]
impl NotificationApi for ScriptedApi {
    async fn mark_read(&self, id: i64) -> CoreResult<()> {
        self.respond(format!("read {}", id)).await
    }

    async fn delete(&self, id: i64) -> CoreResult<()> {
        self.respond(format!("delete {}", id)).await
    }

    async fn mark_all_read(&self) -> CoreResult<()> {
        self.respond("read all".to_string()).await
    }
}

impl Backend for ScriptedApi {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }
}

pub fn sample_profile() -> UserProfile {
    UserProfile {
        id: 1,
        email: "kim@example.com".to_string(),
        name: "Kim".to_string(),
        role: Some(Role::Admin),
        company_name: None,
        position: None,
        phone_number: None,
    }
}

pub fn notification(id: i64) -> Notification {
    Notification {
        id,
        message: format!("notification {}", id),
        category: "POST".to_string(),
        created_time: "2024-03-02 08:15:00".to_string(),
        read: false,
        project_ref: 1,
        source_ref: id * 10,
    }
}
