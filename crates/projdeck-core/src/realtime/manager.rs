use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::sse::SseFrame;
use super::transport::{PushTransport, ReadyState, TransportEvent};
use crate::constants::{MAX_RETRIES, NOTIFICATION_EVENT, RETRY_DELAY};
use crate::error::CoreError;
use crate::models::{Notification, NotificationPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Waiting to reopen after the `attempt`-th consecutive drop
    Retrying { attempt: u32 },
    /// Retries exhausted or the transport cannot be built
    Failed,
}

/// Receives everything the connection manager produces.
///
/// Called from the manager's task; implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_notification(&self, notification: Notification);

    fn on_error(&self, error: CoreError);

    fn on_state_change(&self, _state: &ConnectionState) {}
}

struct RunContext {
    transport: Arc<dyn PushTransport>,
    sink: Arc<dyn EventSink>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    url: String,
    token: Option<String>,
    retry_delay: Duration,
    max_retries: u32,
}

impl RunContext {
    fn set_state(&self, state: ConnectionState) {
        tracing::debug!(?state, "Push channel state");
        self.sink.on_state_change(&state);
        self.state_tx.send_replace(state);
    }

    fn dispatch(&self, frame: SseFrame) {
        if frame.event != NOTIFICATION_EVENT {
            tracing::debug!("Skipping push event '{}'", frame.event);
            return;
        }
        match NotificationPayload::from_json(&frame.data) {
            Ok(payload) => self.sink.on_notification(payload.into_notification()),
            Err(e) => {
                tracing::warn!("Malformed notification payload: {} - data: {}", e, frame.data);
                self.sink.on_error(CoreError::payload(e.to_string()));
            }
        }
    }
}

struct RunHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns at most one push channel and reconnects it on drops.
///
/// `start` requires a tokio runtime. Dropping the manager stops it.
pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    sink: Arc<dyn EventSink>,
    url: String,
    retry_delay: Duration,
    max_retries: u32,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    run: Option<RunHandle>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        sink: Arc<dyn EventSink>,
        url: impl Into<String>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            sink,
            url: url.into(),
            retry_delay: RETRY_DELAY,
            max_retries: MAX_RETRIES,
            state_tx: Arc::new(state_tx),
            run: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    /// Open the push channel for `token`, replacing any running instance
    pub fn start(&mut self, token: Option<String>) {
        self.stop();

        let ctx = RunContext {
            transport: self.transport.clone(),
            sink: self.sink.clone(),
            state_tx: self.state_tx.clone(),
            url: self.url.clone(),
            token,
            retry_delay: self.retry_delay,
            max_retries: self.max_retries,
        };
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(ctx, cancel_rx));
        self.run = Some(RunHandle { cancel_tx, task });
    }

    /// Close the channel and cancel any pending retry
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let _ = run.cancel_tx.send(true);
        run.task.abort();

        if *self.state_tx.borrow() != ConnectionState::Disconnected {
            self.sink.on_state_change(&ConnectionState::Disconnected);
            self.state_tx.send_replace(ConnectionState::Disconnected);
        }
        tracing::debug!("Push channel stopped");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_connection(ctx: RunContext, mut cancel_rx: watch::Receiver<bool>) {
    let mut retries = 0u32;

    loop {
        if *cancel_rx.borrow() {
            return;
        }
        ctx.set_state(ConnectionState::Connecting);

        let mut handle = match ctx.transport.open(&ctx.url, ctx.token.as_deref()).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Failed to create push channel: {}", e);
                ctx.set_state(ConnectionState::Failed);
                ctx.sink.on_error(e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel_rx.changed() => {
                    handle.close();
                    return;
                }
                event = handle.next() => match event {
                    Some(TransportEvent::Open) => {
                        retries = 0;
                        ctx.set_state(ConnectionState::Open);
                    }
                    Some(TransportEvent::Message(frame)) => ctx.dispatch(frame),
                    Some(TransportEvent::Error(ReadyState::Closed)) | None => break,
                    Some(TransportEvent::Error(state)) => {
                        tracing::debug!(?state, "Ignoring push channel error while not closed");
                    }
                }
            }
        }
        handle.close();

        if retries >= ctx.max_retries {
            tracing::error!("Push channel dropped {} times, giving up", retries + 1);
            ctx.set_state(ConnectionState::Failed);
            ctx.sink.on_error(CoreError::ConnectionFailed);
            return;
        }

        retries += 1;
        tracing::info!(
            "Push channel closed, retry {}/{} in {:?}",
            retries,
            ctx.max_retries,
            ctx.retry_delay
        );
        ctx.set_state(ConnectionState::Retrying { attempt: retries });

        tokio::select! {
            _ = cancel_rx.changed() => return,
            _ = tokio::time::sleep(ctx.retry_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, ScriptedTransport};

    const NOTIFICATION_JSON: &str = r#"{"id":5,"message":"Post approved","type":"POST","isRead":false,"projectId":2,"referenceId":31,"createdAt":"2024-03-02T08:15:00"}"#;

    fn manager(transport: &Arc<ScriptedTransport>, sink: &Arc<RecordingSink>) -> ConnectionManager {
        ConnectionManager::new(
            transport.clone(),
            sink.clone(),
            "http://localhost:8080/api/notifications/subscribe",
        )
    }

    async fn wait_for_state(manager: &ConnectionManager, target: ConnectionState) {
        let mut rx = manager.subscribe_state();
        tokio::time::timeout(Duration::from_secs(120), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    fn notification_frame(data: &str) -> TransportEvent {
        TransportEvent::Message(SseFrame::new(NOTIFICATION_EVENT, data))
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_are_parsed_and_forwarded() {
        let transport = Arc::new(ScriptedTransport::closing().script(
            vec![
                TransportEvent::Open,
                TransportEvent::Message(SseFrame::new("connect", "connected")),
                notification_frame(NOTIFICATION_JSON),
                notification_frame("{not json"),
            ],
            true,
        ));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(Some("token".into()));
        wait_for_state(&manager, ConnectionState::Open).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let notifications = sink.notifications.lock().clone();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].id, 5);
        assert_eq!(notifications[0].created_time, "2024-03-02 08:15:00");
        assert!(matches!(
            sink.errors.lock().as_slice(),
            [CoreError::Payload { .. }]
        ));
        // a bad payload leaves the channel alone
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_closure_is_terminal() {
        let transport = Arc::new(ScriptedTransport::closing());
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Failed).await;

        assert_eq!(transport.opens(), 4);
        assert_eq!(sink.errors.lock().clone(), vec![CoreError::ConnectionFailed]);
        let retries: Vec<_> = sink
            .states
            .lock()
            .iter()
            .filter_map(|s| match s {
                ConnectionState::Retrying { attempt } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![1, 2, 3]);

        // nothing further is scheduled
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_delay() {
        let transport = Arc::new(ScriptedTransport::closing());
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Retrying { attempt: 1 }).await;
        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(transport.opens(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_retry_count() {
        let closed = || vec![TransportEvent::Error(ReadyState::Closed)];
        let transport = Arc::new(
            ScriptedTransport::closing()
                .script(closed(), false)
                .script(closed(), false)
                .script(vec![TransportEvent::Open, TransportEvent::Error(ReadyState::Closed)], false),
        );
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Failed).await;

        // 2 drops, reset by the open, then 3 retries and the terminal drop
        assert_eq!(transport.opens(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_closed_errors_do_not_retry() {
        let transport = Arc::new(ScriptedTransport::closing().script(
            vec![
                TransportEvent::Open,
                TransportEvent::Error(ReadyState::Connecting),
                TransportEvent::Error(ReadyState::Open),
            ],
            true,
        ));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Open).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(transport.opens(), 1);
        assert!(sink.errors.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_retry() {
        let transport = Arc::new(ScriptedTransport::closing());
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Retrying { attempt: 1 }).await;
        manager.stop();

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 1);
        assert!(!manager.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_tears_down_previous_channel() {
        let transport = Arc::new(
            ScriptedTransport::closing()
                .script(vec![TransportEvent::Open], true)
                .script(vec![TransportEvent::Open], true),
        );
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Open).await;
        manager.start(None);
        wait_for_state(&manager, ConnectionState::Open).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let held = transport.held.lock();
        assert_eq!(held.len(), 2);
        assert!(held[0].is_closed());
        assert!(!held[1].is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_failure_is_fatal() {
        let transport = Arc::new(ScriptedTransport {
            fail_open: true,
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Failed).await;
        assert!(matches!(
            sink.errors.lock().as_slice(),
            [CoreError::Transport { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_channel() {
        let transport = Arc::new(ScriptedTransport::closing().script(vec![TransportEvent::Open], true));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager(&transport, &sink);

        manager.start(None);
        wait_for_state(&manager, ConnectionState::Open).await;
        drop(manager);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(transport.held.lock()[0].is_closed());
    }
}
