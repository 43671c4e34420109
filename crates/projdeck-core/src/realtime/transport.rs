use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::io::StreamReader;

use super::sse::{SseDecoder, SseFrame};
use crate::error::{CoreError, CoreResult};

/// Readiness of the underlying channel when it reports an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed
    Open,
    Message(SseFrame),
    Error(ReadyState),
}

/// A live push channel. Closing (or dropping) it stops the reader task.
pub struct TransportHandle {
    events: mpsc::Receiver<TransportEvent>,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(
        events: mpsc::Receiver<TransportEvent>,
        cancel_tx: watch::Sender<bool>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            events,
            cancel_tx,
            task,
        }
    }

    /// Handle over a plain channel, for transports without a reader task
    pub fn from_channel(events: mpsc::Receiver<TransportEvent>) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self::new(events, cancel_tx, None)
    }

    /// Next event; `None` once the channel is gone
    pub async fn next(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn close(&mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a channel to `url`. An `Err` means the transport cannot be built
    /// at all; network failures arrive as `Error(ReadyState::Closed)`.
    async fn open(&self, url: &str, token: Option<&str>) -> CoreResult<TransportHandle>;
}

/// Server-sent events over a streaming reqwest response
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for SseTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn open(&self, url: &str, token: Option<&str>) -> CoreResult<TransportHandle> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| CoreError::transport(format!("invalid push channel URL {}: {}", url, e)))?;

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(read_event_stream(request, event_tx, cancel_rx));

        Ok(TransportHandle::new(event_rx, cancel_tx, Some(task)))
    }
}

async fn read_event_stream(
    request: reqwest::RequestBuilder,
    event_tx: mpsc::Sender<TransportEvent>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let response = tokio::select! {
        _ = cancel_rx.changed() => return,
        response = request.send() => response,
    };

    let response = match response {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!("Push channel rejected with status {}", response.status());
            let _ = event_tx.send(TransportEvent::Error(ReadyState::Closed)).await;
            return;
        }
        Err(e) => {
            tracing::warn!("Push channel request failed: {}", e);
            let _ = event_tx.send(TransportEvent::Error(ReadyState::Closed)).await;
            return;
        }
    };

    if event_tx.send(TransportEvent::Open).await.is_err() {
        return;
    }

    let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
    let mut lines = StreamReader::new(body).lines();
    let mut decoder = SseDecoder::new();

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(frame) = decoder.push_line(&line) {
                        if event_tx.send(TransportEvent::Message(frame)).await.is_err() {
                            tracing::debug!("Push channel receiver dropped");
                            return;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!("Push channel closed by server");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Push channel read error: {}", e);
                    break;
                }
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Error(ReadyState::Closed)).await;
}
