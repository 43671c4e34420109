//! Server push channel for notifications.
//!
//! [`ConnectionManager`] keeps one [`PushTransport`] channel alive per
//! session, reopening it after drops and forwarding parsed notifications to
//! an [`EventSink`].

pub mod manager;
pub mod sse;
pub mod transport;

pub use manager::{ConnectionManager, ConnectionState, EventSink};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{PushTransport, ReadyState, SseTransport, TransportEvent, TransportHandle};
