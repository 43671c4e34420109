use crate::constants::{CONNECTION_FAILED_MESSAGE, PAYLOAD_ERROR_MESSAGE};

/// Errors surfaced by the core. Every message is meant for direct display.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Session expired or invalid: {message}")]
    Auth { message: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Notification channel error: {message}")]
    Transport { message: String },

    #[error("{}", CONNECTION_FAILED_MESSAGE)]
    ConnectionFailed,

    #[error("{}", PAYLOAD_ERROR_MESSAGE)]
    Payload { message: String },

    #[error("Server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request failed: {message}")]
    Http { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

}

impl CoreError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the error ends the current push connection for good
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionFailed | Self::Transport { .. })
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
