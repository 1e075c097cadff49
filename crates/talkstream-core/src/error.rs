//! Error types for the talkstream session core

use crate::types::SessionState;
use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while driving an avatar session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx status or transport failure from the avatar or text service.
    #[error("{service} service error{}: {message}", status_suffix(.status))]
    RemoteService {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Peer-to-peer handshake failure (offer, answer, transport setup).
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Operation attempted outside the state it is valid in.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// A connect was overtaken by a later connect or destroy.
    #[error("Connect superseded by a later session operation (epoch {epoch})")]
    Superseded { epoch: u64 },
}

impl SessionError {
    pub(crate) fn remote(service: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        SessionError::RemoteService {
            service,
            status,
            message: message.into(),
        }
    }

    /// True for errors the caller can fix by calling `connect()` again.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            SessionError::RemoteService { .. } | SessionError::Negotiation(_) | SessionError::Superseded { .. }
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" ({})", code),
        None => String::new(),
    }
}

impl From<config::ConfigError> for SessionError {
    fn from(err: config::ConfigError) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl From<webrtc::Error> for SessionError {
    fn from(err: webrtc::Error) -> Self {
        SessionError::Negotiation(err.to_string())
    }
}
