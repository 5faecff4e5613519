//! Websocket adapter error types.

use std::time::Duration;

use hamirror_app::ports::transport::TransportError;
use tokio_tungstenite::tungstenite;

/// Errors specific to the websocket transport.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// The socket could not be opened or failed while in use.
    #[error("websocket error")]
    Socket(#[source] Box<tungstenite::Error>),

    /// The hub rejected the access token.
    #[error("authentication rejected: {0}")]
    AuthInvalid(String),

    /// A message could not be encoded or a text frame was not valid JSON.
    #[error("invalid hub message")]
    Json(#[source] serde_json::Error),

    /// The hub sent a message that does not fit the current exchange.
    #[error("unexpected message: expected {expected}, got {got}")]
    Unexpected {
        expected: &'static str,
        got: String,
    },

    /// The hub answered a request with `success: false`.
    #[error("request {id} failed ({code}): {message}")]
    RequestFailed {
        id: u64,
        code: String,
        message: String,
    },

    /// No reply arrived in time.
    #[error("no reply after {0:?}")]
    Timeout(Duration),

    /// The socket was closed by either side.
    #[error("connection closed")]
    Closed,
}

impl From<tungstenite::Error> for WsError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Socket(Box::new(err))
    }
}

impl From<WsError> for TransportError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::Socket(inner) => Self::Connect(inner.to_string()),
            WsError::AuthInvalid(message) => Self::Auth(message),
            WsError::Timeout(after) => Self::Timeout(after),
            WsError::Closed => Self::Closed,
            other @ (WsError::Json(_)
            | WsError::Unexpected { .. }
            | WsError::RequestFailed { .. }) => Self::Protocol(other.to_string()),
        }
    }
}
