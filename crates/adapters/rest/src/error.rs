//! REST adapter error types.

use hamirror_domain::error::MirrorError;

/// Errors specific to the REST adapter.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The request could not be sent or its body not read.
    #[error("HTTP request failed")]
    Http(#[source] reqwest::Error),

    /// The hub answered with a non-success status.
    #[error("hub answered {status}: {body}")]
    Status { status: u16, body: String },

    /// A response body was not the expected JSON.
    #[error("failed to decode hub response")]
    Decode(#[source] serde_json::Error),
}

impl From<RestError> for MirrorError {
    fn from(err: RestError) -> Self {
        Self::Transport(Box::new(err))
    }
}
