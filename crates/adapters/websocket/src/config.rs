//! Websocket transport configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the websocket transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebsocketConfig {
    /// Base URL of the hub, e.g. `http://192.168.2.100:8123`.
    pub base_url: String,
    /// Long-lived access token (or the supervisor token).
    pub access_token: String,
    /// Frames buffered per subscription before newer ones are dropped.
    pub frame_queue_depth: usize,
    /// How long to wait for the reply to a request, pings included.
    pub request_timeout_secs: u64,
    /// Seconds between heartbeat pings; `0` disables them.
    pub ping_interval_secs: u64,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123".to_string(),
            access_token: String::new(),
            frame_queue_depth: 1,
            request_timeout_secs: 10,
            ping_interval_secs: 30,
        }
    }
}

impl WebsocketConfig {
    /// The websocket endpoint derived from [`Self::base_url`].
    ///
    /// `http` becomes `ws` and `https` becomes `wss`. A supervisor proxy base
    /// (`.../core`) is served at `/websocket`, a direct hub at `/api/websocket`.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        if base.ends_with("/core") {
            format!("{base}/websocket")
        } else {
            format!("{base}/api/websocket")
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then_some(Duration::from_secs(self.ping_interval_secs))
    }

    pub(crate) fn queue_depth(&self) -> usize {
        self.frame_queue_depth.max(1)
    }
}
