//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hamirror.toml` in the working directory. Every field has a
//! default, so the file is optional as long as the environment supplies the
//! hub address and token. Environment variables take precedence over file
//! values; `SUPERVISOR_TOKEN` takes precedence over both.

use std::time::Duration;

use serde::Deserialize;

use hamirror_adapter_rest::RestConfig;
use hamirror_adapter_websocket::WebsocketConfig;
use hamirror_app::HubConfig;
use hamirror_app::supervisor::SupervisorConfig;
use hamirror_domain::entity::EntityId;

/// Base URL of the hub when running as a supervised add-on.
const SUPERVISOR_BASE_URL: &str = "http://supervisor/core";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub location and credentials.
    pub hub: HubSection,
    /// Reconnect and watchdog timings.
    pub supervisor: SupervisorSection,
    /// Websocket transport settings.
    pub transport: TransportSection,
    /// What to mirror.
    pub entities: EntitiesSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// `host:port` of the hub.
    pub address: String,
    /// `http` or `https`.
    pub protocol: String,
    /// Long-lived access token.
    pub access_token: String,
    /// Set when `SUPERVISOR_TOKEN` is present; never read from the file.
    #[serde(skip)]
    pub supervised: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub retry_delay_secs: u64,
    pub max_retries: u32,
    pub connect_timeout_secs: u64,
    pub watchdog_period_secs: u64,
    pub message_staleness_secs: u64,
    pub connection_staleness_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Frames buffered per subscription before newer ones are dropped.
    pub frame_queue_depth: usize,
    /// Timeout for websocket requests and REST calls.
    pub request_timeout_secs: u64,
    /// Seconds between websocket heartbeat pings; `0` disables them.
    pub ping_interval_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EntitiesSection {
    /// Entity ids subscribed to from the start.
    pub track: Vec<String>,
    /// Catalog device ids mirrored as device groups.
    pub devices: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `hamirror.toml` (if present), apply
    /// environment-variable overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hamirror.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HAMIRROR_ADDRESS") {
            self.hub.address = val;
        }
        if let Some(val) = var("HAMIRROR_PROTOCOL") {
            self.hub.protocol = val;
        }
        if let Some(val) = var("HAMIRROR_TOKEN") {
            self.hub.access_token = val;
        }
        if let Some(val) = var("SUPERVISOR_TOKEN") {
            self.hub.access_token = val;
            self.hub.supervised = true;
        }
        if let Some(val) = var("HAMIRROR_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.hub.supervised {
            if self.hub.address.trim().is_empty() {
                return Err(ConfigError::Validation("hub address is not configured".to_string()));
            }
            if !matches!(self.hub.protocol.as_str(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "protocol must be http or https, got {:?}",
                    self.hub.protocol
                )));
            }
        }
        if self.hub.access_token.trim().is_empty() {
            return Err(ConfigError::Validation("access token is not configured".to_string()));
        }
        let supervisor = &self.supervisor;
        if supervisor.max_retries == 0 {
            return Err(ConfigError::Validation("max_retries must be non-zero".to_string()));
        }
        for (name, value) in [
            ("connect_timeout_secs", supervisor.connect_timeout_secs),
            ("watchdog_period_secs", supervisor.watchdog_period_secs),
            ("message_staleness_secs", supervisor.message_staleness_secs),
            ("connection_staleness_secs", supervisor.connection_staleness_secs),
            ("request_timeout_secs", self.transport.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        if self.transport.frame_queue_depth == 0 {
            return Err(ConfigError::Validation("frame_queue_depth must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Base URL of the hub, without the `/api` suffix.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.hub.supervised {
            SUPERVISOR_BASE_URL.to_string()
        } else {
            format!("{}://{}", self.hub.protocol, self.hub.address.trim_end_matches('/'))
        }
    }

    #[must_use]
    pub fn websocket_config(&self) -> WebsocketConfig {
        WebsocketConfig {
            base_url: self.base_url(),
            access_token: self.hub.access_token.clone(),
            frame_queue_depth: self.transport.frame_queue_depth,
            request_timeout_secs: self.transport.request_timeout_secs,
            ping_interval_secs: self.transport.ping_interval_secs,
        }
    }

    #[must_use]
    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.base_url(),
            access_token: self.hub.access_token.clone(),
            request_timeout_secs: self.transport.request_timeout_secs,
        }
    }

    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let s = &self.supervisor;
        SupervisorConfig {
            retry_delay: Duration::from_secs(s.retry_delay_secs),
            max_retries: s.max_retries,
            connect_timeout: Duration::from_secs(s.connect_timeout_secs),
            watchdog_period: Duration::from_secs(s.watchdog_period_secs),
            message_staleness: Duration::from_secs(s.message_staleness_secs),
            connection_staleness: Duration::from_secs(s.connection_staleness_secs),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a tracked entity id is
    /// malformed.
    pub fn hub_config(&self) -> Result<HubConfig, ConfigError> {
        let track = self
            .entities
            .track
            .iter()
            .map(|id| {
                EntityId::parse(id.as_str())
                    .map_err(|err| ConfigError::Validation(format!("entities.track: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HubConfig {
            supervisor: self.supervisor_config(),
            track,
            devices: self.entities.devices.clone(),
        })
    }
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            address: String::new(),
            protocol: "http".to_string(),
            access_token: String::new(),
            supervised: false,
        }
    }
}

impl Default for SupervisorSection {
    fn default() -> Self {
        let defaults = SupervisorConfig::default();
        Self {
            retry_delay_secs: defaults.retry_delay.as_secs(),
            max_retries: defaults.max_retries,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            watchdog_period_secs: defaults.watchdog_period.as_secs(),
            message_staleness_secs: defaults.message_staleness.as_secs(),
            connection_staleness_secs: defaults.connection_staleness.as_secs(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            frame_queue_depth: 1,
            request_timeout_secs: 10,
            ping_interval_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hamirrord=info,hamirror=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
