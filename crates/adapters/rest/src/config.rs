//! REST client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the REST client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Base URL of the hub, e.g. `http://192.168.2.100:8123`.
    pub base_url: String,
    /// Long-lived access token (or the supervisor token).
    pub access_token: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123".to_string(),
            access_token: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl RestConfig {
    /// Absolute URL of `path` under the hub's `/api/` root.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = RestConfig::default();
        assert_eq!(config.base_url, "http://localhost:8123");
        assert!(config.access_token.is_empty());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            base_url = "https://hub.example.com"
            access_token = "secret"
            request_timeout_secs = 30
        "#;
        let config: RestConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://hub.example.com");
        assert_eq!(config.access_token, "secret");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: RestConfig = toml::from_str(r#"access_token = "t""#).unwrap();
        assert_eq!(config.base_url, "http://localhost:8123");
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn should_build_api_urls() {
        let config = RestConfig {
            base_url: "http://supervisor/core/".to_string(),
            ..RestConfig::default()
        };
        assert_eq!(
            config.api_url("services/lock/unlock"),
            "http://supervisor/core/api/services/lock/unlock"
        );
        assert_eq!(config.api_url("/template"), "http://supervisor/core/api/template");
    }
}
