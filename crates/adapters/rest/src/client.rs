//! reqwest-backed implementation of the command and catalog ports.

use serde::Serialize;

use hamirror_app::ports::catalog::DeviceCatalog;
use hamirror_app::ports::command::CommandExecutor;
use hamirror_domain::descriptor::Domain;
use hamirror_domain::device::CatalogEntity;
use hamirror_domain::error::MirrorError;
use hamirror_domain::service::ServiceCall;

use crate::config::RestConfig;
use crate::error::RestError;
use crate::template;

#[derive(Serialize)]
struct TemplateRequest<'a> {
    template: &'a str,
}

/// HTTP client for the hub's REST API.
///
/// Authenticates every request with the bearer token from [`RestConfig`].
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: RestConfig,
}

impl RestClient {
    /// # Errors
    ///
    /// Returns [`RestError::Http`] if the TLS backend cannot be initialised.
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("hamirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RestError::Http)?;
        Ok(Self { http, config })
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<String, RestError> {
        let response = self
            .http
            .post(self.config.api_url(path))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await
            .map_err(RestError::Http)?;
        let status = response.status();
        let text = response.text().await.map_err(RestError::Http)?;
        if !status.is_success() {
            return Err(RestError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// POST one service call. Never retried.
    ///
    /// # Errors
    ///
    /// Returns a [`RestError`] if the request fails or the hub rejects it.
    pub async fn call_service(&self, call: &ServiceCall) -> Result<(), RestError> {
        self.post(&format!("services/{}", call.path()), &call.payload)
            .await?;
        tracing::info!(service = %call, target = call.target().unwrap_or("-"), "service called");
        Ok(())
    }

    /// Every entity of `domain`, with its device metadata.
    ///
    /// # Errors
    ///
    /// Returns a [`RestError`] if the request fails or the rendered template
    /// is not a JSON array of rows.
    pub async fn fetch_domain(&self, domain: Domain) -> Result<Vec<CatalogEntity>, RestError> {
        let query = template::domain_query(domain);
        let rendered = self
            .post("template", &TemplateRequest { template: &query })
            .await?;
        template::parse_rows(&rendered)
    }
}

impl CommandExecutor for RestClient {
    async fn execute(&self, call: ServiceCall) -> Result<(), MirrorError> {
        self.call_service(&call).await.map_err(|err| {
            tracing::warn!(service = %call, %err, "service call failed");
            MirrorError::from(err)
        })
    }
}

impl DeviceCatalog for RestClient {
    /// Query every supported domain. A failing domain is logged and skipped;
    /// the fetch only fails when every domain did.
    async fn fetch(&self) -> Result<Vec<CatalogEntity>, MirrorError> {
        let mut entities = Vec::new();
        let mut last_error = None;
        let mut failures = 0;
        for domain in Domain::ALL {
            match self.fetch_domain(domain).await {
                Ok(rows) => {
                    tracing::debug!(domain = domain.as_str(), count = rows.len(), "fetched catalog domain");
                    entities.extend(rows);
                }
                Err(err) => {
                    tracing::warn!(domain = domain.as_str(), %err, "failed to fetch catalog domain");
                    failures += 1;
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) if failures == Domain::ALL.len() => Err(err.into()),
            _ => {
                tracing::info!(entities = entities.len(), "device catalog fetched");
                Ok(entities)
            }
        }
    }
}
