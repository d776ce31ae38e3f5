//! HTTP client for the Dynatrace environment API v2.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::api::{ApiFuture, EntitiesApi, EventsApi, MaintenanceWindowApi, ProblemsApi};
use crate::error::{ApiError, ApiResult};
use crate::tls;
use crate::types::{
    CreateMaintenanceWindowRequest, CreateMaintenanceWindowResponse, EntitiesList, EventIngest,
    EventIngestResults, GetProblemsResponse, Problem,
};

/// Content type sent with every request.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of problems fetched per poll.
pub const PROBLEMS_PAGE_SIZE: u32 = 500;

const OPEN_PROBLEMS_SELECTOR: &str = "status(\"OPEN\")";

/// Connection settings for [`DynatraceClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://abc123.live.dynatrace.com/api`.
    pub api_base_url: String,
    /// API token sent as `Api-Token`.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Directories with additional CA certificates, `PATH`-style separated.
    pub extra_ca_dirs: Option<String>,
    /// Accept any server certificate.
    pub insecure_skip_verify: bool,
}

impl ClientConfig {
    /// Creates a configuration with default timeout and the system trust store.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_token: api_token.into(),
            timeout: DEFAULT_TIMEOUT,
            extra_ca_dirs: None,
            insecure_skip_verify: false,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the directories to load extra CA certificates from.
    #[must_use]
    pub fn with_extra_ca_dirs(mut self, dirs: Option<String>) -> Self {
        self.extra_ca_dirs = dirs.filter(|d| !d.trim().is_empty());
        self
    }

    /// Disables certificate verification.
    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("extra_ca_dirs", &self.extra_ca_dirs)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

struct RawResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl RawResponse {
    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn unexpected_status(&self) -> ApiError {
        ApiError::UnexpectedStatus {
            status: self.status.as_u16(),
            body: self.body_text(),
        }
    }

    fn decode<T: DeserializeOwned + Default>(&self) -> ApiResult<T> {
        if self.body.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            error!(error = %e, body = %self.body_text(), "failed to parse response body");
            ApiError::from(e)
        })
    }
}

/// Client for the Dynatrace environment API v2.
#[derive(Clone)]
pub struct DynatraceClient {
    http: reqwest::Client,
    api_base_url: String,
    api_token: String,
}

impl DynatraceClient {
    /// Builds a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidConfig` if the TLS backend cannot be set up.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(dirs) = config.extra_ca_dirs.as_deref() {
            for certificate in tls::load_certificates(dirs) {
                builder = builder.add_root_certificate(certificate);
            }
        }

        if config.insecure_skip_verify {
            warn!("TLS certificate verification is disabled for the Dynatrace API");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(|e| ApiError::InvalidConfig {
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
        })
    }

    /// Returns the API base URL without trailing slash.
    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> ApiResult<RawResponse> {
        let url = format!("{}{}", self.api_base_url, path);
        debug!(method = %method, url = %url, "requesting Dynatrace API");

        let mut request = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, format!("Api-Token {}", self.api_token));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            debug!(len = body.len(), "request body");
            request = request.body(body);
        }

        let response = request.send().await.map_err(|source| {
            error!(url = %url, error = %source, "failed to execute request");
            ApiError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { url, source })?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn post_event_impl(&self, event: &EventIngest) -> ApiResult<EventIngestResults> {
        let body = serde_json::to_vec(event)?;
        let response = self
            .execute(Method::POST, "/v2/events/ingest", &[], Some(body))
            .await?;

        if !response.status.is_success() {
            return Err(response.unexpected_status());
        }
        response.decode()
    }

    async fn get_entities_impl(&self, entity_selector: &str) -> ApiResult<EntitiesList> {
        let query = [("entitySelector", entity_selector.to_string())];
        let response = self
            .execute(Method::GET, "/v2/entities", &query, None)
            .await?;

        if response.status != StatusCode::OK {
            return Err(response.unexpected_status());
        }
        response.decode()
    }

    async fn create_maintenance_window_impl(
        &self,
        request: &CreateMaintenanceWindowRequest,
    ) -> ApiResult<String> {
        let body = serde_json::to_vec(&[request])?;
        let response = self
            .execute(Method::POST, "/v2/settings/objects", &[], Some(body))
            .await?;

        if response.status != StatusCode::OK {
            error!(code = response.status.as_u16(), body = %response.body_text(), "unexpected response");
            return Err(response.unexpected_status());
        }

        let results: Vec<CreateMaintenanceWindowResponse> = response.decode()?;
        match results.as_slice() {
            [created] if created.code == 200 => Ok(created.object_id.clone()),
            _ => {
                error!(results = ?results, "unexpected maintenance window response");
                Err(ApiError::UnexpectedResponse {
                    reason: format!("expected one created settings object, got {results:?}"),
                })
            }
        }
    }

    async fn delete_maintenance_window_impl(&self, window_id: &str) -> ApiResult<()> {
        let path = format!("/v2/settings/objects/{window_id}");
        let response = self.execute(Method::DELETE, &path, &[], None).await?;

        if !response.status.is_success() {
            return Err(response.unexpected_status());
        }
        Ok(())
    }

    async fn get_problems_impl(
        &self,
        from: DateTime<Utc>,
        entity_selector: Option<&str>,
    ) -> ApiResult<Vec<Problem>> {
        let mut query = vec![
            ("problemSelector", OPEN_PROBLEMS_SELECTOR.to_string()),
            ("pageSize", PROBLEMS_PAGE_SIZE.to_string()),
            ("from", from.timestamp_millis().to_string()),
        ];
        if let Some(selector) = entity_selector {
            query.push(("entitySelector", selector.to_string()));
        }

        let response = self
            .execute(Method::GET, "/v2/problems", &query, None)
            .await?;

        if response.status != StatusCode::OK {
            error!(code = response.status.as_u16(), body = %response.body_text(), "unexpected response");
            return Err(response.unexpected_status());
        }

        let problems: GetProblemsResponse = response.decode()?;
        Ok(problems.problems)
    }
}

impl fmt::Debug for DynatraceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynatraceClient")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl EventsApi for DynatraceClient {
    fn post_event<'a>(&'a self, event: &'a EventIngest) -> ApiFuture<'a, EventIngestResults> {
        Box::pin(self.post_event_impl(event))
    }
}

impl EntitiesApi for DynatraceClient {
    fn get_entities<'a>(&'a self, entity_selector: &'a str) -> ApiFuture<'a, EntitiesList> {
        Box::pin(self.get_entities_impl(entity_selector))
    }
}

impl MaintenanceWindowApi for DynatraceClient {
    fn create_maintenance_window<'a>(
        &'a self,
        request: &'a CreateMaintenanceWindowRequest,
    ) -> ApiFuture<'a, String> {
        Box::pin(self.create_maintenance_window_impl(request))
    }

    fn delete_maintenance_window<'a>(&'a self, window_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(self.delete_maintenance_window_impl(window_id))
    }
}

impl ProblemsApi for DynatraceClient {
    fn get_problems<'a>(
        &'a self,
        from: DateTime<Utc>,
        entity_selector: Option<&'a str>,
    ) -> ApiFuture<'a, Vec<Problem>> {
        Box::pin(self.get_problems_impl(from, entity_selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("https://abc.live.dynatrace.com/api", "token");

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.extra_ca_dirs.is_none());
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn test_client_config_blank_ca_dirs_ignored() {
        let config = ClientConfig::new("https://x/api", "t").with_extra_ca_dirs(Some("  ".into()));
        assert!(config.extra_ca_dirs.is_none());
    }

    #[test]
    fn test_client_config_debug_redacts_token() {
        let config = ClientConfig::new("https://x/api", "super-secret");
        let debug = format!("{config:?}");

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = DynatraceClient::new(ClientConfig::new("https://x/api/", "t")).unwrap();
        assert_eq!(client.api_base_url(), "https://x/api");
    }

    #[test]
    fn test_raw_response_decode_empty_body() {
        let response = RawResponse {
            status: StatusCode::CREATED,
            body: Vec::new(),
        };
        let results: EventIngestResults = response.decode().unwrap();
        assert_eq!(results, EventIngestResults::default());
    }
}
