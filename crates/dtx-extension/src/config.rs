//! Extension configuration, read from flags or the environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use dtx_api::ClientConfig;
use url::Url;

use crate::error::{ExtensionError, ExtensionResult};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8090;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Configuration of the extension service.
#[derive(Debug, Clone, Parser)]
#[command(name = "dtx-extension")]
#[command(about = "Steadybit extension forwarding experiments to Dynatrace")]
#[command(version)]
pub struct ExtensionConfig {
    /// Dynatrace API base URL, e.g. `https://abc123.live.dynatrace.com/api`.
    #[arg(long, env = "STEADYBIT_EXTENSION_API_BASE_URL")]
    pub api_base_url: String,

    /// Dynatrace UI base URL, used for problem links.
    #[arg(long, env = "STEADYBIT_EXTENSION_UI_BASE_URL")]
    pub ui_base_url: String,

    /// Dynatrace API token.
    #[arg(long, env = "STEADYBIT_EXTENSION_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Port to listen on.
    #[arg(long, env = "STEADYBIT_EXTENSION_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directories with extra CA certificates.
    #[arg(long, env = "SSL_CERT_DIR")]
    pub ssl_cert_dir: Option<String>,

    /// Accept any TLS certificate from Dynatrace.
    #[arg(long, env = "STEADYBIT_EXTENSION_INSECURE_SKIP_VERIFY")]
    pub insecure_skip_verify: bool,

    /// Timeout for Dynatrace requests, in seconds.
    #[arg(long, env = "STEADYBIT_EXTENSION_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "STEADYBIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ExtensionConfig {
    /// Checks the configuration and normalizes the base URLs.
    ///
    /// # Errors
    ///
    /// Returns `ExtensionError::InvalidConfig` if a base URL is not an
    /// absolute http(s) URL, the token is blank or the timeout is zero.
    pub fn validate(mut self) -> ExtensionResult<Self> {
        self.api_base_url = normalize_base_url("API base URL", &self.api_base_url)?;
        self.ui_base_url = normalize_base_url("UI base URL", &self.ui_base_url)?;

        if self.api_token.trim().is_empty() {
            return Err(ExtensionError::InvalidConfig {
                reason: "API token must not be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ExtensionError::InvalidConfig {
                reason: "request timeout must be positive".to_string(),
            });
        }
        Ok(self)
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Settings for the Dynatrace client.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_base_url.clone(), self.api_token.trim())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_extra_ca_dirs(self.ssl_cert_dir.clone())
            .with_insecure_skip_verify(self.insecure_skip_verify)
    }
}

fn normalize_base_url(name: &str, raw: &str) -> ExtensionResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ExtensionError::InvalidConfig {
        reason: format!("{name} '{raw}' is not a valid URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtensionError::InvalidConfig {
            reason: format!("{name} '{raw}' must use http or https"),
        });
    }
    Ok(trimmed.to_string())
}
