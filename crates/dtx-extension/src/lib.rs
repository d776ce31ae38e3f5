//! # dtx-extension
//!
//! HTTP service connecting Steadybit experiments to Dynatrace.
//!
//! The service receives experiment lifecycle webhooks and forwards them as
//! Dynatrace events, and serves two actions: a maintenance window that
//! suppresses alerting during a step, and a check on open problems.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dtx_api::{ClientConfig, DynatraceClient};
//! use dtx_extension::{AppState, ExtensionServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("https://abc123.live.dynatrace.com/api", "dt0c01.token");
//!     let client = Arc::new(DynatraceClient::new(config)?);
//!     let server = ExtensionServer::new(AppState::from_client(client, "https://abc123.apps.dynatrace.com"));
//!     server.serve("0.0.0.0:8090".parse()?).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/` | GET | Lists actions and event listeners |
//! | `/health` | GET | Health check |
//! | `/events/*` | POST | Experiment lifecycle webhooks |
//! | `/actions/{id}` | GET | Action description |
//! | `/actions/{id}/prepare` | POST | Validate config, build state |
//! | `/actions/{id}/start` | POST | Start the action |
//! | `/actions/{id}/status` | POST | Poll the action |
//! | `/actions/{id}/stop` | POST | Stop the action |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{ExtensionConfig, LogFormat};
pub use error::{ExtensionError, ExtensionResult};
pub use routes::create_router;
pub use server::ExtensionServer;
pub use state::AppState;
