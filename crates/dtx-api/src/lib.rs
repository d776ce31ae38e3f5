//! Dynatrace API client for the Steadybit Dynatrace extension.
//!
//! `dtx-api` covers the five Dynatrace environment API v2 endpoints the
//! extension talks to:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | ingest event | `POST /v2/events/ingest` |
//! | list entities | `GET /v2/entities` |
//! | create maintenance window | `POST /v2/settings/objects` |
//! | delete maintenance window | `DELETE /v2/settings/objects/{id}` |
//! | list open problems | `GET /v2/problems` |
//!
//! Consumers depend on the narrow traits in [`api`] rather than on
//! [`DynatraceClient`] directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use dtx_api::{ClientConfig, DynatraceClient, ProblemsApi};
//!
//! # async fn run() -> dtx_api::ApiResult<()> {
//! let client = DynatraceClient::new(
//!     ClientConfig::new("https://abc123.live.dynatrace.com/api", "dt0c01.token")
//!         .with_extra_ca_dirs(std::env::var("SSL_CERT_DIR").ok()),
//! )?;
//!
//! let problems = client.get_problems(chrono::Utc::now(), None).await?;
//! println!("{} open problems", problems.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod error;
pub mod tls;
pub mod types;

pub use api::{ApiFuture, EntitiesApi, EventsApi, MaintenanceWindowApi, ProblemsApi};
pub use client::{ClientConfig, DynatraceClient};
pub use error::{ApiError, ApiResult};
pub use types::{
    CreateMaintenanceWindowRequest, CreateMaintenanceWindowResponse, EntitiesList, Entity,
    EventIngest, EventIngestResult, EventIngestResults, GetProblemsResponse, MaintenanceWindow,
    MaintenanceWindowGeneralProperties, MaintenanceWindowOnceRecurrence,
    MaintenanceWindowSchedule, Problem, ProblemEntity, ProblemEntityId,
};
