//! Steadybit lifecycle events to Dynatrace events.
//!
//! The Steadybit platform notifies the extension about experiment, step and
//! target transitions. This crate decodes those notifications, joins target
//! events to the attack step they belong to, resolves Kubernetes and host
//! attributes to Dynatrace entity ids, and posts one `CUSTOM_INFO` event per
//! experiment or attacked target.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dtx_api::{ClientConfig, DynatraceClient};
//! use dtx_events::{EventForwarder, LifecycleEvent, LifecycleKind};
//!
//! # async fn run(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(DynatraceClient::new(ClientConfig::new(
//!     "https://abc123.live.dynatrace.com/api",
//!     "dt0c01.token",
//! ))?);
//! let forwarder = EventForwarder::new(client.clone(), client);
//!
//! let event = LifecycleEvent::parse(LifecycleKind::ExperimentStarted, body)?;
//! forwarder.forward(&event).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod forwarder;
pub mod model;
pub mod registry;
pub mod selector;
pub mod translate;

pub use cache::{DEFAULT_TTL, EntityCache};
pub use error::{EventError, EventResult};
pub use forwarder::EventForwarder;
pub use model::{
    ActionKind, Environment, EventContext, EventEnvelope, ExecutionId, ExperimentExecution,
    LifecycleEvent, LifecycleKind, LifecyclePayload, Principal, StepExecution, StepType,
    TargetExecution, Team, Tenant,
};
pub use registry::{StepRegistry, StepSnapshot};
pub use translate::Translator;
