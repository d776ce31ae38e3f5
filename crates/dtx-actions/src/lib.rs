//! Steadybit actions backed by Dynatrace.
//!
//! Two actions are provided:
//!
//! - [`MaintenanceWindowAction`] suppresses problem detection or alerting
//!   while a step runs.
//! - [`ProblemCheckAction`] polls open problems and fails the step when the
//!   configured expectation is violated.
//!
//! Both implement [`Action`]; the HTTP layer serializes their state between
//! calls.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod error;
pub mod kit;
pub mod maintenance;
pub mod problem_check;

pub use action::{Action, ActionFuture};
pub use error::{ActionError, ActionResult};
pub use kit::{
    ActionDescription, CheckError, CheckStatus, ExecutionContext, Message, MessageLevel, Metric,
    PrepareRequest, StartResult, StatusResult, StopResult,
};
pub use maintenance::{
    MAINTENANCE_ACTION_ID, MaintenanceWindowAction, MaintenanceWindowState, SuppressionType,
};
pub use problem_check::{
    CheckMode, Condition, PROBLEM_CHECK_ACTION_ID, ProblemCheckAction, ProblemCheckState,
};
