//! The action abstraction served over HTTP.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ActionResult;
use crate::kit::{ActionDescription, PrepareRequest, StartResult, StatusResult, StopResult};

/// Boxed future returned by [`Action`] methods.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = ActionResult<T>> + Send + 'a>>;

/// A step the orchestrator can run.
///
/// Implementations keep no per-step data: everything needed between calls
/// lives in [`Action::State`], which the orchestrator round-trips.
pub trait Action: Send + Sync {
    /// Per-step state.
    type State: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Describes the action and its parameters.
    fn describe(&self) -> ActionDescription;

    /// Validates the config and builds the initial state. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::InvalidConfig` for unusable configs.
    fn prepare(&self, request: &PrepareRequest) -> ActionResult<Self::State>;

    /// Starts the action.
    fn start<'a>(&'a self, state: &'a mut Self::State) -> ActionFuture<'a, StartResult>;

    /// Polls a running action. Actions without polling complete at once.
    fn status<'a>(&'a self, _state: &'a mut Self::State) -> ActionFuture<'a, StatusResult> {
        Box::pin(async {
            Ok(StatusResult {
                completed: true,
                ..StatusResult::default()
            })
        })
    }

    /// Stops the action. Does nothing unless overridden.
    fn stop<'a>(&'a self, _state: &'a mut Self::State) -> ActionFuture<'a, StopResult> {
        Box::pin(async { Ok(StopResult::default()) })
    }
}
