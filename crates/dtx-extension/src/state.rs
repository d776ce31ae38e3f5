//! Shared state for the extension server.

use std::sync::Arc;

use dtx_actions::{MaintenanceWindowAction, ProblemCheckAction};
use dtx_api::DynatraceClient;
use dtx_events::EventForwarder;

/// Everything the HTTP handlers need.
///
/// Action state is round-tripped by the orchestrator, so nothing here is
/// per-step.
#[derive(Debug, Clone)]
pub struct AppState {
    forwarder: Arc<EventForwarder>,
    maintenance: Arc<MaintenanceWindowAction>,
    problem_check: Arc<ProblemCheckAction>,
}

impl AppState {
    /// Creates state from already wired components.
    #[must_use]
    pub fn new(
        forwarder: EventForwarder,
        maintenance: MaintenanceWindowAction,
        problem_check: ProblemCheckAction,
    ) -> Self {
        Self {
            forwarder: Arc::new(forwarder),
            maintenance: Arc::new(maintenance),
            problem_check: Arc::new(problem_check),
        }
    }

    /// Wires every component to one Dynatrace client.
    #[must_use]
    pub fn from_client(client: Arc<DynatraceClient>, ui_base_url: &str) -> Self {
        Self::new(
            EventForwarder::new(client.clone(), client.clone()),
            MaintenanceWindowAction::new(client.clone()),
            ProblemCheckAction::new(client, ui_base_url),
        )
    }

    /// The lifecycle event forwarder.
    #[must_use]
    pub fn forwarder(&self) -> &EventForwarder {
        &self.forwarder
    }

    /// The maintenance window action.
    #[must_use]
    pub fn maintenance(&self) -> Arc<MaintenanceWindowAction> {
        self.maintenance.clone()
    }

    /// The problem check action.
    #[must_use]
    pub fn problem_check(&self) -> Arc<ProblemCheckAction> {
        self.problem_check.clone()
    }
}
