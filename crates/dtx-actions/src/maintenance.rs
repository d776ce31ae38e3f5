//! Maintenance window action.
//!
//! Suppresses Dynatrace problem detection or alerting for the duration of a
//! step by creating a one-off maintenance window on `start` and deleting it
//! on `stop`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dtx_api::{
    CreateMaintenanceWindowRequest, MaintenanceWindow, MaintenanceWindowApi,
    MaintenanceWindowGeneralProperties, MaintenanceWindowOnceRecurrence,
    MaintenanceWindowSchedule,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::action::{Action, ActionFuture};
use crate::error::{ActionError, ActionResult};
use crate::kit::{
    self, ActionDescription, ActionKind, ActionParameter, Message, ParameterOption, ParameterType,
    PrepareRequest, StartResult, StopResult, TimeControl,
};

/// Action id.
pub const MAINTENANCE_ACTION_ID: &str =
    "com.steadybit.extension_dynatrace.create_maintenance_window";

const WINDOW_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What Dynatrace suppresses during the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuppressionType {
    /// Problems are detected and alerted.
    #[default]
    DetectProblemsAndAlert,
    /// Problems are detected but not alerted.
    DetectProblemsDontAlert,
    /// Problem detection is off.
    DontDetectProblems,
}

impl SuppressionType {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectProblemsAndAlert => "DETECT_PROBLEMS_AND_ALERT",
            Self::DetectProblemsDontAlert => "DETECT_PROBLEMS_DONT_ALERT",
            Self::DontDetectProblems => "DONT_DETECT_PROBLEMS",
        }
    }
}

/// Step configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowConfig {
    /// Window length in milliseconds.
    #[serde(deserialize_with = "kit::duration_millis")]
    pub duration: u64,
    /// Suppression, defaults to detect and alert.
    #[serde(default)]
    pub suppression_type: Option<SuppressionType>,
}

/// State carried between `prepare`, `start` and `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowState {
    /// When the window ends.
    pub end: DateTime<Utc>,
    /// What the window suppresses.
    pub suppression_type: SuppressionType,
    /// Settings object id once the window exists.
    #[serde(default)]
    pub window_id: Option<String>,
    /// Link to the experiment.
    #[serde(default)]
    pub experiment_uri: Option<String>,
    /// Link to the execution.
    #[serde(default)]
    pub execution_uri: Option<String>,
    /// Experiment key.
    #[serde(default)]
    pub experiment_key: Option<String>,
    /// Execution id.
    #[serde(default)]
    pub execution_id: Option<i64>,
}

impl MaintenanceWindowState {
    /// Builds the state from a prepare request.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::InvalidConfig` for an unusable config.
    pub fn prepare(request: &PrepareRequest, now: DateTime<Utc>) -> ActionResult<Self> {
        let config: MaintenanceWindowConfig = request.parse_config()?;
        let context = request.context();

        Ok(Self {
            end: kit::deadline(now, config.duration)?,
            suppression_type: config.suppression_type.unwrap_or_default(),
            window_id: None,
            experiment_uri: context.experiment_uri,
            execution_uri: context.execution_uri,
            experiment_key: context.experiment_key,
            execution_id: context.execution_id,
        })
    }

    /// Window name, naming the execution when known.
    #[must_use]
    pub fn window_name(&self) -> String {
        match (&self.experiment_key, self.execution_id) {
            (Some(key), Some(id)) => format!("Steadybit {key} - {id}"),
            _ => "Steadybit".to_string(),
        }
    }

    /// Window description listing the known links.
    #[must_use]
    pub fn window_description(&self) -> String {
        let mut lines = Vec::new();
        if let Some(uri) = &self.experiment_uri {
            lines.push(format!("Experiment: {uri}"));
        }
        if let Some(uri) = &self.execution_uri {
            lines.push(format!("Execution: {uri}"));
        }
        lines.join("\n")
    }

    /// Builds the settings object for a window from `now` until the end.
    #[must_use]
    pub fn window_request(&self, now: DateTime<Utc>) -> CreateMaintenanceWindowRequest {
        CreateMaintenanceWindowRequest::environment(MaintenanceWindow {
            enabled: true,
            general_properties: MaintenanceWindowGeneralProperties {
                name: self.window_name(),
                description: self.window_description(),
                maintenance_type: "PLANNED".to_string(),
                suppression: self.suppression_type.as_str().to_string(),
                disable_synthetic_monitor_execution: false,
            },
            schedule: MaintenanceWindowSchedule {
                schedule_type: "ONCE".to_string(),
                once_recurrence: MaintenanceWindowOnceRecurrence {
                    start_time: now.format(WINDOW_TIME_FORMAT).to_string(),
                    end_time: self.end.format(WINDOW_TIME_FORMAT).to_string(),
                    time_zone: "UTC".to_string(),
                },
            },
        })
    }
}

/// Creates a maintenance window for the duration of a step.
#[derive(Clone)]
pub struct MaintenanceWindowAction {
    api: Arc<dyn MaintenanceWindowApi>,
}

impl MaintenanceWindowAction {
    /// Creates the action.
    #[must_use]
    pub fn new(api: Arc<dyn MaintenanceWindowApi>) -> Self {
        Self { api }
    }

    async fn create(&self, state: &mut MaintenanceWindowState) -> ActionResult<StartResult> {
        let request = state.window_request(Utc::now());
        let window_id = self
            .api
            .create_maintenance_window(&request)
            .await
            .map_err(|e| ActionError::backend("Failed to create maintenance window.", e))?;

        info!(window_id = %window_id, name = %request.value.general_properties.name, "created maintenance window");
        let message = Message::info(format!("Maintenance window created. (id {window_id})"));
        state.window_id = Some(window_id);

        Ok(StartResult {
            messages: Some(vec![message]),
            ..StartResult::default()
        })
    }

    async fn delete(&self, state: &mut MaintenanceWindowState) -> ActionResult<StopResult> {
        let Some(window_id) = state.window_id.clone() else {
            return Ok(StopResult::default());
        };

        self.api
            .delete_maintenance_window(&window_id)
            .await
            .map_err(|e| {
                ActionError::backend(
                    format!("Failed to delete maintenance window (id {window_id})."),
                    e,
                )
            })?;

        info!(window_id = %window_id, "deleted maintenance window");
        state.window_id = None;

        Ok(StopResult {
            messages: Some(vec![Message::info(format!(
                "Maintenance window deleted. (id {window_id})"
            ))]),
        })
    }
}

impl std::fmt::Debug for MaintenanceWindowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceWindowAction").finish_non_exhaustive()
    }
}

impl Action for MaintenanceWindowAction {
    type State = MaintenanceWindowState;

    fn describe(&self) -> ActionDescription {
        ActionDescription {
            id: MAINTENANCE_ACTION_ID.to_string(),
            label: "Create Maintenance Window".to_string(),
            description: "Create a Maintenance Window for a given duration.".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            category: Some("monitoring".to_string()),
            kind: ActionKind::Other,
            time_control: TimeControl::External,
            parameters: vec![
                ActionParameter::new("duration", "Duration", ParameterType::Duration, 0)
                    .with_description("How long should the maintenance window last?")
                    .with_default("30s")
                    .required(),
                ActionParameter::new(
                    "suppressionType",
                    "Problem detection and alerting",
                    ParameterType::String,
                    1,
                )
                .with_default(SuppressionType::DetectProblemsAndAlert.as_str())
                .with_options(vec![
                    ParameterOption::new(
                        "Detect problems and alert",
                        SuppressionType::DetectProblemsAndAlert.as_str(),
                    ),
                    ParameterOption::new(
                        "Detect problems but don't alert",
                        SuppressionType::DetectProblemsDontAlert.as_str(),
                    ),
                    ParameterOption::new(
                        "Disable problem detection during maintenance",
                        SuppressionType::DontDetectProblems.as_str(),
                    ),
                ])
                .required(),
            ],
            widgets: Vec::new(),
            status_call_interval: None,
            has_stop: true,
        }
    }

    fn prepare(&self, request: &PrepareRequest) -> ActionResult<Self::State> {
        MaintenanceWindowState::prepare(request, Utc::now())
    }

    fn start<'a>(&'a self, state: &'a mut Self::State) -> ActionFuture<'a, StartResult> {
        Box::pin(self.create(state))
    }

    fn stop<'a>(&'a self, state: &'a mut Self::State) -> ActionFuture<'a, StopResult> {
        Box::pin(self.delete(state))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn prepare_request(config: serde_json::Value) -> PrepareRequest {
        serde_json::from_value(json!({
            "config": config,
            "executionContext": {
                "experimentUri": "<uri-to-experiment>",
                "executionUri": "<uri-to-execution>",
                "experimentKey": "ADM-1",
                "executionId": 4711
            }
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    // ==================== Prepare Tests ====================

    #[test]
    fn test_prepare_extracts_state() {
        let request = prepare_request(json!({
            "duration": 60_000,
            "suppressionType": "DETECT_PROBLEMS_DONT_ALERT"
        }));

        let state = MaintenanceWindowState::prepare(&request, now()).unwrap();

        assert_eq!(state.end, Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).unwrap());
        assert_eq!(state.suppression_type, SuppressionType::DetectProblemsDontAlert);
        assert_eq!(state.experiment_uri.as_deref(), Some("<uri-to-experiment>"));
        assert_eq!(state.execution_uri.as_deref(), Some("<uri-to-execution>"));
        assert_eq!(state.experiment_key.as_deref(), Some("ADM-1"));
        assert_eq!(state.execution_id, Some(4711));
        assert_eq!(state.window_id, None);
    }

    #[test]
    fn test_prepare_defaults_suppression_type() {
        let request = prepare_request(json!({"duration": 1000}));
        let state = MaintenanceWindowState::prepare(&request, now()).unwrap();
        assert_eq!(state.suppression_type, SuppressionType::DetectProblemsAndAlert);
    }

    #[test]
    fn test_prepare_rejects_unknown_suppression_type() {
        let request = prepare_request(json!({"duration": 1000, "suppressionType": "SOMETIMES"}));
        let err = MaintenanceWindowState::prepare(&request, now()).unwrap_err();
        assert!(err.is_bad_request());
    }

    // ==================== Request Tests ====================

    #[test]
    fn test_window_request() {
        let request = prepare_request(json!({"duration": 300_000}));
        let state = MaintenanceWindowState::prepare(&request, now()).unwrap();

        let window = state.window_request(now());

        assert_eq!(window.schema_id, "builtin:alerting.maintenance-window");
        assert_eq!(window.scope, "environment");
        let props = &window.value.general_properties;
        assert_eq!(props.name, "Steadybit ADM-1 - 4711");
        assert_eq!(
            props.description,
            "Experiment: <uri-to-experiment>\nExecution: <uri-to-execution>"
        );
        assert_eq!(props.suppression, "DETECT_PROBLEMS_AND_ALERT");
        assert_eq!(props.maintenance_type, "PLANNED");
        let schedule = &window.value.schedule;
        assert_eq!(schedule.schedule_type, "ONCE");
        assert_eq!(schedule.once_recurrence.start_time, "2024-03-01T10:00:00");
        assert_eq!(schedule.once_recurrence.end_time, "2024-03-01T10:05:00");
        assert_eq!(schedule.once_recurrence.time_zone, "UTC");
    }

    #[test]
    fn test_window_name_without_context() {
        let request = PrepareRequest {
            config: json!({"duration": 1000}).as_object().cloned().unwrap(),
            execution_context: None,
        };
        let state = MaintenanceWindowState::prepare(&request, now()).unwrap();

        assert_eq!(state.window_name(), "Steadybit");
        assert_eq!(state.window_description(), "");
    }

    #[test]
    fn test_window_description_only_execution() {
        let mut state = MaintenanceWindowState::prepare(&prepare_request(json!({"duration": 1})), now())
            .unwrap();
        state.experiment_uri = None;
        state.experiment_key = None;

        assert_eq!(state.window_name(), "Steadybit");
        assert_eq!(state.window_description(), "Execution: <uri-to-execution>");
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = MaintenanceWindowState::prepare(&prepare_request(json!({"duration": 1})), now())
            .unwrap();
        state.window_id = Some("mw-1".to_string());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["windowId"], "mw-1");
        assert_eq!(json["suppressionType"], "DETECT_PROBLEMS_AND_ALERT");
        let back: MaintenanceWindowState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
