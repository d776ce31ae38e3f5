//! Problem check action.
//!
//! Polls open Dynatrace problems while a step runs, reports each problem as
//! a metric and fails the step when the configured condition is violated.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dtx_api::{Problem, ProblemsApi};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, ActionFuture};
use crate::error::{ActionError, ActionResult};
use crate::kit::{
    self, ActionDescription, ActionKind, ActionParameter, CheckError, Metric, ParameterOption,
    ParameterType, PrepareRequest, StartResult, StateOverTimeWidget, StatusResult, TimeControl,
};

/// Action id.
pub const PROBLEM_CHECK_ACTION_ID: &str = "com.steadybit.extension_dynatrace.problem_check";

/// Name of the per-problem metric.
pub const PROBLEM_METRIC_NAME: &str = "dynatrace_problems";

/// How often the orchestrator polls `status`.
pub const STATUS_CALL_INTERVAL: &str = "5s";

/// What the check expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// Only report problems.
    #[default]
    ShowOnly,
    /// No open problem may exist.
    NoProblemExpected,
    /// At least one open problem must exist.
    AtLeastOneProblemExpected,
}

impl Condition {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShowOnly => "showOnly",
            Self::NoProblemExpected => "noProblemExpected",
            Self::AtLeastOneProblemExpected => "atLeastOneProblemExpected",
        }
    }
}

/// When the condition must hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckMode {
    /// On every poll.
    #[default]
    AllTheTime,
    /// On at least one poll before the end.
    AtLeastOnce,
}

impl CheckMode {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllTheTime => "allTheTime",
            Self::AtLeastOnce => "atLeastOnce",
        }
    }
}

/// Step configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemCheckConfig {
    /// Check length in milliseconds.
    #[serde(deserialize_with = "kit::duration_millis")]
    pub duration: u64,
    /// Limits the check to problems of matching entities.
    #[serde(default, deserialize_with = "kit::non_blank")]
    pub entity_selector: Option<String>,
    /// Expected condition.
    #[serde(default)]
    pub condition: Option<Condition>,
    /// When the condition must hold.
    #[serde(default)]
    pub condition_check_mode: Option<CheckMode>,
}

/// State carried between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemCheckState {
    /// Problems opened before this instant are ignored.
    pub start: DateTime<Utc>,
    /// Polling completes after this instant.
    pub end: DateTime<Utc>,
    /// Entity filter.
    #[serde(default)]
    pub entity_selector: Option<String>,
    /// Expected condition.
    pub condition: Condition,
    /// When the condition must hold.
    pub condition_check_mode: CheckMode,
    /// Set once the condition held on some poll in at-least-once mode.
    #[serde(default)]
    pub condition_met: bool,
}

impl ProblemCheckState {
    /// Builds the state from a prepare request.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::InvalidConfig` for an unusable config.
    pub fn prepare(request: &PrepareRequest, now: DateTime<Utc>) -> ActionResult<Self> {
        let config: ProblemCheckConfig = request.parse_config()?;

        Ok(Self {
            start: now,
            end: kit::deadline(now, config.duration)?,
            entity_selector: config.entity_selector,
            condition: config.condition.unwrap_or_default(),
            condition_check_mode: config.condition_check_mode.unwrap_or_default(),
            condition_met: false,
        })
    }

    /// Whether the check window has passed.
    #[must_use]
    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }

    /// Evaluates one poll that found `problem_count` open problems.
    pub fn evaluate(&mut self, problem_count: usize, completed: bool) -> Option<CheckError> {
        match self.condition_check_mode {
            CheckMode::AllTheTime => match self.condition {
                Condition::NoProblemExpected if problem_count > 0 => Some(CheckError::failed(
                    format!("No problem expected, but {problem_count} problems found."),
                )),
                Condition::AtLeastOneProblemExpected if problem_count == 0 => Some(
                    CheckError::failed("At least one problem expected, but no problems found."),
                ),
                _ => None,
            },
            CheckMode::AtLeastOnce => {
                let satisfied = match self.condition {
                    Condition::ShowOnly => false,
                    Condition::NoProblemExpected => problem_count == 0,
                    Condition::AtLeastOneProblemExpected => problem_count > 0,
                };
                if satisfied {
                    self.condition_met = true;
                }
                if !completed || self.condition_met {
                    return None;
                }

                match self.condition {
                    Condition::ShowOnly => None,
                    Condition::NoProblemExpected => Some(CheckError::failed(
                        "No problem expected, but problems found.",
                    )),
                    Condition::AtLeastOneProblemExpected => Some(CheckError::failed(
                        "At least one problem expected, but no problems found.",
                    )),
                }
            }
        }
    }
}

/// Link to a problem in the Dynatrace UI.
#[must_use]
pub fn problem_url(ui_base_url: &str, problem_id: &str) -> String {
    format!("{ui_base_url}/ui/apps/dynatrace.classic.problems/#problems/problemdetails;pid={problem_id}")
}

/// Metric describing one open problem.
#[must_use]
pub fn problem_metric(problem: &Problem, ui_base_url: &str, now: DateTime<Utc>) -> Metric {
    let tooltip = problem
        .affected_entities
        .iter()
        .fold(problem.title.clone(), |mut tooltip, entity| {
            tooltip.push_str("\n- ");
            tooltip.push_str(&entity.name);
            tooltip
        });

    let metric = BTreeMap::from([
        ("dynatrace.problem.id".to_string(), problem.problem_id.clone()),
        (
            "dynatrace.problem.displayId".to_string(),
            problem.display_id.clone(),
        ),
        ("state".to_string(), "danger".to_string()),
        ("tooltip".to_string(), tooltip),
        (
            "url".to_string(),
            problem_url(ui_base_url, &problem.problem_id),
        ),
    ]);

    Metric {
        name: Some(PROBLEM_METRIC_NAME.to_string()),
        metric,
        timestamp: now,
        value: 0.0,
    }
}

/// Checks open Dynatrace problems while a step runs.
#[derive(Clone)]
pub struct ProblemCheckAction {
    api: Arc<dyn ProblemsApi>,
    ui_base_url: String,
}

impl ProblemCheckAction {
    /// Creates the action. `ui_base_url` prefixes problem links.
    #[must_use]
    pub fn new(api: Arc<dyn ProblemsApi>, ui_base_url: impl Into<String>) -> Self {
        let ui_base_url: String = ui_base_url.into();
        Self {
            api,
            ui_base_url: ui_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Runs one poll at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Backend` if the problems cannot be fetched.
    pub async fn poll(
        &self,
        state: &mut ProblemCheckState,
        now: DateTime<Utc>,
    ) -> ActionResult<StatusResult> {
        let problems = self
            .api
            .get_problems(state.start, state.entity_selector.as_deref())
            .await
            .map_err(|e| ActionError::backend("Failed to get problems from Dynatrace.", e))?;

        let completed = state.is_completed(now);
        let error = state.evaluate(problems.len(), completed);
        debug!(
            problems = problems.len(),
            completed,
            failed = error.is_some(),
            "polled Dynatrace problems"
        );
        if let Some(error) = &error {
            info!(title = %error.title, "problem check failed");
        }

        let metrics = problems
            .iter()
            .map(|problem| problem_metric(problem, &self.ui_base_url, now))
            .collect();

        Ok(StatusResult {
            completed,
            messages: None,
            metrics: Some(metrics),
            error,
        })
    }
}

impl std::fmt::Debug for ProblemCheckAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProblemCheckAction")
            .field("ui_base_url", &self.ui_base_url)
            .finish_non_exhaustive()
    }
}

impl Action for ProblemCheckAction {
    type State = ProblemCheckState;

    fn describe(&self) -> ActionDescription {
        ActionDescription {
            id: PROBLEM_CHECK_ACTION_ID.to_string(),
            label: "Problem Check".to_string(),
            description: "Checks for the existence of open problems in Dynatrace.".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            category: Some("monitoring".to_string()),
            kind: ActionKind::Check,
            time_control: TimeControl::Internal,
            parameters: vec![
                ActionParameter::new("duration", "Duration", ParameterType::Duration, 1)
                    .with_default("30s")
                    .required(),
                ActionParameter::new("entitySelector", "Entity Selector", ParameterType::String, 2)
                    .with_description(
                        "Filter Problems by an Dynatrace entity selector. If empty, all problems are considered.",
                    ),
                ActionParameter::new("condition", "Condition", ParameterType::String, 3)
                    .with_default(Condition::ShowOnly.as_str())
                    .with_options(vec![
                        ParameterOption::new(
                            "No check, only show problems",
                            Condition::ShowOnly.as_str(),
                        ),
                        ParameterOption::new(
                            "No problem expected",
                            Condition::NoProblemExpected.as_str(),
                        ),
                        ParameterOption::new(
                            "At least one problem expected",
                            Condition::AtLeastOneProblemExpected.as_str(),
                        ),
                    ])
                    .required(),
                ActionParameter::new(
                    "conditionCheckMode",
                    "Condition Check Mode",
                    ParameterType::String,
                    4,
                )
                .with_description(
                    "Should the step succeed if the condition is met at least once or all the time?",
                )
                .with_default(CheckMode::AllTheTime.as_str())
                .with_options(vec![
                    ParameterOption::new("All the time", CheckMode::AllTheTime.as_str()),
                    ParameterOption::new("At least once", CheckMode::AtLeastOnce.as_str()),
                ])
                .required(),
            ],
            widgets: vec![StateOverTimeWidget {
                widget_type: "com.steadybit.widget.state_over_time".to_string(),
                title: "Dynatrace Problems".to_string(),
                identity_from: "dynatrace.problem.id".to_string(),
                label_from: "dynatrace.problem.displayId".to_string(),
                state_from: "state".to_string(),
                tooltip_from: "tooltip".to_string(),
                url_from: Some("url".to_string()),
                hide_value: true,
            }],
            status_call_interval: Some(STATUS_CALL_INTERVAL.to_string()),
            has_stop: false,
        }
    }

    fn prepare(&self, request: &PrepareRequest) -> ActionResult<Self::State> {
        ProblemCheckState::prepare(request, Utc::now())
    }

    fn start<'a>(&'a self, state: &'a mut Self::State) -> ActionFuture<'a, StartResult> {
        Box::pin(async move { self.poll(state, Utc::now()).await.map(StartResult::from) })
    }

    fn status<'a>(&'a self, state: &'a mut Self::State) -> ActionFuture<'a, StatusResult> {
        Box::pin(self.poll(state, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use dtx_api::{ProblemEntity, ProblemEntityId};
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn state(condition: Condition, mode: CheckMode) -> ProblemCheckState {
        ProblemCheckState {
            start: now(),
            end: now() + TimeDelta::seconds(60),
            entity_selector: None,
            condition,
            condition_check_mode: mode,
            condition_met: false,
        }
    }

    // ==================== Prepare Tests ====================

    #[test]
    fn test_prepare_defaults() {
        let request: PrepareRequest =
            serde_json::from_value(json!({"config": {"duration": 60_000}})).unwrap();

        let state = ProblemCheckState::prepare(&request, now()).unwrap();

        assert_eq!(state.start, now());
        assert_eq!(state.end, now() + TimeDelta::seconds(60));
        assert_eq!(state.condition, Condition::ShowOnly);
        assert_eq!(state.condition_check_mode, CheckMode::AllTheTime);
        assert_eq!(state.entity_selector, None);
        assert!(!state.condition_met);
    }

    #[test]
    fn test_prepare_reads_all_fields() {
        let request: PrepareRequest = serde_json::from_value(json!({"config": {
            "duration": 1000,
            "entitySelector": "type(\"HOST\")",
            "condition": "noProblemExpected",
            "conditionCheckMode": "atLeastOnce"
        }}))
        .unwrap();

        let state = ProblemCheckState::prepare(&request, now()).unwrap();

        assert_eq!(state.entity_selector.as_deref(), Some("type(\"HOST\")"));
        assert_eq!(state.condition, Condition::NoProblemExpected);
        assert_eq!(state.condition_check_mode, CheckMode::AtLeastOnce);
    }

    #[test]
    fn test_prepare_empty_selector_is_absent() {
        let request: PrepareRequest = serde_json::from_value(
            json!({"config": {"duration": 1000, "entitySelector": ""}}),
        )
        .unwrap();
        let state = ProblemCheckState::prepare(&request, now()).unwrap();
        assert_eq!(state.entity_selector, None);
    }

    #[test]
    fn test_prepare_rejects_unknown_condition() {
        let request: PrepareRequest = serde_json::from_value(
            json!({"config": {"duration": 1000, "condition": "maybe"}}),
        )
        .unwrap();
        assert!(ProblemCheckState::prepare(&request, now()).is_err());
    }

    // ==================== Evaluation Tests ====================

    #[test_case(Condition::ShowOnly, 0, None ; "show only without problems")]
    #[test_case(Condition::ShowOnly, 3, None ; "show only with problems")]
    #[test_case(Condition::NoProblemExpected, 0, None ; "no problem expected and none found")]
    #[test_case(Condition::NoProblemExpected, 2, Some("No problem expected, but 2 problems found.") ; "no problem expected but found")]
    #[test_case(Condition::AtLeastOneProblemExpected, 1, None ; "problem expected and found")]
    #[test_case(Condition::AtLeastOneProblemExpected, 0, Some("At least one problem expected, but no problems found.") ; "problem expected but none")]
    fn test_all_the_time(condition: Condition, problems: usize, expected: Option<&str>) {
        let mut state = state(condition, CheckMode::AllTheTime);

        let error = state.evaluate(problems, false);

        assert_eq!(error.as_ref().map(|e| e.title.as_str()), expected);
        assert!(!state.condition_met);
    }

    #[test]
    fn test_at_least_once_fails_only_at_completion() {
        let mut state = state(Condition::NoProblemExpected, CheckMode::AtLeastOnce);

        assert_eq!(state.evaluate(1, false), None);
        let error = state.evaluate(1, true).unwrap();

        assert_eq!(error.title, "No problem expected, but problems found.");
    }

    #[test]
    fn test_at_least_once_is_sticky() {
        let mut state = state(Condition::AtLeastOneProblemExpected, CheckMode::AtLeastOnce);

        assert_eq!(state.evaluate(0, false), None);
        assert_eq!(state.evaluate(2, false), None);
        assert!(state.condition_met);
        assert_eq!(state.evaluate(0, true), None);
    }

    #[test]
    fn test_at_least_once_never_met() {
        let mut state = state(Condition::AtLeastOneProblemExpected, CheckMode::AtLeastOnce);

        assert_eq!(state.evaluate(0, false), None);
        let error = state.evaluate(0, true).unwrap();

        assert_eq!(
            error.title,
            "At least one problem expected, but no problems found."
        );
    }

    #[test]
    fn test_at_least_once_show_only_never_fails() {
        let mut state = state(Condition::ShowOnly, CheckMode::AtLeastOnce);
        assert_eq!(state.evaluate(5, true), None);
        assert!(!state.condition_met);
    }

    #[test]
    fn test_completion_is_strictly_after_end() {
        let state = state(Condition::ShowOnly, CheckMode::AllTheTime);
        assert!(!state.is_completed(state.end));
        assert!(state.is_completed(state.end + TimeDelta::milliseconds(1)));
    }

    // ==================== Metric Tests ====================

    #[test]
    fn test_problem_metric() {
        let problem = Problem {
            problem_id: "-123_456V2".to_string(),
            display_id: "P-42".to_string(),
            title: "CPU saturation".to_string(),
            affected_entities: vec![
                ProblemEntity {
                    entity_id: ProblemEntityId::default(),
                    name: "host-a".to_string(),
                },
                ProblemEntity {
                    entity_id: ProblemEntityId::default(),
                    name: "host-b".to_string(),
                },
            ],
            ..Problem::default()
        };

        let metric = problem_metric(&problem, "https://abc.apps.dynatrace.com", now());

        assert_eq!(metric.name.as_deref(), Some("dynatrace_problems"));
        assert_eq!(metric.metric["dynatrace.problem.id"], "-123_456V2");
        assert_eq!(metric.metric["dynatrace.problem.displayId"], "P-42");
        assert_eq!(metric.metric["state"], "danger");
        assert_eq!(metric.metric["tooltip"], "CPU saturation\n- host-a\n- host-b");
        assert_eq!(
            metric.metric["url"],
            "https://abc.apps.dynatrace.com/ui/apps/dynatrace.classic.problems/#problems/problemdetails;pid=-123_456V2"
        );
        assert_eq!(metric.timestamp, now());
        assert!(metric.value.abs() < f64::EPSILON);
    }
}
