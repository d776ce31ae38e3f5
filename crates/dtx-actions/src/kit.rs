//! Wire types of the Steadybit action protocol.
//!
//! The orchestrator drives an action through `prepare`, `start`, optional
//! `status` polls and `stop`. Action state is serialized into every response
//! and handed back verbatim with the next request.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ActionError, ActionResult};

/// Information about the experiment execution running the step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Link to the experiment in the Steadybit UI.
    #[serde(default)]
    pub experiment_uri: Option<String>,
    /// Link to the execution in the Steadybit UI.
    #[serde(default)]
    pub execution_uri: Option<String>,
    /// Experiment key.
    #[serde(default)]
    pub experiment_key: Option<String>,
    /// Execution id.
    #[serde(default)]
    pub execution_id: Option<i64>,
}

/// Body of a `prepare` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// Parameter values configured for the step.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Execution the step belongs to.
    #[serde(default)]
    pub execution_context: Option<ExecutionContext>,
}

impl PrepareRequest {
    /// Decodes the step configuration into a typed config.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::InvalidConfig` if a value is missing or has the
    /// wrong type.
    pub fn parse_config<T: DeserializeOwned>(&self) -> ActionResult<T> {
        serde_json::from_value(Value::Object(self.config.clone())).map_err(|e| {
            ActionError::InvalidConfig {
                reason: e.to_string(),
            }
        })
    }

    /// The execution context, or an empty one.
    #[must_use]
    pub fn context(&self) -> ExecutionContext {
        self.execution_context.clone().unwrap_or_default()
    }
}

/// Deserializes a non-negative duration given in milliseconds.
///
/// # Errors
///
/// Fails for negative or non-numeric values.
pub fn duration_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(millis) = number.as_u64() {
        return Ok(millis);
    }
    match number.as_f64() {
        Some(millis) if millis.is_finite() && millis >= 0.0 => Ok(round_millis(millis)),
        _ => Err(D::Error::custom(format!(
            "duration must be a non-negative number of milliseconds, got {number}"
        ))),
    }
}

fn round_millis(millis: f64) -> u64 {
    millis.round() as u64
}

/// Returns `now` plus `millis` milliseconds.
///
/// # Errors
///
/// Returns `ActionError::InvalidConfig` if the result is not representable.
pub fn deadline(now: DateTime<Utc>, millis: u64) -> ActionResult<DateTime<Utc>> {
    i64::try_from(millis)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|duration| now.checked_add_signed(duration))
        .ok_or_else(|| ActionError::InvalidConfig {
            reason: format!("duration of {millis}ms is out of range"),
        })
}

/// Deserializes an optional string, treating blank values as absent.
///
/// # Errors
///
/// Fails for non-string values.
pub fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Severity of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Informational.
    Info,
}

/// A log line shown in the execution view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity.
    pub level: MessageLevel,
    /// Text.
    pub message: String,
}

impl Message {
    /// An informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            message: message.into(),
        }
    }
}

/// A data point rendered by the execution view widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Labels.
    pub metric: BTreeMap<String, String>,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
    /// Value.
    pub value: f64,
}

/// Outcome of a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The checked condition did not hold.
    Failed,
}

/// A failed check, reported inside an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    /// Summary.
    pub title: String,
    /// Failure kind.
    pub status: CheckStatus,
}

impl CheckError {
    /// A check whose condition did not hold.
    #[must_use]
    pub fn failed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: CheckStatus::Failed,
        }
    }
}

/// Result of `start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartResult {
    /// Messages to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Metrics to record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Metric>>,
    /// Check failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

impl From<StatusResult> for StartResult {
    fn from(status: StatusResult) -> Self {
        Self {
            messages: status.messages,
            metrics: status.metrics,
            error: status.error,
        }
    }
}

/// Result of `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    /// Whether the action is done.
    pub completed: bool,
    /// Messages to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Metrics to record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Metric>>,
    /// Check failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

/// Result of `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    /// Messages to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// What an action does to the system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Verifies a condition.
    Check,
    /// Anything else.
    Other,
}

/// Who decides when the action ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeControl {
    /// The action reports completion through `status`.
    Internal,
    /// The orchestrator calls `stop` after the configured duration.
    External,
}

/// Input widget of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Duration in milliseconds.
    Duration,
    /// Free text or one of the options.
    String,
}

/// A selectable parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOption {
    /// Display label.
    pub label: String,
    /// Value sent in the config.
    pub value: String,
}

impl ParameterOption {
    /// Creates an option.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A configurable action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    /// Config key.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input widget.
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParameterOption>,
    /// Position in the form.
    pub order: u32,
    /// Whether a value must be given.
    pub required: bool,
}

impl ActionParameter {
    /// Creates an optional parameter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        parameter_type: ParameterType,
        order: u32,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: None,
            parameter_type,
            default_value: None,
            options: Vec::new(),
            order,
            required: false,
        }
    }

    /// Sets the help text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the allowed values.
    #[must_use]
    pub fn with_options(mut self, options: Vec<ParameterOption>) -> Self {
        self.options = options;
        self
    }

    /// Marks the parameter as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Widget plotting metric states over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOverTimeWidget {
    /// Widget type id.
    #[serde(rename = "type")]
    pub widget_type: String,
    /// Title.
    pub title: String,
    /// Metric label identifying a row.
    pub identity_from: String,
    /// Metric label used as row label.
    pub label_from: String,
    /// Metric label holding the state.
    pub state_from: String,
    /// Metric label holding the tooltip.
    pub tooltip_from: String,
    /// Metric label holding a link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_from: Option<String>,
    /// Whether to hide the metric value.
    pub hide_value: bool,
}

/// Self-description of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescription {
    /// Action id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// What the action does.
    pub description: String,
    /// Extension version.
    pub version: String,
    /// UI category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Action kind.
    pub kind: ActionKind,
    /// Who ends the action.
    pub time_control: TimeControl,
    /// Parameters.
    pub parameters: Vec<ActionParameter>,
    /// Widgets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<StateOverTimeWidget>,
    /// Poll interval of `status`, if the action is polled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_call_interval: Option<String>,
    /// Whether `stop` must be called.
    pub has_stop: bool,
}
