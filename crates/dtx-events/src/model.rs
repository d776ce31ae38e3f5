//! Lifecycle events delivered by the Steadybit platform.
//!
//! The platform posts one JSON envelope per lifecycle transition. The
//! envelope always carries the environment and optionally the team, the
//! principal that triggered the experiment and one payload section whose
//! presence depends on the event kind.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EventError, EventResult};

/// The six lifecycle transitions the extension listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    /// An experiment execution started.
    ExperimentStarted,
    /// An experiment execution reached a final state.
    ExperimentCompleted,
    /// A step of an execution started.
    StepStarted,
    /// A step of an execution finished.
    StepCompleted,
    /// A step began acting on one target.
    TargetStarted,
    /// A step finished acting on one target.
    TargetCompleted,
}

impl LifecycleKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::ExperimentStarted,
        Self::ExperimentCompleted,
        Self::StepStarted,
        Self::StepCompleted,
        Self::TargetStarted,
        Self::TargetCompleted,
    ];

    /// Path of the webhook endpoint receiving this kind.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::ExperimentStarted => "/events/experiment-started",
            Self::ExperimentCompleted => "/events/experiment-completed",
            Self::StepStarted => "/events/experiment-step-started",
            Self::StepCompleted => "/events/experiment-step-completed",
            Self::TargetStarted => "/events/experiment-target-started",
            Self::TargetCompleted => "/events/experiment-target-completed",
        }
    }

    /// Platform event name this kind listens to.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::ExperimentStarted => "experiment.execution.created",
            Self::ExperimentCompleted => "experiment.execution.completed",
            Self::StepStarted => "experiment.execution.step-started",
            Self::StepCompleted => "experiment.execution.step-completed",
            Self::TargetStarted => "experiment.execution.target-started",
            Self::TargetCompleted => "experiment.execution.target-completed",
        }
    }

    const fn required_section(self) -> &'static str {
        match self {
            Self::ExperimentStarted | Self::ExperimentCompleted => "experimentExecution",
            Self::StepStarted | Self::StepCompleted => "experimentStepExecution",
            Self::TargetStarted | Self::TargetCompleted => "experimentStepTargetExecution",
        }
    }
}

impl fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Numeric experiment execution id.
///
/// The platform sends it as a JSON number. Integral values render without a
/// decimal point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(f64);

impl ExecutionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl From<u32> for ExecutionId {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

impl PartialEq for ExecutionId {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for ExecutionId {}

/// Always positional notation: `1234567`, never `1.234567e+06`.
impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Environment the experiment runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment id.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Team owning the experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team id.
    #[serde(default)]
    pub id: String,
    /// Short team key.
    #[serde(default)]
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Tenant the event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant key.
    #[serde(default)]
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Who triggered the experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "principalType")]
pub enum Principal {
    /// An interactive user.
    #[serde(rename = "user")]
    User {
        /// Full name.
        #[serde(default)]
        name: String,
        /// Login name.
        #[serde(default)]
        username: String,
    },
    /// An API access token.
    #[serde(rename = "access_token")]
    AccessToken {
        /// Token name.
        #[serde(default)]
        name: String,
    },
    /// A scheduled batch run.
    #[serde(rename = "batch")]
    Batch {
        /// User the schedule runs as.
        #[serde(default)]
        username: String,
    },
    /// Any principal type this extension does not know.
    #[serde(other)]
    Unknown,
}

impl Principal {
    /// The wire name of the principal type, if known.
    #[must_use]
    pub const fn principal_type(&self) -> Option<&'static str> {
        match self {
            Self::User { .. } => Some("user"),
            Self::AccessToken { .. } => Some("access_token"),
            Self::Batch { .. } => Some("batch"),
            Self::Unknown => None,
        }
    }
}

/// Step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Runs an action.
    Action,
    /// Waits.
    Wait,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// Kind of action a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Injects a fault.
    Attack,
    /// Verifies a condition.
    Check,
    /// Generates load.
    LoadTest,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// An experiment execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentExecution {
    /// Execution id.
    pub execution_id: ExecutionId,
    /// Experiment key, e.g. `ADM-42`.
    #[serde(default)]
    pub experiment_key: String,
    /// Experiment name.
    #[serde(default)]
    pub name: String,
    /// Hypothesis, possibly empty.
    #[serde(default)]
    pub hypothesis: String,
    /// Execution state, e.g. `CREATED` or `COMPLETED`.
    #[serde(default)]
    pub state: String,
    /// When preparation began.
    #[serde(default)]
    pub prepared_time: Option<DateTime<Utc>>,
    /// When the execution started.
    #[serde(default)]
    pub started_time: Option<DateTime<Utc>>,
    /// When the execution ended.
    #[serde(default)]
    pub ended_time: Option<DateTime<Utc>>,
    /// Failure reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Failure details.
    #[serde(default)]
    pub reason_details: Option<String>,
}

/// One step of an experiment execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    /// Step execution id.
    pub id: Uuid,
    /// Owning experiment execution id.
    #[serde(default)]
    pub execution_id: ExecutionId,
    /// Owning experiment key.
    #[serde(default)]
    pub experiment_key: String,
    /// Step type.
    #[serde(rename = "type", default)]
    pub step_type: Option<StepType>,
    /// Action id for action steps.
    #[serde(default)]
    pub action_id: Option<String>,
    /// Action display name.
    #[serde(default)]
    pub action_name: Option<String>,
    /// Action kind.
    #[serde(default)]
    pub action_kind: Option<ActionKind>,
    /// Label given to the step by the experiment author.
    #[serde(default)]
    pub custom_label: Option<String>,
    /// Step state.
    #[serde(default)]
    pub state: String,
    /// When the step started.
    #[serde(default)]
    pub started_time: Option<DateTime<Utc>>,
    /// When the step ended.
    #[serde(default)]
    pub ended_time: Option<DateTime<Utc>>,
}

/// A step acting on one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetExecution {
    /// Target execution id.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Owning experiment execution id.
    #[serde(default)]
    pub execution_id: ExecutionId,
    /// Owning experiment key.
    #[serde(default)]
    pub experiment_key: String,
    /// Owning step execution id.
    pub step_execution_id: Uuid,
    /// Agent that reported the target.
    #[serde(default)]
    pub agent_hostname: String,
    /// Target type id, e.g. `com.steadybit.extension_container.container`.
    #[serde(default)]
    pub target_type: String,
    /// Raw target name.
    #[serde(default)]
    pub target_name: String,
    /// Multi-valued target attributes.
    #[serde(default)]
    pub target_attributes: HashMap<String, Vec<String>>,
    /// Target execution state.
    #[serde(default)]
    pub state: String,
    /// When the step began acting on the target.
    #[serde(default)]
    pub started_time: Option<DateTime<Utc>>,
    /// When the step stopped acting on the target.
    #[serde(default)]
    pub ended_time: Option<DateTime<Utc>>,
}

/// The raw webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event id.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Platform event name.
    #[serde(default)]
    pub event_name: String,
    /// When the platform emitted the event.
    pub event_time: DateTime<Utc>,
    /// Environment of the experiment.
    pub environment: Environment,
    /// Owning team.
    #[serde(default)]
    pub team: Option<Team>,
    /// Owning tenant.
    #[serde(default)]
    pub tenant: Option<Tenant>,
    /// Who triggered the experiment.
    #[serde(default)]
    pub principal: Option<Principal>,
    /// Payload of experiment events.
    #[serde(default)]
    pub experiment_execution: Option<ExperimentExecution>,
    /// Payload of step events.
    #[serde(default)]
    pub experiment_step_execution: Option<StepExecution>,
    /// Payload of target events.
    #[serde(default)]
    pub experiment_step_target_execution: Option<TargetExecution>,
}

/// Envelope fields shared by every event kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    /// Environment display name.
    pub environment_name: String,
    /// Owning team.
    pub team: Option<Team>,
    /// Who triggered the experiment.
    pub principal: Option<Principal>,
    /// When the platform emitted the event.
    pub event_time: DateTime<Utc>,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecyclePayload {
    /// See [`LifecycleKind::ExperimentStarted`].
    ExperimentStarted(ExperimentExecution),
    /// See [`LifecycleKind::ExperimentCompleted`].
    ExperimentCompleted(ExperimentExecution),
    /// See [`LifecycleKind::StepStarted`].
    StepStarted(StepExecution),
    /// See [`LifecycleKind::StepCompleted`].
    StepCompleted(StepExecution),
    /// See [`LifecycleKind::TargetStarted`].
    TargetStarted(TargetExecution),
    /// See [`LifecycleKind::TargetCompleted`].
    TargetCompleted(TargetExecution),
}

/// A decoded lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    /// Shared envelope fields.
    pub context: EventContext,
    /// Kind-specific payload.
    pub payload: LifecyclePayload,
}

impl LifecycleEvent {
    /// Decodes a webhook body received on the endpoint of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::MalformedBody` if the body is not a valid
    /// envelope and `EventError::MissingPayload` if the section `kind`
    /// needs is absent.
    pub fn parse(kind: LifecycleKind, body: &[u8]) -> EventResult<Self> {
        let envelope: EventEnvelope = serde_json::from_slice(body)?;
        Self::from_envelope(kind, envelope)
    }

    /// Builds the event of `kind` from a decoded envelope.
    ///
    /// # Errors
    ///
    /// Returns `EventError::MissingPayload` if the section `kind` needs is
    /// absent.
    pub fn from_envelope(kind: LifecycleKind, envelope: EventEnvelope) -> EventResult<Self> {
        let missing = || EventError::MissingPayload {
            section: kind.required_section(),
        };

        let payload = match kind {
            LifecycleKind::ExperimentStarted => LifecyclePayload::ExperimentStarted(
                envelope.experiment_execution.ok_or_else(missing)?,
            ),
            LifecycleKind::ExperimentCompleted => LifecyclePayload::ExperimentCompleted(
                envelope.experiment_execution.ok_or_else(missing)?,
            ),
            LifecycleKind::StepStarted => LifecyclePayload::StepStarted(
                envelope.experiment_step_execution.ok_or_else(missing)?,
            ),
            LifecycleKind::StepCompleted => LifecyclePayload::StepCompleted(
                envelope.experiment_step_execution.ok_or_else(missing)?,
            ),
            LifecycleKind::TargetStarted => LifecyclePayload::TargetStarted(
                envelope
                    .experiment_step_target_execution
                    .ok_or_else(missing)?,
            ),
            LifecycleKind::TargetCompleted => LifecyclePayload::TargetCompleted(
                envelope
                    .experiment_step_target_execution
                    .ok_or_else(missing)?,
            ),
        };

        Ok(Self {
            context: EventContext {
                environment_name: envelope.environment.name,
                team: envelope.team,
                principal: envelope.principal,
                event_time: envelope.event_time,
            },
            payload,
        })
    }

    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> LifecycleKind {
        match self.payload {
            LifecyclePayload::ExperimentStarted(_) => LifecycleKind::ExperimentStarted,
            LifecyclePayload::ExperimentCompleted(_) => LifecycleKind::ExperimentCompleted,
            LifecyclePayload::StepStarted(_) => LifecycleKind::StepStarted,
            LifecyclePayload::StepCompleted(_) => LifecycleKind::StepCompleted,
            LifecyclePayload::TargetStarted(_) => LifecycleKind::TargetStarted,
            LifecyclePayload::TargetCompleted(_) => LifecycleKind::TargetCompleted,
        }
    }
}
