//! Translation of lifecycle events into Dynatrace events.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dtx_api::EventIngest;
use tracing::{debug, warn};

use crate::cache::EntityCache;
use crate::model::{
    EventContext, ExperimentExecution, LifecycleEvent, LifecyclePayload, Principal, StepType,
    TargetExecution,
};
use crate::registry::{StepRegistry, StepSnapshot};
use crate::selector::{self, ENTITY_PROPERTIES, NODE_ATTRIBUTES, NODE_PROPERTY};

/// Property names attached to outbound events.
pub mod properties {
    /// Environment display name.
    pub const ENVIRONMENT_NAME: &str = "steadybit.environment.name";
    /// Team display name.
    pub const TEAM_NAME: &str = "steadybit.team.name";
    /// Team key.
    pub const TEAM_KEY: &str = "steadybit.team.key";
    /// Principal type.
    pub const PRINCIPAL_TYPE: &str = "steadybit.principal.type";
    /// Principal login name.
    pub const PRINCIPAL_USERNAME: &str = "steadybit.principal.username";
    /// Principal display name.
    pub const PRINCIPAL_NAME: &str = "steadybit.principal.name";
    /// Experiment key.
    pub const EXPERIMENT_KEY: &str = "steadybit.experiment.key";
    /// Experiment name.
    pub const EXPERIMENT_NAME: &str = "steadybit.experiment.name";
    /// Experiment hypothesis.
    pub const EXPERIMENT_HYPOTHESIS: &str = "steadybit.experiment.hypothesis";
    /// Execution id.
    pub const EXECUTION_ID: &str = "steadybit.execution.id";
    /// Execution state.
    pub const EXECUTION_STATE: &str = "steadybit.execution.state";
    /// Target execution state.
    pub const TARGET_STATE: &str = "steadybit.execution.target.state";
    /// Action id.
    pub const ACTION_ID: &str = "steadybit.step.action.id";
    /// Action name.
    pub const ACTION_NAME: &str = "steadybit.step.action.name";
    /// Action custom label.
    pub const ACTION_CUSTOM_LABEL: &str = "steadybit.step.action.custom_label";
}

type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Started,
    Ended,
}

impl Phase {
    const fn verb(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
        }
    }
}

/// Turns lifecycle events into Dynatrace events.
///
/// Step events only update the [`StepRegistry`]; experiment events always
/// produce an event; target events produce one when they belong to a known
/// attack step.
#[derive(Debug, Clone)]
pub struct Translator {
    registry: Arc<StepRegistry>,
    entities: Arc<EntityCache>,
}

impl Translator {
    /// Creates a translator over a shared registry and entity cache.
    #[must_use]
    pub const fn new(registry: Arc<StepRegistry>, entities: Arc<EntityCache>) -> Self {
        Self { registry, entities }
    }

    /// The step registry.
    #[must_use]
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Translates one event. Returns `None` if nothing should be posted.
    pub async fn translate(&self, event: &LifecycleEvent) -> Option<EventIngest> {
        let context = &event.context;
        match &event.payload {
            LifecyclePayload::ExperimentStarted(execution) => {
                Some(experiment_event(context, execution, Phase::Started))
            }
            LifecyclePayload::ExperimentCompleted(execution) => {
                self.registry.sweep_execution(execution.execution_id);
                Some(experiment_event(context, execution, Phase::Ended))
            }
            LifecyclePayload::StepStarted(step) => {
                self.registry.record_started(step);
                None
            }
            LifecyclePayload::StepCompleted(step) => {
                self.registry.remove(&step.id);
                None
            }
            LifecyclePayload::TargetStarted(target) => {
                self.target_event(context, target, Phase::Started).await
            }
            LifecyclePayload::TargetCompleted(target) => {
                self.target_event(context, target, Phase::Ended).await
            }
        }
    }

    async fn target_event(
        &self,
        context: &EventContext,
        target: &TargetExecution,
        phase: Phase,
    ) -> Option<EventIngest> {
        let Some(step) = self.registry.get(&target.step_execution_id) else {
            warn!(
                step_execution_id = %target.step_execution_id,
                "could not find step infos for target execution"
            );
            return None;
        };
        if !step.is_attack() {
            debug!(step_execution_id = %step.step_id, "skipping target of non-attack step");
            return None;
        }

        let mut props = base_properties(context);
        add_step_properties(&mut props, &step);
        self.add_target_properties(&mut props, target).await;

        let title = format!(
            "Steadybit experiment '{} / {}' - Attack '{}' {} - Target '{}'",
            target.experiment_key,
            target.execution_id,
            step.action_label(),
            phase.verb(),
            selector::target_label(target),
        );
        let at = match phase {
            Phase::Started => target.started_time,
            Phase::Ended => target.ended_time,
        };

        Some(
            EventIngest::custom_info(title, props)
                .with_entity_selector(selector::target_entity_selector(target))
                .at(epoch_millis(at, context)),
        )
    }

    async fn add_target_properties(&self, props: &mut Properties, target: &TargetExecution) {
        props.insert(
            properties::EXPERIMENT_KEY.to_string(),
            target.experiment_key.clone(),
        );
        props.insert(
            properties::EXECUTION_ID.to_string(),
            target.execution_id.to_string(),
        );
        props.insert(
            properties::TARGET_STATE.to_string(),
            target.state.to_lowercase(),
        );

        let attributes = &target.target_attributes;
        for mapping in &ENTITY_PROPERTIES {
            if let Some(value) = selector::single_attribute(attributes, mapping.attribute) {
                self.add_resolved(props, mapping.property, mapping.entity_type, value)
                    .await;
            }
        }

        if selector::in_kubernetes_cluster(target) {
            for attribute in NODE_ATTRIBUTES {
                if let Some(value) = selector::single_attribute(attributes, attribute) {
                    self.add_resolved(
                        props,
                        NODE_PROPERTY,
                        selector::entity_types::KUBERNETES_NODE,
                        value,
                    )
                    .await;
                }
            }
        }
    }

    async fn add_resolved(
        &self,
        props: &mut Properties,
        property: &str,
        entity_type: &str,
        name: &str,
    ) {
        let entity_id = self
            .entities
            .resolve(&selector::entity_selector(entity_type, name))
            .await;
        if !entity_id.is_empty() {
            props.insert(property.to_string(), entity_id);
        }
    }
}

fn experiment_event(
    context: &EventContext,
    execution: &ExperimentExecution,
    phase: Phase,
) -> EventIngest {
    let mut props = base_properties(context);
    add_experiment_properties(&mut props, execution);

    let title = format!(
        "Steadybit experiment '{} / {}' {}",
        execution.experiment_key,
        execution.execution_id,
        phase.verb()
    );
    let at = match phase {
        Phase::Started => execution.started_time,
        Phase::Ended => execution.ended_time,
    };

    EventIngest::custom_info(title, props).at(epoch_millis(at, context))
}

fn epoch_millis(at: Option<DateTime<Utc>>, context: &EventContext) -> i64 {
    at.unwrap_or(context.event_time).timestamp_millis()
}

fn base_properties(context: &EventContext) -> Properties {
    let mut props = Properties::new();
    props.insert(
        properties::ENVIRONMENT_NAME.to_string(),
        context.environment_name.clone(),
    );

    if let Some(team) = &context.team {
        props.insert(properties::TEAM_NAME.to_string(), team.name.clone());
        props.insert(properties::TEAM_KEY.to_string(), team.key.clone());
    }

    if let Some(principal) = &context.principal {
        if let Some(principal_type) = principal.principal_type() {
            props.insert(
                properties::PRINCIPAL_TYPE.to_string(),
                principal_type.to_string(),
            );
        }
        match principal {
            Principal::User { name, username } => {
                props.insert(properties::PRINCIPAL_USERNAME.to_string(), username.clone());
                props.insert(properties::PRINCIPAL_NAME.to_string(), name.clone());
            }
            Principal::AccessToken { name } => {
                props.insert(properties::PRINCIPAL_NAME.to_string(), name.clone());
            }
            Principal::Batch { username } => {
                props.insert(properties::PRINCIPAL_USERNAME.to_string(), username.clone());
            }
            Principal::Unknown => {}
        }
    }

    props
}

fn add_experiment_properties(props: &mut Properties, execution: &ExperimentExecution) {
    props.insert(
        properties::EXPERIMENT_KEY.to_string(),
        execution.experiment_key.clone(),
    );
    props.insert(
        properties::EXPERIMENT_NAME.to_string(),
        execution.name.clone(),
    );
    props.insert(
        properties::EXECUTION_ID.to_string(),
        execution.execution_id.to_string(),
    );
    props.insert(
        properties::EXECUTION_STATE.to_string(),
        execution.state.to_lowercase(),
    );
    if !execution.hypothesis.is_empty() {
        props.insert(
            properties::EXPERIMENT_HYPOTHESIS.to_string(),
            execution.hypothesis.clone(),
        );
    }
}

fn add_step_properties(props: &mut Properties, step: &StepSnapshot) {
    if step.step_type == Some(StepType::Action) {
        if let Some(action_id) = &step.action_id {
            props.insert(properties::ACTION_ID.to_string(), action_id.clone());
        }
    }
    if let Some(action_name) = &step.action_name {
        props.insert(properties::ACTION_NAME.to_string(), action_name.clone());
    }
    if let Some(custom_label) = &step.custom_label {
        props.insert(
            properties::ACTION_CUSTOM_LABEL.to_string(),
            custom_label.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::model::{ActionKind, ExecutionId, Team};
    use crate::registry::StepSnapshot;

    fn context(principal: Option<Principal>) -> EventContext {
        EventContext {
            environment_name: "gateway".to_string(),
            team: Some(Team {
                id: "t-1".to_string(),
                key: "ADM".to_string(),
                name: "Administrators".to_string(),
            }),
            principal,
            event_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    fn execution() -> ExperimentExecution {
        ExperimentExecution {
            execution_id: ExecutionId::from(42),
            experiment_key: "ADM-1".to_string(),
            name: "Shop survives pod loss".to_string(),
            state: "COMPLETED".to_string(),
            started_time: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
            ended_time: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()),
            ..ExperimentExecution::default()
        }
    }

    // ==================== Base Property Tests ====================

    #[test]
    fn test_base_properties_user_principal() {
        let props = base_properties(&context(Some(Principal::User {
            name: "Jane Doe".to_string(),
            username: "jdoe".to_string(),
        })));

        assert_eq!(props["steadybit.environment.name"], "gateway");
        assert_eq!(props["steadybit.team.name"], "Administrators");
        assert_eq!(props["steadybit.team.key"], "ADM");
        assert_eq!(props["steadybit.principal.type"], "user");
        assert_eq!(props["steadybit.principal.username"], "jdoe");
        assert_eq!(props["steadybit.principal.name"], "Jane Doe");
    }

    #[test]
    fn test_base_properties_access_token_principal() {
        let props = base_properties(&context(Some(Principal::AccessToken {
            name: "ci".to_string(),
        })));

        assert_eq!(props["steadybit.principal.type"], "access_token");
        assert_eq!(props["steadybit.principal.name"], "ci");
        assert!(!props.contains_key("steadybit.principal.username"));
    }

    #[test]
    fn test_base_properties_batch_principal() {
        let props = base_properties(&context(Some(Principal::Batch {
            username: "scheduler".to_string(),
        })));

        assert_eq!(props["steadybit.principal.type"], "batch");
        assert_eq!(props["steadybit.principal.username"], "scheduler");
        assert!(!props.contains_key("steadybit.principal.name"));
    }

    #[test]
    fn test_base_properties_without_team_or_principal() {
        let mut ctx = context(None);
        ctx.team = None;

        let props = base_properties(&ctx);
        assert_eq!(props.len(), 1);

        ctx.principal = Some(Principal::Unknown);
        assert_eq!(base_properties(&ctx).len(), 1);
    }

    // ==================== Experiment Tests ====================

    #[test]
    fn test_experiment_event() {
        let event = experiment_event(&context(None), &execution(), Phase::Ended);

        assert_eq!(event.event_type, "CUSTOM_INFO");
        assert_eq!(event.title, "Steadybit experiment 'ADM-1 / 42' ended");
        assert_eq!(event.properties["steadybit.execution.id"], "42");
        assert_eq!(event.properties["steadybit.execution.state"], "completed");
        assert!(!event.properties.contains_key("steadybit.experiment.hypothesis"));
        let ended = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(event.start_time, Some(ended.timestamp_millis()));
        assert_eq!(event.end_time, Some(ended.timestamp_millis()));
        assert_eq!(event.entity_selector, None);
    }

    #[test]
    fn test_experiment_event_falls_back_to_event_time() {
        let ctx = context(None);
        let mut exec = execution();
        exec.started_time = None;
        exec.hypothesis = "Checkout keeps working".to_string();

        let event = experiment_event(&ctx, &exec, Phase::Started);

        assert_eq!(event.start_time, Some(ctx.event_time.timestamp_millis()));
        assert_eq!(
            event.properties["steadybit.experiment.hypothesis"],
            "Checkout keeps working"
        );
    }

    // ==================== Step Property Tests ====================

    #[test]
    fn test_step_properties_require_action_type_for_id() {
        let mut step = StepSnapshot {
            step_id: Uuid::nil(),
            execution_id: ExecutionId::from(1),
            step_type: None,
            action_kind: Some(ActionKind::Attack),
            action_id: Some("com.steadybit.extension_container.stop".to_string()),
            action_name: Some("Stop Container".to_string()),
            custom_label: None,
        };

        let mut props = Properties::new();
        add_step_properties(&mut props, &step);
        assert!(!props.contains_key("steadybit.step.action.id"));
        assert_eq!(props["steadybit.step.action.name"], "Stop Container");

        step.step_type = Some(StepType::Action);
        step.custom_label = Some("kill it".to_string());
        let mut props = Properties::new();
        add_step_properties(&mut props, &step);
        assert_eq!(
            props["steadybit.step.action.id"],
            "com.steadybit.extension_container.stop"
        );
        assert_eq!(props["steadybit.step.action.custom_label"], "kill it");
    }
}
