//! Step-execution registry.
//!
//! Target events only reference their step by id. The registry remembers the
//! action metadata of running attack steps so target events can be joined
//! to them.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::model::{ActionKind, ExecutionId, StepExecution, StepType};

/// Action metadata of a step, captured when the step started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSnapshot {
    /// Step execution id.
    pub step_id: Uuid,
    /// Owning experiment execution id.
    pub execution_id: ExecutionId,
    /// Step type.
    pub step_type: Option<StepType>,
    /// Action kind.
    pub action_kind: Option<ActionKind>,
    /// Action id.
    pub action_id: Option<String>,
    /// Action display name.
    pub action_name: Option<String>,
    /// Author-given label.
    pub custom_label: Option<String>,
}

impl StepSnapshot {
    /// Whether the step runs an attack.
    #[must_use]
    pub fn is_attack(&self) -> bool {
        self.action_kind == Some(ActionKind::Attack)
    }

    /// Human label of the action: custom label, else action name, else
    /// action id. Empty values are skipped.
    #[must_use]
    pub fn action_label(&self) -> &str {
        [&self.custom_label, &self.action_name, &self.action_id]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|label| !label.is_empty())
            .unwrap_or_default()
    }
}

impl From<&StepExecution> for StepSnapshot {
    fn from(step: &StepExecution) -> Self {
        Self {
            step_id: step.id,
            execution_id: step.execution_id,
            step_type: step.step_type,
            action_kind: step.action_kind,
            action_id: step.action_id.clone(),
            action_name: step.action_name.clone(),
            custom_label: step.custom_label.clone(),
        }
    }
}

/// Concurrent map from step execution id to [`StepSnapshot`].
///
/// Only attack steps are stored.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: RwLock<HashMap<Uuid, StepSnapshot>>,
}

impl StepRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a started step. Returns `false` if the step is not an attack
    /// and was therefore ignored.
    pub fn record_started(&self, step: &StepExecution) -> bool {
        let snapshot = StepSnapshot::from(step);
        if !snapshot.is_attack() {
            debug!(step_id = %step.id, "ignoring non-attack step");
            return false;
        }

        self.steps.write().insert(step.id, snapshot);
        true
    }

    /// Forgets a completed step.
    pub fn remove(&self, step_id: &Uuid) -> Option<StepSnapshot> {
        self.steps.write().remove(step_id)
    }

    /// Looks up a step.
    #[must_use]
    pub fn get(&self, step_id: &Uuid) -> Option<StepSnapshot> {
        self.steps.read().get(step_id).cloned()
    }

    /// Drops every step of an experiment execution. Returns how many were
    /// removed.
    pub fn sweep_execution(&self, execution_id: ExecutionId) -> usize {
        let mut steps = self.steps.write();
        let before = steps.len();
        steps.retain(|_, step| step.execution_id != execution_id);
        let removed = before - steps.len();
        if removed > 0 {
            debug!(execution_id = %execution_id, removed, "swept steps of completed execution");
        }
        removed
    }

    /// Number of tracked steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.read().len()
    }

    /// Whether no step is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.read().is_empty()
    }
}
