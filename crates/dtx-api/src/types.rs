//! Wire types of the Dynatrace environment API v2.
//!
//! Only the fields the extension reads or writes are modelled. Unknown
//! response fields are ignored and missing ones fall back to defaults, so
//! slimmed-down responses (as returned by test doubles) still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event type used for every event the extension ingests.
pub const EVENT_TYPE_CUSTOM_INFO: &str = "CUSTOM_INFO";

/// Settings schema of maintenance windows.
pub const MAINTENANCE_WINDOW_SCHEMA_ID: &str = "builtin:alerting.maintenance-window";

/// An event sent to `POST /v2/events/ingest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIngest {
    /// The Dynatrace event type.
    pub event_type: String,
    /// Human readable title.
    pub title: String,
    /// Custom properties attached to the event.
    pub properties: BTreeMap<String, String>,
    /// Entity selector the event is attached to. `None` means environment wide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_selector: Option<String>,
    /// Start of the event in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    /// End of the event in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// Timeout of the event in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

impl EventIngest {
    /// Creates a `CUSTOM_INFO` event with the given title and properties.
    #[must_use]
    pub fn custom_info(title: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            event_type: EVENT_TYPE_CUSTOM_INFO.to_string(),
            title: title.into(),
            properties,
            entity_selector: None,
            start_time: None,
            end_time: None,
            timeout: None,
        }
    }

    /// Sets start and end to the same instant.
    #[must_use]
    pub const fn at(mut self, epoch_millis: i64) -> Self {
        self.start_time = Some(epoch_millis);
        self.end_time = Some(epoch_millis);
        self
    }

    /// Attaches the event to an entity selector.
    #[must_use]
    pub fn with_entity_selector(mut self, selector: Option<String>) -> Self {
        self.entity_selector = selector;
        self
    }
}

/// Per-event result of an ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventIngestResult {
    /// Correlation id assigned by Dynatrace.
    pub correlation_id: String,
    /// Ingestion status, e.g. `OK`.
    pub status: String,
}

/// Response of `POST /v2/events/ingest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventIngestResults {
    /// One result per ingested event.
    pub event_ingest_results: Vec<EventIngestResult>,
    /// Number of reported events.
    pub report_count: u32,
}

/// Response of `GET /v2/entities`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitiesList {
    /// The matching entities.
    pub entities: Vec<Entity>,
    /// Key of the next page, if any.
    pub next_page_key: Option<String>,
    /// Page size used by the server.
    pub page_size: u32,
    /// Total number of matches.
    pub total_count: u32,
}

/// A monitored entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entity {
    /// The entity id, e.g. `CLOUD_APPLICATION-7DA5F4D930A3CA81`.
    pub entity_id: String,
    /// Display name.
    pub display_name: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// A settings object creating a maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaintenanceWindowRequest {
    /// Settings schema, always [`MAINTENANCE_WINDOW_SCHEMA_ID`].
    pub schema_id: String,
    /// Settings scope, `environment`.
    pub scope: String,
    /// The window itself.
    pub value: MaintenanceWindow,
}

impl CreateMaintenanceWindowRequest {
    /// Wraps a window into an environment scoped settings object.
    #[must_use]
    pub fn environment(value: MaintenanceWindow) -> Self {
        Self {
            schema_id: MAINTENANCE_WINDOW_SCHEMA_ID.to_string(),
            scope: "environment".to_string(),
            value,
        }
    }
}

/// One element of the settings creation response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateMaintenanceWindowResponse {
    /// Per-object status code.
    pub code: u16,
    /// Id of the created settings object.
    pub object_id: String,
}

/// Maintenance window settings value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    /// Whether the window is active.
    pub enabled: bool,
    /// Name, description and suppression.
    pub general_properties: MaintenanceWindowGeneralProperties,
    /// When the window applies.
    pub schedule: MaintenanceWindowSchedule,
}

/// General properties of a maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowGeneralProperties {
    /// Window name.
    pub name: String,
    /// Free text description.
    pub description: String,
    /// `PLANNED` or `UNPLANNED`.
    pub maintenance_type: String,
    /// Problem detection and alerting behaviour.
    pub suppression: String,
    /// Whether synthetic monitors pause during the window.
    pub disable_synthetic_monitor_execution: bool,
}

/// Schedule of a maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowSchedule {
    /// Schedule type, `ONCE` for one-shot windows.
    pub schedule_type: String,
    /// Start and end of a one-shot window.
    pub once_recurrence: MaintenanceWindowOnceRecurrence,
}

/// Time range of a one-shot window, formatted `YYYY-MM-DDTHH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowOnceRecurrence {
    /// Start time.
    pub start_time: String,
    /// End time.
    pub end_time: String,
    /// IANA time zone of both times.
    pub time_zone: String,
}

/// Response of `GET /v2/problems`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetProblemsResponse {
    /// Total number of problems.
    pub total_count: u32,
    /// Page size used by the server.
    pub page_size: u32,
    /// The problems of this page.
    pub problems: Vec<Problem>,
}

/// A Dynatrace problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Problem {
    /// Internal problem id.
    pub problem_id: String,
    /// Display id, e.g. `P-2311100`.
    pub display_id: String,
    /// Problem title.
    pub title: String,
    /// Impact level, e.g. `APPLICATION`.
    pub impact_level: String,
    /// Severity level, e.g. `ERROR`.
    pub severity_level: String,
    /// `OPEN` or `CLOSED`.
    pub status: String,
    /// Entities affected by the problem.
    pub affected_entities: Vec<ProblemEntity>,
    /// Entities impacted by the problem.
    pub impacted_entities: Vec<ProblemEntity>,
    /// Start in epoch milliseconds.
    pub start_time: i64,
    /// End in epoch milliseconds, `-1` while open.
    pub end_time: i64,
}

/// An entity referenced from a problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemEntity {
    /// Id and type of the entity.
    pub entity_id: ProblemEntityId,
    /// Display name.
    pub name: String,
}

/// Id of an entity referenced from a problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemEntityId {
    /// Entity id.
    pub id: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub entity_type: String,
}
