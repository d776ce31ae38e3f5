//! Async seams over the Dynatrace API.
//!
//! Each consumer depends only on the slice of the API it needs, which keeps
//! test doubles small. [`DynatraceClient`](crate::DynatraceClient) implements
//! all of them.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::error::ApiResult;
use crate::types::{
    CreateMaintenanceWindowRequest, EntitiesList, EventIngest, EventIngestResults, Problem,
};

/// Boxed future returned by the API traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Event ingestion.
pub trait EventsApi: Send + Sync {
    /// Sends one event to `POST /v2/events/ingest`.
    fn post_event<'a>(&'a self, event: &'a EventIngest) -> ApiFuture<'a, EventIngestResults>;
}

/// Entity lookup.
pub trait EntitiesApi: Send + Sync {
    /// Lists the entities matching an entity selector.
    fn get_entities<'a>(&'a self, entity_selector: &'a str) -> ApiFuture<'a, EntitiesList>;
}

/// Maintenance window settings objects.
pub trait MaintenanceWindowApi: Send + Sync {
    /// Creates a window and returns the id of the settings object.
    fn create_maintenance_window<'a>(
        &'a self,
        request: &'a CreateMaintenanceWindowRequest,
    ) -> ApiFuture<'a, String>;

    /// Deletes a window by settings object id.
    fn delete_maintenance_window<'a>(&'a self, window_id: &'a str) -> ApiFuture<'a, ()>;
}

/// Problem queries.
pub trait ProblemsApi: Send + Sync {
    /// Lists open problems since `from`, optionally limited to an entity selector.
    fn get_problems<'a>(
        &'a self,
        from: DateTime<Utc>,
        entity_selector: Option<&'a str>,
    ) -> ApiFuture<'a, Vec<Problem>>;
}
