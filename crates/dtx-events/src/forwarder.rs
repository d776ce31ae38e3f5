//! Best-effort delivery of translated events.

use std::sync::Arc;

use dtx_api::{EntitiesApi, EventIngest, EventsApi};
use tracing::{debug, error, info};

use crate::cache::EntityCache;
use crate::model::LifecycleEvent;
use crate::registry::StepRegistry;
use crate::translate::Translator;

/// Translates lifecycle events and posts the result to Dynatrace.
///
/// Posting failures are logged and never returned: a broken monitoring
/// backend must not affect a running experiment.
#[derive(Clone)]
pub struct EventForwarder {
    translator: Translator,
    events: Arc<dyn EventsApi>,
}

impl EventForwarder {
    /// Creates a forwarder with a fresh registry and entity cache.
    #[must_use]
    pub fn new(events: Arc<dyn EventsApi>, entities: Arc<dyn EntitiesApi>) -> Self {
        let translator = Translator::new(
            Arc::new(StepRegistry::new()),
            Arc::new(EntityCache::new(entities)),
        );
        Self::with_translator(translator, events)
    }

    /// Creates a forwarder around an existing translator.
    #[must_use]
    pub fn with_translator(translator: Translator, events: Arc<dyn EventsApi>) -> Self {
        Self { translator, events }
    }

    /// The translator.
    #[must_use]
    pub const fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Handles one lifecycle event and returns what was sent, if anything.
    pub async fn forward(&self, event: &LifecycleEvent) -> Option<EventIngest> {
        let kind = event.kind();
        let Some(ingest) = self.translator.translate(event).await else {
            debug!(kind = %kind, "no Dynatrace event for lifecycle event");
            return None;
        };

        match self.events.post_event(&ingest).await {
            Ok(results) => info!(
                kind = %kind,
                title = %ingest.title,
                report_count = results.report_count,
                "sent Dynatrace event"
            ),
            Err(e) => error!(
                kind = %kind,
                title = %ingest.title,
                error = %e,
                "failed to send Dynatrace event"
            ),
        }

        Some(ingest)
    }
}

impl std::fmt::Debug for EventForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventForwarder")
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}
