use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use shared::{
    domain::{ClientSummary, Stage},
    protocol::ClientSearchPage,
};
use tokio::sync::watch;
use tracing::info;

use crate::{
    debounce::{DebounceConfig, DebounceStatus, DebouncedAction},
    error::WizardError,
    event_bus::{event_types, DomainEvent, EventBus},
    session::SessionCoordinator,
    workflow::{ClientDirectory, WorkflowService},
};

pub type SearchStatus = DebounceStatus<ClientSearchPage>;

#[derive(Clone)]
pub struct ClientSearch {
    sessions: SessionCoordinator,
    guard: DebouncedAction<ClientSearchPage>,
    selected: Arc<Mutex<Option<ClientSummary>>>,
    events: EventBus,
}

impl ClientSearch {
    pub fn new(
        service: Arc<dyn WorkflowService>,
        directory: Arc<dyn ClientDirectory>,
        events: EventBus,
        config: DebounceConfig,
    ) -> Self {
        let sessions = SessionCoordinator::with_event_bus(Stage::ClientSearch, service, events.clone());
        let guard = {
            let sessions = sessions.clone();
            DebouncedAction::new(config, move |keyword: String| {
                let sessions = sessions.clone();
                let directory = directory.clone();
                async move {
                    if keyword.is_empty() {
                        return Ok(ClientSearchPage::default());
                    }
                    let session_id = sessions.ensure_session().await?;
                    directory.search_clients(&session_id, &keyword).await
                }
            })
        };

        Self {
            sessions,
            guard,
            selected: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn sessions(&self) -> &SessionCoordinator {
        &self.sessions
    }

    pub fn set_keyword(&self, keyword: impl Into<String>) {
        self.guard.set_value(keyword);
    }

    pub fn cancel(&self) {
        self.guard.cancel();
    }

    pub fn status(&self) -> SearchStatus {
        self.guard.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchStatus> {
        self.guard.subscribe()
    }

    pub fn selected(&self) -> Option<ClientSummary> {
        self.selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn select(&self, client: ClientSummary) -> Result<(), WizardError> {
        self.sessions
            .submit_step(json!({ "selected_client_id": client.client_id }))
            .await?;
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());

        info!(client_id = %client.client_id, "client_search: client selected");
        self.events
            .publish(DomainEvent::new(
                event_types::CLIENT_SELECTED,
                client.client_id.as_str(),
                json!({ "client": client }),
            ))
            .await;
        Ok(())
    }

    pub(crate) fn remember(&self, client: ClientSummary) {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
    }

    pub async fn clear_selection(&self) {
        let previous = self
            .selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(previous) = previous else {
            return;
        };

        self.events
            .publish(DomainEvent::new(
                event_types::CLIENT_SELECTION_CLEARED,
                previous.client_id.as_str(),
                json!({ "client_id": previous.client_id }),
            ))
            .await;
    }

    pub async fn reset(&self) {
        self.guard.clear();
        self.selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.sessions.reset().await;
    }
}

#[cfg(test)]
#[path = "tests/client_search_tests.rs"]
mod tests;
