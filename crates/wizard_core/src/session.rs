use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use serde_json::{json, Value};
use shared::{
    domain::{SessionId, Stage},
    protocol::{InitializeRequest, InitializeResponse, StageResult, StageSnapshot, ValidationReport},
};
use tracing::{debug, info, warn};

use crate::{
    error::{SessionError, WizardError},
    event_bus::{event_types, DomainEvent, EventBus},
    workflow::WorkflowService,
};

type InitFlight = Shared<BoxFuture<'static, Result<SessionId, SessionError>>>;

/// Whether the coordinator created its session or received it from a parent
/// stage. Borrowed sessions are never cancelled remotely by this coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Active(SessionId),
}

enum Slot {
    Uninitialized,
    Initializing {
        generation: u64,
        flight: InitFlight,
    },
    Active {
        session_id: SessionId,
        ownership: Ownership,
    },
}

struct CoordinatorState {
    slot: Slot,
    generation: u64,
}

struct CoordinatorInner {
    stage: Stage,
    service: Arc<dyn WorkflowService>,
    events: Option<EventBus>,
    init_params: Value,
    state: Mutex<CoordinatorState>,
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn announce(&self, event_type: &str, session_id: &SessionId) {
        if let Some(events) = &self.events {
            events
                .publish(DomainEvent::new(
                    event_type,
                    session_id.as_str(),
                    json!({ "stage": self.stage, "session_id": session_id }),
                ))
                .await;
        }
    }
}

#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SessionCoordinator {
    pub fn new(stage: Stage, service: Arc<dyn WorkflowService>) -> Self {
        Self::build(stage, service, None, Value::Null)
    }

    pub fn with_event_bus(stage: Stage, service: Arc<dyn WorkflowService>, events: EventBus) -> Self {
        Self::build(stage, service, Some(events), Value::Null)
    }

    fn build(
        stage: Stage,
        service: Arc<dyn WorkflowService>,
        events: Option<EventBus>,
        init_params: Value,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                stage,
                service,
                events,
                init_params,
                state: Mutex::new(CoordinatorState {
                    slot: Slot::Uninitialized,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn with_init_params(self, init_params: Value) -> Self {
        let inner = &self.inner;
        Self::build(
            inner.stage,
            inner.service.clone(),
            inner.events.clone(),
            init_params,
        )
    }

    pub fn stage(&self) -> Stage {
        self.inner.stage
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match &self.inner.lock_state().slot {
            Slot::Active { session_id, .. } => Some(session_id.clone()),
            _ => None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.inner.lock_state().slot {
            Slot::Uninitialized => SessionPhase::Uninitialized,
            Slot::Initializing { .. } => SessionPhase::Initializing,
            Slot::Active { session_id, .. } => SessionPhase::Active(session_id.clone()),
        }
    }

    pub fn ownership(&self) -> Option<Ownership> {
        match &self.inner.lock_state().slot {
            Slot::Active { ownership, .. } => Some(*ownership),
            _ => None,
        }
    }

    pub async fn ensure_session(&self) -> Result<SessionId, SessionError> {
        let flight = {
            let mut state = self.inner.lock_state();
            match &state.slot {
                Slot::Active { session_id, .. } => return Ok(session_id.clone()),
                Slot::Initializing { flight, .. } => {
                    debug!(stage = %self.inner.stage, "session: joining in-flight initialization");
                    flight.clone()
                }
                Slot::Uninitialized => {
                    state.generation += 1;
                    let generation = state.generation;
                    let flight = start_flight(&self.inner, generation);
                    state.slot = Slot::Initializing {
                        generation,
                        flight: flight.clone(),
                    };
                    flight
                }
            }
        };
        flight.await
    }

    pub fn adopt_session(&self, session_id: SessionId) {
        let previous = {
            let mut state = self.inner.lock_state();
            state.generation += 1;
            mem::replace(
                &mut state.slot,
                Slot::Active {
                    session_id: session_id.clone(),
                    ownership: Ownership::Borrowed,
                },
            )
        };
        debug!(stage = %self.inner.stage, %session_id, "session: adopted");

        match previous {
            Slot::Initializing { flight, .. } => drive_detached(flight),
            Slot::Active {
                session_id: replaced,
                ownership: Ownership::Owned,
            } if replaced != session_id => {
                let service = self.inner.service.clone();
                let stage = self.inner.stage;
                drive_detached(
                    async move {
                        cancel_best_effort(service.as_ref(), stage, &replaced).await;
                    }
                    .boxed(),
                );
            }
            _ => {}
        }
    }

    /// Cancels an owned session remotely (best effort) and returns to
    /// uninitialized. Borrowed sessions are only dropped locally.
    pub async fn reset(&self) {
        let previous = self.clear_slot();
        match previous {
            Slot::Active {
                session_id,
                ownership,
            } => {
                if ownership == Ownership::Owned {
                    cancel_best_effort(self.inner.service.as_ref(), self.inner.stage, &session_id)
                        .await;
                }
                info!(stage = %self.inner.stage, %session_id, ?ownership, "session: reset");
                self.inner.announce(event_types::SESSION_RESET, &session_id).await;
            }
            Slot::Initializing { flight, .. } => {
                debug!(stage = %self.inner.stage, "session: reset superseded in-flight initialization");
                drive_detached(flight.map(|_| ()).boxed());
            }
            Slot::Uninitialized => {}
        }
    }

    pub fn release(&self) -> Option<SessionId> {
        match self.clear_slot() {
            Slot::Active { session_id, .. } => Some(session_id),
            Slot::Initializing { flight, .. } => {
                drive_detached(flight.map(|_| ()).boxed());
                None
            }
            Slot::Uninitialized => None,
        }
    }

    fn clear_slot(&self) -> Slot {
        let mut state = self.inner.lock_state();
        state.generation += 1;
        mem::replace(&mut state.slot, Slot::Uninitialized)
    }

    pub async fn state(&self) -> Result<StageSnapshot, WizardError> {
        let session_id = self.ensure_session().await?;
        self.inner
            .service
            .get_state(&session_id)
            .await
            .map_err(|err| WizardError::remote(self.inner.stage, "get_state", err))
    }

    pub async fn validate(&self) -> Result<ValidationReport, WizardError> {
        let session_id = self.ensure_session().await?;
        self.inner
            .service
            .validate(&session_id)
            .await
            .map_err(|err| WizardError::remote(self.inner.stage, "validate", err))
    }

    pub async fn submit_step(&self, payload: Value) -> Result<StageSnapshot, WizardError> {
        let session_id = self.ensure_session().await?;
        self.inner
            .service
            .advance_step(&session_id, payload)
            .await
            .map_err(|err| WizardError::remote(self.inner.stage, "advance_step", err))
    }

    pub async fn complete(&self) -> Result<StageResult, WizardError> {
        let session_id = self.ensure_session().await?;
        let result = self
            .inner
            .service
            .complete(&session_id)
            .await
            .map_err(|err| WizardError::remote(self.inner.stage, "complete", err))?;

        let released = {
            let mut state = self.inner.lock_state();
            let still_current = matches!(
                &state.slot,
                Slot::Active { session_id: current, .. } if *current == session_id
            );
            if still_current {
                state.generation += 1;
                state.slot = Slot::Uninitialized;
            }
            still_current
        };
        info!(stage = %self.inner.stage, %session_id, released, "session: stage completed");
        Ok(result)
    }
}

fn start_flight(inner: &Arc<CoordinatorInner>, generation: u64) -> InitFlight {
    let weak = Arc::downgrade(inner);
    let stage = inner.stage;
    let service = inner.service.clone();
    let request = InitializeRequest {
        stage,
        parent_session_id: None,
        params: inner.init_params.clone(),
    };

    async move {
        info!(%stage, generation, "session: initializing");
        let outcome = service.initialize(request).await;
        settle_flight(weak, stage, service, generation, outcome).await
    }
    .boxed()
    .shared()
}

async fn settle_flight(
    inner: Weak<CoordinatorInner>,
    stage: Stage,
    service: Arc<dyn WorkflowService>,
    generation: u64,
    outcome: anyhow::Result<InitializeResponse>,
) -> Result<SessionId, SessionError> {
    let orphan = match inner.upgrade() {
        Some(inner) => {
            let settled = {
                let mut state = inner.lock_state();
                let current = matches!(
                    &state.slot,
                    Slot::Initializing { generation: g, .. } if *g == generation
                );
                match (current, outcome) {
                    (true, Ok(response)) => {
                        state.slot = Slot::Active {
                            session_id: response.session_id.clone(),
                            ownership: Ownership::Owned,
                        };
                        Ok(Ok(response.session_id))
                    }
                    (true, Err(err)) => {
                        state.slot = Slot::Uninitialized;
                        Ok(Err(SessionError::InitializeFailed {
                            stage,
                            message: format!("{err:#}"),
                        }))
                    }
                    (false, Ok(response)) => Err(Some(response.session_id)),
                    (false, Err(_)) => Err(None),
                }
            };

            match settled {
                Ok(Ok(session_id)) => {
                    info!(%stage, %session_id, generation, "session: active");
                    inner
                        .announce(event_types::SESSION_STARTED, &session_id)
                        .await;
                    return Ok(session_id);
                }
                Ok(Err(err)) => {
                    warn!(%stage, generation, error = %err, "session: initialization failed");
                    return Err(err);
                }
                Err(orphan) => orphan,
            }
        }
        None => outcome.ok().map(|response| response.session_id),
    };

    if let Some(orphan) = orphan {
        info!(%stage, session_id = %orphan, generation, "session: discarding superseded initialization");
        cancel_best_effort(service.as_ref(), stage, &orphan).await;
    }
    Err(SessionError::Superseded { stage })
}

async fn cancel_best_effort(service: &dyn WorkflowService, stage: Stage, session_id: &SessionId) {
    if let Err(err) = service.cancel(session_id).await {
        warn!(
            %stage,
            %session_id,
            error = %format!("{err:#}"),
            "session: remote cancel failed; continuing with local reset"
        );
    }
}

fn drive_detached<F>(future: F)
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(future);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
