use std::{
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{future::join_all, FutureExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod event_types {
    pub const SESSION_STARTED: &str = "session.started";
    pub const SESSION_RESET: &str = "session.reset";
    pub const CLIENT_SELECTED: &str = "client.selected";
    pub const CLIENT_SELECTION_CLEARED: &str = "client.selection_cleared";
    pub const CLIENT_CREATED: &str = "client.created";
    pub const BRANCH_SELECTED: &str = "branch.selected";
    pub const ORDER_INFO_UPDATED: &str = "order_info.updated";
    pub const ITEM_CREATED: &str = "item.created";
    pub const ORDER_PARAMETERS_UPDATED: &str = "order_parameters.updated";
    pub const ORDER_CONFIRMATION_UPDATED: &str = "order_confirmation.updated";
    pub const WIZARD_COMPLETED: &str = "wizard.completed";
    pub const WIZARD_CANCELLED: &str = "wizard.cancelled";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    #[serde(default)]
    pub payload: Value,
}

impl DomainEvent {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            timestamp: Utc::now(),
            version: 1,
            payload,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

type HandlerRef = Arc<dyn EventHandler>;

struct Registration {
    id: u64,
    handler: HandlerRef,
}

#[derive(Default)]
struct BusInner {
    handlers: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn handlers(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, event_type: &str, id: u64) {
        let mut handlers = self.handlers();
        if let Some(registrations) = handlers.get_mut(event_type) {
            registrations.retain(|registration| registration.id != id);
            if registrations.is_empty() {
                handlers.remove(event_type);
            }
        }
    }
}

fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event_type`. Subscribing the same handler
    /// instance again returns a handle to the existing registration.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: HandlerRef) -> Subscription {
        let event_type = event_type.into();
        let mut handlers = self.inner.handlers();
        let registrations = handlers.entry(event_type.clone()).or_default();

        let id = match registrations
            .iter()
            .find(|registration| same_handler(&registration.handler, &handler))
        {
            Some(existing) => existing.id,
            None => {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                registrations.push(Registration { id, handler });
                id
            }
        };

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event_type,
            id,
            active: AtomicBool::new(true),
        }
    }

    pub async fn publish(&self, event: DomainEvent) -> PublishOutcome {
        let handlers: Vec<HandlerRef> = self
            .inner
            .handlers()
            .get(&event.event_type)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|registration| registration.handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event_type = %event.event_type, "event_bus: no subscribers");
            return PublishOutcome::default();
        }

        let event_ref = &event;
        let results = join_all(
            handlers
                .iter()
                .map(|handler| AssertUnwindSafe(handler.handle(event_ref)).catch_unwind()),
        )
        .await;

        let mut outcome = PublishOutcome::default();
        for result in results {
            match result {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(err)) => {
                    outcome.failed += 1;
                    warn!(
                        event_type = %event.event_type,
                        aggregate_id = %event.aggregate_id,
                        error = %format!("{err:#}"),
                        "event_bus: handler failed"
                    );
                }
                Err(_) => {
                    outcome.failed += 1;
                    warn!(
                        event_type = %event.event_type,
                        aggregate_id = %event.aggregate_id,
                        "event_bus: handler panicked"
                    );
                }
            }
        }
        outcome
    }

    pub fn clear(&self) {
        self.inner.handlers().clear();
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner
            .handlers()
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

pub struct Subscription {
    bus: Weak<BusInner>,
    event_type: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.event_type, self.id);
        }
    }
}

#[cfg(test)]
#[path = "tests/event_bus_tests.rs"]
mod tests;
