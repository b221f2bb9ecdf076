use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MIN_LENGTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub delay: Duration,
    pub min_length: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebounceStatus<T> {
    pub value: String,
    pub is_processing: bool,
    pub error: Option<String>,
    pub too_short: bool,
    /// Result of the most recent action that was not superseded.
    pub latest: Option<T>,
}

impl<T> Default for DebounceStatus<T> {
    fn default() -> Self {
        Self {
            value: String::new(),
            is_processing: false,
            error: None,
            too_short: false,
            latest: None,
        }
    }
}

type Action<T> = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

struct Running {
    generation: u64,
    value: String,
}

#[derive(Default)]
struct GuardState {
    value: String,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    running: Option<Running>,
    queued: Option<(u64, String)>,
    last_committed: Option<String>,
}

impl GuardState {
    fn processing(&self) -> bool {
        self.queued.is_some()
            || self
                .running
                .as_ref()
                .is_some_and(|running| running.generation == self.generation)
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct GuardInner<T> {
    config: DebounceConfig,
    action: Action<T>,
    state: Mutex<GuardState>,
    status: watch::Sender<DebounceStatus<T>>,
}

impl<T> GuardInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &GuardState, apply: impl FnOnce(&mut DebounceStatus<T>)) {
        let processing = state.processing();
        self.status.send_modify(|status| {
            apply(status);
            status.is_processing = processing;
        });
    }

    fn mature(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock_state();
        if state.generation != generation {
            return;
        }
        state.timer = None;
        let value = state.value.clone();
        self.dispatch(&mut state, generation, value);
    }

    fn dispatch(self: &Arc<Self>, state: &mut GuardState, generation: u64, value: String) {
        if let Some(running) = state.running.as_mut() {
            if running.value == value {
                // Same input is already on its way; let its result land.
                running.generation = generation;
                state.queued = None;
            } else {
                debug!(generation, "debounce: queueing value behind in-flight action");
                state.queued = Some((generation, value));
            }
            self.publish(state, |_| {});
            return;
        }

        if state.last_committed.as_deref() == Some(value.as_str()) {
            debug!(generation, "debounce: value unchanged since last action");
            self.publish(state, |_| {});
            return;
        }

        self.start(state, generation, value);
    }

    fn start(self: &Arc<Self>, state: &mut GuardState, generation: u64, value: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(generation, "debounce: no async runtime; dropping action");
            return;
        };

        state.running = Some(Running {
            generation,
            value: value.clone(),
        });
        state.last_committed = Some(value.clone());
        self.publish(state, |status| status.error = None);

        let weak = Arc::downgrade(self);
        let action = (self.action)(value);
        runtime.spawn(async move {
            let result = action.await;
            if let Some(inner) = weak.upgrade() {
                inner.finish(result);
            }
        });
    }

    fn finish(self: &Arc<Self>, result: anyhow::Result<T>) {
        let mut state = self.lock_state();
        let Some(running) = state.running.take() else {
            return;
        };

        if running.generation == state.generation {
            match result {
                Ok(value) => self.publish(&state, |status| {
                    status.latest = Some(value);
                    status.error = None;
                }),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "debounce: action failed");
                    state.last_committed = None;
                    let message = format!("{err:#}");
                    self.publish(&state, |status| status.error = Some(message));
                }
            }
        } else {
            debug!(
                generation = running.generation,
                current = state.generation,
                "debounce: discarding stale result"
            );
            state.last_committed = None;
        }

        match state.queued.take() {
            Some((generation, value)) if generation == state.generation => {
                self.start(&mut state, generation, value)
            }
            _ => self.publish(&state, |_| {}),
        }
    }
}

pub struct DebouncedAction<T> {
    inner: Arc<GuardInner<T>>,
}

impl<T> Clone for DebouncedAction<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> DebouncedAction<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(config: DebounceConfig, action: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (status, _) = watch::channel(DebounceStatus::default());
        Self {
            inner: Arc::new(GuardInner {
                config,
                action: Arc::new(move |value: String| action(value).boxed()),
                state: Mutex::new(GuardState::default()),
                status,
            }),
        }
    }

    pub fn config(&self) -> DebounceConfig {
        self.inner.config
    }

    pub fn set_value(&self, value: impl Into<String>) {
        let value = value.into();
        let inner = &self.inner;
        let mut state = inner.lock_state();

        state.generation += 1;
        let generation = state.generation;
        state.abort_timer();
        state.queued = None;

        let was_empty = state.value.is_empty();
        state.value = value.clone();
        let length = value.chars().count();
        let too_short = length > 0 && length < inner.config.min_length;
        inner.publish(&state, |status| {
            status.value = value.clone();
            status.too_short = too_short;
        });

        if value.is_empty() {
            if !was_empty {
                inner.dispatch(&mut state, generation, value);
            }
            return;
        }
        if too_short {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(generation, "debounce: no async runtime; value not scheduled");
            return;
        };
        let weak: Weak<GuardInner<T>> = Arc::downgrade(inner);
        let delay = inner.config.delay;
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.mature(generation);
            }
        }));
    }

    pub fn cancel(&self) {
        let mut state = self.inner.lock_state();
        state.generation += 1;
        state.abort_timer();
        state.queued = None;
        if let Some(running) = &state.running {
            // A cancelled action may not have reached the service; allow a resend.
            if state.last_committed.as_deref() == Some(running.value.as_str()) {
                state.last_committed = None;
            }
        }
        self.inner.publish(&state, |_| {});
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        state.generation += 1;
        state.abort_timer();
        state.queued = None;
        state.value.clear();
        state.last_committed = None;
        self.inner.publish(&state, |status| {
            status.value.clear();
            status.too_short = false;
            status.error = None;
            status.latest = None;
        });
    }

    pub fn status(&self) -> DebounceStatus<T> {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DebounceStatus<T>> {
        self.inner.status.subscribe()
    }
}

impl Drop for GuardState {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
