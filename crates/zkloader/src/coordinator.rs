//! Acquisition coordinator: idempotent, coalesced loading of the toolkit.
//!
//! One coordinator is built per process and cloned to whoever needs the
//! toolkit. At most one fallback sequence is tracked at a time; callers that
//! arrive while it runs join its shared outcome instead of starting another.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! await, so every check-and-set below is atomic with respect to other
//! callers.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::capability::ProvingToolkit;
use crate::config::LoaderConfig;
use crate::environment::HostEnvironment;
use crate::events::{EventBus, LoaderEvent};
use crate::fallback::{self, SequenceTimings};
use crate::registry::RegistrySlot;
use crate::types::{LoadError, LoadResult};

/// Shared outcome of one acquisition attempt.
type SharedLoad = Shared<BoxFuture<'static, LoadResult<()>>>;

#[derive(Default)]
struct CoordinatorState {
    loaded: bool,
    in_flight: bool,
    /// Present while `in_flight`; left resolved after a success.
    pending: Option<SharedLoad>,
    /// Bumped on reset so an abandoned attempt cannot touch state.
    generation: u64,
}

struct Inner {
    config: LoaderConfig,
    env: Arc<dyn HostEnvironment>,
    slot: Arc<dyn RegistrySlot>,
    events: EventBus,
    state: Mutex<CoordinatorState>,
}

/// Handle to the process-wide acquisition state. Cheap to clone.
#[derive(Clone)]
pub struct AcquisitionCoordinator {
    inner: Arc<Inner>,
}

impl AcquisitionCoordinator {
    pub fn new(
        config: LoaderConfig,
        env: Arc<dyn HostEnvironment>,
        slot: Arc<dyn RegistrySlot>,
    ) -> Self {
        Self::with_events(config, env, slot, EventBus::default())
    }

    /// Build a coordinator that emits onto an existing event bus.
    pub fn with_events(
        config: LoaderConfig,
        env: Arc<dyn HostEnvironment>,
        slot: Arc<dyn RegistrySlot>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                env,
                slot,
                events,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LoaderEvent> {
        self.inner.events.subscribe()
    }

    /// Make sure the toolkit is loaded.
    ///
    /// Returns immediately when it already is, joins the running attempt if
    /// there is one, and otherwise starts a new fallback sequence. Every
    /// caller of one attempt receives the same outcome.
    ///
    /// The sequence runs on a task spawned onto the current Tokio runtime;
    /// outside of one this fails with `EnvironmentUnavailable`.
    pub async fn load(&self) -> LoadResult<()> {
        match self.begin_or_join()? {
            None => Ok(()),
            Some(pending) => pending.await,
        }
    }

    /// True iff the last attempt succeeded and the slot still holds the toolkit.
    pub fn is_loaded(&self) -> bool {
        self.inner.lock_state().loaded && self.inner.slot.is_present()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock_state().in_flight
    }

    /// Forget all acquisition state, remove injected artifacts and empty the slot.
    ///
    /// An attempt that is still running keeps going in the background, and
    /// callers already awaiting it still see its outcome, but it no longer
    /// affects this coordinator.
    pub async fn reset(&self) {
        let had_toolkit = {
            let mut state = self.inner.lock_state();
            let abandoned = state.in_flight;
            state.loaded = false;
            state.in_flight = false;
            state.pending = None;
            state.generation = state.generation.wrapping_add(1);
            if abandoned {
                tracing::debug!("Abandoning in-flight acquisition attempt");
            }
            self.inner.slot.clear()
        };

        self.inner.env.remove_artifacts().await;

        tracing::info!("Proving toolkit state reset (had toolkit: {had_toolkit})");
        self.inner.events.emit(LoaderEvent::Reset { had_toolkit });
    }

    /// Reset and load again from the first source.
    pub async fn reload(&self) -> LoadResult<()> {
        self.reset().await;
        self.load().await
    }

    /// Check that the loaded toolkit exposes the required proving scheme.
    ///
    /// Never fails: a missing toolkit or a shape mismatch yields `false`.
    pub async fn test(&self) -> bool {
        if !self.is_loaded() {
            return false;
        }

        match self.check_shape() {
            Ok(()) => {
                tracing::info!("Proving toolkit self-test passed");
                true
            }
            Err(e) => {
                tracing::error!("Proving toolkit self-test failed: {e}");
                false
            }
        }
    }

    /// Version reported by the loaded toolkit, if any.
    pub fn version(&self) -> Option<String> {
        self.capability().and_then(|toolkit| toolkit.version())
    }

    /// The loaded toolkit handle, `Some` iff [`is_loaded`](Self::is_loaded).
    pub fn capability(&self) -> Option<Arc<dyn ProvingToolkit>> {
        if !self.is_loaded() {
            return None;
        }
        self.inner.slot.get()
    }

    fn check_shape(&self) -> LoadResult<()> {
        let toolkit = self.inner.slot.get().ok_or_else(|| {
            LoadError::CapabilityShapeMismatch("registry slot is empty".to_string())
        })?;
        let scheme = self.inner.config.required_scheme.as_str();

        // The toolkit is third-party code; a panicking lookup is a failed check.
        let found = std::panic::catch_unwind(AssertUnwindSafe(|| toolkit.scheme(scheme).is_some()))
            .map_err(|_| {
                LoadError::CapabilityShapeMismatch(format!("lookup of '{scheme}' panicked"))
            })?;

        if found {
            Ok(())
        } else {
            Err(LoadError::CapabilityShapeMismatch(format!(
                "'{scheme}' scheme not available"
            )))
        }
    }

    /// Decide, under one lock, whether to return, join, or start an attempt.
    fn begin_or_join(&self) -> LoadResult<Option<SharedLoad>> {
        let mut state = self.inner.lock_state();

        if state.loaded && self.inner.slot.is_present() {
            return Ok(None);
        }

        if state.in_flight {
            if let Some(pending) = &state.pending {
                tracing::debug!("Joining in-flight acquisition attempt");
                return Ok(Some(pending.clone()));
            }
        }

        self.inner
            .env
            .check_available()
            .map_err(LoadError::EnvironmentUnavailable)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            LoadError::EnvironmentUnavailable(format!("no Tokio runtime to run the sequence: {e}"))
        })?;

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let task = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move { task.run_attempt(generation).await });

        let pending: SharedLoad = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The task never reached `finish`, e.g. its runtime shut down.
                    let outcome = Err(LoadError::TaskAborted(e.to_string()));
                    inner.finish(generation, &outcome);
                    outcome
                }
            }
        }
        .boxed()
        .shared();

        state.loaded = false;
        state.in_flight = true;
        state.pending = Some(pending.clone());
        Ok(Some(pending))
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run one fallback sequence and record its outcome.
    ///
    /// Runs in its own task so the state transition happens even if every
    /// caller stops waiting.
    async fn run_attempt(self: Arc<Self>, generation: u64) -> LoadResult<()> {
        let timings = SequenceTimings {
            source_timeout: self.config.source_timeout(),
            settle_delay: self.config.settle_delay(),
        };

        let outcome = AssertUnwindSafe(fallback::run_sequence(
            &self.config.sources,
            self.env.as_ref(),
            self.slot.as_ref(),
            timings,
            &self.events,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(LoadError::TaskAborted("fallback sequence panicked".to_string())))
        .map(|_| ());

        self.finish(generation, &outcome);
        outcome
    }

    fn finish(&self, generation: u64, outcome: &LoadResult<()>) {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!("Discarding outcome of an attempt abandoned by reset");
            return;
        }

        state.in_flight = false;
        match outcome {
            Ok(()) => {
                state.loaded = true;
                tracing::info!("Proving toolkit loaded successfully");
            }
            Err(e) => {
                state.pending = None;
                tracing::error!("Failed to load proving toolkit: {e}");
            }
        }
    }
}
