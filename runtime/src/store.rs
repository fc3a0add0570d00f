//! The Store: the reactive engine of a feature.
//!
//! # Processing model
//!
//! ```text
//!  send() ─┐
//!          ├─▶ action channel ─▶ dispatcher ─▶ Middleware(action, snapshot)
//!  bootstrap ┘                                      │
//!                      ┌────────────────────────────┴──────────────┐
//!                      ▼                                           ▼
//!     first effects ready right now                  rest of the stream, spawned
//!     (reduced inline, in order, bounded)            as a registered pipeline task
//!                      │                                           │
//!                      └──────────────▶ apply(effect) ◀────────────┘
//!                                   (one at a time, under the state lock)
//!                                        │                 │
//!                                 Reducer → states   EventProducer → events
//! ```
//!
//! Every effect, whatever pipeline it comes from, is applied while holding the
//! single state lock, which gives a total order over reducer applications and
//! over the states published to subscribers. Effects of one pipeline keep the
//! order in which the middleware emitted them; effects of different pipelines
//! interleave in completion order.
//!
//! # Failure containment
//!
//! - Middleware failing (an `Err` from `handle`, an `Err` item, or a panic)
//!   ends that one pipeline.
//! - Reducer failing (an `Err` or a panic) skips that one effect; the state is
//!   left unchanged.
//!
//! Both are reported to the [`ErrorHandler`] with the state current at the time
//! of the failure. Nothing reaches the action, state or event ports.

use crate::metrics::StoreMetrics;
use crate::pipeline::{Pipelines, panic_message};
use crate::relay::{PublishRelay, RelayStream, ReplayRelay};
use crate::{StoreConfig, StoreError};
use futures::stream::{BoxStream, StreamExt};
use futures::FutureExt;
use gemini_core::{
    Bootstrapper, Consumer, Disposable, EffectStream, ErrorHandler, EventProducer, Failure,
    LoggingErrorHandler, Middleware, NoBootstrap, NoEvents, Publisher, Reducer, Stage,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Effects reduced in one go before a pipeline gives way to other work.
const EFFECT_BATCH: usize = 32;

/// The Store - state container and effect runner for one feature
///
/// The Store owns:
/// 1. The current state (replaced only by reducer output)
/// 2. The middleware that turns actions into effect streams
/// 3. The reducer that folds effects into state
/// 4. The event producer that derives one-shot view events from effects
/// 5. The output ports: `states()` (replay-latest) and `events()` (no replay)
///
/// `Store` is a cheap handle; clones share the same engine. Dropping the last
/// handle stops the engine, as does [`dispose`](Store::dispose).
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Effect type
/// - `V`: View event type
///
/// # Example
///
/// ```ignore
/// let store = Store::builder(ProfileState::default(), ProfileReducer, ProfileMiddleware::new(api))
///     .event_producer(ProfileEvents)
///     .bootstrapper(InitialActions(vec![ProfileAction::Load]))
///     .build();
///
/// let mut states = store.states();
/// store.send(ProfileAction::Refresh)?;
/// ```
pub struct Store<S, A, E, V> {
    inner: Arc<Inner<S, A, E, V>>,
}

struct Inner<S, A, E, V> {
    config: StoreConfig,
    /// The current state; also the lock that serializes reducer applications
    state: Mutex<S>,
    disposed: AtomicBool,
    reducer: Box<dyn Reducer<S, E>>,
    middleware: Box<dyn Middleware<A, S, E>>,
    event_producer: Box<dyn EventProducer<E, V>>,
    error_handler: Box<dyn ErrorHandler<S>>,
    states: ReplayRelay<S>,
    events: PublishRelay<V>,
    actions: mpsc::UnboundedSender<A>,
    pipelines: Pipelines,
    /// Dispatcher and bootstrap tasks
    tasks: Mutex<Vec<AbortHandle>>,
}

/// Builder for a [`Store`]
///
/// Created by [`Store::builder`]. Event producer, bootstrapper, error handler
/// and configuration are optional.
#[must_use = "a builder does nothing until `build()` is called"]
pub struct StoreBuilder<S, A, E, V> {
    initial_state: S,
    reducer: Box<dyn Reducer<S, E>>,
    middleware: Box<dyn Middleware<A, S, E>>,
    event_producer: Box<dyn EventProducer<E, V>>,
    bootstrapper: Box<dyn Bootstrapper<A>>,
    error_handler: Box<dyn ErrorHandler<S>>,
    config: StoreConfig,
}

impl<S, A, E> Store<S, A, E, ()>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
{
    /// Start building a store from its initial state, reducer and middleware
    ///
    /// The store has no view events until
    /// [`event_producer`](StoreBuilder::event_producer) is set.
    pub fn builder(
        initial_state: S,
        reducer: impl Reducer<S, E> + 'static,
        middleware: impl Middleware<A, S, E> + 'static,
    ) -> StoreBuilder<S, A, E, ()> {
        StoreBuilder {
            initial_state,
            reducer: Box::new(reducer),
            middleware: Box::new(middleware),
            event_producer: Box::new(NoEvents),
            bootstrapper: Box::new(NoBootstrap),
            error_handler: Box::new(LoggingErrorHandler),
            config: StoreConfig::default(),
        }
    }

    /// Create a store with default event producer, bootstrapper, error handler
    /// and configuration
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(
        initial_state: S,
        reducer: impl Reducer<S, E> + 'static,
        middleware: impl Middleware<A, S, E> + 'static,
    ) -> Self {
        Self::builder(initial_state, reducer, middleware).build()
    }
}

impl<S, A, E, V> StoreBuilder<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    /// Derive view events from effects
    pub fn event_producer<W>(
        self,
        event_producer: impl EventProducer<E, W> + 'static,
    ) -> StoreBuilder<S, A, E, W> {
        StoreBuilder {
            initial_state: self.initial_state,
            reducer: self.reducer,
            middleware: self.middleware,
            event_producer: Box::new(event_producer),
            bootstrapper: self.bootstrapper,
            error_handler: self.error_handler,
            config: self.config,
        }
    }

    /// Feed the store initial actions when it starts
    pub fn bootstrapper(mut self, bootstrapper: impl Bootstrapper<A> + 'static) -> Self {
        self.bootstrapper = Box::new(bootstrapper);
        self
    }

    /// Receive contained middleware and reducer failures
    pub fn error_handler(mut self, error_handler: impl ErrorHandler<S> + 'static) -> Self {
        self.error_handler = Box::new(error_handler);
        self
    }

    /// Use a custom configuration
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the store and start it
    ///
    /// Spawns the dispatcher and subscribes the bootstrapper.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn build(self) -> Store<S, A, E, V> {
        let (actions, receiver) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            states: ReplayRelay::new(self.initial_state.clone()),
            state: Mutex::new(self.initial_state),
            config: self.config,
            disposed: AtomicBool::new(false),
            reducer: self.reducer,
            middleware: self.middleware,
            event_producer: self.event_producer,
            error_handler: self.error_handler,
            events: PublishRelay::new(),
            actions,
            pipelines: Pipelines::default(),
            tasks: Mutex::new(Vec::with_capacity(2)),
        });

        let dispatcher = tokio::spawn(dispatch(Arc::downgrade(&inner), receiver));
        let bootstrap = tokio::spawn(bootstrap(
            self.bootstrapper.actions(),
            inner.actions.clone(),
        ));
        inner
            .lock_tasks()
            .extend([dispatcher.abort_handle(), bootstrap.abort_handle()]);

        tracing::debug!(store = %inner.config.name, "Store started");
        Store { inner }
    }
}

/// Consume the action channel, one action at a time, in arrival order.
async fn dispatch<S, A, E, V>(
    store: Weak<Inner<S, A, E, V>>,
    mut actions: mpsc::UnboundedReceiver<A>,
) where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    while let Some(action) = actions.recv().await {
        let Some(inner) = store.upgrade() else {
            break;
        };
        if inner.is_disposed() {
            break;
        }
        inner.process(action);
    }
    tracing::trace!("Dispatcher stopped");
}

/// Merge the bootstrap stream into the action channel.
async fn bootstrap<A>(mut actions: BoxStream<'static, A>, sink: mpsc::UnboundedSender<A>) {
    while let Some(action) = actions.next().await {
        if sink.send(action).is_err() {
            break;
        }
    }
    tracing::trace!("Bootstrap stream completed");
}

/// Drive the asynchronous remainder of one middleware pipeline.
///
/// Yields to the scheduler every [`EFFECT_BATCH`] effects so a stream that is
/// always ready cannot monopolize a worker thread.
async fn drive<S, A, E, V>(
    store: Weak<Inner<S, A, E, V>>,
    mut effects: EffectStream<E>,
    contain_panics: bool,
) where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    for applied in 0_usize.. {
        if applied > 0 && applied % EFFECT_BATCH == 0 {
            tokio::task::yield_now().await;
        }

        let next = if contain_panics {
            match AssertUnwindSafe(effects.next()).catch_unwind().await {
                Ok(next) => next,
                Err(payload) => {
                    if let Some(inner) = store.upgrade() {
                        inner.report(Failure::Panicked {
                            stage: Stage::Middleware,
                            message: panic_message(payload.as_ref()),
                        });
                    }
                    return;
                },
            }
        } else {
            effects.next().await
        };

        let Some(inner) = store.upgrade() else {
            return;
        };
        match next {
            Some(Ok(effect)) => {
                if !inner.apply(effect) {
                    return;
                }
            },
            Some(Err(error)) => {
                inner.report(Failure::Middleware(error));
                return;
            },
            None => return,
        }
    }
}

impl<S, A, E, V> Inner<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Run `f`, turning a panic into a failure when panics are contained.
    fn guard<R>(&self, stage: Stage, f: impl FnOnce() -> R) -> Result<R, Failure> {
        if !self.config.contain_panics {
            return Ok(f());
        }
        panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Failure::Panicked {
            stage,
            message: panic_message(payload.as_ref()),
        })
    }

    /// Handle one action: invoke middleware and start its pipeline.
    #[tracing::instrument(skip_all, name = "store_process", fields(store = %self.config.name))]
    fn process(self: &Arc<Self>, action: A) {
        let snapshot = self.lock_state().clone();

        let handled = self.guard(Stage::Middleware, || {
            self.middleware.handle(action, &snapshot)
        });
        let effects = match handled {
            Ok(Ok(effects)) => effects,
            Ok(Err(error)) => {
                self.report(Failure::Middleware(error));
                return;
            },
            Err(failure) => {
                self.report(failure);
                return;
            },
        };

        self.run(effects);
    }

    /// Reduce up to [`EFFECT_BATCH`] effects the stream has ready now, then
    /// spawn the rest.
    ///
    /// Short synchronous middleware is fully reduced here, before the
    /// dispatcher takes the next action. Longer or endless streams continue
    /// in their own task so later actions are not held up.
    fn run(self: &Arc<Self>, mut effects: EffectStream<E>) {
        for _ in 0..EFFECT_BATCH {
            match self.guard(Stage::Middleware, || effects.next().now_or_never()) {
                Ok(Some(Some(Ok(effect)))) => {
                    if !self.apply(effect) {
                        return;
                    }
                },
                Ok(Some(Some(Err(error)))) => {
                    self.report(Failure::Middleware(error));
                    return;
                },
                Ok(Some(None)) => return,
                Ok(None) => break,
                Err(failure) => {
                    self.report(failure);
                    return;
                },
            }
        }

        let pipeline = drive(Arc::downgrade(self), effects, self.config.contain_panics);
        match self.pipelines.spawn(pipeline) {
            Some(id) => tracing::debug!(pipeline = id, "Middleware pipeline pending"),
            None => tracing::trace!("Store disposed, pipeline dropped"),
        }
    }

    /// Apply one effect under the state lock.
    ///
    /// Returns `false` if the store is disposed and the effect was discarded.
    fn apply(&self, effect: E) -> bool {
        let mut state = self.lock_state();
        if self.is_disposed() {
            return false;
        }

        let started = Instant::now();
        let failure = match self.guard(Stage::Reducer, || self.reducer.reduce(&state, &effect)) {
            Ok(Ok(next)) => {
                StoreMetrics::record_reduce(started.elapsed());
                *state = next;
                self.states.publish(state.clone());
                None
            },
            Ok(Err(error)) => Some(Failure::Reducer(error)),
            Err(failure) => Some(failure),
        };

        if let Some(event) = self.event_producer.produce(&effect) {
            StoreMetrics::record_view_event();
            self.events.publish(event);
        }

        if let Some(failure) = failure {
            let snapshot = state.clone();
            drop(state);
            self.handle_failure(&snapshot, &failure);
        }
        true
    }

    /// Report a failure against the current state.
    fn report(&self, failure: Failure) {
        let snapshot = self.lock_state().clone();
        self.handle_failure(&snapshot, &failure);
    }

    fn handle_failure(&self, state: &S, failure: &Failure) {
        StoreMetrics::record_failure(failure.stage());
        tracing::debug!(
            store = %self.config.name,
            stage = %failure.stage(),
            error = %failure,
            "Pipeline failure contained"
        );
        self.error_handler.handle(state, failure);
    }

    fn abort_tasks(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }

    fn dispose(&self) {
        {
            let _state = self.lock_state();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
        }

        self.abort_tasks();
        let cancelled = self.pipelines.cancel_all();
        self.states.close();
        self.events.close();

        tracing::debug!(store = %self.config.name, cancelled, "Store disposed");
    }
}

impl<S, A, E, V> Drop for Inner<S, A, E, V> {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
        self.pipelines.cancel_all();
    }
}

impl<S, A, E, V> Store<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    /// Submit an action
    ///
    /// Never blocks: the action is queued and processed by the store's
    /// dispatcher in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Disposed`] if the store has been disposed; the
    /// action is dropped.
    pub fn send(&self, action: A) -> Result<(), StoreError> {
        if self.inner.is_disposed() {
            StoreMetrics::record_rejected();
            tracing::warn!(store = %self.inner.config.name, "Rejected action: store is disposed");
            return Err(StoreError::Disposed);
        }

        self.inner.actions.send(action).map_err(|_| {
            StoreMetrics::record_rejected();
            StoreError::Disposed
        })?;
        StoreMetrics::record_action();
        Ok(())
    }

    /// Read the current state via a closure
    ///
    /// ```ignore
    /// let count = store.state(|s| s.items.len());
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.inner.lock_state();
        f(&state)
    }

    /// Clone of the current state
    #[must_use]
    pub fn current_state(&self) -> S {
        self.inner.lock_state().clone()
    }

    /// Subscribe to states
    ///
    /// The stream yields the current state first, then every state the reducer
    /// produces, including ones equal to their predecessor. It ends when the
    /// store is disposed.
    #[must_use]
    pub fn states(&self) -> RelayStream<S> {
        self.inner.states.subscribe()
    }

    /// Subscribe to view events
    ///
    /// Only events emitted while subscribed are delivered. The stream ends when
    /// the store is disposed.
    #[must_use]
    pub fn events(&self) -> RelayStream<V> {
        self.inner.events.subscribe()
    }

    /// The view event port as a [`Publisher`], for use in connection rules
    #[must_use]
    pub fn event_source(&self) -> EventSource<V> {
        EventSource {
            relay: self.inner.events.clone(),
        }
    }

    /// Number of middleware pipelines still running asynchronously
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.pipelines.len()
    }

    /// The store configuration
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Whether the store has been disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Stop the store for good
    ///
    /// Cancels the bootstrapper and every in-flight pipeline, discards effects
    /// not yet applied, rejects further actions and ends the state and event
    /// streams. Once this returns no further state or event is published.
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl<S, A, E, V> Clone for Store<S, A, E, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, E, V> fmt::Debug for Store<S, A, E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .field("in_flight", &self.inner.pipelines.len())
            .finish_non_exhaustive()
    }
}

impl<S, A, E, V> Publisher<S> for Store<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    fn subscribe(&self) -> BoxStream<'static, S> {
        self.states().boxed()
    }
}

impl<S, A, E, V> Consumer<A> for Store<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    fn accept(&self, action: A) {
        // Rejection is already logged by `send`.
        let _ = self.send(action);
    }
}

impl<S, A, E, V> Disposable for Store<S, A, E, V>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
    E: Send + 'static,
    V: Clone + Send + 'static,
{
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

/// The view event port of a store, as a [`Publisher`]
#[derive(Debug)]
pub struct EventSource<V> {
    relay: PublishRelay<V>,
}

impl<V> Clone for EventSource<V> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
        }
    }
}

impl<V: Clone + Send + 'static> Publisher<V> for EventSource<V> {
    fn subscribe(&self) -> BoxStream<'static, V> {
        self.relay.subscribe().boxed()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use futures::stream;
    use gemini_core::effects;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestState {
        value: i32,
    }

    #[derive(Debug)]
    enum TestAction {
        Add(i32),
        AddLater(i32),
        Nothing,
    }

    fn reducer(state: &TestState, effect: &i32) -> anyhow::Result<TestState> {
        Ok(TestState {
            value: state.value + effect,
        })
    }

    fn middleware(action: TestAction, _state: &TestState) -> anyhow::Result<EffectStream<i32>> {
        Ok(match action {
            TestAction::Add(amount) => effects::just(amount),
            TestAction::AddLater(amount) => effects::from_future(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                amount
            }),
            TestAction::Nothing => effects::none(),
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_creation() {
        let store = Store::new(TestState { value: 0 }, reducer, middleware);

        assert_eq!(store.state(|s| s.value), 0);
        assert!(!store.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_action() {
        let store = Store::new(TestState { value: 0 }, reducer, middleware);

        store.send(TestAction::Add(2)).unwrap();
        store.send(TestAction::Nothing).unwrap();
        settle().await;

        assert_eq!(store.current_state(), TestState { value: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_pipeline_is_registered_until_complete() {
        let store = Store::new(TestState { value: 0 }, reducer, middleware);

        store.send(TestAction::AddLater(5)).unwrap();
        settle().await;
        assert_eq!(store.in_flight(), 1);
        assert_eq!(store.state(|s| s.value), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.in_flight(), 0);
        assert_eq!(store.state(|s| s.value), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_after_dispose_is_rejected() {
        let store = Store::new(TestState { value: 0 }, reducer, middleware);

        store.dispose();
        store.dispose();

        assert_eq!(store.send(TestAction::Add(1)), Err(StoreError::Disposed));
        assert!(store.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrapper_feeds_actions() {
        let store = Store::builder(TestState { value: 0 }, reducer, middleware)
            .bootstrapper(|| stream::iter(vec![TestAction::Add(1), TestAction::Add(2)]).boxed())
            .build();
        settle().await;

        assert_eq!(store.state(|s| s.value), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reducer_panic_is_contained() {
        let panicking = |state: &TestState, effect: &i32| -> anyhow::Result<TestState> {
            if *effect < 0 {
                panic!("negative amount");
            }
            Ok(TestState {
                value: state.value + effect,
            })
        };
        let failures = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&failures);

        let store = Store::builder(TestState { value: 0 }, panicking, middleware)
            .error_handler(move |state: &TestState, failure: &Failure| {
                recorded.lock().unwrap().push((state.value, failure.to_string()));
            })
            .build();

        store.send(TestAction::Add(4)).unwrap();
        store.send(TestAction::Add(-1)).unwrap();
        store.send(TestAction::Add(1)).unwrap();
        settle().await;

        assert_eq!(store.state(|s| s.value), 5);
        assert_eq!(
            *failures.lock().unwrap(),
            vec![(4, "Panic in reducer: negative amount".to_string())]
        );
    }
}
