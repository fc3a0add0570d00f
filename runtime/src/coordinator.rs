//! Lifecycle-driven connector coordination.
//!
//! ```text
//!  lifecycle events ─▶ LifecycleStrategy ─▶ StoreLifecycle ─▶ Coordinator ─▶ Connector
//!  (owner adapter)      (pure mapping)      (dedup sink)      (Start/Stop)   (connect/disconnect)
//! ```
//!
//! [`LifecycleObserver`] bundles the three runtime pieces for one owner.

use crate::connector::Connector;
use crate::relay::ReplayRelay;
use futures::stream::{BoxStream, Stream, StreamExt};
use gemini_core::{ControlEvent, LifecycleEvent, LifecycleStrategy, Publisher};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// Control sink of a store-view pair.
///
/// Holds the last posted [`ControlEvent`] and suppresses consecutive
/// duplicates, so posting `Start` twice in a row connects once. Subscribers
/// receive the last posted event first.
#[derive(Debug, Clone)]
pub struct StoreLifecycle {
    relay: ReplayRelay<Option<ControlEvent>>,
}

impl Default for StoreLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreLifecycle {
    /// Create a sink with no event posted yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            relay: ReplayRelay::new(None),
        }
    }

    /// Post a control event.
    ///
    /// Returns `false` if it repeats the last posted event (or the sink is
    /// closed) and was dropped.
    pub fn post(&self, event: ControlEvent) -> bool {
        let posted = self.relay.publish_distinct(Some(event));
        if !posted {
            tracing::trace!(%event, "Duplicate control event suppressed");
        }
        posted
    }

    /// The last posted event.
    #[must_use]
    pub fn current(&self) -> Option<ControlEvent> {
        self.relay.value()
    }

    /// End every subscription.
    pub fn close(&self) {
        self.relay.close();
    }
}

impl Publisher<ControlEvent> for StoreLifecycle {
    fn subscribe(&self) -> BoxStream<'static, ControlEvent> {
        self.relay
            .subscribe()
            .filter_map(futures::future::ready)
            .boxed()
    }
}

/// Connects and disconnects a [`Connector`] from a stream of control events.
///
/// `Start` connects, `Stop` disconnects. Nothing happens until
/// [`start`](Self::start) subscribes to the control events; dropping the
/// coordinator stops it.
pub struct Coordinator {
    lifecycle: Box<dyn Publisher<ControlEvent>>,
    connector: Arc<Connector>,
    task: Mutex<Option<AbortHandle>>,
}

impl Coordinator {
    /// Create a stopped coordinator.
    ///
    /// Control events are not followed until [`start`](Self::start) is
    /// called. [`LifecycleObserver::new`] starts its coordinator itself.
    pub fn new(
        lifecycle: impl Publisher<ControlEvent> + 'static,
        connector: Arc<Connector>,
    ) -> Self {
        Self {
            lifecycle: Box::new(lifecycle),
            connector,
            task: Mutex::new(None),
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start following control events. No-op if already started.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) {
        let mut task = self.lock_task();
        if task.is_some() {
            return;
        }

        let mut events = self.lifecycle.subscribe();
        let connector = Arc::clone(&self.connector);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                tracing::debug!(%event, "Control event");
                match event {
                    ControlEvent::Start => connector.connect(),
                    ControlEvent::Stop => connector.disconnect(),
                }
            }
        });
        *task = Some(handle.abort_handle());
    }

    /// Stop following control events. The connector keeps its current state.
    pub fn stop(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }

    /// Whether [`start`](Self::start) was called and not stopped since.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_task().is_some()
    }

    /// The coordinated connector.
    #[must_use]
    pub const fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("connector", &self.connector)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Binds a connector to the lifecycle of one owner.
///
/// The platform adapter feeds abstract lifecycle events in through
/// [`on_event`](Self::on_event) or [`observe`](Self::observe), and calls
/// [`finish`](Self::finish) once the owner is destroyed for good.
///
/// # Example
///
/// ```ignore
/// let observer = LifecycleObserver::new(Arc::new(connector), ResumePauseStrategy);
///
/// observer.on_event(&screen, LifecycleEvent::Resume); // connects
/// observer.on_event(&screen, LifecycleEvent::Pause);  // disconnects
/// observer.finish();                                  // disposes the connector
/// ```
pub struct LifecycleObserver<O: ?Sized> {
    strategy: Box<dyn LifecycleStrategy<O>>,
    lifecycle: StoreLifecycle,
    coordinator: Coordinator,
}

impl<O: ?Sized> LifecycleObserver<O> {
    /// Create an observer with a started coordinator.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(connector: Arc<Connector>, strategy: impl LifecycleStrategy<O> + 'static) -> Self {
        let lifecycle = StoreLifecycle::new();
        let coordinator = Coordinator::new(lifecycle.clone(), connector);
        coordinator.start();

        Self {
            strategy: Box::new(strategy),
            lifecycle,
            coordinator,
        }
    }

    /// Apply the strategy to one lifecycle event and post the result.
    ///
    /// Returns the control event the strategy produced, if any.
    pub fn on_event(&self, owner: &O, event: LifecycleEvent) -> Option<ControlEvent> {
        let control = self.strategy.handle(owner, event)?;
        tracing::trace!(?event, %control, "Lifecycle event mapped");
        self.lifecycle.post(control);
        Some(control)
    }

    /// Feed every event of `events` to [`on_event`](Self::on_event) until the
    /// stream ends.
    pub async fn observe<St>(&self, owner: &O, events: St)
    where
        St: Stream<Item = LifecycleEvent>,
    {
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            self.on_event(owner, event);
        }
    }

    /// The owner is gone for good: stop coordinating and dispose the connector.
    pub fn finish(&self) {
        self.coordinator.stop();
        self.lifecycle.close();
        self.coordinator.connector().dispose();
    }

    /// The control sink.
    #[must_use]
    pub const fn lifecycle(&self) -> &StoreLifecycle {
        &self.lifecycle
    }

    /// The coordinated connector.
    #[must_use]
    pub const fn connector(&self) -> &Arc<Connector> {
        self.coordinator.connector()
    }
}

impl<O: ?Sized> fmt::Debug for LifecycleObserver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleObserver")
            .field("lifecycle", &self.lifecycle.current())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
