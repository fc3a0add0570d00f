//! Connection rules and the connector that switches them as one unit.
//!
//! A [`ConnectionRule`] bridges one [`Publisher`] to one [`Consumer`] through a
//! stream transformer. It is used in both directions: store states to a view,
//! view actions to a store. A [`Connector`] owns a set of rules and connects or
//! disconnects all of them together, typically driven by a
//! [`Coordinator`](crate::Coordinator).
//!
//! Disconnecting only cancels the bridging subscriptions. Publishers and
//! consumers keep running; a store keeps processing actions while nothing is
//! connected, and because its state port replays the latest value, a
//! reconnected view immediately catches up with the current state.

use crate::metrics::ConnectorMetrics;
use futures::stream::{BoxStream, StreamExt};
use gemini_core::{Consumer, Disposable, Publisher};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// Function applied to a publisher's stream before delivery to the consumer.
pub type Transformer<T, U> =
    Box<dyn Fn(BoxStream<'static, T>) -> BoxStream<'static, U> + Send + Sync>;

/// Anything that can be connected and disconnected.
///
/// Implemented by [`ConnectionRule`] and by [`Connector`] itself, so
/// connectors can be nested.
pub trait Connection: Send + Sync {
    /// Start delivering. No-op if already connected.
    ///
    /// # Panics
    ///
    /// [`ConnectionRule`] and [`Connector`] spawn a forwarding task here and
    /// panic if called outside a tokio runtime.
    fn connect(&self);

    /// Stop delivering. No-op if not connected.
    fn disconnect(&self);

    /// Whether delivery is active.
    fn is_connected(&self) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Subscription {
    active: Arc<AtomicBool>,
    task: AbortHandle,
}

impl Subscription {
    fn cancel(self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
    }
}

/// Declarative wiring of one publisher to one consumer.
///
/// # Example
///
/// ```ignore
/// // store states rendered by the view, mapped to a view model
/// let render = ConnectionRule::map(store.clone(), view.clone(), ViewModel::from);
///
/// // view clicks forwarded to the store as actions
/// let clicks = ConnectionRule::direct(view.clicks(), store.clone()).named("clicks");
/// ```
pub struct ConnectionRule<T, U> {
    name: Option<String>,
    publisher: Box<dyn Publisher<T>>,
    consumer: Arc<dyn Consumer<U>>,
    transformer: Transformer<T, U>,
    subscription: Mutex<Option<Subscription>>,
}

impl<T, U> ConnectionRule<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Bridge `publisher` to `consumer` through `transformer`.
    pub fn new<F>(
        publisher: impl Publisher<T> + 'static,
        consumer: impl Consumer<U> + 'static,
        transformer: F,
    ) -> Self
    where
        F: Fn(BoxStream<'static, T>) -> BoxStream<'static, U> + Send + Sync + 'static,
    {
        Self {
            name: None,
            publisher: Box::new(publisher),
            consumer: Arc::new(consumer),
            transformer: Box::new(transformer),
            subscription: Mutex::new(None),
        }
    }

    /// Bridge `publisher` to `consumer`, converting every value with `f`.
    pub fn map<F>(
        publisher: impl Publisher<T> + 'static,
        consumer: impl Consumer<U> + 'static,
        f: F,
    ) -> Self
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(publisher, consumer, move |stream| {
            let f = Arc::clone(&f);
            stream.map(move |value| f(value)).boxed()
        })
    }

    /// Label used in log lines.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Box the rule for [`Connector::new`].
    #[must_use]
    pub fn boxed(self) -> Box<dyn Connection> {
        Box::new(self)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("rule")
    }
}

impl<T: Send + 'static> ConnectionRule<T, T> {
    /// Bridge `publisher` to `consumer` unchanged.
    pub fn direct(
        publisher: impl Publisher<T> + 'static,
        consumer: impl Consumer<T> + 'static,
    ) -> Self {
        Self::new(publisher, consumer, |stream| stream)
    }
}

async fn forward<U>(
    mut stream: BoxStream<'static, U>,
    consumer: Arc<dyn Consumer<U>>,
    active: Arc<AtomicBool>,
) {
    while let Some(value) = stream.next().await {
        if !active.load(Ordering::Acquire) {
            break;
        }
        consumer.accept(value);
    }
}

impl<T, U> Connection for ConnectionRule<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Subscribe to the publisher and spawn the forwarding task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    fn connect(&self) {
        let mut subscription = lock(&self.subscription);
        if subscription.is_some() {
            return;
        }

        // Subscribe here rather than inside the task so a replaying publisher
        // hands over the value current at connect time.
        let stream = (self.transformer)(self.publisher.subscribe());
        let active = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(forward(
            stream,
            Arc::clone(&self.consumer),
            Arc::clone(&active),
        ));

        *subscription = Some(Subscription {
            active,
            task: task.abort_handle(),
        });
        tracing::trace!(rule = self.label(), "Rule connected");
    }

    fn disconnect(&self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.cancel();
            tracing::trace!(rule = self.label(), "Rule disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.subscription).is_some()
    }
}

impl<T, U> Drop for ConnectionRule<T, U> {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<T, U> fmt::Debug for ConnectionRule<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRule")
            .field("name", &self.name)
            .field("connected", &lock(&self.subscription).is_some())
            .finish_non_exhaustive()
    }
}

/// State of a [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectorState {
    /// No rule is delivering (initial state)
    #[default]
    Disconnected,
    /// Every rule is delivering
    Connected,
    /// Terminal; connect and disconnect are ignored
    Disposed,
}

impl ConnectorState {
    /// Stable lowercase name, used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Disposed => "disposed",
        }
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of connection rules switched together.
///
/// ```text
///               connect()
///  Disconnected ─────────▶ Connected
///       ▲                     │
///       └─────────────────────┘
///             disconnect()
///
///  dispose() from either state ─▶ Disposed (terminal)
/// ```
///
/// Transitions happen under one lock, so concurrent `connect`/`disconnect`
/// calls never leave some rules connected and others not.
pub struct Connector {
    rules: SmallVec<[Box<dyn Connection>; 4]>,
    owned: Vec<Arc<dyn Disposable>>,
    state: Mutex<ConnectorState>,
}

impl Connector {
    /// Create a disconnected connector over `rules`.
    pub fn new(rules: impl IntoIterator<Item = Box<dyn Connection>>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
            owned: Vec::new(),
            state: Mutex::new(ConnectorState::Disconnected),
        }
    }

    /// Register a participant disposed together with the connector.
    #[must_use]
    pub fn owning(mut self, participant: impl Disposable + 'static) -> Self {
        self.owned.push(Arc::new(participant));
        self
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the connector has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        *lock(&self.state)
    }

    /// Connect every rule. Idempotent.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(&self) {
        let mut state = lock(&self.state);
        match *state {
            ConnectorState::Connected => {}
            ConnectorState::Disposed => {
                tracing::warn!("Ignored connect: connector is disposed");
            }
            ConnectorState::Disconnected => {
                for rule in &self.rules {
                    rule.connect();
                }
                *state = ConnectorState::Connected;
                ConnectorMetrics::record_transition(ConnectorState::Connected.as_str());
                tracing::debug!(rules = self.rules.len(), "Connector connected");
            }
        }
    }

    /// Disconnect every rule. Idempotent.
    pub fn disconnect(&self) {
        let mut state = lock(&self.state);
        match *state {
            ConnectorState::Disconnected => {}
            ConnectorState::Disposed => {
                tracing::warn!("Ignored disconnect: connector is disposed");
            }
            ConnectorState::Connected => {
                self.disconnect_rules();
                *state = ConnectorState::Disconnected;
                ConnectorMetrics::record_transition(ConnectorState::Disconnected.as_str());
                tracing::debug!(rules = self.rules.len(), "Connector disconnected");
            }
        }
    }

    /// Disconnect and dispose every owned participant. Terminal and idempotent.
    pub fn dispose(&self) {
        {
            let mut state = lock(&self.state);
            if *state == ConnectorState::Disposed {
                return;
            }
            self.disconnect_rules();
            *state = ConnectorState::Disposed;
        }

        for participant in &self.owned {
            participant.dispose();
        }
        ConnectorMetrics::record_transition(ConnectorState::Disposed.as_str());
        tracing::debug!(owned = self.owned.len(), "Connector disposed");
    }

    fn disconnect_rules(&self) {
        for rule in &self.rules {
            rule.disconnect();
        }
    }
}

impl Connection for Connector {
    fn connect(&self) {
        Self::connect(self);
    }

    fn disconnect(&self) {
        Self::disconnect(self);
    }

    fn is_connected(&self) -> bool {
        self.state() == ConnectorState::Connected
    }
}

impl Disposable for Connector {
    fn dispose(&self) {
        Self::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        self.state() == ConnectorState::Disposed
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("rules", &self.rules.len())
            .field("owned", &self.owned.len())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::relay::{PublishRelay, ReplayRelay};
    use std::time::Duration;

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Consumer<T>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: T| sink.lock().unwrap().push(value))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rule_forwards_while_connected() {
        let relay = PublishRelay::new();
        let (seen, consumer) = recorder();
        let rule = ConnectionRule::direct(relay.clone(), consumer);

        relay.publish(1);
        rule.connect();
        relay.publish(2);
        settle().await;

        rule.disconnect();
        relay.publish(3);
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![2]);
        assert!(!rule.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rule_applies_transformer() {
        let relay = PublishRelay::new();
        let (seen, consumer) = recorder();
        let rule = ConnectionRule::new(relay.clone(), consumer, |stream| {
            stream.filter(|value: &i32| futures::future::ready(value % 2 == 0)).boxed()
        });

        rule.connect();
        for value in 1..=6 {
            relay.publish(value);
        }
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rule_map_converts_values() {
        let relay = ReplayRelay::new(3_u32);
        let (seen, consumer) = recorder();
        let rule = ConnectionRule::map(relay.clone(), consumer, |value: u32| value.to_string());

        rule.connect();
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["3".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connector_transitions() {
        let relay = ReplayRelay::new(0);
        let (seen, consumer) = recorder();
        let connector = Connector::new([ConnectionRule::direct(relay.clone(), consumer).boxed()]);
        assert_eq!(connector.state(), ConnectorState::Disconnected);

        connector.connect();
        connector.connect();
        settle().await;
        assert_eq!(connector.state(), ConnectorState::Connected);

        connector.disconnect();
        connector.disconnect();
        relay.publish(1);
        relay.publish(2);
        settle().await;
        assert_eq!(connector.state(), ConnectorState::Disconnected);

        connector.connect();
        settle().await;

        // Replay on connect; values published while disconnected collapse to the latest
        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_is_terminal() {
        struct Flag(Arc<AtomicBool>);

        impl Disposable for Flag {
            fn dispose(&self) {
                self.0.store(true, Ordering::SeqCst);
            }

            fn is_disposed(&self) -> bool {
                self.0.load(Ordering::SeqCst)
            }
        }

        let disposed = Arc::new(AtomicBool::new(false));
        let relay = PublishRelay::new();
        let (seen, consumer) = recorder();
        let connector = Connector::new([ConnectionRule::direct(relay.clone(), consumer).boxed()])
            .owning(Flag(Arc::clone(&disposed)));

        connector.connect();
        connector.dispose();
        connector.dispose();
        connector.connect();
        relay.publish(1);
        settle().await;

        assert_eq!(connector.state(), ConnectorState::Disposed);
        assert!(disposed.load(Ordering::SeqCst));
        assert!(seen.lock().unwrap().is_empty());
    }
}
