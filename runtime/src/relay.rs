//! Multicast relays backing the store's output ports.
//!
//! - [`ReplayRelay`]: hot, replay-latest. A new subscriber first receives the
//!   current value, then every value published afterwards. Used for states.
//! - [`PublishRelay`]: hot, no replay. A subscriber only sees values published
//!   while it is subscribed. Used for view events.
//!
//! Both relays hold the set of listeners under a mutex and hand each listener
//! its own unbounded channel, so publishing never blocks and every listener
//! observes the same sequence of values. Listeners whose stream was dropped
//! are pruned on the next publish.

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{BoxStream, Stream, StreamExt};
use gemini_core::Publisher;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

/// Subscription to a relay.
///
/// Ends when the relay is closed, after every value already queued for this
/// subscriber has been yielded. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RelayStream<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> RelayStream<T> {
    fn terminated() -> Self {
        let (_, receiver) = mpsc::unbounded();
        Self { receiver }
    }
}

impl<T> Stream for RelayStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.receiver.size_hint()
    }
}

#[derive(Debug)]
struct Listeners<T> {
    senders: Vec<UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Listeners<T> {
    const fn new() -> Self {
        Self {
            senders: Vec::new(),
            closed: false,
        }
    }

    fn register(&mut self, first: Option<T>) -> RelayStream<T> {
        if self.closed {
            return RelayStream::terminated();
        }

        let (sender, receiver) = mpsc::unbounded();
        if let Some(value) = first {
            // The receiver is alive here, so this cannot fail.
            let _ = sender.unbounded_send(value);
        }
        self.senders.push(sender);
        RelayStream { receiver }
    }

    fn broadcast(&mut self, value: &T) {
        self.senders
            .retain(|sender| sender.unbounded_send(value.clone()).is_ok());
    }

    fn close(&mut self) {
        self.closed = true;
        self.senders.clear();
    }

    fn live(&self) -> usize {
        self.senders.iter().filter(|sender| !sender.is_closed()).count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct ReplayShared<T> {
    latest: T,
    listeners: Listeners<T>,
}

/// Hot, multicast, replay-latest relay.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use futures::FutureExt;
/// use gemini_runtime::ReplayRelay;
///
/// let relay = ReplayRelay::new(1);
/// relay.publish(2);
///
/// let mut late = relay.subscribe();
/// assert_eq!(late.next().now_or_never(), Some(Some(2)));
/// ```
#[derive(Debug)]
pub struct ReplayRelay<T> {
    shared: Arc<Mutex<ReplayShared<T>>>,
}

impl<T> Clone for ReplayRelay<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> ReplayRelay<T> {
    /// Create a relay holding `initial` as its latest value.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ReplayShared {
                latest: initial,
                listeners: Listeners::new(),
            })),
        }
    }

    /// The latest value.
    #[must_use]
    pub fn value(&self) -> T {
        lock(&self.shared).latest.clone()
    }

    /// Subscribe; the latest value is queued before anything published later.
    #[must_use]
    pub fn subscribe(&self) -> RelayStream<T> {
        let mut shared = lock(&self.shared);
        let first = shared.latest.clone();
        shared.listeners.register(Some(first))
    }

    /// Make `value` the latest and deliver it to every subscriber.
    ///
    /// Ignored once the relay is closed.
    pub fn publish(&self, value: T) {
        let mut shared = lock(&self.shared);
        if shared.listeners.closed {
            return;
        }
        shared.listeners.broadcast(&value);
        shared.latest = value;
    }

    /// Publish `value` only if it differs from the latest value.
    ///
    /// Returns whether the value was published.
    pub fn publish_distinct(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let mut shared = lock(&self.shared);
        if shared.listeners.closed || shared.latest == value {
            return false;
        }
        shared.listeners.broadcast(&value);
        shared.latest = value;
        true
    }

    /// End every subscription and stop accepting values. Idempotent.
    pub fn close(&self) {
        lock(&self.shared).listeners.close();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).listeners.closed
    }

    /// Number of subscriptions still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared).listeners.live()
    }
}

impl<T: Clone + Send + 'static> Publisher<T> for ReplayRelay<T> {
    fn subscribe(&self) -> BoxStream<'static, T> {
        ReplayRelay::subscribe(self).boxed()
    }
}

/// Hot, multicast relay without replay.
///
/// Values published while nobody is subscribed are lost.
#[derive(Debug)]
pub struct PublishRelay<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T> Clone for PublishRelay<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T: Clone> Default for PublishRelay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> PublishRelay<T> {
    /// Create a relay with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners::new())),
        }
    }

    /// Subscribe to values published from now on.
    #[must_use]
    pub fn subscribe(&self) -> RelayStream<T> {
        lock(&self.listeners).register(None)
    }

    /// Deliver `value` to every current subscriber.
    pub fn publish(&self, value: T) {
        let mut listeners = lock(&self.listeners);
        if !listeners.closed {
            listeners.broadcast(&value);
        }
    }

    /// End every subscription and stop accepting values. Idempotent.
    pub fn close(&self) {
        lock(&self.listeners).close();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.listeners).closed
    }

    /// Number of subscriptions still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).live()
    }
}

impl<T: Clone + Send + 'static> Publisher<T> for PublishRelay<T> {
    fn subscribe(&self) -> BoxStream<'static, T> {
        PublishRelay::subscribe(self).boxed()
    }
}
