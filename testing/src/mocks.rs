//! Recording and manually driven stand-ins for store collaborators.

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{self, BoxStream, StreamExt};
use gemini_core::{Bootstrapper, Consumer, ErrorHandler, Failure, Stage};
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Watch = (&'static str, fn(&Failure) -> bool);

/// One failure seen by a [`RecordingErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord<S> {
    /// State passed to the handler
    pub state: S,
    /// Stage the failure was contained at
    pub stage: Stage,
    /// Display text of the failure
    pub message: String,
    /// Whether the failure was a panic
    pub panicked: bool,
    matched: Vec<&'static str>,
}

impl<S> FailureRecord<S> {
    /// Whether the underlying error downcasts to `T`.
    ///
    /// Only types registered with [`RecordingErrorHandler::watching`] are
    /// known; anything else answers `false`.
    #[must_use]
    pub fn is<T: ?Sized>(&self) -> bool {
        self.matched.contains(&type_name::<T>())
    }
}

/// Error handler that records every failure it receives.
///
/// Clones share the same record, so a test keeps one clone and hands the
/// other to the store.
///
/// # Example
///
/// ```
/// use gemini_core::{ErrorHandler, Failure};
/// use gemini_testing::RecordingErrorHandler;
/// use std::io;
///
/// let handler = RecordingErrorHandler::new().watching::<io::Error>();
/// let failure = Failure::Middleware(io::Error::other("offline").into());
/// handler.handle(&7, &failure);
///
/// let record = handler.last().unwrap();
/// assert_eq!(record.state, 7);
/// assert!(record.is::<io::Error>());
/// ```
pub struct RecordingErrorHandler<S> {
    records: Arc<Mutex<Vec<FailureRecord<S>>>>,
    watches: Vec<Watch>,
}

impl<S> RecordingErrorHandler<S> {
    /// Create a handler with no records.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            watches: Vec::new(),
        }
    }

    /// Also record whether each failure's error is a `T`.
    #[must_use]
    pub fn watching<T>(mut self) -> Self
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        let matches: fn(&Failure) -> bool = |failure| failure.downcast_ref::<T>().is_some();
        self.watches.push((type_name::<T>(), matches));
        self
    }

    /// Number of failures recorded.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.records).len()
    }

    /// The most recent failure.
    #[must_use]
    pub fn last(&self) -> Option<FailureRecord<S>>
    where
        S: Clone,
    {
        lock(&self.records).last().cloned()
    }

    /// Every failure, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<FailureRecord<S>>
    where
        S: Clone,
    {
        lock(&self.records).clone()
    }
}

impl<S> Default for RecordingErrorHandler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for RecordingErrorHandler<S> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            watches: self.watches.clone(),
        }
    }
}

impl<S: Clone + Send> ErrorHandler<S> for RecordingErrorHandler<S> {
    fn handle(&self, state: &S, failure: &Failure) {
        let matched = self
            .watches
            .iter()
            .filter(|(_, matches)| matches(failure))
            .map(|(name, _)| *name)
            .collect();

        lock(&self.records).push(FailureRecord {
            state: state.clone(),
            stage: failure.stage(),
            message: failure.to_string(),
            panicked: failure.is_panic(),
            matched,
        });
    }
}

/// Consumer that records every value, standing in for a view.
#[derive(Debug)]
pub struct RecordingConsumer<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> RecordingConsumer<T> {
    /// Create a consumer with no values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of values received.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    /// Whether nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    /// Every value received, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        lock(&self.values).clone()
    }

    /// The most recent value.
    #[must_use]
    pub fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        lock(&self.values).last().cloned()
    }

    /// Forget every value received so far.
    pub fn clear(&self) {
        lock(&self.values).clear();
    }
}

impl<T> Default for RecordingConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RecordingConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<T: Send> Consumer<T> for RecordingConsumer<T> {
    fn accept(&self, value: T) {
        lock(&self.values).push(value);
    }
}

/// Bootstrapper whose actions are emitted by the test.
///
/// Emitted actions are buffered until the store subscribes. Only the first
/// call to `actions()` receives them; later calls get an empty stream.
pub struct ManualBootstrapper<A> {
    sender: UnboundedSender<A>,
    receiver: Arc<Mutex<Option<UnboundedReceiver<A>>>>,
}

impl<A> ManualBootstrapper<A> {
    /// Create a bootstrapper with nothing emitted yet.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    /// Emit one action. Returns `false` once the store dropped the stream.
    pub fn emit(&self, action: A) -> bool {
        self.sender.unbounded_send(action).is_ok()
    }

    /// End the action stream.
    pub fn complete(&self) {
        self.sender.close_channel();
    }
}

impl<A> Default for ManualBootstrapper<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for ManualBootstrapper<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<A: Send + 'static> Bootstrapper<A> for ManualBootstrapper<A> {
    fn actions(&self) -> BoxStream<'static, A> {
        match lock(&self.receiver).take() {
            Some(receiver) => receiver.boxed(),
            None => stream::empty().boxed(),
        }
    }
}
