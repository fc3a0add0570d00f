//! The middleware contract and effect stream constructors.
//!
//! Middleware is where side effects live. For every action it returns a lazy
//! stream of effects which may be empty, synchronous, delayed, or endless.

use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;

/// A lazy stream of effects produced for one action.
///
/// An `Err` item terminates the pipeline it belongs to and is reported to the
/// store's error handler. Items already emitted stay applied.
pub type EffectStream<E> = BoxStream<'static, anyhow::Result<E>>;

/// Turns an action into a stream of effects: `(Action, State) → Stream<Effect>`.
///
/// The store invokes `handle` exactly once per action. The state passed in is a
/// snapshot taken at dispatch time; a newer state may exist by the time any
/// effect is emitted, so implementations must not rely on it staying current.
///
/// # Example
///
/// ```
/// use gemini_core::middleware::{effects, EffectStream, Middleware};
///
/// enum Action { Load, Ignore }
/// enum Effect { Loaded(u32) }
///
/// struct Loader;
///
/// impl Middleware<Action, (), Effect> for Loader {
///     fn handle(&self, action: Action, _state: &()) -> anyhow::Result<EffectStream<Effect>> {
///         Ok(match action {
///             Action::Load => effects::from_future(async { Effect::Loaded(42) }),
///             Action::Ignore => effects::none(),
///         })
///     }
/// }
/// ```
pub trait Middleware<A, S, E>: Send + Sync {
    /// Produce the effect stream for `action`.
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be handled at all. The store
    /// reports it and treats the action as having produced no effects.
    fn handle(&self, action: A, state: &S) -> anyhow::Result<EffectStream<E>>;
}

impl<A, S, E, F> Middleware<A, S, E> for F
where
    F: Fn(A, &S) -> anyhow::Result<EffectStream<E>> + Send + Sync,
{
    fn handle(&self, action: A, state: &S) -> anyhow::Result<EffectStream<E>> {
        self(action, state)
    }
}

/// Constructors for [`EffectStream`]s.
pub mod effects {
    use super::{BoxStream, EffectStream, Future, StreamExt, stream};

    /// No effects; the action is ignored.
    #[must_use]
    pub fn none<E: Send + 'static>() -> EffectStream<E> {
        stream::empty().boxed()
    }

    /// A single effect, available immediately.
    #[must_use]
    pub fn just<E: Send + 'static>(effect: E) -> EffectStream<E> {
        stream::once(async move { Ok(effect) }).boxed()
    }

    /// Several effects, available immediately and emitted in order.
    #[must_use]
    pub fn from_iter<E, I>(effects: I) -> EffectStream<E>
    where
        E: Send + 'static,
        I: IntoIterator<Item = E>,
        I::IntoIter: Send + 'static,
    {
        stream::iter(effects.into_iter().map(Ok)).boxed()
    }

    /// A single effect produced by an asynchronous computation.
    #[must_use]
    pub fn from_future<E, F>(future: F) -> EffectStream<E>
    where
        E: Send + 'static,
        F: Future<Output = E> + Send + 'static,
    {
        stream::once(async move { Ok(future.await) }).boxed()
    }

    /// Wrap an infallible stream of effects.
    #[must_use]
    pub fn from_stream<E: Send + 'static>(effects: BoxStream<'static, E>) -> EffectStream<E> {
        effects.map(Ok).boxed()
    }

    /// A pipeline that fails before emitting anything.
    #[must_use]
    pub fn failed<E: Send + 'static>(error: impl Into<anyhow::Error>) -> EffectStream<E> {
        let error = error.into();
        stream::once(async move { Err(error) }).boxed()
    }
}
