//! Initial action sources.

use futures::stream::{self, BoxStream, StreamExt};

/// Produces the actions a store feeds itself when it starts.
///
/// The store calls [`actions`](Bootstrapper::actions) exactly once, at
/// construction, and merges the resulting stream into the same pipeline as
/// actions submitted by consumers. The stream may be infinite; it is dropped
/// when the store is disposed.
pub trait Bootstrapper<A>: Send + Sync {
    /// The stream of bootstrap actions.
    fn actions(&self) -> BoxStream<'static, A>;
}

impl<A, F> Bootstrapper<A> for F
where
    F: Fn() -> BoxStream<'static, A> + Send + Sync,
{
    fn actions(&self) -> BoxStream<'static, A> {
        self()
    }
}

/// Bootstrapper that emits nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBootstrap;

impl<A: Send + 'static> Bootstrapper<A> for NoBootstrap {
    fn actions(&self) -> BoxStream<'static, A> {
        stream::empty().boxed()
    }
}

/// Bootstrapper that emits a fixed list of actions, e.g. an initial load.
#[derive(Debug, Clone)]
pub struct InitialActions<A>(pub Vec<A>);

impl<A: Clone + Send + Sync + 'static> Bootstrapper<A> for InitialActions<A> {
    fn actions(&self) -> BoxStream<'static, A> {
        stream::iter(self.0.clone()).boxed()
    }
}
