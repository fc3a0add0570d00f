//! Endpoints that connection rules bridge between.
//!
//! A store publishes states and view events and consumes actions; a view does
//! the reverse. Both sides are described by the same two traits so a single
//! rule type can wire either direction.

use futures::stream::BoxStream;

/// Source of a hot stream of values.
///
/// Every call to [`subscribe`](Publisher::subscribe) starts an independent
/// subscription. Dropping the returned stream cancels it.
pub trait Publisher<T>: Send + Sync {
    /// Start a new subscription.
    fn subscribe(&self) -> BoxStream<'static, T>;
}

impl<T, F> Publisher<T> for F
where
    F: Fn() -> BoxStream<'static, T> + Send + Sync,
{
    fn subscribe(&self) -> BoxStream<'static, T> {
        self()
    }
}

/// Receiver of values, e.g. a view rendering states or a store taking actions.
pub trait Consumer<T>: Send + Sync {
    /// Deliver one value. Must not block.
    fn accept(&self, value: T);
}

impl<T, F> Consumer<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn accept(&self, value: T) {
        self(value);
    }
}

/// Something with an explicit, terminal end of life.
pub trait Disposable: Send + Sync {
    /// Release everything held. Idempotent.
    fn dispose(&self);

    /// Whether [`dispose`](Disposable::dispose) has been called.
    fn is_disposed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::stream::{self, StreamExt};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_closure_publisher_starts_independent_subscriptions() {
        let publisher = || stream::iter([1, 2]).boxed();

        let first: Vec<i32> = publisher.subscribe().collect().await;
        let second: Vec<i32> = publisher.subscribe().collect().await;

        assert_eq!(first, second);
    }

    #[test]
    fn test_closure_consumer() {
        let seen = Mutex::new(Vec::new());
        let consumer = |value: &'static str| seen.lock().unwrap().push(value);

        consumer.accept("a");
        consumer.accept("b");

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }
}
