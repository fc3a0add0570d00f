//! # Gemini Testing
//!
//! Testing utilities and helpers for the Gemini architecture.
//!
//! This crate provides:
//! - A complete test feature (state, actions, effects, reducer, middleware)
//! - Recording mocks for error handlers and consumers, and a manual bootstrapper
//! - A Given-When-Then harness for reducers
//! - Helpers for driving stores under paused tokio time
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use gemini_testing::{TestAction, settle, test_store_builder};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_instant_action() {
//!     let store = test_store_builder().build();
//!     store.send(TestAction::FulfillableInstantly).unwrap();
//!     settle().await;
//!
//!     assert_eq!(store.state(|s| s.counter), 11);
//! }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod reducer_test;

/// Helpers for driving stores in tests
pub mod helpers {
    use futures::FutureExt;
    use futures::stream::{Stream, StreamExt};
    use std::time::Duration;

    /// Let every task that can make progress do so.
    ///
    /// Under `#[tokio::test(start_paused = true)]` the runtime only advances
    /// the clock once all tasks are idle, so after this returns every ready
    /// task has run and no timer further than 1 ms away has fired.
    pub async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Every item `stream` has ready right now, without waiting.
    pub fn drain<St>(stream: &mut St) -> Vec<St::Item>
    where
        St: Stream + Unpin,
    {
        let mut items = Vec::new();
        while let Some(Some(item)) = stream.next().now_or_never() {
            items.push(item);
        }
        items
    }

    /// Install a fmt subscriber filtered by `RUST_LOG`, once per process.
    ///
    /// Later calls are ignored, so every test may call it.
    pub fn init_tracing() {
        use tracing_subscriber::EnvFilter;

        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use crate::fixtures::TestAction;
    use proptest::prelude::*;

    /// Actions whose middleware completes synchronously and never fails.
    pub fn sync_action() -> impl Strategy<Value = TestAction> {
        prop_oneof![
            Just(TestAction::Unfulfillable),
            Just(TestAction::FulfillableInstantly),
            Just(TestAction::TranslatesTo3Effects),
            Just(TestAction::MaybeFulfillable),
            Just(TestAction::ActionForEvent),
        ]
    }

    /// Short asynchronous actions, delays in milliseconds.
    pub fn async_action() -> impl Strategy<Value = TestAction> {
        (1_u64..50).prop_map(|delay_ms| TestAction::FulfillableAsync { delay_ms })
    }
}

// Re-export commonly used items
pub use fixtures::{
    CONDITIONAL_MULTIPLIER, DELAYED_FULFILL_AMOUNT, INITIAL_COUNTER, INITIAL_LOADING, IllegalState,
    TestAction, TestEffect, TestEventProducer, TestMiddleware, TestReducer, TestState, TestStore,
    TestViewEvent, test_store_builder,
};
pub use helpers::{drain, init_tracing, settle};
pub use mocks::{FailureRecord, ManualBootstrapper, RecordingConsumer, RecordingErrorHandler};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    #[test]
    fn test_drain_stops_at_pending() {
        let mut ready = stream::iter([1, 2, 3]);
        assert_eq!(drain(&mut ready), vec![1, 2, 3]);

        let mut pending = stream::iter([4]).chain(stream::pending());
        assert_eq!(drain(&mut pending), vec![4]);
    }

    #[test]
    fn test_init_tracing_is_reentrant() {
        init_tracing();
        init_tracing();
    }
}
