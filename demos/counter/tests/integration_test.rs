//! Integration tests for the counter demo

#![allow(clippy::unwrap_used)] // Tests can unwrap

use counter::{
    CounterAction, CounterError, CounterEvent, CounterState, CounterView, MAX_COUNT, counter_store,
};
use gemini_core::{LifecycleEvent, ResumePauseStrategy};
use gemini_runtime::{ConnectorState, LifecycleObserver};
use gemini_testing::{RecordingErrorHandler, drain, settle};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_delayed_increment() {
    let store = counter_store().build();
    let mut events = store.events();

    store
        .send(CounterAction::IncrementLater {
            delay: Duration::from_millis(50),
        })
        .unwrap();
    settle().await;
    assert!(store.state(|s| s.loading));
    assert_eq!(store.in_flight(), 1);

    tokio::time::advance(Duration::from_millis(50)).await;
    settle().await;

    assert_eq!(
        store.current_state(),
        CounterState {
            count: 1,
            loading: false
        }
    );
    assert_eq!(drain(&mut events), vec![CounterEvent::Arrived(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_decrement_keeps_store_running() {
    let errors = RecordingErrorHandler::new().watching::<CounterError>();
    let store = counter_store().error_handler(errors.clone()).build();

    store.send(CounterAction::Decrement).unwrap();
    store.send(CounterAction::Increment).unwrap();
    settle().await;

    assert_eq!(errors.count(), 1);
    assert!(errors.last().unwrap().matched);
    assert_eq!(store.state(|s| s.count), 1);
}

#[tokio::test(start_paused = true)]
async fn test_view_follows_lifecycle() {
    let store = counter_store().build();
    let view = CounterView::new();
    let observer = LifecycleObserver::new(Arc::new(view.connector(&store)), ResumePauseStrategy);

    observer.on_event(&view, LifecycleEvent::Resume);
    settle().await;
    view.click(CounterAction::Increment);
    view.click(CounterAction::Increment);
    settle().await;
    assert_eq!(view.lines(), vec!["count = 0", "count = 1", "count = 2"]);

    observer.on_event(&view, LifecycleEvent::Pause);
    settle().await;
    view.click(CounterAction::Reset);
    settle().await;
    assert_eq!(store.state(|s| s.count), 2);

    observer.on_event(&view, LifecycleEvent::Resume);
    settle().await;
    view.click(CounterAction::Reset);
    settle().await;

    // Replayed state first; the reset's state and toast travel on separate rules
    let mut lines = view.lines().split_off(3);
    assert_eq!(lines.remove(0), "count = 2");
    lines.sort();
    assert_eq!(lines, vec!["count = 0", "toast: counter cleared"]);

    observer.finish();
    assert_eq!(observer.connector().state(), ConnectorState::Disposed);
    assert!(store.is_disposed());
}

proptest! {
    #[test]
    fn prop_count_stays_in_range(
        actions in prop::collection::vec(
            prop_oneof![
                Just(CounterAction::Increment),
                Just(CounterAction::Decrement),
                Just(CounterAction::Reset),
            ],
            0..200,
        ),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let count = runtime.block_on(async {
            let store = counter_store()
                .error_handler(|_: &CounterState, _: &gemini_core::Failure| {})
                .build();
            for action in actions {
                store.send(action).unwrap();
            }
            settle().await;
            store.state(|s| s.count)
        });

        prop_assert!((0..=MAX_COUNT).contains(&count));
    }
}
