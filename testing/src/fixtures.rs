//! A small, complete feature used to exercise stores in tests.
//!
//! | Action                          | Effects                                                |
//! |---------------------------------|--------------------------------------------------------|
//! | `Unfulfillable`                 | none                                                   |
//! | `FulfillableInstantly`          | `InstantEffect(1)`                                     |
//! | `FulfillableAsync { delay_ms }` | `StartedAsync`, then `FinishedAsync(5)` after the delay |
//! | `TranslatesTo3Effects`          | `MultipleEffect1..3`                                   |
//! | `MaybeFulfillable`              | `ConditionalThingHappened(10)` if `counter % 3 == 0`   |
//! | `ActionForEvent`                | `EffectForEvent` (emits `SimpleEvent`)                 |
//! | `LeadsToExceptionInMiddleware`  | middleware fails with an `io::Error`                   |
//! | `TranslatesToExceptionInReducer`| `ExceptionInReducer`, rejected by the reducer          |

use futures::StreamExt;
use gemini_core::{EffectStream, EventProducer, Middleware, Reducer, effects};
use gemini_runtime::{Store, StoreBuilder};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Counter of a fresh [`TestState`].
pub const INITIAL_COUNTER: i32 = 10;

/// Loading flag of a fresh [`TestState`].
pub const INITIAL_LOADING: bool = false;

/// Amount added by `FinishedAsync`.
pub const DELAYED_FULFILL_AMOUNT: i32 = 5;

/// Multiplier carried by `ConditionalThingHappened`.
pub const CONDITIONAL_MULTIPLIER: i32 = 10;

/// State of the test feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestState {
    /// Never changes; lets tests tell states apart from defaults
    pub id: u64,
    /// The counter
    pub counter: i32,
    /// Whether an async action is pending
    pub loading: bool,
}

impl Default for TestState {
    fn default() -> Self {
        Self {
            id: 1,
            counter: INITIAL_COUNTER,
            loading: INITIAL_LOADING,
        }
    }
}

/// Actions of the test feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestAction {
    /// Maps to no effect
    Unfulfillable,
    /// Maps synchronously to one effect
    FulfillableInstantly,
    /// Starts loading, finishes after `delay_ms`
    FulfillableAsync {
        /// Delay before the second effect
        delay_ms: u64,
    },
    /// Maps synchronously to three effects
    TranslatesTo3Effects,
    /// Maps to one effect only when the counter is divisible by three
    MaybeFulfillable,
    /// Maps to an effect that produces a view event
    ActionForEvent,
    /// Middleware fails before producing anything
    LeadsToExceptionInMiddleware,
    /// Maps to an effect the reducer rejects
    TranslatesToExceptionInReducer,
}

/// Effects of the test feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestEffect {
    /// Adds `amount` to the counter
    InstantEffect(i32),
    /// Sets loading
    StartedAsync,
    /// Adds `amount` and clears loading
    FinishedAsync(i32),
    /// Adds one
    MultipleEffect1,
    /// Adds one
    MultipleEffect2,
    /// Adds one
    MultipleEffect3,
    /// Multiplies the counter
    ConditionalThingHappened(i32),
    /// Leaves the state as is and produces `SimpleEvent`
    EffectForEvent,
    /// Rejected by the reducer
    ExceptionInReducer,
}

/// View events of the test feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestViewEvent {
    /// Produced by `EffectForEvent`
    SimpleEvent,
}

/// Error raised by [`TestReducer`] for `ExceptionInReducer`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal state: {0}")]
pub struct IllegalState(pub String);

/// Reducer of the test feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestReducer;

impl Reducer<TestState, TestEffect> for TestReducer {
    fn reduce(&self, state: &TestState, effect: &TestEffect) -> anyhow::Result<TestState> {
        let next = match effect {
            TestEffect::InstantEffect(amount) => TestState {
                counter: state.counter + amount,
                ..state.clone()
            },
            TestEffect::StartedAsync => TestState {
                loading: true,
                ..state.clone()
            },
            TestEffect::FinishedAsync(amount) => TestState {
                counter: state.counter + amount,
                loading: false,
                ..state.clone()
            },
            TestEffect::MultipleEffect1
            | TestEffect::MultipleEffect2
            | TestEffect::MultipleEffect3 => TestState {
                counter: state.counter + 1,
                ..state.clone()
            },
            TestEffect::ConditionalThingHappened(multiplier) => TestState {
                counter: state.counter * multiplier,
                ..state.clone()
            },
            TestEffect::EffectForEvent => state.clone(),
            TestEffect::ExceptionInReducer => {
                return Err(IllegalState("effect cannot be reduced".to_string()).into());
            },
        };
        Ok(next)
    }
}

/// Middleware of the test feature.
///
/// Asynchronous work waits on tokio timers, so tests drive it with paused time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestMiddleware;

impl Middleware<TestAction, TestState, TestEffect> for TestMiddleware {
    fn handle(
        &self,
        action: TestAction,
        state: &TestState,
    ) -> anyhow::Result<EffectStream<TestEffect>> {
        Ok(match action {
            TestAction::Unfulfillable => effects::none(),
            TestAction::FulfillableInstantly => effects::just(TestEffect::InstantEffect(1)),
            TestAction::ActionForEvent => effects::just(TestEffect::EffectForEvent),
            TestAction::FulfillableAsync { delay_ms } => async_stream::stream! {
                yield anyhow::Ok(TestEffect::StartedAsync);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                yield anyhow::Ok(TestEffect::FinishedAsync(DELAYED_FULFILL_AMOUNT));
            }
            .boxed(),
            TestAction::TranslatesTo3Effects => effects::from_iter([
                TestEffect::MultipleEffect1,
                TestEffect::MultipleEffect2,
                TestEffect::MultipleEffect3,
            ]),
            TestAction::MaybeFulfillable => {
                if state.counter % 3 == 0 {
                    effects::just(TestEffect::ConditionalThingHappened(CONDITIONAL_MULTIPLIER))
                } else {
                    effects::none()
                }
            },
            TestAction::LeadsToExceptionInMiddleware => {
                let refused = io::ErrorKind::ConnectionRefused;
                return Err(io::Error::new(refused, "server unreachable").into());
            },
            TestAction::TranslatesToExceptionInReducer => {
                effects::just(TestEffect::ExceptionInReducer)
            },
        })
    }
}

/// Event producer of the test feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestEventProducer;

impl EventProducer<TestEffect, TestViewEvent> for TestEventProducer {
    fn produce(&self, effect: &TestEffect) -> Option<TestViewEvent> {
        matches!(effect, TestEffect::EffectForEvent).then_some(TestViewEvent::SimpleEvent)
    }
}

/// Store type of the test feature.
pub type TestStore = Store<TestState, TestAction, TestEffect, TestViewEvent>;

/// Builder for a [`TestStore`] with the test reducer, middleware and event
/// producer; add a bootstrapper or error handler before building.
pub fn test_store_builder() -> StoreBuilder<TestState, TestAction, TestEffect, TestViewEvent> {
    Store::builder(TestState::default(), TestReducer, TestMiddleware)
        .event_producer(TestEventProducer)
        .config(gemini_runtime::StoreConfig::default().with_name("test"))
}
