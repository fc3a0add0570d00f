//! # Counter Demo
//!
//! A counter feature wired end to end through the Gemini architecture.
//!
//! This demo showcases:
//! - Middleware turning actions into effects, synchronously and after a delay
//! - A pure reducer that can reject an effect
//! - View events derived from effects
//! - A view connected to the store only while its lifecycle says so
//!
//! ## Data flow
//!
//! ```text
//! CounterView ──clicks──▶ Store ──states──▶ CounterView
//!                           └────events──▶ CounterView
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use counter::{CounterAction, counter_store};
//!
//! # async fn example() {
//! let store = counter_store().build();
//!
//! store.send(CounterAction::Increment).unwrap();
//! let count = store.state(|s| s.count);
//! # }
//! ```

use futures::stream::{self, StreamExt};
use gemini_core::{
    Consumer, EffectStream, EventProducer, Failure, Middleware, Reducer, effects,
};
use gemini_runtime::{ConnectionRule, Connector, PublishRelay, Store, StoreBuilder, StoreConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Highest value the counter may hold
pub const MAX_COUNT: i64 = 1_000;

/// Counter state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
    /// A delayed increment is pending
    pub loading: bool,
}

/// Things the user can ask the counter to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    /// Increment the counter by 1
    Increment,
    /// Decrement the counter by 1, never below zero
    Decrement,
    /// Reset the counter to 0
    Reset,
    /// Increment the counter by 1 once `delay` has elapsed
    IncrementLater {
        /// How long to wait
        delay: Duration,
    },
}

/// Facts produced by [`CounterMiddleware`] and applied by [`CounterReducer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEffect {
    /// The count changed by the given amount
    Adjusted(i64),
    /// The count went back to zero
    Cleared,
    /// A delayed increment started
    Loading,
    /// A delayed increment finished with the given amount
    Loaded(i64),
}

/// One-shot notifications for the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterEvent {
    /// The counter was reset
    Cleared,
    /// A delayed increment arrived
    Arrived(i64),
}

/// Errors raised by the counter feature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// Decrement requested at zero
    #[error("Counter cannot go below zero")]
    BelowZero,
    /// Adjustment would leave the allowed range
    #[error("Counter would exceed {MAX_COUNT}: {0}")]
    OutOfRange(i64),
}

/// Counter store
pub type CounterStore = Store<CounterState, CounterAction, CounterEffect, CounterEvent>;

/// Counter reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer<CounterState, CounterEffect> for CounterReducer {
    fn reduce(&self, state: &CounterState, effect: &CounterEffect) -> anyhow::Result<CounterState> {
        let adjust = |by: i64| {
            let count = state.count + by;
            if count > MAX_COUNT {
                return Err(CounterError::OutOfRange(count));
            }
            Ok(count)
        };

        Ok(match effect {
            CounterEffect::Adjusted(by) => CounterState {
                count: adjust(*by)?,
                ..state.clone()
            },
            CounterEffect::Cleared => CounterState {
                count: 0,
                ..state.clone()
            },
            CounterEffect::Loading => CounterState {
                loading: true,
                ..state.clone()
            },
            CounterEffect::Loaded(by) => CounterState {
                count: adjust(*by)?,
                loading: false,
            },
        })
    }
}

/// Counter middleware
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterMiddleware;

impl Middleware<CounterAction, CounterState, CounterEffect> for CounterMiddleware {
    fn handle(
        &self,
        action: CounterAction,
        state: &CounterState,
    ) -> anyhow::Result<EffectStream<CounterEffect>> {
        match action {
            CounterAction::Increment => Ok(effects::just(CounterEffect::Adjusted(1))),
            CounterAction::Decrement if state.count == 0 => Err(CounterError::BelowZero.into()),
            CounterAction::Decrement => Ok(effects::just(CounterEffect::Adjusted(-1))),
            // Nothing to reset
            CounterAction::Reset if state.count == 0 => Ok(effects::none()),
            CounterAction::Reset => Ok(effects::just(CounterEffect::Cleared)),
            CounterAction::IncrementLater { delay } => {
                let loaded = async move {
                    tokio::time::sleep(delay).await;
                    CounterEffect::Loaded(1)
                };
                Ok(effects::from_stream(
                    stream::once(async { CounterEffect::Loading })
                        .chain(stream::once(loaded))
                        .boxed(),
                ))
            },
        }
    }
}

/// Derives [`CounterEvent`]s from effects
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterEvents;

impl EventProducer<CounterEffect, CounterEvent> for CounterEvents {
    fn produce(&self, effect: &CounterEffect) -> Option<CounterEvent> {
        match effect {
            CounterEffect::Cleared => Some(CounterEvent::Cleared),
            CounterEffect::Loaded(by) => Some(CounterEvent::Arrived(*by)),
            CounterEffect::Adjusted(_) | CounterEffect::Loading => None,
        }
    }
}

/// Log contained failures, flagging the expected domain errors separately
pub fn report_failure(state: &CounterState, failure: &Failure) {
    match failure.downcast_ref::<CounterError>() {
        Some(error) => tracing::warn!(count = state.count, %error, "Counter rejected action"),
        None => tracing::error!(count = state.count, %failure, "Counter pipeline failed"),
    }
}

/// Start building the counter store with its event producer and error handler
#[must_use]
pub fn counter_store() -> StoreBuilder<CounterState, CounterAction, CounterEffect, CounterEvent> {
    Store::builder(CounterState::default(), CounterReducer, CounterMiddleware)
        .event_producer(CounterEvents)
        .error_handler(report_failure)
        .config(StoreConfig::default().with_name("counter"))
}

/// Text-mode view: renders states, shows events, and emits clicks
#[derive(Debug, Clone, Default)]
pub struct CounterView {
    screen: Arc<Mutex<Vec<String>>>,
    clicks: PublishRelay<CounterAction>,
}

impl CounterView {
    /// Create an empty view
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user pressing a button
    ///
    /// Lost when the view is not connected.
    pub fn click(&self, action: CounterAction) {
        self.clicks.publish(action);
    }

    /// Every line the view displayed so far
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rule set wiring this view to `store`; the connector owns the store
    #[must_use]
    pub fn connector(&self, store: &CounterStore) -> Connector {
        Connector::new([
            ConnectionRule::direct(store.clone(), self.clone())
                .named("render")
                .boxed(),
            ConnectionRule::direct(store.event_source(), self.clone())
                .named("events")
                .boxed(),
            ConnectionRule::direct(self.clicks.clone(), store.clone())
                .named("clicks")
                .boxed(),
        ])
        .owning(store.clone())
    }

    fn display(&self, line: String) {
        println!("  [view] {line}");
        self.screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

/// Format a state the way the view shows it
#[must_use]
pub fn render(state: &CounterState) -> String {
    if state.loading {
        format!("count = {} (loading...)", state.count)
    } else {
        format!("count = {}", state.count)
    }
}

impl Consumer<CounterState> for CounterView {
    fn accept(&self, state: CounterState) {
        self.display(render(&state));
    }
}

impl Consumer<CounterEvent> for CounterView {
    fn accept(&self, event: CounterEvent) {
        let line = match event {
            CounterEvent::Cleared => "toast: counter cleared".to_string(),
            CounterEvent::Arrived(by) => format!("toast: +{by} arrived"),
        };
        self.display(line);
    }
}
