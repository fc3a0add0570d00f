//! # Gemini Core
//!
//! Core contracts for the Gemini unidirectional dataflow architecture.
//!
//! This crate defines the pieces a feature is assembled from. It contains no
//! runtime; the `Store` that drives these contracts lives in `gemini-runtime`.
//!
//! ## Core Concepts
//!
//! - **State**: The single current value of a feature, replaced (never mutated) by the reducer
//! - **Action**: An external intent submitted to the store
//! - **Effect**: The outcome of handling an action, folded into state by the reducer
//! - **View event**: A one-shot notification derived from an effect, never replayed
//! - **Middleware**: `(Action, State) → stream of Effects`, where all side effects live
//! - **Reducer**: Pure function `(State, Effect) → State`
//!
//! ## Data Flow
//!
//! ```text
//!  view ──Action──▶ Middleware ──Effect──▶ Reducer ──State──▶ view
//!                                   │
//!                                   └──▶ EventProducer ──ViewEvent──▶ view
//! ```
//!
//! ## Example
//!
//! ```
//! use gemini_core::middleware::{effects, EffectStream, Middleware};
//! use gemini_core::reducer::Reducer;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct CounterState { count: i64 }
//!
//! enum CounterAction { Increment }
//! enum CounterEffect { Incremented }
//!
//! struct CounterReducer;
//!
//! impl Reducer<CounterState, CounterEffect> for CounterReducer {
//!     fn reduce(
//!         &self,
//!         state: &CounterState,
//!         effect: &CounterEffect,
//!     ) -> anyhow::Result<CounterState> {
//!         match effect {
//!             CounterEffect::Incremented => Ok(CounterState { count: state.count + 1 }),
//!         }
//!     }
//! }
//!
//! struct CounterMiddleware;
//!
//! impl Middleware<CounterAction, CounterState, CounterEffect> for CounterMiddleware {
//!     fn handle(
//!         &self,
//!         action: CounterAction,
//!         _state: &CounterState,
//!     ) -> anyhow::Result<EffectStream<CounterEffect>> {
//!         match action {
//!             CounterAction::Increment => Ok(effects::just(CounterEffect::Incremented)),
//!         }
//!     }
//! }
//!
//! let next = CounterReducer.reduce(&CounterState { count: 1 }, &CounterEffect::Incremented);
//! assert_eq!(next.unwrap(), CounterState { count: 2 });
//! ```

pub mod bootstrap;
pub mod connection;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod middleware;
pub mod reducer;

pub use bootstrap::{Bootstrapper, InitialActions, NoBootstrap};
pub use connection::{Consumer, Disposable, Publisher};
pub use error::{ErrorHandler, Failure, LoggingErrorHandler, Stage};
pub use event::{EventProducer, NoEvents};
pub use lifecycle::{
    ControlEvent, CreateDestroyStrategy, LifecycleEvent, LifecycleStrategy, ResumePauseStrategy,
    StartStopStrategy,
};
pub use middleware::{EffectStream, Middleware, effects};
pub use reducer::Reducer;
