//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use gemini_core::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&anyhow::Error)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Effects are applied in order. If one is rejected, the remaining effects
/// are skipped, state assertions see the last good state and error
/// assertions see the rejection.
///
/// # Example
///
/// ```ignore
/// use gemini_testing::ReducerTest;
///
/// ReducerTest::new(CounterReducer)
///     .given_state(CounterState { count: 0 })
///     .when_effect(CounterEffect::Incremented)
///     .then_state(|state| {
///         assert_eq!(state.count, 1);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, E> {
    reducer: R,
    initial_state: Option<S>,
    effects: Vec<E>,
    state_assertions: Vec<StateAssertion<S>>,
    error_assertions: Vec<ErrorAssertion>,
}

impl<R, S, E> ReducerTest<R, S, E>
where
    R: Reducer<S, E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            initial_state: None,
            effects: Vec::new(),
            state_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an effect to apply (When)
    #[must_use]
    pub fn when_effect(mut self, effect: E) -> Self {
        self.effects.push(effect);
        self
    }

    /// Add several effects to apply in order (When)
    #[must_use]
    pub fn when_effects(mut self, effects: impl IntoIterator<Item = E>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the rejection (Then)
    ///
    /// Declaring one makes [`run`](Self::run) require that an effect is
    /// rejected.
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&anyhow::Error) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if the initial state or effects are not set, if an effect is
    /// rejected without an error assertion (or the reverse), or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        assert!(
            !self.effects.is_empty(),
            "At least one effect must be set with when_effect()"
        );

        let mut rejection = None;
        for effect in &self.effects {
            match self.reducer.reduce(&state, effect) {
                Ok(next) => state = next,
                Err(error) => {
                    rejection = Some(error);
                    break;
                }
            }
        }

        match (&rejection, self.error_assertions.is_empty()) {
            (Some(error), true) => panic!("Reducer rejected an effect: {error:#}"),
            (None, false) => panic!("Expected the reducer to reject an effect"),
            _ => {}
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        if let Some(error) = rejection {
            for assertion in self.error_assertions {
                assertion(&error);
            }
        }
    }
}

/// Helper assertions for reducers
pub mod assertions {
    use gemini_core::Reducer;
    use std::fmt::Debug;

    /// Assert that `effect` turns `state` into `expected`
    ///
    /// # Panics
    ///
    /// Panics if the reducer rejects the effect or produces a different state.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_reduces_to<S, E>(
        reducer: &impl Reducer<S, E>,
        state: &S,
        effect: &E,
        expected: &S,
    ) where
        S: Debug + PartialEq,
        E: Debug,
    {
        match reducer.reduce(state, effect) {
            Ok(next) => assert_eq!(&next, expected, "Unexpected state after {effect:?}"),
            Err(error) => panic!("Reducer rejected {effect:?}: {error:#}"),
        }
    }

    /// Assert that the reducer rejects `effect` with an error of type `T`
    ///
    /// # Panics
    ///
    /// Panics if the effect is accepted or rejected with another error type.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_rejects<T, S, E>(reducer: &impl Reducer<S, E>, state: &S, effect: &E)
    where
        T: std::fmt::Display + Debug + Send + Sync + 'static,
        S: Debug,
        E: Debug,
    {
        match reducer.reduce(state, effect) {
            Ok(next) => panic!("Expected {effect:?} to be rejected, got {next:?}"),
            Err(error) => assert!(
                error.downcast_ref::<T>().is_some(),
                "Expected a {} rejection, got: {error:#}",
                std::any::type_name::<T>()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestEffect {
        Incremented,
        Decremented,
        Overflowed,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("count overflow")]
    struct Overflow;

    struct TestReducer;

    impl Reducer<TestState, TestEffect> for TestReducer {
        fn reduce(&self, state: &TestState, effect: &TestEffect) -> anyhow::Result<TestState> {
            match effect {
                TestEffect::Incremented => Ok(TestState {
                    count: state.count + 1,
                }),
                TestEffect::Decremented => Ok(TestState {
                    count: state.count - 1,
                }),
                TestEffect::Overflowed => Err(Overflow.into()),
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .given_state(TestState { count: 0 })
            .when_effect(TestEffect::Incremented)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_sequence() {
        ReducerTest::new(TestReducer)
            .given_state(TestState { count: 5 })
            .when_effects([
                TestEffect::Decremented,
                TestEffect::Decremented,
                TestEffect::Incremented,
            ])
            .then_state(|state| {
                assert_eq!(state.count, 4);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_rejection_keeps_last_good_state() {
        ReducerTest::new(TestReducer)
            .given_state(TestState { count: 0 })
            .when_effects([
                TestEffect::Incremented,
                TestEffect::Overflowed,
                TestEffect::Incremented,
            ])
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .then_error(|error| {
                assert!(error.is::<Overflow>());
            })
            .run();
    }

    #[test]
    fn test_assertions() {
        assertions::assert_reduces_to(
            &TestReducer,
            &TestState { count: 1 },
            &TestEffect::Incremented,
            &TestState { count: 2 },
        );
        assertions::assert_rejects::<Overflow, _, _>(
            &TestReducer,
            &TestState { count: 1 },
            &TestEffect::Overflowed,
        );
    }
}
