//! The reducer contract.
//!
//! A reducer folds one effect into the current state and returns the next
//! state. It is the only place state transitions happen.

/// Pure state transition: `(State, Effect) → State`.
///
/// The store applies reducers one effect at a time under a single lock, so an
/// implementation never observes concurrent calls against the same store.
///
/// Returning `Err` is the reducer's way of signalling a failure. The store
/// reports it to the [`ErrorHandler`](crate::ErrorHandler), discards the
/// result and keeps the previous state.
///
/// # Example
///
/// ```
/// use gemini_core::Reducer;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Total(u32);
///
/// let reducer = |state: &Total, amount: &u32| -> anyhow::Result<Total> {
///     Ok(Total(state.0 + amount))
/// };
///
/// assert_eq!(reducer.reduce(&Total(1), &2).unwrap(), Total(3));
/// ```
pub trait Reducer<S, E>: Send + Sync {
    /// Apply `effect` to `state`, producing the next state.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect cannot be applied to this state. The
    /// store keeps the previous state in that case.
    fn reduce(&self, state: &S, effect: &E) -> anyhow::Result<S>;
}

impl<S, E, F> Reducer<S, E> for F
where
    F: Fn(&S, &E) -> anyhow::Result<S> + Send + Sync,
{
    fn reduce(&self, state: &S, effect: &E) -> anyhow::Result<S> {
        self(state, effect)
    }
}
