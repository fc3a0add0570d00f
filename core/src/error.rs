//! Failure reporting for store pipelines.
//!
//! A failure in middleware or in the reducer never reaches the store's ports.
//! It is contained at the pipeline (or single effect) where it happened and
//! reported to an [`ErrorHandler`] together with the state current at the
//! time of the failure.

use std::fmt;
use thiserror::Error;

/// Where in the store a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Invoking middleware or consuming its effect stream
    Middleware,
    /// Applying a single effect
    Reducer,
}

impl Stage {
    /// Stable lowercase name, used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Middleware => "middleware",
            Self::Reducer => "reducer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contained pipeline failure.
#[derive(Error, Debug)]
pub enum Failure {
    /// Middleware returned an error, either from `handle` or inside its effect stream
    #[error("Middleware failed: {0:#}")]
    Middleware(anyhow::Error),

    /// The reducer returned an error while applying an effect
    #[error("Reducer failed: {0:#}")]
    Reducer(anyhow::Error),

    /// Middleware or reducer panicked
    #[error("Panic in {stage}: {message}")]
    Panicked {
        /// Where the panic happened
        stage: Stage,
        /// The panic payload, if it was a string
        message: String,
    },
}

impl Failure {
    /// The stage this failure was contained at.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Middleware(_) => Stage::Middleware,
            Self::Reducer(_) => Stage::Reducer,
            Self::Panicked { stage, .. } => *stage,
        }
    }

    /// The underlying error, unless this failure was a panic.
    #[must_use]
    pub const fn error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Middleware(error) | Self::Reducer(error) => Some(error),
            Self::Panicked { .. } => None,
        }
    }

    /// Downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error().and_then(anyhow::Error::downcast_ref)
    }

    /// Whether this failure is a contained panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// Sink for contained failures: `(State, Failure) → ()`.
///
/// Implementations must not panic; the store does not protect itself against
/// a failing error handler.
pub trait ErrorHandler<S>: Send + Sync {
    /// Called with the state at failure time and the failure itself.
    fn handle(&self, state: &S, failure: &Failure);
}

impl<S, F> ErrorHandler<S> for F
where
    F: Fn(&S, &Failure) + Send + Sync,
{
    fn handle(&self, state: &S, failure: &Failure) {
        self(state, failure);
    }
}

/// Default error handler: logs the failure and moves on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl<S> ErrorHandler<S> for LoggingErrorHandler {
    fn handle(&self, _state: &S, failure: &Failure) {
        tracing::error!(stage = %failure.stage(), error = %failure, "Store pipeline failed");
    }
}
