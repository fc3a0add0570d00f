//! # Gemini Runtime
//!
//! Runtime implementation for the Gemini architecture.
//!
//! This crate provides the [`Store`] that drives the contracts defined in
//! `gemini-core`, plus the plumbing that attaches a store to a view and
//! detaches it again as the view comes and goes.
//!
//! ## Core Components
//!
//! - **Store**: Owns the current state, runs middleware pipelines and serializes
//!   reducer applications
//! - **Relays**: Replay-latest (states) and publish-only (view events) multicast ports
//! - **Connector**: A set of [`ConnectionRule`]s connected and disconnected as one unit
//! - **Coordinator**: Drives a connector from lifecycle control events
//!
//! ## Example
//!
//! ```ignore
//! use gemini_runtime::{Connector, ConnectionRule, Store};
//!
//! let store = Store::builder(CounterState::default(), CounterReducer, CounterMiddleware)
//!     .event_producer(CounterEvents)
//!     .build();
//!
//! let connector = Connector::new([
//!     ConnectionRule::direct(store.clone(), view.clone()).boxed(),
//!     ConnectionRule::direct(view.actions(), store.clone()).boxed(),
//! ])
//! .owning(store.clone());
//!
//! connector.connect();
//! ```

/// Replay-latest and publish-only multicast relays
pub mod relay;

/// The Store runtime
pub mod store;

/// In-flight middleware pipeline bookkeeping
mod pipeline;

/// Connection rules and the connector that owns them
pub mod connector;

/// Lifecycle-driven connector coordination
pub mod coordinator;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors returned by Store operations
    ///
    /// Pipeline failures (middleware or reducer) are never returned here;
    /// they are reported to the store's `ErrorHandler` instead.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store has been disposed and no longer accepts actions
        ///
        /// The action passed to `send()` was dropped.
        #[error("Store is disposed")]
        Disposed,
    }
}

pub use connector::{Connection, ConnectionRule, Connector, ConnectorState, Transformer};
pub use coordinator::{Coordinator, LifecycleObserver, StoreLifecycle};
pub use error::StoreError;
pub use relay::{PublishRelay, RelayStream, ReplayRelay};
pub use store::{EventSource, Store, StoreBuilder};

use serde::Deserialize;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use gemini_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_name("checkout")
///     .with_contain_panics(false);
///
/// assert_eq!(config.name, "checkout");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name used in tracing spans and log lines
    pub name: String,
    /// Whether panics in middleware and reducers are contained as failures
    ///
    /// When `false`, a panicking reducer or middleware unwinds through the
    /// task that called it.
    pub contain_panics: bool,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub fn new(name: impl Into<String>, contain_panics: bool) -> Self {
        Self {
            name: name.into(),
            contain_panics,
        }
    }

    /// Set the store name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set whether panics are contained
    #[must_use]
    pub const fn with_contain_panics(mut self, contain_panics: bool) -> Self {
        self.contain_panics = contain_panics;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            contain_panics: true,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.name, "store");
        assert!(config.contain_panics);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{ "name": "profile" }"#).unwrap();
        assert_eq!(config, StoreConfig::new("profile", true));

        let config: StoreConfig = serde_json::from_str(r#"{ "contain_panics": false }"#).unwrap();
        assert_eq!(config.name, "store");
        assert!(!config.contain_panics);
    }

    #[test]
    fn test_store_error_display() {
        assert_eq!(StoreError::Disposed.to_string(), "Store is disposed");
    }
}
