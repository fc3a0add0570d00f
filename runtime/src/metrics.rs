//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the runtime components:
//! - Store action intake and rejection
//! - Reducer applications and their latency
//! - Contained pipeline failures
//! - View events and in-flight pipelines
//! - Connector state transitions
//!
//! Recording goes through the `metrics` facade and is a no-op until a recorder
//! is installed, for example with [`MetricsExporter::install`].
//!
//! # Example
//!
//! ```rust,no_run
//! use gemini_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // Serve this from whatever endpoint Prometheus scrapes
//! let text = exporter.render();
//! # Ok(())
//! # }
//! ```

use gemini_core::Stage;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter for the runtime metrics.
///
/// Installs the global recorder and renders the scrape text. Serving that
/// text over HTTP is left to the application.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a
    /// warning and succeeds without a handle; [`render`](Self::render) then
    /// returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store_actions_received_total",
        "Total number of actions accepted by stores"
    );
    describe_counter!(
        "store_actions_rejected_total",
        "Total number of actions rejected by disposed stores"
    );
    describe_counter!(
        "store_effects_reduced_total",
        "Total number of effects successfully reduced"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time taken to apply the reducer to one effect"
    );
    describe_counter!(
        "store_failures_total",
        "Total number of contained middleware and reducer failures"
    );
    describe_counter!(
        "store_view_events_total",
        "Total number of view events emitted"
    );
    describe_gauge!(
        "store_pipelines_in_flight",
        "Number of middleware pipelines still running asynchronously"
    );

    // Connector Metrics
    describe_counter!(
        "connector_transitions_total",
        "Total number of connector state transitions"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an accepted action.
    pub fn record_action() {
        counter!("store_actions_received_total").increment(1);
    }

    /// Record an action rejected by a disposed store.
    pub fn record_rejected() {
        counter!("store_actions_rejected_total").increment(1);
    }

    /// Record a successful reducer application.
    pub fn record_reduce(duration: Duration) {
        counter!("store_effects_reduced_total").increment(1);
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a contained failure.
    pub fn record_failure(stage: Stage) {
        counter!("store_failures_total", "stage" => stage.as_str()).increment(1);
    }

    /// Record an emitted view event.
    pub fn record_view_event() {
        counter!("store_view_events_total").increment(1);
    }

    /// Record the number of in-flight pipelines.
    #[allow(clippy::cast_precision_loss)] // Pipeline counts stay far below 2^52
    pub fn record_in_flight(count: usize) {
        gauge!("store_pipelines_in_flight").set(count as f64);
    }
}

/// Connector metrics recorder.
pub struct ConnectorMetrics;

impl ConnectorMetrics {
    /// Record a transition into `to` (`connected`, `disconnected`, `disposed`).
    pub fn record_transition(to: &'static str) {
        counter!("connector_transitions_total", "to" => to).increment(1);
    }
}
