//! Registry of in-flight middleware pipelines.
//!
//! Each asynchronous pipeline runs in its own task. The registry keeps an
//! abort handle per pipeline id so disposal can cancel all of them at once.
//! A pipeline unregisters itself when its task finishes, panics, or is
//! aborted.

use crate::metrics::StoreMetrics;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// Identifier of one middleware pipeline.
pub(crate) type PipelineId = u64;

#[derive(Debug, Default)]
struct Registry {
    next_id: PipelineId,
    handles: HashMap<PipelineId, AbortHandle>,
    // Pipelines that finished before their handle was registered.
    finished: HashSet<PipelineId>,
    closed: bool,
}

/// Shared pipeline registry of one store.
#[derive(Debug, Clone, Default)]
pub(crate) struct Pipelines {
    registry: Arc<Mutex<Registry>>,
}

impl Pipelines {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `pipeline` and register it.
    ///
    /// Returns `None` without spawning once the registry is closed.
    pub(crate) fn spawn<F>(&self, pipeline: F) -> Option<PipelineId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = {
            let mut registry = self.lock();
            if registry.closed {
                return None;
            }
            let id = registry.next_id;
            registry.next_id += 1;
            id
        };

        let guard = Unregister {
            pipelines: self.clone(),
            id,
        };
        let task = tokio::spawn(async move {
            let _guard = guard;
            pipeline.await;
        });

        let mut registry = self.lock();
        if registry.closed {
            task.abort();
        } else if !registry.finished.remove(&id) {
            registry.handles.insert(id, task.abort_handle());
            StoreMetrics::record_in_flight(registry.handles.len());
        }
        tracing::trace!(pipeline = id, "Pipeline spawned");
        Some(id)
    }

    /// Abort every registered pipeline and refuse new ones.
    ///
    /// Returns the number of pipelines aborted.
    pub(crate) fn cancel_all(&self) -> usize {
        let handles = {
            let mut registry = self.lock();
            registry.closed = true;
            registry.finished.clear();
            std::mem::take(&mut registry.handles)
        };

        for handle in handles.values() {
            handle.abort();
        }
        StoreMetrics::record_in_flight(0);
        handles.len()
    }

    /// Number of registered pipelines.
    pub(crate) fn len(&self) -> usize {
        self.lock().handles.len()
    }

    fn unregister(&self, id: PipelineId) {
        let mut registry = self.lock();
        if registry.handles.remove(&id).is_some() {
            StoreMetrics::record_in_flight(registry.handles.len());
        } else if !registry.closed {
            registry.finished.insert(id);
        }
    }
}

/// Removes a pipeline from the registry when its task ends, however it ends.
struct Unregister {
    pipelines: Pipelines,
    id: PipelineId,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        self.pipelines.unregister(self.id);
        tracing::trace!(pipeline = self.id, "Pipeline finished");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
