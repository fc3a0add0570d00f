//! One-shot view events derived from effects.

/// Derives an optional view event from an effect: `Effect → Option<ViewEvent>`.
///
/// The store calls this once per effect, independently of what the reducer
/// made of that effect (it is called even when the reducer fails). View events
/// are delivered only to subscribers connected at the moment of emission; they
/// are never replayed.
pub trait EventProducer<E, V>: Send + Sync {
    /// Map `effect` to a view event, if it warrants one.
    fn produce(&self, effect: &E) -> Option<V>;
}

impl<E, V, F> EventProducer<E, V> for F
where
    F: Fn(&E) -> Option<V> + Send + Sync,
{
    fn produce(&self, effect: &E) -> Option<V> {
        self(effect)
    }
}

/// Event producer for features without view events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl<E, V> EventProducer<E, V> for NoEvents {
    fn produce(&self, _effect: &E) -> Option<V> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Toast {
        Saved,
    }

    #[test]
    fn test_closure_producer_filters_effects() {
        let producer = |effect: &&str| (*effect == "saved").then_some(Toast::Saved);

        assert_eq!(producer.produce(&"saved"), Some(Toast::Saved));
        assert_eq!(producer.produce(&"loaded"), None);
    }

    #[test]
    fn test_no_events_never_produces() {
        let produced: Option<Toast> = NoEvents.produce(&"saved");
        assert!(produced.is_none());
    }
}
