//! Abstract lifecycle events and the strategies that map them to control events.
//!
//! A platform adapter (outside this crate) translates concrete UI callbacks into
//! [`LifecycleEvent`]s for one owner. A [`LifecycleStrategy`] decides which of
//! those events should start or stop the connection between a store and its view.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle signal of the entity that owns a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Owner created
    Create,
    /// Owner became visible
    Start,
    /// Owner gained focus
    Resume,
    /// Owner lost focus
    Pause,
    /// Owner no longer visible
    Stop,
    /// Owner destroyed
    Destroy,
}

/// Command that drives a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    /// Connect the store to its view
    Start,
    /// Disconnect the store from its view
    Stop,
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

/// Maps an owner's lifecycle events to control events.
///
/// Strategies are pure: the same owner and event always give the same answer.
pub trait LifecycleStrategy<O: ?Sized>: Send + Sync {
    /// The control event for `event`, or `None` to ignore it.
    fn handle(&self, owner: &O, event: LifecycleEvent) -> Option<ControlEvent>;
}

impl<O, F> LifecycleStrategy<O> for F
where
    O: ?Sized,
    F: Fn(&O, LifecycleEvent) -> Option<ControlEvent> + Send + Sync,
{
    fn handle(&self, owner: &O, event: LifecycleEvent) -> Option<ControlEvent> {
        self(owner, event)
    }
}

/// Connected while the owner is resumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumePauseStrategy;

impl<O: ?Sized> LifecycleStrategy<O> for ResumePauseStrategy {
    fn handle(&self, _owner: &O, event: LifecycleEvent) -> Option<ControlEvent> {
        match event {
            LifecycleEvent::Resume => Some(ControlEvent::Start),
            LifecycleEvent::Pause => Some(ControlEvent::Stop),
            _ => None,
        }
    }
}

/// Connected while the owner is started.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartStopStrategy;

impl<O: ?Sized> LifecycleStrategy<O> for StartStopStrategy {
    fn handle(&self, _owner: &O, event: LifecycleEvent) -> Option<ControlEvent> {
        match event {
            LifecycleEvent::Start => Some(ControlEvent::Start),
            LifecycleEvent::Stop => Some(ControlEvent::Stop),
            _ => None,
        }
    }
}

/// Connected for the whole life of the owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateDestroyStrategy;

impl<O: ?Sized> LifecycleStrategy<O> for CreateDestroyStrategy {
    fn handle(&self, _owner: &O, event: LifecycleEvent) -> Option<ControlEvent> {
        match event {
            LifecycleEvent::Create => Some(ControlEvent::Start),
            LifecycleEvent::Destroy => Some(ControlEvent::Stop),
            _ => None,
        }
    }
}
