//! Notifications emitted by the regions subsystem.
//!
//! Events are queued and drained by the host with [`EventQueue::poll_events`];
//! nothing waits on delivery.

use crate::modes::Mode;
use crate::regions::{ShapeId, ShapeProperty};
use std::collections::BTreeSet;

/// Events raised by regions operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionsEvent {
    /// A property changed on one or more shapes.
    PropertiesChanged {
        shapes: Vec<ShapeId>,
        property: ShapeProperty,
    },
    /// Geometry of shapes changed (translate, modify, undo of either).
    GeometryChanged { shapes: Vec<ShapeId> },
    /// New shapes were created by drawing, pasting or propagation.
    ShapesGenerated { shapes: Vec<ShapeId> },
    /// A history entry was added.
    HistoryAdded { hist_id: u64 },
    /// The set of active modes changed.
    ModesChanged { modes: BTreeSet<Mode> },
    /// Shapes were fetched from the server.
    FetchCompleted { count: usize },
    FetchFailed { message: String },
    /// A save round-trip finished; `ids` maps old to new composite ids.
    SaveCompleted { ids: Vec<(ShapeId, ShapeId)>, purged: Vec<ShapeId> },
    SaveFailed { message: String },
}

/// Fire-and-forget event buffer.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<RegionsEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event.
    pub fn push(&mut self, event: RegionsEvent) {
        log::trace!("Event: {event:?}");
        self.events.push(event);
    }

    /// Drain all pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<RegionsEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_drains() {
        let mut queue = EventQueue::new();
        queue.push(RegionsEvent::HistoryAdded { hist_id: 1 });
        queue.push(RegionsEvent::FetchCompleted { count: 3 });
        assert_eq!(queue.len(), 2);
        let events = queue.poll_events();
        assert_eq!(events[0], RegionsEvent::HistoryAdded { hist_id: 1 });
        assert!(queue.is_empty());
    }
}
