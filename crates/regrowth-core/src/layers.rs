//! Elevation layers and the shared, elevation-ordered layer queue.
//!
//! A [`Layer`] holds every accepted cell at one elevation. Layers from
//! different events at the same elevation share a single queue entry, so
//! the queue is keyed by elevation alone and always pops the lowest
//! remaining elevation first.

use std::collections::BTreeMap;

use regrowth_types::{CellPos, Classification, EventId, Snapshot, WorldId};

/// One accepted cell awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Event the cell belongs to.
    pub event_id: EventId,
    /// World the cell lives in.
    pub world_id: WorldId,
    /// Cell coordinate.
    pub pos: CellPos,
    /// State to write back.
    pub snapshot: Snapshot,
    /// Natural or placed, decided at capture time.
    pub classification: Classification,
    /// Elevation above the event's lowest accepted cell.
    pub height: u32,
}

/// All queued cells at one elevation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Elevation shared by every task in the layer.
    pub elevation: i32,
    /// Tasks in the order they were merged.
    pub tasks: Vec<TaskDescriptor>,
}

impl Layer {
    /// Create an empty layer.
    pub const fn new(elevation: i32) -> Self {
        Self {
            elevation,
            tasks: Vec::new(),
        }
    }

    /// Number of tasks in the layer.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the layer holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Queue of layers awaiting dispatch, shared by all active events.
#[derive(Debug, Clone, Default)]
pub struct LayerQueue {
    layers: BTreeMap<i32, Layer>,
    task_count: usize,
}

impl LayerQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            layers: BTreeMap::new(),
            task_count: 0,
        }
    }

    /// Merge a layer into the queue.
    ///
    /// If a layer at the same elevation is already queued, the new tasks are
    /// appended to it; otherwise the layer takes its sorted position.
    /// Empty layers are ignored.
    pub fn merge(&mut self, layer: Layer) {
        if layer.is_empty() {
            return;
        }
        self.task_count = self.task_count.saturating_add(layer.len());
        match self.layers.get_mut(&layer.elevation) {
            Some(existing) => existing.tasks.extend(layer.tasks),
            None => {
                self.layers.insert(layer.elevation, layer);
            }
        }
    }

    /// Remove and return the lowest-elevation layer.
    pub fn pop_lowest(&mut self) -> Option<Layer> {
        let (_, layer) = self.layers.pop_first()?;
        self.task_count = self.task_count.saturating_sub(layer.len());
        Some(layer)
    }

    /// Elevation of the next layer to be popped.
    pub fn peek_elevation(&self) -> Option<i32> {
        self.layers.keys().next().copied()
    }

    /// Number of queued layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layers are queued.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of tasks across all queued layers.
    pub const fn task_count(&self) -> usize {
        self.task_count
    }

    /// Queued elevations in dispatch order.
    pub fn elevations(&self) -> Vec<i32> {
        self.layers.keys().copied().collect()
    }

    /// Drop every queued layer, returning how many tasks were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.task_count;
        self.layers.clear();
        self.task_count = 0;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(event_id: EventId, y: i32, height: u32) -> TaskDescriptor {
        TaskDescriptor {
            event_id,
            world_id: WorldId::new("overworld"),
            pos: CellPos::new(0, y, 0),
            snapshot: Snapshot::new("stone"),
            classification: Classification::Natural,
            height,
        }
    }

    fn layer(event_id: EventId, y: i32, count: usize) -> Layer {
        Layer {
            elevation: y,
            tasks: (0..count).map(|_| task(event_id, y, 0)).collect(),
        }
    }

    #[test]
    fn pops_in_ascending_elevation() {
        let event = EventId::new();
        let mut queue = LayerQueue::new();
        queue.merge(layer(event, 2, 1));
        queue.merge(layer(event, 0, 2));
        queue.merge(layer(event, 1, 2));

        assert_eq!(queue.elevations(), vec![0, 1, 2]);
        assert_eq!(queue.task_count(), 5);

        let popped: Vec<i32> = std::iter::from_fn(|| queue.pop_lowest())
            .map(|l| l.elevation)
            .collect();
        assert_eq!(popped, vec![0, 1, 2]);
        assert!(queue.is_empty());
        assert_eq!(queue.task_count(), 0);
    }

    #[test]
    fn same_elevation_layers_share_one_entry() {
        let a = EventId::new();
        let b = EventId::new();
        let mut queue = LayerQueue::new();
        queue.merge(layer(a, 3, 2));
        queue.merge(layer(b, 3, 1));

        assert_eq!(queue.len(), 1);
        let merged = queue.pop_lowest();
        let events: Vec<EventId> = merged
            .map(|l| l.tasks.iter().map(|t| t.event_id).collect())
            .unwrap_or_default();
        assert_eq!(events, vec![a, a, b]);
    }

    #[test]
    fn later_lower_layer_jumps_ahead() {
        let a = EventId::new();
        let b = EventId::new();
        let mut queue = LayerQueue::new();
        queue.merge(layer(a, 3, 1));
        queue.merge(layer(b, 1, 1));
        assert_eq!(queue.peek_elevation(), Some(1));
    }

    #[test]
    fn negative_elevations_sort_first() {
        let event = EventId::new();
        let mut queue = LayerQueue::new();
        queue.merge(layer(event, 5, 1));
        queue.merge(layer(event, -12, 1));
        assert_eq!(queue.elevations(), vec![-12, 5]);
    }

    #[test]
    fn empty_layers_are_ignored() {
        let mut queue = LayerQueue::new();
        queue.merge(Layer::new(4));
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_reports_dropped_tasks() {
        let event = EventId::new();
        let mut queue = LayerQueue::new();
        queue.merge(layer(event, 0, 3));
        queue.merge(layer(event, 1, 4));
        assert_eq!(queue.clear(), 7);
        assert!(queue.is_empty());
    }
}
