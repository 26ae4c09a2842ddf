//! Per-event completion bookkeeping.
//!
//! Each accepted event registers how many cells it owns. Every fired task
//! resolves exactly one cell; the resolve that brings `remaining` to zero
//! removes the record and hands it back to the caller, which is the only
//! moment the completion hook may run for that event.

use std::collections::BTreeMap;

use regrowth_types::{CellOutcome, CellPos, EventId, WorldId};
use tracing::warn;

/// Bookkeeping for one in-flight event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// The event.
    pub event_id: EventId,
    /// World the event happened in.
    pub world_id: WorldId,
    /// Centre of the explosion.
    pub origin: CellPos,
    /// Explosive yield.
    pub intensity: u32,
    /// Cells not yet resolved.
    pub remaining: u32,
    /// Cells restored so far.
    pub restored: u32,
    /// Cells skipped because something else had filled them.
    pub skipped: u32,
    /// Cells whose restore failed.
    pub failed: u32,
    /// Tick on which the event was accepted.
    pub submitted_tick: u64,
}

impl EventRecord {
    /// Create a record for a freshly accepted event.
    pub const fn new(
        event_id: EventId,
        world_id: WorldId,
        origin: CellPos,
        intensity: u32,
        cells: u32,
        submitted_tick: u64,
    ) -> Self {
        Self {
            event_id,
            world_id,
            origin,
            intensity,
            remaining: cells,
            restored: 0,
            skipped: 0,
            failed: 0,
            submitted_tick,
        }
    }
}

/// Remaining-count map for every active event.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    events: BTreeMap<EventId, EventRecord>,
}

impl CompletionTracker {
    /// Create an empty tracker.
    pub const fn new() -> Self {
        Self {
            events: BTreeMap::new(),
        }
    }

    /// Start tracking an event. Records with zero cells are not tracked,
    /// since nothing would ever complete them.
    pub fn register(&mut self, record: EventRecord) {
        if record.remaining == 0 {
            return;
        }
        self.events.insert(record.event_id, record);
    }

    /// Resolve one cell of `event_id`.
    ///
    /// Returns the finished record when this was the event's last cell.
    /// Resolving a cell for an unknown event logs a warning and returns
    /// `None`.
    pub fn resolve(&mut self, event_id: EventId, outcome: CellOutcome) -> Option<EventRecord> {
        let Some(record) = self.events.get_mut(&event_id) else {
            warn!(%event_id, ?outcome, "Resolved a cell for an untracked event");
            return None;
        };

        match outcome {
            CellOutcome::Restored => record.restored = record.restored.saturating_add(1),
            CellOutcome::Skipped => record.skipped = record.skipped.saturating_add(1),
            CellOutcome::Failed => record.failed = record.failed.saturating_add(1),
        }
        record.remaining = record.remaining.saturating_sub(1);

        if record.remaining == 0 {
            self.events.remove(&event_id)
        } else {
            None
        }
    }

    /// Cells still unresolved for `event_id`.
    pub fn remaining(&self, event_id: EventId) -> Option<u32> {
        self.events.get(&event_id).map(|r| r.remaining)
    }

    /// Whether `event_id` is still in flight.
    pub fn contains(&self, event_id: EventId) -> bool {
        self.events.contains_key(&event_id)
    }

    /// Number of active events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are active.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Forget every active event, returning how many were abandoned.
    pub fn clear(&mut self) -> usize {
        let abandoned = self.events.len();
        self.events.clear();
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cells: u32) -> EventRecord {
        EventRecord::new(
            EventId::new(),
            WorldId::new("overworld"),
            CellPos::new(0, 64, 0),
            4,
            cells,
            1,
        )
    }

    #[test]
    fn completes_exactly_once_after_last_cell() {
        let mut tracker = CompletionTracker::new();
        let rec = record(3);
        let id = rec.event_id;
        tracker.register(rec);

        assert!(tracker.resolve(id, CellOutcome::Restored).is_none());
        assert_eq!(tracker.remaining(id), Some(2));
        assert!(tracker.resolve(id, CellOutcome::Skipped).is_none());

        let done = tracker.resolve(id, CellOutcome::Failed);
        assert!(done.is_some());
        let done = done.unwrap_or_else(|| record(0));
        assert_eq!((done.restored, done.skipped, done.failed), (1, 1, 1));
        assert_eq!(done.remaining, 0);

        assert!(!tracker.contains(id));
        assert!(tracker.resolve(id, CellOutcome::Restored).is_none());
    }

    #[test]
    fn zero_cell_records_are_not_tracked() {
        let mut tracker = CompletionTracker::new();
        tracker.register(record(0));
        assert!(tracker.is_empty());
    }

    #[test]
    fn events_complete_independently() {
        let mut tracker = CompletionTracker::new();
        let a = record(2);
        let b = record(1);
        let (a_id, b_id) = (a.event_id, b.event_id);
        tracker.register(a);
        tracker.register(b);

        assert!(tracker.resolve(a_id, CellOutcome::Restored).is_none());
        assert!(tracker.resolve(b_id, CellOutcome::Restored).is_some());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.resolve(a_id, CellOutcome::Restored).is_some());
        assert!(tracker.is_empty());
    }

    #[test]
    fn clear_reports_abandoned_events() {
        let mut tracker = CompletionTracker::new();
        tracker.register(record(5));
        tracker.register(record(2));
        assert_eq!(tracker.clear(), 2);
    }
}
