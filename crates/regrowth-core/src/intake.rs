//! Event intake: admission filtering, layer grouping, and the thread-safe
//! submission funnel.
//!
//! Destruction events may be produced on any thread. They are funnelled
//! through an [`IntakeHandle`] into the scheduler, which drains the funnel
//! at the start of every tick. All pending-set, tracker and queue mutation
//! therefore happens on the scheduler thread, and the containers need no
//! locks.

use std::collections::{BTreeMap, BTreeSet};

use regrowth_types::{CapturedCell, CellPos, DestructionEvent, EventId, WorldId};
use tokio::sync::mpsc;

use crate::layers::{Layer, TaskDescriptor};

/// Errors returned when submitting through an [`IntakeHandle`].
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The scheduler has shut down and no longer accepts events.
    #[error("scheduler has shut down; event {0} was dropped")]
    Closed(EventId),
}

/// Why an event was dropped at intake without being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Regeneration speed is 0.
    Disabled,
    /// Every cell was already pending, over the cap, or the event was empty.
    NoEligibleCells,
}

/// Summary of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEvent {
    /// The registered event.
    pub event_id: EventId,
    /// Number of cells accepted and now pending.
    pub cells: u32,
    /// Number of distinct elevations among the accepted cells.
    pub layers: usize,
    /// Lowest accepted elevation; heights are measured from here.
    pub min_elevation: i32,
    /// Cells dropped because they were already pending (in another event
    /// or earlier in this one).
    pub already_pending: u32,
    /// Cells dropped because the pending-cell cap was reached.
    pub over_cap: u32,
}

/// Result of submitting one event to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The event was registered and its layers queued.
    Accepted(AcceptedEvent),
    /// The event was dropped. No hook will fire for it.
    Discarded {
        /// The dropped event.
        event_id: EventId,
        /// Why it was dropped.
        reason: DiscardReason,
    },
}

impl IntakeOutcome {
    /// The event this outcome is about.
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::Accepted(accepted) => accepted.event_id,
            Self::Discarded { event_id, .. } => *event_id,
        }
    }

    /// Whether the event was registered.
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The acceptance summary, if the event was registered.
    pub const fn accepted(&self) -> Option<&AcceptedEvent> {
        match self {
            Self::Accepted(accepted) => Some(accepted),
            Self::Discarded { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending set
// ---------------------------------------------------------------------------

/// Cells with a live regeneration task, per world.
#[derive(Debug, Clone, Default)]
pub struct PendingCells {
    worlds: BTreeMap<WorldId, BTreeSet<CellPos>>,
    len: usize,
}

impl PendingCells {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            worlds: BTreeMap::new(),
            len: 0,
        }
    }

    /// Whether the cell is pending.
    pub fn contains(&self, world_id: &WorldId, pos: CellPos) -> bool {
        self.worlds
            .get(world_id)
            .is_some_and(|cells| cells.contains(&pos))
    }

    /// Mark a cell pending. Returns `false` if it already was.
    pub fn insert(&mut self, world_id: &WorldId, pos: CellPos) -> bool {
        let inserted = match self.worlds.get_mut(world_id) {
            Some(cells) => cells.insert(pos),
            None => {
                self.worlds.insert(world_id.clone(), BTreeSet::from([pos]));
                true
            }
        };
        if inserted {
            self.len = self.len.saturating_add(1);
        }
        inserted
    }

    /// Clear a cell's pending flag. Returns `false` if it was not pending.
    pub fn remove(&mut self, world_id: &WorldId, pos: CellPos) -> bool {
        let Some(cells) = self.worlds.get_mut(world_id) else {
            return false;
        };
        let removed = cells.remove(&pos);
        if cells.is_empty() {
            self.worlds.remove(world_id);
        }
        if removed {
            self.len = self.len.saturating_sub(1);
        }
        removed
    }

    /// Number of pending cells across all worlds.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no cell is pending.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget every pending cell, returning how many were cleared.
    pub fn clear(&mut self) -> usize {
        let cleared = self.len;
        self.worlds.clear();
        self.len = 0;
        cleared
    }
}

// ---------------------------------------------------------------------------
// Admission and grouping
// ---------------------------------------------------------------------------

/// Cells that passed admission, plus counts of those that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    /// Cells accepted and now marked pending.
    pub accepted: Vec<CapturedCell>,
    /// Cells dropped because they were already pending.
    pub already_pending: u32,
    /// Cells dropped because the cap was reached.
    pub over_cap: u32,
}

/// Filter an event's cells against the pending set, marking each accepted
/// cell pending.
///
/// `cap` limits the total number of pending cells; `None` means unlimited.
pub fn admit(
    world_id: &WorldId,
    cells: Vec<CapturedCell>,
    pending: &mut PendingCells,
    cap: Option<usize>,
) -> Admission {
    let mut admission = Admission::default();
    for cell in cells {
        if pending.contains(world_id, cell.pos) {
            admission.already_pending = admission.already_pending.saturating_add(1);
            continue;
        }
        if cap.is_some_and(|limit| pending.len() >= limit) {
            admission.over_cap = admission.over_cap.saturating_add(1);
            continue;
        }
        pending.insert(world_id, cell.pos);
        admission.accepted.push(cell);
    }
    admission
}

/// Bucket accepted cells into one [`Layer`] per elevation, ascending.
///
/// Each task's height is measured from the lowest accepted elevation.
/// Returns the layers and that minimum (`None` when `cells` is empty).
pub fn group_into_layers(
    event_id: EventId,
    world_id: &WorldId,
    cells: Vec<CapturedCell>,
) -> (Vec<Layer>, Option<i32>) {
    let Some(min_elevation) = cells.iter().map(|c| c.pos.y).min() else {
        return (Vec::new(), None);
    };

    let mut by_elevation: BTreeMap<i32, Layer> = BTreeMap::new();
    for cell in cells {
        let elevation = cell.pos.y;
        by_elevation
            .entry(elevation)
            .or_insert_with(|| Layer::new(elevation))
            .tasks
            .push(TaskDescriptor {
                event_id,
                world_id: world_id.clone(),
                pos: cell.pos,
                snapshot: cell.snapshot,
                classification: cell.classification,
                height: elevation.abs_diff(min_elevation),
            });
    }

    (by_elevation.into_values().collect(), Some(min_elevation))
}

// ---------------------------------------------------------------------------
// Funnel
// ---------------------------------------------------------------------------

/// An event submitted through the funnel, with its pre-assigned id.
#[derive(Debug)]
pub struct QueuedEvent {
    /// Id assigned at submission.
    pub event_id: EventId,
    /// The submitted event.
    pub event: DestructionEvent,
}

/// Cloneable, thread-safe handle for submitting destruction events from
/// outside the scheduler thread.
#[derive(Debug, Clone)]
pub struct IntakeHandle {
    sender: mpsc::UnboundedSender<QueuedEvent>,
}

impl IntakeHandle {
    /// Queue an event for intake on the scheduler's next tick.
    ///
    /// The id is assigned immediately so callers can correlate the later
    /// completion. Whether the event is accepted is decided on the
    /// scheduler thread.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Closed`] if the scheduler has been dropped.
    pub fn submit(&self, event: DestructionEvent) -> Result<EventId, IntakeError> {
        let event_id = EventId::new();
        self.sender
            .send(QueuedEvent { event_id, event })
            .map_err(|err| IntakeError::Closed(err.0.event_id))?;
        Ok(event_id)
    }
}

/// Create a connected funnel.
pub fn funnel() -> (IntakeHandle, mpsc::UnboundedReceiver<QueuedEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (IntakeHandle { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use regrowth_types::{Classification, Snapshot};

    use super::*;

    fn cell(x: i32, y: i32, z: i32) -> CapturedCell {
        CapturedCell::new(CellPos::new(x, y, z), Snapshot::new("stone"), Classification::Natural)
    }

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    #[test]
    fn pending_set_tracks_per_world() {
        let mut pending = PendingCells::new();
        let nether = WorldId::new("nether");
        let pos = CellPos::new(1, 2, 3);

        assert!(pending.insert(&overworld(), pos));
        assert!(!pending.insert(&overworld(), pos));
        assert!(pending.insert(&nether, pos));
        assert_eq!(pending.len(), 2);

        assert!(pending.remove(&overworld(), pos));
        assert!(!pending.contains(&overworld(), pos));
        assert!(pending.contains(&nether, pos));
        assert!(!pending.remove(&overworld(), pos));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn admit_skips_already_pending_and_duplicates() {
        let mut pending = PendingCells::new();
        pending.insert(&overworld(), CellPos::new(0, 0, 0));

        let admission = admit(
            &overworld(),
            vec![cell(0, 0, 0), cell(1, 0, 0), cell(1, 0, 0)],
            &mut pending,
            None,
        );
        assert_eq!(admission.accepted.len(), 1);
        assert_eq!(admission.already_pending, 2);
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn admit_respects_cap() {
        let mut pending = PendingCells::new();
        let admission = admit(
            &overworld(),
            vec![cell(0, 0, 0), cell(1, 0, 0), cell(2, 0, 0)],
            &mut pending,
            Some(2),
        );
        assert_eq!(admission.accepted.len(), 2);
        assert_eq!(admission.over_cap, 1);
        assert!(!pending.contains(&overworld(), CellPos::new(2, 0, 0)));
    }

    #[test]
    fn grouping_buckets_by_elevation_with_heights() {
        let event_id = EventId::new();
        let cells = vec![cell(0, 1, 0), cell(0, 0, 0), cell(1, 2, 0), cell(1, 0, 0), cell(2, 1, 0)];
        let (layers, min) = group_into_layers(event_id, &overworld(), cells);

        assert_eq!(min, Some(0));
        let shape: Vec<(i32, usize)> = layers.iter().map(|l| (l.elevation, l.len())).collect();
        assert_eq!(shape, vec![(0, 2), (1, 2), (2, 1)]);
        for layer in &layers {
            for task in &layer.tasks {
                assert_eq!(i64::from(task.height), i64::from(layer.elevation));
                assert_eq!(task.event_id, event_id);
            }
        }
    }

    #[test]
    fn grouping_measures_height_from_negative_minimum() {
        let (layers, min) =
            group_into_layers(EventId::new(), &overworld(), vec![cell(0, -3, 0), cell(0, 2, 0)]);
        assert_eq!(min, Some(-3));
        let heights: Vec<u32> = layers
            .iter()
            .flat_map(|l| l.tasks.iter().map(|t| t.height))
            .collect();
        assert_eq!(heights, vec![0, 5]);
    }

    #[test]
    fn grouping_empty_event_yields_nothing() {
        let (layers, min) = group_into_layers(EventId::new(), &overworld(), Vec::new());
        assert!(layers.is_empty());
        assert!(min.is_none());
    }

    #[test]
    fn funnel_delivers_with_preassigned_id() {
        let (handle, mut receiver) = funnel();
        let event = DestructionEvent::new(overworld(), CellPos::new(0, 0, 0), 4);
        let id = handle.submit(event);
        assert!(id.is_ok());
        let queued = receiver.try_recv();
        assert_eq!(queued.ok().map(|q| q.event_id), id.ok());
    }

    #[test]
    fn funnel_reports_closed_scheduler() {
        let (handle, receiver) = funnel();
        drop(receiver);
        let result = handle.submit(DestructionEvent::new(overworld(), CellPos::new(0, 0, 0), 1));
        assert!(matches!(result, Err(IntakeError::Closed(_))));
    }
}
