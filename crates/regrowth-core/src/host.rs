//! Collaborator traits the scheduler calls out to.
//!
//! The scheduler never touches world storage directly. When a regeneration
//! task fires it asks a [`WorldAccess`] whether the cell is still absent,
//! writes the snapshot back through it, and asks it for a cosmetic feedback
//! signal. When an event's last cell resolves it calls the
//! [`CompletionHook`] once with the event's hazard region.
//!
//! Both traits are passed to [`RegrowthScheduler::tick`] by the host, so a
//! single world value can be shared with the rest of the host application
//! between ticks.
//!
//! [`RegrowthScheduler::tick`]: crate::scheduler::RegrowthScheduler::tick

use regrowth_types::{CellPos, EventCompletion, Snapshot, WorldId};

/// Failure writing a snapshot back into the world.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// The world is not loaded or does not exist.
    #[error("world {0} is not available")]
    WorldUnavailable(WorldId),

    /// The target cell is in an unloaded part of the world.
    #[error("cell {pos} in world {world_id} is not loaded")]
    Unloaded {
        /// World of the cell.
        world_id: WorldId,
        /// The unloaded cell.
        pos: CellPos,
    },

    /// The snapshot cannot be placed (unknown material, invalid state).
    #[error("cannot place {material} at {pos}: {reason}")]
    InvalidSnapshot {
        /// The cell being restored.
        pos: CellPos,
        /// Material named in the snapshot.
        material: String,
        /// Why the placement was refused.
        reason: String,
    },
}

/// Failure emitting the cosmetic restore signal. Never fatal.
#[derive(Debug, thiserror::Error)]
#[error("feedback failed at {pos}: {message}")]
pub struct FeedbackError {
    /// The cell the signal was for.
    pub pos: CellPos,
    /// Description of the failure.
    pub message: String,
}

/// Failure inside the completion hook. Logged, never retried.
#[derive(Debug, thiserror::Error)]
#[error("completion hook failed: {message}")]
pub struct HookError {
    /// Description of the failure.
    pub message: String,
}

impl HookError {
    /// Create a hook error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Read and write access to world cells.
pub trait WorldAccess {
    /// Whether the cell is still "absent", i.e. nothing has rebuilt it
    /// since it was destroyed.
    ///
    /// What counts as absent is a deployment decision (empty only, or
    /// empty-or-burning, for example).
    fn is_absent(&self, world_id: &WorldId, pos: CellPos) -> bool;

    /// Write `snapshot` back into the cell.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] if the cell cannot be written.
    fn restore_cell(
        &mut self,
        world_id: &WorldId,
        pos: CellPos,
        snapshot: &Snapshot,
    ) -> Result<(), RestoreError>;

    /// Emit the visual/audio signal for a restored cell. Best effort.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError`] if the signal could not be emitted.
    fn emit_feedback(&mut self, world_id: &WorldId, pos: CellPos) -> Result<(), FeedbackError>;
}

/// Side effect run once per event after its last cell resolves.
pub trait CompletionHook {
    /// Called exactly once per completed event.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] if the side effect failed. The scheduler logs
    /// the error and does not call the hook again for this event.
    fn on_event_complete(&mut self, completion: &EventCompletion) -> Result<(), HookError>;
}

/// A completion hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHook;

impl NoOpHook {
    /// Create a new no-op hook.
    pub const fn new() -> Self {
        Self
    }
}

impl CompletionHook for NoOpHook {
    fn on_event_complete(&mut self, _completion: &EventCompletion) -> Result<(), HookError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use regrowth_types::{EventId, Region};

    use super::*;

    #[test]
    fn no_op_hook_always_succeeds() {
        let origin = CellPos::new(0, 64, 0);
        let completion = EventCompletion {
            event_id: EventId::new(),
            world_id: WorldId::new("overworld"),
            origin,
            intensity: 4,
            radius: 8,
            region: Region::around(origin, 8),
            restored: 1,
            skipped: 0,
            failed: 0,
            submitted_tick: 1,
            completed_tick: 40,
            completed_at: Utc::now(),
        };
        assert!(NoOpHook::new().on_event_complete(&completion).is_ok());
    }

    #[test]
    fn restore_errors_render_context() {
        let err = RestoreError::Unloaded {
            world_id: WorldId::new("nether"),
            pos: CellPos::new(1, 2, 3),
        };
        assert_eq!(err.to_string(), "cell (1, 2, 3) in world nether is not loaded");
    }
}
