//! Completion hooks for hosts built on [`MemoryWorld`].
//!
//! [`MemoryWorld`]: crate::memory_world::MemoryWorld

use regrowth_core::host::{CompletionHook, HookError};
use regrowth_types::{EventCompletion, EventId};
use tracing::info;

/// Records every completion it is called with. Can be switched to fail
/// after recording, to exercise hook error handling.
#[derive(Debug, Clone, Default)]
pub struct CompletionLog {
    completions: Vec<EventCompletion>,
    fail: bool,
}

impl CompletionLog {
    /// A log that always succeeds.
    pub const fn new() -> Self {
        Self {
            completions: Vec::new(),
            fail: false,
        }
    }

    /// A log that records the completion and then reports failure.
    pub const fn failing() -> Self {
        Self {
            completions: Vec::new(),
            fail: true,
        }
    }

    /// All completions seen, in call order.
    pub fn completions(&self) -> &[EventCompletion] {
        &self.completions
    }

    /// How many times the hook ran for `event_id`.
    pub fn calls_for(&self, event_id: EventId) -> usize {
        self.completions
            .iter()
            .filter(|c| c.event_id == event_id)
            .count()
    }

    /// Take the recorded completions, leaving the log empty.
    pub fn drain(&mut self) -> Vec<EventCompletion> {
        std::mem::take(&mut self.completions)
    }
}

impl CompletionHook for CompletionLog {
    fn on_event_complete(&mut self, completion: &EventCompletion) -> Result<(), HookError> {
        info!(
            event_id = %completion.event_id,
            world_id = %completion.world_id,
            origin = %completion.origin,
            radius = completion.radius,
            "Hazard cleanup due"
        );
        self.completions.push(completion.clone());
        if self.fail {
            return Err(HookError::new(format!(
                "cleanup rejected for event {}",
                completion.event_id
            )));
        }
        Ok(())
    }
}
