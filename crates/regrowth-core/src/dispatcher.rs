//! Layer dispatcher state machine.
//!
//! The dispatcher is either [`DispatcherState::Idle`] (nothing queued, no
//! per-tick work) or [`DispatcherState::Draining`], in which case it pops
//! one layer as soon as the pacing deadline passes and then arms the next
//! deadline `layer_interval` ticks later. When a pop finds the queue empty
//! it falls back to idle; intake wakes it again.

use tracing::debug;

use crate::layers::{Layer, LayerQueue};

/// Current phase of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No layers queued. Polling does nothing.
    Idle,
    /// Layers are being popped one per pacing interval.
    Draining {
        /// Earliest tick at which the next layer may be popped.
        next_pop_at: u64,
    },
}

/// Pops layers from the [`LayerQueue`] at a fixed pace.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    state: DispatcherState,
    layer_interval: u64,
}

impl Dispatcher {
    /// Create an idle dispatcher that waits `layer_interval` ticks between
    /// layers.
    pub const fn new(layer_interval: u64) -> Self {
        Self {
            state: DispatcherState::Idle,
            layer_interval,
        }
    }

    /// Current state.
    pub const fn state(&self) -> DispatcherState {
        self.state
    }

    /// Whether the dispatcher is idle.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, DispatcherState::Idle)
    }

    /// Start draining if idle. A dispatcher that is already draining keeps
    /// its pacing deadline.
    pub fn wake(&mut self, now: u64) {
        if self.is_idle() {
            debug!(tick = now, "Dispatcher woken");
            self.state = DispatcherState::Draining { next_pop_at: now };
        }
    }

    /// Pop the next layer if the pacing deadline has passed.
    ///
    /// Returns `None` while idle, while waiting for the pacing deadline, or
    /// when the queue turned out to be empty (which moves the dispatcher to
    /// idle).
    pub fn poll(&mut self, now: u64, queue: &mut LayerQueue) -> Option<Layer> {
        let DispatcherState::Draining { next_pop_at } = self.state else {
            return None;
        };
        if now < next_pop_at {
            return None;
        }
        if let Some(layer) = queue.pop_lowest() {
            self.state = DispatcherState::Draining {
                next_pop_at: now.saturating_add(self.layer_interval),
            };
            Some(layer)
        } else {
            debug!(tick = now, "Layer queue drained, dispatcher idle");
            self.state = DispatcherState::Idle;
            None
        }
    }

    /// Force the dispatcher back to idle.
    pub const fn reset(&mut self) {
        self.state = DispatcherState::Idle;
    }
}
